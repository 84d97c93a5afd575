//! Handler trait for processing client requests.
//!
//! Implementors provide the store logic while the server framework handles
//! connection management, routing and the binary frame protocol.

use std::future::Future;
use std::pin::Pin;

use segstore_protocol::constants::{WS_ERR_CODE_NOT_IMPLEMENTED, WS_ERR_KIND_NOT_IMPLEMENTED};
use segstore_protocol::envelope::{Message, WsError};
use segstore_protocol::messages::StoreSegmentRequest;

use crate::connection::Sender;

/// A boxed future returned by handler methods.
pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Trait for handling requests from a connected client.
///
/// Requests on one connection are handled one at a time, in arrival order.
/// Default implementations answer `ping` and reply "not implemented" to
/// everything else, so handlers only override what they serve.
pub trait Handler: Send + Sync + 'static {
    /// Called for a binary `store_segment` frame.
    ///
    /// The handler must reply through `sender` using `header.id` as the
    /// response id.
    fn on_store_segment(
        &self,
        sender: Sender,
        header: StoreSegmentRequest,
        payload: Vec<u8>,
    ) -> HandlerFuture<'_>;

    /// Called for `ping` messages.
    fn on_ping(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        Box::pin(async move {
            if let Ok(reply) =
                msg.reply(segstore_protocol::MessageType::Pong, Option::<&()>::None)
            {
                let _ = sender.send_msg(reply);
            }
        })
    }

    /// Called for `get_info`.
    fn on_get_info(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        Box::pin(async move {
            let _ = sender.send_error(
                &msg.id,
                WsError::new(
                    WS_ERR_CODE_NOT_IMPLEMENTED,
                    WS_ERR_KIND_NOT_IMPLEMENTED,
                    "get_info not implemented",
                ),
            );
        })
    }

    /// Called when a client connection closes (cleanup hook).
    fn on_disconnected(&self, peer: &str) -> HandlerFuture<'_> {
        let _ = peer;
        Box::pin(async {})
    }
}
