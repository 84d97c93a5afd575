//! Request handler wiring the store engine to the WebSocket server.

use segstore_engine::{SegmentMessage, StoreManager};
use segstore_protocol::constants::{
    MessageType, SERVICE_TYPE, WS_ERR_CODE_INTERNAL, WS_ERR_KIND_INTERNAL,
};
use segstore_protocol::envelope::{Message, WsError};
use segstore_protocol::messages::{InfoResponse, StoreSegmentRequest, StoreSegmentResponse};
use segstore_server::{Handler, HandlerFuture, Sender};

/// Serves `store_segment` and `get_info` requests.
pub struct StoreHandler {
    manager: StoreManager,
    service_id: String,
}

impl StoreHandler {
    pub fn new(manager: StoreManager, service_id: String) -> Self {
        Self {
            manager,
            service_id,
        }
    }
}

impl Handler for StoreHandler {
    fn on_store_segment(
        &self,
        sender: Sender,
        header: StoreSegmentRequest,
        payload: Vec<u8>,
    ) -> HandlerFuture<'_> {
        Box::pin(async move {
            let request_id = header.id.clone();
            let manager = self.manager.clone();

            // Engine I/O is blocking.
            let result = tokio::task::spawn_blocking(move || {
                let msg = SegmentMessage::from_request(&header)?;
                manager.store_segment(&msg, &payload)
            })
            .await;

            let reply = match result {
                Ok(Ok(outcome)) => {
                    let resp = StoreSegmentResponse::from(outcome);
                    match Message::new(&request_id, MessageType::StoreSegmentResponse, Some(&resp)) {
                        Ok(m) => m,
                        Err(e) => {
                            tracing::error!("failed to build reply: {e}");
                            return;
                        }
                    }
                }
                Ok(Err(e)) => {
                    if e.is_fatal() {
                        tracing::error!(%request_id, kind = e.kind(), "segment failed: {e}");
                    } else {
                        tracing::warn!(%request_id, kind = e.kind(), "segment rejected: {e}");
                    }
                    Message::error(&request_id, e.to_wire())
                }
                Err(e) => {
                    tracing::error!(%request_id, "segment task failed: {e}");
                    Message::error(
                        &request_id,
                        WsError::new(
                            WS_ERR_CODE_INTERNAL,
                            WS_ERR_KIND_INTERNAL,
                            "segment processing failed",
                        ),
                    )
                }
            };

            let _ = sender.send_msg(reply);
        })
    }

    fn on_get_info(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        Box::pin(async move {
            let info = InfoResponse {
                service_type: SERVICE_TYPE.to_string(),
                service_id: self.service_id.clone(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                active_transfers: self.manager.registry().active_count(),
            };
            match msg.reply(MessageType::InfoResponse, Some(&info)) {
                Ok(reply) => {
                    let _ = sender.send_msg(reply);
                }
                Err(e) => tracing::error!("failed to build reply: {e}"),
            }
        })
    }

    fn on_disconnected(&self, peer: &str) -> HandlerFuture<'_> {
        tracing::debug!(
            peer,
            open_transfers = self.manager.registry().active_count(),
            "client gone"
        );
        Box::pin(async {})
    }
}
