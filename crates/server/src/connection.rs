//! Client connection management: read/write pumps, ping/pong, send buffering.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use segstore_protocol::constants::{
    MessageType, WS_ERR_CODE_BAD_REQUEST, WS_ERR_CODE_NOT_IMPLEMENTED,
    WS_ERR_KIND_MALFORMED_REQUEST, WS_ERR_KIND_UNSUPPORTED, WS_MAX_MESSAGE_SIZE, WS_PING_PERIOD,
    WS_PONG_WAIT,
};
use segstore_protocol::envelope::{Message, WsError};
use segstore_protocol::frame::parse_frame;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_util::sync::CancellationToken;

use crate::SEND_BUFFER_SIZE;
use crate::handler::Handler;

/// Handle for sending messages to a connected client.
///
/// Cloneable and cheap: wraps an `mpsc::Sender`.
#[derive(Clone)]
pub struct Sender {
    tx: mpsc::Sender<WsMessage>,
}

impl Sender {
    /// Sends a protocol [`Message`] as JSON text.
    ///
    /// Returns `Err` only if the buffer is full or the client disconnected.
    pub fn send_msg(&self, msg: Message) -> Result<(), SendError> {
        let json = serde_json::to_string(&msg).map_err(|_| SendError)?;
        self.tx.try_send(WsMessage::Text(json.into())).map_err(|_| {
            tracing::warn!("send buffer full or closed, dropping message");
            SendError
        })
    }

    /// Sends an `error` envelope answering `request_id`.
    pub fn send_error(&self, request_id: &str, error: WsError) -> Result<(), SendError> {
        self.send_msg(Message::error(request_id, error))
    }

    /// Returns `true` if the send channel is still open.
    pub fn is_connected(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Error returned when the send channel is full or closed.
#[derive(Debug, thiserror::Error)]
#[error("send failed: buffer full or connection closed")]
pub struct SendError;

/// Active connection to a client.
///
/// Owns the read/write pump tasks and provides a [`Sender`] for replies.
pub struct Connection {
    pub peer: String,
    sender: Sender,
    cancel: CancellationToken,
    read_task: JoinHandle<()>,
}

impl Connection {
    /// Returns a cloneable [`Sender`] for this connection.
    pub fn sender(&self) -> Sender {
        self.sender.clone()
    }

    /// Signals shutdown of both pumps.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Waits until the read pump has finished and the disconnect hook ran.
    pub async fn wait(self) {
        let _ = self.read_task.await;
    }
}

/// Runs the read and write pumps for a WebSocket connection.
///
/// The pumps run as background tokio tasks and stop when the client
/// disconnects or `server_cancel` fires.
pub fn spawn_connection<S, H>(
    ws_stream: S,
    peer: String,
    handler: Arc<H>,
    server_cancel: CancellationToken,
) -> Connection
where
    S: futures_util::Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>>
        + futures_util::Sink<WsMessage, Error = tokio_tungstenite::tungstenite::Error>
        + Send
        + 'static,
    H: Handler,
{
    let (tx, rx) = mpsc::channel::<WsMessage>(SEND_BUFFER_SIZE);
    let cancel = server_cancel.child_token();
    let sender = Sender { tx };

    let (ws_sink, ws_stream) = ws_stream.split();

    // Write pump.
    tokio::spawn(write_pump(ws_sink, rx, cancel.clone()));

    // Read pump.
    let read_cancel = cancel.clone();
    let read_sender = sender.clone();
    let read_peer = peer.clone();
    let read_task = tokio::spawn(async move {
        read_pump(ws_stream, read_sender, Arc::clone(&handler), read_cancel.clone()).await;
        // When read pump exits, cancel the write pump too.
        read_cancel.cancel();
        handler.on_disconnected(&read_peer).await;
        tracing::info!(peer = %read_peer, "client disconnected");
    });

    Connection {
        peer,
        sender,
        cancel,
        read_task,
    }
}

/// Write pump: drains the send channel and sends WS pings.
async fn write_pump<S>(mut sink: S, mut rx: mpsc::Receiver<WsMessage>, cancel: CancellationToken)
where
    S: futures_util::Sink<WsMessage, Error = tokio_tungstenite::tungstenite::Error> + Send + Unpin,
{
    let mut ping_interval = tokio::time::interval(WS_PING_PERIOD);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            msg = rx.recv() => {
                match msg {
                    Some(ws_msg) => {
                        if let Err(e) = sink.send(ws_msg).await {
                            tracing::error!("write pump send error: {e}");
                            break;
                        }
                    }
                    None => break, // Channel closed.
                }
            }

            _ = ping_interval.tick() => {
                if let Err(e) = sink.send(WsMessage::Ping(Vec::new().into())).await {
                    tracing::error!("write pump ping error: {e}");
                    break;
                }
            }
        }
    }

    // Best-effort close frame.
    let _ = sink.close().await;
}

/// Read pump: reads WS frames and dispatches them to the handler.
///
/// Any incoming frame counts as liveness; the connection is dropped when
/// nothing arrives for a whole [`WS_PONG_WAIT`] period.
async fn read_pump<S, H>(mut stream: S, sender: Sender, handler: Arc<H>, cancel: CancellationToken)
where
    S: futures_util::Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>>
        + Send
        + Unpin,
    H: Handler,
{
    let mut pong_deadline = tokio::time::interval(WS_PONG_WAIT);
    pong_deadline.reset();
    let mut got_traffic = true;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            _ = pong_deadline.tick() => {
                if !got_traffic {
                    tracing::warn!("pong timeout, closing connection");
                    break;
                }
                got_traffic = false;
            }

            frame = stream.next() => {
                got_traffic = true;
                match frame {
                    Some(Ok(ws_msg)) => {
                        match ws_msg {
                            WsMessage::Text(text) => {
                                if text.len() > WS_MAX_MESSAGE_SIZE {
                                    tracing::error!("message exceeds max size ({} > {})", text.len(), WS_MAX_MESSAGE_SIZE);
                                    continue;
                                }
                                dispatch_text(&handler, &sender, &text).await;
                            }
                            WsMessage::Binary(data) => {
                                if data.len() > WS_MAX_MESSAGE_SIZE {
                                    tracing::error!("binary message exceeds max size ({} > {})", data.len(), WS_MAX_MESSAGE_SIZE);
                                    continue;
                                }
                                dispatch_binary(&handler, &sender, &data).await;
                            }
                            WsMessage::Pong(_) => {
                                pong_deadline.reset();
                            }
                            WsMessage::Ping(data) => {
                                let _ = sender.tx.try_send(WsMessage::Pong(data));
                            }
                            WsMessage::Close(_) => {
                                tracing::debug!("received close frame");
                                break;
                            }
                            WsMessage::Frame(_) => {} // Raw frames ignored.
                        }
                    }
                    Some(Err(e)) => {
                        tracing::error!("read pump error: {e}");
                        break;
                    }
                    None => break, // Stream ended.
                }
            }
        }
    }
}

/// Dispatches a text (JSON) message to the appropriate handler method.
async fn dispatch_text<H: Handler>(handler: &Arc<H>, sender: &Sender, text: &str) {
    let msg: Message = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            tracing::error!("invalid message JSON: {e}");
            return;
        }
    };

    let s = sender.clone();
    match msg.msg_type {
        MessageType::Ping => handler.on_ping(s, msg).await,
        MessageType::GetInfo => handler.on_get_info(s, msg).await,
        MessageType::StoreSegment => {
            let _ = sender.send_error(
                &msg.id,
                WsError::new(
                    WS_ERR_CODE_BAD_REQUEST,
                    WS_ERR_KIND_MALFORMED_REQUEST,
                    "store_segment must be sent as a binary frame",
                ),
            );
        }
        _ => {
            tracing::warn!(msg_type = ?msg.msg_type, "unhandled message type");
            let _ = sender.send_error(
                &msg.id,
                WsError::new(
                    WS_ERR_CODE_NOT_IMPLEMENTED,
                    WS_ERR_KIND_UNSUPPORTED,
                    "unknown message type",
                ),
            );
        }
    }
}

/// Dispatches a binary WebSocket frame to the segment handler.
async fn dispatch_binary<H: Handler>(handler: &Arc<H>, sender: &Sender, data: &[u8]) {
    match parse_frame(data) {
        Ok(frame) if frame.header.msg_type == MessageType::StoreSegment => {
            handler
                .on_store_segment(sender.clone(), frame.header, frame.payload)
                .await;
        }
        Ok(frame) => {
            tracing::warn!(msg_type = ?frame.header.msg_type, "unexpected binary message type");
            let _ = sender.send_error(
                &frame.header.id,
                WsError::new(
                    WS_ERR_CODE_NOT_IMPLEMENTED,
                    WS_ERR_KIND_UNSUPPORTED,
                    "unsupported binary message type",
                ),
            );
        }
        Err(e) => match e.request_id() {
            Some(id) => {
                let _ = sender.send_error(
                    id,
                    WsError::new(
                        WS_ERR_CODE_BAD_REQUEST,
                        WS_ERR_KIND_MALFORMED_REQUEST,
                        e.to_string(),
                    ),
                );
            }
            None => tracing::error!("failed to parse binary frame: {e}"),
        },
    }
}
