//! WebSocket client for the store service.
//!
//! Implements the request/response pattern with UUID correlation and
//! keepalive pings on an idle link.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio_tungstenite::tungstenite;

use segstore_engine::{SegmentMessage, StoreError};
use segstore_protocol::constants::{
    MessageType, WS_MAX_MESSAGE_SIZE, WS_PING_PERIOD, WS_REQUEST_TIMEOUT,
    WS_SEGMENT_REQUEST_TIMEOUT,
};
use segstore_protocol::envelope::{Message, WsError};
use segstore_protocol::frame::encode_frame;
use segstore_protocol::messages::{InfoResponse, StoreSegmentResponse};

use crate::pumps::PendingMap;

/// Errors from the store client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("WebSocket error: {0}")]
    Ws(#[from] tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("request timed out")]
    Timeout,

    #[error("connection closed")]
    Closed,

    #[error(transparent)]
    Service(#[from] WsError),

    #[error("local file error: {0}")]
    Local(#[from] StoreError),

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl ClientError {
    /// Error kind reported by the service, if this is a service error.
    pub fn service_kind(&self) -> Option<&str> {
        match self {
            ClientError::Service(err) => Some(err.kind.as_str()),
            _ => None,
        }
    }
}

/// WebSocket client connected to a store service.
pub struct StoreClient {
    write_tx: mpsc::Sender<tungstenite::Message>,
    pending: PendingMap,
    _read_handle: tokio::task::JoinHandle<()>,
    _write_handle: tokio::task::JoinHandle<()>,
    cancel: tokio_util::sync::CancellationToken,
}

impl StoreClient {
    /// Connects to a store service WebSocket, e.g. `ws://127.0.0.1:9876`.
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        let mut ws_config = tokio_tungstenite::tungstenite::protocol::WebSocketConfig::default();
        ws_config.max_message_size = Some(WS_MAX_MESSAGE_SIZE);
        ws_config.max_frame_size = Some(WS_MAX_MESSAGE_SIZE);
        let (ws_stream, _) =
            tokio_tungstenite::connect_async_with_config(url, Some(ws_config), false).await?;
        let (write, read) = ws_stream.split();

        let (write_tx, write_rx) = mpsc::channel::<tungstenite::Message>(256);
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let cancel = tokio_util::sync::CancellationToken::new();

        let write_handle = {
            let cancel = cancel.clone();
            tokio::spawn(crate::pumps::write::write_pump(
                write,
                write_rx,
                WS_PING_PERIOD,
                cancel,
            ))
        };

        let read_handle = {
            let pending = pending.clone();
            let cancel = cancel.clone();
            let write_tx = write_tx.clone();
            tokio::spawn(crate::pumps::read::read_pump(read, pending, write_tx, cancel))
        };

        tracing::debug!(%url, "connected to store service");

        Ok(Self {
            write_tx,
            pending,
            _read_handle: read_handle,
            _write_handle: write_handle,
            cancel,
        })
    }

    /// Sends a JSON request and waits for the response.
    pub async fn send_request<T: serde::Serialize>(
        &self,
        msg_type: MessageType,
        payload: Option<&T>,
    ) -> Result<Message, ClientError> {
        let id = uuid::Uuid::new_v4().to_string();
        let msg = Message::new(&id, msg_type, payload)?;
        let json = serde_json::to_string(&msg)?;

        self.round_trip(id, tungstenite::Message::Text(json.into()), WS_REQUEST_TIMEOUT)
            .await
    }

    /// Sends one segment and waits for the service's verdict.
    ///
    /// Wire format: `[4 bytes big-endian header length][JSON header][payload]`,
    /// with a fresh request id in the header for correlation.
    pub async fn store_segment(
        &self,
        segment: &SegmentMessage,
        payload: &[u8],
    ) -> Result<StoreSegmentResponse, ClientError> {
        let id = uuid::Uuid::new_v4().to_string();
        let header = segment.to_request(&id);
        let frame = encode_frame(&header, payload)?;

        // The last segment triggers verification on the service side.
        let resp = self
            .round_trip(
                id,
                tungstenite::Message::Binary(frame.into()),
                WS_SEGMENT_REQUEST_TIMEOUT,
            )
            .await?;
        expect_payload(&resp, MessageType::StoreSegmentResponse)
    }

    /// Queries service identity and status.
    pub async fn get_info(&self) -> Result<InfoResponse, ClientError> {
        let resp = self
            .send_request::<()>(MessageType::GetInfo, None)
            .await?;
        expect_payload(&resp, MessageType::InfoResponse)
    }

    /// Measures a request/response round trip.
    pub async fn ping(&self) -> Result<Duration, ClientError> {
        let start = tokio::time::Instant::now();
        let resp = self.send_request::<()>(MessageType::Ping, None).await?;
        if resp.msg_type != MessageType::Pong {
            return Err(ClientError::UnexpectedResponse(format!("{:?}", resp.msg_type)));
        }
        Ok(start.elapsed())
    }

    /// Gracefully closes the connection.
    pub async fn close(&self) {
        let _ = self.write_tx.send(tungstenite::Message::Close(None)).await;
        self.cancel.cancel();
    }

    async fn round_trip(
        &self,
        id: String,
        frame: tungstenite::Message,
        timeout: Duration,
    ) -> Result<Message, ClientError> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), tx);

        if self.write_tx.send(frame).await.is_err() {
            self.pending.lock().await.remove(&id);
            return Err(ClientError::Closed);
        }

        let result = tokio::time::timeout(timeout, rx).await;

        // Clean up pending entry on any exit path.
        self.pending.lock().await.remove(&id);

        match result {
            Ok(Ok(resp)) => Ok(resp.into_result()?),
            Ok(Err(_)) => Err(ClientError::Closed),
            Err(_) => Err(ClientError::Timeout),
        }
    }
}

impl Drop for StoreClient {
    fn drop(&mut self) {
        self.cancel.cancel();
        self._read_handle.abort();
        self._write_handle.abort();
    }
}

fn expect_payload<T: for<'de> serde::Deserialize<'de>>(
    resp: &Message,
    expected: MessageType,
) -> Result<T, ClientError> {
    if resp.msg_type != expected {
        return Err(ClientError::UnexpectedResponse(format!(
            "expected {expected:?}, got {:?}",
            resp.msg_type
        )));
    }
    resp.parse_payload()?
        .ok_or_else(|| ClientError::UnexpectedResponse(format!("{expected:?} without payload")))
}
