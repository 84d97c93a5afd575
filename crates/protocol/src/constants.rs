use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Service type reported by `get_info`.
pub const SERVICE_TYPE: &str = "/segstore/service/file-transfer";

/// Default WebSocket port of the store service.
pub const DEFAULT_PORT: u16 = 9876;

/// Time to wait for a pong response (or any incoming message).
///
/// Acts as a read deadline: if nothing arrives within this window the
/// connection is considered dead. Set high enough to tolerate slow disk
/// writes on the service side while a large segment is being stored.
pub const WS_PONG_WAIT: Duration = Duration::from_secs(60);

/// How often to send pings (must be < pong wait).
pub const WS_PING_PERIOD: Duration = Duration::from_secs(5);

/// Maximum message size in bytes (16 MB).
pub const WS_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Default segment size used by the upload client (50 KiB).
pub const DEFAULT_SEGMENT_SIZE: usize = 50 * 1024;

/// Timeout for text request/response operations.
pub const WS_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for segment requests.
///
/// The final segment triggers size and hash verification on the service,
/// so segment requests get a longer budget than plain text requests.
pub const WS_SEGMENT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// WebSocket message type identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    // Requests from client to service
    #[serde(rename = "ping")]
    Ping,
    #[serde(rename = "get_info")]
    GetInfo,
    #[serde(rename = "store_segment")]
    StoreSegment,

    // Responses from service to client
    #[serde(rename = "pong")]
    Pong,
    #[serde(rename = "info_response")]
    InfoResponse,
    #[serde(rename = "store_segment_response")]
    StoreSegmentResponse,
    #[serde(rename = "error")]
    Error,

    /// Forward compatibility: unknown message types deserialize here.
    #[serde(other)]
    Unknown,
}

/// Common WebSocket error codes.
pub const WS_ERR_CODE_BAD_REQUEST: i32 = 400;
pub const WS_ERR_CODE_NOT_FOUND: i32 = 404;
pub const WS_ERR_CODE_NOT_ACCEPTED: i32 = 406;
pub const WS_ERR_CODE_CONFLICT: i32 = 409;
pub const WS_ERR_CODE_INTERNAL: i32 = 500;
pub const WS_ERR_CODE_NOT_IMPLEMENTED: i32 = 501;

/// Error kinds raised by the transport itself. Store failures use the
/// snake_case name of the engine error instead.
pub const WS_ERR_KIND_MALFORMED_REQUEST: &str = "malformed_request";
pub const WS_ERR_KIND_UNSUPPORTED: &str = "unsupported_message_type";
pub const WS_ERR_KIND_NOT_IMPLEMENTED: &str = "not_implemented";
pub const WS_ERR_KIND_INTERNAL: &str = "internal";
