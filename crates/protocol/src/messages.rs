use serde::{Deserialize, Serialize};

use crate::constants::MessageType;
use crate::types::{StoreResult, WireInt};

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

/// JSON header of a binary `store_segment` frame.
///
/// The segment bytes travel after the header in the same frame; see
/// [`crate::frame`]. Every segment field is optional on the wire so that the
/// engine, not the decoder, decides which omissions are errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSegmentRequest {
    pub id: String,
    #[serde(rename = "type")]
    pub msg_type: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment_number: Option<WireInt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<StoreResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<WireInt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash_sha256: Option<String>,
}

impl StoreSegmentRequest {
    /// Creates a bare request carrying only the request id and segment number.
    pub fn new(id: impl Into<String>, segment_number: u64) -> Self {
        Self {
            id: id.into(),
            msg_type: MessageType::StoreSegment,
            file_id: None,
            name: None,
            segment_number: Some(WireInt::from(segment_number)),
            result: None,
            size: None,
            hash_sha256: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Response payloads
// ---------------------------------------------------------------------------

/// Reply to an accepted segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSegmentResponse {
    pub file_id: String,
    pub segments_received: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<StoreResult>,
}

/// Service identity and status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfoResponse {
    pub service_type: String,
    pub service_id: String,
    pub version: String,
    #[serde(default)]
    pub active_transfers: usize,
}
