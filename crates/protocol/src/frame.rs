//! Binary segment frame: 4-byte big-endian header length + JSON header + raw payload.

use serde::{Deserialize, Serialize};

use crate::messages::StoreSegmentRequest;

/// A decoded `store_segment` frame.
#[derive(Debug)]
pub struct SegmentFrame {
    pub header: StoreSegmentRequest,
    pub payload: Vec<u8>,
}

/// Parses a raw binary WebSocket frame into a [`SegmentFrame`].
///
/// Wire format: `[4 bytes: header_len (big-endian)][header_len bytes: JSON][rest: payload]`
pub fn parse_frame(data: &[u8]) -> Result<SegmentFrame, FrameError> {
    if data.len() < 4 {
        return Err(FrameError::TooShort);
    }

    let header_len = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;

    if data.len() - 4 < header_len {
        return Err(FrameError::HeaderTruncated {
            expected: header_len,
            got: data.len() - 4,
        });
    }

    let header_bytes = &data[4..4 + header_len];
    let payload = data[4 + header_len..].to_vec();

    match serde_json::from_slice::<StoreSegmentRequest>(header_bytes) {
        Ok(header) => Ok(SegmentFrame { header, payload }),
        Err(e) => {
            // Recover the request id if possible so the caller can still reply.
            let id = serde_json::from_slice::<HeaderPeek>(header_bytes)
                .ok()
                .and_then(|p| p.id);
            Err(FrameError::InvalidHeader {
                id,
                reason: e.to_string(),
            })
        }
    }
}

/// Encodes a header and payload into a binary frame.
pub fn encode_frame<T: Serialize>(header: &T, payload: &[u8]) -> Result<Vec<u8>, serde_json::Error> {
    let header_json = serde_json::to_vec(header)?;
    let header_len = header_json.len() as u32;

    let mut buf = Vec::with_capacity(4 + header_json.len() + payload.len());
    buf.extend_from_slice(&header_len.to_be_bytes());
    buf.extend_from_slice(&header_json);
    buf.extend_from_slice(payload);
    Ok(buf)
}

#[derive(Deserialize)]
struct HeaderPeek {
    id: Option<String>,
}

/// Errors from binary frame parsing.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame too short (need at least 4 bytes)")]
    TooShort,

    #[error("header truncated: expected {expected} bytes, got {got}")]
    HeaderTruncated { expected: usize, got: usize },

    #[error("invalid header JSON: {reason}")]
    InvalidHeader { id: Option<String>, reason: String },
}

impl FrameError {
    /// Request id recovered from a malformed header, if any.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            FrameError::InvalidHeader { id, .. } => id.as_deref(),
            _ => None,
        }
    }
}
