use segstore_protocol::{StoreResult, StoreSegmentRequest, StoreSegmentResponse, WireInt};

use crate::StoreError;

/// One deserialized segment request, as handed to the engine.
///
/// Integer fields are kept signed so that the engine, not the decoder,
/// rejects zero and negative values with the right error kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentMessage {
    pub file_id: Option<String>,
    pub name: Option<String>,
    pub segment_number: Option<i64>,
    pub result: Option<StoreResult>,
    pub size: Option<i64>,
    pub hash_sha256: Option<String>,
}

impl SegmentMessage {
    /// First segment of a new transfer.
    pub fn first(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            segment_number: Some(1),
            ..Default::default()
        }
    }

    /// Subsequent segment of an open transfer.
    pub fn next(file_id: impl Into<String>, segment_number: i64) -> Self {
        Self {
            file_id: Some(file_id.into()),
            segment_number: Some(segment_number),
            ..Default::default()
        }
    }

    /// Marks this segment as the last one, declaring the expected totals.
    pub fn with_store(mut self, size: i64, hash_sha256: impl Into<String>) -> Self {
        self.result = Some(StoreResult::Store);
        self.size = Some(size);
        self.hash_sha256 = Some(hash_sha256.into());
        self
    }

    /// Marks this segment as a cancellation.
    pub fn with_cancel(mut self) -> Self {
        self.result = Some(StoreResult::Cancel);
        self
    }

    /// Converts a wire header, rejecting integer fields that are not decimal.
    ///
    /// A malformed `size` only matters when the segment finalizes the
    /// transfer; otherwise it is ignored like any other unused field.
    pub fn from_request(req: &StoreSegmentRequest) -> Result<Self, StoreError> {
        let segment_number = match &req.segment_number {
            Some(raw) => Some(raw.parse().ok_or_else(|| {
                StoreError::InvalidSegment(format!("segment_number is not an integer: {raw}"))
            })?),
            None => None,
        };

        let size = match (&req.size, req.result) {
            (Some(raw), Some(StoreResult::Store)) => Some(raw.parse().ok_or_else(|| {
                StoreError::IncompleteStoreRequest(format!("size is not an integer: {raw}"))
            })?),
            (Some(raw), _) => raw.parse(),
            (None, _) => None,
        };

        Ok(Self {
            file_id: req.file_id.clone(),
            name: req.name.clone(),
            segment_number,
            result: req.result,
            size,
            hash_sha256: req.hash_sha256.clone(),
        })
    }

    /// Builds the wire header for this message.
    pub fn to_request(&self, id: impl Into<String>) -> StoreSegmentRequest {
        StoreSegmentRequest {
            id: id.into(),
            msg_type: segstore_protocol::MessageType::StoreSegment,
            file_id: self.file_id.clone(),
            name: self.name.clone(),
            segment_number: self.segment_number.map(WireInt::from),
            result: self.result,
            size: self.size.map(WireInt::from),
            hash_sha256: self.hash_sha256.clone(),
        }
    }
}

/// Outcome of an accepted segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentResult {
    pub file_id: String,
    pub segments_received: u64,
    /// Set only when the transfer reached a terminal state.
    pub result: Option<StoreResult>,
}

impl From<SegmentResult> for StoreSegmentResponse {
    fn from(r: SegmentResult) -> Self {
        Self {
            file_id: r.file_id,
            segments_received: r.segments_received,
            result: r.result,
        }
    }
}
