use segstore_protocol::constants::{
    WS_ERR_CODE_BAD_REQUEST, WS_ERR_CODE_CONFLICT, WS_ERR_CODE_INTERNAL,
    WS_ERR_CODE_NOT_ACCEPTED, WS_ERR_CODE_NOT_FOUND,
};
use segstore_protocol::envelope::WsError;

/// Errors produced by the store engine.
///
/// Every variant except [`StoreError::DuplicateIdentity`] and
/// [`StoreError::Io`] is a client error: the request was rejected and the
/// session it referred to (if any) is unchanged, apart from
/// [`StoreError::IntegrityMismatch`] which always purges the transfer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid segment number: {0}")]
    InvalidSegment(String),

    #[error("first segment must carry a file name")]
    MissingName,

    #[error("segment {0} must carry a file_id")]
    MissingIdentity(u64),

    #[error("first segment must not carry a file_id (got {0})")]
    IdentityConflict(String),

    #[error("invalid file name: {0}")]
    InvalidName(String),

    #[error("unknown transfer: {0}")]
    UnknownTransfer(String),

    #[error("out of order segment for {file_id}: expected {expected}, received {received}")]
    OutOfOrderSegment {
        file_id: String,
        expected: u64,
        received: u64,
    },

    #[error("incomplete store request: {0}")]
    IncompleteStoreRequest(String),

    #[error("integrity check failed for {file_id}: {detail}")]
    IntegrityMismatch { file_id: String, detail: String },

    #[error("duplicate transfer identity: {0}")]
    DuplicateIdentity(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Machine-readable error category, sent as the `kind` of a wire error.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::InvalidSegment(_) => "invalid_segment",
            StoreError::MissingName => "missing_name",
            StoreError::MissingIdentity(_) => "missing_identity",
            StoreError::IdentityConflict(_) => "identity_conflict",
            StoreError::InvalidName(_) => "invalid_name",
            StoreError::UnknownTransfer(_) => "unknown_transfer",
            StoreError::OutOfOrderSegment { .. } => "out_of_order_segment",
            StoreError::IncompleteStoreRequest(_) => "incomplete_store_request",
            StoreError::IntegrityMismatch { .. } => "integrity_mismatch",
            StoreError::DuplicateIdentity(_) => "duplicate_identity",
            StoreError::Io(_) => "io",
        }
    }

    /// Returns true for service-side failures the client did not cause.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::DuplicateIdentity(_) | StoreError::Io(_))
    }

    /// Wire error code for this error.
    pub fn code(&self) -> i32 {
        match self {
            _ if self.is_fatal() => WS_ERR_CODE_INTERNAL,
            StoreError::UnknownTransfer(_) => WS_ERR_CODE_NOT_FOUND,
            StoreError::OutOfOrderSegment { .. } => WS_ERR_CODE_CONFLICT,
            StoreError::IntegrityMismatch { .. } => WS_ERR_CODE_NOT_ACCEPTED,
            _ => WS_ERR_CODE_BAD_REQUEST,
        }
    }

    /// Error block sent back to the client for this failure.
    pub fn to_wire(&self) -> WsError {
        WsError::new(self.code(), self.kind(), self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_kinds() {
        assert!(StoreError::DuplicateIdentity("x".into()).is_fatal());
        assert!(StoreError::Io(std::io::Error::other("disk")).is_fatal());
        assert!(!StoreError::MissingName.is_fatal());
        assert!(!StoreError::UnknownTransfer("x".into()).is_fatal());
    }

    #[test]
    fn wire_codes() {
        assert_eq!(StoreError::UnknownTransfer("x".into()).code(), 404);
        assert_eq!(
            StoreError::OutOfOrderSegment {
                file_id: "x".into(),
                expected: 2,
                received: 3
            }
            .code(),
            409
        );
        assert_eq!(
            StoreError::IntegrityMismatch {
                file_id: "x".into(),
                detail: "size".into()
            }
            .code(),
            406
        );
        assert_eq!(StoreError::DuplicateIdentity("x".into()).code(), 500);
        assert_eq!(StoreError::MissingIdentity(2).code(), 400);
        assert_eq!(StoreError::InvalidSegment("0".into()).code(), 400);
    }

    #[test]
    fn out_of_order_message() {
        let err = StoreError::OutOfOrderSegment {
            file_id: "abc".into(),
            expected: 3,
            received: 5,
        };
        assert_eq!(
            err.to_string(),
            "out of order segment for abc: expected 3, received 5"
        );
        assert_eq!(err.kind(), "out_of_order_segment");
    }

    #[test]
    fn wire_error_block() {
        let wire = StoreError::MissingIdentity(4).to_wire();
        assert_eq!(wire.code, 400);
        assert_eq!(wire.kind, "missing_identity");
        assert_eq!(wire.message, "segment 4 must carry a file_id");
    }
}
