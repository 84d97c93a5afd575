use std::io::ErrorKind;
use std::path::Path;
use std::sync::{Arc, MutexGuard};

use segstore_protocol::StoreResult;

use crate::registry::SessionRegistry;
use crate::session::{SessionState, TransferSession};
use crate::types::{SegmentMessage, SegmentResult};
use crate::StoreError;

/// Which transfer a segment addresses.
enum Target<'a> {
    /// Segment 1: open a new transfer for this file name.
    Open(&'a str),
    /// Later segments: continue the transfer with this id.
    Resume(&'a str),
}

/// What the segment asks for once its ordering has been checked.
enum Finalize<'a> {
    None,
    Store { size: u64, hash: &'a str },
    Cancel,
}

/// Drives the segment protocol on top of a [`SessionRegistry`].
///
/// Cheap to clone; all state lives in the registry.
#[derive(Clone)]
pub struct StoreManager {
    registry: Arc<SessionRegistry>,
}

impl StoreManager {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Handles one segment of a transfer.
    ///
    /// Segment 1 opens a transfer, later segments must arrive strictly in
    /// order. A `store` result verifies the declared size and SHA-256 and
    /// closes the transfer; a `cancel` result discards it. Rejected requests
    /// leave an open transfer untouched, except for an integrity mismatch,
    /// which deletes everything written so far.
    pub fn store_segment(
        &self,
        msg: &SegmentMessage,
        payload: &[u8],
    ) -> Result<SegmentResult, StoreError> {
        let segment_number = match msg.segment_number {
            Some(n) if n >= 1 => n as u64,
            Some(n) => {
                return Err(StoreError::InvalidSegment(format!(
                    "segment_number must be positive, got {n}"
                )));
            }
            None => {
                return Err(StoreError::InvalidSegment(
                    "segment_number is required".into(),
                ));
            }
        };

        let file_id = msg.file_id.as_deref().filter(|id| !id.is_empty());
        let target = if segment_number == 1 {
            if let Some(id) = file_id {
                return Err(StoreError::IdentityConflict(id.to_string()));
            }
            let name = msg
                .name
                .as_deref()
                .filter(|n| !n.is_empty())
                .ok_or(StoreError::MissingName)?;
            Target::Open(name)
        } else {
            Target::Resume(file_id.ok_or(StoreError::MissingIdentity(segment_number))?)
        };

        // Checked before anything is created so a rejected request leaves
        // no transfer behind.
        let finalize = check_result(msg)?;

        let session = match target {
            Target::Open(name) => self.registry.create_session(name)?,
            Target::Resume(id) => self.registry.lookup_session(id)?,
        };

        let mut state = session.lock();
        if state.is_closed() {
            return Err(StoreError::UnknownTransfer(session.id().to_string()));
        }

        if let Finalize::Cancel = finalize {
            return self.cancel(&session, state);
        }

        let expected = state.segments_received() + 1;
        if segment_number != expected {
            return Err(StoreError::OutOfOrderSegment {
                file_id: session.id().to_string(),
                expected,
                received: segment_number,
            });
        }

        if let Err(e) = state.append(payload) {
            if segment_number == 1 {
                // The caller never learns this id, so nothing could resume it.
                let _ = state.close();
                self.discard(&session);
            }
            return Err(e.into());
        }
        tracing::debug!(
            file_id = session.id(),
            segment = segment_number,
            bytes = payload.len(),
            "segment appended"
        );

        match finalize {
            Finalize::Store { size, hash } => self.finish(&session, state, size, hash),
            _ => Ok(SegmentResult {
                file_id: session.id().to_string(),
                segments_received: state.segments_received(),
                result: None,
            }),
        }
    }

    /// Verifies the completed file and closes the transfer.
    fn finish(
        &self,
        session: &TransferSession,
        mut state: MutexGuard<'_, SessionState>,
        size: u64,
        hash: &str,
    ) -> Result<SegmentResult, StoreError> {
        let id = session.id();

        let actual_size = state
            .close()
            .and_then(|()| std::fs::metadata(session.full_path()))
            .map(|m| m.len());
        let actual_size = match actual_size {
            Ok(n) => n,
            Err(e) => {
                self.discard(session);
                return Err(e.into());
            }
        };

        let digest = state.hex_digest();
        let mismatch = if actual_size != size {
            Some(format!("size {actual_size} does not match declared {size}"))
        } else if !digest.eq_ignore_ascii_case(hash.trim()) {
            Some(format!("sha256 {digest} does not match declared {hash}"))
        } else {
            None
        };

        if let Some(detail) = mismatch {
            tracing::warn!(file_id = id, %detail, "integrity check failed, transfer purged");
            self.discard(session);
            return Err(StoreError::IntegrityMismatch {
                file_id: id.to_string(),
                detail,
            });
        }

        self.registry.remove_session(id)?;
        tracing::info!(
            file_id = id,
            name = session.name(),
            bytes = actual_size,
            segments = state.segments_received(),
            "transfer stored"
        );
        Ok(SegmentResult {
            file_id: id.to_string(),
            segments_received: state.segments_received(),
            result: Some(StoreResult::Store),
        })
    }

    /// Discards a transfer on request. The cancel payload is not written.
    fn cancel(
        &self,
        session: &TransferSession,
        mut state: MutexGuard<'_, SessionState>,
    ) -> Result<SegmentResult, StoreError> {
        let id = session.id();
        let closed = state.close();
        let purged = remove_data_dir(session.data_dir());
        self.registry.remove_session(id)?;
        closed?;
        purged?;

        tracing::info!(file_id = id, "transfer canceled");
        Ok(SegmentResult {
            file_id: id.to_string(),
            segments_received: state.segments_received(),
            result: Some(StoreResult::Cancel),
        })
    }

    /// Best-effort purge of a transfer that can no longer complete.
    fn discard(&self, session: &TransferSession) {
        if let Err(e) = remove_data_dir(session.data_dir()) {
            tracing::error!(file_id = session.id(), "failed to purge transfer data: {e}");
        }
        if let Err(e) = self.registry.remove_session(session.id()) {
            tracing::error!(file_id = session.id(), "failed to remove working marker: {e}");
        }
    }
}

fn check_result(msg: &SegmentMessage) -> Result<Finalize<'_>, StoreError> {
    match msg.result {
        None => Ok(Finalize::None),
        Some(StoreResult::Cancel) => Ok(Finalize::Cancel),
        Some(StoreResult::Store) => {
            let size = match msg.size {
                Some(n) if n >= 0 => n as u64,
                Some(n) => {
                    return Err(StoreError::IncompleteStoreRequest(format!(
                        "size must not be negative, got {n}"
                    )));
                }
                None => {
                    return Err(StoreError::IncompleteStoreRequest(
                        "size is required to store".into(),
                    ));
                }
            };
            let hash = msg
                .hash_sha256
                .as_deref()
                .filter(|h| !h.trim().is_empty())
                .ok_or_else(|| {
                    StoreError::IncompleteStoreRequest("hash_sha256 is required to store".into())
                })?;
            Ok(Finalize::Store { size, hash })
        }
    }
}

fn remove_data_dir(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_dir_all(path) {
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
