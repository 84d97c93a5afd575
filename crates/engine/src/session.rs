use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use sha2::{Digest, Sha256};

/// An open transfer.
///
/// Identity, name and paths are fixed at creation. The mutable part (segment
/// counter, rolling hash, open file handle) sits behind the session's own
/// mutex so that different transfers never contend with each other.
pub struct TransferSession {
    id: String,
    name: String,
    data_dir: PathBuf,
    full_path: PathBuf,
    state: Mutex<SessionState>,
}

pub(crate) struct SessionState {
    segments_received: u64,
    bytes_written: u64,
    hasher: Sha256,
    file: Option<File>,
    closed: bool,
}

impl TransferSession {
    pub(crate) fn new(id: String, name: String, data_dir: PathBuf, file: File) -> Self {
        let full_path = data_dir.join(&name);
        Self {
            id,
            name,
            data_dir,
            full_path,
            state: Mutex::new(SessionState {
                segments_received: 0,
                bytes_written: 0,
                hasher: Sha256::new(),
                file: Some(file),
                closed: false,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory owned by this transfer: `<storage>/<id>`.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Target file: `<storage>/<id>/<name>`.
    pub fn full_path(&self) -> &Path {
        &self.full_path
    }

    /// Number of segments accepted so far.
    pub fn segments_received(&self) -> u64 {
        self.lock().segments_received
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionState {
    pub(crate) fn segments_received(&self) -> u64 {
        self.segments_received
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }

    /// Appends one segment: writes the bytes, folds them into the hash and
    /// bumps the counter.
    ///
    /// On a write error the file is cut back to its previous length and the
    /// counter and hash are left untouched.
    pub(crate) fn append(&mut self, data: &[u8]) -> std::io::Result<()> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| std::io::Error::other("session file already closed"))?;

        if let Err(e) = file.write_all(data) {
            let _ = file.set_len(self.bytes_written);
            let _ = file.seek(SeekFrom::Start(self.bytes_written));
            return Err(e);
        }

        self.hasher.update(data);
        self.bytes_written += data.len() as u64;
        self.segments_received += 1;
        Ok(())
    }

    /// Hex digest of everything appended so far.
    pub(crate) fn hex_digest(&self) -> String {
        hex::encode(self.hasher.clone().finalize())
    }

    /// Flushes and releases the file handle. No further segments are accepted.
    pub(crate) fn close(&mut self) -> std::io::Result<()> {
        self.closed = true;
        match self.file.take() {
            Some(mut file) => file.flush(),
            None => Ok(()),
        }
    }
}
