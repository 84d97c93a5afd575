use std::fs::File;
use std::io::Read;
use std::path::Path;

use segstore_protocol::constants::DEFAULT_SEGMENT_SIZE;
use sha2::{Digest, Sha256};

use crate::StoreError;

// ---------------------------------------------------------------------------
// Checksum helpers
// ---------------------------------------------------------------------------

/// Computes SHA-256 of `data` and returns the hex-encoded digest.
pub fn checksum_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

// ---------------------------------------------------------------------------
// SegmentReader
// ---------------------------------------------------------------------------

/// One segment read from a local file.
#[derive(Debug, Clone)]
pub struct Segment {
    /// 1-based segment number.
    pub number: u64,
    pub data: Vec<u8>,
    /// True for the final segment of the file.
    pub is_last: bool,
}

/// Reads a file in fixed-size segments while hashing its content.
///
/// An empty file yields exactly one empty segment so that a transfer can
/// still be opened and stored.
pub struct SegmentReader {
    file: File,
    segment_size: usize,
    file_size: u64,
    offset: u64,
    next_number: u64,
    hasher: Sha256,
    done: bool,
}

impl SegmentReader {
    /// Opens `path` for segmented reading.
    ///
    /// If `segment_size` is 0, [`DEFAULT_SEGMENT_SIZE`] (50 KiB) is used.
    pub fn new(path: &Path, segment_size: usize) -> Result<Self, StoreError> {
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();
        let segment_size = if segment_size == 0 {
            DEFAULT_SEGMENT_SIZE
        } else {
            segment_size
        };
        Ok(Self {
            file,
            segment_size,
            file_size,
            offset: 0,
            next_number: 1,
            hasher: Sha256::new(),
            done: false,
        })
    }

    /// Reads the next segment. Returns `None` once the last one was returned.
    pub fn next_segment(&mut self) -> Result<Option<Segment>, StoreError> {
        if self.done {
            return Ok(None);
        }

        let remaining = self.file_size - self.offset;
        let read_size = remaining.min(self.segment_size as u64) as usize;
        let mut buf = vec![0u8; read_size];
        self.file.read_exact(&mut buf)?;

        self.hasher.update(&buf);
        self.offset += read_size as u64;
        let is_last = self.offset >= self.file_size;
        self.done = is_last;

        let segment = Segment {
            number: self.next_number,
            data: buf,
            is_last,
        };
        self.next_number += 1;
        Ok(Some(segment))
    }

    /// Hex SHA-256 of everything read so far.
    pub fn hex_digest(&self) -> String {
        hex::encode(self.hasher.clone().finalize())
    }

    /// Total file size in bytes, taken when the file was opened.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Bytes read so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Number of segments the file will be split into.
    pub fn segment_count(&self) -> u64 {
        self.file_size.div_ceil(self.segment_size as u64).max(1)
    }
}
