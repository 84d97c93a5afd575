//! Segmented file-store engine.
//!
//! A transfer arrives as numbered segments. The [`SessionRegistry`] owns the
//! open transfers and their on-disk working markers; the [`StoreManager`]
//! validates each segment, appends it, keeps the running SHA-256 and
//! finalizes or cancels the transfer. [`SessionRegistry::sweep_orphans`]
//! purges transfers left behind by a crash and must run before traffic is
//! accepted.

mod error;
mod manager;
mod reader;
mod registry;
mod session;
mod types;
mod validation;

pub use error::StoreError;
pub use manager::StoreManager;
pub use reader::{Segment, SegmentReader, checksum_bytes};
pub use registry::{IdGenerator, SessionRegistry, WORK_DIR_NAME};
pub use session::TransferSession;
pub use types::{SegmentMessage, SegmentResult};
pub use validation::validate_file_name;
