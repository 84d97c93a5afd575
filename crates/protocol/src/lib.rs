pub mod constants;
pub mod envelope;
pub mod frame;
pub mod messages;
pub mod types;

// Re-export primary types for convenience.
pub use constants::MessageType;
pub use envelope::{Message, WsError};
pub use frame::{FrameError, SegmentFrame, encode_frame, parse_frame};
pub use messages::{InfoResponse, StoreSegmentRequest, StoreSegmentResponse};
pub use types::{StoreResult, WireInt};
