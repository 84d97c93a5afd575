//! Client for the SegStore service.
//!
//! Provides a WebSocket client with request/response correlation and an
//! uploader that splits a local file into segments and drives the store
//! protocol to completion.

pub mod client;
mod pumps;
pub mod upload;

pub use client::{ClientError, StoreClient};
pub use upload::UploadProgress;
