//! WebSocket server for the SegStore service.
//!
//! Accepts any number of client connections, dispatches JSON requests and
//! binary segment frames to a [`Handler`], and manages each connection's
//! lifecycle (ping/pong, graceful shutdown).

mod connection;
mod handler;
mod server;

pub use connection::{Connection, SendError, Sender};
pub use handler::{Handler, HandlerFuture};
pub use server::{ServerConfig, StoreServer};

/// Per-connection send buffer capacity.
///
/// Replies are queued with `try_send`; one reply per request plus pongs
/// never comes close to this.
pub const SEND_BUFFER_SIZE: usize = 256;

/// Errors produced by the store server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}
