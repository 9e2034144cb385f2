use std::io;

use crate::wire::WireError;

/// Errors produced by the link layer.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("Failed to connect to {addr}: {source}")]
    Connect { addr: String, source: io::Error },

    #[error("Connection closed by server")]
    Closed,

    #[error("Read timed out")]
    ReadTimeout,

    #[error("Transport error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to encode outbound message: {0}")]
    Encode(#[from] WireError),

    #[error("A session is already active")]
    AlreadyConnected,
}
