//! Server error types

use thiserror::Error;

use crate::ws::ProtocolError;

/// Errors that can occur in the huddle server
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to the specified address
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Socket read or write failure on a single connection
    #[error("connection error: {0}")]
    Connection(String),

    /// No capacity to admit another session
    #[error("cannot spawn session: {0}")]
    Spawn(String),

    /// The room task is no longer running
    #[error("room is closed")]
    RoomClosed,

    /// Malformed envelope or encoding failure
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Internal server error
    #[error("internal error: {0}")]
    Internal(String),
}
