//! # Relay Errors
//!
//! One error type for the whole library. Only [`RelayError::Bind`] is fatal
//! to a process; every other variant is contained by the session or client
//! that produced it.

use std::io;

use thiserror::Error;

/// Result alias used across the library.
pub type Result<T> = std::result::Result<T, RelayError>;

#[derive(Debug, Error)]
pub enum RelayError {
    /// A socket could not be established or maintained.
    #[error("connection error: {0}")]
    Connection(#[from] io::Error),

    /// The byte stream did not hold a structurally complete message record.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// Writing to one recipient failed.
    #[error("failed to send to {peer}: {source}")]
    SendFailure {
        peer: String,
        #[source]
        source: io::Error,
    },

    /// The listening socket could not be opened at startup.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// The client has not connected yet or has already disconnected.
    #[error("not connected")]
    NotConnected,

    /// The session has been torn down.
    #[error("session closed")]
    SessionClosed,

    #[error("config error: {0}")]
    Config(String),
}
