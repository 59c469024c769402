//! Error types for redwire
//!
//! Provides a unified error type for all client operations.

use std::fmt;

use thiserror::Error;

use crate::protocol::{ProtocolError, ServerError};

/// Result type alias using RedwireError
pub type Result<T> = std::result::Result<T, RedwireError>;

/// Unified error type for redwire operations
#[derive(Debug, Error)]
pub enum RedwireError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Per-request Errors
    // -------------------------------------------------------------------------
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Server error: {0}")]
    Server(#[from] ServerError),

    #[error("Unexpected reply: {0}")]
    UnexpectedReply(String),

    // -------------------------------------------------------------------------
    // Encoding Errors
    // -------------------------------------------------------------------------
    #[error("Invalid data: {0}")]
    InvalidData(String),

    // -------------------------------------------------------------------------
    // Connection Errors
    // -------------------------------------------------------------------------
    #[error("Not connected")]
    NotConnected,

    #[error("Connection closed: {0}")]
    ConnectionClosed(CloseCause),

    #[error("Connection timeout")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RedwireError {
    /// True for failures that fan out to every pending request.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            RedwireError::ConnectionClosed(_) | RedwireError::Timeout | RedwireError::NotConnected
        )
    }
}

/// Why a link went away
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseCause {
    /// The peer closed the stream (read returned 0)
    ClosedByPeer,

    /// `Connection::close` or the last handle was dropped
    ClosedLocally,

    /// Read or write failed (reset, broken pipe, ...)
    Transport(String),

    /// No inbound bytes within the idle timeout
    IdleTimeout,
}

impl CloseCause {
    /// The error every pending request is failed with
    pub fn to_error(&self) -> RedwireError {
        match self {
            CloseCause::IdleTimeout => RedwireError::Timeout,
            other => RedwireError::ConnectionClosed(other.clone()),
        }
    }
}

impl fmt::Display for CloseCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseCause::ClosedByPeer => f.write_str("closed by peer"),
            CloseCause::ClosedLocally => f.write_str("closed locally"),
            CloseCause::Transport(reason) => write!(f, "transport failure: {}", reason),
            CloseCause::IdleTimeout => f.write_str("idle timeout"),
        }
    }
}
