//! Connection error types.

use thiserror::Error;

/// Failures of a transport link. Cloneable so a failure can be both logged
/// and shown in the status history.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Rejected before any I/O was attempted.
    #[error("invalid connection parameters: {0}")]
    InvalidParameters(String),

    #[error("target {target} unreachable: {reason}")]
    Unreachable { target: String, reason: String },

    /// The peer (or the OS) refused the connection.
    #[error("target {target} rejected the connection: {reason}")]
    Rejected { target: String, reason: String },

    #[error("connecting to {target} timed out after {after_ms} ms")]
    TimedOut { target: String, after_ms: u64 },

    /// An established link went away.
    #[error("connection lost: {0}")]
    Lost(String),

    #[error("framing error: {0}")]
    Framing(String),

    #[error("unsupported transport: {0}")]
    Unsupported(String),
}

/// Errors from control operations on the [`ConnectionManager`](crate::ConnectionManager).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("not connected to a target")]
    NotConnected,

    #[error(transparent)]
    Transport(#[from] TransportError),
}
