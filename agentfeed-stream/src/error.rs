//! Streaming errors.

use thiserror::Error;

/// Errors that can occur while framing a response stream.
///
/// Malformed or unrecognized lines are never errors; they are dropped and
/// counted in [`DecodeStats`](crate::decode::DecodeStats).
#[derive(Debug, Error)]
pub enum StreamError {
    /// A partial line grew past the configured limit without a newline.
    #[error("Line exceeds {limit} bytes without a newline")]
    LineTooLong {
        /// Configured limit in bytes.
        limit: usize,
    },

    /// The underlying chunk source failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StreamError {
    /// Create from any transport error.
    pub fn transport<E: std::fmt::Display>(err: E) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Result type for streaming operations.
pub type StreamResult<T> = Result<T, StreamError>;
