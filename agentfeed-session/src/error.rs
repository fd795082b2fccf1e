//! Session-level error types.

use agentfeed_stream::StreamError;
use thiserror::Error;

/// Errors raised while opening a response stream.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The backend answered with a non-2xx status.
    #[error("HTTP error: {status} - {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Decoded error body.
        body: String,
    },

    /// Connection or body read failure.
    #[error("Network error: {0}")]
    Network(String),

    /// The configured endpoint is not a valid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl TransportError {
    /// Create a status error.
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            body: body.into(),
        }
    }

    /// Check if resubmitting the message could succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::InvalidUrl(_) => false,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

/// Errors from the conversation store collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Storage backend error.
    #[error("Storage error: {0}")]
    Backend(String),
}

/// Errors that terminate a session in the `Failed` state.
///
/// User cancellation is not an error and never appears here.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Transport failed (non-2xx response, network failure).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The server reported an error, or broke the event protocol.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The response body could not be framed.
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// The conversation store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The session task died.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SessionError {
    /// Create a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Check if resubmitting the message could succeed.
    ///
    /// Nothing in this crate retries; this only informs the caller.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_retryable(),
            Self::Stream(StreamError::Transport(_)) => true,
            _ => false,
        }
    }
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;
