//! Error types for the host application client.

use minbar_core::MinbarError;
use thiserror::Error;

/// Errors that can occur when talking to the host application.
#[derive(Error, Debug)]
pub enum ServerClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server returned an error response
    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// Session expired or CSRF token rejected
    #[error("Request rejected ({status}), session or CSRF token invalid")]
    Unauthorized { status: u16 },

    /// Invalid base URL
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),

    /// Failed to parse server response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Server is offline or unreachable
    #[error("Server unreachable: {0}")]
    ServerUnreachable(String),
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ServerClientError>;

impl From<ServerClientError> for MinbarError {
    fn from(err: ServerClientError) -> Self {
        match err {
            ServerClientError::InvalidUrl(msg) => MinbarError::InvalidInput(msg),
            other => MinbarError::Network(other.to_string()),
        }
    }
}
