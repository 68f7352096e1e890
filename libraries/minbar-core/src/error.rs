/// Core error types for Minbar
use thiserror::Error;

/// Result type alias using `MinbarError`
pub type Result<T> = std::result::Result<T, MinbarError>;

/// Core error type for Minbar
#[derive(Error, Debug)]
pub enum MinbarError {
    /// Local storage errors (snapshot store, position store)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Network errors talking to the host application
    #[error("Network error: {0}")]
    Network(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl MinbarError {
    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a network error
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}
