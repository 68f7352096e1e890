//! Error types for the playback engine

use thiserror::Error;

/// Playback errors
///
/// Transport operations never return these: device, policy and collaborator
/// failures are logged and degrade a single feature. Only loading the
/// configuration surfaces an error.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
