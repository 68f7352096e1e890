//! Types for the host application's playback endpoints.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for connecting to the host application.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Base URL of the application (e.g., "https://minbar.example.com")
    pub url: String,
    /// Anti-forgery token sent with state-changing requests
    pub csrf_token: Option<String>,
    /// Whole-request timeout
    pub timeout: Duration,
}

impl ServerConfig {
    /// Create a config with just the URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            csrf_token: None,
            timeout: Duration::from_secs(10),
        }
    }

    /// Create a config that sends a CSRF token.
    pub fn with_csrf_token(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            csrf_token: Some(token.into()),
            ..Self::new(url)
        }
    }
}

/// Response from the position lookup endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionResponse {
    /// Saved position in seconds; `null` when nothing was recorded
    pub position: Option<f64>,
}
