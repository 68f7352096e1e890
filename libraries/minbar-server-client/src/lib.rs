//! Minbar Server Client
//!
//! HTTP client for the host application endpoints the playback engine talks
//! to.
//!
//! # Features
//!
//! - **Positions**: save and look up playback positions of resumable resources
//! - **Stop all audio**: ask the server to clear its rendered player region
//!
//! [`MinbarClient`] implements the `minbar-core` collaborator traits, so it
//! plugs directly into the checkpointer and the session registry.
//!
//! # Example
//!
//! ```ignore
//! use minbar_playback::{PositionCheckpointer, SessionRegistry};
//! use minbar_server_client::{MinbarClient, ServerConfig};
//! use std::sync::Arc;
//!
//! let client = Arc::new(MinbarClient::new(ServerConfig::with_csrf_token(
//!     "https://minbar.example.com",
//!     csrf_token,
//! ))?);
//!
//! let registry = SessionRegistry::new(Some(client.clone()));
//! let checkpointer = PositionCheckpointer::attach(&engine, client);
//! ```

mod client;
mod error;
mod types;

// Re-export main types
pub use client::{MinbarClient, CSRF_HEADER};
pub use error::{Result, ServerClientError};
pub use types::{PositionResponse, ServerConfig};
