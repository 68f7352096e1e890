//! Minbar Core
//!
//! Platform-agnostic domain types, collaborator traits, and error handling for
//! the Minbar playback engine.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Domain Types**: `Track`, `PlaybackState`, `Segment`, `CheckpointRecord`,
//!   `SavedTrackSnapshot`
//! - **Collaborator Traits**: `PositionStore`, `StopAudioService`, `SnapshotStore`
//! - **Stores**: in-memory and JSON-file implementations of the storage traits
//! - **Error Handling**: Unified `MinbarError` and `Result` types
//!
//! # Example
//!
//! ```rust
//! use minbar_core::{ResourceRef, Segment, Track};
//!
//! let track = Track::new("lesson-7", "https://cdn.example.com/lesson-7.mp3")
//!     .with_title("Lesson 7")
//!     .with_author("Sheikh Example")
//!     .with_resource(ResourceRef::new("lesson", "7"));
//!
//! assert!(track.is_playable());
//!
//! let line = Segment::new(1.0, 3.5, "In the name of God");
//! assert!(line.contains(2.0));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod storage;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use error::{MinbarError, Result};
pub use storage::{JsonFileSnapshotStore, MemoryPositionStore, MemorySnapshotStore};
pub use traits::{PositionStore, SnapshotStore, StopAudioService};

pub use types::{
    CheckpointRecord, PlaybackState, PlaybackStatus, ResourceRef, SavedTrackSnapshot, Segment,
    Track,
};
