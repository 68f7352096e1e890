//! Minbar - Playback Synchronization
//!
//! Keeps one shared audio device and every observer of it in step.
//!
//! This crate provides:
//! - Playback engine (state machine, normalized events, mute-as-volume-zero)
//! - Loading gate (minimum skeleton time, no flicker on fast loads)
//! - Seek controller (drag preview separated from commit)
//! - Caption/transcript sync (tolerance-windowed active segment, centered
//!   scrolling, player kept on screen)
//! - Position checkpointing and resume
//! - OS media-session bridge
//! - Session registry (single-flight playback, toggle outlets, stop-all)
//!
//! # Architecture
//!
//! `minbar-playback` never touches a real audio output. The host provides a
//! [`PlaybackDevice`]; everything else subscribes to the engine's
//! [`PlayerEvent`]s and never mutates the device directly. Timers and
//! fire-and-forget I/O run on the ambient tokio runtime.
//!
//! # Example: Basic Playback
//!
//! ```rust
//! use minbar_core::Track;
//! use minbar_playback::{PlaybackEngine, PlaybackStatus, SimulatedDevice};
//! use std::sync::Arc;
//!
//! let device = Arc::new(SimulatedDevice::new());
//! let engine = PlaybackEngine::builder(device.clone()).build();
//!
//! engine.load_track(Track::new("lesson-7", "https://cdn.example.com/lesson-7.mp3"));
//! assert_eq!(engine.status(), PlaybackStatus::Loading);
//!
//! device.finish_loading(1800.0);
//! assert_eq!(engine.status(), PlaybackStatus::Ready);
//! ```
//!
//! # Example: Synchronized Captions
//!
//! ```rust
//! use minbar_core::Segment;
//! use minbar_playback::{active_segment, SegmentTolerance};
//!
//! let lines = vec![
//!     Segment::new(0.0, 2.0, "first"),
//!     Segment::new(2.0, 4.0, "second"),
//! ];
//!
//! // Highlight moves to the next line slightly before it is spoken
//! assert_eq!(active_segment(&lines, 1.95, SegmentTolerance::default()), Some(1));
//! ```

mod checkpoint;
mod config;
pub mod device;
mod engine;
mod error;
pub mod events;
mod loading;
pub mod media_session;
mod outlet;
mod registry;
mod resume;
pub mod retry;
pub mod scroll;
mod seek;
mod segments;
pub mod sync;
mod time_format;
pub mod timer;
mod volume;

// Public exports
pub use checkpoint::PositionCheckpointer;
pub use config::{
    CheckpointSettings, EngineSettings, MediaSessionSettings, PlayerConfig, SyncSettings,
};
pub use device::{DeviceCall, DeviceError, DeviceEvent, PlaybackDevice, SimulatedDevice};
pub use engine::{PlaybackEngine, PlaybackEngineBuilder};
pub use error::{PlaybackError, Result};
pub use events::{EventBus, PlayerEvent, Subscription};
pub use loading::LoadingGate;
pub use media_session::{MediaSessionBridge, MediaSessionHost};
pub use outlet::{PlayToggle, ToggleOutlet};
pub use registry::{ElementId, EngineId, SessionRegistry};
pub use resume::ResumeBanner;
pub use retry::{poll_until, Backoff, RetryHandle, RetryPolicy, RetryStatus};
pub use seek::{ProgressView, SeekController};
pub use segments::{parse_segments, SegmentSource};
pub use sync::{active_segment, PendingSync, SegmentTolerance, SyncCoordinator, SyncSurfaces};
pub use time_format::format_time;
pub use volume::Volume;

pub use minbar_core::{PlaybackState, PlaybackStatus};
