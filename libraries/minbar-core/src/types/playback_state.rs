/// Playback state types
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the engine is in its lifecycle
///
/// `Idle -> Loading -> Ready -> Playing <-> Paused -> Ended`. `Errored` is
/// reachable from loading or playback and is terminal until a new track loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    /// Nothing loaded
    #[default]
    Idle,
    /// Source requested, waiting for the device to be ready
    Loading,
    /// Device can play, not started yet
    Ready,
    /// Playing audio
    Playing,
    /// Paused mid-track
    Paused,
    /// Reached the end of the track
    Ended,
    /// Device failure
    Errored,
}

impl PlaybackStatus {
    /// Convert to string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Ended => "ended",
            Self::Errored => "errored",
        }
    }

    /// Whether audio is currently coming out of the device
    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Playing)
    }

    /// Whether a track is loaded and the device can take transport commands
    pub fn has_media(&self) -> bool {
        matches!(self, Self::Ready | Self::Playing | Self::Paused | Self::Ended)
    }
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Read-only snapshot of the engine state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    /// Lifecycle status
    pub status: PlaybackStatus,

    /// Playhead in seconds
    pub current_time: f64,

    /// Duration in seconds, once known
    pub duration: Option<f64>,

    /// Output volume (0.0 - 1.0)
    pub volume: f64,

    /// Derived: volume is zero
    pub is_muted: bool,

    /// Loop the current track
    pub is_looping: bool,

    /// Playback speed (1.0 = normal)
    pub playback_rate: f64,

    /// Loading skeleton is on screen
    pub is_loading: bool,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            status: PlaybackStatus::Idle,
            current_time: 0.0,
            duration: None,
            volume: 1.0,
            is_muted: false,
            is_looping: false,
            playback_rate: 1.0,
            is_loading: false,
        }
    }
}
