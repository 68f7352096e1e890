//! Platform-agnostic playback device trait
//!
//! Abstracts the one native audio output primitive the host exposes (an
//! `<audio>` element in a browser, a media player object on desktop). The
//! engine consumes it; it does not own it.

mod simulated;

pub use simulated::{DeviceCall, SimulatedDevice};

use crate::events::Subscription;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Device failures
///
/// Mirrors the media error codes plus the autoplay-policy rejection of `play()`.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum DeviceError {
    /// The host refused to start playback (autoplay policy)
    #[error("Playback not allowed by the host")]
    NotAllowed,

    /// Fetching the source was aborted
    #[error("Playback was aborted before the source loaded")]
    Aborted,

    /// Network failure while loading the source
    #[error("Network error while loading the source")]
    Network,

    /// The source could not be decoded
    #[error("The source could not be decoded")]
    Decode,

    /// No supported source was found
    #[error("No supported source was found")]
    SourceNotSupported,

    /// Anything else the host reports
    #[error("Device error: {0}")]
    Other(String),
}

impl DeviceError {
    /// Map a media error code (1-4) to a device error
    pub fn from_media_code(code: u16) -> Self {
        match code {
            1 => Self::Aborted,
            2 => Self::Network,
            3 => Self::Decode,
            4 => Self::SourceNotSupported,
            other => Self::Other(format!("media error code {other}")),
        }
    }
}

/// Native events a device emits
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    /// Started fetching a source
    LoadStart,
    /// Duration became known (seconds)
    DurationChange(f64),
    /// Enough data to start playing
    CanPlay,
    /// Playback started
    Play,
    /// Playback paused
    Pause,
    /// Playhead moved (seconds)
    TimeUpdate(f64),
    /// A seek started
    Seeking,
    /// A seek completed (seconds)
    Seeked(f64),
    /// Played to the end
    Ended,
    /// Output volume changed
    VolumeChange(f64),
    /// Playback rate changed
    RateChange(f64),
    /// Loading or decoding failed
    Error(DeviceError),
}

/// Listener type accepted by [`PlaybackDevice::subscribe`]
pub type DeviceListener = Box<dyn Fn(&DeviceEvent) + Send + Sync>;

/// Native audio output primitive
///
/// All methods take `&self`: a device is shared between the engine and the
/// session registry and is expected to use interior mutability. Commands may
/// emit events synchronously, so callers must not hold locks while issuing
/// them.
#[async_trait]
pub trait PlaybackDevice: Send + Sync {
    /// Point the device at a new source and start fetching it
    fn load(&self, src: &str);

    /// Start playback
    ///
    /// Resolves once the host accepted (or rejected) the request.
    async fn play(&self) -> Result<(), DeviceError>;

    /// Pause playback
    fn pause(&self);

    /// Move the playhead (seconds)
    fn seek(&self, position: f64);

    /// Set output volume (0.0 - 1.0)
    fn set_volume(&self, volume: f64);

    /// Set playback speed
    fn set_playback_rate(&self, rate: f64);

    /// Loop the current source natively
    fn set_loop(&self, looping: bool);

    /// Drop the current source and free its resources
    fn release(&self);

    /// Playhead in seconds
    fn current_time(&self) -> f64;

    /// Duration in seconds, if known
    fn duration(&self) -> Option<f64>;

    /// Whether the device is paused
    fn is_paused(&self) -> bool;

    /// Listen to native events
    fn subscribe(&self, listener: DeviceListener) -> Subscription;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_codes_map_to_errors() {
        assert_eq!(DeviceError::from_media_code(1), DeviceError::Aborted);
        assert_eq!(DeviceError::from_media_code(2), DeviceError::Network);
        assert_eq!(DeviceError::from_media_code(3), DeviceError::Decode);
        assert_eq!(DeviceError::from_media_code(4), DeviceError::SourceNotSupported);
        assert!(matches!(DeviceError::from_media_code(9), DeviceError::Other(_)));
    }
}
