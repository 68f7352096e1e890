//! OS media controls
//!
//! Mirrors the engine onto the system transport surface (lock screen, media
//! keys, notification controls) and routes the surface's commands back into
//! the engine. Hosts without such a surface pass `None` and get a bridge that
//! does nothing.

use crate::engine::PlaybackEngine;
use crate::events::{PlayerEvent, Subscription};
use crate::timer;
use minbar_core::Track;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;

/// Artwork entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artwork {
    pub src: String,
    /// e.g. `512x512`
    pub sizes: Option<String>,
    pub mime_type: Option<String>,
}

/// What the OS shows for the current track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub title: String,
    pub artist: String,
    pub artwork: Vec<Artwork>,
}

impl From<&Track> for MediaMetadata {
    fn from(track: &Track) -> Self {
        Self {
            title: track.title.clone(),
            artist: track.author.clone(),
            artwork: track
                .artwork_url
                .iter()
                .map(|src| Artwork {
                    src: src.clone(),
                    sizes: None,
                    mime_type: None,
                })
                .collect(),
        }
    }
}

/// Transport state shown by the OS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPlaybackState {
    None,
    Playing,
    Paused,
}

/// Position report
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionState {
    pub duration: f64,
    pub playback_rate: f64,
    pub position: f64,
}

/// Commands the OS can send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaAction {
    Play,
    Pause,
    SeekTo,
    SeekBackward,
    SeekForward,
}

impl MediaAction {
    /// Every action the bridge handles
    pub const ALL: [MediaAction; 5] = [
        MediaAction::Play,
        MediaAction::Pause,
        MediaAction::SeekTo,
        MediaAction::SeekBackward,
        MediaAction::SeekForward,
    ];
}

/// Extra data sent with a command
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ActionDetails {
    /// Absolute target for `SeekTo`
    pub seek_time: Option<f64>,
    /// Skip length for `SeekBackward`/`SeekForward`
    pub seek_offset: Option<f64>,
}

pub type ActionHandler = Arc<dyn Fn(&ActionDetails) + Send + Sync>;

/// The host's media-session capability
pub trait MediaSessionHost: Send + Sync {
    fn set_metadata(&self, metadata: Option<MediaMetadata>);

    fn set_playback_state(&self, state: SessionPlaybackState);

    fn set_position_state(&self, state: PositionState);

    /// Install or (with `None`) remove the handler for an action
    fn set_action_handler(&self, action: MediaAction, handler: Option<ActionHandler>);
}

/// Projects an engine onto a media-session host
///
/// Dropping the bridge tears it down.
pub struct MediaSessionBridge {
    host: Option<Arc<dyn MediaSessionHost>>,
    subscription: Option<Subscription>,
    torn_down: AtomicBool,
}

impl MediaSessionBridge {
    /// Connect `engine` to `host`
    ///
    /// A `None` host yields a bridge that does nothing.
    pub fn attach(engine: &Arc<PlaybackEngine>, host: Option<Arc<dyn MediaSessionHost>>) -> Self {
        let Some(host) = host else {
            debug!("No media session on this host");
            return Self {
                host: None,
                subscription: None,
                torn_down: AtomicBool::new(true),
            };
        };

        if let Some(track) = engine.current_track() {
            host.set_metadata(Some(MediaMetadata::from(&track)));
        }
        host.set_playback_state(if engine.status().is_playing() {
            SessionPlaybackState::Playing
        } else {
            SessionPlaybackState::Paused
        });

        let skip = engine.config().media_session.skip_offset;
        for action in MediaAction::ALL {
            host.set_action_handler(action, Some(action_handler(Arc::downgrade(engine), action, skip)));
        }

        let listener = Arc::clone(&host);
        let source = Arc::downgrade(engine);
        let subscription = engine.subscribe(move |event| match event {
            PlayerEvent::TrackChange(track) => listener.set_metadata(Some(MediaMetadata::from(track))),
            PlayerEvent::Play => listener.set_playback_state(SessionPlaybackState::Playing),
            PlayerEvent::Pause | PlayerEvent::Ended | PlayerEvent::Error(_) => {
                listener.set_playback_state(SessionPlaybackState::Paused);
            }
            PlayerEvent::TimeUpdate {
                current_time,
                duration: Some(duration),
            } if duration.is_finite() && *duration > 0.0 => {
                let playback_rate = source
                    .upgrade()
                    .map_or(1.0, |engine| engine.state().playback_rate);
                listener.set_position_state(PositionState {
                    duration: *duration,
                    playback_rate,
                    position: current_time.clamp(0.0, *duration),
                });
            }
            PlayerEvent::Stopped => {
                listener.set_metadata(None);
                listener.set_playback_state(SessionPlaybackState::None);
            }
            _ => {}
        });

        Self {
            host: Some(host),
            subscription: Some(subscription),
            torn_down: AtomicBool::new(false),
        }
    }

    /// Whether a host capability is connected
    pub fn is_active(&self) -> bool {
        !self.torn_down.load(Ordering::SeqCst)
    }

    /// Clear metadata, reset the transport state and remove every handler.
    /// Safe to call more than once.
    pub fn teardown(&self) {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(subscription) = &self.subscription {
            subscription.unsubscribe();
        }
        if let Some(host) = &self.host {
            host.set_metadata(None);
            host.set_playback_state(SessionPlaybackState::None);
            for action in MediaAction::ALL {
                host.set_action_handler(action, None);
            }
        }
        debug!("Media session torn down");
    }
}

impl Drop for MediaSessionBridge {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn action_handler(engine: Weak<PlaybackEngine>, action: MediaAction, skip: f64) -> ActionHandler {
    Arc::new(move |details: &ActionDetails| {
        let Some(engine) = engine.upgrade() else {
            return;
        };
        match action {
            MediaAction::Play => {
                timer::spawn_detached("media session play", async move {
                    engine.play().await;
                });
            }
            MediaAction::Pause => engine.pause(),
            MediaAction::SeekTo => match details.seek_time {
                Some(time) => engine.seek_to(time),
                None => debug!("seekto without a time"),
            },
            MediaAction::SeekBackward => {
                let offset = details.seek_offset.unwrap_or(skip);
                engine.seek_to(engine.state().current_time - offset);
            }
            MediaAction::SeekForward => {
                let offset = details.seek_offset.unwrap_or(skip);
                engine.seek_to(engine.state().current_time + offset);
            }
        }
    })
}
