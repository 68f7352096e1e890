//! Toggle outlets
//!
//! A play/pause button anywhere on the page that both reflects and drives a
//! shared engine without owning it. Buttons may mount long after playback
//! started, so connecting pushes the current state right away.

use crate::engine::PlaybackEngine;
use crate::events::{PlayerEvent, Subscription};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::debug;

/// The rendering side of a toggle button
pub trait ToggleOutlet: Send + Sync {
    /// Show the button as pressed (playing) or not
    fn set_pressed(&self, pressed: bool);
}

/// A connected toggle button
///
/// Created with [`SessionRegistry::connect_toggle`](crate::SessionRegistry::connect_toggle).
/// Dropping it disconnects.
pub struct PlayToggle {
    engine: Weak<PlaybackEngine>,
    outlet: Arc<dyn ToggleOutlet>,
    subscription: Mutex<Option<Subscription>>,
}

impl PlayToggle {
    pub(crate) fn connect(engine: &Arc<PlaybackEngine>, outlet: Arc<dyn ToggleOutlet>) -> Arc<Self> {
        outlet.set_pressed(engine.status().is_playing());

        let listener = Arc::clone(&outlet);
        let subscription = engine.subscribe(move |event| match event {
            PlayerEvent::Play => listener.set_pressed(true),
            PlayerEvent::Pause | PlayerEvent::Ended | PlayerEvent::Stopped | PlayerEvent::Error(_) => {
                listener.set_pressed(false);
            }
            _ => {}
        });

        Arc::new(Self {
            engine: Arc::downgrade(engine),
            outlet,
            subscription: Mutex::new(Some(subscription)),
        })
    }

    fn subscription(&self) -> MutexGuard<'_, Option<Subscription>> {
        self.subscription.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Play if paused, pause if playing
    pub async fn toggle(&self) {
        if !self.is_connected() {
            debug!("Toggle pressed after disconnect");
            return;
        }
        if let Some(engine) = self.engine.upgrade() {
            engine.toggle_play().await;
        }
    }

    /// Stop reflecting the engine. Safe to call more than once.
    pub fn disconnect(&self) {
        if let Some(subscription) = self.subscription().take() {
            subscription.unsubscribe();
        }
    }

    pub fn is_connected(&self) -> bool {
        self.subscription().is_some()
    }

    pub(crate) fn show_unpressed(&self) {
        self.outlet.set_pressed(false);
    }
}

impl std::fmt::Debug for PlayToggle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayToggle")
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}
