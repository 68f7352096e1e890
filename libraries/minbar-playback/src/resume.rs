//! "Continue listening" banner
//!
//! Decides from the locally saved snapshot alone, before any device is
//! attached, whether a returning visitor should be offered to pick up the
//! last track. Purely presentational: no network involved.

use crate::engine::PlaybackEngine;
use chrono::{DateTime, Duration, Utc};
use minbar_core::{SavedTrackSnapshot, SnapshotStore};
use tracing::warn;

/// Freshness-windowed view of the saved snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct ResumeBanner {
    snapshot: Option<SavedTrackSnapshot>,
    window: Duration,
}

impl ResumeBanner {
    /// Read the snapshot once from `store`
    ///
    /// A store error reads as "no snapshot".
    pub fn load(store: &dyn SnapshotStore, window: Duration) -> Self {
        let snapshot = store.load().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to read track snapshot");
            None
        });
        Self { snapshot, window }
    }

    /// Use the snapshot the engine read at start-up
    pub fn from_engine(engine: &PlaybackEngine) -> Self {
        Self {
            snapshot: engine.restored_snapshot().cloned(),
            window: engine.config().snapshot_freshness(),
        }
    }

    /// The snapshot to offer at `now`, if it is still fresh
    pub fn offer_at(&self, now: DateTime<Utc>) -> Option<&SavedTrackSnapshot> {
        self.snapshot
            .as_ref()
            .filter(|snapshot| snapshot.is_fresh(now, self.window))
    }

    /// The snapshot to offer right now, if any
    pub fn offer(&self) -> Option<&SavedTrackSnapshot> {
        self.offer_at(Utc::now())
    }
}
