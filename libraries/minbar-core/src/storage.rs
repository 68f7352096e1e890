//! Built-in store implementations
//!
//! In-memory stores back offline hosts and tests; the JSON file store keeps the
//! track snapshot in a profile directory for desktop hosts.

use crate::error::{MinbarError, Result};
use crate::traits::{PositionStore, SnapshotStore};
use crate::types::{CheckpointRecord, ResourceRef, SavedTrackSnapshot};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-process position store
///
/// Keeps the latest position per resource and a log of every save in the
/// order it arrived.
#[derive(Debug, Default)]
pub struct MemoryPositionStore {
    positions: Mutex<HashMap<ResourceRef, f64>>,
    saves: Mutex<Vec<CheckpointRecord>>,
    failing: AtomicBool,
}

impl MemoryPositionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a position, as if saved by an earlier visit
    pub fn insert(&self, resource: ResourceRef, position: f64) {
        lock(&self.positions).insert(resource, position);
    }

    /// Latest stored position for a resource
    pub fn position_for(&self, resource: &ResourceRef) -> Option<f64> {
        lock(&self.positions).get(resource).copied()
    }

    /// Every record saved so far, oldest first
    pub fn saved_records(&self) -> Vec<CheckpointRecord> {
        lock(&self.saves).clone()
    }

    /// Make subsequent saves fail with a network error
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl PositionStore for MemoryPositionStore {
    async fn save(&self, record: &CheckpointRecord) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MinbarError::network("position store unavailable"));
        }
        lock(&self.saves).push(record.clone());
        lock(&self.positions).insert(record.resource(), record.position);
        Ok(())
    }

    async fn load(&self, resource: &ResourceRef) -> Result<Option<f64>> {
        Ok(self.position_for(resource))
    }
}

/// In-process snapshot store
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    snapshot: Mutex<Option<SavedTrackSnapshot>>,
}

impl MemorySnapshotStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds a snapshot
    pub fn with_snapshot(snapshot: SavedTrackSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(Some(snapshot)),
        }
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self) -> Result<Option<SavedTrackSnapshot>> {
        Ok(lock(&self.snapshot).clone())
    }

    fn save(&self, snapshot: &SavedTrackSnapshot) -> Result<()> {
        *lock(&self.snapshot) = Some(snapshot.clone());
        Ok(())
    }
}

/// Snapshot store backed by a single JSON document on disk
///
/// A missing file reads as "no snapshot". So does a corrupt one: the snapshot
/// only drives a convenience banner and is overwritten on the next load.
#[derive(Debug, Clone)]
pub struct JsonFileSnapshotStore {
    path: PathBuf,
}

impl JsonFileSnapshotStore {
    /// Create a store at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// File the snapshot is written to
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for JsonFileSnapshotStore {
    fn load(&self) -> Result<Option<SavedTrackSnapshot>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&raw) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring unreadable track snapshot");
                Ok(None)
            }
        }
    }

    fn save(&self, snapshot: &SavedTrackSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(snapshot)?;
        std::fs::write(&self.path, json)?;
        debug!(path = %self.path.display(), title = %snapshot.title, "Saved track snapshot");
        Ok(())
    }
}
