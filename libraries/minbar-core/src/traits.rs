/// Collaborator traits for Minbar
///
/// These are the seams between the playback engine and the host application:
/// the server endpoints it talks to and the local storage it writes.
use crate::error::Result;
use crate::types::{CheckpointRecord, ResourceRef, SavedTrackSnapshot};
use async_trait::async_trait;

/// Remote store for playback positions
///
/// Implementers persist checkpoints for resumable resources. Callers treat
/// every failure as non-fatal: playback never waits on, or retries, a save.
#[async_trait]
pub trait PositionStore: Send + Sync {
    /// Persist a playback position
    async fn save(&self, record: &CheckpointRecord) -> Result<()>;

    /// Load the last saved position for a resource
    ///
    /// Returns `Ok(None)` when nothing was recorded.
    async fn load(&self, resource: &ResourceRef) -> Result<Option<f64>>;
}

/// Server-side "stop all audio" signal
#[async_trait]
pub trait StopAudioService: Send + Sync {
    /// Ask the server to clear its rendered player region
    ///
    /// Returns the server-rendered fragment the host page should apply, or
    /// `None` when the server answered without one.
    async fn clear_player(&self) -> Result<Option<String>>;
}

/// Local, per-client key-value storage for the last loaded track
///
/// Lives outside the server's reach (the browser's local storage in a web
/// host, a profile file on desktop).
pub trait SnapshotStore: Send + Sync {
    /// Read the stored snapshot, if any
    fn load(&self) -> Result<Option<SavedTrackSnapshot>>;

    /// Overwrite the stored snapshot
    fn save(&self, snapshot: &SavedTrackSnapshot) -> Result<()>;
}
