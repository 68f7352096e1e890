/// Persistence records: remote position checkpoints and the local track snapshot
use crate::types::ResourceRef;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A playback position sent to the position store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointRecord {
    /// Resource kind (`lesson`, `lecture`, ...)
    pub resource_type: String,

    /// Resource identifier
    pub resource_id: String,

    /// Position in seconds
    pub position: f64,
}

impl CheckpointRecord {
    /// Create a record for a resource
    pub fn new(resource: &ResourceRef, position: f64) -> Self {
        Self {
            resource_type: resource.resource_type.clone(),
            resource_id: resource.resource_id.clone(),
            position: position.max(0.0),
        }
    }

    /// The resource this record belongs to
    pub fn resource(&self) -> ResourceRef {
        ResourceRef::new(self.resource_type.clone(), self.resource_id.clone())
    }
}

/// What was playing, kept in local storage so a returning visit can show
/// "continue listening" before the device attaches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedTrackSnapshot {
    /// Track title
    pub title: String,

    /// Track author
    pub author: String,

    /// Artwork URL
    pub artwork: Option<String>,

    /// When the track was loaded
    pub timestamp: DateTime<Utc>,
}

impl SavedTrackSnapshot {
    /// Whether the snapshot is younger than `window` at `now`
    ///
    /// Snapshots from the future (clock skew) count as stale.
    pub fn is_fresh(&self, now: DateTime<Utc>, window: Duration) -> bool {
        let age = now.signed_duration_since(self.timestamp);
        age >= Duration::zero() && age < window
    }
}
