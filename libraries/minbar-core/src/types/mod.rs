mod checkpoint;
mod playback_state;
mod segment;
mod track;

pub use checkpoint::{CheckpointRecord, SavedTrackSnapshot};
pub use playback_state::{PlaybackState, PlaybackStatus};
pub use segment::Segment;
pub use track::{ResourceRef, Track};
