/// Time-coded text segments (caption lines, transcript entries)
use serde::{Deserialize, Serialize};

/// A span of text tied to a portion of a track
///
/// Supplied by the host page, ordered by `start`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Start, in seconds
    pub start: f64,

    /// End, in seconds
    pub end: f64,

    /// Caption or transcript text
    pub text: String,
}

impl Segment {
    /// Create a new segment
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    /// Length of the segment in seconds
    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }

    /// Whether `t` falls inside `[start, end)` with no tolerance applied
    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t < self.end
    }
}
