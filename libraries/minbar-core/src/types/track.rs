/// Track and resource identity types
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a resumable resource on the host application
///
/// A lesson, lecture or book chapter whose playback position is remembered
/// across page loads, e.g. `lesson/7`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    /// Resource kind as the host application names it (`lesson`, `lecture`, ...)
    pub resource_type: String,

    /// Resource identifier within its kind
    pub resource_id: String,
}

impl ResourceRef {
    /// Create a new resource reference
    pub fn new(resource_type: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.resource_type, self.resource_id)
    }
}

/// What is currently loaded into the player
///
/// Replaced wholesale on every track change. Only `duration` is filled in
/// after loading, once the device reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Track identifier
    pub id: String,

    /// Display title
    pub title: String,

    /// Speaker or author
    pub author: String,

    /// Artwork image URL
    pub artwork_url: Option<String>,

    /// Audio source URL
    pub audio_url: String,

    /// Duration in seconds, unknown until the device reports it
    pub duration: Option<f64>,

    /// Resumable resource this track belongs to
    pub resource: Option<ResourceRef>,
}

impl Track {
    /// Create a track with just an id and an audio source
    pub fn new(id: impl Into<String>, audio_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            author: String::new(),
            artwork_url: None,
            audio_url: audio_url.into(),
            duration: None,
            resource: None,
        }
    }

    /// Set the display title
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the author
    #[must_use]
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// Set the artwork URL
    #[must_use]
    pub fn with_artwork(mut self, artwork_url: impl Into<String>) -> Self {
        self.artwork_url = Some(artwork_url.into());
        self
    }

    /// Attach the resumable resource
    #[must_use]
    pub fn with_resource(mut self, resource: ResourceRef) -> Self {
        self.resource = Some(resource);
        self
    }

    /// A track without an audio source cannot be loaded
    pub fn is_playable(&self) -> bool {
        !self.audio_url.trim().is_empty()
    }
}
