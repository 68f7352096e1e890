//! Shared fixtures for integration tests
#![allow(dead_code)]

use minbar_core::{Segment, Track};
use minbar_playback::media_session::{
    ActionDetails, ActionHandler, MediaAction, MediaMetadata, PositionState, SessionPlaybackState,
};
use minbar_playback::scroll::{ContainerMetrics, ItemMetrics, PlayerBounds};
use minbar_playback::sync::{CaptionSurface, SegmentView, ViewportHost};
use minbar_playback::{
    MediaSessionHost, PlaybackEngine, PlayerEvent, SimulatedDevice, Subscription, ToggleOutlet,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Once};

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
            )
            .try_init();
    });
}

pub fn engine() -> (Arc<PlaybackEngine>, Arc<SimulatedDevice>) {
    init_tracing();
    let device = Arc::new(SimulatedDevice::new());
    let engine = PlaybackEngine::builder(device.clone()).build();
    (engine, device)
}

pub fn lesson_track(id: &str) -> Track {
    Track::new(format!("lesson-{id}"), format!("https://cdn.example.com/lessons/{id}.mp3"))
        .with_title(format!("Lesson {id}"))
        .with_author("Sheikh Example")
        .with_artwork("https://cdn.example.com/art.jpg")
}

pub fn transcript() -> Vec<Segment> {
    (0..10)
        .map(|i| {
            let start = f64::from(i) * 5.0;
            Segment::new(start, start + 5.0, format!("line {i}"))
        })
        .collect()
}

/// Records every engine event
pub struct EventLog {
    events: Arc<Mutex<Vec<PlayerEvent>>>,
    _subscription: Subscription,
}

impl EventLog {
    pub fn attach(engine: &PlaybackEngine) -> Self {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let subscription = engine.subscribe(move |event| sink.lock().unwrap().push(event.clone()));
        Self {
            events,
            _subscription: subscription,
        }
    }

    pub fn events(&self) -> Vec<PlayerEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, wanted: &PlayerEvent) -> usize {
        self.events().iter().filter(|e| *e == wanted).count()
    }
}

/// Segment list that records what it was told
#[derive(Default)]
pub struct RecordingView {
    pub active: Mutex<Vec<Option<usize>>>,
    pub flashes: Mutex<Vec<(usize, bool)>>,
    pub scrolls: Mutex<Vec<f64>>,
    pub row_height: f64,
}

impl RecordingView {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            row_height: 40.0,
            ..Self::default()
        })
    }

    pub fn last_active(&self) -> Option<usize> {
        self.active.lock().unwrap().last().copied().flatten()
    }
}

impl SegmentView for RecordingView {
    fn set_active(&self, index: Option<usize>) {
        self.active.lock().unwrap().push(index);
    }

    fn set_flash(&self, index: usize, on: bool) {
        self.flashes.lock().unwrap().push((index, on));
    }

    fn container_metrics(&self) -> Option<ContainerMetrics> {
        Some(ContainerMetrics {
            scroll_top: self.scrolls.lock().unwrap().last().copied().unwrap_or(0.0),
            client_height: 200.0,
            scroll_height: 10.0 * self.row_height,
        })
    }

    fn segment_metrics(&self, index: usize) -> Option<ItemMetrics> {
        Some(ItemMetrics {
            offset_top: index as f64 * self.row_height,
            height: self.row_height,
        })
    }

    fn scroll_container_to(&self, scroll_top: f64) {
        self.scrolls.lock().unwrap().push(scroll_top);
    }
}

/// Caption overlay that records lines and cue installs
#[derive(Default)]
pub struct RecordingCaptions {
    pub native: bool,
    pub installed: Mutex<Vec<Segment>>,
    pub shown: Mutex<Vec<Option<String>>>,
}

impl RecordingCaptions {
    pub fn manual() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn native() -> Arc<Self> {
        Arc::new(Self {
            native: true,
            ..Self::default()
        })
    }
}

impl CaptionSurface for RecordingCaptions {
    fn supports_native_cues(&self) -> bool {
        self.native
    }

    fn install_cues(&self, segments: &[Segment]) {
        self.installed.lock().unwrap().extend_from_slice(segments);
    }

    fn show_text(&self, text: Option<&str>) {
        self.shown.lock().unwrap().push(text.map(str::to_string));
    }
}

/// Window with a player at a fixed spot
pub struct RecordingViewport {
    pub bounds: PlayerBounds,
    pub height: f64,
    pub nudges: Mutex<Vec<f64>>,
}

impl RecordingViewport {
    pub fn with_player_at(top: f64, bottom: f64) -> Arc<Self> {
        Arc::new(Self {
            bounds: PlayerBounds { top, bottom },
            height: 800.0,
            nudges: Mutex::new(Vec::new()),
        })
    }
}

impl ViewportHost for RecordingViewport {
    fn player_bounds(&self) -> Option<PlayerBounds> {
        Some(self.bounds)
    }

    fn viewport_height(&self) -> f64 {
        self.height
    }

    fn scroll_window_by(&self, delta: f64) {
        self.nudges.lock().unwrap().push(delta);
    }
}

/// OS media session stand-in
#[derive(Default)]
pub struct FakeMediaSession {
    pub metadata: Mutex<Option<MediaMetadata>>,
    pub state: Mutex<Option<SessionPlaybackState>>,
    pub positions: Mutex<Vec<PositionState>>,
    pub handlers: Mutex<HashMap<MediaAction, ActionHandler>>,
}

impl FakeMediaSession {
    pub fn trigger(&self, action: MediaAction, details: ActionDetails) {
        let handler = self.handlers.lock().unwrap().get(&action).cloned();
        if let Some(handler) = handler {
            handler(&details);
        }
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.lock().unwrap().len()
    }
}

impl MediaSessionHost for FakeMediaSession {
    fn set_metadata(&self, metadata: Option<MediaMetadata>) {
        *self.metadata.lock().unwrap() = metadata;
    }

    fn set_playback_state(&self, state: SessionPlaybackState) {
        *self.state.lock().unwrap() = Some(state);
    }

    fn set_position_state(&self, state: PositionState) {
        self.positions.lock().unwrap().push(state);
    }

    fn set_action_handler(&self, action: MediaAction, handler: Option<ActionHandler>) {
        let mut handlers = self.handlers.lock().unwrap();
        match handler {
            Some(handler) => {
                handlers.insert(action, handler);
            }
            None => {
                handlers.remove(&action);
            }
        }
    }
}

/// Toggle button that remembers its pressed state
#[derive(Default)]
pub struct FakeButton {
    pub pressed: Mutex<Vec<bool>>,
}

impl FakeButton {
    pub fn is_pressed(&self) -> Option<bool> {
        self.pressed.lock().unwrap().last().copied()
    }
}

impl ToggleOutlet for FakeButton {
    fn set_pressed(&self, pressed: bool) {
        self.pressed.lock().unwrap().push(pressed);
    }
}
