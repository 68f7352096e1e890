//! Playback engine - state machine and event hub
//!
//! Owns the current track and the playback state, drives the device, and
//! re-emits normalized [`PlayerEvent`]s to any number of observers.
//!
//! Status flow: `Idle -> Loading -> Ready -> Playing <-> Paused -> Ended`.
//! `Errored` is reachable from loading and playback and sticks until the next
//! load. `stop()` returns to `Idle` from anywhere.
//!
//! No engine lock is held while the device is commanded or while events are
//! delivered, so observers may call back into the engine.

use crate::config::PlayerConfig;
use crate::device::{DeviceEvent, PlaybackDevice};
use crate::events::{EventBus, PlayerEvent, Subscription};
use crate::loading::LoadingGate;
use crate::registry::{EngineId, SessionRegistry};
use crate::timer;
use crate::volume::Volume;
use chrono::Utc;
use minbar_core::{PlaybackState, PlaybackStatus, SavedTrackSnapshot, SnapshotStore, Track};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, info, warn};

#[derive(Debug)]
struct EngineInner {
    state: PlaybackState,
    track: Option<Track>,
    volume: Volume,
    /// Start playing once the loading skeleton goes away
    autoplay_pending: bool,
    /// Bumped on every load and stop so late callbacks can detect staleness
    load_generation: u64,
    destroyed: bool,
}

/// Builder for [`PlaybackEngine`]
pub struct PlaybackEngineBuilder {
    device: Arc<dyn PlaybackDevice>,
    registry: Option<Arc<SessionRegistry>>,
    snapshots: Option<Arc<dyn SnapshotStore>>,
    config: PlayerConfig,
}

impl PlaybackEngineBuilder {
    /// Coordinate with the other players on the page
    #[must_use]
    pub fn registry(mut self, registry: Arc<SessionRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Remember loaded tracks for the "continue listening" banner
    #[must_use]
    pub fn snapshot_store(mut self, store: Arc<dyn SnapshotStore>) -> Self {
        self.snapshots = Some(store);
        self
    }

    #[must_use]
    pub fn config(mut self, config: PlayerConfig) -> Self {
        self.config = config;
        self
    }

    /// Attach to the device and register with the registry
    pub fn build(self) -> Arc<PlaybackEngine> {
        let restored_snapshot = self.snapshots.as_ref().and_then(|store| match store.load() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Failed to read track snapshot");
                None
            }
        });

        let id = EngineId::new();
        let device = self.device;
        let engine = Arc::new_cyclic(|this: &Weak<PlaybackEngine>| {
            let handler_target = this.clone();
            let device_subscription = device.subscribe(Box::new(move |event| {
                if let Some(engine) = handler_target.upgrade() {
                    engine.handle_device_event(event);
                }
            }));

            PlaybackEngine {
                id,
                device: Arc::clone(&device),
                registry: self.registry,
                snapshots: self.snapshots,
                gate: LoadingGate::new(self.config.minimum_loading()),
                inner: Mutex::new(EngineInner {
                    state: PlaybackState::default(),
                    track: None,
                    volume: Volume::new(self.config.engine.unmute_volume),
                    autoplay_pending: false,
                    load_generation: 0,
                    destroyed: false,
                }),
                config: self.config,
                events: EventBus::new(),
                device_subscription: Mutex::new(Some(device_subscription)),
                restored_snapshot,
                this: this.clone(),
            }
        });

        if let Some(registry) = &engine.registry {
            registry.register(id, &engine.device);
        }
        info!(engine = %id, "Playback engine ready");
        engine
    }
}

/// Playback engine
///
/// Always handled through `Arc`; see [`PlaybackEngine::builder`].
pub struct PlaybackEngine {
    id: EngineId,
    device: Arc<dyn PlaybackDevice>,
    registry: Option<Arc<SessionRegistry>>,
    snapshots: Option<Arc<dyn SnapshotStore>>,
    config: PlayerConfig,
    events: EventBus<PlayerEvent>,
    gate: LoadingGate,
    inner: Mutex<EngineInner>,
    device_subscription: Mutex<Option<Subscription>>,
    restored_snapshot: Option<SavedTrackSnapshot>,
    this: Weak<PlaybackEngine>,
}

impl PlaybackEngine {
    /// Start building an engine around `device`
    pub fn builder(device: Arc<dyn PlaybackDevice>) -> PlaybackEngineBuilder {
        PlaybackEngineBuilder {
            device,
            registry: None,
            snapshots: None,
            config: PlayerConfig::default(),
        }
    }

    fn inner(&self) -> MutexGuard<'_, EngineInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ===== Loading =====

    /// Load a track without starting it
    ///
    /// An unplayable track (empty source) is logged and ignored.
    pub fn load_track(&self, track: Track) {
        self.begin_load(track, false);
    }

    /// Load a track and start it once the loading skeleton goes away
    pub fn play_track(&self, track: Track) {
        self.begin_load(track, true);
    }

    fn begin_load(&self, track: Track, autoplay: bool) {
        if !track.is_playable() {
            warn!(track_id = %track.id, "Ignoring track without a source");
            return;
        }

        {
            let mut inner = self.inner();
            if inner.destroyed {
                warn!(engine = %self.id, "Ignoring load on a destroyed engine");
                return;
            }
            inner.load_generation += 1;
            inner.autoplay_pending = autoplay;
            inner.track = Some(track.clone());
            inner.state.status = PlaybackStatus::Loading;
            inner.state.current_time = 0.0;
            inner.state.duration = track.duration;
            inner.state.is_loading = true;
        }

        if let Some(registry) = &self.registry {
            registry.claim(self.id);
        }

        debug!(track_id = %track.id, autoplay, "Loading track");
        self.gate.begin();
        self.save_snapshot(&track);
        let src = track.audio_url.clone();
        self.events.emit(PlayerEvent::TrackChange(track));
        self.events.emit(PlayerEvent::LoadingChanged(true));
        self.device.load(&src);
    }

    fn save_snapshot(&self, track: &Track) {
        let Some(store) = &self.snapshots else {
            return;
        };
        let snapshot = SavedTrackSnapshot {
            title: track.title.clone(),
            author: track.author.clone(),
            artwork: track.artwork_url.clone(),
            timestamp: Utc::now(),
        };
        if let Err(e) = store.save(&snapshot) {
            warn!(error = %e, "Failed to save track snapshot");
        }
    }

    /// Runs when the loading skeleton hides after a load became playable
    fn finish_loading(&self, generation: u64) {
        let autoplay = {
            let mut inner = self.inner();
            if inner.load_generation != generation || !inner.state.is_loading {
                return;
            }
            inner.state.is_loading = false;
            std::mem::take(&mut inner.autoplay_pending)
        };

        self.events.emit(PlayerEvent::LoadingChanged(false));

        if autoplay {
            if let Some(engine) = self.this.upgrade() {
                timer::spawn_detached("autoplay", async move {
                    let current = engine.inner().load_generation == generation;
                    if current {
                        engine.play().await;
                    } else {
                        debug!("Autoplay dropped, another track was loaded");
                    }
                });
            }
        }
    }

    // ===== Playback Control =====

    /// Start or resume playback
    ///
    /// A rejected start (autoplay policy, missing source) is logged, and the
    /// engine simply stays paused. While loading, playback is deferred until
    /// the track is ready.
    pub async fn play(&self) {
        {
            let mut inner = self.inner();
            match inner.state.status {
                PlaybackStatus::Playing => {
                    debug!("Already playing");
                    return;
                }
                PlaybackStatus::Idle | PlaybackStatus::Errored => {
                    debug!(status = %inner.state.status, "Nothing playable loaded");
                    return;
                }
                PlaybackStatus::Loading => {
                    inner.autoplay_pending = true;
                    return;
                }
                PlaybackStatus::Ready | PlaybackStatus::Paused | PlaybackStatus::Ended => {}
            }
        }

        if let Some(registry) = &self.registry {
            registry.claim(self.id);
        }

        if let Err(e) = self.device.play().await {
            warn!(engine = %self.id, error = %e, "Playback was rejected");
        }
    }

    /// Pause playback
    ///
    /// While loading, this cancels a pending auto-play.
    pub fn pause(&self) {
        {
            let mut inner = self.inner();
            match inner.state.status {
                PlaybackStatus::Playing => {}
                PlaybackStatus::Loading => {
                    if std::mem::take(&mut inner.autoplay_pending) {
                        debug!(engine = %self.id, "Auto-play cancelled by pause");
                    }
                }
                _ => {
                    debug!("Already paused");
                    return;
                }
            }
        }
        self.device.pause();
    }

    /// Pause if playing, play otherwise
    pub async fn toggle_play(&self) {
        if self.status().is_playing() {
            self.pause();
        } else {
            self.play().await;
        }
    }

    /// End the session: pause, release the source and return to idle
    ///
    /// Attached UI is told to hide through [`PlayerEvent::Stopped`].
    pub fn stop(&self) {
        self.device.pause();
        self.gate.cancel();
        self.device.release();

        {
            let mut inner = self.inner();
            inner.load_generation += 1;
            inner.autoplay_pending = false;
            inner.track = None;
            inner.state.status = PlaybackStatus::Idle;
            inner.state.current_time = 0.0;
            inner.state.duration = None;
            inner.state.is_loading = false;
        }

        info!(engine = %self.id, "Playback stopped");
        self.events.emit(PlayerEvent::Stopped);
    }

    /// Stop and tear down
    ///
    /// Device listeners are detached and every subscriber dropped before this
    /// returns. The engine ignores further loads.
    pub fn destroy(&self) {
        if self.inner().destroyed {
            return;
        }
        self.stop();

        if let Some(subscription) = self
            .device_subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            subscription.unsubscribe();
        }
        if let Some(registry) = &self.registry {
            registry.unregister(self.id);
        }
        self.events.clear();
        self.inner().destroyed = true;
        debug!(engine = %self.id, "Playback engine destroyed");
    }

    // ===== Seek =====

    /// Seek to a percentage (0-100) of the duration
    ///
    /// No-op while the duration is unknown.
    pub fn seek_percent(&self, percent: f64) {
        let Some(duration) = self.known_duration() else {
            debug!(percent, "Seek ignored, duration unknown");
            return;
        };
        let percent = if percent.is_nan() { 0.0 } else { percent.clamp(0.0, 100.0) };
        self.seek_to(percent / 100.0 * duration);
    }

    /// Seek to an absolute position in seconds, clamped to the track
    pub fn seek_to(&self, position: f64) {
        if !position.is_finite() {
            warn!(position, "Ignoring non-finite seek");
            return;
        }
        let status = self.status();
        if !status.has_media() && status != PlaybackStatus::Loading {
            debug!(%status, "Seek ignored, nothing loaded");
            return;
        }
        let upper = self.known_duration().unwrap_or(f64::MAX);
        self.device.seek(position.clamp(0.0, upper));
    }

    fn known_duration(&self) -> Option<f64> {
        let duration = self.inner().state.duration;
        duration
            .or_else(|| self.device.duration())
            .filter(|d| d.is_finite() && *d > 0.0)
    }

    // ===== Volume, Loop, Rate =====

    /// Set volume (0.0 - 1.0); zero mutes
    pub fn set_volume(&self, volume: f64) {
        let (level, muted) = {
            let mut inner = self.inner();
            inner.volume.set(volume);
            Self::sync_volume(&mut inner)
        };
        self.device.set_volume(level);
        self.events.emit(PlayerEvent::VolumeChange { volume: level, muted });
    }

    /// Mute, or restore the level from before muting
    pub fn toggle_mute(&self) {
        let (level, muted) = {
            let mut inner = self.inner();
            inner.volume.toggle_mute();
            Self::sync_volume(&mut inner)
        };
        self.device.set_volume(level);
        self.events.emit(PlayerEvent::VolumeChange { volume: level, muted });
    }

    fn sync_volume(inner: &mut EngineInner) -> (f64, bool) {
        inner.state.volume = inner.volume.level();
        inner.state.is_muted = inner.volume.is_muted();
        (inner.state.volume, inner.state.is_muted)
    }

    /// Toggle looping of the current track
    pub fn toggle_loop(&self) {
        let looping = {
            let mut inner = self.inner();
            inner.state.is_looping = !inner.state.is_looping;
            inner.state.is_looping
        };
        self.device.set_loop(looping);
        self.events.emit(PlayerEvent::LoopChange(looping));
    }

    /// Set playback speed (1.0 = normal)
    pub fn set_playback_rate(&self, rate: f64) {
        if !rate.is_finite() || rate <= 0.0 {
            warn!(rate, "Ignoring invalid playback rate");
            return;
        }
        self.inner().state.playback_rate = rate;
        self.device.set_playback_rate(rate);
        self.events.emit(PlayerEvent::RateChange(rate));
    }

    // ===== State =====

    /// Snapshot of the playback state
    pub fn state(&self) -> PlaybackState {
        self.inner().state.clone()
    }

    pub fn status(&self) -> PlaybackStatus {
        self.inner().state.status
    }

    /// The loaded track, with its duration once known
    pub fn current_track(&self) -> Option<Track> {
        self.inner().track.clone()
    }

    /// Track snapshot read from the snapshot store at construction
    pub fn restored_snapshot(&self) -> Option<&SavedTrackSnapshot> {
        self.restored_snapshot.as_ref()
    }

    pub fn id(&self) -> EngineId {
        self.id
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner().destroyed
    }

    /// Observe engine events
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&PlayerEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(handler)
    }

    // ===== Device Events =====

    fn handle_device_event(&self, event: &DeviceEvent) {
        match event {
            DeviceEvent::LoadStart => self.events.emit(PlayerEvent::LoadStart),

            DeviceEvent::DurationChange(duration) => {
                {
                    let mut inner = self.inner();
                    inner.state.duration = Some(*duration);
                    if let Some(track) = inner.track.as_mut() {
                        track.duration = Some(*duration);
                    }
                }
                self.events.emit(PlayerEvent::DurationChange(*duration));
            }

            DeviceEvent::CanPlay => self.on_can_play(),

            DeviceEvent::Play => {
                if self.transition(|status| {
                    (status != PlaybackStatus::Playing && status != PlaybackStatus::Errored)
                        .then_some(PlaybackStatus::Playing)
                }) {
                    self.events.emit(PlayerEvent::Play);
                }
            }

            DeviceEvent::Pause => {
                if self.transition(|status| status.is_playing().then_some(PlaybackStatus::Paused)) {
                    self.events.emit(PlayerEvent::Pause);
                }
            }

            DeviceEvent::TimeUpdate(time) => {
                let duration = {
                    let mut inner = self.inner();
                    inner.state.current_time = *time;
                    inner.state.duration
                };
                self.events.emit(PlayerEvent::TimeUpdate {
                    current_time: *time,
                    duration,
                });
            }

            DeviceEvent::Seeking => {}

            DeviceEvent::Seeked(time) => {
                {
                    let mut inner = self.inner();
                    inner.state.current_time = *time;
                    let before_end = inner.state.duration.is_some_and(|d| *time < d);
                    if inner.state.status == PlaybackStatus::Ended && before_end {
                        inner.state.status = PlaybackStatus::Paused;
                    }
                }
                self.events.emit(PlayerEvent::Seeked(*time));
            }

            DeviceEvent::Ended => {
                if self.transition(|status| {
                    (status != PlaybackStatus::Ended && status != PlaybackStatus::Errored)
                        .then_some(PlaybackStatus::Ended)
                }) {
                    debug!(engine = %self.id, "Track ended");
                    self.events.emit(PlayerEvent::Ended);
                }
            }

            DeviceEvent::VolumeChange(volume) => {
                // External volume changes (OS mixer, native controls)
                let changed = {
                    let mut inner = self.inner();
                    if (inner.state.volume - volume).abs() > f64::EPSILON {
                        inner.volume.set(*volume);
                        Some(Self::sync_volume(&mut inner))
                    } else {
                        None
                    }
                };
                if let Some((volume, muted)) = changed {
                    self.events.emit(PlayerEvent::VolumeChange { volume, muted });
                }
            }

            DeviceEvent::RateChange(rate) => {
                let changed = {
                    let mut inner = self.inner();
                    let changed = (inner.state.playback_rate - rate).abs() > f64::EPSILON;
                    inner.state.playback_rate = *rate;
                    changed
                };
                if changed {
                    self.events.emit(PlayerEvent::RateChange(*rate));
                }
            }

            DeviceEvent::Error(error) => {
                let was_loading = {
                    let mut inner = self.inner();
                    inner.state.status = PlaybackStatus::Errored;
                    inner.autoplay_pending = false;
                    std::mem::replace(&mut inner.state.is_loading, false)
                };
                warn!(engine = %self.id, error = %error, "Playback device failed");
                self.gate.cancel();
                if was_loading {
                    self.events.emit(PlayerEvent::LoadingChanged(false));
                }
                self.events.emit(PlayerEvent::Error(error.to_string()));
            }
        }
    }

    fn on_can_play(&self) {
        let pending = {
            let mut inner = self.inner();
            if inner.state.status == PlaybackStatus::Loading {
                inner.state.status = PlaybackStatus::Ready;
            }
            inner.state.is_loading.then_some(inner.load_generation)
        };

        self.events.emit(PlayerEvent::CanPlay);

        if let Some(generation) = pending {
            let this = self.this.clone();
            self.gate.complete(move || {
                if let Some(engine) = this.upgrade() {
                    engine.finish_loading(generation);
                }
            });
        }
    }

    /// Apply a status transition; returns whether the status changed
    fn transition(&self, next: impl FnOnce(PlaybackStatus) -> Option<PlaybackStatus>) -> bool {
        let mut inner = self.inner();
        match next(inner.state.status) {
            Some(status) => {
                inner.state.status = status;
                true
            }
            None => false,
        }
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        if let Some(registry) = &self.registry {
            registry.unregister(self.id);
        }
    }
}

impl std::fmt::Debug for PlaybackEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackEngine")
            .field("id", &self.id)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceCall, DeviceError, SimulatedDevice};
    use minbar_core::MemorySnapshotStore;
    use std::time::Duration;

    fn engine_with_device() -> (Arc<PlaybackEngine>, Arc<SimulatedDevice>) {
        let device = Arc::new(SimulatedDevice::new());
        let engine = PlaybackEngine::builder(device.clone()).build();
        (engine, device)
    }

    fn record(engine: &PlaybackEngine) -> (Arc<Mutex<Vec<PlayerEvent>>>, Subscription) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_clone = Arc::clone(&log);
        let sub = engine.subscribe(move |event| log_clone.lock().unwrap().push(event.clone()));
        (log, sub)
    }

    fn track() -> Track {
        Track::new("lesson-7", "https://cdn.example.com/lesson-7.mp3").with_title("Lesson 7")
    }

    #[tokio::test(start_paused = true)]
    async fn load_sets_loading_and_emits_track_change() {
        let (engine, device) = engine_with_device();
        let (log, _sub) = record(&engine);

        engine.load_track(track());

        assert_eq!(engine.status(), PlaybackStatus::Loading);
        assert_eq!(engine.state().current_time, 0.0);
        assert_eq!(device.src().as_deref(), Some("https://cdn.example.com/lesson-7.mp3"));
        let events = log.lock().unwrap().clone();
        assert!(matches!(events[0], PlayerEvent::TrackChange(_)));
        assert_eq!(events[1], PlayerEvent::LoadingChanged(true));
        assert_eq!(events[2], PlayerEvent::LoadStart);
    }

    #[test]
    fn empty_source_is_ignored() {
        let (engine, device) = engine_with_device();
        let (log, _sub) = record(&engine);

        engine.load_track(Track::new("broken", "  "));

        assert_eq!(engine.status(), PlaybackStatus::Idle);
        assert!(engine.current_track().is_none());
        assert!(device.calls().is_empty());
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn can_play_moves_to_ready_never_playing() {
        let (engine, device) = engine_with_device();
        engine.load_track(track());
        device.finish_loading(120.0);

        assert_eq!(engine.status(), PlaybackStatus::Ready);
        assert_eq!(engine.current_track().unwrap().duration, Some(120.0));
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(engine.status(), PlaybackStatus::Ready);
        assert!(!engine.state().is_loading);
    }

    #[tokio::test(start_paused = true)]
    async fn play_track_starts_after_loading_gate() {
        let (engine, device) = engine_with_device();
        engine.play_track(track());
        device.finish_loading(120.0);

        tokio::time::sleep(Duration::from_millis(900)).await;
        assert_eq!(engine.status(), PlaybackStatus::Ready);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(engine.status(), PlaybackStatus::Playing);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_while_loading_cancels_autoplay() {
        let (engine, device) = engine_with_device();
        engine.play_track(track());
        engine.pause();
        assert!(device.calls().contains(&DeviceCall::Pause));

        device.finish_loading(300.0);
        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert_eq!(engine.status(), PlaybackStatus::Ready);
        assert!(!engine.state().is_loading);
    }

    #[tokio::test(start_paused = true)]
    async fn autoplay_is_dropped_when_another_track_loads_first() {
        let device = Arc::new(SimulatedDevice::new());
        let mut config = PlayerConfig::default();
        config.engine.minimum_loading_ms = 0;
        let engine = PlaybackEngine::builder(device.clone()).config(config).build();

        engine.play_track(track());
        device.finish_loading(120.0);
        engine.load_track(Track::new("lesson-8", "https://cdn.example.com/lesson-8.mp3"));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(engine.status(), PlaybackStatus::Loading);

        device.finish_loading(90.0);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(engine.status(), PlaybackStatus::Ready);
        assert!(!device.calls().contains(&DeviceCall::Play));
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_play_and_pause_emit_once() {
        let (engine, device) = engine_with_device();
        engine.load_track(track());
        device.finish_loading(60.0);
        let (log, _sub) = record(&engine);

        engine.play().await;
        engine.play().await;
        engine.pause();
        engine.pause();

        let transport: Vec<_> = log
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, PlayerEvent::Play | PlayerEvent::Pause))
            .cloned()
            .collect();
        assert_eq!(transport, vec![PlayerEvent::Play, PlayerEvent::Pause]);
    }

    #[tokio::test]
    async fn rejected_play_is_swallowed() {
        let (engine, device) = engine_with_device();
        engine.load_track(track());
        device.finish_loading(60.0);
        device.block_autoplay(true);

        engine.play().await;

        assert_eq!(engine.status(), PlaybackStatus::Ready);
    }

    #[test]
    fn seek_percent_without_duration_is_noop() {
        let (engine, device) = engine_with_device();
        engine.load_track(track());
        device.clear_calls();

        engine.seek_percent(50.0);

        assert!(device.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn seek_percent_converts_to_seconds() {
        let (engine, device) = engine_with_device();
        engine.load_track(track());
        device.finish_loading(200.0);

        engine.seek_percent(25.0);

        assert_eq!(device.calls().last(), Some(&DeviceCall::Seek(50.0)));
        assert_eq!(engine.state().current_time, 50.0);
    }

    #[test]
    fn mute_round_trip_restores_previous_volume() {
        let (engine, device) = engine_with_device();
        engine.set_volume(0.8);
        engine.set_volume(0.0);
        assert!(engine.state().is_muted);

        engine.toggle_mute();
        assert_eq!(engine.state().volume, 0.8);
        assert_eq!(device.volume(), 0.8);
        assert!(!engine.state().is_muted);
    }

    #[test]
    fn unmute_without_history_defaults_to_half() {
        let (engine, _device) = engine_with_device();
        engine.set_volume(0.0);
        engine.toggle_mute();
        assert_eq!(engine.state().volume, 0.5);
    }

    #[tokio::test(start_paused = true)]
    async fn device_error_is_terminal_until_next_load() {
        let (engine, device) = engine_with_device();
        engine.load_track(track());
        device.fail(DeviceError::Decode);
        assert_eq!(engine.status(), PlaybackStatus::Errored);
        assert!(!engine.state().is_loading);

        engine.play().await;
        assert_eq!(engine.status(), PlaybackStatus::Errored);

        engine.load_track(track());
        assert_eq!(engine.status(), PlaybackStatus::Loading);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_returns_to_idle_and_releases() {
        let (engine, device) = engine_with_device();
        engine.load_track(track());
        device.finish_loading(60.0);
        engine.play().await;
        let (log, _sub) = record(&engine);

        engine.stop();

        assert_eq!(engine.status(), PlaybackStatus::Idle);
        assert!(device.calls().contains(&DeviceCall::Release));
        assert_eq!(
            *log.lock().unwrap(),
            vec![PlayerEvent::Pause, PlayerEvent::Stopped]
        );
    }

    #[test]
    fn destroy_detaches_device_listeners() {
        let (engine, device) = engine_with_device();
        assert_eq!(device.listener_count(), 1);

        engine.destroy();
        engine.destroy();

        assert_eq!(device.listener_count(), 0);
        assert!(engine.is_destroyed());
        engine.load_track(track());
        assert_eq!(engine.status(), PlaybackStatus::Idle);
    }

    #[test]
    fn snapshot_written_on_load_and_read_on_build() {
        let store = Arc::new(MemorySnapshotStore::new());
        let device = Arc::new(SimulatedDevice::new());
        let first = PlaybackEngine::builder(device.clone())
            .snapshot_store(store.clone())
            .build();
        assert!(first.restored_snapshot().is_none());
        first.load_track(track().with_author("Speaker"));

        let second = PlaybackEngine::builder(device).snapshot_store(store).build();
        let snapshot = second.restored_snapshot().unwrap();
        assert_eq!(snapshot.title, "Lesson 7");
        assert_eq!(snapshot.author, "Speaker");
    }
}
