//! Position checkpointing
//!
//! Remembers where the listener is in a resumable resource (a lesson, a
//! lecture) so the next visit can pick up from there. Saves are
//! fire-and-forget: a failed save is logged and never retried or awaited by
//! playback. A single writer task sends them to the store one at a time, in
//! the order they were made.
//!
//! Save triggers:
//! - every checkpoint interval while playing
//! - pause and seeked, with the current position
//! - ended, with position 0 so the next visit starts over
//! - page unload, if still playing

use crate::engine::PlaybackEngine;
use crate::events::{PlayerEvent, Subscription};
use crate::timer::{self, TimerHandle};
use minbar_core::{CheckpointRecord, PositionStore, ResourceRef};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct CheckpointState {
    ticker: TimerHandle,
    /// Position waiting for the duration to become known
    pending_resume: Option<f64>,
    settle_timer: TimerHandle,
}

struct CheckpointInner {
    engine: Weak<PlaybackEngine>,
    store: Arc<dyn PositionStore>,
    interval: Duration,
    end_margin: f64,
    settle: Duration,
    this: Weak<CheckpointInner>,
    state: Mutex<CheckpointState>,
    writer: Mutex<Option<mpsc::UnboundedSender<CheckpointRecord>>>,
}

async fn write_checkpoints(
    store: Arc<dyn PositionStore>,
    mut records: mpsc::UnboundedReceiver<CheckpointRecord>,
) {
    while let Some(record) = records.recv().await {
        match store.save(&record).await {
            Ok(()) => debug!(
                resource_type = %record.resource_type,
                resource_id = %record.resource_id,
                position = record.position,
                "Saved position"
            ),
            Err(e) => warn!(
                resource_type = %record.resource_type,
                resource_id = %record.resource_id,
                error = %e,
                "Failed to save position"
            ),
        }
    }
}

impl CheckpointInner {
    fn state(&self) -> MutexGuard<'_, CheckpointState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handle(&self, event: &PlayerEvent) {
        match event {
            PlayerEvent::Play => self.start_ticker(),
            PlayerEvent::Pause => {
                self.stop_ticker();
                self.save_current();
            }
            PlayerEvent::Seeked(position) => self.save(*position),
            PlayerEvent::Ended => {
                self.stop_ticker();
                self.save(0.0);
            }
            PlayerEvent::DurationChange(duration) => self.apply_pending(*duration),
            PlayerEvent::TrackChange(_) => {
                let mut state = self.state();
                state.settle_timer.cancel();
                if state.pending_resume.take().is_some() {
                    debug!("Pending resume dropped, another track was loaded");
                }
            }
            PlayerEvent::Stopped => {
                let mut state = self.state();
                state.ticker.cancel();
                state.settle_timer.cancel();
                state.pending_resume = None;
            }
            _ => {}
        }
    }

    fn start_ticker(&self) {
        let target = self.this.clone();
        let ticker = timer::every(self.interval, move || {
            if let Some(inner) = target.upgrade() {
                inner.tick();
            }
        });
        self.state().ticker = ticker;
    }

    fn stop_ticker(&self) {
        self.state().ticker.cancel();
    }

    fn tick(&self) {
        let Some(engine) = self.engine.upgrade() else {
            return;
        };
        let state = engine.state();
        if state.status.is_playing() {
            self.save(state.current_time);
        }
    }

    fn save_current(&self) {
        if let Some(engine) = self.engine.upgrade() {
            self.save(engine.state().current_time);
        }
    }

    fn resource(&self) -> Option<ResourceRef> {
        self.engine.upgrade()?.current_track()?.resource
    }

    fn save(&self, position: f64) {
        let Some(resource) = self.resource() else {
            return;
        };
        let record = CheckpointRecord::new(&resource, position);

        let sender = {
            let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
            let live = writer.as_ref().filter(|sender| !sender.is_closed()).cloned();
            match live {
                Some(sender) => sender,
                None => {
                    let (sender, records) = mpsc::unbounded_channel();
                    timer::spawn_detached(
                        "position checkpoints",
                        write_checkpoints(Arc::clone(&self.store), records),
                    );
                    *writer = Some(sender.clone());
                    sender
                }
            }
        };

        if sender.send(record).is_err() {
            debug!(resource = %resource, position, "No checkpoint writer, position dropped");
        }
    }

    fn apply_pending(&self, duration: f64) {
        let Some(position) = self.state().pending_resume.take() else {
            return;
        };
        self.resume(position, duration);
    }

    fn resume(&self, position: f64, duration: f64) {
        let Some(engine) = self.engine.upgrade() else {
            return;
        };
        let target = position.min(duration - self.end_margin).max(0.0);
        info!(position, target, duration, "Restoring playback position");
        engine.seek_to(target);

        let player = Arc::downgrade(&engine);
        let settle_timer = timer::after(self.settle, move || {
            if let Some(engine) = player.upgrade() {
                timer::spawn_detached("resume playback", async move {
                    engine.play().await;
                });
            }
        });
        self.state().settle_timer = settle_timer;
    }
}

/// Saves and restores playback positions for an engine
///
/// Dropping the checkpointer detaches it and cancels its timers.
pub struct PositionCheckpointer {
    inner: Arc<CheckpointInner>,
    subscription: Subscription,
}

impl PositionCheckpointer {
    /// Start checkpointing `engine` into `store`
    ///
    /// Only tracks that carry a resource reference are saved.
    pub fn attach(engine: &Arc<PlaybackEngine>, store: Arc<dyn PositionStore>) -> Self {
        let config = engine.config();
        let inner = Arc::new_cyclic(|this| CheckpointInner {
            engine: Arc::downgrade(engine),
            store,
            interval: config.checkpoint_interval(),
            end_margin: config.checkpoint.resume_end_margin,
            settle: config.resume_settle(),
            this: this.clone(),
            state: Mutex::new(CheckpointState::default()),
            writer: Mutex::new(None),
        });

        let target = Arc::downgrade(&inner);
        let subscription = engine.subscribe(move |event| {
            if let Some(inner) = target.upgrade() {
                inner.handle(event);
            }
        });

        if engine.status().is_playing() {
            inner.start_ticker();
        }

        Self {
            inner,
            subscription,
        }
    }

    /// Resume from `position` once the duration is known
    ///
    /// The position is clamped to `duration - end margin`, and playback starts
    /// after the settle delay. Applies at most once.
    pub fn resume_at(&self, position: f64) {
        if !position.is_finite() || position <= 0.0 {
            debug!(position, "Nothing to resume");
            return;
        }
        let known = self
            .inner
            .engine
            .upgrade()
            .and_then(|engine| engine.state().duration)
            .filter(|d| *d > 0.0);

        match known {
            Some(duration) => self.inner.resume(position, duration),
            None => self.inner.state().pending_resume = Some(position),
        }
    }

    /// Look up the loaded track's saved position and resume from it
    ///
    /// Returns the stored position, if one was found. Store failures are
    /// logged and treated as "nothing saved".
    pub async fn restore(&self) -> Option<f64> {
        let resource = self.inner.resource()?;
        match self.inner.store.load(&resource).await {
            Ok(Some(position)) => {
                self.resume_at(position);
                Some(position)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(resource = %resource, error = %e, "Failed to load saved position");
                None
            }
        }
    }

    /// Save one last time if the page goes away mid-playback
    pub fn on_page_unload(&self) {
        self.inner.tick();
    }

    /// Whether the periodic save is running
    pub fn is_ticking(&self) -> bool {
        self.inner.state().ticker.is_active()
    }

    /// Stop checkpointing
    pub fn detach(&self) {
        self.subscription.unsubscribe();
        let mut state = self.inner.state();
        state.ticker.cancel();
        state.settle_timer.cancel();
        state.pending_resume = None;
    }
}

impl Drop for PositionCheckpointer {
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceCall, PlaybackDevice, SimulatedDevice};
    use async_trait::async_trait;
    use minbar_core::{MemoryPositionStore, PlaybackStatus, Result as CoreResult, Track};

    /// Store where non-zero saves take longer than resets to zero
    #[derive(Default)]
    struct SlowStore {
        completed: Mutex<Vec<f64>>,
    }

    #[async_trait]
    impl PositionStore for SlowStore {
        async fn save(&self, record: &CheckpointRecord) -> CoreResult<()> {
            if record.position > 0.0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            self.completed.lock().unwrap().push(record.position);
            Ok(())
        }

        async fn load(&self, _resource: &ResourceRef) -> CoreResult<Option<f64>> {
            Ok(None)
        }
    }

    fn lesson() -> ResourceRef {
        ResourceRef::new("lesson", "7")
    }

    fn setup() -> (
        Arc<PlaybackEngine>,
        Arc<SimulatedDevice>,
        Arc<MemoryPositionStore>,
        PositionCheckpointer,
    ) {
        let device = Arc::new(SimulatedDevice::new());
        let engine = PlaybackEngine::builder(device.clone()).build();
        let store = Arc::new(MemoryPositionStore::new());
        let checkpointer = PositionCheckpointer::attach(&engine, store.clone());
        engine.load_track(Track::new("lesson-7", "/lesson-7.mp3").with_resource(lesson()));
        (engine, device, store, checkpointer)
    }

    fn positions(store: &MemoryPositionStore) -> Vec<f64> {
        store.saved_records().iter().map(|r| r.position).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn saves_every_interval_while_playing() {
        let (engine, device, store, checkpointer) = setup();
        device.finish_loading(600.0);
        engine.play().await;
        assert!(checkpointer.is_ticking());

        device.advance(3.0);
        tokio::time::sleep(Duration::from_millis(3100)).await;
        device.advance(3.0);
        tokio::time::sleep(Duration::from_millis(3000)).await;

        assert_eq!(positions(&store), vec![3.0, 6.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_saves_and_stops_ticking() {
        let (engine, device, store, checkpointer) = setup();
        device.finish_loading(600.0);
        engine.play().await;
        device.advance(12.0);

        engine.pause();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(!checkpointer.is_ticking());
        assert_eq!(positions(&store), vec![12.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn ended_saves_zero() {
        let (engine, device, store, _checkpointer) = setup();
        device.finish_loading(20.0);
        engine.play().await;
        device.advance(25.0);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(positions(&store).last(), Some(&0.0));
    }

    #[tokio::test(start_paused = true)]
    async fn saves_reach_the_store_in_order() {
        let device = Arc::new(SimulatedDevice::new());
        let engine = PlaybackEngine::builder(device.clone()).build();
        let store = Arc::new(SlowStore::default());
        let _checkpointer = PositionCheckpointer::attach(&engine, store.clone());
        engine.load_track(Track::new("lesson-7", "/lesson-7.mp3").with_resource(lesson()));
        device.finish_loading(20.0);
        engine.play().await;

        // pause at the end, then ended
        device.advance(25.0);
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(*store.completed.lock().unwrap(), vec![20.0, 0.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn save_failures_do_not_affect_playback() {
        let (engine, device, store, _checkpointer) = setup();
        store.set_failing(true);
        device.finish_loading(60.0);
        engine.play().await;
        engine.seek_to(30.0);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(engine.status().is_playing());
        assert!(store.saved_records().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn resume_waits_for_duration_and_clamps() {
        let (engine, device, _store, checkpointer) = setup();
        checkpointer.resume_at(500.0);
        assert!(device.calls().iter().all(|c| !matches!(c, DeviceCall::Seek(_))));

        device.finish_loading(120.0);
        assert_eq!(device.current_time(), 119.0);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(engine.status().is_playing());
    }

    fn other_lesson() -> Track {
        Track::new("lesson-8", "/lesson-8.mp3").with_resource(ResourceRef::new("lesson", "8"))
    }

    #[tokio::test(start_paused = true)]
    async fn pending_resume_does_not_follow_a_track_change() {
        let (engine, device, _store, checkpointer) = setup();
        checkpointer.resume_at(42.5);

        engine.load_track(other_lesson());
        device.finish_loading(300.0);
        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert!(!device.calls().iter().any(|c| matches!(c, DeviceCall::Seek(_))));
        assert_eq!(engine.status(), PlaybackStatus::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn settling_resume_is_cancelled_by_a_track_change() {
        let (engine, device, _store, checkpointer) = setup();
        device.finish_loading(300.0);
        checkpointer.resume_at(42.5);
        assert_eq!(device.current_time(), 42.5);

        engine.load_track(other_lesson());
        device.finish_loading(300.0);
        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert_eq!(device.current_time(), 0.0);
        assert_eq!(engine.status(), PlaybackStatus::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn untracked_resources_are_not_saved() {
        let device = Arc::new(SimulatedDevice::new());
        let engine = PlaybackEngine::builder(device.clone()).build();
        let store = Arc::new(MemoryPositionStore::new());
        let _checkpointer = PositionCheckpointer::attach(&engine, store.clone());
        engine.load_track(Track::new("clip", "/clip.mp3"));
        device.finish_loading(30.0);
        engine.play().await;
        engine.pause();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(store.saved_records().is_empty());
    }
}
