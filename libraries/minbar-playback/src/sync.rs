//! Caption and transcript synchronization
//!
//! Follows the engine's playhead over a list of time-coded segments, keeps the
//! active one highlighted and centered in its container, and keeps the player
//! itself on screen. The coordinator only reads playback state; the one
//! exception is the explicit "jump to this line" action.
//!
//! Rendering is reached through three seams so any host can plug in:
//! [`SegmentView`] (the scrollable list), [`CaptionSurface`] (the caption
//! overlay) and [`ViewportHost`] (the window).

use crate::engine::PlaybackEngine;
use crate::events::{PlayerEvent, Subscription};
use crate::retry::{poll_until, RetryHandle, RetryPolicy, RetryStatus};
use crate::scroll::{centered_scroll_top, viewport_nudge, ContainerMetrics, ItemMetrics, PlayerBounds};
use crate::segments::{parse_segments, SegmentSource};
use crate::timer::{self, TimerHandle};
use minbar_core::Segment;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tracing::{debug, warn};

/// Early-entry and early-exit windows around each segment (seconds)
///
/// Entering early and leaving early hides UI latency behind the audio and
/// leaves no dead zone between back-to-back segments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentTolerance {
    pub lead_in: f64,
    pub lead_out: f64,
}

impl Default for SegmentTolerance {
    fn default() -> Self {
        Self {
            lead_in: 0.2,
            lead_out: 0.1,
        }
    }
}

/// Index of the first segment with `start - lead_in <= t < end - lead_out`
pub fn active_segment(segments: &[Segment], t: f64, tolerance: SegmentTolerance) -> Option<usize> {
    if !t.is_finite() {
        return None;
    }
    segments
        .iter()
        .position(|s| t >= s.start - tolerance.lead_in && t < s.end - tolerance.lead_out)
}

/// Scrollable list of segments
pub trait SegmentView: Send + Sync {
    /// Highlight `index`, or nothing
    fn set_active(&self, index: Option<usize>);

    /// Add or remove the transient "just jumped here" highlight
    fn set_flash(&self, index: usize, on: bool);

    fn container_metrics(&self) -> Option<ContainerMetrics>;

    fn segment_metrics(&self, index: usize) -> Option<ItemMetrics>;

    fn scroll_container_to(&self, scroll_top: f64);
}

/// Caption overlay on the player
pub trait CaptionSurface: Send + Sync {
    /// Whether the host renders timed cues itself (a native text track)
    fn supports_native_cues(&self) -> bool;

    /// Hand every segment to the native renderer
    fn install_cues(&self, segments: &[Segment]);

    /// Show one caption line, or clear it
    fn show_text(&self, text: Option<&str>);
}

/// The window the player lives in
pub trait ViewportHost: Send + Sync {
    /// Player bounds relative to the viewport, if it is mounted
    fn player_bounds(&self) -> Option<PlayerBounds>;

    fn viewport_height(&self) -> f64;

    fn scroll_window_by(&self, delta: f64);
}

/// Rendering targets for a coordinator; any may be absent
#[derive(Clone, Default)]
pub struct SyncSurfaces {
    pub view: Option<Arc<dyn SegmentView>>,
    pub captions: Option<Arc<dyn CaptionSurface>>,
    pub viewport: Option<Arc<dyn ViewportHost>>,
}

#[derive(Debug, Default)]
struct SyncState {
    active: Option<usize>,
    flash_timer: TimerHandle,
    reconcile_timer: TimerHandle,
}

struct SyncInner {
    engine: Weak<PlaybackEngine>,
    segments: Vec<Segment>,
    surfaces: SyncSurfaces,
    manual_captions: bool,
    tolerance: SegmentTolerance,
    viewport_margin: f64,
    flash: Duration,
    reconcile: Duration,
    state: Mutex<SyncState>,
}

impl SyncInner {
    fn state(&self) -> MutexGuard<'_, SyncState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Recompute the active segment for `t`; renders only on change unless
    /// `force` is set
    fn update(&self, t: f64, force: bool) {
        let index = active_segment(&self.segments, t, self.tolerance);
        {
            let mut state = self.state();
            if state.active == index && !force {
                return;
            }
            state.active = index;
        }
        self.render(index);
    }

    fn clear(&self) {
        let changed = {
            let mut state = self.state();
            state.flash_timer.cancel();
            state.reconcile_timer.cancel();
            state.active.take().is_some()
        };
        if changed {
            self.render(None);
        }
    }

    fn render(&self, index: Option<usize>) {
        if let Some(view) = &self.surfaces.view {
            view.set_active(index);
        }

        if self.manual_captions {
            if let Some(captions) = &self.surfaces.captions {
                let text = index.and_then(|i| self.segments.get(i)).map(|s| s.text.as_str());
                captions.show_text(text);
            }
        }

        if let Some(index) = index {
            self.scroll_to(index);
            self.keep_player_visible();
        }
    }

    fn scroll_to(&self, index: usize) {
        let Some(view) = &self.surfaces.view else {
            return;
        };
        let (Some(container), Some(item)) = (view.container_metrics(), view.segment_metrics(index))
        else {
            return;
        };
        let target = centered_scroll_top(container, item);
        if (target - container.scroll_top).abs() >= 1.0 {
            view.scroll_container_to(target);
        }
    }

    fn keep_player_visible(&self) {
        let Some(viewport) = &self.surfaces.viewport else {
            return;
        };
        let Some(bounds) = viewport.player_bounds() else {
            return;
        };
        if let Some(delta) = viewport_nudge(bounds, viewport.viewport_height(), self.viewport_margin) {
            viewport.scroll_window_by(delta);
        }
    }
}

/// Keeps segment highlighting in step with an engine
///
/// Dropping the coordinator detaches it and cancels its timers.
pub struct SyncCoordinator {
    inner: Arc<SyncInner>,
    subscription: Subscription,
}

impl SyncCoordinator {
    /// Follow `engine` over the given segments
    ///
    /// Unparseable segment input leaves the coordinator inert.
    pub fn attach(engine: &Arc<PlaybackEngine>, source: SegmentSource, surfaces: SyncSurfaces) -> Self {
        let config = engine.config();
        let segments = parse_segments(source);

        let native = surfaces
            .captions
            .as_ref()
            .is_some_and(|captions| captions.supports_native_cues());
        if native {
            if let Some(captions) = &surfaces.captions {
                captions.install_cues(&segments);
            }
        }

        let inner = Arc::new(SyncInner {
            engine: Arc::downgrade(engine),
            segments,
            surfaces,
            manual_captions: !native,
            tolerance: config.tolerance(),
            viewport_margin: config.sync.viewport_margin,
            flash: config.flash(),
            reconcile: config.reconcile_delay(),
            state: Mutex::new(SyncState::default()),
        });

        let target = Arc::downgrade(&inner);
        let subscription = engine.subscribe(move |event| {
            let Some(inner) = target.upgrade() else {
                return;
            };
            match event {
                PlayerEvent::TimeUpdate { current_time, .. } => inner.update(*current_time, false),
                PlayerEvent::Seeked(time) => inner.update(*time, false),
                PlayerEvent::TrackChange(_) | PlayerEvent::Stopped => inner.clear(),
                _ => {}
            }
        });

        debug!(
            segments = inner.segments.len(),
            native_captions = native,
            "Segment sync attached"
        );
        inner.update(engine.state().current_time, false);

        Self {
            inner,
            subscription,
        }
    }

    /// Wait for an engine that may not exist yet, then attach to it
    ///
    /// `locate` is probed on the retry policy's schedule. If the budget runs
    /// out, the returned handle reports [`RetryStatus::GaveUp`] and nothing
    /// else happens.
    pub fn attach_when_available<L>(
        locate: L,
        source: SegmentSource,
        surfaces: SyncSurfaces,
        policy: RetryPolicy,
    ) -> PendingSync
    where
        L: FnMut() -> Option<Arc<PlaybackEngine>> + Send + 'static,
    {
        let slot: Arc<Mutex<Option<SyncCoordinator>>> = Arc::new(Mutex::new(None));
        let target = Arc::clone(&slot);
        let retry = poll_until(policy, locate, move |engine: Arc<PlaybackEngine>| {
            let coordinator = SyncCoordinator::attach(&engine, source, surfaces);
            *target.lock().unwrap_or_else(PoisonError::into_inner) = Some(coordinator);
        });
        PendingSync { retry, slot }
    }

    /// Index of the highlighted segment
    pub fn active(&self) -> Option<usize> {
        self.inner.state().active
    }

    pub fn segments(&self) -> &[Segment] {
        &self.inner.segments
    }

    /// Jump playback to a segment
    ///
    /// Seeks to its start, tries to play (a blocked start is ignored), flashes
    /// the line briefly and re-syncs the highlight shortly after.
    pub fn seek_to_segment(&self, index: usize) {
        let Some(segment) = self.inner.segments.get(index) else {
            warn!(index, "No such segment");
            return;
        };
        let Some(engine) = self.inner.engine.upgrade() else {
            debug!("Segment selected after engine was dropped");
            return;
        };

        engine.seek_to(segment.start);
        let player = Arc::clone(&engine);
        timer::spawn_detached("segment-play", async move {
            player.play().await;
        });

        let flash_timer = match &self.inner.surfaces.view {
            Some(view) => {
                view.set_flash(index, true);
                let view = Arc::clone(view);
                timer::after(self.inner.flash, move || view.set_flash(index, false))
            }
            None => TimerHandle::inert(),
        };

        let target = Arc::downgrade(&self.inner);
        let reconcile_timer = timer::after(self.inner.reconcile, move || {
            let Some(inner) = target.upgrade() else {
                return;
            };
            if let Some(engine) = inner.engine.upgrade() {
                inner.update(engine.state().current_time, true);
            }
        });

        let mut state = self.inner.state();
        state.flash_timer = flash_timer;
        state.reconcile_timer = reconcile_timer;
    }

    /// Stop following the engine and cancel pending timers
    pub fn detach(&self) {
        self.subscription.unsubscribe();
        let mut state = self.inner.state();
        state.flash_timer.cancel();
        state.reconcile_timer.cancel();
    }
}

impl Drop for SyncCoordinator {
    fn drop(&mut self) {
        self.detach();
    }
}

/// A coordinator waiting for its engine
#[must_use = "dropping a PendingSync cancels the attach and detaches the coordinator"]
pub struct PendingSync {
    retry: RetryHandle,
    slot: Arc<Mutex<Option<SyncCoordinator>>>,
}

impl PendingSync {
    fn slot(&self) -> MutexGuard<'_, Option<SyncCoordinator>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> RetryStatus {
        self.retry.status()
    }

    /// Probes run so far
    pub fn attempts(&self) -> u32 {
        self.retry.attempts()
    }

    pub fn is_attached(&self) -> bool {
        self.slot().is_some()
    }

    /// Run `f` against the coordinator once attached
    pub fn with_coordinator<R>(&self, f: impl FnOnce(&SyncCoordinator) -> R) -> Option<R> {
        self.slot().as_ref().map(f)
    }

    /// Stop waiting; an attached coordinator is detached
    pub fn cancel(&mut self) {
        self.retry.cancel();
        if let Some(coordinator) = self.slot().take() {
            coordinator.detach();
        }
    }
}
