//! Progress bar and seeking
//!
//! Dragging the progress bar previews a position without touching the engine;
//! releasing it commits exactly one seek. While a drag is in progress, time
//! updates from the engine do not move the bar.

use crate::engine::PlaybackEngine;
use crate::events::{PlayerEvent, Subscription};
use crate::time_format::format_time;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::debug;

/// What the progress control shows
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressView {
    /// Fill, 0-100
    pub value: f64,
    /// Elapsed time, or the previewed position during a drag
    pub time_label: String,
    pub duration_label: String,
    pub is_seeking: bool,
}

impl Default for ProgressView {
    fn default() -> Self {
        Self {
            value: 0.0,
            time_label: format_time(0.0),
            duration_label: format_time(0.0),
            is_seeking: false,
        }
    }
}

fn lock(view: &Mutex<ProgressView>) -> MutexGuard<'_, ProgressView> {
    view.lock().unwrap_or_else(PoisonError::into_inner)
}

fn percent_of(time: f64, duration: Option<f64>) -> f64 {
    match duration {
        Some(d) if d > 0.0 => (time / d * 100.0).clamp(0.0, 100.0),
        _ => 0.0,
    }
}

/// Seek controller for one progress bar
pub struct SeekController {
    engine: Weak<PlaybackEngine>,
    view: Arc<Mutex<ProgressView>>,
    subscription: Subscription,
}

impl SeekController {
    /// Bind a progress bar to an engine
    pub fn attach(engine: &Arc<PlaybackEngine>) -> Self {
        let state = engine.state();
        let view = Arc::new(Mutex::new(ProgressView {
            value: percent_of(state.current_time, state.duration),
            time_label: format_time(state.current_time),
            duration_label: format_time(state.duration.unwrap_or(0.0)),
            is_seeking: false,
        }));

        let shared = Arc::clone(&view);
        let subscription = engine.subscribe(move |event| {
            let mut view = lock(&shared);
            match event {
                PlayerEvent::TimeUpdate {
                    current_time,
                    duration,
                } => {
                    if view.is_seeking {
                        return;
                    }
                    view.value = percent_of(*current_time, *duration);
                    view.time_label = format_time(*current_time);
                    if let Some(duration) = duration {
                        view.duration_label = format_time(*duration);
                    }
                }
                PlayerEvent::DurationChange(duration) => {
                    view.duration_label = format_time(*duration);
                }
                PlayerEvent::TrackChange(_) | PlayerEvent::Stopped => {
                    *view = ProgressView::default();
                }
                _ => {}
            }
        });

        Self {
            engine: Arc::downgrade(engine),
            view,
            subscription,
        }
    }

    /// Drag in progress: move the fill and preview the time, nothing else
    pub fn on_seek_input(&self, value: f64) {
        let value = if value.is_nan() { 0.0 } else { value.clamp(0.0, 100.0) };
        let duration = self
            .engine
            .upgrade()
            .and_then(|engine| engine.state().duration)
            .unwrap_or(0.0);

        let mut view = lock(&self.view);
        view.is_seeking = true;
        view.value = value;
        view.time_label = format_time(value / 100.0 * duration);
    }

    /// Drag released: seek once to `value` and resume following playback
    pub fn on_seek_change(&self, value: f64) {
        let value = if value.is_nan() { 0.0 } else { value.clamp(0.0, 100.0) };
        match self.engine.upgrade() {
            Some(engine) => engine.seek_percent(value),
            None => debug!("Seek released after engine was dropped"),
        }

        let mut view = lock(&self.view);
        view.value = value;
        view.is_seeking = false;
    }

    /// Current rendering
    pub fn view(&self) -> ProgressView {
        lock(&self.view).clone()
    }

    pub fn is_seeking(&self) -> bool {
        lock(&self.view).is_seeking
    }

    /// Stop following the engine
    pub fn detach(&self) {
        self.subscription.unsubscribe();
    }
}
