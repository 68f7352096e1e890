//! Loading skeleton timing
//!
//! Keeps the loading skeleton on screen for a minimum time so fast loads do not
//! flicker. Whatever must happen when the skeleton goes away (refreshing the
//! track info, auto-play) is handed to `complete` and runs together with the
//! hide.

use crate::timer::{self, TimerHandle};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Default)]
struct GateState {
    started: Option<Instant>,
    visible: bool,
    /// Bumped on every begin/cancel so stale timers can tell they are stale
    generation: u64,
    timer: TimerHandle,
}

/// Minimum-display-time gate for the loading skeleton
#[derive(Debug, Clone)]
pub struct LoadingGate {
    minimum: Duration,
    state: Arc<Mutex<GateState>>,
}

fn lock(state: &Mutex<GateState>) -> MutexGuard<'_, GateState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl LoadingGate {
    pub fn new(minimum: Duration) -> Self {
        Self {
            minimum,
            state: Arc::new(Mutex::new(GateState::default())),
        }
    }

    /// Show the skeleton and start the clock
    ///
    /// A pending hide from an earlier load is discarded.
    pub fn begin(&self) {
        let mut state = lock(&self.state);
        state.generation += 1;
        state.started = Some(Instant::now());
        state.visible = true;
        state.timer.cancel();
    }

    /// The load finished: hide once the skeleton has been up for the minimum
    /// time, then run `on_hidden`
    ///
    /// Runs `on_hidden` before returning when the minimum has already passed or
    /// no load is in progress.
    pub fn complete<F>(&self, on_hidden: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let (generation, remaining) = {
            let mut state = lock(&self.state);
            let Some(started) = state.started.filter(|_| state.visible) else {
                drop(state);
                on_hidden();
                return;
            };
            let remaining = self.minimum.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                state.visible = false;
                state.started = None;
                drop(state);
                on_hidden();
                return;
            }
            (state.generation, remaining)
        };

        debug!(?remaining, "Holding loading skeleton");
        let shared = Arc::downgrade(&self.state);
        let handle = timer::after(remaining, move || {
            let Some(shared) = shared.upgrade() else {
                return;
            };
            {
                let mut state = lock(&shared);
                if state.generation != generation || !state.visible {
                    return;
                }
                state.visible = false;
                state.started = None;
            }
            on_hidden();
        });

        let mut state = lock(&self.state);
        if state.generation == generation && state.visible {
            state.timer = handle;
        }
    }

    /// Hide without running any pending completion
    pub fn cancel(&self) {
        let mut state = lock(&self.state);
        state.generation += 1;
        state.visible = false;
        state.started = None;
        state.timer.cancel();
    }

    /// Whether the skeleton is on screen
    pub fn is_visible(&self) -> bool {
        lock(&self.state).visible
    }

    pub fn minimum(&self) -> Duration {
        self.minimum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn flag() -> (Arc<AtomicBool>, impl FnOnce() + Send + 'static) {
        let flag = Arc::new(AtomicBool::new(false));
        let setter = Arc::clone(&flag);
        (flag, move || setter.store(true, Ordering::SeqCst))
    }

    #[tokio::test(start_paused = true)]
    async fn fast_load_keeps_skeleton_for_the_minimum() {
        let gate = LoadingGate::new(Duration::from_millis(1000));
        gate.begin();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let (hidden, on_hidden) = flag();
        gate.complete(on_hidden);

        tokio::time::sleep(Duration::from_millis(949)).await;
        assert!(gate.is_visible());
        assert!(!hidden.load(Ordering::SeqCst));

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(!gate.is_visible());
        assert!(hidden.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_load_hides_immediately() {
        let gate = LoadingGate::new(Duration::from_millis(1000));
        gate.begin();
        tokio::time::sleep(Duration::from_millis(1200)).await;

        let (hidden, on_hidden) = flag();
        gate.complete(on_hidden);

        assert!(!gate.is_visible());
        assert!(hidden.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn new_load_discards_pending_hide() {
        let gate = LoadingGate::new(Duration::from_millis(1000));
        gate.begin();
        let (stale, on_stale) = flag();
        gate.complete(on_stale);

        tokio::time::sleep(Duration::from_millis(500)).await;
        gate.begin();
        tokio::time::sleep(Duration::from_millis(800)).await;

        assert!(!stale.load(Ordering::SeqCst));
        assert!(gate.is_visible());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_completion() {
        let gate = LoadingGate::new(Duration::from_millis(1000));
        gate.begin();
        let (hidden, on_hidden) = flag();
        gate.complete(on_hidden);
        gate.cancel();

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!hidden.load(Ordering::SeqCst));
        assert!(!gate.is_visible());
    }

    #[test]
    fn complete_without_begin_runs_now() {
        let gate = LoadingGate::new(Duration::from_millis(1000));
        let (hidden, on_hidden) = flag();
        gate.complete(on_hidden);
        assert!(hidden.load(Ordering::SeqCst));
    }
}
