//! Owned timers on the ambient tokio runtime
//!
//! Every deferred callback in the crate goes through here so that tearing an
//! owner down cancels its timers: a `TimerHandle` aborts its task when
//! cancelled or dropped.
//!
//! Without a runtime, one-shot work runs immediately and repeating work is
//! never scheduled; both are logged as warnings since minimum display times
//! no longer hold. Callers must not hold locks while scheduling.

use std::future::Future;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::warn;

/// Cancellable timer
///
/// Dropping the handle cancels the timer.
#[derive(Debug, Default)]
#[must_use = "dropping a TimerHandle cancels the timer"]
pub struct TimerHandle {
    task: Option<JoinHandle<()>>,
}

impl TimerHandle {
    /// A handle with nothing behind it
    pub fn inert() -> Self {
        Self { task: None }
    }

    pub(crate) fn from_task(task: JoinHandle<()>) -> Self {
        Self { task: Some(task) }
    }

    /// Stop the timer. Safe to call more than once.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Whether the timer may still fire
    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Run `f` once after `delay`
pub fn after<F>(delay: Duration, f: F) -> TimerHandle
where
    F: FnOnce() + Send + 'static,
{
    match Handle::try_current() {
        Ok(handle) => TimerHandle {
            task: Some(handle.spawn(async move {
                tokio::time::sleep(delay).await;
                f();
            })),
        },
        Err(_) => {
            warn!(?delay, "No async runtime, running deferred work now");
            f();
            TimerHandle::inert()
        }
    }
}

/// Run `f` every `period`, first after one full period
pub fn every<F>(period: Duration, mut f: F) -> TimerHandle
where
    F: FnMut() + Send + 'static,
{
    match Handle::try_current() {
        Ok(handle) => TimerHandle {
            task: Some(handle.spawn(async move {
                let mut ticker = interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    f();
                }
            })),
        },
        Err(_) => {
            warn!(?period, "No async runtime, repeating timer not scheduled");
            TimerHandle::inert()
        }
    }
}

/// Fire-and-forget a future on the ambient runtime
///
/// Used for collaborator I/O that must never block the caller. Without a
/// runtime the work is dropped.
pub fn spawn_detached<F>(what: &'static str, future: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    match Handle::try_current() {
        Ok(handle) => {
            handle.spawn(future);
        }
        Err(_) => warn!(task = what, "No async runtime, dropping background work"),
    }
}
