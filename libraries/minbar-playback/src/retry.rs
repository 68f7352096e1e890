//! Bounded polling
//!
//! Waits for something that may not exist yet (a media element injected by
//! another component, a transcript container rendered later). The first probe
//! runs immediately; further probes follow the policy's interval until the
//! attempt budget is spent, after which the poller gives up quietly.

use crate::timer::TimerHandle;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::debug;

/// Spacing between probes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Backoff {
    /// Same interval every time
    Fixed,
    /// Interval grows by `factor` after every miss
    Exponential {
        /// Growth factor (>= 1.0)
        factor: f64,
    },
}

/// How long and how often to poll
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total number of probes, including the immediate first one
    pub max_attempts: u32,
    /// Delay before the second probe
    pub interval: Duration,
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// Fixed-interval policy
    pub fn fixed(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
            backoff: Backoff::Fixed,
        }
    }

    /// Delay to wait after the `attempt`-th probe missed (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.interval,
            Backoff::Exponential { factor } => {
                let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
                self.interval.mul_f64(factor.max(1.0).powi(exponent))
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(10, Duration::from_millis(200))
    }
}

/// Where a poller is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryStatus {
    /// Still probing
    Pending,
    /// A probe succeeded and `on_ready` ran
    Ready,
    /// The budget ran out
    GaveUp,
    /// Cancelled before finishing
    Cancelled,
}

#[derive(Debug)]
struct Shared {
    status: Mutex<RetryStatus>,
    attempts: AtomicU32,
}

impl Shared {
    fn status(&self) -> MutexGuard<'_, RetryStatus> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move out of `Pending`. Returns false if something else got there first.
    fn finish(&self, status: RetryStatus) -> bool {
        let mut current = self.status();
        if *current == RetryStatus::Pending {
            *current = status;
            true
        } else {
            false
        }
    }
}

/// Cancellable handle to a running poller
///
/// Dropping the handle cancels polling.
#[derive(Debug)]
#[must_use = "dropping a RetryHandle cancels polling"]
pub struct RetryHandle {
    shared: Arc<Shared>,
    timer: TimerHandle,
}

impl RetryHandle {
    pub fn status(&self) -> RetryStatus {
        *self.shared.status()
    }

    /// Number of probes run so far
    pub fn attempts(&self) -> u32 {
        self.shared.attempts.load(Ordering::SeqCst)
    }

    /// Stop polling. No-op once finished.
    pub fn cancel(&mut self) {
        if self.shared.finish(RetryStatus::Cancelled) {
            debug!(attempts = self.attempts(), "Polling cancelled");
        }
        self.timer.cancel();
    }
}

impl Drop for RetryHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Probe until `probe` yields a value, then hand it to `on_ready`
///
/// `on_ready` runs at most once. When the budget is spent the handle reports
/// `GaveUp` and nothing else happens.
pub fn poll_until<T, P, R>(policy: RetryPolicy, mut probe: P, on_ready: R) -> RetryHandle
where
    T: Send + 'static,
    P: FnMut() -> Option<T> + Send + 'static,
    R: FnOnce(T) + Send + 'static,
{
    let shared = Arc::new(Shared {
        status: Mutex::new(RetryStatus::Pending),
        attempts: AtomicU32::new(0),
    });

    if policy.max_attempts == 0 {
        shared.finish(RetryStatus::GaveUp);
        return RetryHandle {
            shared,
            timer: TimerHandle::inert(),
        };
    }

    shared.attempts.store(1, Ordering::SeqCst);
    if let Some(value) = probe() {
        shared.finish(RetryStatus::Ready);
        on_ready(value);
        return RetryHandle {
            shared,
            timer: TimerHandle::inert(),
        };
    }

    if policy.max_attempts == 1 {
        give_up(&shared, &policy);
        return RetryHandle {
            shared,
            timer: TimerHandle::inert(),
        };
    }

    let Ok(runtime) = Handle::try_current() else {
        debug!("No async runtime, cannot poll again");
        give_up(&shared, &policy);
        return RetryHandle {
            shared,
            timer: TimerHandle::inert(),
        };
    };

    let task_shared = Arc::clone(&shared);
    let task = runtime.spawn(async move {
        let mut attempt = 1;
        loop {
            tokio::time::sleep(policy.delay_after(attempt)).await;
            if *task_shared.status() != RetryStatus::Pending {
                return;
            }

            attempt += 1;
            task_shared.attempts.store(attempt, Ordering::SeqCst);
            if let Some(value) = probe() {
                if task_shared.finish(RetryStatus::Ready) {
                    debug!(attempts = attempt, "Polling succeeded");
                    on_ready(value);
                }
                return;
            }

            if attempt >= policy.max_attempts {
                give_up(&task_shared, &policy);
                return;
            }
        }
    });

    RetryHandle {
        shared,
        timer: TimerHandle::from_task(task),
    }
}

fn give_up(shared: &Shared, policy: &RetryPolicy) {
    if shared.finish(RetryStatus::GaveUp) {
        debug!(
            attempts = policy.max_attempts,
            interval = ?policy.interval,
            "Target never appeared, giving up"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn exponential_delays_grow() {
        let policy = RetryPolicy {
            max_attempts: 4,
            interval: Duration::from_millis(100),
            backoff: Backoff::Exponential { factor: 2.0 },
        };
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn ready_on_first_probe_runs_synchronously() {
        let ready = Arc::new(AtomicBool::new(false));
        let ready_clone = Arc::clone(&ready);
        let handle = poll_until(RetryPolicy::default(), || Some(7), move |v: i32| {
            assert_eq!(v, 7);
            ready_clone.store(true, Ordering::SeqCst);
        });

        assert!(ready.load(Ordering::SeqCst));
        assert_eq!(handle.status(), RetryStatus::Ready);
        assert_eq!(handle.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_a_later_probe() {
        let present = Arc::new(AtomicBool::new(false));
        let probe_present = Arc::clone(&present);
        let handle = poll_until(
            RetryPolicy::default(),
            move || probe_present.load(Ordering::SeqCst).then_some(()),
            |()| {},
        );

        tokio::time::sleep(Duration::from_millis(450)).await;
        present.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(handle.status(), RetryStatus::Ready);
        assert_eq!(handle.attempts(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_budget_and_stops_probing() {
        let probes = Arc::new(AtomicU32::new(0));
        let probes_clone = Arc::clone(&probes);
        let handle = poll_until(
            RetryPolicy::default(),
            move || {
                probes_clone.fetch_add(1, Ordering::SeqCst);
                None::<()>
            },
            |()| panic!("never ready"),
        );

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(handle.status(), RetryStatus::GaveUp);
        assert_eq!(probes.load(Ordering::SeqCst), 10);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(probes.load(Ordering::SeqCst), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_probing() {
        let probes = Arc::new(AtomicU32::new(0));
        let probes_clone = Arc::clone(&probes);
        let mut handle = poll_until(
            RetryPolicy::default(),
            move || {
                probes_clone.fetch_add(1, Ordering::SeqCst);
                None::<()>
            },
            |()| {},
        );

        tokio::time::sleep(Duration::from_millis(300)).await;
        handle.cancel();
        let seen = probes.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(handle.status(), RetryStatus::Cancelled);
        assert_eq!(probes.load(Ordering::SeqCst), seen);
    }
}
