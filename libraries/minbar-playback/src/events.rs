//! Playback Events
//!
//! Typed publish/subscribe used between the device, the engine and every
//! observer attached to it.
//!
//! Delivery guarantees:
//! - Handlers run in registration order.
//! - Events are delivered in emission order. An event emitted from inside a
//!   handler is queued and delivered once the current event has reached every
//!   subscriber.
//! - `Subscription::unsubscribe` is idempotent, and a removed handler is never
//!   invoked again, even if it was removed mid-dispatch.

use minbar_core::Track;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Events emitted by the playback engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlayerEvent {
    /// Playback started or resumed
    Play,

    /// Playback paused
    Pause,

    /// Playhead moved
    TimeUpdate {
        /// Playhead in seconds
        current_time: f64,
        /// Duration in seconds, if known
        duration: Option<f64>,
    },

    /// The device reported the track duration
    DurationChange(f64),

    /// A new track replaced the previous one
    TrackChange(Track),

    /// Volume changed
    VolumeChange {
        /// New volume (0.0 - 1.0)
        volume: f64,
        /// Derived: volume is zero
        muted: bool,
    },

    /// Loop toggled
    LoopChange(bool),

    /// Playback rate changed
    RateChange(f64),

    /// The device started fetching the source
    LoadStart,

    /// The device can start playing
    CanPlay,

    /// A seek completed at the given position
    Seeked(f64),

    /// The track played to the end
    Ended,

    /// The device failed
    Error(String),

    /// Loading skeleton shown (`true`) or hidden (`false`)
    LoadingChanged(bool),

    /// The session was stopped; attached UI should hide
    Stopped,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

type Handler<E> = dyn Fn(&E) + Send + Sync;

struct Entry<E> {
    id: u64,
    active: AtomicBool,
    handler: Box<Handler<E>>,
}

struct BusState<E> {
    entries: Vec<Arc<Entry<E>>>,
    queue: VecDeque<E>,
    dispatching: bool,
}

struct BusInner<E> {
    state: Mutex<BusState<E>>,
    next_id: AtomicU64,
}

trait Unsubscribe: Send + Sync {
    fn remove(&self, id: u64);
}

impl<E: Send> Unsubscribe for BusInner<E> {
    fn remove(&self, id: u64) {
        let mut state = lock(&self.state);
        if let Some(index) = state.entries.iter().position(|entry| entry.id == id) {
            let entry = state.entries.remove(index);
            entry.active.store(false, Ordering::SeqCst);
        }
    }
}

/// Resets the dispatching flag if a handler panics mid-dispatch
struct DispatchGuard<'a, E> {
    inner: &'a BusInner<E>,
    armed: bool,
}

impl<E> Drop for DispatchGuard<'_, E> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = lock(&self.inner.state);
            state.dispatching = false;
            state.queue.clear();
        }
    }
}

/// Typed event hub
pub struct EventBus<E> {
    inner: Arc<BusInner<E>>,
}

impl<E: Send + 'static> EventBus<E> {
    /// Create a bus with no subscribers
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                state: Mutex::new(BusState {
                    entries: Vec::new(),
                    queue: VecDeque::new(),
                    dispatching: false,
                }),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register a handler
    ///
    /// The handler stays registered until the returned `Subscription` is
    /// unsubscribed or dropped.
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.inner.state).entries.push(Arc::new(Entry {
            id,
            active: AtomicBool::new(true),
            handler: Box::new(handler),
        }));

        let target: Weak<dyn Unsubscribe> = Arc::downgrade(&self.inner) as Weak<dyn Unsubscribe>;
        Subscription {
            id,
            target,
            active: AtomicBool::new(true),
        }
    }

    /// Deliver an event to every subscriber
    pub fn emit(&self, event: E) {
        {
            let mut state = lock(&self.inner.state);
            state.queue.push_back(event);
            if state.dispatching {
                return;
            }
            state.dispatching = true;
        }

        let mut guard = DispatchGuard {
            inner: &*self.inner,
            armed: true,
        };

        loop {
            let (event, entries) = {
                let mut state = lock(&self.inner.state);
                match state.queue.pop_front() {
                    Some(event) => (event, state.entries.clone()),
                    None => {
                        state.dispatching = false;
                        guard.armed = false;
                        return;
                    }
                }
            };

            for entry in entries {
                if entry.active.load(Ordering::SeqCst) {
                    (entry.handler)(&event);
                }
            }
        }
    }

    /// Drop every subscriber
    pub fn clear(&self) {
        let mut state = lock(&self.inner.state);
        for entry in state.entries.drain(..) {
            entry.active.store(false, Ordering::SeqCst);
        }
    }

    /// Number of registered handlers
    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner.state).entries.len()
    }
}

impl<E: Send + 'static> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a registered handler
///
/// Dropping the handle unsubscribes.
#[must_use = "dropping a Subscription unsubscribes its handler"]
pub struct Subscription {
    id: u64,
    target: Weak<dyn Unsubscribe>,
    active: AtomicBool,
}

impl Subscription {
    /// Remove the handler. Safe to call more than once.
    pub fn unsubscribe(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            if let Some(target) = self.target.upgrade() {
                target.remove(self.id);
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.active.load(Ordering::SeqCst))
            .finish()
    }
}
