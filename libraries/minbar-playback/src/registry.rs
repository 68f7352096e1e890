//! Session registry
//!
//! Page-wide coordination between players. Exactly one engine is current at a
//! time; every native media element on the page is tracked, whether an engine
//! owns it or not, so that starting one source pauses all the others.
//!
//! The registry is an explicit object shared through `Arc`, handed to each
//! engine at construction instead of living in a global.

use crate::device::PlaybackDevice;
use crate::engine::PlaybackEngine;
use crate::outlet::{PlayToggle, ToggleOutlet};
use minbar_core::StopAudioService;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Identity of an engine instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EngineId(Uuid);

impl EngineId {
    /// Generate a fresh identity
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EngineId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EngineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle for a media element tracked with [`SessionRegistry::track_element`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(u64);

struct TrackedElement {
    id: ElementId,
    owner: Option<EngineId>,
    device: Weak<dyn PlaybackDevice>,
}

#[derive(Default)]
struct RegistryState {
    current: Option<EngineId>,
    engines: Vec<EngineId>,
    elements: Vec<TrackedElement>,
    toggles: Vec<Weak<PlayToggle>>,
    next_element: u64,
}

impl RegistryState {
    fn live_devices(&mut self, except: Option<EngineId>) -> Vec<Arc<dyn PlaybackDevice>> {
        self.elements.retain(|element| element.device.strong_count() > 0);
        self.elements
            .iter()
            .filter(|element| except.is_none() || element.owner != except)
            .filter_map(|element| element.device.upgrade())
            .collect()
    }
}

/// Page-wide registry of players, media elements and toggle outlets
pub struct SessionRegistry {
    stop_service: Option<Arc<dyn StopAudioService>>,
    state: Mutex<RegistryState>,
}

impl SessionRegistry {
    /// Create a registry
    ///
    /// `stop_service` is asked to clear the server-rendered player region on
    /// [`stop_all`](Self::stop_all); `None` skips that step.
    pub fn new(stop_service: Option<Arc<dyn StopAudioService>>) -> Arc<Self> {
        Arc::new(Self {
            stop_service,
            state: Mutex::new(RegistryState::default()),
        })
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an engine and its device; the engine becomes current
    pub fn register(&self, id: EngineId, device: &Arc<dyn PlaybackDevice>) {
        let mut state = self.state();
        if let Some(previous) = state.current.replace(id) {
            if previous != id {
                info!(%previous, current = %id, "Player superseded");
            }
        }
        if !state.engines.contains(&id) {
            state.engines.push(id);
        }
        let element = ElementId(state.next_element);
        state.next_element += 1;
        state.elements.push(TrackedElement {
            id: element,
            owner: Some(id),
            device: Arc::downgrade(device),
        });
        debug!(engine = %id, "Registered player");
    }

    /// Forget an engine and its device
    pub fn unregister(&self, id: EngineId) {
        let mut state = self.state();
        state.engines.retain(|engine| *engine != id);
        state.elements.retain(|element| element.owner != Some(id));
        if state.current == Some(id) {
            state.current = state.engines.last().copied();
        }
        debug!(engine = %id, "Unregistered player");
    }

    /// Track a media element no engine owns
    ///
    /// It is paused whenever an engine claims playback and on `stop_all`.
    pub fn track_element(&self, device: &Arc<dyn PlaybackDevice>) -> ElementId {
        let mut state = self.state();
        let id = ElementId(state.next_element);
        state.next_element += 1;
        state.elements.push(TrackedElement {
            id,
            owner: None,
            device: Arc::downgrade(device),
        });
        id
    }

    /// Stop tracking a foreign media element
    pub fn untrack_element(&self, id: ElementId) {
        self.state().elements.retain(|element| element.id != id);
    }

    /// The current engine
    pub fn current(&self) -> Option<EngineId> {
        self.state().current
    }

    /// Number of registered engines
    pub fn engine_count(&self) -> usize {
        self.state().engines.len()
    }

    /// Make `id` the only source allowed to play
    ///
    /// Pauses every other tracked element, then marks `id` current.
    pub fn claim(&self, id: EngineId) {
        let others = {
            let mut state = self.state();
            state.current = Some(id);
            state.live_devices(Some(id))
        };
        for device in others.iter().filter(|device| !device.is_paused()) {
            debug!(engine = %id, "Pausing other media element");
            device.pause();
        }
    }

    /// Connect a play/pause toggle to an engine
    ///
    /// The outlet reflects the engine's state immediately.
    pub fn connect_toggle(
        &self,
        engine: &Arc<PlaybackEngine>,
        outlet: Arc<dyn ToggleOutlet>,
    ) -> Arc<PlayToggle> {
        let toggle = PlayToggle::connect(engine, outlet);
        let mut state = self.state();
        state.toggles.retain(|toggle| toggle.strong_count() > 0);
        state.toggles.push(Arc::downgrade(&toggle));
        toggle
    }

    /// Stop every source on the page
    ///
    /// Pauses all tracked elements, puts every toggle in the unpressed state
    /// and asks the server to clear its player region. Returns the fragment the
    /// server sent back, if any. Server failures are logged.
    pub async fn stop_all(&self) -> Option<String> {
        let (devices, toggles) = {
            let mut state = self.state();
            state.toggles.retain(|toggle| toggle.strong_count() > 0);
            let toggles: Vec<_> = state.toggles.iter().filter_map(Weak::upgrade).collect();
            (state.live_devices(None), toggles)
        };

        info!(elements = devices.len(), "Stopping all audio");
        for device in &devices {
            device.pause();
        }
        for toggle in &toggles {
            toggle.show_unpressed();
        }

        let service = self.stop_service.as_ref()?;
        match service.clear_player().await {
            Ok(fragment) => fragment,
            Err(e) => {
                warn!(error = %e, "Failed to clear server player region");
                None
            }
        }
    }
}

impl fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("SessionRegistry")
            .field("current", &state.current)
            .field("engines", &state.engines.len())
            .field("elements", &state.elements.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::SimulatedDevice;
    use async_trait::async_trait;
    use minbar_core::{MinbarError, Result as CoreResult};

    struct FailingStop;

    #[async_trait]
    impl StopAudioService for FailingStop {
        async fn clear_player(&self) -> CoreResult<Option<String>> {
            Err(MinbarError::network("connection refused"))
        }
    }

    async fn playing_device() -> Arc<SimulatedDevice> {
        let device = Arc::new(SimulatedDevice::new());
        device.load("/a.mp3");
        device.play().await.unwrap();
        device
    }

    #[tokio::test]
    async fn claim_pauses_other_elements_only() {
        let registry = SessionRegistry::new(None);
        let own = playing_device().await;
        let foreign = playing_device().await;

        let own_dyn: Arc<dyn PlaybackDevice> = own.clone();
        let foreign_dyn: Arc<dyn PlaybackDevice> = foreign.clone();
        let id = EngineId::new();
        registry.register(id, &own_dyn);
        let _element = registry.track_element(&foreign_dyn);

        registry.claim(id);

        assert!(!own.is_paused());
        assert!(foreign.is_paused());
        assert_eq!(registry.current(), Some(id));
    }

    #[tokio::test]
    async fn stop_all_tolerates_server_failure() {
        let registry = SessionRegistry::new(Some(Arc::new(FailingStop)));
        let device = playing_device().await;
        let device_dyn: Arc<dyn PlaybackDevice> = device.clone();
        let _element = registry.track_element(&device_dyn);

        assert_eq!(registry.stop_all().await, None);
        assert!(device.is_paused());
    }

    #[test]
    fn unregister_falls_back_to_previous_engine() {
        let registry = SessionRegistry::new(None);
        let a: Arc<dyn PlaybackDevice> = Arc::new(SimulatedDevice::new());
        let b: Arc<dyn PlaybackDevice> = Arc::new(SimulatedDevice::new());
        let (id_a, id_b) = (EngineId::new(), EngineId::new());

        registry.register(id_a, &a);
        registry.register(id_b, &b);
        assert_eq!(registry.current(), Some(id_b));

        registry.unregister(id_b);
        assert_eq!(registry.current(), Some(id_a));
        assert_eq!(registry.engine_count(), 1);
    }

    #[test]
    fn dropped_elements_are_forgotten() {
        let registry = SessionRegistry::new(None);
        let device: Arc<dyn PlaybackDevice> = Arc::new(SimulatedDevice::new());
        let _id = registry.track_element(&device);
        drop(device);
        registry.claim(EngineId::new());
        assert!(format!("{registry:?}").contains("elements: 0"));
    }
}
