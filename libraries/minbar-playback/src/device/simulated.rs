//! Headless device
//!
//! Behaves like an HTML media element, minus the audio: commands update its
//! state and emit the same events in the same order a browser would. Loading,
//! the passage of time and failures are scripted by the caller.

use super::{DeviceError, DeviceEvent, DeviceListener, PlaybackDevice};
use crate::events::{EventBus, Subscription};
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A command the device received, for call-log assertions
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    /// `load(src)`
    Load(String),
    /// `play()`
    Play,
    /// `pause()`
    Pause,
    /// `seek(position)`
    Seek(f64),
    /// `set_volume(volume)`
    SetVolume(f64),
    /// `set_playback_rate(rate)`
    SetPlaybackRate(f64),
    /// `set_loop(looping)`
    SetLoop(bool),
    /// `release()`
    Release,
}

#[derive(Debug)]
struct SimState {
    src: Option<String>,
    current_time: f64,
    duration: Option<f64>,
    paused: bool,
    volume: f64,
    playback_rate: f64,
    looping: bool,
    autoplay_blocked: bool,
    calls: Vec<DeviceCall>,
}

/// Scriptable in-memory playback device
pub struct SimulatedDevice {
    state: Mutex<SimState>,
    events: EventBus<DeviceEvent>,
}

impl SimulatedDevice {
    /// Create an empty, paused device
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SimState {
                src: None,
                current_time: 0.0,
                duration: None,
                paused: true,
                volume: 1.0,
                playback_rate: 1.0,
                looping: false,
                autoplay_blocked: false,
                calls: Vec::new(),
            }),
            events: EventBus::new(),
        }
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Report metadata and readiness for the current source
    ///
    /// Emits `durationchange` then `canplay`.
    pub fn finish_loading(&self, duration: f64) {
        {
            let mut state = self.state();
            if state.src.is_none() {
                return;
            }
            state.duration = Some(duration);
        }
        self.events.emit(DeviceEvent::DurationChange(duration));
        self.events.emit(DeviceEvent::CanPlay);
    }

    /// Let `seconds` of media time pass
    ///
    /// Emits `timeupdate`, and on reaching the end either wraps (looping) or
    /// emits `pause` then `ended`.
    pub fn advance(&self, seconds: f64) {
        let (time, finished) = {
            let mut state = self.state();
            if state.paused || state.src.is_none() {
                return;
            }
            let mut time = state.current_time + seconds * state.playback_rate;
            let mut finished = false;
            if let Some(duration) = state.duration {
                if time >= duration {
                    if state.looping && duration > 0.0 {
                        time %= duration;
                    } else {
                        time = duration;
                        state.paused = true;
                        finished = true;
                    }
                }
            }
            state.current_time = time;
            (time, finished)
        };

        self.events.emit(DeviceEvent::TimeUpdate(time));
        if finished {
            self.events.emit(DeviceEvent::Pause);
            self.events.emit(DeviceEvent::Ended);
        }
    }

    /// Fail the current source
    pub fn fail(&self, error: DeviceError) {
        self.state().paused = true;
        self.events.emit(DeviceEvent::Error(error));
    }

    /// Make `play()` reject as if the host's autoplay policy blocked it
    pub fn block_autoplay(&self, blocked: bool) {
        self.state().autoplay_blocked = blocked;
    }

    /// Every command received so far, oldest first
    pub fn calls(&self) -> Vec<DeviceCall> {
        self.state().calls.clone()
    }

    /// Forget the recorded commands
    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Currently loaded source
    pub fn src(&self) -> Option<String> {
        self.state().src.clone()
    }

    /// Current output volume
    pub fn volume(&self) -> f64 {
        self.state().volume
    }

    /// Current playback rate
    pub fn playback_rate(&self) -> f64 {
        self.state().playback_rate
    }

    /// Whether native looping is on
    pub fn is_looping(&self) -> bool {
        self.state().looping
    }

    /// Number of attached listeners
    pub fn listener_count(&self) -> usize {
        self.events.subscriber_count()
    }
}

impl Default for SimulatedDevice {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlaybackDevice for SimulatedDevice {
    fn load(&self, src: &str) {
        {
            let mut state = self.state();
            state.calls.push(DeviceCall::Load(src.to_string()));
            state.src = Some(src.to_string());
            state.current_time = 0.0;
            state.duration = None;
            state.paused = true;
        }
        self.events.emit(DeviceEvent::LoadStart);
    }

    async fn play(&self) -> Result<(), DeviceError> {
        let started = {
            let mut state = self.state();
            state.calls.push(DeviceCall::Play);
            if state.autoplay_blocked {
                return Err(DeviceError::NotAllowed);
            }
            if state.src.is_none() {
                return Err(DeviceError::SourceNotSupported);
            }
            if state.paused {
                state.paused = false;
                // Playing from the end restarts the track
                if state.duration.is_some_and(|d| state.current_time >= d) {
                    state.current_time = 0.0;
                }
                true
            } else {
                false
            }
        };
        if started {
            self.events.emit(DeviceEvent::Play);
        }
        Ok(())
    }

    fn pause(&self) {
        let paused = {
            let mut state = self.state();
            state.calls.push(DeviceCall::Pause);
            if state.paused {
                false
            } else {
                state.paused = true;
                true
            }
        };
        if paused {
            self.events.emit(DeviceEvent::Pause);
        }
    }

    fn seek(&self, position: f64) {
        let position = {
            let mut state = self.state();
            state.calls.push(DeviceCall::Seek(position));
            if state.src.is_none() {
                return;
            }
            let upper = state.duration.unwrap_or(f64::MAX);
            state.current_time = position.clamp(0.0, upper);
            state.current_time
        };
        self.events.emit(DeviceEvent::Seeking);
        self.events.emit(DeviceEvent::TimeUpdate(position));
        self.events.emit(DeviceEvent::Seeked(position));
    }

    fn set_volume(&self, volume: f64) {
        {
            let mut state = self.state();
            state.calls.push(DeviceCall::SetVolume(volume));
            state.volume = volume;
        }
        self.events.emit(DeviceEvent::VolumeChange(volume));
    }

    fn set_playback_rate(&self, rate: f64) {
        {
            let mut state = self.state();
            state.calls.push(DeviceCall::SetPlaybackRate(rate));
            state.playback_rate = rate;
        }
        self.events.emit(DeviceEvent::RateChange(rate));
    }

    fn set_loop(&self, looping: bool) {
        let mut state = self.state();
        state.calls.push(DeviceCall::SetLoop(looping));
        state.looping = looping;
    }

    fn release(&self) {
        let mut state = self.state();
        state.calls.push(DeviceCall::Release);
        state.src = None;
        state.current_time = 0.0;
        state.duration = None;
        state.paused = true;
    }

    fn current_time(&self) -> f64 {
        self.state().current_time
    }

    fn duration(&self) -> Option<f64> {
        self.state().duration
    }

    fn is_paused(&self) -> bool {
        self.state().paused
    }

    fn subscribe(&self, listener: DeviceListener) -> Subscription {
        self.events.subscribe(listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn record(device: &SimulatedDevice) -> (Arc<Mutex<Vec<DeviceEvent>>>, Subscription) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_clone = Arc::clone(&log);
        let sub = device.subscribe(Box::new(move |event| {
            log_clone.lock().unwrap().push(event.clone());
        }));
        (log, sub)
    }

    #[tokio::test]
    async fn natural_end_emits_timeupdate_pause_ended() {
        let device = SimulatedDevice::new();
        device.load("/a.mp3");
        device.finish_loading(10.0);
        device.play().await.unwrap();

        let (log, _sub) = record(&device);
        device.advance(12.0);

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                DeviceEvent::TimeUpdate(10.0),
                DeviceEvent::Pause,
                DeviceEvent::Ended
            ]
        );
        assert!(device.is_paused());
    }

    #[tokio::test]
    async fn looping_wraps_instead_of_ending() {
        let device = SimulatedDevice::new();
        device.load("/a.mp3");
        device.finish_loading(10.0);
        device.set_loop(true);
        device.play().await.unwrap();

        device.advance(12.0);
        assert!(!device.is_paused());
        assert!((device.current_time() - 2.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn blocked_autoplay_rejects_without_playing() {
        let device = SimulatedDevice::new();
        device.load("/a.mp3");
        device.block_autoplay(true);

        assert_eq!(device.play().await, Err(DeviceError::NotAllowed));
        assert!(device.is_paused());
    }

    #[test]
    fn seek_clamps_and_emits_seek_sequence() {
        let device = SimulatedDevice::new();
        device.load("/a.mp3");
        device.finish_loading(30.0);

        let (log, _sub) = record(&device);
        device.seek(45.0);

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                DeviceEvent::Seeking,
                DeviceEvent::TimeUpdate(30.0),
                DeviceEvent::Seeked(30.0)
            ]
        );
    }

    #[test]
    fn pause_when_paused_is_silent() {
        let device = SimulatedDevice::new();
        device.load("/a.mp3");
        let (log, _sub) = record(&device);
        device.pause();
        assert!(log.lock().unwrap().is_empty());
    }
}
