//! Volume control
//!
//! Muting is volume zero. There is no separate mute flag: `is_muted()` is
//! derived from the level, and unmuting restores the last non-zero level the
//! user set explicitly (or a configured fallback when there is none).

/// Volume controller
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    /// Output level (0.0 - 1.0)
    level: f64,

    /// Last non-zero level set through `set`
    last_audible: Option<f64>,

    /// Restored by unmute when nothing audible was ever set
    fallback: f64,
}

impl Volume {
    /// Create a controller at full volume
    ///
    /// The initial level does not count as explicitly set, so muting and then
    /// unmuting a fresh controller lands on `fallback`, not 1.0.
    pub fn new(fallback: f64) -> Self {
        Self {
            level: 1.0,
            last_audible: None,
            fallback: fallback.clamp(0.0, 1.0),
        }
    }

    /// Set output level, clamped to 0.0 - 1.0
    pub fn set(&mut self, level: f64) {
        let level = if level.is_nan() { 0.0 } else { level.clamp(0.0, 1.0) };
        if level > 0.0 {
            self.last_audible = Some(level);
        }
        self.level = level;
    }

    /// Current output level
    pub fn level(&self) -> f64 {
        self.level
    }

    /// Whether output is silent
    pub fn is_muted(&self) -> bool {
        self.level == 0.0
    }

    /// Mute if audible, otherwise restore the pre-mute level
    pub fn toggle_mute(&mut self) {
        if self.is_muted() {
            self.level = self.last_audible.unwrap_or(self.fallback);
        } else {
            self.level = 0.0;
        }
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self::new(0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmute_restores_last_set_level() {
        let mut volume = Volume::default();
        volume.set(0.7);
        volume.toggle_mute();
        assert!(volume.is_muted());
        volume.toggle_mute();
        assert_eq!(volume.level(), 0.7);
    }

    #[test]
    fn unmute_without_history_uses_fallback() {
        let mut volume = Volume::default();
        volume.set(0.0);
        assert!(volume.is_muted());
        volume.toggle_mute();
        assert_eq!(volume.level(), 0.5);
    }

    #[test]
    fn initial_level_is_not_history() {
        let mut volume = Volume::new(0.5);
        volume.toggle_mute();
        volume.toggle_mute();
        assert_eq!(volume.level(), 0.5);
    }

    #[test]
    fn set_zero_after_level_restores_that_level() {
        let mut volume = Volume::default();
        volume.set(0.3);
        volume.set(0.0);
        volume.toggle_mute();
        assert_eq!(volume.level(), 0.3);
    }

    #[test]
    fn clamps_out_of_range() {
        let mut volume = Volume::default();
        volume.set(1.5);
        assert_eq!(volume.level(), 1.0);
        volume.set(-0.2);
        assert_eq!(volume.level(), 0.0);
    }
}
