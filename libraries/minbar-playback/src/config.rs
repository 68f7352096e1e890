//! Player configuration

use crate::error::{PlaybackError, Result};
use crate::retry::{Backoff, RetryPolicy};
use crate::sync::SegmentTolerance;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Every tunable of the engine and its controllers
///
/// All values are empirical UX constants. Every field has a default, so an
/// empty file or no file at all yields `PlayerConfig::default()`.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct PlayerConfig {
    #[serde(default)]
    pub engine: EngineSettings,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub checkpoint: CheckpointSettings,

    #[serde(default)]
    pub media_session: MediaSessionSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EngineSettings {
    /// Minimum time the loading skeleton stays on screen
    #[serde(default = "default_minimum_loading_ms")]
    pub minimum_loading_ms: u64,

    /// Volume restored by unmute when no non-zero level was ever set
    #[serde(default = "default_unmute_volume")]
    pub unmute_volume: f64,

    /// How long a saved track snapshot counts as resumable
    #[serde(default = "default_snapshot_freshness_secs")]
    pub snapshot_freshness_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SyncSettings {
    #[serde(default = "default_lead_in")]
    pub lead_in: f64,

    #[serde(default = "default_lead_out")]
    pub lead_out: f64,

    /// Transient highlight after a manual seek-to-segment
    #[serde(default = "default_flash_ms")]
    pub flash_ms: u64,

    /// Delay before re-running the active segment after a manual seek
    #[serde(default = "default_reconcile_ms")]
    pub reconcile_ms: u64,

    /// Distance from the viewport edge at which the player is nudged back in
    #[serde(default = "default_viewport_margin")]
    pub viewport_margin: f64,

    #[serde(default = "default_attach_attempts")]
    pub attach_attempts: u32,

    #[serde(default = "default_attach_interval_ms")]
    pub attach_interval_ms: u64,

    /// Multiply the attach interval by this factor after each miss
    /// (`None` polls at a fixed interval)
    #[serde(default)]
    pub attach_backoff_factor: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CheckpointSettings {
    #[serde(default = "default_checkpoint_interval_ms")]
    pub interval_ms: u64,

    /// Restored positions are clamped to `duration - end_margin`
    #[serde(default = "default_resume_end_margin")]
    pub resume_end_margin: f64,

    /// Delay between the restoring seek and auto-play
    #[serde(default = "default_resume_settle_ms")]
    pub resume_settle_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MediaSessionSettings {
    /// Default skip for seekbackward/seekforward (seconds)
    #[serde(default = "default_skip_offset")]
    pub skip_offset: f64,
}

fn default_minimum_loading_ms() -> u64 {
    1000
}

fn default_unmute_volume() -> f64 {
    0.5
}

fn default_snapshot_freshness_secs() -> u64 {
    3600
}

/// Upper bound for `snapshot_freshness_secs` (one year)
const MAX_SNAPSHOT_FRESHNESS_SECS: u64 = 365 * 24 * 3600;

fn default_lead_in() -> f64 {
    0.2
}

fn default_lead_out() -> f64 {
    0.1
}

fn default_flash_ms() -> u64 {
    700
}

fn default_reconcile_ms() -> u64 {
    150
}

fn default_viewport_margin() -> f64 {
    80.0
}

fn default_attach_attempts() -> u32 {
    10
}

fn default_attach_interval_ms() -> u64 {
    200
}

fn default_checkpoint_interval_ms() -> u64 {
    3000
}

fn default_resume_end_margin() -> f64 {
    1.0
}

fn default_resume_settle_ms() -> u64 {
    500
}

fn default_skip_offset() -> f64 {
    10.0
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            minimum_loading_ms: default_minimum_loading_ms(),
            unmute_volume: default_unmute_volume(),
            snapshot_freshness_secs: default_snapshot_freshness_secs(),
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            lead_in: default_lead_in(),
            lead_out: default_lead_out(),
            flash_ms: default_flash_ms(),
            reconcile_ms: default_reconcile_ms(),
            viewport_margin: default_viewport_margin(),
            attach_attempts: default_attach_attempts(),
            attach_interval_ms: default_attach_interval_ms(),
            attach_backoff_factor: None,
        }
    }
}

impl Default for CheckpointSettings {
    fn default() -> Self {
        Self {
            interval_ms: default_checkpoint_interval_ms(),
            resume_end_margin: default_resume_end_margin(),
            resume_settle_ms: default_resume_settle_ms(),
        }
    }
}

impl Default for MediaSessionSettings {
    fn default() -> Self {
        Self {
            skip_offset: default_skip_offset(),
        }
    }
}

impl PlayerConfig {
    /// Load configuration from an optional TOML file and the environment
    ///
    /// Environment variables use the `MINBAR` prefix with `__` between
    /// sections, e.g. `MINBAR__SYNC__LEAD_IN=0.3`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        if let Some(path) = path {
            if path.exists() {
                settings = settings.add_source(config::File::from(path));
            }
        }

        settings = settings.add_source(
            config::Environment::with_prefix("MINBAR")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = settings
            .build()
            .map_err(|e| PlaybackError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| PlaybackError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.sync.lead_in < 0.0 || self.sync.lead_out < 0.0 {
            return Err(PlaybackError::Config(
                "segment tolerances must not be negative".to_string(),
            ));
        }

        if self.checkpoint.interval_ms == 0 {
            return Err(PlaybackError::Config(
                "checkpoint interval must be greater than zero".to_string(),
            ));
        }

        if self.sync.attach_attempts == 0 || self.sync.attach_interval_ms == 0 {
            return Err(PlaybackError::Config(
                "attach retry needs at least one attempt and a non-zero interval".to_string(),
            ));
        }

        if let Some(factor) = self.sync.attach_backoff_factor {
            if factor < 1.0 {
                return Err(PlaybackError::Config(format!(
                    "attach backoff factor must be at least 1.0, got {factor}"
                )));
            }
        }

        if !(0.0..=1.0).contains(&self.engine.unmute_volume) || self.engine.unmute_volume == 0.0 {
            return Err(PlaybackError::Config(format!(
                "unmute volume must be in (0, 1], got {}",
                self.engine.unmute_volume
            )));
        }

        if self.engine.snapshot_freshness_secs > MAX_SNAPSHOT_FRESHNESS_SECS {
            return Err(PlaybackError::Config(format!(
                "snapshot freshness must be at most {MAX_SNAPSHOT_FRESHNESS_SECS} seconds, got {}",
                self.engine.snapshot_freshness_secs
            )));
        }

        if self.checkpoint.resume_end_margin < 0.0 || self.media_session.skip_offset <= 0.0 {
            return Err(PlaybackError::Config(
                "resume margin must not be negative and skip offset must be positive".to_string(),
            ));
        }

        Ok(())
    }

    pub fn minimum_loading(&self) -> Duration {
        Duration::from_millis(self.engine.minimum_loading_ms)
    }

    pub fn snapshot_freshness(&self) -> chrono::Duration {
        let secs = self
            .engine
            .snapshot_freshness_secs
            .min(MAX_SNAPSHOT_FRESHNESS_SECS);
        chrono::Duration::seconds(i64::try_from(secs).unwrap_or_default())
    }

    pub fn tolerance(&self) -> SegmentTolerance {
        SegmentTolerance {
            lead_in: self.sync.lead_in,
            lead_out: self.sync.lead_out,
        }
    }

    pub fn attach_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.sync.attach_attempts,
            interval: Duration::from_millis(self.sync.attach_interval_ms),
            backoff: match self.sync.attach_backoff_factor {
                Some(factor) => Backoff::Exponential { factor },
                None => Backoff::Fixed,
            },
        }
    }

    pub fn flash(&self) -> Duration {
        Duration::from_millis(self.sync.flash_ms)
    }

    pub fn reconcile_delay(&self) -> Duration {
        Duration::from_millis(self.sync.reconcile_ms)
    }

    pub fn checkpoint_interval(&self) -> Duration {
        Duration::from_millis(self.checkpoint.interval_ms)
    }

    pub fn resume_settle(&self) -> Duration {
        Duration::from_millis(self.checkpoint.resume_settle_ms)
    }
}
