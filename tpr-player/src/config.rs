//! Configuration management for tpr-player
//!
//! Settings come from an optional TOML file; anything missing takes the
//! built-in default. Command-line flags override the file (applied by the
//! binary after loading).
//!
//! ```toml
//! recording_dir = "/var/lib/tpr/recordings/42"
//!
//! [playback]
//! speed = 2.0
//! skip_idle = true
//!
//! [queue]
//! low_watermark = 500
//! high_watermark = 1000
//!
//! [logging]
//! level = "debug"
//! ```

use crate::error::{Error, Result};
use crate::playback::queue::{Watermarks, DEFAULT_HIGH_WATERMARK, DEFAULT_LOW_WATERMARK};
use crate::playback::scheduler::{
    SchedulerSettings, DEFAULT_IDLE_CAP_MS, DEFAULT_PROGRESS_INTERVAL_MS,
};
use crate::playback::session::SessionOptions;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Top-level configuration file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlayerConfig {
    /// Recording directory used when none is given on the command line
    #[serde(default)]
    pub recording_dir: Option<PathBuf>,

    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Playback pacing settings
#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackConfig {
    /// Speed factor (> 0)
    #[serde(default = "default_speed")]
    pub speed: f64,

    /// Collapse long idle gaps to `idle_cap_ms`
    #[serde(default)]
    pub skip_idle: bool,

    #[serde(default = "default_idle_cap_ms")]
    pub idle_cap_ms: u64,

    /// Minimum virtual-time advance between progress reports
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,
}

/// Playback queue depth thresholds
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_low_watermark")]
    pub low_watermark: usize,

    #[serde(default = "default_high_watermark")]
    pub high_watermark: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_speed() -> f64 {
    1.0
}

fn default_idle_cap_ms() -> u64 {
    DEFAULT_IDLE_CAP_MS
}

fn default_progress_interval_ms() -> u64 {
    DEFAULT_PROGRESS_INTERVAL_MS
}

fn default_low_watermark() -> usize {
    DEFAULT_LOW_WATERMARK
}

fn default_high_watermark() -> usize {
    DEFAULT_HIGH_WATERMARK
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            speed: default_speed(),
            skip_idle: false,
            idle_cap_ms: default_idle_cap_ms(),
            progress_interval_ms: default_progress_interval_ms(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            low_watermark: default_low_watermark(),
            high_watermark: default_high_watermark(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl PlayerConfig {
    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let config: PlayerConfig = tpr_common::config::read_toml(path)?;
        config.validate()?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load `path` if given, else built-in defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                info!("No configuration file, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.playback.speed.is_finite() && self.playback.speed > 0.0) {
            return Err(Error::Config(format!(
                "playback.speed must be positive (got {})",
                self.playback.speed
            )));
        }
        if self.playback.progress_interval_ms == 0 {
            return Err(Error::Config(
                "playback.progress_interval_ms must be at least 1".to_string(),
            ));
        }
        self.watermarks()?;
        Ok(())
    }

    pub fn watermarks(&self) -> Result<Watermarks> {
        Watermarks::new(self.queue.low_watermark, self.queue.high_watermark)
    }

    /// Session parameters derived from this configuration
    pub fn session_options(&self) -> Result<SessionOptions> {
        self.validate()?;
        Ok(SessionOptions {
            speed: self.playback.speed,
            skip_idle: self.playback.skip_idle,
            watermarks: self.watermarks()?,
            scheduler: SchedulerSettings {
                idle_cap_ms: self.playback.idle_cap_ms,
                progress_interval_ms: self.playback.progress_interval_ms,
                total_ms: None,
            },
        })
    }
}
