//! Configuration loading and typed config structures for `OpsWatch`.
//!
//! The configuration lives in `opswatch.yaml`. This module defines
//! strongly-typed structs mirroring the YAML structure and a loader that
//! reads, applies environment overrides, and validates the file. Every
//! field has a default, so an empty document is a valid configuration.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but holds an unusable value.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level monitor configuration.
///
/// Mirrors the structure of `opswatch.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MonitorConfig {
    /// Alert cadence and signal toggles.
    #[serde(default)]
    pub alert: AlertConfig,

    /// Event repository selection and capacity.
    #[serde(default)]
    pub repository: RepositoryConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl MonitorConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override file values:
    /// - `OPSWATCH_LOG` overrides `logging.level`
    /// - `OPSWATCH_REPEAT_INTERVAL_SECONDS` overrides
    ///   `alert.repeat_interval_seconds`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value fails validation.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse_unvalidated(&contents)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate configuration from a YAML string.
    ///
    /// Environment overrides are not applied here.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value fails validation.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config = Self::parse_unvalidated(yaml)?;
        config.validate()?;
        Ok(config)
    }

    fn parse_unvalidated(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes to unit, not to an empty mapping.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Override values with environment variables when set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if an override is not parseable.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `OPSWATCH_*` overrides read through `lookup`.
    fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(val) = lookup("OPSWATCH_LOG") {
            self.logging.level = val;
        }
        if let Some(val) = lookup("OPSWATCH_REPEAT_INTERVAL_SECONDS") {
            self.alert.repeat_interval_seconds =
                val.trim().parse().map_err(|e| ConfigError::Invalid {
                    reason: format!("OPSWATCH_REPEAT_INTERVAL_SECONDS={val:?}: {e}"),
                })?;
        }
        Ok(())
    }

    /// Check every value for usability.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.alert.repeat_interval()?;
        if self.alert.max_active_alerts == 0 {
            return Err(ConfigError::Invalid {
                reason: "alert.max_active_alerts must be at least 1".to_owned(),
            });
        }
        if self.repository.max_events == Some(0) {
            return Err(ConfigError::Invalid {
                reason: "repository.max_events must be at least 1 when set".to_owned(),
            });
        }
        Ok(())
    }
}

/// Alert scheduling configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AlertConfig {
    /// Seconds between repeated alerts for the same unacknowledged event.
    #[serde(default = "default_repeat_interval_seconds")]
    pub repeat_interval_seconds: f64,

    /// Whether alert signals request an audible cue.
    #[serde(default = "default_true")]
    pub enable_sound: bool,

    /// Whether alert signals request a visual cue.
    #[serde(default = "default_true")]
    pub enable_visual: bool,

    /// Maximum number of alert timers running at once.
    #[serde(default = "default_max_active_alerts")]
    pub max_active_alerts: usize,
}

impl AlertConfig {
    /// The repeat interval as a [`Duration`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the interval is not a positive,
    /// finite, representable number of seconds.
    pub fn repeat_interval(&self) -> Result<Duration, ConfigError> {
        let secs = self.repeat_interval_seconds;
        if !secs.is_finite() || secs <= 0.0 {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "alert.repeat_interval_seconds must be a positive number, got {secs}"
                ),
            });
        }
        let interval = Duration::try_from_secs_f64(secs).map_err(|e| ConfigError::Invalid {
            reason: format!("alert.repeat_interval_seconds out of range: {e}"),
        })?;
        if interval.is_zero() {
            return Err(ConfigError::Invalid {
                reason: format!("alert.repeat_interval_seconds rounds to zero: {secs}"),
            });
        }
        Ok(interval)
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            repeat_interval_seconds: default_repeat_interval_seconds(),
            enable_sound: true,
            enable_visual: true,
            max_active_alerts: default_max_active_alerts(),
        }
    }
}

/// Which [`EventRepository`](crate::repository::EventRepository)
/// implementation backs the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepositoryKind {
    /// Process-local map; contents are lost on exit.
    #[default]
    InMemory,
}

/// What the repository does when `max_events` is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityPolicy {
    /// Refuse the new event with a capacity error.
    #[default]
    Reject,
    /// Drop the oldest stored event (lowest id) to make room.
    EvictOldest,
    /// Drop the oldest stored NORMAL event; refuse if there is none.
    EvictOldestNormal,
}

/// Event repository configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct RepositoryConfig {
    /// Repository implementation.
    #[serde(default, rename = "type")]
    pub kind: RepositoryKind,

    /// Maximum number of stored events (`None` = unbounded).
    #[serde(default)]
    pub max_events: Option<usize>,

    /// Behavior when `max_events` is reached.
    #[serde(default)]
    pub on_full: CapacityPolicy,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Tracing filter directive (e.g. `info`, `opswatch_core=debug`).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

const fn default_repeat_interval_seconds() -> f64 {
    30.0
}

const fn default_max_active_alerts() -> usize {
    1024
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_true() -> bool {
    true
}
