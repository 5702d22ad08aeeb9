//! # Fleet Configuration
//!
//! Thresholds and storage settings consumed by the coordinator. Every
//! component receives its own section by value at construction time.
//!
//! ## Example: TOML Configuration
//!
//! ```toml
//! [detection]
//! failure_threshold = 0.7
//! failure_window_seconds = 30
//! default_estimated_minutes = 60
//!
//! [inventory]
//! alert_threshold = 0.15
//!
//! [storage]
//! snapshot_path = "fleet-state.json"
//!
//! [logging]
//! level = "info"
//! ```
//!
//! Missing sections and fields fall back to the defaults shown above
//! (`snapshot_path` defaults to none, i.e. memory only).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration for the fleet coordinator.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub inventory: InventoryConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Failure monitor settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DetectionConfig {
    /// A frame is a failure when its best score is strictly above this.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: f32,
    /// Trailing window of material attributed to a job when it is force-failed.
    #[serde(default = "default_failure_window_seconds")]
    pub failure_window_seconds: u32,
    /// Job duration assumed when a job carries no estimate.
    #[serde(default = "default_estimated_minutes")]
    pub default_estimated_minutes: u32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            failure_window_seconds: default_failure_window_seconds(),
            default_estimated_minutes: default_estimated_minutes(),
        }
    }
}

/// Material ledger settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InventoryConfig {
    /// Remaining fraction at or below which a spool counts as low.
    #[serde(default = "default_alert_threshold")]
    pub alert_threshold: f64,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            alert_threshold: default_alert_threshold(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
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

impl Config {
    /// Range-check thresholds and windows.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.detection.failure_threshold;
        if !threshold.is_finite() || threshold <= 0.0 || threshold > 1.0 {
            return Err(ConfigError::Invalid(format!(
                "detection.failure_threshold must be in (0, 1], got {}",
                threshold
            )));
        }
        if self.detection.failure_window_seconds == 0 {
            return Err(ConfigError::Invalid("detection.failure_window_seconds must be > 0".to_string()));
        }
        if self.detection.default_estimated_minutes == 0 {
            return Err(ConfigError::Invalid("detection.default_estimated_minutes must be > 0".to_string()));
        }
        let alert = self.inventory.alert_threshold;
        if !alert.is_finite() || !(0.0..=1.0).contains(&alert) {
            return Err(ConfigError::Invalid(format!(
                "inventory.alert_threshold must be in [0, 1], got {}",
                alert
            )));
        }
        self.logging
            .level
            .parse::<tracing::Level>()
            .map_err(|_| ConfigError::Invalid(format!("logging.level '{}' is not a tracing level", self.logging.level)))?;
        Ok(())
    }

    /// The configured log level, falling back to INFO when unparsable.
    pub fn log_level(&self) -> tracing::Level {
        self.logging.level.parse().unwrap_or(tracing::Level::INFO)
    }
}

// Default value functions
fn default_failure_threshold() -> f32 { 0.7 }
fn default_failure_window_seconds() -> u32 { 30 }
fn default_estimated_minutes() -> u32 { 60 }
fn default_alert_threshold() -> f64 { 0.15 }
fn default_log_level() -> String { "info".to_string() }

/// Load configuration from a TOML file at the given path and validate it.
pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            tracing::error!("Failed to read config file '{}': {}", path, e);
            return Err(ConfigError::Io(e));
        }
    };
    let config: Config = match toml::from_str(&contents) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to parse config TOML: {}", e);
            return Err(ConfigError::Toml(e));
        }
    };
    config.validate()?;
    Ok(config)
}
