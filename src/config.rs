//! Service configuration.
//!
//! Configuration is read from a TOML file (default `aquaguard.toml`, path
//! overridable with `AQUAGUARD_CONFIG`), then selected values can be
//! overridden from the environment (after loading `.env`). A missing file
//! is not an error: the rig's defaults are used. The result is always
//! validated before it is handed to the service.

use crate::alert::AlertThresholds;
use crate::devices::{self, Device};
use crate::logging::LogLevel;
use crate::model::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub const DEFAULT_CONFIG_PATH: &str = "aquaguard.toml";

pub const ENV_CONFIG_PATH: &str = "AQUAGUARD_CONFIG";
pub const ENV_OFFLINE_THRESHOLD_MS: &str = "AQUAGUARD_OFFLINE_THRESHOLD_MS";
pub const ENV_POLL_INTERVAL_MS: &str = "AQUAGUARD_POLL_INTERVAL_MS";
pub const ENV_LOG_LEVEL: &str = "AQUAGUARD_LOG_LEVEL";
pub const ENV_LOG_FILE: &str = "AQUAGUARD_LOG_FILE";

// ---------------------------------------------------------------------------
// Config sections
// ---------------------------------------------------------------------------

/// Liveness timing. Rig revisions disagree on the offline threshold
/// (8 s, 10 s, 20 s) so both values are explicit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    pub offline_threshold_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        LivenessConfig {
            offline_threshold_ms: 20_000,
            poll_interval_ms: 1_000,
        }
    }
}

impl LivenessConfig {
    pub fn offline_threshold(&self) -> Duration {
        Duration::from_millis(self.offline_threshold_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    /// Append log lines to this file instead of stderr.
    pub file: Option<String>,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LogLevel::Info,
            file: None,
            json: false,
        }
    }
}

/// Settings for the simulated feed used with `--dev`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevModeConfig {
    pub seed: u64,
    /// Interval between simulated environment rows and heartbeats.
    pub feed_interval_ms: u64,
    /// Number of historical points generated at startup.
    pub history_points: usize,
}

impl Default for DevModeConfig {
    fn default() -> Self {
        DevModeConfig {
            seed: 42,
            feed_interval_ms: 5_000,
            history_points: 50,
        }
    }
}

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub liveness: LivenessConfig,
    pub alerts: AlertThresholds,
    pub logging: LoggingConfig,
    pub dev_mode: DevModeConfig,
    pub devices: Vec<Device>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            liveness: LivenessConfig::default(),
            alerts: AlertThresholds::default(),
            logging: LoggingConfig::default(),
            dev_mode: DevModeConfig::default(),
            devices: devices::default_devices(),
        }
    }
}

impl AppConfig {
    /// Parses a config document. Sections left out keep their defaults.
    pub fn from_toml_str(text: &str, path: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
    }

    /// Applies overrides looked up by variable name. `lookup` is
    /// `std::env::var` in production; tests pass a map.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_OFFLINE_THRESHOLD_MS) {
            self.liveness.offline_threshold_ms = parse_override(ENV_OFFLINE_THRESHOLD_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_POLL_INTERVAL_MS) {
            self.liveness.poll_interval_ms = parse_override(ENV_POLL_INTERVAL_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_LOG_LEVEL) {
            self.logging.level = parse_override(ENV_LOG_LEVEL, &value)?;
        }
        if let Some(value) = lookup(ENV_LOG_FILE) {
            let value = value.trim();
            self.logging.file = (!value.is_empty()).then(|| value.to_string());
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.liveness.offline_threshold_ms == 0 {
            return Err(ConfigError::Invalid(
                "liveness.offline_threshold_ms must be greater than zero".to_string(),
            ));
        }
        if self.liveness.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "liveness.poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.dev_mode.feed_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "dev_mode.feed_interval_ms must be greater than zero".to_string(),
            ));
        }
        self.alerts
            .validate()
            .map_err(|msg| ConfigError::Invalid(format!("alerts: {}", msg)))?;
        devices::validate_devices(&self.devices)
            .map_err(|msg| ConfigError::Invalid(format!("devices: {}", msg)))?;
        Ok(())
    }
}

fn parse_override<T: std::str::FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidOverride {
        var: var.to_string(),
        value: value.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Loads the config file at `path`, applies environment overrides and
/// validates the result. A missing file yields the defaults.
pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    let mut config = if Path::new(path).exists() {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        AppConfig::from_toml_str(&text, path)?
    } else {
        info!(path, "no config file found, using defaults");
        AppConfig::default()
    };

    config.apply_overrides(|var| std::env::var(var).ok())?;
    config.validate()?;
    Ok(config)
}

/// Loads `.env`, then the config file named by `AQUAGUARD_CONFIG` (or
/// `explicit_path` when given, or `aquaguard.toml`).
pub fn load_config_from_env(explicit_path: Option<&str>) -> Result<AppConfig, ConfigError> {
    dotenv::dotenv().ok();
    let path = match explicit_path {
        Some(path) => path.to_string(),
        None => std::env::var(ENV_CONFIG_PATH).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string()),
    };
    load_config(&path)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
