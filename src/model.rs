/// Core data types for the AquaGuard fish-farm monitoring service.
///
/// This module defines the shared domain model imported by all other modules:
/// heartbeat records, derived device statuses, environment readings, alert
/// results, and the error types raised by the host layer (config, feeds).
/// Evaluation logic lives in `alert::thresholds` and `alert::stalenesses`.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// Milliseconds since the Unix epoch, UTC. All feed timestamps are
/// normalized to this before they reach the evaluators.
pub type EpochMillis = i64;

/// Device id assumed for heartbeat rows that do not name their sender.
/// Early rig revisions only had the one controller.
pub const MAIN_DEVICE_ID: &str = "main";

/// Device id of the security camera controller.
pub const CAMERA_DEVICE_ID: &str = "camera";

// ---------------------------------------------------------------------------
// Liveness types
// ---------------------------------------------------------------------------

/// The most recent heartbeat observed from one physical device.
///
/// Owned by `LivenessMonitor`; only ever overwritten with a newer timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatRecord {
    pub device_id: String,
    pub last_seen: EpochMillis,
}

/// Online/offline classification of a device at a given instant.
///
/// Derived on every evaluation, never persisted. `last_seen` is `None`
/// for a device that has never sent a heartbeat, which is always offline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub device_id: String,
    pub is_online: bool,
    pub last_seen: Option<EpochMillis>,
}

impl DeviceStatus {
    /// Status of a device that has never reported.
    pub fn never_seen(device_id: &str) -> Self {
        DeviceStatus {
            device_id: device_id.to_string(),
            is_online: false,
            last_seen: None,
        }
    }

    pub fn label(&self) -> &'static str {
        if self.is_online { "Online" } else { "Offline" }
    }
}

// ---------------------------------------------------------------------------
// Reading types
// ---------------------------------------------------------------------------

/// Latest combined environment + security snapshot of the rig.
///
/// Environment rows fill the sensor fields and `timestamp`; security rows
/// fill `motion_detected` and `is_night`. A reading whose `timestamp` is
/// `None` means no environment row has arrived yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentReading {
    pub temperature_c: Option<f64>,
    pub tds_ppm: Option<f64>,
    pub light_lux: Option<f64>,
    pub motion_detected: bool,
    pub is_night: bool,
    pub timestamp: Option<EpochMillis>,
}

impl EnvironmentReading {
    /// True once at least one environment row has been merged in.
    pub fn has_data(&self) -> bool {
        self.timestamp.is_some()
    }
}

// ---------------------------------------------------------------------------
// Alert types
// ---------------------------------------------------------------------------

/// Alert severity levels, in ascending order of severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    None,
    Low,
    Medium,
    High,
}

impl Severity {
    /// Panel heading shown on the dashboard. `None` has no alert to title.
    pub fn title(self) -> Option<&'static str> {
        match self {
            Severity::None => None,
            Severity::Low => Some("Low Severity Alert"),
            Severity::Medium => Some("Medium Severity Alert"),
            Severity::High => Some("High Severity Alert"),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::None => write!(f, "none"),
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
        }
    }
}

/// Outcome of classifying one `EnvironmentReading`.
///
/// Superseded by the next classification; there is no alert history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertResult {
    pub severity: Severity,
    pub reason: String,
}

impl AlertResult {
    pub fn is_alert(&self) -> bool {
        self.severity > Severity::None
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised while loading or validating the service configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// An environment override was set but could not be parsed.
    #[error("invalid value for {var}: {value:?}")]
    InvalidOverride { var: String, value: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors raised while adapting an external feed payload.
///
/// These stay at the ingest boundary; a malformed row never reaches the
/// evaluators.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("Parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid timestamp: {0:?}")]
    InvalidTimestamp(String),
    #[error("Empty payload")]
    Empty,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::None < Severity::Low);
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
    }

    #[test]
    fn test_severity_serializes_lowercase() {
        let json = serde_json::to_string(&Severity::Medium).expect("severity should serialize");
        assert_eq!(json, "\"medium\"");
        assert_eq!(Severity::High.to_string(), "high");
    }

    #[test]
    fn test_severity_titles_match_panel_headings() {
        assert_eq!(Severity::None.title(), None);
        assert_eq!(Severity::High.title(), Some("High Severity Alert"));
    }

    #[test]
    fn test_default_reading_has_no_data() {
        let reading = EnvironmentReading::default();
        assert!(!reading.has_data());
        assert!(!reading.motion_detected);
    }

    #[test]
    fn test_never_seen_status_is_offline() {
        let status = DeviceStatus::never_seen(CAMERA_DEVICE_ID);
        assert!(!status.is_online);
        assert_eq!(status.last_seen, None);
        assert_eq!(status.label(), "Offline");
    }
}
