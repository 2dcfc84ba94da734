/// Structured logging for the AquaGuard monitoring service
///
/// Sets up `tracing` output (console or file, text or JSON) and provides
/// feed-aware helpers that tag every event with its data source and, where
/// known, the reporting device.

use crate::model::FeedError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::OpenOptions;
use std::str::FromStr;
use std::sync::Mutex;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    #[serde(alias = "warn")]
    Warning,
    Error,
}

impl LogLevel {
    /// Directive understood by `EnvFilter`.
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Data Source Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedSource {
    Heartbeat,
    Environment,
    Security,
    System,
}

impl fmt::Display for FeedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedSource::Heartbeat => write!(f, "HEARTBEAT"),
            FeedSource::Environment => write!(f, "ENV"),
            FeedSource::Security => write!(f, "SECURITY"),
            FeedSource::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - blank keep-alive lines, partial rows during a device reboot
    Expected,
    /// Unexpected failure - payload shape changed or the publisher is misconfigured
    Unexpected,
    /// Unknown - cannot determine if this is expected or not
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Classify a feed failure by its kind
pub fn classify_feed_failure(err: &FeedError) -> FailureType {
    match err {
        FeedError::Empty => FailureType::Expected,
        FeedError::Json(_) => FailureType::Unexpected,
        // Bad timestamps show up both from clock-less boards after a reset
        // and from real bugs.
        FeedError::InvalidTimestamp(_) => FailureType::Unknown,
    }
}

// ---------------------------------------------------------------------------
// Subscriber setup
// ---------------------------------------------------------------------------

/// Initialize the global subscriber.
///
/// `RUST_LOG` still wins over `min_level` when set, so a single module can
/// be turned up without touching the config file. Calling this twice is
/// harmless; the second call keeps the first subscriber.
pub fn init_logging(
    min_level: LogLevel,
    log_file: Option<&str>,
    json: bool,
) -> std::io::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(min_level.as_directive()));

    let writer = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(log_file.is_none())
        .with_target(false);

    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    Ok(())
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log a feed failure with automatic classification
pub fn log_feed_failure(
    source: FeedSource,
    device_id: Option<&str>,
    operation: &str,
    err: &FeedError,
) {
    let error_msg = err.to_string();
    let failure_type = classify_feed_failure(err);
    let source = source.to_string();
    let device = device_id.unwrap_or("-");

    match failure_type {
        FailureType::Expected => {
            debug!(%source, device, kind = %failure_type, "{} failed: {}", operation, error_msg)
        }
        FailureType::Unexpected => {
            error!(%source, device, kind = %failure_type, "{} failed: {}", operation, error_msg)
        }
        FailureType::Unknown => {
            warn!(%source, device, kind = %failure_type, "{} failed: {}", operation, error_msg)
        }
    }
}

// ---------------------------------------------------------------------------
// Liveness Summary Logging
// ---------------------------------------------------------------------------

/// Log how many devices are currently online
pub fn log_liveness_summary(total: usize, online: usize) {
    let source = FeedSource::System.to_string();
    if online == total {
        info!(%source, online, total, "all devices online");
    } else if online == 0 {
        error!(%source, online, total, "no devices online");
    } else {
        warn!(%source, online, total, "{} of {} devices offline", total - online, total);
    }
}
