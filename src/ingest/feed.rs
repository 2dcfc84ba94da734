/// Realtime database feed adapter
///
/// The rig's controllers write rows into three tables of a hosted realtime
/// database: `heartbeat`, `environment`, and `security`. A bridge process
/// forwards each inserted row as one JSON line tagged with its table name:
///
/// ```text
/// {"table":"heartbeat","device_id":"camera","last_seen":"2024-05-01T13:00:00Z"}
/// {"table":"environment","temperature":25.4,"tds":412,"light":780,"timestamp":1714568400000}
/// {"table":"security","motion_detected":true,"day_night":"night"}
/// ```
///
/// This module turns those rows into the core's inputs. Timestamps may be
/// epoch milliseconds or RFC 3339 strings and are normalized to
/// `EpochMillis` here, so nothing past this boundary sees a raw payload.

use chrono::{DateTime, NaiveDateTime};
use serde::Deserialize;

use crate::model::{EnvironmentReading, EpochMillis, FeedError, HeartbeatRecord, MAIN_DEVICE_ID};

// ============================================================================
// Row Structures
// ============================================================================

/// Timestamp as written by the controllers or the database.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Millis(i64),
    Text(String),
}

impl RawTimestamp {
    pub fn to_epoch_millis(&self) -> Result<EpochMillis, FeedError> {
        match self {
            RawTimestamp::Millis(ms) => Ok(*ms),
            RawTimestamp::Text(text) => parse_timestamp(text),
        }
    }
}

/// Row of the `heartbeat` table.
#[derive(Debug, Clone, Deserialize)]
pub struct HeartbeatRow {
    /// Single-controller rigs omit this; they report as `main`.
    #[serde(default)]
    pub device_id: Option<String>,
    pub last_seen: RawTimestamp,
}

/// Row of the `environment` table.
#[derive(Debug, Clone, Deserialize)]
pub struct EnvironmentRow {
    pub temperature: Option<f64>,
    pub tds: Option<f64>,
    pub light: Option<f64>,
    pub timestamp: RawTimestamp,
}

/// Row of the `security` table.
#[derive(Debug, Clone, Deserialize)]
pub struct SecurityRow {
    #[serde(default)]
    pub motion_detected: bool,
    /// "day" or "night" as reported by the camera's light sensor.
    pub day_night: String,
    #[serde(default)]
    pub timestamp: Option<RawTimestamp>,
}

impl SecurityRow {
    pub fn is_night(&self) -> bool {
        self.day_night.trim().eq_ignore_ascii_case("night")
    }
}

/// One forwarded row, tagged by source table.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "table", rename_all = "lowercase")]
pub enum FeedEvent {
    Heartbeat(HeartbeatRow),
    Environment(EnvironmentRow),
    Security(SecurityRow),
}

// ============================================================================
// Parsing
// ============================================================================

/// Formats with an explicit offset, tried after RFC 3339. `%#z` accepts
/// the short `+00` offsets Postgres prints.
const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M:%S%.f%#z"];

/// Formats without an offset, as written by `timestamp without time zone`
/// columns. These are read as UTC.
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parses a feed timestamp into epoch millis.
///
/// Accepts, in order: a bare integer string (epoch millis), RFC 3339,
/// date-time with a numeric offset, and naive date-time taken as UTC.
pub fn parse_timestamp(text: &str) -> Result<EpochMillis, FeedError> {
    let trimmed = text.trim();
    if let Ok(ms) = trimmed.parse::<i64>() {
        return Ok(ms);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.timestamp_millis());
    }
    if let Some(dt) = OFFSET_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(trimmed, fmt).ok())
    {
        return Ok(dt.timestamp_millis());
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .map(|naive| naive.and_utc().timestamp_millis())
        .ok_or_else(|| FeedError::InvalidTimestamp(text.to_string()))
}

/// Parses one line of the forwarded feed. Blank lines are `FeedError::Empty`.
pub fn parse_feed_line(line: &str) -> Result<FeedEvent, FeedError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(FeedError::Empty);
    }
    Ok(serde_json::from_str(line)?)
}

/// Converts a heartbeat row into the record the liveness monitor stores.
pub fn heartbeat_record(row: &HeartbeatRow) -> Result<HeartbeatRecord, FeedError> {
    let device_id = row
        .device_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .unwrap_or(MAIN_DEVICE_ID);
    Ok(HeartbeatRecord {
        device_id: device_id.to_string(),
        last_seen: row.last_seen.to_epoch_millis()?,
    })
}

// ============================================================================
// Merging into the latest reading
// ============================================================================

/// Overwrites the sensor values and timestamp of `reading` with an
/// environment row. Motion and night flags are left alone.
///
/// On error `reading` is unchanged.
pub fn apply_environment(
    reading: &mut EnvironmentReading,
    row: &EnvironmentRow,
) -> Result<(), FeedError> {
    let timestamp = row.timestamp.to_epoch_millis()?;
    reading.temperature_c = row.temperature;
    reading.tds_ppm = row.tds;
    reading.light_lux = row.light;
    reading.timestamp = Some(timestamp);
    Ok(())
}

/// Overwrites the motion and night flags of `reading` with a security row.
/// Sensor values and the reading's timestamp are left alone.
///
/// The row's own timestamp is optional but must parse when present. On
/// error `reading` is unchanged.
pub fn apply_security(reading: &mut EnvironmentReading, row: &SecurityRow) -> Result<(), FeedError> {
    if let Some(timestamp) = &row.timestamp {
        timestamp.to_epoch_millis()?;
    }
    reading.motion_detected = row.motion_detected;
    reading.is_night = row.is_night();
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
