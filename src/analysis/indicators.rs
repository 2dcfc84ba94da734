/// Per-sensor status indicators.
///
/// Cards show the optimal ranges "22-28°C" and "< 500 ppm"; values drift
/// through a caution band before turning critical.

use crate::model::EnvironmentReading;
use serde::Serialize;

/// Colour class of a sensor card, in ascending order of concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Indicator {
    /// No value reported yet.
    Unknown,
    Normal,
    Caution,
    Critical,
}

pub const TEMPERATURE_CRITICAL_LOW_C: f64 = 20.0;
pub const TEMPERATURE_CAUTION_LOW_C: f64 = 22.0;
pub const TEMPERATURE_CAUTION_HIGH_C: f64 = 28.0;
pub const TEMPERATURE_CRITICAL_HIGH_C: f64 = 30.0;

pub const TDS_CAUTION_PPM: f64 = 500.0;
pub const TDS_CRITICAL_PPM: f64 = 600.0;

pub fn temperature_indicator(temperature_c: Option<f64>) -> Indicator {
    match temperature_c.filter(|t| t.is_finite()) {
        None => Indicator::Unknown,
        Some(t) if t < TEMPERATURE_CRITICAL_LOW_C || t > TEMPERATURE_CRITICAL_HIGH_C => {
            Indicator::Critical
        }
        Some(t) if t < TEMPERATURE_CAUTION_LOW_C || t > TEMPERATURE_CAUTION_HIGH_C => {
            Indicator::Caution
        }
        Some(_) => Indicator::Normal,
    }
}

pub fn tds_indicator(tds_ppm: Option<f64>) -> Indicator {
    match tds_ppm.filter(|v| v.is_finite()) {
        None => Indicator::Unknown,
        Some(v) if v > TDS_CRITICAL_PPM => Indicator::Critical,
        Some(v) if v > TDS_CAUTION_PPM => Indicator::Caution,
        Some(_) => Indicator::Normal,
    }
}

/// Motion is always flagged critical on the security card.
pub fn motion_indicator(motion_detected: bool) -> Indicator {
    if motion_detected {
        Indicator::Critical
    } else {
        Indicator::Normal
    }
}

pub fn day_night_label(is_night: bool) -> &'static str {
    if is_night { "Night" } else { "Day" }
}

/// All card indicators for one reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardIndicators {
    pub temperature: Indicator,
    pub tds: Indicator,
    pub motion: Indicator,
    pub period: &'static str,
}

pub fn card_indicators(reading: &EnvironmentReading) -> CardIndicators {
    CardIndicators {
        temperature: temperature_indicator(reading.temperature_c),
        tds: tds_indicator(reading.tds_ppm),
        motion: motion_indicator(reading.motion_detected),
        period: day_night_label(reading.is_night),
    }
}
