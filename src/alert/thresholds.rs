//! Water-quality and security threshold classification.
//!
//! Maps the latest `EnvironmentReading` to a single `AlertResult` using a
//! fixed band table. Every band is evaluated and the highest severity wins;
//! the reason names each factor at that severity. Classification is a pure
//! function of the reading and the configured thresholds.

use crate::model::{AlertResult, EnvironmentReading, Severity};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Threshold table
// ---------------------------------------------------------------------------

/// Band edges for the alert table.
///
/// Temperature edges must be strictly ascending:
///   critical_low < moderate_low < optimal_low < optimal_high < moderate_high < critical_high
///
/// TDS edges likewise: slightly_high (if set) < high < very_high.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    pub temperature_critical_low_c: f64,
    pub temperature_moderate_low_c: f64,
    pub temperature_optimal_low_c: f64,
    pub temperature_optimal_high_c: f64,
    pub temperature_moderate_high_c: f64,
    pub temperature_critical_high_c: f64,
    /// Lower edge of the "slightly high" TDS band. Unset by default: the
    /// rig treats anything under `tds_high_ppm` as within the optimal range.
    pub tds_slightly_high_ppm: Option<f64>,
    pub tds_high_ppm: f64,
    pub tds_very_high_ppm: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        AlertThresholds {
            temperature_critical_low_c: 15.0,
            temperature_moderate_low_c: 20.0,
            temperature_optimal_low_c: 22.0,
            temperature_optimal_high_c: 28.0,
            temperature_moderate_high_c: 30.0,
            temperature_critical_high_c: 35.0,
            tds_slightly_high_ppm: None,
            tds_high_ppm: 500.0,
            tds_very_high_ppm: 700.0,
        }
    }
}

impl AlertThresholds {
    /// Checks that every band edge is finite and the edges are ordered.
    pub fn validate(&self) -> Result<(), String> {
        let temperature = [
            ("temperature_critical_low_c", self.temperature_critical_low_c),
            ("temperature_moderate_low_c", self.temperature_moderate_low_c),
            ("temperature_optimal_low_c", self.temperature_optimal_low_c),
            ("temperature_optimal_high_c", self.temperature_optimal_high_c),
            ("temperature_moderate_high_c", self.temperature_moderate_high_c),
            ("temperature_critical_high_c", self.temperature_critical_high_c),
        ];
        check_ascending(&temperature)?;

        let mut tds = Vec::with_capacity(3);
        if let Some(slight) = self.tds_slightly_high_ppm {
            tds.push(("tds_slightly_high_ppm", slight));
        }
        tds.push(("tds_high_ppm", self.tds_high_ppm));
        tds.push(("tds_very_high_ppm", self.tds_very_high_ppm));
        check_ascending(&tds)
    }
}

fn check_ascending(edges: &[(&str, f64)]) -> Result<(), String> {
    for (name, value) in edges {
        if !value.is_finite() {
            return Err(format!("{} must be a finite number, got {}", name, value));
        }
    }
    for pair in edges.windows(2) {
        let (lower_name, lower) = pair[0];
        let (upper_name, upper) = pair[1];
        if lower >= upper {
            return Err(format!(
                "{} ({}) must be below {} ({})",
                lower_name, lower, upper_name, upper
            ));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Bands
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TemperatureBand {
    Optimal,
    Slight,
    Moderate,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TdsBand {
    Normal,
    Slight,
    High,
    VeryHigh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FactorKind {
    Temperature,
    Tds,
    Motion,
}

/// One abnormal condition found in a reading.
#[derive(Debug, Clone)]
struct Factor {
    kind: FactorKind,
    severity: Severity,
    description: String,
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

/// Deterministic alert classifier over a configured threshold table.
#[derive(Debug, Clone, Default)]
pub struct AlertClassifier {
    thresholds: AlertThresholds,
}

impl AlertClassifier {
    pub fn new(thresholds: AlertThresholds) -> Self {
        AlertClassifier { thresholds }
    }

    pub fn thresholds(&self) -> &AlertThresholds {
        &self.thresholds
    }

    /// Classifies a reading.
    ///
    /// Readings without a timestamp have not received any environment data
    /// yet and always classify as `Severity::None`. Missing or non-finite
    /// sensor values contribute no factor.
    ///
    /// Severity rules:
    /// - high: critical temperature AND very high TDS AND motion at night
    /// - medium: moderately out-of-range temperature, high TDS, or motion
    ///   at night; also any critical factor on its own
    /// - low: slightly out-of-range temperature, slightly high TDS (when
    ///   that band is configured), or daytime motion
    pub fn classify(&self, reading: &EnvironmentReading) -> AlertResult {
        if !reading.has_data() {
            return AlertResult {
                severity: Severity::None,
                reason: "No data yet".to_string(),
            };
        }

        let mut factors = Vec::new();
        let temperature = reading.temperature_c.filter(|t| t.is_finite());
        let tds = reading.tds_ppm.filter(|t| t.is_finite());
        let intruder = reading.motion_detected && reading.is_night;

        let temperature_band = temperature.map(|t| (t, self.temperature_band(t)));
        match temperature_band {
            Some((t, TemperatureBand::Critical)) => factors.push(Factor {
                kind: FactorKind::Temperature,
                severity: Severity::Medium,
                description: format!("Critical temperature: {:.1}°C", t),
            }),
            Some((t, TemperatureBand::Moderate)) => factors.push(Factor {
                kind: FactorKind::Temperature,
                severity: Severity::Medium,
                description: format!("Temperature out of range: {:.1}°C", t),
            }),
            Some((t, TemperatureBand::Slight)) => factors.push(Factor {
                kind: FactorKind::Temperature,
                severity: Severity::Low,
                description: format!("Temperature slightly out of range: {:.1}°C", t),
            }),
            Some((_, TemperatureBand::Optimal)) | None => {}
        }

        let tds_band = tds.map(|v| (v, self.tds_band(v)));
        match tds_band {
            Some((v, TdsBand::VeryHigh)) => factors.push(Factor {
                kind: FactorKind::Tds,
                severity: Severity::Medium,
                description: format!("Very high TDS level: {:.0} ppm", v),
            }),
            Some((v, TdsBand::High)) => factors.push(Factor {
                kind: FactorKind::Tds,
                severity: Severity::Medium,
                description: format!("High TDS level: {:.0} ppm", v),
            }),
            Some((v, TdsBand::Slight)) => factors.push(Factor {
                kind: FactorKind::Tds,
                severity: Severity::Low,
                description: format!("Slightly high TDS level: {:.0} ppm", v),
            }),
            Some((_, TdsBand::Normal)) | None => {}
        }

        if intruder {
            factors.push(Factor {
                kind: FactorKind::Motion,
                severity: Severity::Medium,
                description: "Motion detected at night".to_string(),
            });
        } else if reading.motion_detected {
            factors.push(Factor {
                kind: FactorKind::Motion,
                severity: Severity::Low,
                description: "Motion detected".to_string(),
            });
        }

        let critical_temperature = matches!(temperature_band, Some((_, TemperatureBand::Critical)));
        let very_high_tds = matches!(tds_band, Some((_, TdsBand::VeryHigh)));
        if critical_temperature && very_high_tds && intruder {
            for factor in &mut factors {
                factor.severity = Severity::High;
            }
        }

        summarize(&factors)
    }

    fn temperature_band(&self, t: f64) -> TemperatureBand {
        let th = &self.thresholds;
        if t < th.temperature_critical_low_c || t > th.temperature_critical_high_c {
            TemperatureBand::Critical
        } else if t < th.temperature_moderate_low_c || t > th.temperature_moderate_high_c {
            TemperatureBand::Moderate
        } else if t < th.temperature_optimal_low_c || t > th.temperature_optimal_high_c {
            TemperatureBand::Slight
        } else {
            TemperatureBand::Optimal
        }
    }

    fn tds_band(&self, ppm: f64) -> TdsBand {
        let th = &self.thresholds;
        if ppm > th.tds_very_high_ppm {
            TdsBand::VeryHigh
        } else if ppm >= th.tds_high_ppm {
            TdsBand::High
        } else if th.tds_slightly_high_ppm.is_some_and(|slight| ppm >= slight) {
            TdsBand::Slight
        } else {
            TdsBand::Normal
        }
    }
}

/// Takes the maximum severity over all factors and names every factor
/// that reached it, in temperature, TDS, motion order.
fn summarize(factors: &[Factor]) -> AlertResult {
    let severity = factors
        .iter()
        .map(|f| f.severity)
        .max()
        .unwrap_or(Severity::None);

    if severity == Severity::None {
        return AlertResult {
            severity,
            reason: "All systems normal".to_string(),
        };
    }

    let mut winning: Vec<&Factor> = factors.iter().filter(|f| f.severity == severity).collect();
    winning.sort_by_key(|f| f.kind as u8);
    let reason = winning
        .iter()
        .map(|f| f.description.as_str())
        .collect::<Vec<_>>()
        .join("; ");

    AlertResult { severity, reason }
}

/// Classifies a reading against the default threshold table.
pub fn classify(reading: &EnvironmentReading) -> AlertResult {
    AlertClassifier::default().classify(reading)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
