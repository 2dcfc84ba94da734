/// Development mode utilities for running without the sensor rig
///
/// When no controller is connected, use this module to generate a
/// plausible history and a live simulated feed. Generation is seeded, so
/// the same seed always replays the same data.

use crate::config::DevModeConfig;
use crate::hub::MonitorHub;
use crate::ingest::feed::{EnvironmentRow, RawTimestamp, SecurityRow};
use crate::model::{EnvironmentReading, EpochMillis, HeartbeatRecord};
use chrono::{DateTime, Timelike, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Spacing of generated history points.
pub const HISTORY_SPACING: Duration = Duration::from_secs(15 * 60);

/// Chance per simulated tick that the camera reports motion.
const MOTION_PROBABILITY: f64 = 0.05;

/// Random-walk simulator for the rig's sensors
pub struct DevMode {
    pub seed: u64,
    rng: StdRng,
    temperature_c: f64,
    tds_ppm: f64,
    light_lux: f64,
}

impl DevMode {
    /// Create a new simulator starting from typical tank values
    ///
    /// # Arguments
    /// * `seed` - Seed for the random walk
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: StdRng::seed_from_u64(seed),
            temperature_c: 25.0,
            tds_ppm: 400.0,
            light_lux: 800.0,
        }
    }

    /// Advance the walk one step and return a reading stamped `timestamp`
    ///
    /// Temperature is rounded to 0.1 °C, TDS and light to whole units.
    pub fn next_reading(&mut self, timestamp: EpochMillis) -> EnvironmentReading {
        self.temperature_c += self.rng.gen_range(-0.25..0.25);
        self.tds_ppm += self.rng.gen_range(-5.0..5.0);
        self.light_lux += self.rng.gen_range(-25.0..25.0);

        EnvironmentReading {
            temperature_c: Some((self.temperature_c * 10.0).round() / 10.0),
            tds_ppm: Some(self.tds_ppm.round()),
            light_lux: Some(self.light_lux.round().max(0.0)),
            motion_detected: false,
            is_night: is_night_at(timestamp),
            timestamp: Some(timestamp),
        }
    }

    /// Generate `num_points` readings spaced 15 minutes apart, the last
    /// one stamped `end`
    pub fn generate_history(&mut self, num_points: usize, end: EpochMillis) -> Vec<EnvironmentReading> {
        let spacing = HISTORY_SPACING.as_millis() as i64;
        (0..num_points)
            .map(|i| {
                let steps_back = (num_points - 1 - i) as i64;
                self.next_reading(end - steps_back * spacing)
            })
            .collect()
    }

    /// Roll whether the camera sees motion this tick
    pub fn next_motion(&mut self) -> bool {
        self.rng.gen_bool(MOTION_PROBABILITY)
    }
}

/// Night is 19:00 to 06:00 UTC for simulated data.
pub fn is_night_at(timestamp: EpochMillis) -> bool {
    DateTime::<Utc>::from_timestamp_millis(timestamp)
        .map(|dt| {
            let hour = dt.hour();
            hour >= 19 || hour < 6
        })
        .unwrap_or(false)
}

/// Feeds the hub with simulated heartbeats and sensor rows until canceled.
///
/// Every tick sends a heartbeat from each device in `device_ids`, one
/// environment row and one security row, all stamped with the hub's clock.
pub fn spawn_simulated_feed(
    hub: Arc<MonitorHub>,
    device_ids: Vec<String>,
    config: &DevModeConfig,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let mut dev = DevMode::new(config.seed);
    let interval = Duration::from_millis(config.feed_interval_ms.max(1));
    tokio::spawn(async move {
        info!(seed = dev.seed, interval_ms = interval.as_millis() as u64, "simulated feed started");
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let now = hub.now_millis();
                    for device_id in &device_ids {
                        hub.record_heartbeat(&HeartbeatRecord {
                            device_id: device_id.clone(),
                            last_seen: now,
                        });
                    }

                    let reading = dev.next_reading(now);
                    let row = EnvironmentRow {
                        temperature: reading.temperature_c,
                        tds: reading.tds_ppm,
                        light: reading.light_lux,
                        timestamp: RawTimestamp::Millis(now),
                    };
                    if let Err(err) = hub.apply_environment(&row) {
                        debug!(%err, "simulated environment row rejected");
                    }
                    let row = SecurityRow {
                        motion_detected: dev.next_motion(),
                        day_night: if reading.is_night { "night" } else { "day" }.to_string(),
                        timestamp: Some(RawTimestamp::Millis(now)),
                    };
                    if let Err(err) = hub.apply_security(&row) {
                        debug!(%err, "simulated security row rejected");
                    }
                }
            }
        }
        info!("simulated feed stopped");
    })
}
