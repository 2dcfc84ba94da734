/// Device heartbeat staleness detection.
///
/// Each controller on the rig publishes a heartbeat every few seconds. A
/// device goes offline not by sending anything but by going quiet, so the
/// status has to be re-evaluated against a clock on a fixed cadence; see
/// `hub::MonitorHub::spawn_liveness_poller` for the timer.
///
/// # Clock injection
/// All evaluation functions accept a `now: EpochMillis` parameter rather
/// than reading the system clock. This keeps liveness purely deterministic
/// in tests without mocking or time manipulation.

use crate::model::{DeviceStatus, EpochMillis, HeartbeatRecord};
use std::collections::BTreeMap;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Liveness monitor
// ---------------------------------------------------------------------------

/// Tracks the last heartbeat of every device and classifies each as
/// online or offline.
///
/// Online is defined as strictly less than the threshold:
///   now - last_seen <  threshold  →  online
///   now - last_seen >= threshold  →  offline
#[derive(Debug, Clone)]
pub struct LivenessMonitor {
    threshold_ms: i64,
    /// `None` marks a watched device that has not reported yet.
    last_seen: BTreeMap<String, Option<EpochMillis>>,
}

impl LivenessMonitor {
    /// Creates a monitor with the given offline threshold.
    ///
    /// Typical thresholds seen on the rig range from 8 to 20 seconds.
    pub fn new(offline_threshold: Duration) -> Self {
        LivenessMonitor {
            threshold_ms: i64::try_from(offline_threshold.as_millis()).unwrap_or(i64::MAX),
            last_seen: BTreeMap::new(),
        }
    }

    pub fn threshold(&self) -> Duration {
        Duration::from_millis(self.threshold_ms.max(0) as u64)
    }

    /// Registers a device that is expected to report, so it shows up as
    /// offline in `evaluate_all` before its first heartbeat.
    pub fn watch(&mut self, device_id: &str) {
        self.last_seen.entry(device_id.to_string()).or_insert(None);
    }

    /// Records a heartbeat. The stored timestamp only moves forward: a
    /// heartbeat older than (or equal to) the stored one is ignored, so
    /// out-of-order delivery never regresses `last_seen`.
    ///
    /// Returns `true` if the stored timestamp changed.
    pub fn record_heartbeat(&mut self, device_id: &str, timestamp: EpochMillis) -> bool {
        let slot = self.last_seen.entry(device_id.to_string()).or_insert(None);
        match *slot {
            Some(stored) if timestamp <= stored => false,
            _ => {
                *slot = Some(timestamp);
                true
            }
        }
    }

    /// Same as `record_heartbeat`, taking a whole record.
    pub fn record(&mut self, record: &HeartbeatRecord) -> bool {
        self.record_heartbeat(&record.device_id, record.last_seen)
    }

    pub fn last_seen(&self, device_id: &str) -> Option<EpochMillis> {
        self.last_seen.get(device_id).copied().flatten()
    }

    /// Current heartbeat records of every device that has reported.
    pub fn records(&self) -> Vec<HeartbeatRecord> {
        self.last_seen
            .iter()
            .filter_map(|(id, seen)| {
                seen.map(|last_seen| HeartbeatRecord {
                    device_id: id.clone(),
                    last_seen,
                })
            })
            .collect()
    }

    /// Status of one device at `now`. Unknown devices are offline with no
    /// `last_seen`; that is not an error.
    pub fn evaluate(&self, device_id: &str, now: EpochMillis) -> DeviceStatus {
        match self.last_seen(device_id) {
            Some(last_seen) => DeviceStatus {
                device_id: device_id.to_string(),
                is_online: now.saturating_sub(last_seen) < self.threshold_ms,
                last_seen: Some(last_seen),
            },
            None => DeviceStatus::never_seen(device_id),
        }
    }

    /// Status of every watched or recorded device at `now`, ordered by
    /// device id.
    pub fn evaluate_all(&self, now: EpochMillis) -> Vec<DeviceStatus> {
        self.last_seen
            .keys()
            .map(|id| self.evaluate(id, now))
            .collect()
    }

    pub fn device_count(&self) -> usize {
        self.last_seen.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// A fixed "now" used across all tests: 2024-05-01 13:00:00 UTC.
    const NOW: EpochMillis = 1_714_568_400_000;

    fn monitor() -> LivenessMonitor {
        LivenessMonitor::new(Duration::from_secs(20))
    }

    // --- Online -------------------------------------------------------------

    #[test]
    fn test_device_is_online_right_after_heartbeat() {
        let mut m = monitor();
        m.record_heartbeat("main", NOW);
        let status = m.evaluate("main", NOW);
        assert!(status.is_online, "heartbeat at now should be online");
        assert_eq!(status.last_seen, Some(NOW));
    }

    #[test]
    fn test_device_just_inside_threshold_is_online() {
        let mut m = monitor();
        m.record_heartbeat("main", NOW - 19_999);
        assert!(m.evaluate("main", NOW).is_online);
    }

    #[test]
    fn test_heartbeat_from_slightly_ahead_clock_is_online() {
        let mut m = monitor();
        m.record_heartbeat("main", NOW + 1_500);
        assert!(m.evaluate("main", NOW).is_online);
    }

    // --- Offline ------------------------------------------------------------

    #[test]
    fn test_device_exactly_at_threshold_is_offline() {
        let mut m = monitor();
        m.record_heartbeat("main", NOW);
        assert!(
            !m.evaluate("main", NOW + 20_000).is_online,
            "age == threshold should be offline; online is strictly less than",
        );
    }

    #[test]
    fn test_never_recorded_device_is_offline_without_last_seen() {
        let m = monitor();
        let status = m.evaluate("camera", NOW);
        assert!(!status.is_online);
        assert_eq!(status.last_seen, None);
    }

    #[test]
    fn test_watched_device_is_offline_until_first_heartbeat() {
        let mut m = monitor();
        m.watch("camera");
        assert_eq!(m.evaluate_all(NOW), vec![DeviceStatus::never_seen("camera")]);

        assert!(m.record_heartbeat("camera", NOW));
        assert!(m.evaluate("camera", NOW).is_online);
    }

    #[test]
    fn test_watch_does_not_reset_known_device() {
        let mut m = monitor();
        m.record_heartbeat("main", NOW);
        m.watch("main");
        assert_eq!(m.last_seen("main"), Some(NOW));
    }

    // --- Monotonic updates --------------------------------------------------

    #[test]
    fn test_older_heartbeat_does_not_regress_last_seen() {
        let mut m = monitor();
        assert!(m.record_heartbeat("main", NOW));
        assert!(!m.record_heartbeat("main", NOW - 5_000));
        assert_eq!(m.last_seen("main"), Some(NOW));
    }

    #[test]
    fn test_duplicate_heartbeat_is_not_a_change() {
        let mut m = monitor();
        m.record_heartbeat("main", NOW);
        assert!(!m.record_heartbeat("main", NOW));
    }

    #[test]
    fn test_record_accepts_whole_record() {
        let mut m = monitor();
        m.record(&HeartbeatRecord {
            device_id: "main".to_string(),
            last_seen: NOW,
        });
        assert_eq!(
            m.records(),
            vec![HeartbeatRecord {
                device_id: "main".to_string(),
                last_seen: NOW,
            }]
        );
    }

    // --- Multiple devices ---------------------------------------------------

    #[test]
    fn test_devices_are_tracked_independently() {
        let mut m = monitor();
        m.record_heartbeat("main", NOW);
        m.record_heartbeat("camera", NOW - 60_000);

        let statuses = m.evaluate_all(NOW);
        assert_eq!(statuses.len(), 2);
        // Ordered by device id.
        assert_eq!(statuses[0].device_id, "camera");
        assert!(!statuses[0].is_online);
        assert_eq!(statuses[1].device_id, "main");
        assert!(statuses[1].is_online);
    }

    // --- Threshold variation ------------------------------------------------

    #[test]
    fn test_same_heartbeat_offline_under_tight_threshold_not_under_loose() {
        let mut tight = LivenessMonitor::new(Duration::from_secs(8));
        let mut loose = LivenessMonitor::new(Duration::from_secs(20));
        tight.record_heartbeat("main", NOW - 10_000);
        loose.record_heartbeat("main", NOW - 10_000);
        assert!(!tight.evaluate("main", NOW).is_online);
        assert!(loose.evaluate("main", NOW).is_online);
        assert_eq!(tight.threshold(), Duration::from_secs(8));
    }
}
