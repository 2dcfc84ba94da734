/// Property tests for the two evaluators
///
/// Run with: cargo test --test property_tests

use aquaguard_service::alert::{LivenessMonitor, classify};
use aquaguard_service::model::{EnvironmentReading, Severity};
use proptest::prelude::*;
use std::time::Duration;

const THRESHOLD_MS: i64 = 20_000;

fn monitor() -> LivenessMonitor {
    LivenessMonitor::new(Duration::from_millis(THRESHOLD_MS as u64))
}

fn reading_strategy() -> impl Strategy<Value = EnvironmentReading> {
    (
        proptest::option::of(-10.0f64..50.0),
        proptest::option::of(0.0f64..2_000.0),
        proptest::option::of(0.0f64..5_000.0),
        any::<bool>(),
        any::<bool>(),
        proptest::option::of(0i64..4_000_000_000_000),
    )
        .prop_map(
            |(temperature_c, tds_ppm, light_lux, motion_detected, is_night, timestamp)| {
                EnvironmentReading {
                    temperature_c,
                    tds_ppm,
                    light_lux,
                    motion_detected,
                    is_night,
                    timestamp,
                }
            },
        )
}

proptest! {
    #[test]
    fn test_last_seen_is_max_regardless_of_order(
        timestamps in proptest::collection::vec(0i64..4_000_000_000_000, 1..20)
    ) {
        let mut forward = monitor();
        let mut backward = monitor();
        for ts in &timestamps {
            forward.record_heartbeat("main", *ts);
        }
        for ts in timestamps.iter().rev() {
            backward.record_heartbeat("main", *ts);
        }
        let max = timestamps.iter().copied().max();
        prop_assert_eq!(forward.last_seen("main"), max);
        prop_assert_eq!(backward.last_seen("main"), max);
    }

    #[test]
    fn test_online_right_after_heartbeat(now in 0i64..4_000_000_000_000) {
        let mut m = monitor();
        m.record_heartbeat("camera", now);
        let status = m.evaluate("camera", now);
        prop_assert!(status.is_online);
        prop_assert_eq!(status.last_seen, Some(now));
    }

    #[test]
    fn test_offline_once_threshold_elapsed(
        now in 0i64..4_000_000_000_000,
        extra in 0i64..1_000_000,
    ) {
        let mut m = monitor();
        m.record_heartbeat("camera", now);
        prop_assert!(!m.evaluate("camera", now + THRESHOLD_MS + extra).is_online);
    }

    #[test]
    fn test_never_recorded_device_is_offline(now in any::<i64>(), id in "[a-z]{1,12}") {
        let status = monitor().evaluate(&id, now);
        prop_assert!(!status.is_online);
        prop_assert_eq!(status.last_seen, None);
    }

    #[test]
    fn test_classify_is_idempotent(reading in reading_strategy()) {
        prop_assert_eq!(classify(&reading), classify(&reading));
    }

    #[test]
    fn test_missing_timestamp_is_never_an_alert(reading in reading_strategy()) {
        let reading = EnvironmentReading { timestamp: None, ..reading };
        prop_assert_eq!(classify(&reading).severity, Severity::None);
    }

    #[test]
    fn test_night_motion_is_at_least_medium(reading in reading_strategy(), ts in 0i64..4_000_000_000_000) {
        let reading = EnvironmentReading {
            motion_detected: true,
            is_night: true,
            timestamp: Some(ts),
            ..reading
        };
        prop_assert!(classify(&reading).severity >= Severity::Medium);
    }
}
