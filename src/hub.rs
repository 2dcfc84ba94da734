//! Monitor hub: the host-side state container.
//!
//! `MonitorHub` owns one `LivenessMonitor`, one `AlertClassifier` and the
//! latest merged reading. Feed events go in through `ingest`; results come
//! out through registered observers. The evaluators themselves stay
//! synchronous and callback-free, all wiring happens here.
//!
//! The hub is built explicitly by the host and shared as `Arc<MonitorHub>`.
//! Its only background work is the liveness poller, which the host stops
//! through a `CancellationToken` when it tears the hub down.

use crate::alert::{AlertClassifier, LivenessMonitor};
use crate::analysis::indicators::card_indicators;
use crate::config::AppConfig;
use crate::devices::{self, Device};
use crate::ingest::feed::{self, EnvironmentRow, FeedEvent, SecurityRow};
use crate::logging::{self, FeedSource};
use crate::model::{AlertResult, DeviceStatus, EnvironmentReading, EpochMillis, FeedError, HeartbeatRecord, Severity};
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type Shared<T> = Arc<Mutex<T>>;

fn new_state<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Source of "now" for liveness evaluation.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> EpochMillis;
}

/// Wall clock, UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> EpochMillis {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Clock that only moves when told to. Used by tests and replays.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start: EpochMillis) -> Self {
        ManualClock {
            now: AtomicI64::new(start),
        }
    }

    pub fn set(&self, now: EpochMillis) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        let by = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
        self.now.fetch_add(by, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> EpochMillis {
        self.now.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Observers
// ---------------------------------------------------------------------------

/// Notified when a device flips between online and offline, and on the
/// first evaluation of each device.
pub trait StatusObserver: Send + Sync {
    fn status_changed(&self, status: &DeviceStatus);
}

/// Notified every time the latest reading is re-classified.
pub trait AlertObserver: Send + Sync {
    fn alert_updated(&self, alert: &AlertResult, reading: &EnvironmentReading);
}

/// Writes status transitions and alerts to the log, naming devices by
/// their registry entry.
#[derive(Debug, Default)]
pub struct LoggingObserver {
    devices: Vec<Device>,
}

impl LoggingObserver {
    pub fn new(devices: Vec<Device>) -> Self {
        LoggingObserver { devices }
    }
}

impl StatusObserver for LoggingObserver {
    fn status_changed(&self, status: &DeviceStatus) {
        let source = FeedSource::Heartbeat.to_string();
        let name = devices::display_name(&self.devices, &status.device_id);
        if status.is_online {
            info!(%source, device = %status.device_id, last_seen = ?status.last_seen, "{} {}", name, status.label());
        } else {
            warn!(%source, device = %status.device_id, last_seen = ?status.last_seen, "{} {}", name, status.label());
        }
    }
}

impl AlertObserver for LoggingObserver {
    fn alert_updated(&self, alert: &AlertResult, reading: &EnvironmentReading) {
        let source = FeedSource::Environment.to_string();
        let cards = card_indicators(reading);
        debug!(
            temperature = ?cards.temperature,
            tds = ?cards.tds,
            motion = ?cards.motion,
            period = cards.period,
            "card indicators"
        );
        if !alert.is_alert() {
            debug!(%source, timestamp = ?reading.timestamp, "{}", alert.reason);
        } else if alert.severity == Severity::Low {
            info!(%source, severity = %alert.severity, "{}", alert.reason);
        } else {
            let title = alert.severity.title().unwrap_or_default();
            warn!(%source, severity = %alert.severity, "{}: {}", title, alert.reason);
        }
    }
}

// ---------------------------------------------------------------------------
// Hub
// ---------------------------------------------------------------------------

pub struct MonitorHub {
    liveness: Shared<LivenessMonitor>,
    classifier: AlertClassifier,
    latest: Shared<EnvironmentReading>,
    last_alert: Shared<Option<AlertResult>>,
    /// Online flag last reported to observers, per device.
    reported: Shared<HashMap<String, bool>>,
    /// Held from evaluation through notification so observers see changes
    /// in the order they happened. Reentrant: observers may call back in.
    delivery: ReentrantMutex<()>,
    status_observers: RwLock<Vec<Arc<dyn StatusObserver>>>,
    alert_observers: RwLock<Vec<Arc<dyn AlertObserver>>>,
    clock: Arc<dyn Clock>,
}

impl MonitorHub {
    pub fn new(monitor: LivenessMonitor, classifier: AlertClassifier, clock: Arc<dyn Clock>) -> Self {
        MonitorHub {
            liveness: new_state(monitor),
            classifier,
            latest: new_state(EnvironmentReading::default()),
            last_alert: new_state(None),
            reported: new_state(HashMap::new()),
            delivery: ReentrantMutex::new(()),
            status_observers: RwLock::new(Vec::new()),
            alert_observers: RwLock::new(Vec::new()),
            clock,
        }
    }

    /// Builds a hub from a validated config, watching every registered device.
    pub fn from_config(config: &AppConfig, clock: Arc<dyn Clock>) -> Self {
        let mut monitor = LivenessMonitor::new(config.liveness.offline_threshold());
        for device in &config.devices {
            monitor.watch(&device.device_id);
        }
        MonitorHub::new(monitor, AlertClassifier::new(config.alerts.clone()), clock)
    }

    pub fn add_status_observer(&self, observer: Arc<dyn StatusObserver>) {
        self.status_observers.write().push(observer);
    }

    pub fn add_alert_observer(&self, observer: Arc<dyn AlertObserver>) {
        self.alert_observers.write().push(observer);
    }

    // --- Feed input -------------------------------------------------------

    /// Routes one feed event to the evaluator it concerns.
    pub fn ingest(&self, event: &FeedEvent) -> Result<(), FeedError> {
        match event {
            FeedEvent::Heartbeat(row) => {
                let record = feed::heartbeat_record(row)?;
                self.record_heartbeat(&record);
            }
            FeedEvent::Environment(row) => {
                self.apply_environment(row)?;
            }
            FeedEvent::Security(row) => {
                self.apply_security(row)?;
            }
        }
        Ok(())
    }

    /// Parses and ingests one forwarded feed line. Failures are logged here
    /// and returned so the caller can count them.
    pub fn ingest_line(&self, line: &str) -> Result<(), FeedError> {
        let event = feed::parse_feed_line(line)
            .inspect_err(|err| logging::log_feed_failure(FeedSource::System, None, "parse", err))?;
        self.ingest(&event).inspect_err(|err| {
            let (source, device) = match &event {
                FeedEvent::Heartbeat(row) => (FeedSource::Heartbeat, row.device_id.as_deref()),
                FeedEvent::Environment(_) => (FeedSource::Environment, None),
                FeedEvent::Security(_) => (FeedSource::Security, None),
            };
            logging::log_feed_failure(source, device, "ingest", err);
        })
    }

    /// Records a heartbeat and re-evaluates that device right away.
    pub fn record_heartbeat(&self, record: &HeartbeatRecord) -> DeviceStatus {
        let _delivery = self.delivery.lock();
        if !self.liveness.lock().record(record) {
            debug!(device = %record.device_id, last_seen = record.last_seen, "ignoring stale heartbeat");
        }
        self.report_status(&record.device_id)
    }

    /// Merges an environment row into the latest reading and re-classifies.
    pub fn apply_environment(&self, row: &EnvironmentRow) -> Result<AlertResult, FeedError> {
        self.update_reading(|latest| feed::apply_environment(latest, row))
    }

    /// Merges a security row into the latest reading and re-classifies.
    pub fn apply_security(&self, row: &SecurityRow) -> Result<AlertResult, FeedError> {
        self.update_reading(|latest| feed::apply_security(latest, row))
    }

    /// Replaces the latest reading wholesale and classifies it.
    pub fn replace_reading(&self, reading: EnvironmentReading) -> AlertResult {
        let Ok(alert) = self.update_reading(|latest| {
            *latest = reading;
            Ok::<(), Infallible>(())
        });
        alert
    }

    /// Applies `merge` to the latest reading and classifies the result while
    /// the reading is still locked, so `last_alert` always matches
    /// `latest`. On error nothing changes and no observer is called.
    fn update_reading<E>(
        &self,
        merge: impl FnOnce(&mut EnvironmentReading) -> Result<(), E>,
    ) -> Result<AlertResult, E> {
        let _delivery = self.delivery.lock();
        let (alert, reading) = {
            let mut latest = self.latest.lock();
            merge(&mut latest)?;
            let alert = self.classifier.classify(&latest);
            *self.last_alert.lock() = Some(alert.clone());
            (alert, latest.clone())
        };
        let observers: Vec<_> = self.alert_observers.read().clone();
        for observer in observers {
            observer.alert_updated(&alert, &reading);
        }
        Ok(alert)
    }

    // --- Liveness ---------------------------------------------------------

    /// Evaluates every device against the clock and notifies observers of
    /// any device whose online flag changed since it was last reported.
    pub fn poll_liveness(&self) -> Vec<DeviceStatus> {
        let device_ids: Vec<String> = self.statuses().into_iter().map(|s| s.device_id).collect();
        device_ids.iter().map(|id| self.report_status(id)).collect()
    }

    /// Current status of every device, without notifying anyone.
    pub fn statuses(&self) -> Vec<DeviceStatus> {
        let now = self.clock.now_millis();
        self.liveness.lock().evaluate_all(now)
    }

    pub fn device_status(&self, device_id: &str) -> DeviceStatus {
        let now = self.clock.now_millis();
        self.liveness.lock().evaluate(device_id, now)
    }

    /// Last heartbeat of every device that has reported.
    pub fn heartbeats(&self) -> Vec<HeartbeatRecord> {
        self.liveness.lock().records()
    }

    /// Evaluates one device and notifies observers if its online flag
    /// differs from the last one reported. Evaluation, bookkeeping and
    /// notification all happen under `delivery`, so a status computed
    /// before a newer heartbeat can never be delivered after it.
    fn report_status(&self, device_id: &str) -> DeviceStatus {
        let _delivery = self.delivery.lock();
        let status = self.device_status(device_id);
        let changed = {
            let mut reported = self.reported.lock();
            reported.insert(status.device_id.clone(), status.is_online) != Some(status.is_online)
        };
        if changed {
            let observers: Vec<_> = self.status_observers.read().clone();
            for observer in observers {
                observer.status_changed(&status);
            }
        }
        status
    }

    /// Starts the fixed-period liveness poller.
    ///
    /// The first evaluation happens immediately. Ticks missed while the
    /// runtime was busy are delayed rather than replayed in a burst. The
    /// task exits as soon as `cancel` fires.
    pub fn spawn_liveness_poller(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let hub = Arc::clone(self);
        let interval = interval.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let devices = hub.liveness.lock().device_count();
            debug!(interval_ms = interval.as_millis() as u64, devices, "liveness poller started");
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        hub.poll_liveness();
                    }
                }
            }
            debug!("liveness poller stopped");
        })
    }

    // --- Snapshots --------------------------------------------------------

    pub fn latest_reading(&self) -> EnvironmentReading {
        self.latest.lock().clone()
    }

    /// The most recent classification, `None` before any feed row arrived.
    pub fn latest_alert(&self) -> Option<AlertResult> {
        self.last_alert.lock().clone()
    }

    pub fn now_millis(&self) -> EpochMillis {
        self.clock.now_millis()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::feed::RawTimestamp;
    use std::sync::atomic::AtomicBool;
    use std::sync::{OnceLock, Weak};

    const NOW: EpochMillis = 1_714_568_400_000;

    #[derive(Default)]
    struct Recorder {
        statuses: Mutex<Vec<DeviceStatus>>,
        alerts: Mutex<Vec<AlertResult>>,
    }

    impl StatusObserver for Recorder {
        fn status_changed(&self, status: &DeviceStatus) {
            self.statuses.lock().push(status.clone());
        }
    }

    impl AlertObserver for Recorder {
        fn alert_updated(&self, alert: &AlertResult, _reading: &EnvironmentReading) {
            self.alerts.lock().push(alert.clone());
        }
    }

    fn hub_with_recorder() -> (MonitorHub, Arc<ManualClock>, Arc<Recorder>) {
        let clock = Arc::new(ManualClock::new(NOW));
        let hub = MonitorHub::from_config(&AppConfig::default(), clock.clone());
        let recorder = Arc::new(Recorder::default());
        hub.add_status_observer(recorder.clone());
        hub.add_alert_observer(recorder.clone());
        (hub, clock, recorder)
    }

    fn heartbeat(device_id: &str, last_seen: EpochMillis) -> HeartbeatRecord {
        HeartbeatRecord {
            device_id: device_id.to_string(),
            last_seen,
        }
    }

    #[test]
    fn test_registered_devices_start_offline() {
        let (hub, _clock, recorder) = hub_with_recorder();
        let statuses = hub.poll_liveness();
        assert_eq!(statuses.len(), 2);
        assert!(statuses.iter().all(|s| !s.is_online && s.last_seen.is_none()));
        assert_eq!(recorder.statuses.lock().len(), 2, "first evaluation always reports");
    }

    #[test]
    fn test_observers_only_hear_transitions() {
        let (hub, clock, recorder) = hub_with_recorder();
        hub.poll_liveness();
        recorder.statuses.lock().clear();

        let status = hub.record_heartbeat(&heartbeat("main", NOW));
        assert!(status.is_online);
        hub.poll_liveness();
        hub.poll_liveness();
        assert_eq!(recorder.statuses.lock().len(), 1, "online reported once");

        clock.advance(Duration::from_secs(20));
        hub.poll_liveness();
        let seen = recorder.statuses.lock().clone();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].device_id, "main");
        assert!(!seen[1].is_online);
    }

    #[test]
    fn test_stale_heartbeat_does_not_revive_device() {
        let (hub, clock, _recorder) = hub_with_recorder();
        hub.record_heartbeat(&heartbeat("main", NOW));
        clock.advance(Duration::from_secs(30));
        let status = hub.record_heartbeat(&heartbeat("main", NOW - 1_000));
        assert!(!status.is_online);
        assert_eq!(status.last_seen, Some(NOW));
    }

    #[test]
    fn test_unregistered_device_is_tracked_on_first_heartbeat() {
        let (hub, _clock, _recorder) = hub_with_recorder();
        hub.record_heartbeat(&heartbeat("pump", NOW));
        assert_eq!(hub.statuses().len(), 3);
        assert!(hub.device_status("pump").is_online);
    }

    #[test]
    fn test_security_row_reclassifies_latest_reading() {
        let (hub, _clock, recorder) = hub_with_recorder();
        let alert = hub
            .apply_environment(&EnvironmentRow {
                temperature: Some(26.0),
                tds: Some(450.0),
                light: Some(5.0),
                timestamp: RawTimestamp::Millis(NOW),
            })
            .expect("row should apply");
        assert_eq!(alert.severity, Severity::None);

        let alert = hub
            .apply_security(&SecurityRow {
                motion_detected: true,
                day_night: "night".to_string(),
                timestamp: None,
            })
            .expect("row should apply");
        assert_eq!(alert.severity, Severity::Medium);
        assert_eq!(hub.latest_alert(), Some(alert));
        assert_eq!(recorder.alerts.lock().len(), 2);
    }

    #[test]
    fn test_security_row_before_any_environment_is_not_an_alert() {
        let (hub, _clock, _recorder) = hub_with_recorder();
        let alert = hub
            .apply_security(&SecurityRow {
                motion_detected: true,
                day_night: "night".to_string(),
                timestamp: None,
            })
            .expect("row should apply");
        assert_eq!(alert.severity, Severity::None);
        assert!(hub.latest_reading().is_night);
    }

    #[test]
    fn test_security_row_with_bad_timestamp_keeps_last_alert() {
        let (hub, _clock, recorder) = hub_with_recorder();
        hub.replace_reading(EnvironmentReading {
            temperature_c: Some(26.0),
            tds_ppm: Some(450.0),
            timestamp: Some(NOW),
            ..EnvironmentReading::default()
        });
        let result = hub.apply_security(&SecurityRow {
            motion_detected: true,
            day_night: "night".to_string(),
            timestamp: Some(RawTimestamp::Text("yesterday".to_string())),
        });
        assert!(matches!(result, Err(FeedError::InvalidTimestamp(_))));
        assert!(!hub.latest_reading().motion_detected);
        assert_eq!(hub.latest_alert().map(|a| a.severity), Some(Severity::None));
        assert_eq!(recorder.alerts.lock().len(), 1);
    }

    /// Records a heartbeat for `main` from inside the first notification
    /// it receives, the way a feed task can land between evaluations.
    #[derive(Default)]
    struct HeartbeatDuringPoll {
        hub: OnceLock<Weak<MonitorHub>>,
        fired: AtomicBool,
        seen: Mutex<Vec<(String, bool)>>,
    }

    impl StatusObserver for HeartbeatDuringPoll {
        fn status_changed(&self, status: &DeviceStatus) {
            self.seen.lock().push((status.device_id.clone(), status.is_online));
            if self.fired.swap(true, Ordering::SeqCst) {
                return;
            }
            if let Some(hub) = self.hub.get().and_then(Weak::upgrade) {
                hub.record_heartbeat(&heartbeat("main", NOW));
            }
        }
    }

    #[test]
    fn test_poll_never_delivers_status_older_than_a_heartbeat() {
        let clock = Arc::new(ManualClock::new(NOW));
        let hub = Arc::new(MonitorHub::from_config(&AppConfig::default(), clock));
        let observer = Arc::new(HeartbeatDuringPoll::default());
        let _ = observer.hub.set(Arc::downgrade(&hub));
        hub.add_status_observer(observer.clone());

        hub.poll_liveness();

        let seen = observer.seen.lock().clone();
        assert_eq!(
            seen,
            vec![("camera".to_string(), false), ("main".to_string(), true)]
        );
        let last_main = seen.iter().rev().find(|(id, _)| id == "main").map(|(_, online)| *online);
        assert_eq!(last_main, Some(hub.device_status("main").is_online));
    }

    #[test]
    fn test_last_alert_matches_latest_reading() {
        let (hub, _clock, recorder) = hub_with_recorder();
        hub.ingest_line(r#"{"table":"environment","temperature":31,"tds":450,"light":3,"timestamp":1714568400000}"#)
            .expect("environment should ingest");
        let expected = AlertClassifier::default().classify(&hub.latest_reading());
        assert_eq!(hub.latest_alert(), Some(expected.clone()));
        assert_eq!(recorder.alerts.lock().last(), Some(&expected));
    }

    #[test]
    fn test_ingest_line_routes_by_table() {
        let (hub, _clock, _recorder) = hub_with_recorder();
        hub.ingest_line(r#"{"table":"heartbeat","device_id":"camera","last_seen":1714568400000}"#)
            .expect("heartbeat should ingest");
        hub.ingest_line(r#"{"table":"environment","temperature":10,"tds":750,"light":3,"timestamp":1714568400000}"#)
            .expect("environment should ingest");
        hub.ingest_line(r#"{"table":"security","motion_detected":true,"day_night":"night"}"#)
            .expect("security should ingest");

        assert!(hub.device_status("camera").is_online);
        assert_eq!(hub.latest_alert().map(|a| a.severity), Some(Severity::High));
    }

    #[test]
    fn test_ingest_line_rejects_garbage_without_touching_state() {
        let (hub, _clock, recorder) = hub_with_recorder();
        assert!(hub.ingest_line("{oops").is_err());
        assert!(hub.ingest_line(r#"{"table":"heartbeat","last_seen":"whenever"}"#).is_err());
        assert!(hub.latest_alert().is_none());
        assert!(recorder.statuses.lock().is_empty());
    }
}
