//! Alerting evaluators.
//!
//! - `thresholds`: severity classification of the latest reading.
//! - `stalenesses`: heartbeat-based online/offline detection.

pub mod stalenesses;
pub mod thresholds;

pub use stalenesses::LivenessMonitor;
pub use thresholds::{AlertClassifier, AlertThresholds, classify};
