//! AquaGuard fish-farm monitoring service.
//!
//! Decides whether the rig's controllers are online and how severe the
//! current water/security situation is, from the rows the controllers push
//! into a realtime database.
//!
//! - `alert`: the two evaluators: liveness (`stalenesses`) and severity
//!   classification (`thresholds`).
//! - `hub`: host-owned state container, observers and the liveness poller.
//! - `ingest`: feed row adapters.
//! - `analysis`: dashboard card indicators.
//! - `config`, `devices`, `logging`, `dev_mode`: service plumbing.

pub mod alert;
pub mod analysis;
pub mod config;
pub mod dev_mode;
pub mod devices;
pub mod hub;
pub mod ingest;
pub mod logging;
pub mod model;
