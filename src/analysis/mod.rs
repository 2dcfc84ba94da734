/// Display helpers for the dashboard's sensor cards.
///
/// This module maps raw readings onto the status indicators the front end
/// colours its cards with. These bands are presentation only and are kept
/// apart from alert severity, which lives in
/// `alert::thresholds`.
///
/// Submodules:
/// - `indicators`: per-sensor status indicators and the day/night label.

pub mod indicators;
