/// Adapters from external data feeds into the monitor's inputs.
///
/// Submodules:
/// - `feed`: realtime database rows (heartbeat, environment, security).

pub mod feed;
