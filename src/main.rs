/// AquaGuard monitoring daemon
///
/// Reads forwarded feed rows (one JSON object per line) from stdin, keeps
/// device liveness and the alert level current, and logs every change.
///
/// Usage:
///   aquaguard [--config PATH] [--dev]
///
/// With `--dev` the rig is simulated instead of reading stdin.

use anyhow::{Context, Result, bail};
use aquaguard_service::config::{self, AppConfig};
use aquaguard_service::dev_mode::{self, DevMode};
use aquaguard_service::hub::{LoggingObserver, MonitorHub, SystemClock};
use aquaguard_service::logging;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

struct Args {
    config_path: Option<String>,
    dev: bool,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        config_path: None,
        dev: false,
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--dev" => args.dev = true,
            "--config" => {
                args.config_path = Some(iter.next().context("--config needs a path")?);
            }
            other => bail!("unknown argument '{}'\nusage: aquaguard [--config PATH] [--dev]", other),
        }
    }
    Ok(args)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args()?;
    let config: AppConfig = config::load_config_from_env(args.config_path.as_deref())
        .context("failed to load configuration")?;

    logging::init_logging(
        config.logging.level,
        config.logging.file.as_deref(),
        config.logging.json,
    )
    .context("failed to open log file")?;

    info!(
        devices = config.devices.len(),
        offline_threshold_ms = config.liveness.offline_threshold_ms,
        poll_interval_ms = config.liveness.poll_interval_ms,
        "starting AquaGuard monitor"
    );

    let hub = Arc::new(MonitorHub::from_config(&config, Arc::new(SystemClock)));
    let observer = Arc::new(LoggingObserver::new(config.devices.clone()));
    hub.add_status_observer(observer.clone());
    hub.add_alert_observer(observer);

    let cancel = CancellationToken::new();
    let poller = hub.spawn_liveness_poller(config.liveness.poll_interval(), cancel.clone());

    if args.dev {
        run_dev_mode(&hub, &config, cancel.clone()).await;
    } else {
        run_stdin_feed(&hub, cancel.clone()).await?;
    }

    cancel.cancel();
    poller.await.context("liveness poller panicked")?;

    for heartbeat in hub.heartbeats() {
        debug!(device = %heartbeat.device_id, last_seen = heartbeat.last_seen, "last heartbeat");
    }
    let statuses = hub.statuses();
    let online = statuses.iter().filter(|s| s.is_online).count();
    logging::log_liveness_summary(statuses.len(), online);
    Ok(())
}

/// Replays a simulated history, then runs the simulated live feed until Ctrl-C.
async fn run_dev_mode(hub: &Arc<MonitorHub>, config: &AppConfig, cancel: CancellationToken) {
    let mut dev = DevMode::new(config.dev_mode.seed);
    let history = dev.generate_history(config.dev_mode.history_points, hub.now_millis());
    info!(points = history.len(), "replaying simulated history");
    for reading in history {
        hub.replace_reading(reading);
    }

    let device_ids = config.devices.iter().map(|d| d.device_id.clone()).collect();
    let feed = dev_mode::spawn_simulated_feed(hub.clone(), device_ids, &config.dev_mode, cancel.clone());

    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(%err, "failed to listen for Ctrl-C");
    }
    cancel.cancel();
    if let Err(err) = feed.await {
        warn!(%err, "simulated feed task failed");
    }
}

/// Ingests stdin line by line until end of input or Ctrl-C.
async fn run_stdin_feed(hub: &Arc<MonitorHub>, cancel: CancellationToken) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut accepted = 0usize;
    let mut rejected = 0usize;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("interrupted");
                break;
            }
            _ = cancel.cancelled() => break,
            line = lines.next_line() => {
                match line.context("failed to read feed from stdin")? {
                    Some(line) => match hub.ingest_line(&line) {
                        Ok(()) => accepted += 1,
                        Err(_) => rejected += 1,
                    },
                    None => {
                        info!("feed closed");
                        break;
                    }
                }
            }
        }
    }

    info!(accepted, rejected, "feed ingest finished");
    Ok(())
}
