use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use host_monitoring::{
    actors::monitor::HostMonitorHandle,
    alerts::{AlertContext, AlertManager},
    config::{Config, MonitorConfig, read_config_file},
    mail::build_mailer,
    monitors::probe::build_probe,
    util::PROBE_TIMEOUT_SLACK_MS,
};
use tracing::{debug, info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

/// Monitor reachability and round trip time of a single host
#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file (JSON)
    #[arg(short, long, conflicts_with_all = ["host", "max_rtt", "max_retries", "period"])]
    file: Option<PathBuf>,

    /// Target IP address or hostname
    #[arg(required_unless_present = "file")]
    host: Option<String>,

    /// Maximum acceptable round trip time in milliseconds
    #[arg(required_unless_present = "file")]
    max_rtt: Option<u64>,

    /// Consecutive faults tolerated before alerting
    #[arg(required_unless_present = "file")]
    max_retries: Option<u32>,

    /// Probe period in milliseconds
    #[arg(required_unless_present = "file")]
    period: Option<u64>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn config(&self) -> anyhow::Result<Config> {
        if let Some(file) = &self.file {
            return Ok(read_config_file(file)?);
        }

        match (&self.host, self.max_rtt, self.max_retries, self.period) {
            (Some(host), Some(max_rtt), Some(max_retries), Some(period)) => Ok(
                Config::from_args(host.clone(), max_rtt, max_retries, period),
            ),
            _ => anyhow::bail!("usage: hostwatch <HOST> <MAX_RTT> <MAX_RETRIES> <PERIOD>"),
        }
    }
}

fn init(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let filter = filter::Targets::new().with_targets(vec![
        ("host_monitoring", level),
        ("hostwatch", level),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init(args.verbose);
    trace!("started with args: {args:?}");

    let config = args.config()?;
    let monitor_config = MonitorConfig::resolve(&config).await?;
    info!(
        "monitoring {} (max rtt {}ms, max retries {}, period {}ms)",
        monitor_config.display(),
        monitor_config.max_rtt.as_millis(),
        monitor_config.max_retries,
        monitor_config.period.as_millis()
    );

    let mailer = build_mailer(&config.delivery, monitor_config.notify_timeout)?;
    let notifier = AlertManager::new(
        AlertContext::from(&monitor_config),
        Some(config.log_file.clone()),
        mailer,
    );
    let probe = build_probe(&monitor_config.probe);

    // an in-flight cycle is bounded by the probe and notify timeouts
    let drain = monitor_config.timeout
        + monitor_config.notify_timeout
        + Duration::from_millis(PROBE_TIMEOUT_SLACK_MS);

    let (handle, task) = HostMonitorHandle::spawn(monitor_config, probe, notifier);

    shutdown_signal().await;
    info!("shutting down");
    handle.shutdown().await;

    match tokio::time::timeout(drain, task).await {
        Ok(Ok(())) => debug!("monitor stopped"),
        Ok(Err(e)) => warn!("monitor task failed: {e}"),
        Err(_) => warn!("monitor did not stop within {}ms, abandoning it", drain.as_millis()),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
