mod collectors;
mod config;
mod metrics;
mod model;
mod poller;
mod store;
mod transform;

#[cfg(test)]
mod test_support;

use clap::Parser;
use collectors::device::HttpDeviceSource;
use config::{Config, ConfigError, FileConfig, ReportMode};
use metrics::Metrics;
use std::path::PathBuf;
use std::time::Instant;
use store::influx::InfluxClient;
use store::line_protocol::encode_batch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "satpoll")]
#[command(version)]
#[command(about = "Polls minisatip receivers once and writes their telemetry to InfluxDB")]
struct Cli {
    /// Optional YAML file; environment variables override its values.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    print_default_config: bool,
    /// Overrides REPORT_MODE.
    #[arg(long, value_enum)]
    mode: Option<ReportMode>,
    /// Poll the devices and print the batch as line protocol instead of writing it.
    #[arg(long)]
    dry_run: bool,
    /// Write run metrics in Prometheus text format to this file.
    #[arg(long)]
    metrics_textfile: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if cli.print_default_config {
        println!("{}", Config::example_yaml());
        return;
    }

    let metrics = match Metrics::new() {
        Ok(m) => m,
        Err(err) => {
            error!(error = %err, "failed to initialise run metrics");
            std::process::exit(1);
        }
    };

    let started = Instant::now();
    let config = load_config(&cli);
    if let Ok(cfg) = &config {
        info!(
            hosts = cfg.hosts.len(),
            mode = ?cfg.report_mode,
            store = %cfg.store.base_url(),
            dry_run = cli.dry_run,
            "starting poll"
        );
    }

    let dry_run = cli.dry_run;
    let result = poller::execute(
        config,
        |cfg: &Config| {
            let store = InfluxClient::new(&cfg.store);
            info!(database = %store.database(), "using store");
            (
                HttpDeviceSource::new(cfg.device_port),
                (!dry_run).then_some(store),
            )
        },
        &metrics,
    )
    .await;
    let elapsed = started.elapsed();

    metrics.record_outcome(result.as_ref().err().map(|err| err.kind()), elapsed);
    if let Some(path) = &cli.metrics_textfile {
        if let Err(err) = metrics.write_textfile(path) {
            warn!(error = %err, "failed to write metrics textfile");
        }
    }

    match result {
        Ok(batch) => {
            if dry_run {
                println!("{}", encode_batch(&batch.points));
            }
            info!(
                hosts = batch.hosts,
                points = batch.points.len(),
                disabled_skipped = batch.disabled_skipped,
                elapsed = %humantime::format_duration(elapsed),
                "poll finished"
            );
        }
        Err(err) => {
            error!(
                error = %err,
                kind = err.kind(),
                elapsed = %humantime::format_duration(elapsed),
                "poll failed"
            );
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config, ConfigError> {
    let file = match &cli.config {
        Some(path) => FileConfig::load_from_file(path)?,
        None => FileConfig::default(),
    };
    Config::from_env(file, cli.mode)
}
