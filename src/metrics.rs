use crate::transform::HostPoints;
use prometheus::core::Collector;
use prometheus::{opts, Encoder, Gauge, GaugeVec, Registry, TextEncoder};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Self-metrics of a single run, meant for node_exporter's textfile collector.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub satpoll_hosts_polled: Gauge,
    pub satpoll_points: GaugeVec,
    pub satpoll_disabled_adapters_skipped: Gauge,
    pub satpoll_run_duration_seconds: Gauge,
    pub satpoll_run_success: Gauge,
    pub satpoll_run_failure: GaugeVec,
    pub satpoll_last_run_timestamp_seconds: Gauge,
}

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("failed to encode metrics: {0}")]
    Encode(#[from] prometheus::Error),
    #[error("failed to write metrics textfile {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let satpoll_hosts_polled = Gauge::with_opts(opts!(
            "satpoll_hosts_polled",
            "Hosts whose documents were fetched and transformed in the last run"
        ))?;
        let satpoll_points = GaugeVec::new(
            opts!(
                "satpoll_points",
                "Points collected in the last run by measurement"
            ),
            &["measurement"],
        )?;
        let satpoll_disabled_adapters_skipped = Gauge::with_opts(opts!(
            "satpoll_disabled_adapters_skipped",
            "Adapters left out of the last run because they are disabled"
        ))?;
        let satpoll_run_duration_seconds = Gauge::with_opts(opts!(
            "satpoll_run_duration_seconds",
            "Wall time of the last run in seconds"
        ))?;
        let satpoll_run_success = Gauge::with_opts(opts!(
            "satpoll_run_success",
            "1 if the last run finished without error, 0 otherwise"
        ))?;
        let satpoll_run_failure = GaugeVec::new(
            opts!(
                "satpoll_run_failure",
                "1 for the error kind that aborted the last run"
            ),
            &["kind"],
        )?;
        let satpoll_last_run_timestamp_seconds = Gauge::with_opts(opts!(
            "satpoll_last_run_timestamp_seconds",
            "Unix time the last run finished"
        ))?;

        register(&registry, &satpoll_hosts_polled)?;
        register(&registry, &satpoll_points)?;
        register(&registry, &satpoll_disabled_adapters_skipped)?;
        register(&registry, &satpoll_run_duration_seconds)?;
        register(&registry, &satpoll_run_success)?;
        register(&registry, &satpoll_run_failure)?;
        register(&registry, &satpoll_last_run_timestamp_seconds)?;

        Ok(Self {
            registry,
            satpoll_hosts_polled,
            satpoll_points,
            satpoll_disabled_adapters_skipped,
            satpoll_run_duration_seconds,
            satpoll_run_success,
            satpoll_run_failure,
            satpoll_last_run_timestamp_seconds,
        })
    }

    pub fn record_host(&self, host: &HostPoints) {
        self.satpoll_hosts_polled.inc();
        self.satpoll_disabled_adapters_skipped
            .add(host.disabled_skipped as f64);
        for point in &host.points {
            self.satpoll_points
                .with_label_values(&[point.measurement.as_str()])
                .inc();
        }
    }

    /// `failure` is the error kind that aborted the run, `None` on success.
    pub fn record_outcome(&self, failure: Option<&str>, elapsed: Duration) {
        self.satpoll_run_duration_seconds.set(elapsed.as_secs_f64());
        self.satpoll_last_run_timestamp_seconds.set(now_unix() as f64);
        match failure {
            None => self.satpoll_run_success.set(1.0),
            Some(kind) => {
                self.satpoll_run_success.set(0.0);
                self.satpoll_run_failure.with_label_values(&[kind]).set(1.0);
            }
        }
    }

    pub fn encode_metrics(&self) -> Result<Vec<u8>, prometheus::Error> {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        let mf = self.registry.gather();
        encoder.encode(&mf, &mut buf)?;
        Ok(buf)
    }

    /// Writes `<path>.tmp` and renames it over `path`.
    pub fn write_textfile(&self, path: impl AsRef<Path>) -> Result<(), MetricsError> {
        let path = path.as_ref();
        let encoded = self.encode_metrics()?;
        let mut tmp = PathBuf::from(path);
        tmp.as_mut_os_string().push(".tmp");

        let io_err = |source: std::io::Error| MetricsError::Io {
            path: path.display().to_string(),
            source,
        };
        fs::write(&tmp, encoded).map_err(io_err)?;
        fs::rename(&tmp, path).map_err(io_err)
    }
}

fn register<T: Collector + Clone + 'static>(
    registry: &Registry,
    collector: &T,
) -> Result<(), prometheus::Error> {
    registry.register(Box::new(collector.clone()))
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MetricPoint;

    #[test]
    fn host_results_are_counted() {
        let metrics = Metrics::new().expect("metrics");
        metrics.record_host(&HostPoints {
            points: vec![
                MetricPoint::new("state").field("ad_active", true),
                MetricPoint::new("bandwidth").field("tt", 1.0),
            ],
            disabled_skipped: 2,
        });
        metrics.record_outcome(None, Duration::from_millis(1500));

        let text = String::from_utf8(metrics.encode_metrics().expect("encode")).expect("utf8");
        assert!(text.contains("satpoll_hosts_polled 1"));
        assert!(text.contains("satpoll_points{measurement=\"state\"} 1"));
        assert!(text.contains("satpoll_disabled_adapters_skipped 2"));
        assert!(text.contains("satpoll_run_duration_seconds 1.5"));
        assert!(text.contains("satpoll_run_success 1"));
        assert!(text.contains(
            "# HELP satpoll_run_success 1 if the last run finished without error"
        ));
    }

    #[test]
    fn failure_kind_is_labelled() {
        let metrics = Metrics::new().expect("metrics");
        metrics.record_outcome(Some("fetch"), Duration::ZERO);

        let text = String::from_utf8(metrics.encode_metrics().expect("encode")).expect("utf8");
        assert!(text.contains("satpoll_run_success 0"));
        assert!(text.contains("satpoll_run_failure{kind=\"fetch\"} 1"));
    }

    #[test]
    fn textfile_is_replaced_atomically() {
        let dir = std::env::temp_dir().join(format!("satpoll-metrics-{}", std::process::id()));
        fs::create_dir_all(&dir).expect("temp dir");
        let path = dir.join("satpoll.prom");
        fs::write(&path, "stale").expect("seed");

        let metrics = Metrics::new().expect("metrics");
        metrics.record_outcome(None, Duration::ZERO);
        metrics.write_textfile(&path).expect("write");

        let text = fs::read_to_string(&path).expect("read back");
        assert!(text.contains("satpoll_run_success 1"));
        assert!(!dir.join("satpoll.prom.tmp").exists());
        let _ = fs::remove_dir_all(&dir);
    }
}
