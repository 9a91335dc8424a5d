use crate::collectors::{DeviceSource, Document, FetchError};
use crate::config::{Config, ConfigError, ReportMode};
use crate::metrics::Metrics;
use crate::model::MetricPoint;
use crate::store::{MetricStore, StoreError};
use crate::transform::{self, HostPoints};
use futures::stream::{self, TryStreamExt};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to list databases: {0}")]
    Store(#[source] StoreError),
    #[error("the specified database \"{0}\" does not exist")]
    DatabaseNotFound(String),
    #[error("failed to fetch {document} from {host}: {source}")]
    Fetch {
        host: String,
        document: Document,
        #[source]
        source: FetchError,
    },
    #[error("failed to write {points} points: {source}")]
    Write {
        points: usize,
        #[source]
        source: StoreError,
    },
}

impl RunError {
    /// Label used for the run failure metric.
    pub fn kind(&self) -> &'static str {
        match self {
            RunError::Config(_) => "config",
            RunError::Store(_) => "store",
            RunError::DatabaseNotFound(_) => "database_not_found",
            RunError::Fetch { .. } => "fetch",
            RunError::Write { .. } => "write",
        }
    }
}

/// Everything collected in one run, in write order.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    pub hosts: usize,
    pub points: Vec<MetricPoint>,
    pub disabled_skipped: usize,
}

impl Batch {
    fn append(mut self, host: HostPoints) -> Self {
        self.hosts += 1;
        self.disabled_skipped += host.disabled_skipped;
        self.points.extend(host.points);
        self
    }
}

/// Resolves configuration, builds the collaborators and performs one run.
///
/// `connect` only runs once the configuration is complete, so a missing key
/// aborts before any device or store is contacted. A `None` store polls the
/// devices and returns the batch without writing it.
pub async fn execute<D, S, F>(
    config: Result<Config, ConfigError>,
    connect: F,
    metrics: &Metrics,
) -> Result<Batch, RunError>
where
    D: DeviceSource,
    S: MetricStore,
    F: FnOnce(&Config) -> (D, Option<S>),
{
    let cfg = config?;
    let (devices, store) = connect(&cfg);
    run(&cfg, &devices, store.as_ref(), metrics).await
}

pub async fn run<D: DeviceSource, S: MetricStore>(
    cfg: &Config,
    devices: &D,
    store: Option<&S>,
    metrics: &Metrics,
) -> Result<Batch, RunError> {
    if let Some(store) = store {
        ensure_database(store, &cfg.store.database).await?;
    }

    let batch = collect_batch(devices, &cfg.hosts, cfg.report_mode, metrics).await?;

    if let Some(store) = store {
        store
            .write_points(&batch.points)
            .await
            .map_err(|source| RunError::Write {
                points: batch.points.len(),
                source,
            })?;
        info!(points = batch.points.len(), hosts = batch.hosts, "batch written");
    }
    Ok(batch)
}

pub async fn ensure_database<S: MetricStore>(store: &S, database: &str) -> Result<(), RunError> {
    let names = store.database_names().await.map_err(RunError::Store)?;
    if !names.iter().any(|name| name == database) {
        return Err(RunError::DatabaseNotFound(database.to_string()));
    }
    debug!(database = %database, "database exists");
    Ok(())
}

/// Polls hosts one at a time, in configured order, folding their points into
/// one batch. The first failure stops the fold.
pub async fn collect_batch<D: DeviceSource>(
    devices: &D,
    hosts: &[String],
    mode: ReportMode,
    metrics: &Metrics,
) -> Result<Batch, RunError> {
    stream::iter(hosts.iter().map(Ok::<_, RunError>))
        .try_fold(Batch::default(), move |batch, host| async move {
            let points = poll_host(devices, host, mode).await?;
            metrics.record_host(&points);
            Ok(batch.append(points))
        })
        .await
}

pub async fn poll_host<D: DeviceSource>(
    devices: &D,
    host: &str,
    mode: ReportMode,
) -> Result<HostPoints, RunError> {
    // Both documents are fetched in every mode, so a broken state.json aborts
    // the run even when its adapters are not reported.
    let state = devices
        .fetch_state(host)
        .await
        .map_err(fetch_failed(host, Document::State))?;
    let bandwidth = devices
        .fetch_bandwidth(host)
        .await
        .map_err(fetch_failed(host, Document::Bandwidth))?;

    let points = transform::host_points(host, mode, Some(&state), &bandwidth);
    debug!(
        host = %host,
        points = points.points.len(),
        disabled_skipped = points.disabled_skipped,
        "host polled"
    );
    Ok(points)
}

fn fetch_failed(host: &str, document: Document) -> impl FnOnce(FetchError) -> RunError + '_ {
    move |source| RunError::Fetch {
        host: host.to_string(),
        document,
        source,
    }
}
