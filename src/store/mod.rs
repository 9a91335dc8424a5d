pub mod influx;
pub mod line_protocol;

use crate::model::MetricPoint;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("store answered with HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("store returned malformed JSON: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("store rejected the query: {0}")]
    Query(String),
}

/// Time-series store the batch ends up in.
pub trait MetricStore {
    async fn database_names(&self) -> Result<Vec<String>, StoreError>;
    /// Writes the whole batch in one request.
    async fn write_points(&self, points: &[MetricPoint]) -> Result<(), StoreError>;
}
