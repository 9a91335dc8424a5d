use crate::config::StoreConfig;
use crate::model::MetricPoint;
use crate::store::line_protocol::encode_batch;
use crate::store::{MetricStore, StoreError};
use reqwest::{Client, Response};
use serde::Deserialize;
use tracing::debug;

/// InfluxDB 1.x over its HTTP API (`/query` and `/write`).
#[derive(Debug, Clone)]
pub struct InfluxClient {
    client: Client,
    base_url: String,
    database: String,
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatementResult {
    #[serde(default)]
    series: Vec<Series>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Series {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

impl InfluxClient {
    pub fn new(cfg: &StoreConfig) -> Self {
        let client = Client::builder()
            .user_agent(concat!("satpoll/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url: cfg.base_url(),
            database: cfg.database.clone(),
            username: cfg.username.clone(),
            password: cfg.password.clone(),
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

}

/// Credentials travel in the `Authorization` header and reqwest's URL is
/// stripped, so neither can end up in an error message.
fn request_failed(url: &str) -> impl FnOnce(reqwest::Error) -> StoreError + '_ {
    move |source| StoreError::Request {
        url: url.to_string(),
        source: source.without_url(),
    }
}

impl MetricStore for InfluxClient {
    async fn database_names(&self) -> Result<Vec<String>, StoreError> {
        let url = format!("{}/query", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[("q", "SHOW DATABASES")])
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(request_failed(&url))?;
        let body = read_success_body(resp, &url).await?;
        parse_database_names(&body)
    }

    async fn write_points(&self, points: &[MetricPoint]) -> Result<(), StoreError> {
        let body = encode_batch(points);
        if body.is_empty() {
            debug!("nothing to write");
            return Ok(());
        }

        let url = format!("{}/write", self.base_url);
        debug!(database = %self.database, bytes = body.len(), "writing batch");
        let resp = self
            .client
            .post(&url)
            .query(&[("db", self.database.as_str())])
            .basic_auth(&self.username, Some(&self.password))
            .body(body)
            .send()
            .await
            .map_err(request_failed(&url))?;
        read_success_body(resp, &url).await?;
        Ok(())
    }
}

async fn read_success_body(resp: Response, url: &str) -> Result<String, StoreError> {
    let status = resp.status();
    let body = resp.text().await.map_err(request_failed(url))?;
    if status.is_success() {
        return Ok(body);
    }

    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|e| e.error)
        .unwrap_or_else(|_| body.trim().to_string());
    Err(StoreError::Status {
        status: status.as_u16(),
        message,
    })
}

fn parse_database_names(body: &str) -> Result<Vec<String>, StoreError> {
    let resp: QueryResponse = serde_json::from_str(body)?;
    if let Some(err) = resp.error {
        return Err(StoreError::Query(err));
    }

    let mut names = Vec::new();
    for result in resp.results {
        if let Some(err) = result.error {
            return Err(StoreError::Query(err));
        }
        for series in result.series {
            names.extend(
                series
                    .values
                    .iter()
                    .filter_map(|row| row.first()?.as_str().map(str::to_string)),
            );
        }
    }
    Ok(names)
}
