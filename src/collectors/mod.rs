pub mod device;

use crate::model::{Bandwidth, DeviceState};
use thiserror::Error;

/// The two JSON documents every receiver serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Document {
    State,
    Bandwidth,
}

impl Document {
    pub fn path(self) -> &'static str {
        match self {
            Document::State => "state.json",
            Document::Bandwidth => "bandwidth.json",
        }
    }
}

impl std::fmt::Display for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("{url} returned malformed JSON: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Where snapshots come from. Calls are awaited one after another.
pub trait DeviceSource {
    async fn fetch_state(&self, host: &str) -> Result<DeviceState, FetchError>;
    async fn fetch_bandwidth(&self, host: &str) -> Result<Bandwidth, FetchError>;
}
