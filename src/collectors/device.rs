use crate::collectors::{DeviceSource, Document, FetchError};
use crate::model::{Bandwidth, DeviceState};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// Reads `state.json` and `bandwidth.json` from a minisatip web interface.
#[derive(Debug, Clone)]
pub struct HttpDeviceSource {
    client: Client,
    port: u16,
}

impl HttpDeviceSource {
    pub fn new(port: u16) -> Self {
        let client = Client::builder()
            .user_agent(concat!("satpoll/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, port }
    }

    pub fn url(&self, host: &str, document: Document) -> String {
        format!("http://{}:{}/{}", host, self.port, document.path())
    }

    async fn fetch_json<T: DeserializeOwned>(
        &self,
        host: &str,
        document: Document,
    ) -> Result<T, FetchError> {
        let url = self.url(host, document);
        debug!(host = %host, url = %url, "fetching device document");

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: url.clone(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            warn!(host = %host, document = %document, status = status.as_u16(), "device answered with an error status");
            return Err(FetchError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let body = resp.text().await.map_err(|source| FetchError::Request {
            url: url.clone(),
            source,
        })?;
        serde_json::from_str(&body).map_err(|source| FetchError::Decode { url, source })
    }
}

impl DeviceSource for HttpDeviceSource {
    async fn fetch_state(&self, host: &str) -> Result<DeviceState, FetchError> {
        self.fetch_json(host, Document::State).await
    }

    async fn fetch_bandwidth(&self, host: &str) -> Result<Bandwidth, FetchError> {
        self.fetch_json(host, Document::Bandwidth).await
    }
}
