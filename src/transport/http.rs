use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;

use super::{ChunkSource, Transport, TransportError};
use crate::params::RunRequest;
use crate::scenario::ProblemDescriptor;
use crate::settings::ConsoleSettings;

/// reqwest-backed transport for the RBDO backend.
///
/// Only connecting is time-limited; a run stream may stay silent for as
/// long as the backend needs.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(base_url: Url, connect_timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("rbdo-console/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| TransportError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: with_trailing_slash(base_url),
        })
    }

    pub fn from_settings(settings: &ConsoleSettings) -> Result<Self, TransportError> {
        Self::new(
            settings.backend_url.clone(),
            Duration::from_secs(settings.connect_timeout_secs),
        )
    }

    fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
        self.base_url
            .join(path)
            .map_err(|e| TransportError::Network(format!("Invalid endpoint '{}': {}", path, e)))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn list_problems(&self) -> Result<Vec<ProblemDescriptor>, TransportError> {
        let url = self.endpoint("get_problems")?;
        info!("Fetching problem list from {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                message: format!("Server returned {}", status.as_u16()),
            });
        }

        response
            .json::<Vec<ProblemDescriptor>>()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))
    }

    async fn run_optimization(
        &self,
        request: &RunRequest,
        cancel: &CancellationToken,
    ) -> Result<Box<dyn ChunkSource>, TransportError> {
        let url = self.endpoint("run_optimization")?;
        info!("Starting optimization run at {}", url);

        let send = self.client.post(url).json(request).send();
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransportError::Cancelled),
            result = send => result.map_err(|e| TransportError::Network(e.to_string()))?,
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            let message = error_message(status, &body);
            warn!("Run request rejected with {}: {}", status.as_u16(), message);
            return Err(TransportError::Status {
                status: status.as_u16(),
                message,
            });
        }

        Ok(Box::new(HttpChunks { response }))
    }
}

struct HttpChunks {
    response: reqwest::Response,
}

#[async_trait]
impl ChunkSource for HttpChunks {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        self.response
            .chunk()
            .await
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .map_err(|e| TransportError::Body(e.to_string()))
    }
}

/// Server error text from a JSON body's `error` field, else `HTTP Error <status>`.
fn error_message(status: StatusCode, body: &[u8]) -> String {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .filter(|msg| !msg.is_empty())
        .unwrap_or_else(|| format!("HTTP Error {}", status.as_u16()))
}

/// `Url::join` replaces the last path segment unless the base ends in `/`.
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
