//! HTTP transport backed by reqwest.

use super::{FeedTransport, FetchError};
use crate::config::HttpConfig;
use crate::domain::FeedRequest;
use crate::error::{FeedpullError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Settings for `HttpTransport`.
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self::from(&HttpConfig::default())
    }
}

impl From<&HttpConfig> for HttpTransportConfig {
    fn from(config: &HttpConfig) -> Self {
        Self {
            timeout: Duration::from_millis(config.timeout_ms),
            user_agent: config.user_agent.clone(),
        }
    }
}

/// Plain GET transport: request headers are sent as-is, any non-2xx is a failure.
pub struct HttpTransport {
    client: Client,
    config: HttpTransportConfig,
}

impl HttpTransport {
    /// Build the underlying reqwest client.
    pub fn new(config: HttpTransportConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| FeedpullError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn map_error(&self, request: &FeedRequest, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            info!(request_id = %request.id(), url = %request.url_for_logging(), "Request timed out");
            FetchError::Timeout(self.config.timeout)
        } else {
            warn!(request_id = %request.id(), url = %request.url_for_logging(), error = %err, "Request failed");
            FetchError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl FeedTransport for HttpTransport {
    async fn fetch(&self, request: &FeedRequest) -> std::result::Result<Vec<u8>, FetchError> {
        debug!(request_id = %request.id(), url = %request.url_for_logging(), "HttpTransport::fetch: called");

        let mut builder = self.client.get(request.url());
        for (key, value) in request.headers() {
            builder = builder.header(key.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(|e| self.map_error(request, e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                request_id = %request.id(),
                url = %request.url_for_logging(),
                status = status.as_u16(),
                "Unexpected response status"
            );
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: request.url_for_logging().to_string(),
            });
        }

        let body = response.bytes().await.map_err(|e| self.map_error(request, e))?;
        Ok(body.to_vec())
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("timeout", &self.config.timeout)
            .field("user_agent", &self.config.user_agent)
            .finish()
    }
}
