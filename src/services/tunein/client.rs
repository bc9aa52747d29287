//! TuneIn HTTP collaborator
//!
//! JSON GET client behind a trait so the resolver and the stream
//! expansion pipeline can be exercised without network access.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};

use super::urls::redact_serial;

/// Upstream API error types
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Network/connection error
    #[error("Network error: {0}")]
    Network(String),
    /// HTTP error (non-2xx status)
    #[error("HTTP error: {0}")]
    Http(u16),
    /// JSON parsing error
    #[error("Parse error: {0}")]
    Parse(String),
    /// Empty response from server
    #[error("Empty response")]
    EmptyResponse,
}

/// JSON GET against an upstream URL
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Fetch `url` with the given headers and parse the body as JSON.
    ///
    /// `timeout` overrides the client-wide timeout for this request.
    async fn get_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        timeout: Option<Duration>,
    ) -> Result<Value, UpstreamError>;
}

/// reqwest-backed upstream client
#[derive(Clone)]
pub struct HttpUpstream {
    http: Client,
}

impl HttpUpstream {
    /// Create a new client with a default per-request timeout
    pub fn new(timeout: Duration) -> Result<Self, UpstreamError> {
        let http = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .build()
            .map_err(|e| UpstreamError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http })
    }
}

#[async_trait]
impl UpstreamClient for HttpUpstream {
    async fn get_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        timeout: Option<Duration>,
    ) -> Result<Value, UpstreamError> {
        debug!("Upstream request: {}", redact_serial(url));

        let mut request = self.http.get(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        if let Some(t) = timeout {
            request = request.timeout(t);
        }

        let response = request
            .send()
            .await
            .map_err(|e| UpstreamError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Http(status.as_u16()));
        }

        let text = response
            .text()
            .await
            .map_err(|e| UpstreamError::Network(e.to_string()))?;

        if text.trim().is_empty() || text == "null" {
            return Err(UpstreamError::EmptyResponse);
        }

        serde_json::from_str(&text).map_err(|e| {
            error!("Failed to parse upstream response for '{}': {}", redact_serial(url), e);
            debug!("Response text: {}", text.chars().take(500).collect::<String>());
            UpstreamError::Parse(e.to_string())
        })
    }
}
