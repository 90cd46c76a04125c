//! HTTP seam between the connector and the source API.
//!
//! The page fetcher only ever talks to a [`Transport`]. [`HttpTransport`]
//! is the real implementation over `reqwest`; tests substitute a scripted
//! transport so the pagination and retry logic runs without a network.

use async_trait::async_trait;
use tracing::debug;

use crate::config::{ApiConfig, Credential};
use crate::error::{Result, SyncError};

/// One GET request against the source API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    /// Path below the API base URL, e.g. `"data"` or `"stations"`.
    pub endpoint: String,
    /// Query parameters in send order. Keys may repeat.
    pub params: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, key: &str, value: impl ToString) -> Self {
        self.params.push((key.to_string(), value.to_string()));
        self
    }

    /// Replace every value of `key` with `value`.
    pub fn set(mut self, key: &str, value: impl ToString) -> Self {
        self.params.retain(|(k, _)| k != key);
        self.param(key, value)
    }

    /// First value of `key`, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Status and body of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends a single request. Implementations must not retry; the fetcher
/// owns the retry budget.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue exactly one network request.
    ///
    /// Returns `Err` only when no HTTP response was received (connect
    /// failure, timeout). Non-2xx statuses come back as `Ok`.
    async fn get(&self, request: &ApiRequest) -> Result<ApiResponse>;
}

/// [`Transport`] over `reqwest`, authenticating with a header credential.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    auth_header: String,
    credential: Credential,
}

impl HttpTransport {
    /// Build the HTTP client. The request timeout comes from `api.timeout_secs`.
    pub fn new(api: &ApiConfig, credential: Credential) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("noaa-sync/", env!("CARGO_PKG_VERSION")))
            .timeout(api.timeout())
            .build()
            .map_err(|e| SyncError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: api.base_url.trim_end_matches('/').to_string(),
            auth_header: api.auth_header.clone(),
            credential,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let url = format!("{}/{}", self.base_url, request.endpoint);
        debug!(url = %url, params = ?request.params, "GET");

        let response = self
            .client
            .get(&url)
            .header(self.auth_header.as_str(), self.credential.expose())
            .query(&request.params)
            .send()
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))?;

        Ok(ApiResponse { status, body })
    }
}
