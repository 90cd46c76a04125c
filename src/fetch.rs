//! Page fetcher.
//!
//! Issues one bounded request per page against the source API and retries
//! the same request on failure. Both a non-2xx status and a transport error
//! count as a failed attempt. Attempts are spaced with exponential backoff
//! plus random jitter:
//!
//! ```text
//! delay(n) = min(base * 2^n, max) + rand(0..=jitter)
//! ```
//!
//! When the budget is spent the fetcher returns
//! [`SyncError::FetchExhausted`], which aborts the invocation. Nothing is
//! persisted on that path, so the next invocation re-fetches the same
//! window.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::{ApiConfig, RetryConfig};
use crate::error::{Result, SyncError};
use crate::models::{Record, Window, TIMESTAMP_FORMAT};
use crate::transport::{ApiRequest, Transport};

/// Offset and size of one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    /// `None` for the probe.
    pub offset: Option<u64>,
    pub limit: u32,
}

impl Paging {
    /// A size-1 request whose only purpose is the result count.
    pub fn probe() -> Self {
        Self {
            offset: None,
            limit: 1,
        }
    }

    pub fn page(offset: u64, limit: u32) -> Self {
        Self {
            offset: Some(offset),
            limit,
        }
    }
}

/// One decoded response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageResult {
    pub records: Vec<Record>,
    /// Result count from response metadata. Absent when the source omits
    /// metadata, which it does for empty result sets.
    pub total_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct PageBody {
    #[serde(default)]
    metadata: Option<Metadata>,
    #[serde(default)]
    results: Vec<Record>,
}

#[derive(Debug, Deserialize)]
struct Metadata {
    resultset: ResultSet,
}

#[derive(Debug, Deserialize)]
struct ResultSet {
    count: u64,
}

/// Build the base query for one window of the `data` endpoint.
pub fn data_request(api: &ApiConfig, window: &Window, datatypes: &[String]) -> ApiRequest {
    let mut request = ApiRequest::new("data")
        .param("datasetid", &api.dataset_id)
        .param("startdate", window.start().format(TIMESTAMP_FORMAT))
        .param("enddate", window.end().format(TIMESTAMP_FORMAT))
        .param("units", &api.units);
    for datatype in datatypes {
        request = request.param("datatypeid", datatype);
    }
    request
}

/// Backoff before retry number `attempt` (0-based), without jitter.
pub fn backoff_delay(retry: &RetryConfig, attempt: u32) -> Duration {
    let factor = 1u64 << attempt.min(16);
    Duration::from_millis(retry.base_delay_ms.saturating_mul(factor).min(retry.max_delay_ms))
}

fn jittered_delay(retry: &RetryConfig, attempt: u32) -> Duration {
    let jitter = if retry.jitter_ms > 0 {
        rand::thread_rng().gen_range(0..=retry.jitter_ms)
    } else {
        0
    };
    backoff_delay(retry, attempt) + Duration::from_millis(jitter)
}

/// Fetches single pages with a bounded retry budget.
#[derive(Clone)]
pub struct PageFetcher {
    transport: Arc<dyn Transport>,
    retry: RetryConfig,
}

impl PageFetcher {
    pub fn new(transport: Arc<dyn Transport>, retry: RetryConfig) -> Self {
        Self { transport, retry }
    }

    /// Fetch one page of `base`.
    ///
    /// `base` carries the filters (window, categories, stations); paging
    /// parameters are layered on top. A probe keeps response metadata, data
    /// pages ask the source to omit it.
    pub async fn fetch(&self, base: &ApiRequest, paging: Paging) -> Result<PageResult> {
        let mut request = base.clone().set("limit", paging.limit);
        if let Some(offset) = paging.offset {
            request = request
                .set("offset", offset)
                .set("include_metadata", "false");
        }
        let operation = match paging.offset {
            Some(offset) => format!("{} page at offset {}", base.endpoint, offset),
            None => format!("{} metadata probe", base.endpoint),
        };

        let max_attempts = self.retry.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 0..max_attempts {
            if attempt > 0 {
                let delay = jittered_delay(&self.retry, attempt - 1);
                debug!(
                    operation = %operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "retrying after delay"
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }

            match self.transport.get(&request).await {
                Ok(response) if response.is_success() => {
                    return decode_page(&operation, &response.body);
                }
                Ok(response) => {
                    last_error = format!("HTTP {}", response.status);
                    warn!(
                        operation = %operation,
                        attempt = attempt + 1,
                        status = response.status,
                        "request failed"
                    );
                }
                Err(e) => {
                    last_error = e.to_string();
                    warn!(
                        operation = %operation,
                        attempt = attempt + 1,
                        error = %e,
                        "request failed"
                    );
                }
            }
        }

        Err(SyncError::FetchExhausted {
            operation,
            attempts: max_attempts,
            last_error,
        })
    }
}

fn decode_page(operation: &str, body: &str) -> Result<PageResult> {
    let page: PageBody = serde_json::from_str(body).map_err(|source| SyncError::Decode {
        operation: operation.to_string(),
        source,
    })?;
    Ok(PageResult {
        records: page.results,
        total_count: page.metadata.map(|m| m.resultset.count),
    })
}
