//! Pagination driver.
//!
//! Drains every page of one query:
//!
//! 1. A size-1 probe learns the declared result count.
//! 2. A count of zero (or a response with no metadata) ends the query.
//! 3. Pages of `page_size` are requested at increasing offsets until the
//!    retrieved count reaches the declared count.
//!
//! Each page request carries the fetcher's bounded retry budget; a page
//! that keeps failing aborts the whole query instead of spinning. A page
//! that comes back empty while results are still owed is an error too,
//! since the offset could never advance past it.

use tracing::{debug, info};

use crate::config::ApiConfig;
use crate::error::{Result, SyncError};
use crate::fetch::{data_request, PageFetcher, Paging};
use crate::models::{FetchResult, Window};
use crate::transport::ApiRequest;

pub struct PaginationDriver {
    fetcher: PageFetcher,
    page_size: u32,
}

impl PaginationDriver {
    pub fn new(fetcher: PageFetcher, page_size: u32) -> Self {
        Self {
            fetcher,
            page_size: page_size.max(1),
        }
    }

    /// Drain the `data` endpoint for one window.
    pub async fn drain_window(
        &self,
        api: &ApiConfig,
        window: &Window,
        datatypes: &[String],
    ) -> Result<FetchResult> {
        info!(window = %window, "retrieving window");
        let result = self.drain(&data_request(api, window, datatypes)).await?;
        info!(
            window = %window,
            retrieved = result.retrieved_count,
            total = result.total_count,
            "window retrieved"
        );
        Ok(result)
    }

    /// Drain every page of `base`.
    pub async fn drain(&self, base: &ApiRequest) -> Result<FetchResult> {
        let probe = self.fetcher.fetch(base, Paging::probe()).await?;
        let total = probe.total_count.unwrap_or(0);
        if total == 0 {
            debug!(endpoint = %base.endpoint, "no results declared");
            return Ok(FetchResult::default());
        }

        let mut records = Vec::new();
        let mut retrieved = 0u64;

        // Every pass either advances `retrieved` or returns, so this runs
        // at most `total` times.
        while retrieved < total {
            let page = self
                .fetcher
                .fetch(base, Paging::page(retrieved, self.page_size))
                .await?;

            if page.records.is_empty() {
                return Err(SyncError::EmptyPage {
                    offset: retrieved,
                    retrieved,
                    total,
                });
            }

            retrieved += page.records.len() as u64;
            debug!(
                endpoint = %base.endpoint,
                page_len = page.records.len(),
                retrieved,
                total,
                "page retrieved"
            );
            records.extend(page.records);
        }

        Ok(FetchResult {
            records,
            total_count: total,
            retrieved_count: retrieved,
        })
    }
}
