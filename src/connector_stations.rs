//! Station catalog connector.
//!
//! Pulls the full list of observing stations from the `stations` endpoint.
//! The catalog runs to well over a hundred thousand entries, so it goes
//! through the same probe-then-page driver as the daily connector.
//!
//! The catalog has no temporal cursor. `state.lastSyncRun`, when present,
//! is forwarded as the `startdate` filter; the connector always returns the
//! empty state and `hasMore = false`.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::config::{Config, IdentityConfig, StationsConfig};
use crate::error::Result;
use crate::fetch::PageFetcher;
use crate::models::{InvocationOutput, SyncState};
use crate::normalize::RowNormalizer;
use crate::paginate::PaginationDriver;
use crate::traits::Connector;
use crate::transport::{ApiRequest, Transport};

pub const NAME: &str = "stations";
pub const DESCRIPTION: &str = "Full station catalog";

pub struct StationsConnector {
    stations: StationsConfig,
    driver: PaginationDriver,
    normalizer: RowNormalizer,
}

impl StationsConnector {
    pub fn new(config: &Config, transport: Arc<dyn Transport>) -> Self {
        let fetcher = PageFetcher::new(transport, config.retry.clone());
        Self {
            stations: config.stations.clone(),
            driver: PaginationDriver::new(fetcher, config.stations.page_size),
            // Stations carry their own stable id.
            normalizer: RowNormalizer::new(IdentityConfig::derived(&["id"])),
        }
    }

    fn request(&self, state: &SyncState) -> ApiRequest {
        let request = ApiRequest::new("stations");
        match state.last_sync_run.as_deref() {
            Some(since) if !since.trim().is_empty() => request.param("startdate", since.trim()),
            _ => request,
        }
    }
}

#[async_trait]
impl Connector for StationsConnector {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    fn table(&self) -> &str {
        &self.stations.table
    }

    async fn invoke(&self, state: &SyncState) -> Result<InvocationOutput> {
        let result = self.driver.drain(&self.request(state)).await?;
        let rows = self.normalizer.normalize(result.records)?;

        info!(connector = NAME, rows = rows.len(), "invocation complete");

        Ok(InvocationOutput::single_table(
            &self.stations.table,
            rows,
            self.normalizer.primary_key(),
            SyncState::default(),
            false,
        ))
    }
}
