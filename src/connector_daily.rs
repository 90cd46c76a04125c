//! Daily observations connector.
//!
//! Syncs the GHCND `data` endpoint one day at a time. Each invocation:
//!
//! 1. Resumes from `state.lastRetrievedCursor` (or the epoch start).
//! 2. Picks the one-day window for that cursor.
//! 3. Drains every page of the window.
//! 4. Stamps each record with a primary key.
//! 5. Returns the rows, the advanced cursor, and whether the source still
//!    has published days to catch up on.
//!
//! # Configuration
//!
//! ```toml
//! [daily]
//! table = "noaa_data"
//! datatypes = ["TMAX", "TMIN", "WT16", "WSFG", "WDFG", "TPCP"]
//! page_size = 1000
//! epoch_start = "2014-01-01T00:00:00"
//!
//! [daily.identity]
//! policy = "derived"
//! fields = ["date", "datatype", "station", "attributes"]
//! ```

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::config::{ApiConfig, Config, DailyConfig};
use crate::error::Result;
use crate::fetch::PageFetcher;
use crate::models::{InvocationOutput, SyncState};
use crate::normalize::RowNormalizer;
use crate::paginate::PaginationDriver;
use crate::traits::Connector;
use crate::transport::Transport;
use crate::window::{Clock, WindowAdvancer};

pub const NAME: &str = "daily";
pub const DESCRIPTION: &str = "Daily GHCND observations, one day per invocation";

pub struct DailyConnector {
    api: ApiConfig,
    daily: DailyConfig,
    driver: PaginationDriver,
    advancer: WindowAdvancer,
    normalizer: RowNormalizer,
    clock: Arc<dyn Clock>,
}

impl DailyConnector {
    pub fn new(config: &Config, transport: Arc<dyn Transport>, clock: Arc<dyn Clock>) -> Result<Self> {
        let fetcher = PageFetcher::new(transport, config.retry.clone());
        Ok(Self {
            api: config.api.clone(),
            daily: config.daily.clone(),
            driver: PaginationDriver::new(fetcher, config.daily.page_size),
            advancer: WindowAdvancer::from_config(&config.daily)?,
            normalizer: RowNormalizer::new(config.daily.identity.clone()),
            clock,
        })
    }
}

#[async_trait]
impl Connector for DailyConnector {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    fn table(&self) -> &str {
        &self.daily.table
    }

    async fn invoke(&self, state: &SyncState) -> Result<InvocationOutput> {
        let today = self.clock.today();
        let cursor = self
            .advancer
            .resume_from(state.last_retrieved_cursor.as_deref())?;
        let window = self.advancer.next_window(cursor, today)?;

        let result = self
            .driver
            .drain_window(&self.api, &window, &self.daily.datatypes)
            .await?;

        let next = self.advancer.advance(cursor, &window, &result)?;
        let has_more = self.advancer.has_more(next, today);
        let rows = self.normalizer.normalize(result.records)?;

        info!(
            connector = NAME,
            window = %window,
            rows = rows.len(),
            deterministic_ids = self.normalizer.is_deterministic(),
            next_cursor = %next,
            has_more,
            "invocation complete"
        );

        let next_state = SyncState {
            last_retrieved_cursor: Some(next.to_string()),
            ..state.clone()
        };
        Ok(InvocationOutput::single_table(
            &self.daily.table,
            rows,
            self.normalizer.primary_key(),
            next_state,
            has_more,
        ))
    }
}
