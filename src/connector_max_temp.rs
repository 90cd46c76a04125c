//! Yearly maximum temperature connector.
//!
//! Drains one calendar year of `TMAX` readings for a list of stations, then
//! moves the persisted year forward until it reaches the current one. The
//! year only advances once every declared reading has been retrieved.
//!
//! State: `{ year?, stationList?, limit? }`. The year defaults to (and is
//! clamped to) the current year, the station list to the configured one,
//! and the limit, used as the page size, to `max_temp.limit`.

use async_trait::async_trait;
use chrono::Datelike;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use crate::config::{ApiConfig, Config, IdentityConfig, MaxTempConfig, MAX_PAGE_SIZE};
use crate::error::Result;
use crate::fetch::PageFetcher;
use crate::models::{Cursor, InvocationOutput, Record, SyncState};
use crate::normalize::RowNormalizer;
use crate::paginate::PaginationDriver;
use crate::traits::Connector;
use crate::transport::{ApiRequest, Transport};
use crate::window::Clock;

pub const NAME: &str = "max_temp";
pub const DESCRIPTION: &str = "Yearly maximum temperature per station";

pub struct MaxTempConnector {
    api: ApiConfig,
    max_temp: MaxTempConfig,
    fetcher: PageFetcher,
    normalizer: RowNormalizer,
    clock: Arc<dyn Clock>,
}

impl MaxTempConnector {
    pub fn new(config: &Config, transport: Arc<dyn Transport>, clock: Arc<dyn Clock>) -> Self {
        Self {
            api: config.api.clone(),
            max_temp: config.max_temp.clone(),
            fetcher: PageFetcher::new(transport, config.retry.clone()),
            normalizer: RowNormalizer::new(IdentityConfig::derived(&["station", "date"])),
            clock,
        }
    }

    fn request(&self, year: i32, stations: &[String]) -> ApiRequest {
        let mut request = ApiRequest::new("data")
            .param("datasetid", &self.api.dataset_id)
            .param("datatypeid", "TMAX")
            .param("startdate", format!("{}-01-01", year))
            .param("enddate", format!("{}-12-31", year))
            .param("units", &self.api.units);
        for station in stations {
            request = request.param("stationid", station);
        }
        request
    }
}

/// Trim a record's `date` timestamp down to `YYYY-MM-DD`.
fn reformat_date(mut record: Record) -> Record {
    let reformatted = record
        .get("date")
        .and_then(Value::as_str)
        .and_then(|raw| Cursor::parse(raw).ok())
        .map(|c| c.date().format("%Y-%m-%d").to_string());
    if let Some(date) = reformatted {
        record.insert("date".to_string(), Value::String(date));
    }
    record
}

#[async_trait]
impl Connector for MaxTempConnector {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    fn table(&self) -> &str {
        &self.max_temp.table
    }

    async fn invoke(&self, state: &SyncState) -> Result<InvocationOutput> {
        let current_year = self.clock.today().year();
        let year = state.year.unwrap_or(current_year).min(current_year);
        let stations = state
            .station_list
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| self.max_temp.stations.clone());
        let limit = state
            .limit
            .unwrap_or(self.max_temp.limit)
            .clamp(1, MAX_PAGE_SIZE);

        let driver = PaginationDriver::new(self.fetcher.clone(), limit);
        let result = driver.drain(&self.request(year, &stations)).await?;
        let records = result.records.into_iter().map(reformat_date).collect();
        let rows = self.normalizer.normalize(records)?;

        let next_year = if year < current_year { year + 1 } else { year };
        info!(
            connector = NAME,
            year,
            stations = stations.len(),
            rows = rows.len(),
            next_year,
            "invocation complete"
        );

        let next_state = SyncState {
            year: Some(next_year),
            ..state.clone()
        };
        Ok(InvocationOutput::single_table(
            &self.max_temp.table,
            rows,
            self.normalizer.primary_key(),
            next_state,
            false,
        ))
    }
}
