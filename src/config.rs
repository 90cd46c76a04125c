//! TOML configuration for the connector.
//!
//! Every field has a default, so the connector runs with no file at all.
//! A file only needs the values it overrides:
//!
//! ```toml
//! [api]
//! token_env = "NOAA_API_KEY"
//!
//! [daily]
//! page_size = 500
//!
//! [daily.backfill]
//! enabled = true
//!
//! [retry]
//! max_attempts = 5
//! ```

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::error::SyncError;

/// Largest page the source will return.
pub const MAX_PAGE_SIZE: u32 = 1000;

pub const MAX_PUBLISH_LAG_DAYS: i64 = 365;

/// A century.
pub const MAX_BACKFILL_SPAN_DAYS: i64 = 36_500;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub daily: DailyConfig,
    #[serde(default)]
    pub stations: StationsConfig,
    #[serde(default)]
    pub max_temp: MaxTempConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_dataset_id")]
    pub dataset_id: String,
    #[serde(default = "default_units")]
    pub units: String,
    /// Header that carries the credential.
    #[serde(default = "default_auth_header")]
    pub auth_header: String,
    /// Environment variable the binary reads the credential from.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            dataset_id: default_dataset_id(),
            units: default_units(),
            auth_header: default_auth_header(),
            token_env: default_token_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_base_url() -> String {
    "https://www.ncdc.noaa.gov/cdo-web/api/v2".to_string()
}
fn default_dataset_id() -> String {
    "GHCND".to_string()
}
fn default_units() -> String {
    "standard".to_string()
}
fn default_auth_header() -> String {
    "token".to_string()
}
fn default_token_env() -> String {
    "NOAA_API_KEY".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

/// How rows get a stable primary key.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "policy", rename_all = "lowercase")]
pub enum IdentityConfig {
    /// Join the named record fields into an `id`.
    Derived {
        fields: Vec<String>,
        #[serde(default = "default_separator")]
        separator: String,
    },
    /// Give every record a fresh random `id`. Re-fetching a window after a
    /// failed run yields duplicates with different ids.
    Random,
}

fn default_separator() -> String {
    "-".to_string()
}

impl IdentityConfig {
    pub fn derived(fields: &[&str]) -> Self {
        IdentityConfig::Derived {
            fields: fields.iter().map(|f| f.to_string()).collect(),
            separator: default_separator(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackfillConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_backfill_span_days")]
    pub span_days: i64,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            span_days: default_backfill_span_days(),
        }
    }
}

fn default_backfill_span_days() -> i64 {
    3650
}

#[derive(Debug, Deserialize, Clone)]
pub struct DailyConfig {
    #[serde(default = "default_daily_table")]
    pub table: String,
    /// Data categories requested on every query.
    #[serde(default = "default_datatypes")]
    pub datatypes: Vec<String>,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Cursor used when the runtime supplies none.
    #[serde(default = "default_epoch_start")]
    pub epoch_start: String,
    /// Days the source needs before a day's data is published.
    #[serde(default = "default_publish_lag_days")]
    pub publish_lag_days: i64,
    #[serde(default = "default_daily_identity")]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub backfill: BackfillConfig,
}

impl Default for DailyConfig {
    fn default() -> Self {
        Self {
            table: default_daily_table(),
            datatypes: default_datatypes(),
            page_size: default_page_size(),
            epoch_start: default_epoch_start(),
            publish_lag_days: default_publish_lag_days(),
            identity: default_daily_identity(),
            backfill: BackfillConfig::default(),
        }
    }
}

fn default_daily_table() -> String {
    "noaa_data".to_string()
}
fn default_datatypes() -> Vec<String> {
    // TMAX/TMIN: temperature extremes, WT16: rain, WSFG/WDFG: peak gust
    // speed and direction, TPCP: total precipitation.
    ["TMAX", "TMIN", "WT16", "WSFG", "WDFG", "TPCP"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_page_size() -> u32 {
    MAX_PAGE_SIZE
}
fn default_epoch_start() -> String {
    "2014-01-01T00:00:00".to_string()
}
fn default_publish_lag_days() -> i64 {
    2
}
fn default_daily_identity() -> IdentityConfig {
    IdentityConfig::derived(&["date", "datatype", "station", "attributes"])
}

#[derive(Debug, Deserialize, Clone)]
pub struct StationsConfig {
    #[serde(default = "default_stations_table")]
    pub table: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for StationsConfig {
    fn default() -> Self {
        Self {
            table: default_stations_table(),
            page_size: default_page_size(),
        }
    }
}

fn default_stations_table() -> String {
    "stations".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct MaxTempConfig {
    #[serde(default = "default_max_temp_table")]
    pub table: String,
    #[serde(default = "default_station_list")]
    pub stations: Vec<String>,
    #[serde(default = "default_max_temp_limit")]
    pub limit: u32,
}

impl Default for MaxTempConfig {
    fn default() -> Self {
        Self {
            table: default_max_temp_table(),
            stations: default_station_list(),
            limit: default_max_temp_limit(),
        }
    }
}

fn default_max_temp_table() -> String {
    "max_temp".to_string()
}
fn default_station_list() -> Vec<String> {
    vec!["GHCND:USW00013904".to_string()]
}
fn default_max_temp_limit() -> u32 {
    366
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    /// Attempts per request, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each further retry.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Upper bound of the random delay added to each backoff.
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter_ms: default_jitter_ms(),
        }
    }
}

impl RetryConfig {
    /// Retry without sleeping. Used by tests and dry local runs.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay_ms: 0,
            max_delay_ms: 0,
            jitter_ms: 0,
        }
    }
}

fn default_max_attempts() -> u32 {
    10
}
fn default_base_delay_ms() -> u64 {
    500
}
fn default_max_delay_ms() -> u64 {
    30_000
}
fn default_jitter_ms() -> u64 {
    250
}

impl Config {
    /// Epoch start parsed as a timestamp.
    pub fn epoch_start(&self) -> Result<NaiveDateTime> {
        crate::models::Cursor::parse(&self.daily.epoch_start)
            .map(|c| c.datetime())
            .with_context(|| format!("daily.epoch_start '{}'", self.daily.epoch_start))
    }

    fn validate(&self) -> Result<()> {
        check_page_size("daily.page_size", self.daily.page_size)?;
        check_page_size("stations.page_size", self.stations.page_size)?;

        if self.daily.datatypes.is_empty() {
            anyhow::bail!("daily.datatypes must not be empty");
        }
        if !(1..=MAX_PUBLISH_LAG_DAYS).contains(&self.daily.publish_lag_days) {
            anyhow::bail!(
                "daily.publish_lag_days must be in 1..={}, got {}",
                MAX_PUBLISH_LAG_DAYS,
                self.daily.publish_lag_days
            );
        }
        if !(1..=MAX_BACKFILL_SPAN_DAYS).contains(&self.daily.backfill.span_days) {
            anyhow::bail!(
                "daily.backfill.span_days must be in 1..={}, got {}",
                MAX_BACKFILL_SPAN_DAYS,
                self.daily.backfill.span_days
            );
        }
        if let IdentityConfig::Derived { fields, .. } = &self.daily.identity {
            if fields.is_empty() {
                anyhow::bail!("daily.identity.fields must name at least one field");
            }
        }
        self.epoch_start()?;

        if self.max_temp.stations.is_empty() {
            anyhow::bail!("max_temp.stations must not be empty");
        }
        check_page_size("max_temp.limit", self.max_temp.limit)?;

        if self.retry.max_attempts == 0 {
            anyhow::bail!("retry.max_attempts must be >= 1");
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            anyhow::bail!("retry.base_delay_ms must not exceed retry.max_delay_ms");
        }
        Ok(())
    }
}

fn check_page_size(key: &str, value: u32) -> Result<()> {
    if value == 0 || value > MAX_PAGE_SIZE {
        anyhow::bail!("{} must be in 1..={}, got {}", key, MAX_PAGE_SIZE, value);
    }
    Ok(())
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

/// API credential injected into an invocation.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Read the credential from `env_var`. Only the binary calls this; the
    /// library receives the value already resolved.
    pub fn from_env(env_var: &str) -> Result<Self, SyncError> {
        match std::env::var(env_var) {
            Ok(token) if !token.trim().is_empty() => Ok(Self(token)),
            _ => Err(SyncError::MissingCredential {
                env_var: env_var.to_string(),
            }),
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}
