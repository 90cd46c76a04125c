//! Core data models used throughout the connector.
//!
//! These types describe what flows across an invocation: the persisted
//! state handed in by the runtime, the fetch window, the records pulled from
//! the source, and the output contract returned to the runtime.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SyncError};

/// Format of every cursor and window bound sent to or returned from the source.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A single source datum: field name to JSON value.
pub type Record = serde_json::Map<String, Value>;

/// A point in time up to which data has been retrieved.
///
/// Persisted as an ISO-8601 string without timezone, e.g. `2024-10-28T00:00:00`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cursor(NaiveDateTime);

impl Cursor {
    pub fn new(at: NaiveDateTime) -> Self {
        Self(at)
    }

    /// Midnight at the start of `date`.
    pub fn at_date(date: NaiveDate) -> Self {
        Self(date.and_time(chrono::NaiveTime::MIN))
    }

    /// Parse a persisted cursor. Accepts a full timestamp (optionally with
    /// fractional seconds) or a bare date.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if let Ok(at) = raw.parse::<NaiveDateTime>() {
            return Ok(Self(at));
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(Self::at_date)
            .map_err(|_| SyncError::InvalidCursor(raw.to_string()))
    }

    pub fn datetime(&self) -> NaiveDateTime {
        self.0
    }

    pub fn date(&self) -> NaiveDate {
        self.0.date()
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(TIMESTAMP_FORMAT))
    }
}

/// Half-open time range `[start, end)` queried from the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl Window {
    /// Build a window; `None` unless `end > start`.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Option<Self> {
        (end > start).then_some(Self { start, end })
    }

    /// The one-day window starting at `start`; `None` at the end of the
    /// representable calendar.
    pub fn day(start: NaiveDateTime) -> Option<Self> {
        start
            .checked_add_signed(chrono::Duration::days(1))
            .and_then(|end| Self::new(start, end))
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {})",
            self.start.format(TIMESTAMP_FORMAT),
            self.end.format(TIMESTAMP_FORMAT)
        )
    }
}

/// Records accumulated across every page of one query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchResult {
    pub records: Vec<Record>,
    /// Result count the source declared in its metadata.
    pub total_count: u64,
    /// Records actually received.
    pub retrieved_count: u64,
}

/// State persisted by the runtime between invocations.
///
/// Each connector reads the fields it understands and rewrites only those.
/// All fields absent serializes to `{}`, the empty sentinel used by
/// connectors with no temporal cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    #[serde(
        default,
        alias = "last_day_retrieved",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_retrieved_cursor: Option<String>,
    #[serde(default, alias = "stations", skip_serializing_if = "Option::is_none")]
    pub station_list: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(
        default,
        alias = "last_sync_run",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_sync_run: Option<String>,
    /// Keys no connector reads, carried through unchanged.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// The event the runtime passes to one invocation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvocationInput {
    #[serde(default)]
    pub state: SyncState,
}

/// Primary-key declaration for one destination table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub primary_key: Vec<String>,
}

/// What one successful invocation hands back to the runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationOutput {
    pub state: SyncState,
    pub insert: BTreeMap<String, Vec<Record>>,
    pub schema: BTreeMap<String, TableSchema>,
    pub has_more: bool,
}

impl InvocationOutput {
    /// Output for a connector writing a single table.
    pub fn single_table(
        table: &str,
        records: Vec<Record>,
        primary_key: Vec<String>,
        state: SyncState,
        has_more: bool,
    ) -> Self {
        let mut insert = BTreeMap::new();
        insert.insert(table.to_string(), records);
        let mut schema = BTreeMap::new();
        schema.insert(table.to_string(), TableSchema { primary_key });
        Self {
            state,
            insert,
            schema,
            has_more,
        }
    }

    /// Records emitted for `table`, empty if the table is absent.
    pub fn rows(&self, table: &str) -> &[Record] {
        self.insert.get(table).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_parse_timestamp() {
        let cursor = Cursor::parse("2024-10-28T00:00:00").unwrap();
        assert_eq!(cursor.to_string(), "2024-10-28T00:00:00");
    }

    #[test]
    fn test_cursor_parse_bare_date() {
        let cursor = Cursor::parse("2024-10-28").unwrap();
        assert_eq!(cursor.to_string(), "2024-10-28T00:00:00");
    }

    #[test]
    fn test_cursor_parse_fractional_seconds() {
        let cursor = Cursor::parse("2024-10-28T13:45:10.123456").unwrap();
        assert_eq!(cursor.date(), NaiveDate::from_ymd_opt(2024, 10, 28).unwrap());
    }

    #[test]
    fn test_cursor_parse_garbage() {
        let err = Cursor::parse("yesterday").unwrap_err();
        assert!(matches!(err, SyncError::InvalidCursor(_)));
    }

    #[test]
    fn test_window_requires_end_after_start() {
        let at = Cursor::parse("2024-10-28").unwrap().datetime();
        assert!(Window::new(at, at).is_none());
        assert!(Window::new(at, at + chrono::Duration::hours(1)).is_some());
    }

    #[test]
    fn test_state_accepts_legacy_keys() {
        let state: SyncState = serde_json::from_str(
            r#"{"last_day_retrieved": "2024-10-28T00:00:00", "stations": ["GHCND:X"]}"#,
        )
        .unwrap();
        assert_eq!(
            state.last_retrieved_cursor.as_deref(),
            Some("2024-10-28T00:00:00")
        );
        assert_eq!(state.station_list, Some(vec!["GHCND:X".to_string()]));
    }

    #[test]
    fn test_state_keeps_unknown_keys() {
        let raw = serde_json::json!({
            "lastRetrievedCursor": "2024-10-28T00:00:00",
            "syncedBy": "scheduler-7",
            "attempts": {"2024-10-27": 2}
        });
        let state: SyncState = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(state.extra["syncedBy"], "scheduler-7");
        assert_eq!(serde_json::to_value(&state).unwrap(), raw);
    }

    #[test]
    fn test_empty_state_serializes_as_empty_object() {
        let json = serde_json::to_string(&SyncState::default()).unwrap();
        assert_eq!(json, "{}");
    }

    #[test]
    fn test_output_shape() {
        let out = InvocationOutput::single_table(
            "noaa_data",
            vec![],
            vec!["id".to_string()],
            SyncState {
                last_retrieved_cursor: Some("2024-10-29T00:00:00".to_string()),
                ..Default::default()
            },
            true,
        );
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["state"]["lastRetrievedCursor"], "2024-10-29T00:00:00");
        assert_eq!(json["schema"]["noaa_data"]["primary_key"][0], "id");
        assert_eq!(json["hasMore"], true);
        assert!(json["insert"]["noaa_data"].as_array().unwrap().is_empty());
    }
}
