//! Window advancer.
//!
//! Turns the persisted cursor into the next one-day fetch window, and turns
//! a drained window back into the cursor for the next invocation.
//!
//! Rules:
//! - No cursor means the configured epoch start.
//! - A window starting today (or later) would query data the source has
//!   not published yet; it is replaced by the day ending `publish_lag_days`
//!   ago. The returned cursor never moves behind the incoming one, so that
//!   substitute day is a re-fetch, not a rewind.
//! - In backfill mode, a window whose retrieved count reaches the page size
//!   sends the cursor back by `span_days` from the window start instead of
//!   forward. This is the only path on which the cursor decreases.
//! - `has_more` compares dates only: the cursor having reached yesterday
//!   means the source is caught up.

use chrono::{Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};
use tracing::info;

use crate::config::DailyConfig;
use crate::error::{Result, SyncError};
use crate::models::{Cursor, FetchResult, Window, TIMESTAMP_FORMAT};

/// Source of "today", injectable so window math is testable.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// The host's local calendar date.
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// A clock pinned to one date.
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct WindowAdvancer {
    epoch_start: Cursor,
    publish_lag_days: i64,
    page_size: u32,
    /// Backward jump in days, when backfill mode is on.
    backfill_span_days: Option<i64>,
}

impl WindowAdvancer {
    pub fn new(epoch_start: Cursor, publish_lag_days: i64, page_size: u32) -> Self {
        Self {
            epoch_start,
            publish_lag_days,
            page_size,
            backfill_span_days: None,
        }
    }

    pub fn with_backfill(mut self, span_days: i64) -> Self {
        self.backfill_span_days = Some(span_days);
        self
    }

    pub fn from_config(daily: &DailyConfig) -> Result<Self> {
        let epoch = Cursor::parse(&daily.epoch_start)?;
        let advancer = Self::new(epoch, daily.publish_lag_days, daily.page_size);
        Ok(if daily.backfill.enabled {
            advancer.with_backfill(daily.backfill.span_days)
        } else {
            advancer
        })
    }

    /// Cursor to resume from: the persisted one, or the epoch start.
    pub fn resume_from(&self, persisted: Option<&str>) -> Result<Cursor> {
        match persisted {
            Some(raw) if !raw.trim().is_empty() => Cursor::parse(raw),
            _ => Ok(self.epoch_start),
        }
    }

    /// The window to fetch for `cursor`.
    pub fn next_window(&self, cursor: Cursor, today: NaiveDate) -> Result<Window> {
        if cursor.date() >= today {
            let start = days_before(today, self.publish_lag_days.saturating_add(1))?;
            info!(
                cursor = %cursor,
                substitute_start = %start,
                "window starts today, fetching the last published day instead"
            );
            return one_day(start.and_time(NaiveTime::MIN));
        }
        one_day(cursor.datetime())
    }

    /// Whether `result` holds everything the source declared.
    pub fn is_exhausted(&self, result: &FetchResult) -> bool {
        result.retrieved_count >= result.total_count
    }

    /// Cursor to persist after draining `window`.
    pub fn advance(
        &self,
        previous: Cursor,
        window: &Window,
        result: &FetchResult,
    ) -> Result<Cursor> {
        if !self.is_exhausted(result) {
            return Ok(previous);
        }
        if let Some(span) = self.backfill_span_days {
            if result.retrieved_count >= u64::from(self.page_size) {
                let back = Duration::try_days(span)
                    .and_then(|d| window.start().checked_sub_signed(d))
                    .map(Cursor::new)
                    .ok_or_else(|| out_of_range(window.start(), -span))?;
                info!(
                    window = %window,
                    retrieved = result.retrieved_count,
                    next_cursor = %back,
                    "window filled a whole page, jumping back for backfill"
                );
                return Ok(back);
            }
        }
        Ok(previous.max(Cursor::new(window.end())))
    }

    /// Whether the runtime should invoke again right away.
    pub fn has_more(&self, next: Cursor, today: NaiveDate) -> bool {
        today.pred_opt().is_some_and(|yesterday| next.date() < yesterday)
    }
}

fn days_before(date: NaiveDate, days: i64) -> Result<NaiveDate> {
    Duration::try_days(days)
        .and_then(|d| date.checked_sub_signed(d))
        .ok_or_else(|| out_of_range(date.and_time(NaiveTime::MIN), -days))
}

fn one_day(start: NaiveDateTime) -> Result<Window> {
    Window::day(start).ok_or_else(|| out_of_range(start, 1))
}

fn out_of_range(from: NaiveDateTime, days: i64) -> SyncError {
    SyncError::WindowOutOfRange {
        from: from.format(TIMESTAMP_FORMAT).to_string(),
        days,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn cursor(s: &str) -> Cursor {
        Cursor::parse(s).unwrap()
    }

    fn advancer() -> WindowAdvancer {
        WindowAdvancer::new(cursor("2014-01-01T00:00:00"), 2, 1000)
    }

    fn drained(n: u64) -> FetchResult {
        FetchResult {
            records: Vec::new(),
            total_count: n,
            retrieved_count: n,
        }
    }

    #[test]
    fn test_missing_cursor_uses_epoch() {
        let a = advancer();
        assert_eq!(a.resume_from(None).unwrap(), cursor("2014-01-01"));
        assert_eq!(a.resume_from(Some("")).unwrap(), cursor("2014-01-01"));
        assert_eq!(
            a.resume_from(Some("2024-10-28T00:00:00")).unwrap(),
            cursor("2024-10-28")
        );
    }

    #[test]
    fn test_window_is_one_day_from_cursor() {
        let w = advancer()
            .next_window(cursor("2024-10-28"), date("2026-01-01"))
            .unwrap();
        assert_eq!(w.start(), cursor("2024-10-28").datetime());
        assert_eq!(w.end(), cursor("2024-10-29").datetime());
    }

    #[test]
    fn test_today_window_ends_two_days_back() {
        let today = date("2024-11-10");
        let w = advancer()
            .next_window(cursor("2024-11-10T00:00:00"), today)
            .unwrap();
        assert_eq!(w.end(), cursor("2024-11-08").datetime());
        assert_eq!(w.start(), cursor("2024-11-07").datetime());
    }

    #[test]
    fn test_today_window_does_not_rewind_cursor() {
        let a = advancer();
        let today = date("2024-11-10");
        let prev = cursor("2024-11-10");
        let w = a.next_window(prev, today).unwrap();
        let next = a.advance(prev, &w, &drained(5)).unwrap();
        assert_eq!(next, prev);
        assert!(!a.has_more(next, today));
    }

    #[test]
    fn test_advance_moves_to_window_end() {
        let a = advancer();
        let prev = cursor("2024-10-28");
        let w = a.next_window(prev, date("2026-01-01")).unwrap();
        assert_eq!(
            a.advance(prev, &w, &drained(3)).unwrap(),
            cursor("2024-10-29")
        );
        assert_eq!(
            a.advance(prev, &w, &drained(0)).unwrap(),
            cursor("2024-10-29")
        );
    }

    #[test]
    fn test_incomplete_result_keeps_cursor() {
        let a = advancer();
        let prev = cursor("2024-10-28");
        let w = a.next_window(prev, date("2026-01-01")).unwrap();
        let partial = FetchResult {
            records: Vec::new(),
            total_count: 10,
            retrieved_count: 4,
        };
        assert_eq!(a.advance(prev, &w, &partial).unwrap(), prev);
    }

    #[test]
    fn test_full_page_advances_forward_without_backfill() {
        let a = advancer();
        let prev = cursor("2024-10-28");
        let w = a.next_window(prev, date("2026-01-01")).unwrap();
        assert_eq!(
            a.advance(prev, &w, &drained(1000)).unwrap(),
            cursor("2024-10-29")
        );
    }

    #[test]
    fn test_backfill_jumps_back_on_full_page() {
        let a = advancer().with_backfill(3650);
        let prev = cursor("2024-10-28");
        let w = a.next_window(prev, date("2026-01-01")).unwrap();
        let next = a.advance(prev, &w, &drained(1000)).unwrap();
        assert_eq!(
            next.datetime(),
            cursor("2024-10-28").datetime() - Duration::days(3650)
        );
        // Below a full page it still moves forward.
        assert_eq!(
            a.advance(prev, &w, &drained(999)).unwrap(),
            cursor("2024-10-29")
        );
    }

    #[test]
    fn test_windows_never_move_backwards() {
        let a = advancer();
        let today = date("2014-03-01");
        let mut c = a.resume_from(None).unwrap();
        let mut last_start = None;
        let mut invocations = 0;
        while a.has_more(c, today) {
            let w = a.next_window(c, today).unwrap();
            if let Some(prev) = last_start {
                assert!(w.start() > prev);
            }
            last_start = Some(w.start());
            let next = a.advance(c, &w, &drained(7)).unwrap();
            assert!(next >= c);
            c = next;
            invocations += 1;
        }
        // 2014-01-01 up to yesterday, one day per invocation.
        assert_eq!(invocations, 58);
        assert_eq!(c.date(), date("2014-02-28"));
    }

    #[test]
    fn test_has_more_compares_dates_only() {
        let a = advancer();
        let today = date("2024-11-10");
        assert!(!a.has_more(cursor("2024-11-09T00:00:00"), today));
        assert!(!a.has_more(cursor("2024-11-09T17:30:00"), today));
        assert!(a.has_more(cursor("2024-11-08T23:59:59"), today));
        assert!(a.has_more(cursor("2024-10-29"), today));
    }

    #[test]
    fn test_huge_publish_lag_is_an_error() {
        let a = WindowAdvancer::new(cursor("2014-01-01"), 200_000_000, 1000);
        let today = date("2024-11-10");
        let err = a.next_window(cursor("2024-11-10"), today).unwrap_err();
        assert!(matches!(err, SyncError::WindowOutOfRange { .. }));

        let extreme = WindowAdvancer::new(cursor("2014-01-01"), i64::MAX, 1000);
        assert!(extreme.next_window(cursor("2024-11-10"), today).is_err());
    }

    #[test]
    fn test_huge_backfill_span_is_an_error() {
        let a = advancer().with_backfill(200_000_000);
        let prev = cursor("2024-10-28");
        let w = a.next_window(prev, date("2026-01-01")).unwrap();
        let err = a.advance(prev, &w, &drained(1000)).unwrap_err();
        assert!(matches!(err, SyncError::WindowOutOfRange { .. }));
    }
}
