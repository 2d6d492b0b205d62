//! Shared types for the TRENDMAIL run.
//!
//! A run turns trending keywords into `TrendRecord`s, which flow from the
//! fetcher into the report writer and the mail composer unchanged.

use chrono::{DateTime, FixedOffset, Offset, Utc};
use std::fmt;

// ---------------------------------------------------------------------------
// Trend record
// ---------------------------------------------------------------------------

/// Where a trending keyword came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendOrigin {
    Google,
    Rakuten,
}

impl fmt::Display for TrendOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendOrigin::Google => write!(f, "google"),
            TrendOrigin::Rakuten => write!(f, "rakuten"),
        }
    }
}

/// One report row: a trending keyword and its affiliate links.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendRecord {
    /// Run start, `%Y-%m-%d %H:%M:%S%z` in local time.
    pub timestamp: String,
    /// Run date, `%Y-%m-%d`.
    pub date: String,
    /// 1-based position in the fetched trend list.
    pub rank: u32,
    pub keyword: String,
    pub source: TrendOrigin,
    /// Marketplace item code of the first search hit, empty if none.
    pub item_code: String,
    /// Affiliate URL of the first hit (or its plain item URL), empty if none.
    pub rakuten_url: String,
    pub amazon_url: String,
}

impl TrendRecord {
    /// The link a reader should click first: Rakuten, then Amazon.
    pub fn primary_url(&self) -> Option<&str> {
        [self.rakuten_url.as_str(), self.amazon_url.as_str()]
            .into_iter()
            .find(|u| !u.is_empty())
    }

    /// Helper to build a test record with sensible defaults.
    #[cfg(test)]
    pub fn sample(keyword: &str) -> Self {
        TrendRecord {
            timestamp: "2026-10-18 09:00:00+0900".to_string(),
            date: "2026-10-18".to_string(),
            rank: 1,
            keyword: keyword.to_string(),
            source: TrendOrigin::Google,
            item_code: "shop:10000001".to_string(),
            rakuten_url: "https://hb.afl.rakuten.co.jp/hgc/abc/".to_string(),
            amazon_url: format!("https://www.amazon.co.jp/s?k={keyword}"),
        }
    }
}

impl fmt::Display for TrendRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} [{}] (rakuten: {})",
            self.rank,
            self.keyword,
            self.source,
            if self.rakuten_url.is_empty() { "-" } else { "yes" },
        )
    }
}

// ---------------------------------------------------------------------------
// Run clock
// ---------------------------------------------------------------------------

/// The instant a run started, fixed in the configured local offset.
#[derive(Debug, Clone, Copy)]
pub struct RunClock {
    pub started: DateTime<FixedOffset>,
}

impl RunClock {
    /// Now, in `utc_offset_hours` (clamped to a valid offset, else UTC).
    pub fn now(utc_offset_hours: i32) -> Self {
        let offset = FixedOffset::east_opt(utc_offset_hours.clamp(-23, 23) * 3600)
            .unwrap_or_else(|| Utc.fix());
        Self {
            started: Utc::now().with_timezone(&offset),
        }
    }

    pub fn at(started: DateTime<FixedOffset>) -> Self {
        Self { started }
    }

    pub fn timestamp(&self) -> String {
        self.started.format("%Y-%m-%d %H:%M:%S%z").to_string()
    }

    pub fn date(&self) -> String {
        self.started.format("%Y-%m-%d").to_string()
    }

    pub fn time(&self) -> String {
        self.started.format("%H:%M").to_string()
    }

    /// Human-readable stamp used in mail bodies, e.g. `2026-10-18 09:00 JST`.
    pub fn display_stamp(&self) -> String {
        let zone = if self.started.offset().local_minus_utc() == 9 * 3600 {
            "JST".to_string()
        } else {
            self.started.format("UTC%:z").to_string()
        };
        format!("{} {zone}", self.started.format("%Y-%m-%d %H:%M"))
    }
}

// ---------------------------------------------------------------------------
// Run outcome
// ---------------------------------------------------------------------------

/// How a run ended (errors are reported separately via `anyhow`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Neither trend source produced anything; an empty report was kept.
    NoTrends { emailed: bool },
    /// Rows were appended (possibly zero after filtering).
    Completed { rows: usize, emailed: bool },
}

impl RunOutcome {
    /// Process exit code for the scheduler.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::NoTrends { .. } => 1,
            RunOutcome::Completed { .. } => 0,
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::NoTrends { emailed } => {
                write!(f, "no trends (emailed: {emailed})")
            }
            RunOutcome::Completed { rows, emailed } => {
                write!(f, "{rows} rows appended (emailed: {emailed})")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn jst_clock() -> RunClock {
        let jst = FixedOffset::east_opt(9 * 3600).unwrap();
        RunClock::at(jst.with_ymd_and_hms(2026, 10, 18, 7, 5, 9).unwrap())
    }

    #[test]
    fn test_clock_formats() {
        let clock = jst_clock();
        assert_eq!(clock.timestamp(), "2026-10-18 07:05:09+0900");
        assert_eq!(clock.date(), "2026-10-18");
        assert_eq!(clock.time(), "07:05");
        assert_eq!(clock.display_stamp(), "2026-10-18 07:05 JST");
    }

    #[test]
    fn test_clock_non_jst_stamp() {
        let utc = FixedOffset::east_opt(0).unwrap();
        let clock = RunClock::at(utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap());
        assert_eq!(clock.display_stamp(), "2026-01-02 03:04 UTC+00:00");
    }

    #[test]
    fn test_clock_now_uses_offset() {
        let clock = RunClock::now(9);
        assert_eq!(clock.started.offset().local_minus_utc(), 9 * 3600);
    }

    #[test]
    fn test_primary_url_prefers_rakuten() {
        let mut r = TrendRecord::sample("Switch2");
        assert!(r.primary_url().unwrap().contains("rakuten"));
        r.rakuten_url.clear();
        assert!(r.primary_url().unwrap().contains("amazon"));
        r.amazon_url.clear();
        assert!(r.primary_url().is_none());
    }

    #[test]
    fn test_origin_display() {
        assert_eq!(TrendOrigin::Google.to_string(), "google");
        assert_eq!(TrendOrigin::Rakuten.to_string(), "rakuten");
    }

    #[test]
    fn test_outcome_exit_codes() {
        assert_eq!(RunOutcome::NoTrends { emailed: true }.exit_code(), 1);
        assert_eq!(RunOutcome::Completed { rows: 0, emailed: false }.exit_code(), 0);
    }
}
