//! Analytics backfill types: granularities, windows, watermarks, records

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{DAY_VISITORS_KEY, MONTH_VISITORS_KEY};
use crate::impl_label_conversions;

/// Length of one collection period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    Month,
}

impl_label_conversions!(Granularity {
    Day => "day",
    Month => "month",
});

impl Granularity {
    pub const ALL: [Self; 2] = [Self::Day, Self::Month];

    /// Start of the period containing `date`.
    pub fn period_start_of(self, date: NaiveDate) -> NaiveDate {
        match self {
            Self::Day => date,
            Self::Month => date.with_day(1).unwrap_or(date),
        }
    }

    /// Start of the period following the one that starts at `period_start`.
    pub fn next_period(self, period_start: NaiveDate) -> Option<NaiveDate> {
        match self {
            Self::Day => period_start.checked_add_days(Days::new(1)),
            Self::Month => self.period_start_of(period_start).checked_add_months(Months::new(1)),
        }
    }

    /// Key the engagement fetch correlates against.
    pub const fn visitors_key(self) -> &'static str {
        match self {
            Self::Day => DAY_VISITORS_KEY,
            Self::Month => MONTH_VISITORS_KEY,
        }
    }
}

/// Half-open period `[period_start, period_end)` eligible for collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncWindow {
    pub granularity: Granularity,
    pub period_start: NaiveDate,
}

impl SyncWindow {
    pub fn new(granularity: Granularity, period_start: NaiveDate) -> Self {
        Self { granularity, period_start: granularity.period_start_of(period_start) }
    }

    /// Exclusive end of the period.
    pub fn period_end(&self) -> NaiveDate {
        self.granularity.next_period(self.period_start).unwrap_or(NaiveDate::MAX)
    }

    /// True once the wall clock has fully passed the period.
    pub fn has_elapsed(&self, today: NaiveDate) -> bool {
        self.period_end() <= today
    }
}

/// Persisted "last synced" marker for a subject/granularity pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watermark {
    pub subject_key: String,
    pub granularity: Granularity,
    pub last_completed_date: NaiveDate,
    pub updated_at: DateTime<Utc>,
}

/// One fetched data point for a window.
///
/// Unique per `(period, date, name)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub period: Granularity,
    pub date: NaiveDate,
    pub name: String,
    pub value: i64,
}

impl MetricRecord {
    pub fn new(period: Granularity, date: NaiveDate, name: impl Into<String>, value: i64) -> Self {
        Self { period, date, name: name.into(), value }
    }
}

/// Outcome of one collection run for a single granularity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub granularity: Granularity,
    pub windows_processed: usize,
    pub records_inserted: usize,
    pub records_skipped: usize,
    pub watermark: Option<NaiveDate>,
}

impl RunReport {
    pub fn empty(granularity: Granularity, watermark: Option<NaiveDate>) -> Self {
        Self {
            granularity,
            windows_processed: 0,
            records_inserted: 0,
            records_skipped: 0,
            watermark,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn month_window_normalizes_to_first_day() {
        let window = SyncWindow::new(Granularity::Month, date(2025, 10, 17));
        assert_eq!(window.period_start, date(2025, 10, 1));
        assert_eq!(window.period_end(), date(2025, 11, 1));
    }

    #[test]
    fn day_window_elapses_at_midnight() {
        let window = SyncWindow::new(Granularity::Day, date(2025, 10, 31));
        assert!(!window.has_elapsed(date(2025, 10, 31)));
        assert!(window.has_elapsed(date(2025, 11, 1)));
    }

    #[test]
    fn next_month_crosses_year() {
        assert_eq!(Granularity::Month.next_period(date(2025, 12, 1)), Some(date(2026, 1, 1)));
        assert_eq!(Granularity::Day.next_period(date(2024, 2, 28)), Some(date(2024, 2, 29)));
    }

    #[test]
    fn labels_round_trip_through_text() {
        assert_eq!(Granularity::Month.to_string(), "month");
        assert_eq!("Day".parse::<Granularity>(), Ok(Granularity::Day));
        assert_eq!(serde_json::to_string(&Granularity::Day).unwrap(), "\"day\"");
    }
}
