//! Window planning
//!
//! A period is only claimed once the wall clock has fully passed it, so the
//! planner never hands out today (day granularity) or the current month.

use chrono::NaiveDate;
use communaute_domain::constants::epoch_start;
use communaute_domain::{Granularity, SyncWindow};

/// Computes the windows still to collect after a watermark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPlanner {
    epoch: NaiveDate,
}

impl Default for WindowPlanner {
    fn default() -> Self {
        Self::new(epoch_start())
    }
}

impl WindowPlanner {
    /// `epoch` is the first period collected when no watermark exists.
    pub fn new(epoch: NaiveDate) -> Self {
        Self { epoch }
    }

    /// First period collected when no watermark exists.
    pub fn epoch(&self) -> NaiveDate {
        self.epoch
    }

    /// Windows strictly after `watermark` whose period has elapsed by
    /// `today`, oldest first.
    ///
    /// Pure function of its inputs, so recomputing after a failed run is
    /// safe.
    pub fn plan(
        &self,
        granularity: Granularity,
        watermark: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Vec<SyncWindow> {
        let first = match watermark {
            Some(last) => granularity.next_period(granularity.period_start_of(last)),
            None => Some(granularity.period_start_of(self.epoch)),
        };

        let mut windows = Vec::new();
        let mut cursor = first;
        while let Some(start) = cursor {
            let window = SyncWindow::new(granularity, start);
            if !window.has_elapsed(today) {
                break;
            }
            windows.push(window);
            cursor = granularity.next_period(start);
        }
        windows
    }
}
