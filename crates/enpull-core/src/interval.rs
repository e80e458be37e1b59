//! Interval planning: which calendar days a run pulls.
//!
//! The export service is always queried one day at a time. Today is never
//! planned because its export is presumed incomplete.

use chrono::{Days, Local, NaiveDate};
use thiserror::Error;

/// External day format used on the command line and in export requests.
pub const DAY_FORMAT: &str = "%m%d%Y";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("no previously ingested date found; pass an explicit start date")]
    NoStartingPoint,
    #[error("invalid date {input:?}, expected MMDDYYYY")]
    BadDate { input: String },
}

/// Parse a `MMDDYYYY` day.
pub fn parse_day(input: &str) -> Result<NaiveDate, PlanError> {
    NaiveDate::parse_from_str(input.trim(), DAY_FORMAT).map_err(|_| PlanError::BadDate {
        input: input.to_string(),
    })
}

/// Render a day in `MMDDYYYY`.
pub fn format_day(day: NaiveDate) -> String {
    day.format(DAY_FORMAT).to_string()
}

/// Inclusive, ascending run of calendar days. Empty when `end < start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn len(&self) -> usize {
        if self.end < self.start {
            0
        } else {
            (self.end - self.start).num_days() as usize + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        self.start.iter_days().take(self.len())
    }

    /// Days rendered in the external `MMDDYYYY` format.
    pub fn formatted(&self) -> Vec<String> {
        self.days().map(format_day).collect()
    }
}

/// Computes the run's [`DateRange`] relative to a fixed "today".
#[derive(Debug, Clone, Copy)]
pub struct IntervalPlanner {
    today: NaiveDate,
}

impl IntervalPlanner {
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }

    /// Planner anchored on the local calendar date.
    pub fn for_today() -> Self {
        Self::new(Local::now().date_naive())
    }

    /// Last day that may be pulled: yesterday.
    pub fn latest_complete_day(&self) -> NaiveDate {
        self.today - Days::new(1)
    }

    /// Plan the days to pull.
    ///
    /// Without an explicit `start` the run resumes the day after
    /// `last_ingested`, clamped so it never starts after yesterday. Without an
    /// explicit `end` it runs through yesterday.
    pub fn plan(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        last_ingested: Option<NaiveDate>,
    ) -> Result<DateRange, PlanError> {
        let yesterday = self.latest_complete_day();
        let start = match start {
            Some(day) => day,
            None => {
                let last = last_ingested.ok_or(PlanError::NoStartingPoint)?;
                last.checked_add_days(Days::new(1))
                    .unwrap_or(yesterday)
                    .min(yesterday)
            }
        };
        let end = end.unwrap_or(yesterday);
        Ok(DateRange::new(start, end))
    }
}
