//! Incremental date-range resolution.
//!
//! Given the latest date already present in the store and the earliest date
//! the caller cares about, computes the minimal range that must be fetched
//! to bring the store up to date. Same-day counts are considered unstable,
//! so the range never includes today.

use chrono::{Duration, NaiveDate};

/// Extra days fetched before the requested window on a first load.
///
/// Compensates for subjects that enter the chart only after the window
/// start and would otherwise have no mention history.
pub const FIRST_LOAD_LOOKBACK_DAYS: i64 = 7;

/// An inclusive range of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Number of days in the range.
    pub fn num_days(&self) -> u32 {
        (self.end - self.start).num_days() as u32 + 1
    }

    /// Iterate the days of the range in order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take(self.num_days() as usize)
    }
}

/// Compute the range of dates that must be (re-)fetched.
///
/// - No prior state: `[requested_earliest − 7 days, today − 1 day]`.
/// - Prior state: `[existing_latest + 1 day, today − 1 day]`.
/// - Start past end: `None` — nothing to do, a normal silent outcome.
pub fn resolve(
    existing_latest: Option<NaiveDate>,
    requested_earliest: NaiveDate,
    today: NaiveDate,
) -> Option<DateRange> {
    let start = match existing_latest {
        Some(latest) => latest + Duration::days(1),
        None => requested_earliest - Duration::days(FIRST_LOAD_LOOKBACK_DAYS),
    };
    let end = today - Duration::days(1);

    if start > end {
        return None;
    }
    Some(DateRange { start, end })
}
