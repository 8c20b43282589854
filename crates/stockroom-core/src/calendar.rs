//! ISO-8601 week arithmetic.
//!
//! Weeks run Monday through Sunday and week 1 is the week containing the
//! year's first Thursday. The Monday of a week is the canonical weekly bucket
//! key: forecasts are stored against it and event aggregates are joined on it.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};

/// An ISO-8601 (year, week) pair.
///
/// The ISO year can differ from the calendar year near January 1st, e.g.
/// 2024-12-30 belongs to week 1 of ISO year 2025.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct IsoWeek {
  pub year: i32,
  pub week: u32,
}

impl IsoWeek {
  pub fn of_date(date: NaiveDate) -> Self {
    let w = date.iso_week();
    Self { year: w.year(), week: w.week() }
  }

  pub fn of_datetime(ts: NaiveDateTime) -> Self { Self::of_date(ts.date()) }

  /// The Monday that opens this week.
  ///
  /// Returns `None` only for a week number that does not exist in the year
  /// (e.g. week 53 of a 52-week year).
  pub fn monday(self) -> Option<NaiveDate> {
    NaiveDate::from_isoywd_opt(self.year, self.week, Weekday::Mon)
  }
}

/// The Monday of the ISO week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
  let offset = date.weekday().num_days_from_monday();
  date - chrono::Days::new(u64::from(offset))
}

/// `true` if `date` opens an ISO week.
pub fn is_week_start(date: NaiveDate) -> bool { date.weekday() == Weekday::Mon }
