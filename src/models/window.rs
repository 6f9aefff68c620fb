//! Inclusive date windows for ledger queries

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An inclusive date range; an open side is unbounded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateWindow {
    /// The whole ledger history
    pub fn all_time() -> Self {
        Self::default()
    }

    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// Everything strictly before `date`
    pub fn before(date: NaiveDate) -> Self {
        Self {
            start: None,
            end: date.pred_opt(),
        }
    }

    /// Everything up to and including `date`
    pub fn through(date: NaiveDate) -> Self {
        Self {
            start: None,
            end: Some(date),
        }
    }

    /// The calendar month containing `date`
    pub fn month_of(date: NaiveDate) -> Self {
        let start = first_of_month(date);
        let end = next_month_start(date).and_then(|d| d.pred_opt());
        Self {
            start: Some(start),
            end,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.start, self.end) {
            (None, None) => write!(f, "all time"),
            (Some(s), None) => write!(f, "from {}", s),
            (None, Some(e)) => write!(f, "through {}", e),
            (Some(s), Some(e)) => write!(f, "{} to {}", s, e),
        }
    }
}

/// First day of the month containing `date`
pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn next_month_start(date: NaiveDate) -> Option<NaiveDate> {
    if date.month() == 12 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_before_excludes_boundary() {
        let window = DateWindow::before(date(2024, 3, 1));
        assert!(window.contains(date(2024, 2, 29)));
        assert!(!window.contains(date(2024, 3, 1)));
    }

    #[test]
    fn test_month_of() {
        let window = DateWindow::month_of(date(2024, 12, 17));
        assert_eq!(window.start, Some(date(2024, 12, 1)));
        assert_eq!(window.end, Some(date(2024, 12, 31)));
    }

    #[test]
    fn test_all_time_contains_everything() {
        assert!(DateWindow::all_time().contains(date(1970, 1, 1)));
    }
}
