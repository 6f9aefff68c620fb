//! Recurrence frequency and date stepping
//!
//! Month-based steps clamp to the last valid day of the target month and are
//! always taken from the anchor day-of-month, so a rule anchored on the 31st
//! goes Jan 31, Feb 29, Mar 31, Apr 30 instead of drifting.

use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How often a recurring rule fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Biannual,
    Annual,
}

impl Frequency {
    pub const ALL: [Frequency; 6] = [
        Self::Daily,
        Self::Weekly,
        Self::Monthly,
        Self::Quarterly,
        Self::Biannual,
        Self::Annual,
    ];

    /// Calendar months per step, or `None` for day-based frequencies
    pub fn months(&self) -> Option<u32> {
        match self {
            Self::Daily | Self::Weekly => None,
            Self::Monthly => Some(1),
            Self::Quarterly => Some(3),
            Self::Biannual => Some(6),
            Self::Annual => Some(12),
        }
    }

    /// Step `current` forward by one period
    ///
    /// `anchor_day` is the day-of-month of the rule's start date. Returns
    /// `None` only if the result leaves chrono's representable range.
    pub fn advance(&self, current: NaiveDate, anchor_day: u32) -> Option<NaiveDate> {
        match self {
            Self::Daily => current.checked_add_signed(Duration::days(1)),
            Self::Weekly => current.checked_add_signed(Duration::days(7)),
            _ => {
                let months = self.months()?;
                let first = current.with_day(1)?.checked_add_months(Months::new(months))?;
                let day = anchor_day.min(days_in_month(first.year(), first.month()));
                first.with_day(day)
            }
        }
    }

    /// Every occurrence of a series anchored at `start` within `[from, to]`
    pub fn occurrences(
        &self,
        start: NaiveDate,
        end: Option<NaiveDate>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Vec<NaiveDate> {
        let anchor_day = start.day();
        let last = match end {
            Some(end) if end < to => end,
            _ => to,
        };
        let mut dates = Vec::new();
        let mut cursor = Some(start);
        while let Some(date) = cursor {
            if date > last {
                break;
            }
            if date >= from {
                dates.push(date);
            }
            cursor = self.advance(date, anchor_day);
        }
        dates
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::Biannual => "biannual",
            Self::Annual => "annual",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "quarterly" => Ok(Self::Quarterly),
            "biannual" | "biannually" => Ok(Self::Biannual),
            "annual" | "annually" | "yearly" => Ok(Self::Annual),
            other => Err(format!(
                "unknown frequency '{}' (expected daily, weekly, monthly, quarterly, biannual or annual)",
                other
            )),
        }
    }
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(28)
}
