//! Calendar handling for monthly climate data.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Calendar months in order.
pub const MONTHS: [u32; 12] = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12];

/// Fixed month abbreviations, indexed by `month - 1`.
pub const MONTH_LABELS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Three-letter label for a calendar month (1-12).
pub fn month_label(month: u32) -> Option<&'static str> {
    MONTH_LABELS.get((month as usize).checked_sub(1)?).copied()
}

/// Calendar field used to group a time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalendarField {
    Month,
    Year,
}

impl CalendarField {
    /// Extract this field from a date.
    pub fn value_of(&self, date: &NaiveDate) -> i32 {
        match self {
            CalendarField::Month => date.month() as i32,
            CalendarField::Year => date.year(),
        }
    }
}

impl std::fmt::Display for CalendarField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Month => write!(f, "month"),
            Self::Year => write!(f, "year"),
        }
    }
}

/// An inclusive range of calendar years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub start: i32,
    pub end: i32,
}

impl YearRange {
    pub fn new(start: i32, end: i32) -> Self {
        Self { start, end }
    }

    /// Every year in the range, ascending. Empty if `start > end`.
    pub fn years(&self) -> impl Iterator<Item = i32> {
        self.start..=self.end
    }

    pub fn len(&self) -> usize {
        if self.start > self.end {
            0
        } else {
            (self.end - self.start + 1) as usize
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, year: i32) -> bool {
        year >= self.start && year <= self.end
    }

    /// Date range covering January 1st of `start` through December 31st of `end`.
    pub fn date_range(&self) -> Option<DateRange> {
        Some(DateRange::new(
            NaiveDate::from_ymd_opt(self.start, 1, 1)?,
            NaiveDate::from_ymd_opt(self.end, 12, 31)?,
        ))
    }
}

impl std::fmt::Display for YearRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// An inclusive date range for dataset queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: &NaiveDate) -> bool {
        date >= &self.start && date <= &self.end
    }

    /// Years touched by this range.
    pub fn year_range(&self) -> YearRange {
        YearRange::new(self.start.year(), self.end.year())
    }
}
