use std::fmt;

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// A calendar month. Internally anchored on its first day so every
/// constructed value is a real month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Period {
    start: NaiveDate,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|start| Self { start })
    }

    pub fn containing(date: NaiveDate) -> Self {
        Self {
            start: date.with_day(1).unwrap_or(date),
        }
    }

    pub fn year(&self) -> i32 {
        self.start.year()
    }

    pub fn month(&self) -> u32 {
        self.start.month()
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// First day of the following month.
    pub fn end_exclusive(&self) -> NaiveDate {
        self.start
            .checked_add_months(Months::new(1))
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn succ(&self) -> Self {
        Self {
            start: self.end_exclusive(),
        }
    }

    pub fn offset(&self, months: i32) -> Option<Self> {
        let shifted = if months >= 0 {
            self.start.checked_add_months(Months::new(months.unsigned_abs()))
        } else {
            self.start.checked_sub_months(Months::new(months.unsigned_abs()))
        };
        shifted.map(|start| Self { start })
    }

    /// Signed number of months from `other` to `self`.
    pub fn months_since(&self, other: Period) -> i32 {
        (self.year() - other.year()) * 12 + self.month() as i32 - other.month() as i32
    }

    pub fn days_in_month(&self) -> u32 {
        (self.end_exclusive() - self.start).num_days() as u32
    }

    pub fn day(&self, day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year(), self.month(), day)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end_exclusive()
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.start.format("%B %Y"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_month() {
        assert!(Period::new(2025, 0).is_none());
        assert!(Period::new(2025, 13).is_none());
    }

    #[test]
    fn month_lengths() {
        assert_eq!(Period::new(2024, 2).unwrap().days_in_month(), 29);
        assert_eq!(Period::new(2025, 2).unwrap().days_in_month(), 28);
        assert_eq!(Period::new(2025, 9).unwrap().days_in_month(), 30);
        assert_eq!(Period::new(2025, 12).unwrap().days_in_month(), 31);
    }

    #[test]
    fn stepping_across_year_boundary() {
        let dec = Period::new(2025, 12).unwrap();
        assert_eq!(dec.succ(), Period::new(2026, 1).unwrap());
        assert_eq!(dec.offset(-12), Period::new(2024, 12));
        assert_eq!(Period::new(2026, 2).unwrap().months_since(dec), 2);
        assert_eq!(dec.months_since(Period::new(2026, 2).unwrap()), -2);
    }

    #[test]
    fn containment_and_days() {
        let sep = Period::new(2025, 9).unwrap();
        let d = NaiveDate::from_ymd_opt(2025, 9, 30).unwrap();
        assert!(sep.contains(d));
        assert!(!sep.contains(NaiveDate::from_ymd_opt(2025, 10, 1).unwrap()));
        assert_eq!(Period::containing(d), sep);
        assert_eq!(sep.day(31), None);
        assert_eq!(sep.to_string(), "September 2025");
    }
}
