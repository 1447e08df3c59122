//! Calendar month a budget applies to.

use std::fmt;

use chrono::{Datelike, Days, Months, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine};

/// A calendar month (`year`, `month` in `1..=12`).
///
/// Expenses belong to the period of their local `expense_date`; budgets are
/// keyed by period.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    /// Build a period, validating the month and keeping the year in a range
    /// every month boundary can be represented in.
    pub fn new(year: i32, month: u32) -> ResultEngine<Self> {
        if !(1..=12).contains(&month) {
            return Err(EngineError::InvalidPeriod(format!(
                "month must be between 1 and 12, got {month}"
            )));
        }
        if !(1..=9999).contains(&year) {
            return Err(EngineError::InvalidPeriod(format!(
                "year out of range: {year}"
            )));
        }
        Ok(Self { year, month })
    }

    /// Build a period from a possibly out-of-range month, carrying the
    /// overflow into the year (`month = 13` is January of the next year,
    /// `month = 0` is December of the previous one).
    pub fn normalized(year: i32, month: i32) -> ResultEngine<Self> {
        let out_of_range =
            || EngineError::InvalidPeriod(format!("period out of range: {month}/{year}"));
        let zero_based = month.checked_sub(1).ok_or_else(out_of_range)?;
        let year = year
            .checked_add(zero_based.div_euclid(12))
            .ok_or_else(out_of_range)?;
        let month = zero_based.rem_euclid(12) as u32 + 1;
        Self::new(year, month)
    }

    /// The period a date falls in.
    #[must_use]
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    #[must_use]
    pub const fn year(self) -> i32 {
        self.year
    }

    #[must_use]
    pub const fn month(self) -> u32 {
        self.month
    }

    /// First day of the month.
    #[must_use]
    pub fn first_day(self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or_default()
    }

    /// Inclusive lower bound of the period (first day, midnight).
    #[must_use]
    pub fn start(self) -> NaiveDateTime {
        self.first_day().and_time(chrono::NaiveTime::MIN)
    }

    /// Exclusive upper bound of the period (first day of the next month, midnight).
    #[must_use]
    pub fn end(self) -> NaiveDateTime {
        self.next().start()
    }

    #[must_use]
    pub fn next(self) -> Self {
        let first = self.first_day();
        Self::of(first.checked_add_months(Months::new(1)).unwrap_or(first))
    }

    /// Number of days in the month.
    #[must_use]
    pub fn days(self) -> u32 {
        let first = self.first_day();
        self.next()
            .first_day()
            .signed_duration_since(first)
            .num_days() as u32
    }

    /// Last day of the month.
    #[must_use]
    pub fn last_day(self) -> NaiveDate {
        self.next()
            .first_day()
            .checked_sub_days(Days::new(1))
            .unwrap_or_else(|| self.first_day())
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}/{}", self.month, self.year)
    }
}
