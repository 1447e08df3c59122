use std::{
    fmt,
    iter::Sum,
    ops::{Add, AddAssign, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::EngineError;

/// Money amount represented as **integer cents**.
///
/// Every amount the engine handles (expense amounts, budget ceilings, spent
/// and remaining totals) is a `MoneyCents`, so splits and merges never lose a
/// cent to floating-point rounding.
///
/// Remaining budget can go below zero, so the value is signed.
///
/// # Examples
///
/// ```rust
/// use engine::MoneyCents;
///
/// let amount = MoneyCents::new(12_34);
/// assert_eq!(amount.cents(), 1234);
/// assert_eq!(amount.to_string(), "12.34");
/// ```
///
/// Parsing from user input (accepts `.` or `,` as decimal separator; rejects >
/// 2 decimals):
///
/// ```rust
/// use engine::MoneyCents;
///
/// assert_eq!("10".parse::<MoneyCents>().unwrap().cents(), 1000);
/// assert_eq!("10,5".parse::<MoneyCents>().unwrap().cents(), 1050);
/// assert!("12.345".parse::<MoneyCents>().is_err());
/// ```
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
#[repr(transparent)]
pub struct MoneyCents(i64);

impl MoneyCents {
    pub const ZERO: MoneyCents = MoneyCents(0);

    /// Largest amount accepted for a single expense or budget (one billion
    /// units). Keeps totals over any realistic number of rows inside `i64`.
    pub const MAX_AMOUNT: MoneyCents = MoneyCents(100_000_000_000);

    /// Creates a new amount from integer cents.
    #[must_use]
    pub const fn new(cents: i64) -> Self {
        Self(cents)
    }

    /// Returns the raw value in cents.
    #[must_use]
    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Returns `true` if the amount is 0.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if the amount is positive.
    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Checked addition (returns `None` on overflow).
    #[must_use]
    pub fn checked_add(self, rhs: MoneyCents) -> Option<MoneyCents> {
        self.0.checked_add(rhs.0).map(MoneyCents)
    }

    /// Checked subtraction (returns `None` on overflow).
    #[must_use]
    pub fn checked_sub(self, rhs: MoneyCents) -> Option<MoneyCents> {
        self.0.checked_sub(rhs.0).map(MoneyCents)
    }

    /// Share of `total` this amount represents, in percent.
    ///
    /// Returns 0 when `total` is not positive.
    #[must_use]
    pub fn percentage_of(self, total: MoneyCents) -> f64 {
        if total.0 <= 0 {
            return 0.0;
        }
        self.0 as f64 / total.0 as f64 * 100.0
    }

    /// Divides the amount in `parts` equal shares, rounding half away from zero.
    ///
    /// Returns zero when `parts` is 0.
    #[must_use]
    pub fn average_over(self, parts: u32) -> MoneyCents {
        if parts == 0 {
            return MoneyCents::ZERO;
        }
        let parts = i64::from(parts);
        let half = parts / 2;
        let rounded = if self.0 >= 0 {
            (self.0 + half) / parts
        } else {
            (self.0 - half) / parts
        };
        MoneyCents(rounded)
    }
}

impl fmt::Display for MoneyCents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let units = abs / 100;
        let cents = abs % 100;
        write!(f, "{sign}{units}.{cents:02}")
    }
}

impl From<i64> for MoneyCents {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<MoneyCents> for i64 {
    fn from(value: MoneyCents) -> Self {
        value.0
    }
}

impl Add for MoneyCents {
    type Output = MoneyCents;

    fn add(self, rhs: MoneyCents) -> Self::Output {
        MoneyCents(self.0 + rhs.0)
    }
}

impl AddAssign for MoneyCents {
    fn add_assign(&mut self, rhs: MoneyCents) {
        self.0 += rhs.0;
    }
}

impl Sub for MoneyCents {
    type Output = MoneyCents;

    fn sub(self, rhs: MoneyCents) -> Self::Output {
        MoneyCents(self.0 - rhs.0)
    }
}

impl SubAssign for MoneyCents {
    fn sub_assign(&mut self, rhs: MoneyCents) {
        self.0 -= rhs.0;
    }
}

impl Sum for MoneyCents {
    fn sum<I: Iterator<Item = MoneyCents>>(iter: I) -> Self {
        iter.fold(MoneyCents::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a MoneyCents> for MoneyCents {
    fn sum<I: Iterator<Item = &'a MoneyCents>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl FromStr for MoneyCents {
    type Err = EngineError;

    /// Parses a decimal string into cents.
    ///
    /// Accepts `.` or `,` as decimal separator and an optional leading `+`/`-`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || EngineError::InvalidAmount(format!("invalid amount: {s:?}"));
        let overflow = || EngineError::InvalidAmount("amount too large".to_string());

        let trimmed = s.trim();
        let (negative, rest) = match trimmed.as_bytes().first() {
            Some(b'-') => (true, &trimmed[1..]),
            Some(b'+') => (false, &trimmed[1..]),
            Some(_) => (false, trimmed),
            None => return Err(EngineError::InvalidAmount("empty amount".to_string())),
        };

        let rest = rest.trim().replace(',', ".");
        let (units_str, frac_str) = match rest.split_once('.') {
            Some((units, frac)) => (units, frac),
            None => (rest.as_str(), ""),
        };

        if units_str.is_empty() || !units_str.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        if !frac_str.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }

        let units: i64 = units_str.parse().map_err(|_| overflow())?;
        let cents: i64 = match frac_str.len() {
            0 => 0,
            1 => frac_str.parse::<i64>().map_err(|_| invalid())? * 10,
            2 => frac_str.parse::<i64>().map_err(|_| invalid())?,
            _ => return Err(EngineError::InvalidAmount("too many decimals".to_string())),
        };

        let total = units
            .checked_mul(100)
            .and_then(|v| v.checked_add(cents))
            .ok_or_else(overflow)?;

        Ok(MoneyCents(if negative { -total } else { total }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_two_decimals() {
        assert_eq!(MoneyCents::new(0).to_string(), "0.00");
        assert_eq!(MoneyCents::new(7).to_string(), "0.07");
        assert_eq!(MoneyCents::new(3000).to_string(), "30.00");
        assert_eq!(MoneyCents::new(-1050).to_string(), "-10.50");
    }

    #[test]
    fn parse_accepts_dot_or_comma() {
        assert_eq!("20".parse::<MoneyCents>().unwrap().cents(), 2000);
        assert_eq!("20.5".parse::<MoneyCents>().unwrap().cents(), 2050);
        assert_eq!("20,05".parse::<MoneyCents>().unwrap().cents(), 2005);
        assert_eq!("-0.01".parse::<MoneyCents>().unwrap().cents(), -1);
        assert_eq!(" +1.00 ".parse::<MoneyCents>().unwrap().cents(), 100);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("".parse::<MoneyCents>().is_err());
        assert!("12.345".parse::<MoneyCents>().is_err());
        assert!("1.2.3".parse::<MoneyCents>().is_err());
        assert!("abc".parse::<MoneyCents>().is_err());
        assert!(".50".parse::<MoneyCents>().is_err());
    }

    #[test]
    fn percentage_of_non_positive_total_is_zero() {
        assert_eq!(MoneyCents::new(50).percentage_of(MoneyCents::ZERO), 0.0);
        assert_eq!(MoneyCents::new(50).percentage_of(MoneyCents::new(200)), 25.0);
    }

    #[test]
    fn average_rounds_half_up() {
        assert_eq!(MoneyCents::new(1000).average_over(3), MoneyCents::new(333));
        assert_eq!(MoneyCents::new(1001).average_over(2), MoneyCents::new(501));
        assert_eq!(MoneyCents::new(1000).average_over(0), MoneyCents::ZERO);
    }

    #[test]
    fn sum_of_amounts() {
        let total: MoneyCents = [MoneyCents::new(2000), MoneyCents::new(3000)].iter().sum();
        assert_eq!(total, MoneyCents::new(5000));
    }
}
