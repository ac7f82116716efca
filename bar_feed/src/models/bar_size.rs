//! Bar sizes: the aggregation granularity of a bar series.
//!
//! A [`BarSize`] pairs a non-zero amount with a [`BarUnit`]. It parses both the
//! compact codes used as storage keys (`"30s"`, `"5m"`, `"1h"`, `"1d"`, `"1W"`,
//! `"1M"`) and the long broker spellings (`"5 mins"`, `"1 hour"`, `"1 day"`).
//! Lowercase `m` is a minute, uppercase `M` is a month.
//!
//! ```
//! use bar_feed::models::bar_size::{BarSize, BarUnit};
//!
//! let bs: BarSize = "5 mins".parse().unwrap();
//! assert_eq!(bs.amount().get(), 5);
//! assert_eq!(bs.unit(), BarUnit::Minute);
//! assert_eq!(bs.to_string(), "5m");
//! ```

use std::{fmt, num::NonZeroU32, str::FromStr};

use chrono::Duration;

use crate::errors::RequestError;

/// Bar granularity unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BarUnit {
    /// Seconds
    Second,
    /// Minutes
    Minute,
    /// Hours
    Hour,
    /// Trading days
    Day,
    /// Weeks
    Week,
    /// Calendar months
    Month,
}

/// How a bar size aligns to the trading calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarClass {
    /// Seconds, minutes, hours.
    Intraday,
    /// One or more days.
    Daily,
    /// Weeks or months.
    WeeklyOrMonthly,
}

/// A bar size = amount × unit (e.g., 5-Minute, 1-Hour, 1-Day).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BarSize {
    unit: BarUnit,
    amount: NonZeroU32,
}

impl BarSize {
    /// Create a new bar size.
    pub const fn new(amount: NonZeroU32, unit: BarUnit) -> Self {
        Self { unit, amount }
    }

    pub const fn amount(&self) -> NonZeroU32 {
        self.amount
    }

    pub const fn unit(&self) -> BarUnit {
        self.unit
    }

    pub const fn class(&self) -> BarClass {
        match self.unit {
            BarUnit::Second | BarUnit::Minute | BarUnit::Hour => BarClass::Intraday,
            BarUnit::Day => BarClass::Daily,
            BarUnit::Week | BarUnit::Month => BarClass::WeeklyOrMonthly,
        }
    }

    pub const fn is_intraday(&self) -> bool {
        matches!(self.class(), BarClass::Intraday)
    }

    /// Nominal width of one bar.
    ///
    /// Months count as 28 days, the shortest month, so "less than one bar" checks
    /// never swallow a real gap.
    pub fn nominal_span(&self) -> Duration {
        let n = i64::from(self.amount.get());
        match self.unit {
            BarUnit::Second => Duration::seconds(n),
            BarUnit::Minute => Duration::minutes(n),
            BarUnit::Hour => Duration::hours(n),
            BarUnit::Day => Duration::days(n),
            BarUnit::Week => Duration::weeks(n),
            BarUnit::Month => Duration::days(28 * n),
        }
    }

    /// Canonical storage code, same as `Display`.
    pub fn code(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for BarSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let a = self.amount.get();
        let u = match self.unit {
            BarUnit::Second => "s",
            BarUnit::Minute => "m",
            BarUnit::Hour => "h",
            BarUnit::Day => "d",
            BarUnit::Week => "W",
            BarUnit::Month => "M",
        };
        write!(f, "{a}{u}")
    }
}

impl FromStr for BarSize {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || RequestError::InvalidBarSize(s.to_string());

        let trimmed = s.trim();
        let split = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(bad)?;
        let (digits, rest) = trimmed.split_at(split);
        let amount = digits
            .parse::<u32>()
            .ok()
            .and_then(NonZeroU32::new)
            .ok_or_else(bad)?;

        let rest = rest.trim();
        // single letters are case-sensitive only for m / M
        let unit = match rest {
            "m" => BarUnit::Minute,
            "M" => BarUnit::Month,
            _ => match rest.to_ascii_lowercase().as_str() {
                "s" | "sec" | "secs" | "second" | "seconds" => BarUnit::Second,
                "min" | "mins" | "minute" | "minutes" => BarUnit::Minute,
                "h" | "hr" | "hrs" | "hour" | "hours" => BarUnit::Hour,
                "d" | "day" | "days" => BarUnit::Day,
                "w" | "wk" | "week" | "weeks" => BarUnit::Week,
                "mo" | "mon" | "month" | "months" => BarUnit::Month,
                _ => return Err(bad()),
            },
        };
        Ok(Self::new(amount, unit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bs(s: &str) -> BarSize {
        s.parse().unwrap_or_else(|e| panic!("{s}: {e}"))
    }

    #[test]
    fn parses_broker_spellings() {
        assert_eq!(bs("1 hour").to_string(), "1h");
        assert_eq!(bs("5 mins").to_string(), "5m");
        assert_eq!(bs("5 min").to_string(), "5m");
        assert_eq!(bs("30 mins").to_string(), "30m");
        assert_eq!(bs("1 day").to_string(), "1d");
        assert_eq!(bs("1 secs").to_string(), "1s");
        assert_eq!(bs("2 hours").to_string(), "2h");
    }

    #[test]
    fn case_distinguishes_minute_from_month() {
        assert_eq!(bs("1m").unit(), BarUnit::Minute);
        assert_eq!(bs("1M").unit(), BarUnit::Month);
        assert_eq!(bs("1W").unit(), BarUnit::Week);
        assert_eq!(bs("1D").unit(), BarUnit::Day);
    }

    #[test]
    fn display_round_trips_through_parse() {
        for code in ["15s", "1m", "5m", "1h", "4h", "1d", "1W", "1M", "3M"] {
            assert_eq!(bs(code).to_string(), code);
        }
    }

    #[test]
    fn rejects_garbage() {
        for s in ["", "h", "0h", "5", "5 fortnights", "-1d", "1.5h"] {
            assert!(s.parse::<BarSize>().is_err(), "{s:?} should fail");
        }
    }

    #[test]
    fn classes() {
        assert_eq!(bs("1h").class(), BarClass::Intraday);
        assert_eq!(bs("1d").class(), BarClass::Daily);
        assert_eq!(bs("1W").class(), BarClass::WeeklyOrMonthly);
        assert_eq!(bs("1M").class(), BarClass::WeeklyOrMonthly);
    }

    #[test]
    fn nominal_span_of_month_is_shortest_month() {
        assert_eq!(bs("1M").nominal_span(), Duration::days(28));
        assert_eq!(bs("5m").nominal_span(), Duration::minutes(5));
    }
}
