//! Lookback durations: how far back from the end instant a request reaches.
//!
//! Written as magnitude + unit, with an optional space: `"36h"`, `"5 d"`,
//! `"2W"`, `"1 Y"`. `m` is minutes and `M` is months; every other unit letter
//! is case-insensitive. Longer words (`"3 days"`, `"2 weeks"`) are accepted as
//! well.

use std::{fmt, num::NonZeroU32, str::FromStr};

use crate::errors::RequestError;

/// Lookback unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LookbackUnit {
    Second,
    Minute,
    Hour,
    /// Trading days.
    Day,
    Week,
    Month,
    Year,
}

/// A lookback span = amount × unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Lookback {
    amount: NonZeroU32,
    unit: LookbackUnit,
}

impl Lookback {
    pub const fn new(amount: NonZeroU32, unit: LookbackUnit) -> Self {
        Self { amount, unit }
    }

    pub const fn amount(&self) -> NonZeroU32 {
        self.amount
    }

    pub const fn unit(&self) -> LookbackUnit {
        self.unit
    }

    /// Length in seconds for fixed-size units (`s`, `m`, `h`), `None` for
    /// calendar units.
    pub fn fixed_seconds(&self) -> Option<i64> {
        let n = i64::from(self.amount.get());
        match self.unit {
            LookbackUnit::Second => Some(n),
            LookbackUnit::Minute => Some(n * 60),
            LookbackUnit::Hour => Some(n * 3_600),
            _ => None,
        }
    }

    /// `n` trading days.
    pub fn days(n: NonZeroU32) -> Self {
        Self::new(n, LookbackUnit::Day)
    }

    /// `n` seconds.
    pub fn seconds(n: NonZeroU32) -> Self {
        Self::new(n, LookbackUnit::Second)
    }
}

impl fmt::Display for Lookback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let a = self.amount.get();
        let u = match self.unit {
            LookbackUnit::Second => "s",
            LookbackUnit::Minute => "m",
            LookbackUnit::Hour => "h",
            LookbackUnit::Day => "d",
            LookbackUnit::Week => "W",
            LookbackUnit::Month => "M",
            LookbackUnit::Year => "Y",
        };
        write!(f, "{a}{u}")
    }
}

impl FromStr for Lookback {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || RequestError::InvalidDuration(s.to_string());

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
        let unit = match rest {
            "m" => LookbackUnit::Minute,
            "M" => LookbackUnit::Month,
            _ => match rest.to_ascii_lowercase().as_str() {
                "s" | "sec" | "secs" | "second" | "seconds" => LookbackUnit::Second,
                "min" | "mins" | "minute" | "minutes" => LookbackUnit::Minute,
                "h" | "hour" | "hours" => LookbackUnit::Hour,
                "d" | "day" | "days" => LookbackUnit::Day,
                "w" | "week" | "weeks" => LookbackUnit::Week,
                "month" | "months" => LookbackUnit::Month,
                "y" | "year" | "years" => LookbackUnit::Year,
                _ => return Err(bad()),
            },
        };
        Ok(Self::new(amount, unit))
    }
}
