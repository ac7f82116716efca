//! Trading-day calendar.
//!
//! A trading day is a weekday that is neither a rule-based holiday nor one of
//! the configured extra closures. The built-in rule set is the US federal
//! holiday calendar with observed dates: a fixed-date holiday falling on a
//! Saturday is observed on the Friday before, one falling on a Sunday on the
//! Monday after. That means New Year's Day can be observed on December 31 of
//! the previous year.

use std::collections::BTreeSet;

use chrono::{Datelike, Duration, NaiveDate, Weekday};

use crate::errors::RequestError;

/// Upper bound on consecutive non-trading days before a search gives up.
const MAX_CLOSED_RUN: u32 = 3_660;

/// Longest walk over the calendar a single lookback may take, in days.
/// About 400 years; anything longer is rejected before walking.
pub const MAX_LOOKBACK_DAYS: u32 = 146_100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HolidayRules {
    UsFederal,
    None,
}

/// Weekend + holiday calendar used for lookback arithmetic and download planning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradingCalendar {
    rules: HolidayRules,
    closures: BTreeSet<NaiveDate>,
}

impl Default for TradingCalendar {
    fn default() -> Self {
        Self::us_federal()
    }
}

impl TradingCalendar {
    /// Weekends plus US federal holidays.
    pub fn us_federal() -> Self {
        Self {
            rules: HolidayRules::UsFederal,
            closures: BTreeSet::new(),
        }
    }

    /// Weekends only.
    pub fn weekdays_only() -> Self {
        Self {
            rules: HolidayRules::None,
            closures: BTreeSet::new(),
        }
    }

    /// Adds ad-hoc closures (exchange-specific days, national mourning, ...).
    pub fn with_closures<I>(mut self, dates: I) -> Self
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        self.closures.extend(dates);
        self
    }

    pub fn is_holiday(&self, d: NaiveDate) -> bool {
        if self.closures.contains(&d) {
            return true;
        }
        match self.rules {
            HolidayRules::None => false,
            // Dec 31 may carry next year's observed New Year's Day.
            HolidayRules::UsFederal => {
                us_federal_holidays(d.year()).contains(&d)
                    || (d.month() == 12 && us_federal_holidays(d.year() + 1).contains(&d))
            }
        }
    }

    pub fn is_trading_day(&self, d: NaiveDate) -> bool {
        !matches!(d.weekday(), Weekday::Sat | Weekday::Sun) && !self.is_holiday(d)
    }

    /// Closest trading day strictly before `d`.
    pub fn prev_trading_day(&self, d: NaiveDate) -> Result<NaiveDate, RequestError> {
        let mut cur = d;
        for _ in 0..MAX_CLOSED_RUN {
            cur = cur.pred_opt().ok_or(RequestError::OutOfRange)?;
            if self.is_trading_day(cur) {
                return Ok(cur);
            }
        }
        Err(RequestError::OutOfRange)
    }

    /// Closest trading day strictly after `d`.
    pub fn next_trading_day(&self, d: NaiveDate) -> Result<NaiveDate, RequestError> {
        let mut cur = d;
        for _ in 0..MAX_CLOSED_RUN {
            cur = cur.succ_opt().ok_or(RequestError::OutOfRange)?;
            if self.is_trading_day(cur) {
                return Ok(cur);
            }
        }
        Err(RequestError::OutOfRange)
    }

    /// Trading days in `first..=last`, ascending.
    pub fn trading_days(&self, first: NaiveDate, last: NaiveDate) -> Vec<NaiveDate> {
        first
            .iter_days()
            .take_while(|d| *d <= last)
            .filter(|d| self.is_trading_day(*d))
            .collect()
    }

    /// Steps back `n` trading days from `d`; `d` itself is not counted.
    ///
    /// Fails with [`RequestError::OutOfRange`] when `n` exceeds
    /// [`MAX_LOOKBACK_DAYS`].
    pub fn rewind_trading_days(&self, d: NaiveDate, n: u32) -> Result<NaiveDate, RequestError> {
        if n > MAX_LOOKBACK_DAYS {
            return Err(RequestError::OutOfRange);
        }
        let mut cur = d;
        for _ in 0..n {
            cur = self.prev_trading_day(cur)?;
        }
        Ok(cur)
    }
}

/// Observed US federal holidays for `year`, ascending.
///
/// Only the observed date is listed. The observed New Year's Day for `year` can
/// land on December 31 of `year - 1`, in which case it is in the list for
/// `year`.
pub fn us_federal_holidays(year: i32) -> Vec<NaiveDate> {
    let mut out = Vec::with_capacity(11);
    let mut push = |d: Option<NaiveDate>| out.extend(d);

    push(fixed(year, 1, 1).map(nearest_workday));
    if year >= 1986 {
        push(NaiveDate::from_weekday_of_month_opt(year, 1, Weekday::Mon, 3));
    }
    push(NaiveDate::from_weekday_of_month_opt(year, 2, Weekday::Mon, 3));
    push(last_weekday_of_month(year, 5, Weekday::Mon));
    if year >= 2021 {
        push(fixed(year, 6, 19).map(nearest_workday));
    }
    push(fixed(year, 7, 4).map(nearest_workday));
    push(NaiveDate::from_weekday_of_month_opt(year, 9, Weekday::Mon, 1));
    push(NaiveDate::from_weekday_of_month_opt(year, 10, Weekday::Mon, 2));
    push(fixed(year, 11, 11).map(nearest_workday));
    push(NaiveDate::from_weekday_of_month_opt(year, 11, Weekday::Thu, 4));
    push(fixed(year, 12, 25).map(nearest_workday));

    out.sort_unstable();
    out
}

fn fixed(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
}

fn nearest_workday(d: NaiveDate) -> NaiveDate {
    match d.weekday() {
        Weekday::Sat => d - Duration::days(1),
        Weekday::Sun => d + Duration::days(1),
        _ => d,
    }
}

fn last_weekday_of_month(year: i32, month: u32, wd: Weekday) -> Option<NaiveDate> {
    (1..=5u8)
        .rev()
        .find_map(|n| NaiveDate::from_weekday_of_month_opt(year, month, wd, n))
}
