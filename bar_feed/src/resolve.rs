//! Duration resolution: symbolic lookback + end instant -> absolute range.
//!
//! Day arithmetic happens in the zone carried by `end`. Rules per lookback unit:
//!
//! | lookback | bar size            | start                                                  |
//! |----------|---------------------|--------------------------------------------------------|
//! | s/m/h    | intraday            | `end - span`, never before the midnight of the last day touched |
//! | s/m/h    | daily               | span consumed over trading hours, floored to midnight  |
//! | s/m/h    | weekly / monthly    | `end - span`                                           |
//! | d        | any                 | N trading days back, same time of day as `end`         |
//! | W/M/Y    | any                 | calendar subtraction, floored to midnight              |

use chrono::{DateTime, Days, Duration, Months, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::{
    calendar::{MAX_LOOKBACK_DAYS, TradingCalendar},
    errors::RequestError,
    models::{
        bar_size::{BarClass, BarSize},
        lookback::{Lookback, LookbackUnit},
        range::TimeRange,
    },
    tz::{DstPolicy, from_local_naive_with_policy, local_date, local_midnight},
};

/// Resolves `duration` ending at `end` into `[start, end)`.
///
/// Deterministic, and `start < end` whenever it returns `Ok`.
pub fn resolve(
    bar_size: BarSize,
    duration: Lookback,
    end: DateTime<Tz>,
    calendar: &TradingCalendar,
) -> Result<TimeRange, RequestError> {
    let tz = end.timezone();
    let end_utc = end.with_timezone(&Utc);
    let n = duration.amount().get();

    let start = match duration.unit() {
        LookbackUnit::Second | LookbackUnit::Minute | LookbackUnit::Hour => {
            let span = Duration::seconds(duration.fixed_seconds().ok_or(RequestError::OutOfRange)?);
            match bar_size.class() {
                BarClass::Intraday => {
                    let last_day = local_date(end_utc - Duration::nanoseconds(1), tz);
                    let floor = local_midnight(last_day, tz)?;
                    (end_utc - span).max(floor)
                }
                BarClass::Daily => rewind_trading_hours(end, span, calendar)?,
                BarClass::WeeklyOrMonthly => end_utc - span,
            }
        }
        LookbackUnit::Day => {
            let date = calendar.rewind_trading_days(end.date_naive(), n)?;
            from_local_naive_with_policy(date.and_time(end.time()), tz, DstPolicy::Lenient)?
        }
        LookbackUnit::Week => {
            let date = end
                .date_naive()
                .checked_sub_days(Days::new(7 * u64::from(n)))
                .ok_or(RequestError::OutOfRange)?;
            local_midnight(date, tz)?
        }
        LookbackUnit::Month => local_midnight(sub_months(end.date_naive(), n)?, tz)?,
        LookbackUnit::Year => {
            let months = n.checked_mul(12).ok_or(RequestError::OutOfRange)?;
            local_midnight(sub_months(end.date_naive(), months)?, tz)?
        }
    };

    TimeRange::between(start, end_utc).ok_or_else(|| RequestError::EmptyRange {
        duration: duration.to_string(),
        end: end.to_rfc3339(),
    })
}

fn sub_months(date: NaiveDate, n: u32) -> Result<NaiveDate, RequestError> {
    date.checked_sub_months(Months::new(n))
        .ok_or(RequestError::OutOfRange)
}

/// Walks `span` backwards over the partial day of `end`, then over whole
/// trading days, and returns the midnight of the day it lands in.
fn rewind_trading_hours(
    end: DateTime<Tz>,
    span: Duration,
    calendar: &TradingCalendar,
) -> Result<DateTime<Utc>, RequestError> {
    let tz = end.timezone();
    if span > Duration::days(i64::from(MAX_LOOKBACK_DAYS)) {
        return Err(RequestError::OutOfRange);
    }
    let mut day = end.date_naive();
    let partial = end.with_timezone(&Utc) - local_midnight(day, tz)?;
    if span <= partial {
        return local_midnight(day, tz);
    }

    let mut remaining = span - partial;
    loop {
        day = calendar.prev_trading_day(day)?;
        if remaining <= Duration::days(1) {
            return local_midnight(day, tz);
        }
        remaining -= Duration::days(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tz::parse_tz;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn et(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Tz> {
        parse_tz("US/Eastern")
            .unwrap()
            .with_ymd_and_hms(y, m, d, h, mi, s)
            .unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> DateTime<Tz> {
        et(y, m, d, 0, 0, 0)
    }

    fn check(bar: &str, dur: &str, end: DateTime<Tz>, want_start: DateTime<Tz>) {
        let cal = TradingCalendar::us_federal();
        let got = resolve(bar.parse().unwrap(), dur.parse().unwrap(), end, &cal)
            .unwrap_or_else(|e| panic!("{bar} {dur} {end}: {e}"));
        assert_eq!(
            got.start(),
            want_start.with_timezone(&Utc),
            "{bar} {dur} ending {end}"
        );
        assert_eq!(got.end(), end.with_timezone(&Utc));
    }

    #[test]
    fn daily_bars_day_lookback() {
        check("1d", "1d", day(2017, 9, 12), day(2017, 9, 11));
        check("1d", "3d", day(2017, 9, 12), day(2017, 9, 7));
        check("1d", "8d", day(2017, 9, 12), day(2017, 8, 30));
        check("1d", "1d", et(2017, 9, 12, 14, 15, 0), et(2017, 9, 11, 14, 15, 0));
        check("1d", "3d", et(2017, 9, 12, 14, 15, 0), et(2017, 9, 7, 14, 15, 0));
        check("1d", "8d", et(2017, 9, 12, 14, 15, 0), et(2017, 8, 30, 14, 15, 0));
    }

    #[test]
    fn daily_bars_hour_lookback_floors_to_trading_day() {
        let mid = day(2017, 9, 12);
        check("1d", "2h", mid, day(2017, 9, 11));
        check("1d", "10h", mid, day(2017, 9, 11));
        check("1d", "24h", mid, day(2017, 9, 11));
        check("1d", "36h", mid, day(2017, 9, 8));
        check("1d", "39h", mid, day(2017, 9, 8));

        let aft = et(2017, 9, 12, 14, 15, 30);
        check("1d", "2h", aft, day(2017, 9, 12));
        check("1d", "10h", aft, day(2017, 9, 12));
        check("1d", "20h", aft, day(2017, 9, 11));
        check("1d", "24h", aft, day(2017, 9, 11));
        check("1d", "36h", aft, day(2017, 9, 11));
        check("1d", "39h", aft, day(2017, 9, 8));
        check("1d", "48h", aft, day(2017, 9, 8));
        check("1d", "66h", aft, day(2017, 9, 7));
    }

    #[test]
    fn calendar_lookbacks_floor_to_midnight() {
        for bar in ["1d", "1W", "1M"] {
            check(bar, "2W", day(2017, 9, 12), day(2017, 8, 29));
            check(bar, "2M", day(2017, 9, 12), day(2017, 7, 12));
            check(bar, "2Y", day(2017, 9, 12), day(2015, 9, 12));
        }
        check("1h", "1W", et(2017, 9, 12, 14, 15, 0), day(2017, 9, 5));
    }

    #[test]
    fn weekly_and_monthly_bars() {
        for bar in ["1W", "1M"] {
            check(bar, "2h", day(2017, 9, 12), et(2017, 9, 11, 22, 0, 0));
            check(bar, "2d", day(2017, 9, 12), day(2017, 9, 8));
        }
    }

    #[test]
    fn minute_bars_day_lookback() {
        check("1m", "1d", day(2017, 9, 12), day(2017, 9, 11));
        check("1m", "3d", day(2017, 9, 12), day(2017, 9, 7));
        check("1m", "8d", day(2017, 9, 12), day(2017, 8, 30));
        check("1m", "1d", et(2017, 9, 12, 14, 15, 0), et(2017, 9, 11, 14, 15, 0));
        check("1m", "3d", et(2017, 9, 12, 14, 15, 0), et(2017, 9, 7, 14, 15, 0));
        check("1m", "8d", et(2017, 9, 12, 14, 15, 0), et(2017, 8, 30, 14, 15, 0));
    }

    #[test]
    fn minute_bars_clock_lookback_stays_within_one_day() {
        let mid = day(2017, 9, 12);
        check("1m", "5m", mid, et(2017, 9, 11, 23, 55, 0));
        check("1m", "1h", mid, et(2017, 9, 11, 23, 0, 0));
        check("1m", "18h", mid, et(2017, 9, 11, 6, 0, 0));
        check("1m", "25h", mid, day(2017, 9, 11));

        let aft = et(2017, 9, 12, 14, 15, 0);
        check("1m", "5m", aft, et(2017, 9, 12, 14, 10, 0));
        check("1m", "1h", aft, et(2017, 9, 12, 13, 15, 0));
        check("1m", "8h", aft, et(2017, 9, 12, 6, 15, 0));
        check("1m", "18h", aft, day(2017, 9, 12));
    }

    #[test]
    fn month_subtraction_clamps_to_month_end() {
        check("1d", "1M", day(2017, 3, 31), day(2017, 2, 28));
        check("1d", "1Y", day(2016, 2, 29), day(2015, 2, 28));
    }

    #[test]
    fn second_lookbacks_re_resolve_exactly() {
        check("1h", "3600s", et(2017, 9, 7, 15, 0, 0), et(2017, 9, 7, 14, 0, 0));
    }

    #[test]
    fn huge_lookbacks_fail_fast() {
        let cal = TradingCalendar::us_federal();
        let end = day(2017, 9, 12);
        let started = std::time::Instant::now();
        for (bar, dur) in [("1d", "4000000000d"), ("1h", "4000000000d"), ("1d", "4000000000h")] {
            let got = resolve(bar.parse().unwrap(), dur.parse().unwrap(), end, &cal);
            assert_eq!(got, Err(RequestError::OutOfRange), "{bar} {dur}");
        }
        assert!(started.elapsed() < std::time::Duration::from_secs(1));
    }

    proptest! {
        #[test]
        fn start_is_before_end(
            bar in prop::sample::select(vec!["1s", "5m", "1h", "1d", "1W", "1M"]),
            amount in 1u32..400,
            unit in prop::sample::select(vec!["s", "m", "h", "d", "W", "M", "Y"]),
            offset_minutes in 0i64..(60 * 24 * 365 * 5),
        ) {
            let end = day(2014, 1, 1) + Duration::minutes(offset_minutes);
            let cal = TradingCalendar::us_federal();
            let bar: BarSize = bar.parse().unwrap();
            let dur: Lookback = format!("{amount}{unit}").parse().unwrap();
            let a = resolve(bar, dur, end, &cal).unwrap();
            let b = resolve(bar, dur, end, &cal).unwrap();
            prop_assert!(a.start() < a.end());
            prop_assert_eq!(a, b);
            prop_assert_eq!(a.end(), end.with_timezone(&Utc));
        }
    }
}
