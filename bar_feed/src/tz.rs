//! Time zone parsing and conversion helpers.
//!
//! Stored and fetched timestamps are UTC. Exchange-local wall time only shows up
//! at the request edge (end instants, day flooring) and in CSV presentation.
//!
//! What this module provides:
//! - [`parse_tz`]: IANA zone name to [`Tz`].
//! - [`parse_ts_to_utc`]: RFC-3339 with explicit offset to UTC.
//! - [`parse_local_ts`]: the timestamp layouts found in cached CSV files, with a
//!   fallback zone for naive values.
//! - [`from_local_naive_with_policy`]: naive local time to UTC under a
//!   [`DstPolicy`].
//! - [`local_midnight`]: the instant a local calendar date begins.
//!
//! Examples
//! - New York "fall back" ambiguity (2024-11-03 01:30 occurs twice):
//!   PreferEarliest -> 05:30Z, PreferLatest -> 06:30Z.
//! - New York "spring forward" gap (2024-03-10 02:30 never happens):
//!   ShiftForward / Lenient -> 03:00 EDT = 07:00Z.

use chrono::{
    DateTime, Duration, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc,
    offset::LocalResult,
};
use chrono_tz::Tz;

use crate::errors::RequestError;

/// Policy for handling DST edge cases when converting local naive timestamps to UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DstPolicy {
    /// Error on ambiguous (fall-back) or nonexistent (spring-forward) local times.
    Strict,
    /// Ambiguous: pick the earlier instant. Nonexistent: error.
    PreferEarliest,
    /// Ambiguous: pick the later instant. Nonexistent: error.
    PreferLatest,
    /// Nonexistent: step forward minute by minute (max 2 hours). Ambiguous: error.
    ShiftForward,
    /// Earliest on ambiguity, shift forward on gaps. Never errors for real zones.
    Lenient,
}

/// Parse an IANA zone name (e.g. `"America/New_York"`).
pub fn parse_tz(name: &str) -> Result<Tz, RequestError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| RequestError::UnknownTimeZone(name.to_string()))
}

/// RFC-3339 with offset -> UTC.
pub fn parse_ts_to_utc(s: &str) -> Result<DateTime<Utc>, RequestError> {
    DateTime::parse_from_rfc3339(s.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| RequestError::BadTimestamp(s.to_string()))
}

const OFFSET_LAYOUTS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y%m%d %H:%M:%S%:z",
];

const NAIVE_LAYOUTS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y%m%d %H:%M:%S",
];

/// Parse a timestamp as written in cached CSV files or on the command line.
///
/// Accepted, in order: RFC-3339, `"2017-09-05 09:00:00-04:00"` style offsets,
/// naive date-times (interpreted in `tz`), and bare dates (local midnight in
/// `tz`). Naive values go through [`DstPolicy::Lenient`].
pub fn parse_local_ts(s: &str, tz: Tz) -> Result<DateTime<Utc>, RequestError> {
    let t = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(t) {
        return Ok(dt.with_timezone(&Utc));
    }
    for layout in OFFSET_LAYOUTS {
        if let Ok(dt) = DateTime::parse_from_str(t, layout) {
            return Ok(dt.with_timezone(&Utc));
        }
    }
    for layout in NAIVE_LAYOUTS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(t, layout) {
            return from_local_naive_with_policy(naive, tz, DstPolicy::Lenient);
        }
    }
    for layout in ["%Y-%m-%d", "%Y%m%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(t, layout) {
            return local_midnight(date, tz);
        }
    }
    Err(RequestError::BadTimestamp(s.to_string()))
}

/// Convert a naive local timestamp to UTC using a specific time zone and DST policy.
///
/// - A local time that maps to a single instant returns that instant.
/// - Ambiguous (fall-back): `PreferEarliest`/`Lenient` pick the earlier instant,
///   `PreferLatest` the later one, the others error.
/// - Nonexistent (spring-forward): `ShiftForward`/`Lenient` step forward
///   minute by minute until a valid instant is found (max 2 hours), the others
///   error.
pub fn from_local_naive_with_policy(
    naive: NaiveDateTime,
    tz: Tz,
    policy: DstPolicy,
) -> Result<DateTime<Utc>, RequestError> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(a, b) => match policy {
            DstPolicy::PreferEarliest | DstPolicy::Lenient => Ok(a.with_timezone(&Utc)),
            DstPolicy::PreferLatest => Ok(b.with_timezone(&Utc)),
            DstPolicy::Strict | DstPolicy::ShiftForward => Err(RequestError::AmbiguousLocalTime {
                time: naive.to_string(),
                tz: tz.name().to_string(),
            }),
        },
        LocalResult::None => {
            if matches!(policy, DstPolicy::ShiftForward | DstPolicy::Lenient) {
                let mut t = naive;
                for _ in 0..120 {
                    t += Duration::minutes(1);
                    match tz.from_local_datetime(&t) {
                        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => {
                            return Ok(dt.with_timezone(&Utc));
                        }
                        LocalResult::None => {}
                    }
                }
            }
            Err(RequestError::NonexistentLocalTime {
                time: naive.to_string(),
                tz: tz.name().to_string(),
            })
        }
    }
}

/// Strict conversion: errors on ambiguous and nonexistent local times.
pub fn from_local_naive_tz(naive: NaiveDateTime, tz: Tz) -> Result<DateTime<Utc>, RequestError> {
    from_local_naive_with_policy(naive, tz, DstPolicy::Strict)
}

/// The instant `date` begins in `tz` (earliest valid instant on DST edges).
pub fn local_midnight(date: NaiveDate, tz: Tz) -> Result<DateTime<Utc>, RequestError> {
    from_local_naive_with_policy(date.and_time(chrono::NaiveTime::MIN), tz, DstPolicy::Lenient)
}

/// Local calendar date of a UTC instant in `tz`.
pub fn local_date(ts: DateTime<Utc>, tz: Tz) -> NaiveDate {
    ts.with_timezone(&tz).date_naive()
}

/// True when `ts` falls exactly on a local midnight in `tz`.
pub fn is_local_midnight(ts: DateTime<Utc>, tz: Tz) -> bool {
    local_midnight(local_date(ts, tz), tz).is_ok_and(|m| m == ts)
}

/// Format a UTC datetime as an RFC-3339 string with millisecond precision.
pub fn to_rfc3339_millis(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}
