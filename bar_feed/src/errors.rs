use thiserror::Error;

/// Errors raised while building or resolving a historical data request.
///
/// Every variant is a caller mistake or an impossible calendar computation;
/// none of them are worth retrying.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// Bar size text could not be parsed (e.g. `"7 fortnights"`).
    #[error("invalid bar size {0:?}")]
    InvalidBarSize(String),

    /// Duration text could not be parsed (e.g. `"0d"`, `"5q"`).
    #[error("invalid duration {0:?}")]
    InvalidDuration(String),

    /// Unknown security type.
    #[error("unknown security type {0:?}")]
    InvalidSecurityType(String),

    /// Empty symbol or a symbol containing whitespace.
    #[error("invalid symbol {0:?}")]
    InvalidSymbol(String),

    /// IANA zone name not known to `chrono-tz`.
    #[error("unknown time zone {0:?}")]
    UnknownTimeZone(String),

    /// Timestamp text in none of the accepted layouts.
    #[error("bad timestamp {0:?}")]
    BadTimestamp(String),

    /// Local wall time skipped by a DST transition.
    #[error("local time {time} does not exist in {tz}")]
    NonexistentLocalTime {
        /// Wall-clock time that was requested.
        time: String,
        /// Zone name.
        tz: String,
    },

    /// Local wall time that occurs twice during a DST transition.
    #[error("local time {time} is ambiguous in {tz}")]
    AmbiguousLocalTime {
        /// Wall-clock time that was requested.
        time: String,
        /// Zone name.
        tz: String,
    },

    /// The lookback resolved to `start >= end`.
    #[error("duration {duration} ending at {end} resolves to an empty range")]
    EmptyRange {
        /// Duration as written.
        duration: String,
        /// End instant (RFC-3339).
        end: String,
    },

    /// Calendar arithmetic left chrono's representable range.
    #[error("date arithmetic out of range")]
    OutOfRange,
}
