//! Historical data request descriptor.

use std::fmt;

use chrono::DateTime;
use chrono_tz::Tz;

use crate::{
    calendar::TradingCalendar,
    errors::RequestError,
    models::{
        bar_size::BarSize, lookback::Lookback, range::TimeRange, security::SecurityType,
    },
    resolve,
    tz::{parse_local_ts, parse_tz},
};

/// Identity of a stored bar series: `(symbol, security_type, bar_size)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesKey {
    pub symbol: String,
    pub security_type: SecurityType,
    pub bar_size: BarSize,
}

impl SeriesKey {
    pub fn new(symbol: impl Into<String>, security_type: SecurityType, bar_size: BarSize) -> Self {
        Self {
            symbol: symbol.into(),
            security_type,
            bar_size,
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@{}", self.security_type, self.symbol, self.bar_size)
    }
}

/// "Give me `duration` of `bar_size` bars for `symbol`, ending at `end`."
///
/// Immutable once built; every constructor validates. `end` carries the
/// exchange time zone, which drives day flooring during resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistDataReq {
    security_type: SecurityType,
    symbol: String,
    bar_size: BarSize,
    duration: Lookback,
    end: DateTime<Tz>,
}

impl HistDataReq {
    pub fn new(
        security_type: SecurityType,
        symbol: &str,
        bar_size: BarSize,
        duration: Lookback,
        end: DateTime<Tz>,
    ) -> Result<Self, RequestError> {
        let symbol = symbol.trim();
        if symbol.is_empty() || symbol.chars().any(char::is_whitespace) {
            return Err(RequestError::InvalidSymbol(symbol.to_string()));
        }
        Ok(Self {
            security_type,
            symbol: symbol.to_uppercase(),
            bar_size,
            duration,
            end,
        })
    }

    /// Builds a request from its textual parts.
    ///
    /// `end` accepts the layouts of [`parse_local_ts`]; naive values are read as
    /// wall time in `tz_name`.
    ///
    /// ```
    /// use bar_feed::HistDataReq;
    ///
    /// let req = HistDataReq::parse("Stock", "GS", "1 hour", "8 d", "2017-09-13", "America/New_York")
    ///     .unwrap();
    /// assert_eq!(req.to_string(), "Stock GS 1h 8d ending 2017-09-13T00:00:00-04:00");
    /// ```
    pub fn parse(
        security_type: &str,
        symbol: &str,
        bar_size: &str,
        duration: &str,
        end: &str,
        tz_name: &str,
    ) -> Result<Self, RequestError> {
        let tz = parse_tz(tz_name)?;
        let end = parse_local_ts(end, tz)?.with_timezone(&tz);
        Self::new(
            security_type.parse()?,
            symbol,
            bar_size.parse()?,
            duration.parse()?,
            end,
        )
    }

    pub fn security_type(&self) -> SecurityType {
        self.security_type
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bar_size(&self) -> BarSize {
        self.bar_size
    }

    pub fn duration(&self) -> Lookback {
        self.duration
    }

    pub fn end(&self) -> DateTime<Tz> {
        self.end
    }

    pub fn tz(&self) -> Tz {
        self.end.timezone()
    }

    pub fn series_key(&self) -> SeriesKey {
        SeriesKey::new(self.symbol.clone(), self.security_type, self.bar_size)
    }

    /// Absolute `[start, end)` this request covers.
    pub fn resolve(&self, calendar: &TradingCalendar) -> Result<TimeRange, RequestError> {
        resolve::resolve(self.bar_size, self.duration, self.end, calendar)
    }

    /// Same series, different window.
    pub fn with_window(&self, duration: Lookback, end: DateTime<Tz>) -> Self {
        Self {
            duration,
            end,
            ..self.clone()
        }
    }
}

impl fmt::Display for HistDataReq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} ending {}",
            self.security_type,
            self.symbol,
            self.bar_size,
            self.duration,
            self.end.to_rfc3339()
        )
    }
}
