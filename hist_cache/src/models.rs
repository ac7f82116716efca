//! Diesel models mapping to the database schema.
//!
//! These mirror the tables created by the embedded migrations:
//! - [`crate::schema::bars`]: one row per `(symbol, security_type, bar_size, ts)`
//! - [`crate::schema::bar_coverage`]: ranges known to be fully stored
//!
//! Timestamps are RFC-3339 UTC text with millisecond precision, which sorts
//! lexically in time order.

use bar_feed::{BarRow, SeriesKey, TimeRange, tz::to_rfc3339_millis};
use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::{error::StoreError, schema::*};

/// A row in [`crate::schema::bars`].
///
/// As a changeset, `None` fields are skipped, so an upsert fills columns the
/// incoming row carries and leaves the others untouched.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(
    table_name = bars,
    primary_key(symbol, security_type, bar_size, ts),
    check_for_backend(diesel::sqlite::Sqlite)
)]
pub struct BarRecord {
    /// Upper-case ticker.
    pub symbol: String,
    /// [`bar_feed::SecurityType`] text, e.g. `"Stock"`.
    pub security_type: String,
    /// Canonical bar size code, e.g. `"1h"`.
    pub bar_size: String,
    /// Bar start, RFC-3339 UTC.
    pub ts: String,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<i64>,
    pub bar_count: Option<i64>,
    pub average: Option<f64>,
}

impl BarRecord {
    /// Storage form of `row` under `key`'s security type.
    pub fn from_row(key: &SeriesKey, row: &BarRow) -> Self {
        Self {
            symbol: row.symbol.clone(),
            security_type: key.security_type.as_str().to_string(),
            bar_size: row.bar_size.to_string(),
            ts: to_rfc3339_millis(row.timestamp),
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
            bar_count: row.bar_count,
            average: row.average,
        }
    }

    /// Back to the domain type. Fails on text that no longer parses.
    pub fn into_row(self) -> Result<BarRow, StoreError> {
        let bar_size = self.bar_size.parse().map_err(|_| StoreError::Corrupt {
            column: "bar_size",
            value: self.bar_size.clone(),
        })?;
        let ts = parse_stored_ts("ts", &self.ts)?;
        let mut row = BarRow::new(self.symbol, bar_size, ts);
        row.open = self.open;
        row.high = self.high;
        row.low = self.low;
        row.close = self.close;
        row.volume = self.volume;
        row.bar_count = self.bar_count;
        row.average = self.average;
        Ok(row)
    }
}

/// A row in [`crate::schema::bar_coverage`].
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = bar_coverage, check_for_backend(diesel::sqlite::Sqlite))]
pub struct CoverageRecord {
    /// Rowid.
    pub id: i32,
    pub symbol: String,
    pub security_type: String,
    pub bar_size: String,
    /// Inclusive start, RFC-3339 UTC.
    pub start_ts: String,
    /// Exclusive end, RFC-3339 UTC.
    pub end_ts: String,
}

impl CoverageRecord {
    /// The stored range.
    pub fn range(&self) -> Result<TimeRange, StoreError> {
        let start = parse_stored_ts("start_ts", &self.start_ts)?;
        let end = parse_stored_ts("end_ts", &self.end_ts)?;
        TimeRange::between(start, end).ok_or_else(|| StoreError::Corrupt {
            column: "end_ts",
            value: self.end_ts.clone(),
        })
    }
}

/// Insertable form of [`CoverageRecord`].
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = bar_coverage)]
pub struct NewCoverage<'a> {
    pub symbol: &'a str,
    pub security_type: &'a str,
    pub bar_size: String,
    pub start_ts: String,
    pub end_ts: String,
}

impl<'a> NewCoverage<'a> {
    pub fn new(key: &'a SeriesKey, range: &TimeRange) -> Self {
        Self {
            symbol: &key.symbol,
            security_type: key.security_type.as_str(),
            bar_size: key.bar_size.to_string(),
            start_ts: to_rfc3339_millis(range.start()),
            end_ts: to_rfc3339_millis(range.end()),
        }
    }
}

fn parse_stored_ts(column: &'static str, value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StoreError::Corrupt {
            column,
            value: value.to_string(),
        })
}
