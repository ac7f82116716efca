//! Canonical in-memory representation of one OHLCV bar.
//!
//! [`BarRow`] is what every [`Broker`](crate::providers::Broker) returns and what
//! every store persists, regardless of vendor. Every value column is optional:
//! synthetic or partial rows (e.g. index bars without volume) are legal, and
//! NaN is never stored. Use [`BarRow::normalized`] on untrusted input.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::bar_size::BarSize;

/// Value columns a bar may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Open,
    High,
    Low,
    Close,
    Volume,
    BarCount,
    Average,
}

impl Column {
    pub const ALL: [Column; 7] = [
        Column::Open,
        Column::High,
        Column::Low,
        Column::Close,
        Column::Volume,
        Column::BarCount,
        Column::Average,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Column::Open => "open",
            Column::High => "high",
            Column::Low => "low",
            Column::Close => "close",
            Column::Volume => "volume",
            Column::BarCount => "bar_count",
            Column::Average => "average",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single bar keyed by `(symbol, bar_size, timestamp)`.
#[derive(Debug, Clone, PartialEq)]
pub struct BarRow {
    pub symbol: String,
    pub bar_size: BarSize,
    /// Bar open time (UTC).
    pub timestamp: DateTime<Utc>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<i64>,
    /// Trade count. Not all providers supply this.
    pub bar_count: Option<i64>,
    /// Volume- or time-weighted average price.
    pub average: Option<f64>,
}

impl BarRow {
    /// A row with no value columns populated.
    pub fn new(symbol: impl Into<String>, bar_size: BarSize, timestamp: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.into(),
            bar_size,
            timestamp,
            open: None,
            high: None,
            low: None,
            close: None,
            volume: None,
            bar_count: None,
            average: None,
        }
    }

    pub fn with_ohlc(mut self, open: f64, high: f64, low: f64, close: f64) -> Self {
        self.open = Some(open);
        self.high = Some(high);
        self.low = Some(low);
        self.close = Some(close);
        self
    }

    pub fn with_close(mut self, close: f64) -> Self {
        self.close = Some(close);
        self
    }

    pub fn with_volume(mut self, volume: i64) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn with_bar_count(mut self, n: i64) -> Self {
        self.bar_count = Some(n);
        self
    }

    pub fn with_average(mut self, average: f64) -> Self {
        self.average = Some(average);
        self
    }

    pub fn is_set(&self, col: Column) -> bool {
        match col {
            Column::Open => self.open.is_some(),
            Column::High => self.high.is_some(),
            Column::Low => self.low.is_some(),
            Column::Close => self.close.is_some(),
            Column::Volume => self.volume.is_some(),
            Column::BarCount => self.bar_count.is_some(),
            Column::Average => self.average.is_some(),
        }
    }

    /// Populated columns, in [`Column::ALL`] order.
    pub fn columns(&self) -> impl Iterator<Item = Column> + '_ {
        Column::ALL.into_iter().filter(|c| self.is_set(*c))
    }

    /// Number of populated columns.
    pub fn populated(&self) -> usize {
        self.columns().count()
    }

    /// NaN prices become absent; negative volumes and counts become absent.
    pub fn normalized(mut self) -> Self {
        for v in [
            &mut self.open,
            &mut self.high,
            &mut self.low,
            &mut self.close,
            &mut self.average,
        ] {
            if v.is_some_and(f64::is_nan) {
                *v = None;
            }
        }
        for v in [&mut self.volume, &mut self.bar_count] {
            if v.is_some_and(|n| n < 0) {
                *v = None;
            }
        }
        self
    }
}
