use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Deserialize;

use crate::models::{bar::BarRow, bar_size::BarSize};

#[derive(Deserialize, Debug)]
pub struct AlpacaBar {
    #[serde(rename = "t")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "o")]
    pub open: f64,
    #[serde(rename = "h")]
    pub high: f64,
    #[serde(rename = "l")]
    pub low: f64,
    #[serde(rename = "c")]
    pub close: f64,
    #[serde(rename = "v")]
    pub volume: f64,
    #[serde(rename = "n", default)]
    pub trade_count: Option<u64>,
    #[serde(rename = "vw", default)]
    pub vwap: Option<f64>,
}

impl AlpacaBar {
    pub fn into_row(self, symbol: &str, bar_size: BarSize) -> BarRow {
        let mut row = BarRow::new(symbol, bar_size, self.timestamp)
            .with_ohlc(self.open, self.high, self.low, self.close);
        row.volume = self.volume.is_finite().then(|| self.volume.round() as i64);
        row.bar_count = self.trade_count.and_then(|n| i64::try_from(n).ok());
        row.average = self.vwap;
        row.normalized()
    }
}

/// One page of `/v2/stocks/bars`. `bars` is `null` when nothing matched.
#[derive(Deserialize, Debug)]
pub struct AlpacaResponse {
    #[serde(default)]
    pub bars: Option<IndexMap<String, Vec<AlpacaBar>>>,
    pub next_page_token: Option<String>,
}
