use serde::{Deserialize, Serialize};

use crate::{
    models::{
        bar_size::{BarSize, BarUnit},
        range::TimeRange,
    },
    providers::ProviderError,
    tz::to_rfc3339_millis,
};

/// Specifies the corporate action adjustment for stock data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Adjustment {
    #[default]
    Raw,
    Split,
    Dividend,
    All,
}

impl Adjustment {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Split => "split",
            Self::Dividend => "dividend",
            Self::All => "all",
        }
    }
}

/// Specifies the source feed for stock data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Feed {
    #[default]
    Sip,
    Iex,
    Otc,
}

impl Feed {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sip => "sip",
            Self::Iex => "iex",
            Self::Otc => "otc",
        }
    }
}

/// Alpaca-specific parameters for a bars request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AlpacaBarsParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjustment: Option<Adjustment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feed: Option<Feed>,
    /// Page size, 1..=10000.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

/// Maps a bar size to Alpaca's `timeframe` query value.
///
/// Alpaca aggregates minutes 1-59, hours 1-23, single days and weeks, and
/// months 1, 2, 3, 4, 6 or 12. Second bars are not offered.
pub fn timeframe_param(bar_size: BarSize) -> Result<String, ProviderError> {
    let n = bar_size.amount().get();
    let unit = match bar_size.unit() {
        BarUnit::Minute if n <= 59 => "Min",
        BarUnit::Hour if n <= 23 => "Hour",
        BarUnit::Day if n == 1 => "Day",
        BarUnit::Week if n == 1 => "Week",
        BarUnit::Month if matches!(n, 1 | 2 | 3 | 4 | 6 | 12) => "Month",
        _ => {
            return Err(ProviderError::Validation(format!(
                "bar size {bar_size} is not supported by Alpaca"
            )));
        }
    };
    Ok(format!("{n}{unit}"))
}

/// Builds the query string for one page of a bars request.
pub fn construct_params(
    symbol: &str,
    bar_size: BarSize,
    range: &TimeRange,
    params: &AlpacaBarsParams,
    page_token: Option<&str>,
) -> Result<Vec<(&'static str, String)>, ProviderError> {
    let mut query = vec![
        ("symbols", symbol.to_string()),
        ("timeframe", timeframe_param(bar_size)?),
        ("start", to_rfc3339_millis(range.start())),
        ("end", to_rfc3339_millis(range.end())),
        ("sort", "asc".to_string()),
    ];
    if let Some(adjustment) = params.adjustment {
        query.push(("adjustment", adjustment.as_str().to_string()));
    }
    if let Some(feed) = params.feed {
        query.push(("feed", feed.as_str().to_string()));
    }
    if let Some(limit) = params.limit {
        query.push(("limit", limit.to_string()));
    }
    if let Some(token) = page_token {
        query.push(("page_token", token.to_string()));
    }
    Ok(query)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn tf(s: &str) -> Result<String, ProviderError> {
        timeframe_param(s.parse().unwrap())
    }

    #[test]
    fn timeframe_mapping() {
        assert_eq!(tf("5m").unwrap(), "5Min");
        assert_eq!(tf("1h").unwrap(), "1Hour");
        assert_eq!(tf("1d").unwrap(), "1Day");
        assert_eq!(tf("1W").unwrap(), "1Week");
        assert_eq!(tf("3M").unwrap(), "3Month");
    }

    #[test]
    fn unsupported_timeframes_are_rejected() {
        for s in ["30s", "60m", "24h", "2d", "2W", "5M"] {
            assert!(
                matches!(tf(s), Err(ProviderError::Validation(_))),
                "{s} should be rejected"
            );
        }
    }

    #[test]
    fn query_contains_range_and_options() {
        let range = TimeRange::between(
            Utc.with_ymd_and_hms(2017, 9, 5, 4, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2017, 9, 7, 4, 0, 0).unwrap(),
        )
        .unwrap();
        let params = AlpacaBarsParams {
            feed: Some(Feed::Iex),
            limit: Some(1_000),
            ..Default::default()
        };
        let q = construct_params("GS", "1h".parse().unwrap(), &range, &params, Some("tok")).unwrap();
        let get = |k: &str| q.iter().find(|(name, _)| *name == k).map(|(_, v)| v.as_str());
        assert_eq!(get("symbols"), Some("GS"));
        assert_eq!(get("timeframe"), Some("1Hour"));
        assert_eq!(get("start"), Some("2017-09-05T04:00:00.000Z"));
        assert_eq!(get("end"), Some("2017-09-07T04:00:00.000Z"));
        assert_eq!(get("feed"), Some("iex"));
        assert_eq!(get("limit"), Some("1000"));
        assert_eq!(get("page_token"), Some("tok"));
        assert_eq!(get("adjustment"), None);
    }
}
