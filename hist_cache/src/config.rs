//! Service configuration: TOML file plus environment overrides.
//!
//! ```toml
//! database_url = "sqlite:hist_cache.db"
//! exchange_tz = "America/New_York"
//! max_concurrent_downloads = 4
//!
//! [calendar]
//! kind = "us_federal"            # or "weekdays_only"
//! extra_holidays = ["2018-12-05"]
//!
//! [provider]
//! kind = "alpaca"
//! feed = "iex"
//! requests_per_minute = 200
//! ```
//!
//! `HIST_CACHE_DATABASE_URL` replaces `database_url` when set.

use std::{num::NonZeroU32, path::Path};

use bar_feed::{
    RequestError, TradingCalendar,
    providers::alpaca_rest::{AlpacaBarsParams, Feed},
    tz::parse_tz,
};
use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use shared_utils::env::get_env_var_opt;
use thiserror::Error;

use crate::orchestrator::DEFAULT_MAX_CONCURRENCY;

/// Environment variable overriding [`CacheConfig::database_url`].
pub const DATABASE_URL_ENV: &str = "HIST_CACHE_DATABASE_URL";

/// Configuration loading failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid exchange_tz: {0}")]
    TimeZone(#[source] RequestError),

    #[error("database_url is empty")]
    MissingDatabaseUrl,
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// SQLite path or `sqlite:` URL.
    #[serde(default)]
    pub database_url: String,
    /// IANA zone requests and exports are expressed in.
    #[serde(default = "default_exchange_tz")]
    pub exchange_tz: String,
    #[serde(default = "default_max_concurrent_downloads")]
    pub max_concurrent_downloads: usize,
    #[serde(default)]
    pub calendar: CalendarCfg,
    #[serde(default)]
    pub provider: ProviderCfg,
}

fn default_exchange_tz() -> String {
    "America/New_York".to_string()
}

fn default_max_concurrent_downloads() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

/// Holiday rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarKind {
    #[default]
    UsFederal,
    WeekdaysOnly,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CalendarCfg {
    #[serde(default)]
    pub kind: CalendarKind,
    /// Additional closed dates (market closures outside the holiday rules).
    #[serde(default)]
    pub extra_holidays: Vec<NaiveDate>,
}

/// Broker adapter selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    Alpaca,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderCfg {
    #[serde(default)]
    pub kind: ProviderKind,
    pub feed: Option<Feed>,
    pub requests_per_minute: Option<NonZeroU32>,
    /// Endpoint override, mostly for tests against a local server.
    pub base_url: Option<String>,
}

impl ProviderCfg {
    pub fn alpaca_params(&self) -> AlpacaBarsParams {
        AlpacaBarsParams {
            feed: self.feed,
            ..Default::default()
        }
    }
}

impl CacheConfig {
    /// Parsed [`exchange_tz`](Self::exchange_tz).
    pub fn exchange_tz(&self) -> Result<Tz, ConfigError> {
        parse_tz(&self.exchange_tz).map_err(ConfigError::TimeZone)
    }

    pub fn trading_calendar(&self) -> TradingCalendar {
        let base = match self.calendar.kind {
            CalendarKind::UsFederal => TradingCalendar::us_federal(),
            CalendarKind::WeekdaysOnly => TradingCalendar::weekdays_only(),
        };
        base.with_closures(self.calendar.extra_holidays.iter().copied())
    }

    /// Applies environment overrides in place.
    pub fn apply_env(&mut self) {
        if let Some(url) = get_env_var_opt(DATABASE_URL_ENV) {
            self.database_url = url;
        }
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.database_url.trim().is_empty() {
            return Err(ConfigError::MissingDatabaseUrl);
        }
        self.exchange_tz()?;
        Ok(self)
    }
}

/// Parses a TOML string, applies environment overrides and validates.
pub fn load_config_str(s: &str) -> Result<CacheConfig, ConfigError> {
    let mut cfg: CacheConfig = toml::from_str(s)?;
    cfg.apply_env();
    cfg.validate()
}

/// [`load_config_str`] on a file.
pub fn load_config_path(path: impl AsRef<Path>) -> Result<CacheConfig, ConfigError> {
    let path = path.as_ref();
    let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    load_config_str(&s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_file_parses() {
        let cfg: CacheConfig = toml::from_str(
            r#"
database_url = "sqlite:cache.db"
exchange_tz = "US/Eastern"
max_concurrent_downloads = 2

[calendar]
kind = "weekdays_only"
extra_holidays = ["2018-12-05"]

[provider]
kind = "alpaca"
feed = "iex"
requests_per_minute = 150
"#,
        )
        .unwrap();
        assert_eq!(cfg.max_concurrent_downloads, 2);
        assert_eq!(cfg.provider.feed, Some(Feed::Iex));
        assert_eq!(cfg.provider.requests_per_minute.map(NonZeroU32::get), Some(150));

        let cal = cfg.trading_calendar();
        let closed = NaiveDate::from_ymd_opt(2018, 12, 5).unwrap();
        assert!(!cal.is_trading_day(closed));
        // weekdays_only keeps federal holidays open
        assert!(cal.is_trading_day(NaiveDate::from_ymd_opt(2017, 9, 4).unwrap()));
    }

    #[test]
    fn defaults_fill_optional_sections() {
        let cfg: CacheConfig = toml::from_str(r#"database_url = "x.db""#).unwrap();
        assert_eq!(cfg.exchange_tz, "America/New_York");
        assert_eq!(cfg.max_concurrent_downloads, DEFAULT_MAX_CONCURRENCY);
        assert_eq!(cfg.calendar.kind, CalendarKind::UsFederal);
        assert_eq!(cfg.provider.kind, ProviderKind::Alpaca);
    }

    #[test]
    fn unknown_keys_and_bad_zones_are_rejected() {
        assert!(matches!(
            toml::from_str::<CacheConfig>("databse_url = \"x.db\""),
            Err(_)
        ));
        let cfg: CacheConfig =
            toml::from_str("database_url = \"x.db\"\nexchange_tz = \"Mars/Olympus\"").unwrap();
        assert!(matches!(cfg.validate(), Err(ConfigError::TimeZone(_))));
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = load_config_path("/definitely/not/here.toml").unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.toml"));
    }
}
