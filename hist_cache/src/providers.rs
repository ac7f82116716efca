//! Provider registry mapping configuration to a concrete broker.
use std::sync::Arc;

use bar_feed::{
    Broker, TradingCalendar,
    providers::{
        ProviderInitError,
        alpaca_rest::{AlpacaOptions, AlpacaProvider},
    },
};

use crate::config::{ProviderCfg, ProviderKind};

/// Builds the broker selected by `cfg`. Credentials come from the environment.
pub fn build_broker(
    cfg: &ProviderCfg,
    calendar: &TradingCalendar,
) -> Result<Arc<dyn Broker>, ProviderInitError> {
    match cfg.kind {
        ProviderKind::Alpaca => {
            let defaults = AlpacaOptions::default();
            let options = AlpacaOptions {
                base_url: cfg.base_url.clone().unwrap_or(defaults.base_url),
                params: cfg.alpaca_params(),
                requests_per_minute: cfg
                    .requests_per_minute
                    .unwrap_or(defaults.requests_per_minute),
                calendar: calendar.clone(),
            };
            Ok(Arc::new(AlpacaProvider::from_env(options)?))
        }
    }
}
