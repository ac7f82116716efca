use std::num::NonZeroU32;

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::{Client, header};
use secrecy::{ExposeSecret, SecretString};
use shared_utils::env::get_env_var;
use tracing::{debug, info};

use crate::{
    calendar::TradingCalendar,
    models::{bar::BarRow, request::HistDataReq, security::SecurityType},
    providers::{
        Broker, ProviderError, ProviderInitError,
        alpaca_rest::{
            params::{AlpacaBarsParams, construct_params, timeframe_param},
            response::AlpacaResponse,
        },
    },
};

pub const BASE_URL: &str = "https://data.alpaca.markets/v2/stocks/bars";

/// Tunables for [`AlpacaProvider`].
#[derive(Debug, Clone)]
pub struct AlpacaOptions {
    pub base_url: String,
    pub params: AlpacaBarsParams,
    /// Defaults to the free-plan allowance of 200.
    pub requests_per_minute: NonZeroU32,
    /// Used to resolve request durations into absolute ranges.
    pub calendar: TradingCalendar,
}

impl Default for AlpacaOptions {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            params: AlpacaBarsParams::default(),
            requests_per_minute: nonzero!(200u32),
            calendar: TradingCalendar::us_federal(),
        }
    }
}

pub struct AlpacaProvider {
    client: Client,
    base_url: String,
    params: AlpacaBarsParams,
    calendar: TradingCalendar,
    limiter: DefaultDirectRateLimiter,
    _api_key: SecretString,
    _secret_key: SecretString,
}

impl AlpacaProvider {
    /// Creates a provider with default options.
    ///
    /// Reads API keys from the `APCA_API_KEY_ID` and `APCA_API_SECRET_KEY`
    /// environment variables.
    pub fn new() -> Result<Self, ProviderInitError> {
        Self::from_env(AlpacaOptions::default())
    }

    /// Same as [`AlpacaProvider::new`] with explicit options.
    pub fn from_env(options: AlpacaOptions) -> Result<Self, ProviderInitError> {
        let api_key = SecretString::from(get_env_var("APCA_API_KEY_ID")?);
        let secret_key = SecretString::from(get_env_var("APCA_API_SECRET_KEY")?);
        Self::with_credentials(api_key, secret_key, options)
    }

    pub fn with_credentials(
        api_key: SecretString,
        secret_key: SecretString,
        options: AlpacaOptions,
    ) -> Result<Self, ProviderInitError> {
        let mut key_header = header::HeaderValue::from_str(api_key.expose_secret())?;
        key_header.set_sensitive(true);
        let mut secret_header = header::HeaderValue::from_str(secret_key.expose_secret())?;
        secret_header.set_sensitive(true);

        let mut headers = header::HeaderMap::new();
        headers.insert("APCA-API-KEY-ID", key_header);
        headers.insert("APCA-API-SECRET-KEY", secret_header);

        let client = Client::builder().default_headers(headers).build()?;

        Ok(Self {
            client,
            base_url: options.base_url,
            params: options.params,
            calendar: options.calendar,
            limiter: RateLimiter::direct(Quota::per_minute(options.requests_per_minute)),
            _api_key: api_key,
            _secret_key: secret_key,
        })
    }
}

#[async_trait]
impl Broker for AlpacaProvider {
    fn name(&self) -> &str {
        "alpaca"
    }

    async fn fetch_bars(&self, req: &HistDataReq) -> Result<Vec<BarRow>, ProviderError> {
        if req.security_type() != SecurityType::Stock {
            return Err(ProviderError::Validation(format!(
                "Alpaca stock bars cannot serve {}",
                req.security_type()
            )));
        }
        timeframe_param(req.bar_size())?;
        let range = req
            .resolve(&self.calendar)
            .map_err(|e| ProviderError::Validation(e.to_string()))?;

        let mut rows = Vec::new();
        let mut next_page_token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let query = construct_params(
                req.symbol(),
                req.bar_size(),
                &range,
                &self.params,
                next_page_token.as_deref(),
            )?;

            self.limiter.until_ready().await;
            let response = self.client.get(&self.base_url).query(&query).send().await?;

            let status = response.status();
            if !status.is_success() {
                let message = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown API error".to_string());
                return Err(ProviderError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let page = response.json::<AlpacaResponse>().await?;
            pages += 1;

            for (symbol, bars) in page.bars.into_iter().flatten() {
                if symbol != req.symbol() {
                    continue;
                }
                rows.extend(
                    bars.into_iter()
                        .map(|b| b.into_row(req.symbol(), req.bar_size()))
                        .filter(|r| range.contains(r.timestamp)),
                );
            }
            debug!(%req, pages, rows = rows.len(), "fetched Alpaca page");

            match page.next_page_token {
                Some(token) => next_page_token = Some(token),
                None => break,
            }
        }

        if rows.is_empty() {
            return Err(ProviderError::NoData {
                request: req.to_string(),
            });
        }
        info!(%req, %range, rows = rows.len(), pages, "downloaded bars from Alpaca");
        Ok(rows)
    }
}
