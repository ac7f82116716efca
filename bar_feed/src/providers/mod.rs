//! Broker abstraction for historical bar sources.
//!
//! [`Broker`] is the single capability the cache needs from a data vendor:
//! "fetch bars for this request". Each concrete adapter translates a
//! [`HistDataReq`] into vendor calls and returns vendor-agnostic [`BarRow`]s.
//! The trait is object safe, so the cache holds brokers as `Arc<dyn Broker>`
//! and picks the adapter at runtime.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use bar_feed::{BarRow, Broker, HistDataReq, ProviderError};
//!
//! struct Offline;
//!
//! #[async_trait]
//! impl Broker for Offline {
//!     fn name(&self) -> &str {
//!         "offline"
//!     }
//!
//!     async fn fetch_bars(&self, req: &HistDataReq) -> Result<Vec<BarRow>, ProviderError> {
//!         Err(ProviderError::NoData { request: req.to_string() })
//!     }
//! }
//! ```

pub mod alpaca_rest;
pub mod errors;

use async_trait::async_trait;
use reqwest::header::InvalidHeaderValue;
use shared_utils::env::EnvError;
use thiserror::Error;

use crate::models::{bar::BarRow, request::HistDataReq};

pub use errors::ProviderError;

/// Trait for fetching historical bars from a market data vendor.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Fetches every bar of `req`'s resolved range.
    ///
    /// Returns [`ProviderError::NoData`] when the vendor has nothing for the
    /// range; rows outside the range are never returned.
    async fn fetch_bars(&self, req: &HistDataReq) -> Result<Vec<BarRow>, ProviderError>;
}

/// Errors that can occur while constructing a broker adapter.
#[derive(Debug, Error)]
pub enum ProviderInitError {
    /// A required credential is not set.
    #[error("missing environment variable: {0}")]
    MissingEnvVar(#[from] EnvError),

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[from] reqwest::Error),

    /// A credential contains bytes that are not valid in an HTTP header.
    #[error("API key is not a valid header value")]
    InvalidApiKey(#[from] InvalidHeaderValue),
}
