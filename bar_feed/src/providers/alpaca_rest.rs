//! Alpaca market-data REST adapter (`/v2/stocks/bars`).

pub mod params;
pub mod provider;
pub mod response;

pub use params::{AlpacaBarsParams, Feed};
pub use provider::{AlpacaOptions, AlpacaProvider};
