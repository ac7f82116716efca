//! Request model, duration resolution and broker adapters for historical bars.
//!
//! The crate is the "feed" side of the cache: it knows how to describe a
//! historical data request ([`models::request::HistDataReq`]), how to turn the
//! symbolic lookback into an absolute [`models::range::TimeRange`]
//! ([`resolve::resolve`]), and how to talk to a broker ([`providers::Broker`]).
//! Storage, reconciliation and merging live in the `hist_cache` crate.

pub mod calendar;
pub mod errors;
pub mod models;
pub mod providers;
pub mod resolve;
pub mod tz;

pub use calendar::TradingCalendar;
pub use errors::RequestError;
pub use models::{
    bar::{BarRow, Column},
    bar_size::{BarClass, BarSize, BarUnit},
    lookback::{Lookback, LookbackUnit},
    range::TimeRange,
    request::{HistDataReq, SeriesKey},
    security::SecurityType,
};
pub use providers::{Broker, errors::ProviderError};
