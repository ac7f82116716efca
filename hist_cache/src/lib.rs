//! Historical bar cache.
//!
//! Serves historical bar requests from a local store and downloads only the
//! ranges that are missing. The moving parts:
//! - [`coverage`]: which ranges of a series are known to be stored
//! - [`reconcile`]: requested range minus coverage, re-expressed as broker requests
//! - [`block`]: ordered, de-duplicated bar collections and their merge rule
//! - [`orchestrator`]: the [`HistDataService`] tying broker, store and planner together
//! - [`store`]: the [`BarStore`] trait with in-memory and SQLite backends

#![warn(missing_docs)]

pub mod block;
pub mod config;
pub mod coverage;
pub mod csv_io;
pub mod db;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod providers;
pub mod reconcile;
pub mod schema;
pub mod store;

pub use block::MarketDataBlock;
pub use coverage::Coverage;
pub use error::{HistDataError, StoreError};
pub use orchestrator::HistDataService;
pub use reconcile::{DownloadPlan, Reconciliation, SubRequest, plan_downloads, reconcile};
pub use store::{BarStore, MemoryStore, SqliteStore};
