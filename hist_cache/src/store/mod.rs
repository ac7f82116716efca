//! Bar storage behind one capability trait.
//!
//! [`BarStore`] is what the service needs from persistence: range reads,
//! idempotent upserts and a coverage catalog per series. [`MemoryStore`] keeps
//! everything in process; [`SqliteStore`] persists through diesel.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use bar_feed::{BarRow, SeriesKey, TimeRange};
use tracing::warn;

use crate::{block::MarketDataBlock, coverage::Coverage, error::StoreError};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Persistence used by [`HistDataService`](crate::orchestrator::HistDataService).
#[async_trait]
pub trait BarStore: Send + Sync {
    /// Rows of `key` with timestamps in `range`, ascending.
    async fn query_range(
        &self,
        key: &SeriesKey,
        range: &TimeRange,
    ) -> Result<MarketDataBlock, StoreError>;

    /// Upserts `rows` under `key`. An existing row keeps the columns the
    /// incoming row leaves empty. Returns the number of rows written.
    async fn insert_rows(&self, key: &SeriesKey, rows: Vec<BarRow>) -> Result<usize, StoreError>;

    /// Ranges of `key` recorded as fully stored.
    async fn query_catalog(&self, key: &SeriesKey) -> Result<Coverage, StoreError>;

    /// Marks `range` of `key` as fully stored.
    async fn record_coverage(&self, key: &SeriesKey, range: &TimeRange) -> Result<(), StoreError>;

    /// Inserts a download and records its range. Backends that can do both
    /// atomically override this.
    async fn store_download(
        &self,
        key: &SeriesKey,
        range: &TimeRange,
        rows: Vec<BarRow>,
    ) -> Result<usize, StoreError> {
        let written = self.insert_rows(key, rows).await?;
        self.record_coverage(key, range).await?;
        Ok(written)
    }
}

/// Drops rows that do not belong to `key` and normalizes the rest.
pub(crate) fn rows_for_key(key: &SeriesKey, rows: Vec<BarRow>) -> Vec<BarRow> {
    let before = rows.len();
    let kept: Vec<BarRow> = rows
        .into_iter()
        .filter(|r| r.symbol == key.symbol && r.bar_size == key.bar_size)
        .map(BarRow::normalized)
        .collect();
    if kept.len() != before {
        warn!(series = %key, dropped = before - kept.len(), "rows for another series ignored");
    }
    kept
}
