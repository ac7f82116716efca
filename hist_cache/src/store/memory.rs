//! In-process store for tests and dry runs.

use std::{
    collections::{BTreeMap, HashMap},
    sync::RwLock,
};

use async_trait::async_trait;
use bar_feed::{BarRow, SeriesKey, TimeRange};
use chrono::{DateTime, Utc};

use crate::{
    block::MarketDataBlock,
    coverage::Coverage,
    error::StoreError,
    store::{BarStore, rows_for_key},
};

#[derive(Debug, Default)]
struct Series {
    rows: BTreeMap<DateTime<Utc>, BarRow>,
    coverage: Coverage,
}

/// [`BarStore`] backed by a map. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    series: RwLock<HashMap<SeriesKey, Series>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total rows across all series.
    pub fn row_count(&self) -> Result<usize, StoreError> {
        let map = self.series.read().map_err(|_| StoreError::Poisoned)?;
        Ok(map.values().map(|s| s.rows.len()).sum())
    }
}

fn fill(existing: &mut BarRow, incoming: BarRow) {
    macro_rules! take {
        ($($field:ident),*) => {
            $(if incoming.$field.is_some() { existing.$field = incoming.$field; })*
        };
    }
    take!(open, high, low, close, volume, bar_count, average);
}

#[async_trait]
impl BarStore for MemoryStore {
    async fn query_range(
        &self,
        key: &SeriesKey,
        range: &TimeRange,
    ) -> Result<MarketDataBlock, StoreError> {
        let map = self.series.read().map_err(|_| StoreError::Poisoned)?;
        Ok(map
            .get(key)
            .map(|s| {
                s.rows
                    .range(range.start()..range.end())
                    .map(|(_, row)| row.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn insert_rows(&self, key: &SeriesKey, rows: Vec<BarRow>) -> Result<usize, StoreError> {
        let rows = rows_for_key(key, rows);
        let written = rows.len();
        let mut map = self.series.write().map_err(|_| StoreError::Poisoned)?;
        let series = map.entry(key.clone()).or_default();
        for row in rows {
            match series.rows.get_mut(&row.timestamp) {
                Some(existing) => fill(existing, row),
                None => {
                    series.rows.insert(row.timestamp, row);
                }
            }
        }
        Ok(written)
    }

    async fn query_catalog(&self, key: &SeriesKey) -> Result<Coverage, StoreError> {
        let map = self.series.read().map_err(|_| StoreError::Poisoned)?;
        Ok(map.get(key).map(|s| s.coverage.clone()).unwrap_or_default())
    }

    async fn record_coverage(&self, key: &SeriesKey, range: &TimeRange) -> Result<(), StoreError> {
        let mut map = self.series.write().map_err(|_| StoreError::Poisoned)?;
        map.entry(key.clone()).or_default().coverage.insert(*range);
        Ok(())
    }
}
