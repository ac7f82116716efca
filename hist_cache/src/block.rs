//! Market data blocks and the merge engine.
//!
//! A [`MarketDataBlock`] holds at most one [`BarRow`] per
//! `(symbol, bar_size, timestamp)` key, ordered by that key. Merging two blocks
//! keeps, per key, the row with more populated columns. The whole row wins;
//! fields are never mixed across rows. Equal column counts fall back to a total
//! order over the row values, so merge is a pointwise maximum: associative,
//! commutative and idempotent.

use std::{
    cmp::Ordering,
    collections::{BTreeMap, BTreeSet, btree_map::Entry},
};

use bar_feed::{BarRow, BarSize, Column, TimeRange};
use chrono::{DateTime, Utc};

type RowKey = (String, BarSize, DateTime<Utc>);

/// Ordered, de-duplicated collection of bars.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketDataBlock {
    rows: BTreeMap<RowKey, BarRow>,
}

impl MarketDataBlock {
    /// Empty block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a block, resolving duplicate keys with the merge rule.
    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = BarRow>,
    {
        let mut block = Self::new();
        block.extend(rows);
        block
    }

    /// Inserts one row, keeping the richer row on a key collision.
    pub fn insert(&mut self, row: BarRow) {
        let row = row.normalized();
        let key = (row.symbol.clone(), row.bar_size, row.timestamp);
        match self.rows.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(row);
            }
            Entry::Occupied(mut slot) => {
                if prefer(&row, slot.get()) == Ordering::Greater {
                    slot.insert(row);
                }
            }
        }
    }

    /// Merges `other` into `self`.
    pub fn merge(mut self, other: MarketDataBlock) -> MarketDataBlock {
        if self.rows.len() < other.rows.len() {
            return other.merge(self);
        }
        self.extend(other.rows.into_values());
        self
    }

    /// Merges any number of blocks.
    pub fn merge_all<I>(blocks: I) -> MarketDataBlock
    where
        I: IntoIterator<Item = MarketDataBlock>,
    {
        blocks
            .into_iter()
            .fold(MarketDataBlock::new(), MarketDataBlock::merge)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the block holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows in key order.
    pub fn rows(&self) -> impl Iterator<Item = &BarRow> {
        self.rows.values()
    }

    /// Consumes the block, yielding rows in key order.
    pub fn into_rows(self) -> Vec<BarRow> {
        self.rows.into_values().collect()
    }

    /// Union of the columns populated in any row.
    pub fn columns(&self) -> BTreeSet<Column> {
        self.rows.values().flat_map(BarRow::columns).collect()
    }

    /// `(symbol, bar_size)` pairs present in the block.
    pub fn series(&self) -> BTreeSet<(String, BarSize)> {
        self.rows
            .keys()
            .map(|(symbol, bar_size, _)| (symbol.clone(), *bar_size))
            .collect()
    }

    /// Timestamps in key order (repeats across series).
    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.rows.keys().map(|(_, _, ts)| *ts).collect()
    }

    /// Rows whose timestamp falls inside `range`.
    pub fn slice(&self, range: &TimeRange) -> MarketDataBlock {
        let rows = self
            .rows
            .iter()
            .filter(|((_, _, ts), _)| range.contains(*ts))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        MarketDataBlock { rows }
    }
}

impl Extend<BarRow> for MarketDataBlock {
    fn extend<I: IntoIterator<Item = BarRow>>(&mut self, iter: I) {
        for row in iter {
            self.insert(row);
        }
    }
}

impl FromIterator<BarRow> for MarketDataBlock {
    fn from_iter<I: IntoIterator<Item = BarRow>>(iter: I) -> Self {
        Self::from_rows(iter)
    }
}

impl IntoIterator for MarketDataBlock {
    type Item = BarRow;
    type IntoIter = std::collections::btree_map::IntoValues<RowKey, BarRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_values()
    }
}

/// Total order deciding which of two same-key rows survives a merge.
fn prefer(a: &BarRow, b: &BarRow) -> Ordering {
    a.populated()
        .cmp(&b.populated())
        .then_with(|| cmp_f64(a.close, b.close))
        .then_with(|| cmp_f64(a.open, b.open))
        .then_with(|| cmp_f64(a.high, b.high))
        .then_with(|| cmp_f64(a.low, b.low))
        .then_with(|| a.volume.cmp(&b.volume))
        .then_with(|| a.bar_count.cmp(&b.bar_count))
        .then_with(|| cmp_f64(a.average, b.average))
}

fn cmp_f64(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        _ => a.is_some().cmp(&b.is_some()),
    }
}
