//! SQLite-backed store.
//!
//! One connection behind a mutex; every call runs on the blocking pool.
//! Timestamps are fixed-width RFC-3339 text, so range filters compare strings.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bar_feed::{BarRow, SeriesKey, TimeRange, tz::to_rfc3339_millis};
use diesel::prelude::*;
use tracing::debug;

use crate::{
    block::MarketDataBlock,
    coverage::Coverage,
    db::{connection::connect_sqlite, migrate::run_sqlite},
    error::StoreError,
    models::{BarRecord, CoverageRecord, NewCoverage},
    schema::{bar_coverage, bars},
    store::{BarStore, rows_for_key},
};

/// [`BarStore`] persisting to a SQLite file.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<SqliteConnection>>,
    url: String,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").field("url", &self.url).finish()
    }
}

impl SqliteStore {
    /// Opens `url`, applying pending migrations first.
    pub fn open(url: &str) -> Result<Self, StoreError> {
        let open_err = |e: anyhow::Error| StoreError::Open {
            url: url.to_string(),
            message: format!("{e:#}"),
        };
        run_sqlite(url).map_err(open_err)?;
        let conn = connect_sqlite(url).map_err(open_err)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            url: url.to_string(),
        })
    }

    /// Database URL this store was opened with.
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| StoreError::Poisoned)?;
            f(&mut guard)
        })
        .await?
    }
}

fn upsert(conn: &mut SqliteConnection, key: &SeriesKey, rows: &[BarRow]) -> QueryResult<usize> {
    use crate::schema::bars::dsl as b;

    let mut written = 0;
    for row in rows {
        let record = BarRecord::from_row(key, row);
        let insert = diesel::insert_into(bars::table).values(&record);
        let conflict = insert.on_conflict((b::symbol, b::security_type, b::bar_size, b::ts));
        written += if row.populated() == 0 {
            conflict.do_nothing().execute(conn)?
        } else {
            conflict.do_update().set(&record).execute(conn)?
        };
    }
    Ok(written)
}

fn load_catalog(conn: &mut SqliteConnection, key: &SeriesKey) -> Result<Coverage, StoreError> {
    use crate::schema::bar_coverage::dsl as c;

    let records: Vec<CoverageRecord> = c::bar_coverage
        .filter(c::symbol.eq(&key.symbol))
        .filter(c::security_type.eq(key.security_type.as_str()))
        .filter(c::bar_size.eq(key.bar_size.to_string()))
        .select(CoverageRecord::as_select())
        .load(conn)?;
    let ranges = records
        .iter()
        .map(CoverageRecord::range)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Coverage::from_ranges(ranges))
}

/// Adds `range` and rewrites the series' rows as the merged catalog.
fn save_coverage(
    conn: &mut SqliteConnection,
    key: &SeriesKey,
    range: &TimeRange,
) -> Result<(), StoreError> {
    use crate::schema::bar_coverage::dsl as c;

    let mut catalog = load_catalog(conn, key)?;
    catalog.insert(*range);

    diesel::delete(
        c::bar_coverage
            .filter(c::symbol.eq(&key.symbol))
            .filter(c::security_type.eq(key.security_type.as_str()))
            .filter(c::bar_size.eq(key.bar_size.to_string())),
    )
    .execute(conn)?;
    let rows: Vec<NewCoverage<'_>> = catalog
        .ranges()
        .iter()
        .map(|r| NewCoverage::new(key, r))
        .collect();
    diesel::insert_into(bar_coverage::table)
        .values(&rows)
        .execute(conn)?;
    Ok(())
}

#[async_trait]
impl BarStore for SqliteStore {
    async fn query_range(
        &self,
        key: &SeriesKey,
        range: &TimeRange,
    ) -> Result<MarketDataBlock, StoreError> {
        let key = key.clone();
        let start = to_rfc3339_millis(range.start());
        let end = to_rfc3339_millis(range.end());
        self.with_conn(move |conn| {
            use crate::schema::bars::dsl as b;

            let records: Vec<BarRecord> = b::bars
                .filter(b::symbol.eq(&key.symbol))
                .filter(b::security_type.eq(key.security_type.as_str()))
                .filter(b::bar_size.eq(key.bar_size.to_string()))
                .filter(b::ts.ge(&start))
                .filter(b::ts.lt(&end))
                .order(b::ts.asc())
                .select(BarRecord::as_select())
                .load(conn)?;
            records
                .into_iter()
                .map(BarRecord::into_row)
                .collect::<Result<MarketDataBlock, _>>()
        })
        .await
    }

    async fn insert_rows(&self, key: &SeriesKey, rows: Vec<BarRow>) -> Result<usize, StoreError> {
        let key = key.clone();
        let rows = rows_for_key(&key, rows);
        self.with_conn(move |conn| {
            let written = conn.transaction(|conn| upsert(conn, &key, &rows))?;
            debug!(series = %key, written, "upserted bars");
            Ok(written)
        })
        .await
    }

    async fn query_catalog(&self, key: &SeriesKey) -> Result<Coverage, StoreError> {
        let key = key.clone();
        self.with_conn(move |conn| load_catalog(conn, &key)).await
    }

    async fn record_coverage(&self, key: &SeriesKey, range: &TimeRange) -> Result<(), StoreError> {
        let key = key.clone();
        let range = *range;
        self.with_conn(move |conn| {
            conn.transaction::<_, StoreError, _>(|conn| save_coverage(conn, &key, &range))
        })
        .await
    }

    async fn store_download(
        &self,
        key: &SeriesKey,
        range: &TimeRange,
        rows: Vec<BarRow>,
    ) -> Result<usize, StoreError> {
        let key = key.clone();
        let range = *range;
        let rows = rows_for_key(&key, rows);
        self.with_conn(move |conn| {
            let written = conn.transaction::<_, StoreError, _>(|conn| {
                let written = upsert(conn, &key, &rows)?;
                save_coverage(conn, &key, &range)?;
                Ok(written)
            })?;
            debug!(series = %key, %range, written, "stored download");
            Ok(written)
        })
        .await
    }
}
