//! The cache service: plan, download what is missing, store, merge, serve.
//!
//! [`HistDataService::get_hist_data`] holds a per-series lock while planning
//! and downloading, so two concurrent callers asking for the same series never
//! both fetch the same gap; the second one finds it covered. Planned downloads
//! run through a bounded stream. Each job is spawned when the stream first
//! polls it: dropping the caller's future stops jobs that have not started and
//! lets started ones finish their fetch and insert. A failed job stops new
//! jobs, and the call waits for running ones before it reports the failure,
//! so the series lock is never released under a write in progress.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use bar_feed::{Broker, HistDataReq, ProviderError, SeriesKey, TradingCalendar};
use futures::{StreamExt, stream};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, instrument, warn};

use crate::{
    block::MarketDataBlock,
    error::HistDataError,
    reconcile::{DownloadPlan, SubRequest, plan_downloads},
    store::BarStore,
};

/// Concurrent broker calls per request unless configured otherwise.
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

type KeyLocks = Mutex<HashMap<SeriesKey, Arc<AsyncMutex<()>>>>;

/// Serves historical bars from storage, downloading gaps on demand.
pub struct HistDataService {
    broker: Arc<dyn Broker>,
    store: Arc<dyn BarStore>,
    calendar: Arc<TradingCalendar>,
    max_concurrency: usize,
    plan_locks: KeyLocks,
    write_locks: KeyLocks,
}

impl HistDataService {
    pub fn new(broker: Arc<dyn Broker>, store: Arc<dyn BarStore>, calendar: TradingCalendar) -> Self {
        Self {
            broker,
            store,
            calendar: Arc::new(calendar),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            plan_locks: Mutex::default(),
            write_locks: Mutex::default(),
        }
    }

    /// Caps concurrent broker calls per request. Zero is treated as one.
    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n.max(1);
        self
    }

    pub fn calendar(&self) -> &TradingCalendar {
        &self.calendar
    }

    pub fn store(&self) -> &Arc<dyn BarStore> {
        &self.store
    }

    /// Dry run: what [`get_hist_data`](Self::get_hist_data) would download.
    pub async fn plan(&self, req: &HistDataReq) -> Result<DownloadPlan, HistDataError> {
        let (plan, _) = self.plan_with_cached(req).await?;
        Ok(plan)
    }

    /// Rows of `req`'s resolved range, downloading and storing any part that
    /// is not cached yet.
    #[instrument(skip(self, req), fields(req = %req))]
    pub async fn get_hist_data(&self, req: &HistDataReq) -> Result<MarketDataBlock, HistDataError> {
        let key = req.series_key();
        let lock = key_lock(&self.plan_locks, &key);
        let _guard = lock.lock().await;

        let (plan, cached) = self.plan_with_cached(req).await?;
        for range in &plan.non_trading {
            self.store.record_coverage(&key, range).await?;
        }
        if plan.is_fully_cached() {
            debug!(rows = cached.len(), "served from cache");
            return Ok(cached.slice(&plan.requested));
        }

        let downloaded = self.fetch_and_store(&plan).await?;
        // upserts fill columns, so the stored rows are the answer a repeat gets
        let served = self.store.query_range(&key, &plan.requested).await?;
        info!(
            rows = served.len(),
            downloaded = downloaded.len(),
            downloads = plan.sub_requests.len(),
            "served with downloads"
        );
        Ok(served)
    }

    /// Runs every sub-request of `plan`, storing each download before it is
    /// merged into the result. After the first failure no further job starts;
    /// jobs already running finish and stay stored before the error returns.
    pub async fn fetch_and_store(&self, plan: &DownloadPlan) -> Result<MarketDataBlock, HistDataError> {
        let key = plan.request.series_key();
        let write_lock = key_lock(&self.write_locks, &key);

        let failed = Arc::new(AtomicBool::new(false));

        let jobs = plan.sub_requests.iter().cloned().map(|sub| {
            let broker = Arc::clone(&self.broker);
            let store = Arc::clone(&self.store);
            let write_lock = Arc::clone(&write_lock);
            let failed = Arc::clone(&failed);
            async move {
                if failed.load(Ordering::Acquire) {
                    return None;
                }
                Some(tokio::spawn(fetch_one(broker, store, write_lock, sub)).await)
            }
        });
        let mut results = stream::iter(jobs).buffer_unordered(self.max_concurrency);

        let mut blocks = Vec::with_capacity(plan.sub_requests.len());
        let mut first_err = None;
        while let Some(joined) = results.next().await {
            let Some(joined) = joined else { continue };
            match joined.map_err(|e| HistDataError::JobAborted(e.to_string())).and_then(|r| r) {
                Ok(block) => blocks.push(block),
                Err(e) => {
                    failed.store(true, Ordering::Release);
                    if first_err.is_none() {
                        warn!(error = %e, "download failed, draining running jobs");
                        first_err = Some(e);
                    }
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(MarketDataBlock::merge_all(blocks)),
        }
    }

    async fn plan_with_cached(
        &self,
        req: &HistDataReq,
    ) -> Result<(DownloadPlan, MarketDataBlock), HistDataError> {
        let key = req.series_key();
        let requested = req.resolve(&self.calendar)?;
        let cached = self.store.query_range(&key, &requested).await?;
        let catalog = self
            .store
            .query_catalog(&key)
            .await?
            .with_unrecorded_rows(cached.rows(), req.tz())?;

        let plan = plan_downloads(req, requested, &catalog, &self.calendar)?;
        debug!(%requested, cached = cached.len(), %catalog, "planned");
        Ok((plan, cached))
    }
}

fn key_lock(locks: &KeyLocks, key: &SeriesKey) -> Arc<AsyncMutex<()>> {
    let mut map = locks.lock().unwrap_or_else(PoisonError::into_inner);
    Arc::clone(map.entry(key.clone()).or_default())
}

async fn fetch_one(
    broker: Arc<dyn Broker>,
    store: Arc<dyn BarStore>,
    write_lock: Arc<AsyncMutex<()>>,
    sub: SubRequest,
) -> Result<MarketDataBlock, HistDataError> {
    let rows = match broker.fetch_bars(&sub.request).await {
        Ok(rows) => rows,
        Err(ProviderError::NoData { .. }) => {
            info!(request = %sub.request, range = %sub.range, "no data, recording as covered");
            Vec::new()
        }
        Err(source) => {
            return Err(HistDataError::DownloadFailed {
                request: Box::new(sub.request),
                range: sub.range,
                source,
            });
        }
    };

    let block = MarketDataBlock::from_rows(rows);
    let key = sub.request.series_key();
    {
        let _w = write_lock.lock().await;
        store
            .store_download(&key, &sub.range, block.rows().cloned().collect())
            .await?;
    }
    info!(
        broker = broker.name(),
        request = %sub.request,
        rows = block.len(),
        "downloaded and stored"
    );
    Ok(block)
}
