#![allow(dead_code)]

use std::{
    path::PathBuf,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration as StdDuration,
};

use async_trait::async_trait;
use bar_feed::{
    BarRow, Broker, HistDataReq, ProviderError, SecurityType, SeriesKey, TimeRange,
    TradingCalendar,
    tz::{local_midnight, parse_tz},
};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use diesel::QueryableByName;
use diesel::prelude::*;
use diesel::sql_types::{Integer, Text};
use hist_cache::{
    MarketDataBlock,
    csv_io::read_block_path,
    db::{connection, migrate},
};
use tempfile::TempDir;

#[derive(QueryableByName)]
struct JournalMode {
    #[diesel(sql_type = Text)]
    journal_mode: String,
}
#[derive(QueryableByName)]
struct ForeignKeys {
    #[diesel(sql_type = Integer)]
    foreign_keys: i32,
}
#[derive(QueryableByName)]
struct BusyTimeout {
    #[diesel(sql_type = Integer, column_name = "timeout")]
    busy_timeout: i32,
}

pub struct TestDb {
    _dir: TempDir,    // keep alive for the life of the test
    pub path: String, // <tmpdir>/test.db
}

/// Fresh temp database with migrations applied.
pub fn temp_db() -> TestDb {
    let dir = TempDir::new().expect("tempdir");
    let mut p = PathBuf::from(dir.path());
    p.push("test.db");
    let path = p.to_string_lossy().to_string();
    migrate::run_sqlite(&path).expect("migrations");
    TestDb { _dir: dir, path }
}

pub fn setup_db() -> (TestDb, SqliteConnection) {
    let db = temp_db();
    let conn = connection::connect_sqlite(&db.path).expect("connect");
    (db, conn)
}

pub fn assert_sqlite_pragmas(conn: &mut SqliteConnection) {
    use diesel::sql_query;

    let jm: JournalMode = sql_query("PRAGMA journal_mode;").get_result(conn).unwrap();
    assert_eq!(jm.journal_mode.to_lowercase(), "wal"); // WAL is persistent per DB file

    let fk: ForeignKeys = sql_query("PRAGMA foreign_keys;").get_result(conn).unwrap();
    assert_eq!(fk.foreign_keys, 1);

    let bt: BusyTimeout = sql_query("PRAGMA busy_timeout;").get_result(conn).unwrap();
    assert_eq!(bt.busy_timeout, 5000);
}

pub fn ny() -> Tz {
    parse_tz("America/New_York").unwrap()
}

/// Local midnight of 2017-`m`-`d` in New York, as UTC.
pub fn day(m: u32, d: u32) -> DateTime<Utc> {
    local_midnight(NaiveDate::from_ymd_opt(2017, m, d).unwrap(), ny()).unwrap()
}

pub fn range(a: DateTime<Utc>, b: DateTime<Utc>) -> TimeRange {
    TimeRange::between(a, b).unwrap()
}

pub fn gs_key() -> SeriesKey {
    SeriesKey::new("GS", SecurityType::Stock, "1h".parse().unwrap())
}

pub fn gs_req(duration: &str, end: &str) -> HistDataReq {
    HistDataReq::parse("Stock", "GS", "1h", duration, end, "America/New_York").unwrap()
}

/// GS hourly bars, 2017-08-30 through 2017-09-12.
pub fn gs_1h() -> MarketDataBlock {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/gs_1h.csv");
    read_block_path(path, ny()).expect("fixture")
}

/// Fixture rows whose New York date is one of `dates` (2017-09-`d`).
pub fn gs_1h_on(dates: &[u32]) -> Vec<BarRow> {
    gs_1h()
        .rows()
        .filter(|r| dates.iter().any(|d| range(day(9, *d), day(9, d + 1)).contains(r.timestamp)))
        .cloned()
        .collect()
}

/// Broker serving slices of a fixed block, counting calls.
pub struct FixtureBroker {
    data: MarketDataBlock,
    calendar: TradingCalendar,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    requests: Mutex<Vec<String>>,
    fail_ending: Option<DateTime<Utc>>,
    delay: Option<StdDuration>,
}

impl FixtureBroker {
    pub fn new(data: MarketDataBlock) -> Self {
        Self {
            data,
            calendar: TradingCalendar::us_federal(),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            fail_ending: None,
            delay: None,
        }
    }

    /// Requests ending at `end` fail with a connection error.
    pub fn failing_at(mut self, end: DateTime<Utc>) -> Self {
        self.fail_ending = Some(end);
        self
    }

    pub fn with_delay(mut self, delay: StdDuration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// `(duration, end)` of every request seen, sorted.
    pub fn windows(&self) -> Vec<(String, DateTime<Utc>)> {
        let mut out: Vec<(String, DateTime<Utc>)> = self
            .requests
            .lock()
            .unwrap()
            .iter()
            .map(|s| {
                let (dur, end) = s.split_once('@').unwrap();
                (dur.to_string(), end.parse().unwrap())
            })
            .collect();
        out.sort_by_key(|(_, end)| *end);
        out
    }
}

#[async_trait]
impl Broker for FixtureBroker {
    fn name(&self) -> &str {
        "fixture"
    }

    async fn fetch_bars(&self, req: &HistDataReq) -> Result<Vec<BarRow>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.requests.lock().unwrap().push(format!(
            "{}@{}",
            req.duration(),
            req.end().with_timezone(&Utc).to_rfc3339()
        ));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if Some(req.end().with_timezone(&Utc)) == self.fail_ending {
            return Err(ProviderError::Connection {
                message: "connection refused".into(),
            });
        }
        let range = req
            .resolve(&self.calendar)
            .map_err(|e| ProviderError::Validation(e.to_string()))?;
        let rows = self.data.slice(&range).into_rows();
        if rows.is_empty() {
            return Err(ProviderError::NoData {
                request: req.to_string(),
            });
        }
        Ok(rows)
    }
}
