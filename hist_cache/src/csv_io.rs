//! CSV import and export of market data blocks.
//!
//! Files written by different tools name their columns differently, so the
//! reader accepts the common aliases (`TickerTime`/`datetime`/`time`,
//! `opening`/`open`/`o`, ...). Unknown columns such as `DataType` are ignored.
//! Naive timestamps are read in the exchange zone; export writes timestamps
//! localized to a zone for presentation only.

use std::{fs::File, io, path::Path};

use bar_feed::{BarRow, BarSize, RequestError, tz::parse_local_ts};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::block::MarketDataBlock;

/// CSV read/write failure.
#[derive(Debug, Error)]
pub enum CsvError {
    /// File could not be opened or written.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Malformed CSV or a missing required column.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// A row whose bar size or timestamp does not parse.
    #[error("line {line}: {source}")]
    Row {
        /// 1-based line number in the file.
        line: u64,
        /// Parse error.
        #[source]
        source: RequestError,
    },
}

#[derive(Debug, Deserialize)]
struct CsvRecord {
    #[serde(alias = "Symbol", alias = "symb")]
    symbol: String,
    #[serde(alias = "BarSize", alias = "barsize", alias = "barSize")]
    bar_size: String,
    #[serde(alias = "TickerTime", alias = "datetime", alias = "time")]
    timestamp: String,
    #[serde(alias = "opening", alias = "o", default, deserialize_with = "csv::invalid_option")]
    open: Option<f64>,
    #[serde(alias = "h", default, deserialize_with = "csv::invalid_option")]
    high: Option<f64>,
    #[serde(alias = "l", default, deserialize_with = "csv::invalid_option")]
    low: Option<f64>,
    #[serde(alias = "closing", alias = "c", default, deserialize_with = "csv::invalid_option")]
    close: Option<f64>,
    #[serde(alias = "vol", alias = "v", default, deserialize_with = "csv::invalid_option")]
    volume: Option<i64>,
    #[serde(alias = "barcount", alias = "barCount", default, deserialize_with = "csv::invalid_option")]
    bar_count: Option<i64>,
    #[serde(alias = "wap", default, deserialize_with = "csv::invalid_option")]
    average: Option<f64>,
}

impl CsvRecord {
    fn into_row(self, tz: Tz) -> Result<BarRow, RequestError> {
        let bar_size: BarSize = self.bar_size.parse()?;
        let ts = parse_local_ts(&self.timestamp, tz)?;
        let mut row = BarRow::new(self.symbol.trim().to_uppercase(), bar_size, ts);
        row.open = self.open;
        row.high = self.high;
        row.low = self.low;
        row.close = self.close;
        row.volume = self.volume;
        row.bar_count = self.bar_count;
        row.average = self.average;
        Ok(row)
    }
}

#[derive(Debug, Serialize)]
struct CsvOut<'a> {
    symbol: &'a str,
    bar_size: String,
    time: String,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    volume: Option<i64>,
    bar_count: Option<i64>,
    average: Option<f64>,
}

/// Reads a block from CSV. Duplicate keys are resolved with the merge rule.
pub fn read_block<R: io::Read>(reader: R, tz: Tz) -> Result<MarketDataBlock, CsvError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = rdr.headers()?.clone();

    let mut block = MarketDataBlock::new();
    let mut raw = csv::StringRecord::new();
    while rdr.read_record(&mut raw)? {
        let line = raw.position().map_or(0, |p| p.line());
        let record: CsvRecord = raw.deserialize(Some(&headers))?;
        let row = record
            .into_row(tz)
            .map_err(|source| CsvError::Row { line, source })?;
        block.insert(row);
    }
    Ok(block)
}

/// [`read_block`] from a file.
pub fn read_block_path(path: impl AsRef<Path>, tz: Tz) -> Result<MarketDataBlock, CsvError> {
    read_block(File::open(path)?, tz)
}

/// Writes `block` as CSV with timestamps shown in `tz`.
pub fn write_block<W: io::Write>(
    block: &MarketDataBlock,
    writer: W,
    tz: Tz,
) -> Result<(), CsvError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in block.rows() {
        wtr.serialize(CsvOut {
            symbol: &row.symbol,
            bar_size: row.bar_size.to_string(),
            time: row
                .timestamp
                .with_timezone(&tz)
                .format("%Y-%m-%d %H:%M:%S%:z")
                .to_string(),
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
            bar_count: row.bar_count,
            average: row.average,
        })?;
    }
    wtr.flush()?;
    Ok(())
}

/// [`write_block`] to a file, replacing it.
pub fn write_block_path(
    block: &MarketDataBlock,
    path: impl AsRef<Path>,
    tz: Tz,
) -> Result<(), CsvError> {
    write_block(block, File::create(path)?, tz)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bar_feed::{Column, tz::parse_tz};
    use chrono::{TimeZone, Utc};

    fn ny() -> Tz {
        parse_tz("America/New_York").unwrap()
    }

    #[test]
    fn reads_aliased_headers_and_skips_unknown_columns() {
        let text = "\
symb,DataType,barSize,datetime,open,closing,vol
gs,TRADES,1 hour,2017-09-05 09:00:00,140.0,141.5,1200
gs,TRADES,1 hour,2017-09-05 10:00:00,,142.0,
";
        let block = read_block(text.as_bytes(), ny()).unwrap();
        let rows = block.into_rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].symbol, "GS");
        assert_eq!(rows[0].bar_size.to_string(), "1h");
        assert_eq!(
            rows[0].timestamp,
            Utc.with_ymd_and_hms(2017, 9, 5, 13, 0, 0).unwrap()
        );
        assert_eq!(rows[0].open, Some(140.0));
        assert_eq!(rows[0].volume, Some(1200));
        assert_eq!(rows[1].open, None);
        assert_eq!(rows[1].volume, None);
        assert!(!rows[1].is_set(Column::High));
    }

    #[test]
    fn bad_timestamp_reports_its_line() {
        let text = "Symbol,BarSize,TickerTime,close\nGS,1h,2017-09-05 09:00:00,1\nGS,1h,yesterday,2\n";
        let err = read_block(text.as_bytes(), ny()).unwrap_err();
        assert!(matches!(err, CsvError::Row { line: 3, .. }), "{err}");
    }

    #[test]
    fn missing_time_column_is_a_csv_error() {
        let text = "Symbol,BarSize,close\nGS,1h,1\n";
        assert!(matches!(
            read_block(text.as_bytes(), ny()),
            Err(CsvError::Csv(_))
        ));
    }

    #[test]
    fn export_localizes_and_leaves_absent_fields_empty() {
        let block = MarketDataBlock::from_rows([BarRow::new(
            "GS",
            "1h".parse().unwrap(),
            Utc.with_ymd_and_hms(2017, 9, 5, 13, 0, 0).unwrap(),
        )
        .with_close(141.5)]);
        let mut out = Vec::new();
        write_block(&block, &mut out, ny()).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "symbol,bar_size,time,open,high,low,close,volume,bar_count,average"
        );
        assert_eq!(lines[1], "GS,1h,2017-09-05 09:00:00-04:00,,,,141.5,,,");

        let back = read_block(text.as_bytes(), ny()).unwrap();
        assert_eq!(back, block);
    }
}
