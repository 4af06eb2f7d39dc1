//! Binance daily kline archives
//!
//! Each fragment is one zipped CSV of 1-minute klines. Older archives carry
//! millisecond timestamps and newer ones microseconds; some have a header
//! row and some do not.

use crate::application::market_data::frame_loader::epoch_to_datetime;
use crate::domain::errors::PipelineError;
use crate::domain::market::price::TIMESTAMP_CEILING_US;
use crate::domain::market::{DataProvider, PriceRow};
use crate::domain::ml::feature_registry::pair_symbol;
use crate::domain::ports::RawFeedAdapter;
use std::fs;
use std::io::{Cursor, Read};
use std::path::PathBuf;
use tracing::debug;
use zip::ZipArchive;

/// Positional schema of the first 11 archive columns
pub const ARCHIVE_COLUMNS: [&str; 11] = [
    "start_time",
    "open",
    "high",
    "low",
    "close",
    "volume",
    "end_time",
    "volume_usd",
    "n_trades",
    "taker_volume",
    "taker_volume_usd",
];

const END_TIME: usize = 6;
const N_TRADES: usize = 8;

/// Header row present when the first line starts with `open_time`
pub fn detect_header(buffer: &str) -> bool {
    buffer
        .lines()
        .next()
        .is_some_and(|line| line.trim_start().starts_with("open_time"))
}

fn parse_epoch(cell: &str) -> Option<i64> {
    let cell = cell.trim();
    cell.parse::<i64>()
        .ok()
        .or_else(|| cell.parse::<f64>().ok().filter(|v| v.is_finite()).map(|v| v as i64))
}

/// Parses kline CSV text, indexing rows by bucket start time.
///
/// Rows with fewer than 11 columns or unparseable cells are skipped. Rows whose
/// end time is at or beyond 2100-01-01 (in microseconds) are corrupt and dropped.
pub fn parse_kline_csv(buffer: &str) -> Result<Vec<PriceRow>, PipelineError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(detect_header(buffer))
        .flexible(true)
        .from_reader(buffer.as_bytes());

    let mut rows = Vec::new();
    let mut beyond_ceiling = 0usize;
    let mut malformed = 0usize;

    for record in reader.records() {
        let record = record?;
        if record.len() < ARCHIVE_COLUMNS.len() {
            malformed += 1;
            continue;
        }

        let Some(end_time) = parse_epoch(&record[END_TIME]) else {
            malformed += 1;
            continue;
        };
        if end_time >= TIMESTAMP_CEILING_US {
            beyond_ceiling += 1;
            continue;
        }

        let parsed = (|| {
            let timestamp = epoch_to_datetime(parse_epoch(&record[0])?)?;
            let mut ohlcv = [0.0f64; 5];
            for (slot, cell) in ohlcv.iter_mut().zip(record.iter().skip(1)) {
                *slot = cell.trim().parse::<f64>().ok().filter(|v| v.is_finite())?;
            }
            let mut row = PriceRow::new(timestamp, ohlcv[0], ohlcv[1], ohlcv[2], ohlcv[3])
                .with_volume(ohlcv[4]);
            row.trades = record[N_TRADES].trim().parse::<u64>().ok();
            Some(row)
        })();

        match parsed {
            Some(row) => rows.push(row),
            None => malformed += 1,
        }
    }

    if beyond_ceiling > 0 || malformed > 0 {
        debug!(
            "Binance archive: kept {} rows, dropped {} beyond 2100 and {} malformed",
            rows.len(),
            beyond_ceiling,
            malformed
        );
    }
    Ok(rows)
}

/// Reads the first file of a kline zip
pub fn parse_archive(bytes: &[u8]) -> Result<Vec<PriceRow>, PipelineError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    if archive.is_empty() {
        return Ok(Vec::new());
    }

    let mut buffer = String::new();
    archive.by_index(0)?.read_to_string(&mut buffer)?;
    parse_kline_csv(&buffer)
}

/// Daily archives stored as `<dir>/<PAIR>-1m-<date>.zip`
pub struct ArchiveFeedAdapter {
    data_dir: PathBuf,
}

impl ArchiveFeedAdapter {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }
}

impl RawFeedAdapter for ArchiveFeedAdapter {
    fn provider(&self) -> DataProvider {
        DataProvider::Binance
    }

    fn list_fragments(&self, token: &str) -> Result<Vec<String>, PipelineError> {
        let prefix = format!("{}-", pair_symbol(token));
        let entries = match fs::read_dir(&self.data_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut fragments = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.starts_with(&prefix) && name.ends_with(".zip") {
                fragments.push(path.to_string_lossy().into_owned());
            }
        }
        fragments.sort();
        Ok(fragments)
    }

    fn normalize(&self, fragment: &str) -> Result<Vec<PriceRow>, PipelineError> {
        let bytes = fs::read(fragment)?;
        parse_archive(&bytes)
    }
}
