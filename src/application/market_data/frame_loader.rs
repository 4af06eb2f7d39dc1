//! Frame loading: turns any table that plausibly holds OHLC data into a
//! canonical, timestamp-indexed [`PriceTable`].

use crate::domain::errors::PipelineError;
use crate::domain::market::{PriceRow, PriceTable, RawFrame};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::debug;

/// Admissible timestamp columns, in order of preference
const TIMESTAMP_COLUMNS: [&str; 6] = [
    "timestamp",
    "date",
    "start_time",
    "open_time",
    "end_time",
    "close_time",
];

pub struct FrameLoader;

impl FrameLoader {
    /// Selects the OHLC columns, parses the timestamp, drops incomplete rows and sorts by time.
    ///
    /// Fails with `PipelineError::Schema` when no admissible timestamp column (or an OHLC
    /// column) exists. Individual unparseable cells only drop their row.
    pub fn load(frame: &RawFrame) -> Result<PriceTable, PipelineError> {
        let ts_idx = TIMESTAMP_COLUMNS
            .iter()
            .find_map(|name| frame.column_index(name))
            .ok_or_else(|| {
                PipelineError::Schema(format!(
                    "no timestamp column found; expected one of {:?}, got {:?}",
                    TIMESTAMP_COLUMNS, frame.columns
                ))
            })?;

        let mut ohlc_idx = [0usize; 4];
        for (slot, name) in ohlc_idx.iter_mut().zip(["open", "high", "low", "close"]) {
            *slot = frame
                .column_index(name)
                .ok_or_else(|| PipelineError::Schema(format!("missing '{}' column", name)))?;
        }

        let mut rows = Vec::with_capacity(frame.len());
        let mut dropped = 0usize;

        for record in &frame.rows {
            let parsed = record
                .get(ts_idx)
                .and_then(|cell| parse_timestamp(cell))
                .and_then(|timestamp| {
                    let mut values = [0.0f64; 4];
                    for (value, idx) in values.iter_mut().zip(ohlc_idx) {
                        *value = parse_number(record.get(idx)?)?;
                    }
                    Some(PriceRow::new(
                        timestamp, values[0], values[1], values[2], values[3],
                    ))
                });

            match parsed {
                Some(row) => rows.push(row),
                None => dropped += 1,
            }
        }

        if dropped > 0 {
            debug!(
                "FrameLoader: dropped {} incomplete rows out of {}",
                dropped,
                frame.len()
            );
        }

        Ok(PriceTable::from_rows(rows))
    }

    /// Same guarantees as [`FrameLoader::load`] for rows that are already typed
    pub fn load_rows(rows: Vec<PriceRow>) -> PriceTable {
        PriceTable::from_rows(
            rows.into_iter()
                .filter(|r| r.is_complete())
                .map(|r| PriceRow::new(r.timestamp, r.open, r.high, r.low, r.close))
                .collect(),
        )
    }
}

fn parse_number(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parses RFC 3339, `YYYY-MM-DD HH:MM:SS[.f]`, `YYYY-MM-DD` or a numeric epoch
pub fn parse_timestamp(cell: &str) -> Option<DateTime<Utc>> {
    let cell = cell.trim();
    if cell.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(cell) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(cell, fmt) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(cell, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|n| n.and_utc());
    }

    let epoch = cell
        .parse::<i64>()
        .ok()
        .or_else(|| cell.parse::<f64>().ok().filter(|v| v.is_finite()).map(|v| v as i64))?;
    epoch_to_datetime(epoch)
}

/// Interprets an epoch value by magnitude: seconds, milliseconds, microseconds or nanoseconds
pub fn epoch_to_datetime(epoch: i64) -> Option<DateTime<Utc>> {
    let magnitude = epoch.unsigned_abs();
    if magnitude >= 100_000_000_000_000_000 {
        Some(DateTime::from_timestamp_nanos(epoch))
    } else if magnitude >= 100_000_000_000_000 {
        DateTime::from_timestamp_micros(epoch)
    } else if magnitude >= 100_000_000_000 {
        DateTime::from_timestamp_millis(epoch)
    } else {
        DateTime::from_timestamp(epoch, 0)
    }
}
