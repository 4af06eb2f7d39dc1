use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamps at or beyond 2100-01-01T00:00:00Z are treated as corrupt, in milliseconds
pub const TIMESTAMP_CEILING_MS: i64 = 4_102_444_800_000;

/// Same ceiling expressed in microseconds (archive provider native units)
pub const TIMESTAMP_CEILING_US: i64 = TIMESTAMP_CEILING_MS * 1000;

/// One bucket's OHLC(V) observation
///
/// After resampling `timestamp` is the right edge of the bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRow {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: Option<f64>,
    pub trades: Option<u64>,
}

impl PriceRow {
    pub fn new(timestamp: DateTime<Utc>, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume: None,
            trades: None,
        }
    }

    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn ohlc(&self) -> [f64; 4] {
        [self.open, self.high, self.low, self.close]
    }

    pub fn is_complete(&self) -> bool {
        self.ohlc().iter().all(|v| v.is_finite())
    }
}

/// Time-indexed price history for one token, ascending by timestamp
///
/// Duplicate timestamps from overlapping fragments are kept in concatenation order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceTable {
    rows: Vec<PriceRow>,
}

impl PriceTable {
    /// Builds a table, sorting rows by timestamp. The sort is stable.
    pub fn from_rows(mut rows: Vec<PriceRow>) -> Self {
        rows.sort_by_key(|r| r.timestamp);
        Self { rows }
    }

    pub fn rows(&self) -> &[PriceRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<PriceRow> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.rows.first().map(|r| r.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.rows.last().map(|r| r.timestamp)
    }

    pub fn closes(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.close).collect()
    }
}

/// Untyped tabular data as read from a flat file: a header plus string cells
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFrame {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawFrame {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { columns, rows }
    }

    /// Position of a column, matched case-insensitively
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.trim().eq_ignore_ascii_case(name))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
