use crate::domain::errors::PipelineError;
use crate::domain::market::price::TIMESTAMP_CEILING_MS;
use crate::domain::market::{DataProvider, PriceRow};
use crate::domain::ports::RawFeedAdapter;
use chrono::DateTime;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// Parses an OHLC payload: `[[timestamp_ms, open, high, low, close], ...]`.
///
/// Entries that are not 5 numbers, or that lie at or beyond 2100-01-01, are dropped.
pub fn parse_ohlc(bytes: &[u8]) -> Result<Vec<PriceRow>, PipelineError> {
    let entries: Vec<serde_json::Value> = serde_json::from_slice(bytes)?;
    let total = entries.len();

    let rows: Vec<PriceRow> = entries
        .iter()
        .filter_map(|entry| {
            let values: Vec<f64> = entry
                .as_array()?
                .iter()
                .map(|v| v.as_f64())
                .collect::<Option<_>>()?;
            if values.len() < 5 || !values.iter().all(|v| v.is_finite()) {
                return None;
            }

            let ts_ms = values[0] as i64;
            if ts_ms >= TIMESTAMP_CEILING_MS {
                return None;
            }
            let timestamp = DateTime::from_timestamp_millis(ts_ms)?;
            Some(PriceRow::new(timestamp, values[1], values[2], values[3], values[4]))
        })
        .collect();

    if rows.len() < total {
        debug!("CoinGecko: dropped {} of {} OHLC entries", total - rows.len(), total);
    }
    Ok(rows)
}

/// JSON downloads stored as `<dir>/<TOKEN>_<date>_<days>d.json`
pub struct CoinGeckoFeedAdapter {
    data_dir: PathBuf,
}

impl CoinGeckoFeedAdapter {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }
}

impl RawFeedAdapter for CoinGeckoFeedAdapter {
    fn provider(&self) -> DataProvider {
        DataProvider::CoinGecko
    }

    fn list_fragments(&self, token: &str) -> Result<Vec<String>, PipelineError> {
        let prefix = format!("{}_", token.to_uppercase());
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
            if name.starts_with(&prefix) && name.ends_with(".json") {
                fragments.push(path.to_string_lossy().into_owned());
            }
        }
        fragments.sort();
        Ok(fragments)
    }

    fn normalize(&self, fragment: &str) -> Result<Vec<PriceRow>, PipelineError> {
        parse_ohlc(&fs::read(fragment)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ceiling_is_exclusive() {
        let payload = br#"[
            [1735689600000, 3300.0, 3310.0, 3290.0, 3305.0],
            [4102444799999, 1.0, 1.0, 1.0, 1.0],
            [4102444800000, 1.0, 1.0, 1.0, 1.0],
            [1735691400000, "x", 1.0, 1.0, 1.0],
            [1735693200000, 1.0, 1.0]
        ]"#;

        let rows = parse_ohlc(payload).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].close, 3305.0);
        assert_eq!(rows[1].timestamp.timestamp_millis(), 4_102_444_799_999);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(matches!(parse_ohlc(b"{oops"), Err(PipelineError::Json(_))));
    }
}
