//! Binance price history source
//!
//! Provides:
//! - Daily 1-minute kline archives from the public data mirror (training)
//! - Recent 1-minute klines from the spot REST API (inference)

use crate::domain::errors::PipelineError;
use crate::domain::market::PriceRow;
use crate::domain::ml::feature_registry::pair_symbol;
use crate::domain::ports::PriceHistorySource;
use crate::infrastructure::core::{HttpClientFactory, build_url_with_query};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use reqwest::StatusCode;
use reqwest_middleware::ClientWithMiddleware;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const KLINES_PAGE_LIMIT: usize = 1000;

pub struct BinanceHistorySource {
    client: ClientWithMiddleware,
    archive_url: String,
    api_url: String,
    data_dir: PathBuf,
}

impl BinanceHistorySource {
    pub fn builder() -> BinanceHistorySourceBuilder {
        BinanceHistorySourceBuilder::default()
    }

    /// Archive location for one pair and day
    pub fn archive_path(data_dir: &Path, pair: &str, date: NaiveDate) -> PathBuf {
        data_dir.join(format!("{}-1m-{}.zip", pair, date.format("%Y-%m-%d")))
    }

    fn archive_url(&self, pair: &str, date: NaiveDate) -> String {
        format!(
            "{}/data/spot/daily/klines/{}/1m/{}-1m-{}.zip",
            self.archive_url.trim_end_matches('/'),
            pair,
            pair,
            date.format("%Y-%m-%d")
        )
    }

    /// Downloads one day; `None` when the archive is not published (yet)
    async fn download_day(&self, pair: &str, date: NaiveDate) -> Result<Option<PathBuf>, PipelineError> {
        let path = Self::archive_path(&self.data_dir, pair, date);
        if path.exists() {
            debug!("BinanceHistorySource: {:?} already present", path);
            return Ok(None);
        }

        let url = self.archive_url(pair, date);
        let response = self.client.get(&url).send().await?;

        if !archive_published(response.status(), &url)? {
            debug!("BinanceHistorySource: no archive at {}", url);
            return Ok(None);
        }

        let bytes = response.bytes().await?;
        tokio::fs::write(&path, &bytes).await?;
        Ok(Some(path))
    }

    async fn fetch_klines_page(
        &self,
        pair: &str,
        end_time_ms: i64,
        limit: usize,
    ) -> Result<Vec<PriceRow>, PipelineError> {
        let url = build_url_with_query(
            &format!("{}/api/v3/klines", self.api_url.trim_end_matches('/')),
            &[
                ("symbol", pair.to_string()),
                ("interval", "1m".to_string()),
                ("endTime", end_time_ms.to_string()),
                ("limit", limit.to_string()),
            ],
        )?;

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(PipelineError::pipeline(format!(
                "Binance klines fetch failed ({}): {}",
                status, error_text
            )));
        }

        let klines: Vec<serde_json::Value> = response.json().await?;
        Ok(parse_klines(&klines))
    }
}

/// `Ok(false)` for a day that is not published; any other failure aborts the download
fn archive_published(status: StatusCode, url: &str) -> Result<bool, PipelineError> {
    if status == StatusCode::NOT_FOUND {
        return Ok(false);
    }
    if !status.is_success() {
        return Err(PipelineError::pipeline(format!(
            "Binance archive download failed for {} ({})",
            url, status
        )));
    }
    Ok(true)
}

/// Binance klines format: [open_time, open, high, low, close, volume, close_time, quote_volume, trades, ...]
pub fn parse_klines(klines: &[serde_json::Value]) -> Vec<PriceRow> {
    klines
        .iter()
        .filter_map(|k| {
            let arr = k.as_array()?;
            if arr.len() < 6 {
                return None;
            }

            let timestamp = DateTime::from_timestamp_millis(arr[0].as_i64()?)?;
            let num = |i: usize| -> Option<f64> {
                let v = &arr[i];
                v.as_str()
                    .and_then(|s| s.parse::<f64>().ok())
                    .or_else(|| v.as_f64())
            };

            let mut row = PriceRow::new(timestamp, num(1)?, num(2)?, num(3)?, num(4)?)
                .with_volume(num(5)?);
            row.trades = arr.get(8).and_then(|v| v.as_u64());
            Some(row)
        })
        .collect()
}

#[async_trait]
impl PriceHistorySource for BinanceHistorySource {
    async fn download_history(&self, token: &str, days: u32) -> Result<Vec<String>, PipelineError> {
        let pair = pair_symbol(token);
        tokio::fs::create_dir_all(&self.data_dir).await?;

        // Archives exist only for completed days
        let today = Utc::now().date_naive();
        let mut files = Vec::new();
        for offset in (1..=i64::from(days)).rev() {
            let date = today - Duration::days(offset);
            if let Some(path) = self.download_day(&pair, date).await? {
                files.push(path.to_string_lossy().into_owned());
            }
        }

        info!(
            "BinanceHistorySource: downloaded {} new archives for {}",
            files.len(),
            pair
        );
        Ok(files)
    }

    async fn fetch_recent(&self, token: &str, lookback_minutes: usize) -> Result<Vec<PriceRow>, PipelineError> {
        let pair = pair_symbol(token);
        let mut end_time_ms = Utc::now().timestamp_millis();
        let mut remaining = lookback_minutes.max(1);
        let mut rows: Vec<PriceRow> = Vec::with_capacity(remaining);

        // Pages are walked backwards from now
        while remaining > 0 {
            let limit = remaining.min(KLINES_PAGE_LIMIT);
            let page = self.fetch_klines_page(&pair, end_time_ms, limit).await?;
            let Some(first) = page.first() else { break };

            end_time_ms = first.timestamp.timestamp_millis() - 1;
            remaining = remaining.saturating_sub(page.len());
            let short_page = page.len() < limit;
            let mut older = page;
            older.append(&mut rows);
            rows = older;
            if short_page {
                break;
            }
        }

        debug!(
            "BinanceHistorySource: fetched {} recent klines for {}",
            rows.len(),
            pair
        );
        Ok(rows)
    }
}

pub struct BinanceHistorySourceBuilder {
    client: Option<ClientWithMiddleware>,
    archive_url: String,
    api_url: String,
    data_dir: PathBuf,
}

impl Default for BinanceHistorySourceBuilder {
    fn default() -> Self {
        Self {
            client: None,
            archive_url: "https://data.binance.vision".to_string(),
            api_url: "https://api.binance.com".to_string(),
            data_dir: PathBuf::from("data/binance"),
        }
    }
}

impl BinanceHistorySourceBuilder {
    pub fn client(mut self, client: ClientWithMiddleware) -> Self {
        self.client = Some(client);
        self
    }

    pub fn archive_url(mut self, archive_url: String) -> Self {
        self.archive_url = archive_url;
        self
    }

    pub fn api_url(mut self, api_url: String) -> Self {
        self.api_url = api_url;
        self
    }

    pub fn data_dir(mut self, data_dir: PathBuf) -> Self {
        self.data_dir = data_dir;
        self
    }

    pub fn build(self) -> BinanceHistorySource {
        BinanceHistorySource {
            client: self.client.unwrap_or_else(HttpClientFactory::create_client),
            archive_url: self.archive_url,
            api_url: self.api_url,
            data_dir: self.data_dir,
        }
    }
}
