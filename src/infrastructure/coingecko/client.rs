use super::adapter::parse_ohlc;
use crate::domain::errors::PipelineError;
use crate::domain::market::PriceRow;
use crate::domain::ports::PriceHistorySource;
use crate::infrastructure::core::{HttpClientFactory, build_url_with_query};
use async_trait::async_trait;
use chrono::Utc;
use reqwest_middleware::ClientWithMiddleware;
use std::path::PathBuf;
use tracing::info;

/// CoinGecko coin id for a token symbol
pub fn coin_id(token: &str) -> Result<&'static str, PipelineError> {
    match token.to_uppercase().as_str() {
        "ETH" => Ok("ethereum"),
        "BTC" => Ok("bitcoin"),
        "SOL" => Ok("solana"),
        "BNB" => Ok("binancecoin"),
        "ARB" => Ok("arbitrum"),
        other => Err(PipelineError::Configuration(format!(
            "Unsupported token for CoinGecko: {}",
            other
        ))),
    }
}

pub struct CoinGeckoHistorySource {
    client: ClientWithMiddleware,
    api_url: String,
    api_key: String,
    data_dir: PathBuf,
}

impl CoinGeckoHistorySource {
    pub fn new(api_url: String, api_key: String, data_dir: PathBuf) -> Self {
        Self {
            client: HttpClientFactory::create_client(),
            api_url,
            api_key,
            data_dir,
        }
    }

    fn ohlc_url(&self, token: &str, days: u32) -> Result<String, PipelineError> {
        build_url_with_query(
            &format!(
                "{}/api/v3/coins/{}/ohlc",
                self.api_url.trim_end_matches('/'),
                coin_id(token)?
            ),
            &[("vs_currency", "usd".to_string()), ("days", days.to_string())],
        )
    }

    async fn fetch_ohlc(&self, token: &str, days: u32) -> Result<Vec<u8>, PipelineError> {
        let response = self
            .client
            .get(self.ohlc_url(token, days)?)
            .header("accept", "application/json")
            .header("x-cg-demo-api-key", &self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(PipelineError::pipeline(format!(
                "CoinGecko OHLC fetch failed ({}): {}",
                status, error_text
            )));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl PriceHistorySource for CoinGeckoHistorySource {
    async fn download_history(&self, token: &str, days: u32) -> Result<Vec<String>, PipelineError> {
        let body = self.fetch_ohlc(token, days).await?;
        // Reject payloads that would not normalize before they land on disk
        parse_ohlc(&body)?;

        tokio::fs::create_dir_all(&self.data_dir).await?;
        let path = self.data_dir.join(format!(
            "{}_{}_{}d.json",
            token.to_uppercase(),
            Utc::now().format("%Y-%m-%d"),
            days
        ));
        tokio::fs::write(&path, &body).await?;

        info!("CoinGeckoHistorySource: saved {:?}", path);
        Ok(vec![path.to_string_lossy().into_owned()])
    }

    async fn fetch_recent(&self, token: &str, lookback_minutes: usize) -> Result<Vec<PriceRow>, PipelineError> {
        let days = lookback_minutes.div_ceil(24 * 60).max(1);
        let days = u32::try_from(days).unwrap_or(u32::MAX);
        parse_ohlc(&self.fetch_ohlc(token, days).await?)
    }
}
