//! Configuration module for the forecasting worker.
//!
//! Loaded once at process start from environment variables, organized by
//! concern: data Provider, Model strategy and HTTP Server. Unknown provider
//! or model names fail here, before any data is touched.

mod model_config;
mod provider_config;
mod server_config;

pub use model_config::ModelEnvConfig;
pub use provider_config::ProviderEnvConfig;
pub use server_config::ServerEnvConfig;

use crate::domain::market::Timeframe;
use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Variable lookup used by every sub-config; `std::env` in production
pub type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

#[derive(Debug, Clone)]
pub struct Config {
    /// Token being forecast, upper-cased
    pub token: String,
    pub timeframe: Timeframe,
    pub training_days: u32,
    pub data_base_path: PathBuf,
    pub model_file_path: PathBuf,

    pub provider: ProviderEnvConfig,
    pub model: ModelEnvConfig,
    pub server: ServerEnvConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&|key| env::var(key).ok().filter(|v| !v.trim().is_empty()))
    }

    pub fn from_lookup(lookup: EnvLookup) -> Result<Self> {
        let token = lookup("TOKEN")
            .unwrap_or_else(|| "ETH".to_string())
            .trim()
            .to_uppercase();
        if token.is_empty() {
            anyhow::bail!("TOKEN must not be empty");
        }

        let timeframe_str = lookup("TIMEFRAME").unwrap_or_else(|| "1h".to_string());
        let timeframe = Timeframe::from_str(&timeframe_str).context("Invalid TIMEFRAME")?;

        let training_days = match lookup("TRAINING_DAYS") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|d| *d > 0)
                .with_context(|| {
                    format!("Invalid TRAINING_DAYS: {}. Must be a positive integer", raw)
                })?,
            None => 30,
        };

        let provider = ProviderEnvConfig::from_lookup(lookup).context("Failed to load provider config")?;
        let model = ModelEnvConfig::from_lookup(lookup).context("Failed to load model config")?;
        let server = ServerEnvConfig::from_lookup(lookup);

        let data_base_path = PathBuf::from(lookup("DATA_BASE_PATH").unwrap_or_else(|| "data".to_string()));
        let model_file_path = lookup("MODEL_FILE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_base_path.join("model.json"));

        Ok(Self {
            token,
            timeframe,
            training_days,
            data_base_path,
            model_file_path,
            provider,
            model,
            server,
        })
    }

    pub fn binance_data_path(&self) -> PathBuf {
        self.data_base_path.join("binance")
    }

    pub fn coingecko_data_path(&self) -> PathBuf {
        self.data_base_path.join("coingecko")
    }

    /// Canonical price table location for one token
    pub fn price_table_path(&self, token: &str) -> PathBuf {
        price_table_path(&self.data_base_path, token)
    }

    pub fn feature_dataset_path(&self) -> PathBuf {
        self.data_base_path.join("lagged_features.csv")
    }
}

pub fn price_table_path(base: &Path, token: &str) -> PathBuf {
    base.join(format!("price_data_{}.csv", token.to_uppercase()))
}
