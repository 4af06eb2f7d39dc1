//! Data provider configuration parsing from environment variables.

use super::EnvLookup;
use crate::domain::market::{DataProvider, Region};
use anyhow::{Context, Result};
use std::str::FromStr;

pub const DEFAULT_BINANCE_ARCHIVE_URL: &str = "https://data.binance.vision";
pub const DEFAULT_COINGECKO_API_URL: &str = "https://api.coingecko.com";

/// Where price history comes from and how to reach it
#[derive(Debug, Clone)]
pub struct ProviderEnvConfig {
    pub provider: DataProvider,
    pub region: Region,
    pub coingecko_api_key: String,
    pub binance_archive_url: String,
    pub binance_api_url: String,
    pub coingecko_api_url: String,
}

impl Default for ProviderEnvConfig {
    fn default() -> Self {
        Self {
            provider: DataProvider::Binance,
            region: Region::Com,
            coingecko_api_key: String::new(),
            binance_archive_url: DEFAULT_BINANCE_ARCHIVE_URL.to_string(),
            binance_api_url: Region::Com.api_base_url().to_string(),
            coingecko_api_url: DEFAULT_COINGECKO_API_URL.to_string(),
        }
    }
}

impl ProviderEnvConfig {
    pub fn from_lookup(lookup: EnvLookup) -> Result<Self> {
        let provider_str = lookup("DATA_PROVIDER").unwrap_or_else(|| "binance".to_string());
        let provider = DataProvider::from_str(&provider_str).context("Invalid DATA_PROVIDER")?;

        let region_str = lookup("REGION").unwrap_or_else(|| "com".to_string());
        let region = Region::from_str(&region_str).context("Invalid REGION")?;

        Ok(Self {
            provider,
            region,
            coingecko_api_key: lookup("CG_API_KEY").unwrap_or_default(),
            binance_archive_url: lookup("BINANCE_ARCHIVE_URL")
                .unwrap_or_else(|| DEFAULT_BINANCE_ARCHIVE_URL.to_string()),
            binance_api_url: lookup("BINANCE_API_URL")
                .unwrap_or_else(|| region.api_base_url().to_string()),
            coingecko_api_url: lookup("COINGECKO_API_URL")
                .unwrap_or_else(|| DEFAULT_COINGECKO_API_URL.to_string()),
        })
    }
}
