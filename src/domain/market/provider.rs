use crate::domain::errors::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// External price data provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataProvider {
    /// Zipped daily kline archives plus the spot REST API for same-day rows
    Binance,
    /// JSON OHLC arrays from the CoinGecko API
    CoinGecko,
}

impl FromStr for DataProvider {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "binance" => Ok(DataProvider::Binance),
            "coingecko" => Ok(DataProvider::CoinGecko),
            _ => Err(PipelineError::Configuration(format!(
                "Unsupported data provider: {}. Must be 'binance' or 'coingecko'",
                s
            ))),
        }
    }
}

impl fmt::Display for DataProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataProvider::Binance => write!(f, "binance"),
            DataProvider::CoinGecko => write!(f, "coingecko"),
        }
    }
}

/// Binance region selector: `com` (global) or `us`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Region {
    Com,
    Us,
}

impl Region {
    pub fn api_base_url(&self) -> &'static str {
        match self {
            Region::Com => "https://api.binance.com",
            Region::Us => "https://api.binance.us",
        }
    }
}

impl FromStr for Region {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "com" | "global" => Ok(Region::Com),
            "us" => Ok(Region::Us),
            _ => Err(PipelineError::Configuration(format!(
                "Invalid REGION: {}. Must be 'com' or 'us'",
                s
            ))),
        }
    }
}
