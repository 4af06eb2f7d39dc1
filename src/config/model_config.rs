//! Model strategy configuration parsing from environment variables.

use super::EnvLookup;
use crate::domain::ml::ModelKind;
use anyhow::{Context, Result};
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct ModelEnvConfig {
    pub kind: ModelKind,
    /// Lags per OHLC field for the lagged multi-asset layout
    pub lag_depth: usize,
    pub reference_token: String,
}

impl Default for ModelEnvConfig {
    fn default() -> Self {
        Self {
            kind: ModelKind::LinearRegression,
            lag_depth: 10,
            reference_token: "BTC".to_string(),
        }
    }
}

impl ModelEnvConfig {
    pub fn from_lookup(lookup: EnvLookup) -> Result<Self> {
        let kind_str = lookup("MODEL").unwrap_or_else(|| "LinearRegression".to_string());
        let kind = ModelKind::from_str(&kind_str).context("Invalid MODEL")?;

        let lag_depth = match lookup("LAG_DEPTH") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|l| *l > 0)
                .with_context(|| format!("Invalid LAG_DEPTH: {}. Must be a positive integer", raw))?,
            None => 10,
        };

        Ok(Self {
            kind,
            lag_depth,
            reference_token: lookup("REFERENCE_TOKEN")
                .unwrap_or_else(|| "BTC".to_string())
                .trim()
                .to_uppercase(),
        })
    }
}
