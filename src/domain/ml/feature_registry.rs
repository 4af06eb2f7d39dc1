use crate::domain::ml::model_kind::ModelKind;
use serde::{Deserialize, Serialize};

/// OHLC field order shared by every layout.
/// Any change here is a breaking change for persisted models.
pub const OHLC_FIELDS: [&str; 4] = ["open", "high", "low", "close"];

pub const HOUR_OF_DAY: &str = "hour_of_day";

/// Exchange pair name for a token, e.g. `ETH` -> `ETHUSDT`
pub fn pair_symbol(token: &str) -> String {
    format!("{}USDT", token.to_uppercase())
}

/// Column layout of a feature vector
///
/// Training and inference both derive their column list from the layout
/// stored in the model artifact, so the order cannot drift between them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "layout", rename_all = "snake_case")]
pub enum FeatureLayout {
    /// Current bucket's open, high, low, close
    Simple,
    /// `lag_depth` lags of each OHLC field for the primary then the reference token, then hour of day
    Lagged {
        lag_depth: usize,
        primary: String,
        reference: String,
    },
}

impl FeatureLayout {
    pub fn for_model(kind: ModelKind, token: &str, reference: &str, lag_depth: usize) -> Self {
        if kind.uses_lagged_features() {
            FeatureLayout::Lagged {
                lag_depth,
                primary: token.to_uppercase(),
                reference: reference.to_uppercase(),
            }
        } else {
            FeatureLayout::Simple
        }
    }

    /// Number of feature columns; `4 * L * 2 + 1` for the lagged layout
    pub fn width(&self) -> usize {
        match self {
            FeatureLayout::Simple => OHLC_FIELDS.len(),
            FeatureLayout::Lagged { lag_depth, .. } => OHLC_FIELDS.len() * lag_depth * 2 + 1,
        }
    }

    pub fn feature_names(&self) -> Vec<String> {
        match self {
            FeatureLayout::Simple => OHLC_FIELDS.iter().map(|f| f.to_string()).collect(),
            FeatureLayout::Lagged {
                lag_depth,
                primary,
                reference,
            } => {
                let mut names = Vec::with_capacity(self.width());
                for token in [primary, reference] {
                    let pair = pair_symbol(token);
                    for field in OHLC_FIELDS {
                        for lag in 1..=*lag_depth {
                            names.push(format!("{}_{}_lag{}", field, pair, lag));
                        }
                    }
                }
                names.push(HOUR_OF_DAY.to_string());
                names
            }
        }
    }

    pub fn target_name(&self) -> String {
        match self {
            FeatureLayout::Simple => "target".to_string(),
            FeatureLayout::Lagged { primary, .. } => format!("target_{}", pair_symbol(primary)),
        }
    }

    /// Tokens whose price history the layout needs, primary first
    pub fn tokens<'a>(&'a self, primary_token: &'a str) -> Vec<&'a str> {
        match self {
            FeatureLayout::Simple => vec![primary_token],
            FeatureLayout::Lagged {
                primary, reference, ..
            } => vec![primary.as_str(), reference.as_str()],
        }
    }

    /// Buckets of history that must precede a complete feature row
    pub fn warmup_buckets(&self) -> usize {
        match self {
            FeatureLayout::Simple => 0,
            FeatureLayout::Lagged { lag_depth, .. } => *lag_depth,
        }
    }
}
