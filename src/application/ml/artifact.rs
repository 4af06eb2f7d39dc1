use crate::application::ml::regressors::FittedEstimator;
use crate::application::ml::scaler::StandardScaler;
use crate::domain::errors::PipelineError;
use crate::domain::market::Timeframe;
use crate::domain::ml::{FeatureLayout, ModelKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Everything inference needs to reproduce training-time features and predict
///
/// Persisted as a single JSON document; the estimator, the scaler and the
/// feature layout always travel together.
#[derive(Debug, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub kind: ModelKind,
    pub timeframe: Timeframe,
    pub layout: FeatureLayout,
    pub feature_names: Vec<String>,
    /// Present only for strategies trained on standardized features
    pub scaler: Option<StandardScaler>,
    pub estimator: FittedEstimator,
    pub trained_at: DateTime<Utc>,
    pub training_rows: usize,
}

impl ModelArtifact {
    pub fn width(&self) -> usize {
        self.feature_names.len()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, PipelineError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PipelineError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
