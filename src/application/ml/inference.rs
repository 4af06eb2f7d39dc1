use crate::application::ml::artifact::ModelArtifact;
use crate::application::ml::feature_builder::{FeatureBuilder, MarketHistory};
use crate::application::ml::regressors::Regressor;
use crate::application::ml::trainer::to_matrix;
use crate::domain::errors::PipelineError;
use tracing::debug;

/// Scores fresh feature vectors against a persisted model
pub struct InferenceEngine;

impl InferenceEngine {
    /// Predicts from one feature vector in the artifact's column order.
    ///
    /// The vector must match the training width exactly; the stored scaler
    /// (if any) is applied before the estimator sees it.
    pub fn score(artifact: &ModelArtifact, features: &[f64]) -> Result<f64, PipelineError> {
        if features.len() != artifact.width() {
            return Err(PipelineError::Shape {
                expected: artifact.width(),
                actual: features.len(),
            });
        }

        let mut x = to_matrix(&[features.to_vec()], artifact.width())?;
        if let Some(scaler) = &artifact.scaler {
            x = scaler.transform(&x)?;
        }

        artifact
            .estimator
            .predict(&x)?
            .first()
            .copied()
            .ok_or_else(|| PipelineError::pipeline("No prediction returned"))
    }

    /// Rebuilds features from `history` with the artifact's layout and scores the newest row
    pub fn predict_latest(
        artifact: &ModelArtifact,
        history: &MarketHistory,
    ) -> Result<f64, PipelineError> {
        let builder = FeatureBuilder::new(artifact.layout.clone(), artifact.timeframe);
        let frame = builder.build(history)?;

        let latest = frame.latest_row().ok_or_else(|| {
            PipelineError::InsufficientData(format!(
                "{} rows of recent history produce no complete {} feature row",
                history.primary.len(),
                artifact.timeframe
            ))
        })?;

        if let Some(ts) = frame.timestamps.last() {
            debug!("InferenceEngine: scoring bucket {}", ts);
        }
        Self::score(artifact, latest)
    }
}
