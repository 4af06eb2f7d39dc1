use crate::application::market_data::frame_loader::parse_timestamp;
use crate::application::ml::artifact::ModelArtifact;
use crate::application::ml::regressors::FittedEstimator;
use crate::application::ml::scaler::StandardScaler;
use crate::domain::errors::PipelineError;
use crate::domain::market::{RawFrame, Timeframe};
use crate::domain::ml::{FeatureLayout, ModelKind, TrainingSet};
use chrono::Utc;
use ndarray::Array2;
use tracing::info;

/// Row-major feature rows into a dense matrix of the given width
pub fn to_matrix(rows: &[Vec<f64>], width: usize) -> Result<Array2<f64>, PipelineError> {
    if let Some(bad) = rows.iter().find(|r| r.len() != width) {
        return Err(PipelineError::Shape {
            expected: width,
            actual: bad.len(),
        });
    }
    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    Array2::from_shape_vec((rows.len(), width), flat)
        .map_err(|e| PipelineError::pipeline(format!("feature matrix: {}", e)))
}

/// Reads a persisted feature dataset back into (X, y), selecting columns by name
pub fn training_set_from_frame(
    frame: &RawFrame,
    layout: &FeatureLayout,
) -> Result<TrainingSet, PipelineError> {
    let feature_names = layout.feature_names();
    let target_name = layout.target_name();

    let mut indices = Vec::with_capacity(feature_names.len());
    for name in &feature_names {
        indices.push(frame.column_index(name).ok_or_else(|| {
            PipelineError::Schema(format!("feature dataset is missing column '{}'", name))
        })?);
    }
    let target_idx = frame.column_index(&target_name).ok_or_else(|| {
        PipelineError::Schema(format!("feature dataset is missing column '{}'", target_name))
    })?;
    let ts_idx = frame
        .column_index("timestamp")
        .ok_or_else(|| PipelineError::Schema("feature dataset has no timestamp column".into()))?;

    let mut set = TrainingSet {
        feature_names,
        target_name,
        timestamps: Vec::with_capacity(frame.len()),
        features: Vec::with_capacity(frame.len()),
        targets: Vec::with_capacity(frame.len()),
    };

    for record in &frame.rows {
        let parsed = (|| {
            let ts = parse_timestamp(record.get(ts_idx)?)?;
            let target = record.get(target_idx)?.trim().parse::<f64>().ok()?;
            let features = indices
                .iter()
                .map(|&i| record.get(i)?.trim().parse::<f64>().ok())
                .collect::<Option<Vec<f64>>>()?;
            Some((ts, features, target))
        })();

        if let Some((ts, features, target)) = parsed {
            set.timestamps.push(ts);
            set.features.push(features);
            set.targets.push(target);
        }
    }

    if set.features.is_empty() {
        return Err(PipelineError::InsufficientData(
            "feature dataset has no complete rows".into(),
        ));
    }
    Ok(set)
}

/// Fits one strategy on a training set and packages the result as an artifact
pub struct ModelTrainer {
    kind: ModelKind,
    layout: FeatureLayout,
    timeframe: Timeframe,
}

impl ModelTrainer {
    pub fn new(kind: ModelKind, layout: FeatureLayout, timeframe: Timeframe) -> Self {
        Self {
            kind,
            layout,
            timeframe,
        }
    }

    pub fn train(&self, set: &TrainingSet) -> Result<ModelArtifact, PipelineError> {
        if set.n_samples() == 0 || set.targets.len() != set.n_samples() {
            return Err(PipelineError::InsufficientData(format!(
                "cannot train on {} feature rows and {} targets",
                set.n_samples(),
                set.targets.len()
            )));
        }
        if set.feature_names != self.layout.feature_names() {
            return Err(PipelineError::Shape {
                expected: self.layout.width(),
                actual: set.n_features(),
            });
        }

        let mut x = to_matrix(&set.features, self.layout.width())?;
        info!(
            "ModelTrainer: fitting {} on {} rows x {} features",
            self.kind,
            x.nrows(),
            x.ncols()
        );

        let scaler = if self.kind.uses_scaler() {
            let scaler = StandardScaler::fit(&x)?;
            x = scaler.transform(&x)?;
            Some(scaler)
        } else {
            None
        };

        let estimator = FittedEstimator::fit(self.kind, &x, &set.targets)?;

        Ok(ModelArtifact {
            kind: self.kind,
            timeframe: self.timeframe,
            layout: self.layout.clone(),
            feature_names: set.feature_names.clone(),
            scaler,
            estimator,
            trained_at: Utc::now(),
            training_rows: set.n_samples(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn simple_set(n: usize) -> TrainingSet {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let features: Vec<Vec<f64>> = (0..n)
            .map(|i| {
                let t = i as f64;
                vec![t, t + 1.0 + (t * 0.5).sin(), t - 1.0 + (t * 0.3).cos(), t + 0.5]
            })
            .collect();
        TrainingSet {
            feature_names: FeatureLayout::Simple.feature_names(),
            target_name: "target".into(),
            timestamps: (0..n).map(|i| base + Duration::hours(i as i64)).collect(),
            targets: features.iter().map(|r| r[3] + 1.0).collect(),
            features,
        }
    }

    #[test]
    fn test_trains_every_simple_strategy() {
        let set = simple_set(40);
        for kind in [
            ModelKind::LinearRegression,
            ModelKind::Svr,
            ModelKind::KernelRidge,
            ModelKind::BayesianRidge,
        ] {
            let trainer = ModelTrainer::new(kind, FeatureLayout::Simple, Timeframe::OneHour);
            let artifact = trainer.train(&set).unwrap();
            assert_eq!(artifact.kind, kind);
            assert_eq!(artifact.estimator.kind(), kind);
            assert_eq!(artifact.training_rows, 40);
            assert!(artifact.scaler.is_none());
        }
    }

    #[test]
    fn test_layout_mismatch_is_rejected() {
        let set = simple_set(10);
        let layout = FeatureLayout::Lagged {
            lag_depth: 1,
            primary: "ETH".into(),
            reference: "BTC".into(),
        };
        let trainer = ModelTrainer::new(ModelKind::Knn, layout, Timeframe::OneHour);
        assert!(matches!(
            trainer.train(&set),
            Err(PipelineError::Shape { expected: 9, actual: 4 })
        ));
    }

    #[test]
    fn test_dataset_frame_round_trip_selects_named_columns() {
        let frame = RawFrame::new(
            vec![
                "timestamp".into(),
                "close".into(),
                "open".into(),
                "high".into(),
                "low".into(),
                "target".into(),
            ],
            vec![
                vec![
                    "2024-01-01T00:00:00Z".into(),
                    "4".into(),
                    "1".into(),
                    "2".into(),
                    "3".into(),
                    "5".into(),
                ],
                vec!["2024-01-01T01:00:00Z".into(), "x".into(), "1".into(), "2".into(), "3".into(), "5".into()],
            ],
        );

        let set = training_set_from_frame(&frame, &FeatureLayout::Simple).unwrap();
        assert_eq!(set.features, vec![vec![1.0, 2.0, 3.0, 4.0]]);
        assert_eq!(set.targets, vec![5.0]);
    }
}
