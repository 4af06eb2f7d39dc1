use crate::domain::errors::PipelineError;
use chrono::{DateTime, Utc};

/// Engineered feature rows with their (optional) next-bucket targets
///
/// The final row normally has no target: it is the row scored at inference time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureFrame {
    pub feature_names: Vec<String>,
    pub target_name: String,
    pub timestamps: Vec<DateTime<Utc>>,
    pub rows: Vec<Vec<f64>>,
    pub targets: Vec<Option<f64>>,
}

impl FeatureFrame {
    pub fn width(&self) -> usize {
        self.feature_names.len()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Most recent feature row, regardless of whether its target is known
    pub fn latest_row(&self) -> Option<&[f64]> {
        self.rows.last().map(|r| r.as_slice())
    }

    /// Rows that have a known target, paired as (X, y)
    pub fn training_set(&self) -> Result<TrainingSet, PipelineError> {
        let mut features = Vec::with_capacity(self.rows.len());
        let mut targets = Vec::with_capacity(self.rows.len());
        let mut timestamps = Vec::with_capacity(self.rows.len());

        for ((row, target), ts) in self
            .rows
            .iter()
            .zip(self.targets.iter())
            .zip(self.timestamps.iter())
        {
            if let Some(y) = target {
                features.push(row.clone());
                targets.push(*y);
                timestamps.push(*ts);
            }
        }

        if features.is_empty() || targets.is_empty() {
            return Err(PipelineError::InsufficientData(format!(
                "No valid training rows after feature construction ({} candidate rows). Check data source or timeframe.",
                self.rows.len()
            )));
        }

        Ok(TrainingSet {
            feature_names: self.feature_names.clone(),
            target_name: self.target_name.clone(),
            timestamps,
            features,
            targets,
        })
    }
}

/// Supervised (X, y) pairs, one target per feature row
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSet {
    pub feature_names: Vec<String>,
    pub target_name: String,
    pub timestamps: Vec<DateTime<Utc>>,
    pub features: Vec<Vec<f64>>,
    pub targets: Vec<f64>,
}

impl TrainingSet {
    pub fn n_samples(&self) -> usize {
        self.features.len()
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }
}
