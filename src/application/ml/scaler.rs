use crate::domain::errors::PipelineError;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Per-column standardization fitted on the training matrix
///
/// Uses the population standard deviation; constant columns get a scale of 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(x: &Array2<f64>) -> Result<Self, PipelineError> {
        let mean: Array1<f64> = x
            .mean_axis(Axis(0))
            .ok_or_else(|| PipelineError::InsufficientData("cannot fit scaler on zero rows".into()))?;
        let std = x.std_axis(Axis(0), 0.0);

        Ok(Self {
            mean: mean.to_vec(),
            scale: std
                .iter()
                .map(|&s| if s > 0.0 && s.is_finite() { s } else { 1.0 })
                .collect(),
        })
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>, PipelineError> {
        if x.ncols() != self.mean.len() {
            return Err(PipelineError::Shape {
                expected: self.mean.len(),
                actual: x.ncols(),
            });
        }

        let mut out = x.clone();
        for mut row in out.rows_mut() {
            for (j, value) in row.iter_mut().enumerate() {
                *value = (*value - self.mean[j]) / self.scale[j];
            }
        }
        Ok(out)
    }
}
