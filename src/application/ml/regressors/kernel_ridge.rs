use super::Regressor;
use crate::application::ml::linalg;
use crate::domain::errors::PipelineError;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Kernel ridge regression with a linear kernel and no intercept
///
/// With a linear kernel the dual solution `(XXᵀ + αI)⁻¹ y` and the primal
/// weights `(XᵀX + αI)⁻¹ Xᵀ y` give the same predictions, so the smaller
/// `p × p` system is solved and only the weights are stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelRidgeModel {
    pub alpha: f64,
    pub weights: Vec<f64>,
}

impl KernelRidgeModel {
    pub fn fit(x: &Array2<f64>, y: &[f64]) -> Result<Self, PipelineError> {
        Self::fit_with(x, y, 1.0)
    }

    pub fn fit_with(x: &Array2<f64>, y: &[f64], alpha: f64) -> Result<Self, PipelineError> {
        if x.nrows() != y.len() {
            return Err(PipelineError::Shape {
                expected: x.nrows(),
                actual: y.len(),
            });
        }

        let y = Array1::from(y.to_vec());
        let mut gram = x.t().dot(x);
        for i in 0..gram.nrows() {
            gram[[i, i]] += alpha;
        }
        let weights = linalg::solve_symmetric(&gram, &x.t().dot(&y))?;

        Ok(Self {
            alpha,
            weights: weights.to_vec(),
        })
    }
}

impl Regressor for KernelRidgeModel {
    fn predict(&self, x: &Array2<f64>) -> Result<Vec<f64>, PipelineError> {
        Ok(x.dot(&Array1::from(self.weights.clone())).to_vec())
    }

    fn n_features(&self) -> usize {
        self.weights.len()
    }
}
