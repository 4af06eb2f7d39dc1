use super::Regressor;
use crate::domain::errors::PipelineError;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linear::linear_regression::{
    LinearRegression, LinearRegressionParameters, LinearRegressionSolverName,
};
use std::fmt;

type SmartcoreOls = LinearRegression<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// Ordinary least squares with intercept, solved by SVD
#[derive(Serialize, Deserialize)]
pub struct OlsModel {
    n_features: usize,
    model: SmartcoreOls,
}

impl fmt::Debug for OlsModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OlsModel")
            .field("n_features", &self.n_features)
            .finish_non_exhaustive()
    }
}

pub(crate) fn to_dense(x: &Array2<f64>) -> Result<DenseMatrix<f64>, PipelineError> {
    let rows: Vec<Vec<f64>> = x.rows().into_iter().map(|r| r.to_vec()).collect();
    DenseMatrix::from_2d_vec(&rows)
        .map_err(|e| PipelineError::pipeline(format!("Matrix creation failed: {}", e)))
}

impl OlsModel {
    pub fn fit(x: &Array2<f64>, y: &[f64]) -> Result<Self, PipelineError> {
        let matrix = to_dense(x)?;
        let params = LinearRegressionParameters::default()
            .with_solver(LinearRegressionSolverName::SVD);
        let model = LinearRegression::fit(&matrix, &y.to_vec(), params)
            .map_err(|e| PipelineError::pipeline(format!("OLS fit failed: {}", e)))?;

        Ok(Self {
            n_features: x.ncols(),
            model,
        })
    }
}

impl Regressor for OlsModel {
    fn predict(&self, x: &Array2<f64>) -> Result<Vec<f64>, PipelineError> {
        let matrix = to_dense(x)?;
        self.model
            .predict(&matrix)
            .map_err(|e| PipelineError::pipeline(format!("Prediction failed: {}", e)))
    }

    fn n_features(&self) -> usize {
        self.n_features
    }
}
