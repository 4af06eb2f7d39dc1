//! Bayesian ridge regression
//!
//! Evidence maximisation over the noise precision `α` and the weight
//! precision `λ`, both with Gamma(1e-6, 1e-6) hyper-priors. Data is centred
//! so the intercept falls out of the column means.

use super::Regressor;
use crate::application::ml::linalg;
use crate::domain::errors::PipelineError;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct BayesianRidgeParameters {
    pub max_iter: usize,
    pub tol: f64,
    pub alpha_1: f64,
    pub alpha_2: f64,
    pub lambda_1: f64,
    pub lambda_2: f64,
}

impl Default for BayesianRidgeParameters {
    fn default() -> Self {
        Self {
            max_iter: 300,
            tol: 1e-3,
            alpha_1: 1e-6,
            alpha_2: 1e-6,
            lambda_1: 1e-6,
            lambda_2: 1e-6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BayesianRidgeModel {
    pub coef: Vec<f64>,
    pub intercept: f64,
    /// Estimated noise precision
    pub alpha: f64,
    /// Estimated weight precision
    pub lambda: f64,
}

struct Posterior {
    coef: Array1<f64>,
    trace_inv: f64,
}

/// Posterior mean `(XᵀX + (λ/α) I)⁻¹ Xᵀy` and the trace of the inverse
fn posterior(
    xtx: &Array2<f64>,
    xty: &Array1<f64>,
    alpha: f64,
    lambda: f64,
) -> Result<Posterior, PipelineError> {
    let mut m = xtx.clone();
    for i in 0..m.nrows() {
        m[[i, i]] += lambda / alpha;
    }
    let inv = linalg::inverse_symmetric(&m)?;
    Ok(Posterior {
        coef: inv.dot(xty),
        trace_inv: inv.diag().sum(),
    })
}

impl BayesianRidgeModel {
    pub fn fit(x: &Array2<f64>, y: &[f64]) -> Result<Self, PipelineError> {
        Self::fit_with(x, y, BayesianRidgeParameters::default())
    }

    pub fn fit_with(
        x: &Array2<f64>,
        y: &[f64],
        params: BayesianRidgeParameters,
    ) -> Result<Self, PipelineError> {
        let n = x.nrows();
        let p = x.ncols();
        if n == 0 || n != y.len() {
            return Err(PipelineError::InsufficientData(format!(
                "BayesianRidge needs matching non-empty X and y, got {} rows and {} targets",
                n,
                y.len()
            )));
        }

        let y = Array1::from(y.to_vec());
        let x_offset = x
            .mean_axis(Axis(0))
            .ok_or_else(|| PipelineError::pipeline("empty design matrix"))?;
        let y_offset = y.mean().unwrap_or(0.0);
        let xc = x - &x_offset;
        let yc = &y - y_offset;

        let xtx = xc.t().dot(&xc);
        let xty = xc.t().dot(&yc);

        let y_var = yc.mapv(|v| v * v).sum() / n as f64;
        let mut alpha = 1.0 / (y_var + f64::EPSILON);
        let mut lambda = 1.0;

        let mut coef_old: Option<Array1<f64>> = None;
        let mut iterations = 0;
        for iter in 0..params.max_iter {
            iterations = iter + 1;
            let post = posterior(&xtx, &xty, alpha, lambda)?;
            let residual = &yc - &xc.dot(&post.coef);
            let rmse = residual.mapv(|r| r * r).sum();
            let coef_sq = post.coef.mapv(|c| c * c).sum();

            let gamma = p as f64 - (lambda / alpha) * post.trace_inv;
            lambda = (gamma + 2.0 * params.lambda_1) / (coef_sq + 2.0 * params.lambda_2);
            alpha = (n as f64 - gamma + 2.0 * params.alpha_1) / (rmse + 2.0 * params.alpha_2);

            if let Some(old) = &coef_old
                && (old - &post.coef).mapv(f64::abs).sum() < params.tol
            {
                break;
            }
            coef_old = Some(post.coef);
        }

        let coef = posterior(&xtx, &xty, alpha, lambda)?.coef;
        let intercept = y_offset - x_offset.dot(&coef);

        debug!(
            "BayesianRidge: {} iterations, alpha {:.3e}, lambda {:.3e}",
            iterations, alpha, lambda
        );

        Ok(Self {
            coef: coef.to_vec(),
            intercept,
            alpha,
            lambda,
        })
    }
}

impl Regressor for BayesianRidgeModel {
    fn predict(&self, x: &Array2<f64>) -> Result<Vec<f64>, PipelineError> {
        let coef = Array1::from(self.coef.clone());
        Ok(x.dot(&coef).mapv(|v| v + self.intercept).to_vec())
    }

    fn n_features(&self) -> usize {
        self.coef.len()
    }
}
