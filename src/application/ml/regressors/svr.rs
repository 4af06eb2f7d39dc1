//! Epsilon support vector regression with an RBF kernel
//!
//! The dual problem is solved with sequential minimal optimization over the
//! usual `2n` variable formulation (one `α⁺`/`α⁻` pair per sample), picking
//! the working pair by maximal violation with second-order gain. Only the
//! support vectors are kept after fitting.

use super::Regressor;
use crate::domain::errors::PipelineError;
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const TAU: f64 = 1e-12;

#[derive(Debug, Clone, Copy)]
pub struct SvrParameters {
    pub c: f64,
    pub epsilon: f64,
    pub tol: f64,
    pub max_iter: usize,
}

impl Default for SvrParameters {
    fn default() -> Self {
        Self {
            c: 1.0,
            epsilon: 0.1,
            tol: 1e-3,
            max_iter: 1_000_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvrModel {
    pub gamma: f64,
    pub support_vectors: Vec<Vec<f64>>,
    pub dual_coef: Vec<f64>,
    pub intercept: f64,
}

fn rbf(gamma: f64, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    let sq: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum();
    (-gamma * sq).exp()
}

fn rbf_slices(gamma: f64, a: &[f64], b: ArrayView1<f64>) -> f64 {
    let sq: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum();
    (-gamma * sq).exp()
}

/// `1 / (n_features * Var(X))` over every cell, or 1 for a constant matrix
pub fn scale_gamma(x: &Array2<f64>) -> f64 {
    let n = x.len() as f64;
    if n == 0.0 {
        return 1.0;
    }
    let mean = x.sum() / n;
    let var = x.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    if var > 0.0 && var.is_finite() {
        1.0 / (x.ncols() as f64 * var)
    } else {
        1.0
    }
}

impl SvrModel {
    pub fn fit(x: &Array2<f64>, y: &[f64]) -> Result<Self, PipelineError> {
        Self::fit_with(x, y, SvrParameters::default())
    }

    pub fn fit_with(
        x: &Array2<f64>,
        y: &[f64],
        params: SvrParameters,
    ) -> Result<Self, PipelineError> {
        let n = x.nrows();
        if n == 0 || n != y.len() {
            return Err(PipelineError::InsufficientData(format!(
                "SVR needs matching non-empty X and y, got {} rows and {} targets",
                n,
                y.len()
            )));
        }

        let gamma = scale_gamma(x);
        let kernel_row = |i: usize| -> Vec<f64> {
            (0..n).map(|k| rbf(gamma, x.row(i), x.row(k))).collect()
        };

        // Variables 0..n carry sign +1, n..2n sign -1
        let m = 2 * n;
        let sign = |t: usize| if t < n { 1.0 } else { -1.0 };
        let sample = |t: usize| if t < n { t } else { t - n };

        let mut alpha = vec![0.0f64; m];
        let mut grad: Vec<f64> = (0..m)
            .map(|t| {
                if t < n {
                    params.epsilon - y[t]
                } else {
                    params.epsilon + y[t - n]
                }
            })
            .collect();

        let c = params.c;
        let is_upper = |a: f64| a >= c;
        let is_lower = |a: f64| a <= 0.0;

        let mut iterations = 0usize;
        loop {
            if iterations >= params.max_iter {
                warn!(
                    "SVR: reached {} iterations without converging",
                    params.max_iter
                );
                break;
            }

            // i: maximal -y_t G_t over the "up" set
            let mut g_max = f64::NEG_INFINITY;
            let mut i_sel = None;
            for t in 0..m {
                let movable = if sign(t) > 0.0 {
                    !is_upper(alpha[t])
                } else {
                    !is_lower(alpha[t])
                };
                if movable && -sign(t) * grad[t] >= g_max {
                    g_max = -sign(t) * grad[t];
                    i_sel = Some(t);
                }
            }
            let Some(i) = i_sel else { break };

            let k_i = kernel_row(sample(i));
            let qd_i = k_i[sample(i)];

            // j: largest second-order decrease over the "low" set
            let mut g_max2 = f64::NEG_INFINITY;
            let mut obj_min = f64::INFINITY;
            let mut j_sel = None;
            for t in 0..m {
                let q_it = sign(i) * sign(t) * k_i[sample(t)];
                let qd_t = 1.0;
                if sign(t) > 0.0 {
                    if !is_lower(alpha[t]) {
                        let grad_diff = g_max + grad[t];
                        g_max2 = g_max2.max(grad[t]);
                        if grad_diff > 0.0 {
                            let quad = qd_i + qd_t - 2.0 * sign(i) * q_it;
                            let obj = -(grad_diff * grad_diff) / if quad > 0.0 { quad } else { TAU };
                            if obj <= obj_min {
                                obj_min = obj;
                                j_sel = Some(t);
                            }
                        }
                    }
                } else if !is_upper(alpha[t]) {
                    let grad_diff = g_max - grad[t];
                    g_max2 = g_max2.max(-grad[t]);
                    if grad_diff > 0.0 {
                        let quad = qd_i + qd_t + 2.0 * sign(i) * q_it;
                        let obj = -(grad_diff * grad_diff) / if quad > 0.0 { quad } else { TAU };
                        if obj <= obj_min {
                            obj_min = obj;
                            j_sel = Some(t);
                        }
                    }
                }
            }

            let Some(j) = j_sel else { break };
            if g_max + g_max2 < params.tol {
                break;
            }

            let k_j = kernel_row(sample(j));
            let q_ij = sign(i) * sign(j) * k_i[sample(j)];
            let qd_j = k_j[sample(j)];
            let (old_i, old_j) = (alpha[i], alpha[j]);

            if sign(i) != sign(j) {
                let quad = (qd_i + qd_j + 2.0 * q_ij).max(TAU);
                let delta = (-grad[i] - grad[j]) / quad;
                let diff = alpha[i] - alpha[j];
                alpha[i] += delta;
                alpha[j] += delta;
                if diff > 0.0 {
                    if alpha[j] < 0.0 {
                        alpha[j] = 0.0;
                        alpha[i] = diff;
                    }
                } else if alpha[i] < 0.0 {
                    alpha[i] = 0.0;
                    alpha[j] = -diff;
                }
                if diff > 0.0 {
                    if alpha[i] > c {
                        alpha[i] = c;
                        alpha[j] = c - diff;
                    }
                } else if alpha[j] > c {
                    alpha[j] = c;
                    alpha[i] = c + diff;
                }
            } else {
                let quad = (qd_i + qd_j - 2.0 * q_ij).max(TAU);
                let delta = (grad[i] - grad[j]) / quad;
                let sum = alpha[i] + alpha[j];
                alpha[i] -= delta;
                alpha[j] += delta;
                if sum > c {
                    if alpha[i] > c {
                        alpha[i] = c;
                        alpha[j] = sum - c;
                    }
                } else if alpha[j] < 0.0 {
                    alpha[j] = 0.0;
                    alpha[i] = sum;
                }
                if sum > c {
                    if alpha[j] > c {
                        alpha[j] = c;
                        alpha[i] = sum - c;
                    }
                } else if alpha[i] < 0.0 {
                    alpha[i] = 0.0;
                    alpha[j] = sum;
                }
            }

            let d_i = alpha[i] - old_i;
            let d_j = alpha[j] - old_j;
            for t in 0..m {
                let q_it = sign(i) * sign(t) * k_i[sample(t)];
                let q_jt = sign(j) * sign(t) * k_j[sample(t)];
                grad[t] += q_it * d_i + q_jt * d_j;
            }

            iterations += 1;
        }

        let rho = compute_rho(&alpha, &grad, c, n);

        let mut support_vectors = Vec::new();
        let mut dual_coef = Vec::new();
        for s in 0..n {
            let coef = alpha[s] - alpha[s + n];
            if coef != 0.0 {
                support_vectors.push(x.row(s).to_vec());
                dual_coef.push(coef);
            }
        }

        debug!(
            "SVR: {} iterations, {} support vectors of {} samples, gamma {:.3e}",
            iterations,
            support_vectors.len(),
            n,
            gamma
        );

        Ok(Self {
            gamma,
            support_vectors,
            dual_coef,
            intercept: -rho,
        })
    }
}

/// Offset from free variables, or the midpoint of the feasible bound interval
fn compute_rho(alpha: &[f64], grad: &[f64], c: f64, n: usize) -> f64 {
    let mut upper = f64::INFINITY;
    let mut lower = f64::NEG_INFINITY;
    let mut free = 0usize;
    let mut free_sum = 0.0;

    for (t, (&a, &g)) in alpha.iter().zip(grad.iter()).enumerate() {
        let s = if t < n { 1.0 } else { -1.0 };
        let yg = s * g;
        if a >= c {
            if s < 0.0 {
                upper = upper.min(yg);
            } else {
                lower = lower.max(yg);
            }
        } else if a <= 0.0 {
            if s > 0.0 {
                upper = upper.min(yg);
            } else {
                lower = lower.max(yg);
            }
        } else {
            free += 1;
            free_sum += yg;
        }
    }

    if free > 0 {
        free_sum / free as f64
    } else {
        (upper + lower) / 2.0
    }
}

impl Regressor for SvrModel {
    fn predict(&self, x: &Array2<f64>) -> Result<Vec<f64>, PipelineError> {
        Ok(x.rows()
            .into_iter()
            .map(|row| {
                self.support_vectors
                    .iter()
                    .zip(self.dual_coef.iter())
                    .map(|(sv, coef)| coef * rbf_slices(self.gamma, sv, row))
                    .sum::<f64>()
                    + self.intercept
            })
            .collect())
    }

    fn n_features(&self) -> usize {
        self.support_vectors.first().map(|sv| sv.len()).unwrap_or(0)
    }
}
