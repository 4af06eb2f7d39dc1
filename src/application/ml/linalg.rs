//! Dense solvers for the small symmetric systems the regressors produce

use crate::domain::errors::PipelineError;
use ndarray::{Array1, Array2};

/// Lower-triangular `L` with `A = L Lᵀ`, or `None` if `a` is not positive definite
pub fn cholesky(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }

            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 || !diag.is_finite() {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    Some(l)
}

fn cholesky_solve(l: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    let n = l.nrows();

    // L z = b
    let mut z = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * z[j];
        }
        z[i] = (b[i] - sum) / l[[i, i]];
    }

    // Lᵀ x = z
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (z[i] - sum) / l[[i, i]];
    }

    x
}

/// Gaussian elimination with partial pivoting
fn lu_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    let mut m = a.clone();
    let mut rhs = b.clone();

    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| m[[i, col]].abs().total_cmp(&m[[j, col]].abs()))?;
        if m[[pivot, col]].abs() < 1e-12 {
            return None;
        }
        if pivot != col {
            for k in 0..n {
                m.swap([col, k], [pivot, k]);
            }
            rhs.swap(col, pivot);
        }

        for row in (col + 1)..n {
            let factor = m[[row, col]] / m[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                m[[row, k]] -= factor * m[[col, k]];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += m[[i, j]] * x[j];
        }
        x[i] = (rhs[i] - sum) / m[[i, i]];
    }

    x.iter().all(|v| v.is_finite()).then_some(x)
}

/// Solves `A x = b` for symmetric `A`: Cholesky first, pivoted elimination as fallback
pub fn solve_symmetric(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>, PipelineError> {
    if a.nrows() != a.ncols() || a.nrows() != b.len() {
        return Err(PipelineError::Shape {
            expected: a.nrows(),
            actual: b.len(),
        });
    }

    if let Some(l) = cholesky(a) {
        return Ok(cholesky_solve(&l, b));
    }
    lu_solve(a, b).ok_or_else(|| PipelineError::pipeline("singular system"))
}

/// Inverse of a symmetric positive (semi)definite matrix, adding diagonal jitter when needed
pub fn inverse_symmetric(a: &Array2<f64>) -> Result<Array2<f64>, PipelineError> {
    let n = a.nrows();
    let scale = (0..n).map(|i| a[[i, i]].abs()).fold(0.0f64, f64::max).max(1.0);

    let mut jitter = 0.0;
    for _ in 0..8 {
        let mut shifted = a.clone();
        for i in 0..n {
            shifted[[i, i]] += jitter;
        }
        if let Some(l) = cholesky(&shifted) {
            let mut inverse = Array2::<f64>::zeros((n, n));
            for col in 0..n {
                let mut e = Array1::<f64>::zeros(n);
                e[col] = 1.0;
                inverse.column_mut(col).assign(&cholesky_solve(&l, &e));
            }
            return Ok(inverse);
        }
        jitter = if jitter == 0.0 { scale * 1e-12 } else { jitter * 100.0 };
    }

    Err(PipelineError::pipeline("matrix is not positive definite"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_solve_spd_system() {
        let a = array![[4.0, 1.0], [1.0, 3.0]];
        let b = array![1.0, 2.0];
        let x = solve_symmetric(&a, &b).unwrap();

        let residual = a.dot(&x) - &b;
        assert!(residual.iter().all(|r| r.abs() < 1e-12));
    }

    #[test]
    fn test_indefinite_system_falls_back_to_elimination() {
        let a = array![[0.0, 1.0], [1.0, 0.0]];
        let b = array![2.0, 3.0];
        let x = solve_symmetric(&a, &b).unwrap();

        assert!((x[0] - 3.0).abs() < 1e-12);
        assert!((x[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_singular_system_is_an_error() {
        let a = array![[1.0, 1.0], [1.0, 1.0]];
        let b = array![1.0, 2.0];
        assert!(solve_symmetric(&a, &b).is_err());
    }

    #[test]
    fn test_inverse_times_matrix_is_identity() {
        let a = array![[2.0, 0.5, 0.0], [0.5, 3.0, 0.2], [0.0, 0.2, 1.5]];
        let inv = inverse_symmetric(&a).unwrap();
        let product = a.dot(&inv);

        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((product[[i, j]] - expected).abs() < 1e-10);
            }
        }
    }
}
