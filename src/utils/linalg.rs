//! Dense symmetric linear algebra used by the posterior approximation.
//!
//! Matrices are stored row-major as `Vec<Vec<f64>>`.

use crate::error::{ForecastError, Result};

/// Cholesky factor `L` with `A = L Lᵀ`, or `None` if `A` is not positive definite.
pub fn cholesky(a: &[Vec<f64>]) -> Option<Vec<Vec<f64>>> {
    let n = a.len();
    if a.iter().any(|row| row.len() != n) {
        return None;
    }

    let mut l = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[i][j];
            for k in 0..j {
                sum -= l[i][k] * l[j][k];
            }

            if i == j {
                if sum <= 0.0 || !sum.is_finite() {
                    return None;
                }
                l[i][j] = sum.sqrt();
            } else {
                l[i][j] = sum / l[j][j];
            }
        }
    }
    Some(l)
}

/// Factor `A + λI`, growing the jitter `λ` until the factorisation succeeds.
///
/// Returns the factor and the jitter that was needed (0 if none).
pub fn cholesky_with_jitter(a: &[Vec<f64>]) -> Result<(Vec<Vec<f64>>, f64)> {
    if let Some(l) = cholesky(a) {
        return Ok((l, 0.0));
    }

    let scale = a
        .iter()
        .enumerate()
        .map(|(i, row)| row.get(i).copied().unwrap_or(0.0).abs())
        .fold(0.0, f64::max)
        .max(1.0);
    let mut jitter = 1e-10 * scale;
    for _ in 0..12 {
        let mut shifted = a.to_vec();
        for (i, row) in shifted.iter_mut().enumerate() {
            row[i] += jitter;
        }
        if let Some(l) = cholesky(&shifted) {
            return Ok((l, jitter));
        }
        jitter *= 10.0;
    }
    Err(ForecastError::ComputationError(
        "matrix is not positive definite even after adding jitter".to_string(),
    ))
}

/// Solve `Lᵀ x = y` for lower-triangular `L`.
pub fn solve_lower_transpose(l: &[Vec<f64>], y: &[f64]) -> Vec<f64> {
    let n = y.len();
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = y[i];
        for j in (i + 1)..n {
            sum -= l[j][i] * x[j];
        }
        x[i] = sum / l[i][i];
    }
    x
}

/// Average a matrix with its transpose.
pub fn symmetrize(a: &mut [Vec<f64>]) {
    let n = a.len();
    for i in 0..n {
        for j in (i + 1)..n {
            let avg = 0.5 * (a[i][j] + a[j][i]);
            a[i][j] = avg;
            a[j][i] = avg;
        }
    }
}
