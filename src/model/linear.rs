//! Ordinary least squares on standardized features.
//!
//! Solved through the centered normal equations with a vanishing ridge term,
//! which leaves well-posed fits unchanged and still gives a deterministic
//! (minimum-norm-like) answer for collinear or under-determined designs.

use serde::{Deserialize, Serialize};

use super::N_FEATURES;

/// Ridge added to the diagonal, relative to the number of rows.
const RIDGE_EPS: f64 = 1e-10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub coefficients: [f64; N_FEATURES],
    pub intercept: f64,
}

impl LinearModel {
    /// Fit `y ≈ coefficients · x + intercept`. Returns `None` for empty or
    /// mismatched input or a non-finite solution.
    pub fn fit(x: &[[f64; N_FEATURES]], y: &[f64]) -> Option<Self> {
        if x.is_empty() || x.len() != y.len() {
            return None;
        }
        let n = x.len() as f64;

        let mut x_mean = [0.0; N_FEATURES];
        for row in x {
            for j in 0..N_FEATURES {
                x_mean[j] += row[j] / n;
            }
        }
        let y_mean = y.iter().sum::<f64>() / n;

        // Normal equations on centered data: (XᵀX + λI) w = Xᵀy
        let mut a = [[0.0; N_FEATURES]; N_FEATURES];
        let mut rhs = [0.0; N_FEATURES];
        for (row, target) in x.iter().zip(y) {
            let yc = target - y_mean;
            for i in 0..N_FEATURES {
                let xi = row[i] - x_mean[i];
                rhs[i] += xi * yc;
                for j in 0..N_FEATURES {
                    a[i][j] += xi * (row[j] - x_mean[j]);
                }
            }
        }
        for (i, a_row) in a.iter_mut().enumerate() {
            a_row[i] += RIDGE_EPS * n;
        }

        let coefficients = solve(a, rhs)?;
        let intercept = y_mean
            - coefficients
                .iter()
                .zip(&x_mean)
                .map(|(c, m)| c * m)
                .sum::<f64>();

        if !intercept.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
            return None;
        }
        Some(LinearModel {
            coefficients,
            intercept,
        })
    }

    pub fn predict(&self, row: &[f64; N_FEATURES]) -> f64 {
        self.coefficients
            .iter()
            .zip(row)
            .map(|(c, x)| c * x)
            .sum::<f64>()
            + self.intercept
    }
}

/// Gaussian elimination with partial pivoting. A pivot that vanishes entirely
/// leaves that coefficient at zero.
fn solve(
    mut a: [[f64; N_FEATURES]; N_FEATURES],
    mut b: [f64; N_FEATURES],
) -> Option<[f64; N_FEATURES]> {
    let mut pivot_ok = [true; N_FEATURES];

    for col in 0..N_FEATURES {
        let pivot_row = (col..N_FEATURES).max_by(|&r1, &r2| {
            a[r1][col]
                .abs()
                .partial_cmp(&a[r2][col].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;
        if a[pivot_row][col].abs() < 1e-300 {
            pivot_ok[col] = false;
            continue;
        }
        a.swap(col, pivot_row);
        b.swap(col, pivot_row);

        for r in (col + 1)..N_FEATURES {
            let factor = a[r][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for c in col..N_FEATURES {
                a[r][c] -= factor * a[col][c];
            }
            b[r] -= factor * b[col];
        }
    }

    let mut w = [0.0; N_FEATURES];
    for row in (0..N_FEATURES).rev() {
        if !pivot_ok[row] {
            continue;
        }
        let tail: f64 = ((row + 1)..N_FEATURES).map(|c| a[row][c] * w[c]).sum();
        w[row] = (b[row] - tail) / a[row][row];
    }
    Some(w)
}
