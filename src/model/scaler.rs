use serde::{Deserialize, Serialize};

use super::N_FEATURES;

/// Per-column standardization: `(x - mean) / scale`.
///
/// `scale` is the population standard deviation of the training column; a
/// constant column keeps a scale of 1 so it maps to zero instead of NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: [f64; N_FEATURES],
    pub scale: [f64; N_FEATURES],
}

impl StandardScaler {
    /// Fit on the rows of a feature matrix. Requires at least one row.
    pub fn fit(rows: &[[f64; N_FEATURES]]) -> Self {
        let n = rows.len().max(1) as f64;
        let mut mean = [0.0; N_FEATURES];
        for row in rows {
            for (m, x) in mean.iter_mut().zip(row) {
                *m += x;
            }
        }
        for m in &mut mean {
            *m /= n;
        }

        let mut var = [0.0; N_FEATURES];
        for row in rows {
            for j in 0..N_FEATURES {
                var[j] += (row[j] - mean[j]).powi(2);
            }
        }
        let mut scale = [1.0; N_FEATURES];
        for j in 0..N_FEATURES {
            let sd = (var[j] / n).sqrt();
            if sd > f64::EPSILON * mean[j].abs().max(1.0) {
                scale[j] = sd;
            }
        }

        StandardScaler { mean, scale }
    }

    pub fn transform_row(&self, row: &[f64; N_FEATURES]) -> [f64; N_FEATURES] {
        let mut out = [0.0; N_FEATURES];
        for j in 0..N_FEATURES {
            out[j] = (row[j] - self.mean[j]) / self.scale[j];
        }
        out
    }

    pub fn transform(&self, rows: &[[f64; N_FEATURES]]) -> Vec<[f64; N_FEATURES]> {
        rows.iter().map(|r| self.transform_row(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn transformed_training_columns_have_zero_mean_unit_std() {
        let rows = vec![
            [3.0, 5.0, 8.0, 10.0],
            [1.0, 0.0, 4.0, 6.0],
            [7.0, 2.0, 12.0, 5.0],
            [4.0, 4.0, 9.0, 9.0],
            [0.0, 9.0, 3.0, 14.0],
        ];
        let scaler = StandardScaler::fit(&rows);
        let scaled = scaler.transform(&rows);
        let n = scaled.len() as f64;
        for j in 0..N_FEATURES {
            let mean = scaled.iter().map(|r| r[j]).sum::<f64>() / n;
            let var = scaled.iter().map(|r| (r[j] - mean).powi(2)).sum::<f64>() / n;
            assert_relative_eq!(mean, 0.0, epsilon = 1e-12);
            assert_relative_eq!(var.sqrt(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn constant_column_maps_to_zero() {
        let rows = vec![[2.0, 1.0, 5.0, 5.0], [2.0, 3.0, 7.0, 5.0]];
        let scaler = StandardScaler::fit(&rows);
        assert_eq!(scaler.scale[0], 1.0);
        assert_eq!(scaler.scale[3], 1.0);
        let scaled = scaler.transform_row(&rows[0]);
        assert_eq!(scaled[0], 0.0);
        assert!(scaled.iter().all(|x| x.is_finite()));
    }
}
