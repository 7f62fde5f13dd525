//! Binary logistic regression on standardized features.
//!
//! The model is `p = sigmoid(w · x + b)`, fitted by full-batch gradient
//! descent on the L2-penalized log-loss
//! `0.5 * |w|² + C * Σ logloss(p_i, y_i)`; the intercept is not penalized.

use serde::{Deserialize, Serialize};

use super::N_FEATURES;

const EPS: f64 = 1e-12;

#[derive(Debug, Clone, Copy)]
pub struct LogisticParams {
    /// Inverse regularization strength
    pub c: f64,
    pub max_iters: usize,
    pub learning_rate: f64,
    /// Stop once every gradient component is below this
    pub tolerance: f64,
}

impl Default for LogisticParams {
    fn default() -> Self {
        LogisticParams {
            c: 1.0,
            max_iters: 1000,
            learning_rate: 0.5,
            tolerance: 1e-6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub weights: [f64; N_FEATURES],
    pub intercept: f64,
    /// Iterations run by the solver
    pub iterations: usize,
}

pub(crate) fn clamp_prob(p: f64) -> f64 {
    p.clamp(EPS, 1.0 - EPS)
}

pub(crate) fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        let z = (-x).exp();
        1.0 / (1.0 + z)
    } else {
        let z = x.exp();
        z / (1.0 + z)
    }
}

pub(crate) fn logloss(p: f64, y: f64) -> f64 {
    let p = clamp_prob(p);
    -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
}

fn dot(w: &[f64; N_FEATURES], x: &[f64; N_FEATURES]) -> f64 {
    w.iter().zip(x).map(|(a, b)| a * b).sum()
}

impl LogisticModel {
    /// Fit on scaled rows and 0/1 labels. Returns `None` when the labels hold a
    /// single class or the solver diverges.
    pub fn fit(x: &[[f64; N_FEATURES]], y: &[f64], params: LogisticParams) -> Option<Self> {
        if x.is_empty() || x.len() != y.len() {
            return None;
        }
        let positives = y.iter().filter(|&&v| v > 0.5).count();
        if positives == 0 || positives == y.len() {
            return None;
        }

        let n = x.len() as f64;
        let penalty = 1.0 / (params.c * n);
        let mut w = [0.0f64; N_FEATURES];
        let mut b = 0.0f64;
        let mut iterations = 0;

        for i in 0..params.max_iters.max(1) {
            iterations = i + 1;
            let mut grad_w = [0.0f64; N_FEATURES];
            let mut grad_b = 0.0;
            for (row, label) in x.iter().zip(y) {
                let err = sigmoid(dot(&w, row) + b) - label;
                for j in 0..N_FEATURES {
                    grad_w[j] += err * row[j];
                }
                grad_b += err;
            }
            for j in 0..N_FEATURES {
                grad_w[j] = grad_w[j] / n + penalty * w[j];
            }
            grad_b /= n;

            for j in 0..N_FEATURES {
                w[j] -= params.learning_rate * grad_w[j];
            }
            b -= params.learning_rate * grad_b;
            if !b.is_finite() || w.iter().any(|v| !v.is_finite()) {
                return None;
            }

            let max_grad = grad_w.iter().fold(grad_b.abs(), |m, g| m.max(g.abs()));
            if max_grad < params.tolerance {
                break;
            }
        }

        Some(LogisticModel {
            weights: w,
            intercept: b,
            iterations,
        })
    }

    /// Probability of class 1 for one scaled row.
    pub fn predict_proba(&self, row: &[f64; N_FEATURES]) -> f64 {
        sigmoid(dot(&self.weights, row) + self.intercept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn separable() -> (Vec<[f64; N_FEATURES]>, Vec<f64>) {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..40 {
            let t = (i as f64 - 20.0) / 10.0;
            x.push([t, -t, 0.5 * t, 0.0]);
            y.push(if t > 0.0 { 1.0 } else { 0.0 });
        }
        (x, y)
    }

    #[test]
    fn learns_direction_of_signal() {
        let (x, y) = separable();
        let model = LogisticModel::fit(&x, &y, LogisticParams::default()).unwrap();
        assert!(model.weights[0] > 0.0);
        assert!(model.weights[1] < 0.0);
        assert!(model.predict_proba(&[1.5, -1.5, 0.75, 0.0]) > 0.9);
        assert!(model.predict_proba(&[-1.5, 1.5, -0.75, 0.0]) < 0.1);
    }

    #[test]
    fn regularization_keeps_weights_bounded_on_separable_data() {
        let (x, y) = separable();
        let model = LogisticModel::fit(&x, &y, LogisticParams::default()).unwrap();
        assert!(model.weights.iter().all(|w| w.abs() < 50.0));
        assert_eq!(model.weights[3], 0.0);
    }

    #[test]
    fn single_class_cannot_be_fit() {
        let x = vec![[0.0; N_FEATURES]; 3];
        assert!(LogisticModel::fit(&x, &[1.0, 1.0, 1.0], LogisticParams::default()).is_none());
        assert!(LogisticModel::fit(&x, &[0.0, 0.0, 0.0], LogisticParams::default()).is_none());
    }

    #[test]
    fn sigmoid_properties() {
        assert_relative_eq!(sigmoid(0.0), 0.5, epsilon = 1e-12);
        assert!(sigmoid(40.0) <= 1.0);
        assert!(sigmoid(-800.0) >= 0.0);
        assert_relative_eq!(logloss(0.5, 1.0), std::f64::consts::LN_2, epsilon = 1e-12);
    }
}
