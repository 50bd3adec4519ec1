//! Linear-kernel support vector regression
//!
//! Minimizes the ε-insensitive primal objective
//! `||w||² / (2·C·n) + mean(max(0, |y - (w·x + b)| - ε))`
//! by full-batch subgradient descent on standardized features. The iterate
//! with the lowest objective is kept, so the result is deterministic and
//! does not depend on where the last step happened to land.

use super::models::{check_n_features, check_training_data, Regressor};
use crate::error::{BmiError, Result};
use crate::preprocessing::StandardScaler;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// SVR configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMConfig {
    /// Regularization parameter (C)
    pub c: f64,
    /// Half-width of the insensitive tube
    pub epsilon: f64,
    /// Tolerance on the parameter step for early stopping
    pub tol: f64,
    /// Maximum number of descent epochs
    pub max_iter: usize,
}

impl Default for SVMConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            epsilon: 0.1,
            tol: 1e-6,
            max_iter: 1000,
        }
    }
}

/// Support Vector Regressor with a linear kernel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearSVR {
    config: SVMConfig,
    scaler: StandardScaler,
    /// Weights in standardized feature space
    weights: Option<Array1<f64>>,
    bias: f64,
}

impl Default for LinearSVR {
    fn default() -> Self {
        Self::new(SVMConfig::default())
    }
}

impl LinearSVR {
    pub fn new(config: SVMConfig) -> Self {
        Self {
            config,
            scaler: StandardScaler::new(),
            weights: None,
            bias: 0.0,
        }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.config.max_iter = max_iter;
        self
    }

    /// Objective value and its subgradient at `(w, b)`
    fn objective(&self, x: &Array2<f64>, y: &Array1<f64>, w: &Array1<f64>, b: f64) -> (f64, Array1<f64>, f64) {
        let n = x.nrows() as f64;
        let eps = self.config.epsilon;
        let reg = 1.0 / (self.config.c * n);

        let mut loss = 0.0;
        let mut grad_w = Array1::zeros(w.len());
        let mut grad_b = 0.0;
        for (row, &target) in x.outer_iter().zip(y.iter()) {
            let residual = target - (row.dot(w) + b);
            if residual.abs() > eps {
                let sign = residual.signum();
                loss += residual.abs() - eps;
                grad_w.scaled_add(-sign, &row);
                grad_b -= sign;
            }
        }

        let value = 0.5 * reg * w.dot(w) + loss / n;
        let grad_w = w * reg + grad_w / n;
        (value, grad_w, grad_b / n)
    }
}

fn median(values: &Array1<f64>) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

impl Regressor for LinearSVR {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_data(x, y)?;
        if self.config.c <= 0.0 {
            return Err(BmiError::InvalidParameter {
                name: "c".to_string(),
                value: self.config.c.to_string(),
                reason: "must be positive".to_string(),
            });
        }

        let xs = self.scaler.fit_transform(x)?;
        let y_std = y.std(0.0);
        let step0 = if y_std > f64::EPSILON { y_std } else { 1.0 };

        let mut w = Array1::zeros(x.ncols());
        let mut b = median(y);
        let (mut best_value, _, _) = self.objective(&xs, y, &w, b);
        let mut best = (w.clone(), b);

        for epoch in 0..self.config.max_iter {
            let (value, grad_w, grad_b) = self.objective(&xs, y, &w, b);
            if value < best_value {
                best_value = value;
                best = (w.clone(), b);
            }

            let eta = step0 / ((epoch + 1) as f64).sqrt();
            let step_w = &grad_w * eta;
            let step_b = grad_b * eta;
            let step_norm = (step_w.dot(&step_w) + step_b * step_b).sqrt();

            w = &w - &step_w;
            b -= step_b;

            if step_norm < self.config.tol {
                break;
            }
        }

        let (final_value, _, _) = self.objective(&xs, y, &w, b);
        if final_value < best_value {
            best = (w, b);
        }

        self.weights = Some(best.0);
        self.bias = best.1;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let weights = self.weights.as_ref().ok_or(BmiError::ModelNotFitted)?;
        check_n_features(x, weights.len())?;
        let xs = self.scaler.transform(x.view())?;
        Ok(xs.dot(weights) + self.bias)
    }

    fn is_fitted(&self) -> bool {
        self.weights.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_svr_fits_a_line() {
        let x = Array2::from_shape_vec((10, 1), (1..=10).map(|v| v as f64).collect()).unwrap();
        let y = x.column(0).mapv(|v| 2.0 * v);

        let config = SVMConfig {
            c: 10.0,
            epsilon: 0.5,
            max_iter: 500,
            ..Default::default()
        };
        let mut svr = LinearSVR::new(config);
        svr.fit(&x, &y).unwrap();

        let predictions = svr.predict(&x).unwrap();
        let mae = (&predictions - &y).mapv(f64::abs).mean().unwrap();
        assert!(mae < 1.5, "mae {} too large", mae);
    }

    #[test]
    fn test_svr_is_deterministic() {
        let x = Array2::from_shape_fn((30, 2), |(i, j)| ((i * 7 + j * 3) % 11) as f64);
        let y = Array1::from_shape_fn(30, |i| (i % 5) as f64 + 0.5 * x[[i, 0]]);

        let mut a = LinearSVR::default().with_max_iter(251);
        let mut b = LinearSVR::default().with_max_iter(251);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_rejects_non_positive_c() {
        let x = Array2::zeros((3, 1));
        let y = Array1::zeros(3);
        let mut svr = LinearSVR::new(SVMConfig { c: 0.0, ..Default::default() });
        assert!(svr.fit(&x, &y).is_err());
    }
}
