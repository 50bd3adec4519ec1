//! Ordinary least squares regression

use super::models::{check_n_features, check_training_data, Regressor};
use crate::error::{BmiError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Solve the symmetric positive semi-definite system `A x = b` by Cholesky
/// decomposition.
///
/// A rank-deficient `A` (for example a constant feature column) gets a small
/// ridge on the diagonal, growing on each retry.
pub(crate) fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }

    let base = a.diag().iter().map(|v| v.abs()).sum::<f64>() / n.max(1) as f64;
    let base = if base > 0.0 { base } else { 1.0 };

    let mut ridge = 0.0;
    for _attempt in 0..4 {
        if let Some(l) = cholesky_factor(a, ridge) {
            return Some(substitute(&l, b));
        }
        ridge = if ridge == 0.0 { 1e-10 * base } else { ridge * 1e3 };
    }
    None
}

/// Lower-triangular `L` with `A + ridge·I = L Lᵀ`, or `None` if not positive definite
fn cholesky_factor(a: &Array2<f64>, ridge: f64) -> Option<Array2<f64>> {
    let n = a.nrows();
    let mut l = Array2::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let sum: f64 = (0..j).map(|k| l[[i, k]] * l[[j, k]]).sum();
            if i == j {
                let diag = a[[i, i]] + ridge - sum;
                if diag <= 0.0 {
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

/// Forward then backward substitution through `L` and `Lᵀ`
fn substitute(l: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    let n = l.nrows();

    let mut y = Array1::zeros(n);
    for i in 0..n {
        let sum: f64 = (0..i).map(|j| l[[i, j]] * y[j]).sum();
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        let sum: f64 = ((i + 1)..n).map(|j| l[[j, i]] * x[j]).sum();
        x[i] = (y[i] - sum) / l[[i, i]];
    }
    x
}

/// Linear regression solved through the normal equations on centered data
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinearRegression {
    /// Fitted coefficients
    pub coefficients: Option<Array1<f64>>,
    /// Fitted intercept (bias)
    pub intercept: f64,
}

impl LinearRegression {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Regressor for LinearRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_data(x, y)?;

        let x_mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| BmiError::TrainingError("no training samples".to_string()))?;
        let y_mean = y.mean().unwrap_or(0.0);

        let x_centered = x - &x_mean.view().insert_axis(Axis(0));
        let y_centered = y - y_mean;

        let xtx = x_centered.t().dot(&x_centered);
        let xty = x_centered.t().dot(&y_centered);

        let coefficients = cholesky_solve(&xtx, &xty).ok_or_else(|| {
            BmiError::TrainingError("normal equations are singular".to_string())
        })?;

        self.intercept = y_mean - coefficients.dot(&x_mean);
        self.coefficients = Some(coefficients);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self.coefficients.as_ref().ok_or(BmiError::ModelNotFitted)?;
        check_n_features(x, coefficients.len())?;
        Ok(x.dot(coefficients) + self.intercept)
    }

    fn is_fitted(&self) -> bool {
        self.coefficients.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_recovers_exact_plane() {
        let x = array![[1.0, 2.0], [2.0, 1.0], [3.0, 4.0], [4.0, 3.0], [5.0, 7.0]];
        let y = x.column(0).mapv(|a| 3.0 * a) + x.column(1).mapv(|b| -2.0 * b) + 5.0;

        let mut model = LinearRegression::new();
        model.fit(&x, &y).unwrap();

        let coef = model.coefficients.as_ref().unwrap();
        assert!((coef[0] - 3.0).abs() < 1e-8);
        assert!((coef[1] + 2.0).abs() < 1e-8);
        assert!((model.intercept - 5.0).abs() < 1e-8);
    }

    #[test]
    fn test_constant_column_does_not_fail() {
        let x = array![[1.0, 1.0], [1.0, 2.0], [1.0, 3.0], [1.0, 4.0]];
        let y = array![2.0, 4.0, 6.0, 8.0];

        let mut model = LinearRegression::new();
        model.fit(&x, &y).unwrap();
        let pred = model.predict(&array![[1.0, 5.0]]).unwrap();
        assert!((pred[0] - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_predict_before_fit() {
        let model = LinearRegression::new();
        assert!(matches!(
            model.predict(&array![[1.0]]),
            Err(BmiError::ModelNotFitted)
        ));
    }
}
