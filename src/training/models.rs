//! Regressor trait and evaluation metrics

use crate::error::{BmiError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Regression metrics for one model on one set of rows
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    /// Mean Absolute Error
    pub mae: f64,
    /// Mean Squared Error
    pub mse: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Coefficient of determination
    pub r2: f64,
}

impl ModelMetrics {
    /// Compute MAE, MSE, RMSE and R² of `y_pred` against `y_true`
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self> {
        check_lengths(y_true, y_pred)?;
        let n = y_true.len() as f64;

        let errors: Vec<f64> = y_true
            .iter()
            .zip(y_pred.iter())
            .map(|(t, p)| t - p)
            .collect();

        let mse = errors.iter().map(|e| e * e).sum::<f64>() / n;
        let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;

        Ok(Self {
            mae,
            mse,
            rmse: mse.sqrt(),
            r2: r2_score(y_true, y_pred)?,
        })
    }
}

/// R² score.
///
/// When the targets are constant the score is 1.0 for an exact fit and 0.0
/// otherwise, so it is always finite.
pub fn r2_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    let n = y_true.len() as f64;

    let y_mean = y_true.sum() / n;
    let ss_tot: f64 = y_true.iter().map(|y| (y - y_mean).powi(2)).sum();
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum();

    if ss_tot > 0.0 {
        Ok(1.0 - ss_res / ss_tot)
    } else if ss_res == 0.0 {
        Ok(1.0)
    } else {
        Ok(0.0)
    }
}

fn check_lengths(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<()> {
    if y_true.is_empty() {
        return Err(BmiError::InvalidInput("cannot score an empty target vector".to_string()));
    }
    if y_true.len() != y_pred.len() {
        return Err(BmiError::ShapeError {
            expected: format!("{} predictions", y_true.len()),
            actual: format!("{} predictions", y_pred.len()),
        });
    }
    Ok(())
}

/// Check that `x` and `y` describe the same non-empty set of rows
pub(crate) fn check_training_data(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() == 0 {
        return Err(BmiError::TrainingError("no training samples".to_string()));
    }
    if x.nrows() != y.len() {
        return Err(BmiError::ShapeError {
            expected: format!("{} targets", x.nrows()),
            actual: format!("{} targets", y.len()),
        });
    }
    Ok(())
}

/// Check that a prediction matrix has the width the model was fitted on
pub(crate) fn check_n_features(x: &Array2<f64>, n_features: usize) -> Result<()> {
    if x.ncols() != n_features {
        return Err(BmiError::ShapeError {
            expected: format!("{} features", n_features),
            actual: format!("{} features", x.ncols()),
        });
    }
    Ok(())
}

/// A regression estimator that can be fitted once and queried many times
pub trait Regressor: Send + Sync {
    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Predict one value per row of `x`
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    fn is_fitted(&self) -> bool;
}

/// Builds a fresh, unfitted regressor
pub type RegressorFactory = Box<dyn Fn() -> Box<dyn Regressor> + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_regression_metrics() {
        let y_true = array![3.0, -0.5, 2.0, 7.0];
        let y_pred = array![2.5, 0.0, 2.0, 8.0];

        let metrics = ModelMetrics::compute(&y_true, &y_pred).unwrap();
        assert!((metrics.mae - 0.5).abs() < 1e-12);
        assert!((metrics.mse - 0.375).abs() < 1e-12);
        assert!((metrics.rmse - 0.375f64.sqrt()).abs() < 1e-12);
        assert!((metrics.r2 - 0.948_608_137_044_967_9).abs() < 1e-9);
    }

    #[test]
    fn test_r2_constant_target() {
        let y = array![2.0, 2.0, 2.0];
        assert_eq!(r2_score(&y, &y).unwrap(), 1.0);
        assert_eq!(r2_score(&y, &array![2.0, 2.0, 3.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_length_mismatch() {
        assert!(ModelMetrics::compute(&array![1.0, 2.0], &array![1.0]).is_err());
        assert!(r2_score(&array![], &array![]).is_err());
    }
}
