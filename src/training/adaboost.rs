//! AdaBoost.R2 regression
//!
//! Each round fits a shallow tree on a weighted bootstrap of the training set,
//! measures its linear loss on every row, and shifts weight toward the rows it
//! got wrong. Predictions are the weighted median of the rounds.

use super::decision_tree::DecisionTreeRegressor;
use super::models::{check_n_features, check_training_data, Regressor};
use crate::error::{BmiError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// AdaBoost regressor (R2 variant, linear loss)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaBoostRegressor {
    pub n_estimators: usize,
    pub learning_rate: f64,
    /// Depth of each base tree
    pub max_depth: usize,
    pub random_state: u64,
    estimators: Vec<DecisionTreeRegressor>,
    estimator_weights: Vec<f64>,
    n_features: usize,
}

impl Default for AdaBoostRegressor {
    fn default() -> Self {
        Self::new(50, 1.0)
    }
}

impl AdaBoostRegressor {
    pub fn new(n_estimators: usize, learning_rate: f64) -> Self {
        Self {
            n_estimators,
            learning_rate,
            max_depth: 3,
            random_state: 42,
            estimators: Vec::new(),
            estimator_weights: Vec::new(),
            n_features: 0,
        }
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn n_rounds(&self) -> usize {
        self.estimators.len()
    }

    /// Draw `n` row indices with replacement, proportional to `weights`
    fn weighted_bootstrap(weights: &[f64], rng: &mut ChaCha8Rng) -> Vec<usize> {
        let mut cumulative = Vec::with_capacity(weights.len());
        let mut total = 0.0;
        for w in weights {
            total += w;
            cumulative.push(total);
        }

        (0..weights.len())
            .map(|_| {
                let r = rng.gen::<f64>() * total;
                cumulative
                    .partition_point(|&c| c <= r)
                    .min(weights.len() - 1)
            })
            .collect()
    }
}

/// Smallest value whose cumulative weight reaches half the total
fn weighted_median(values: &[f64], weights: &[f64]) -> f64 {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let half = weights.iter().sum::<f64>() / 2.0;
    let mut cumulative = 0.0;
    for &i in &order {
        cumulative += weights[i];
        if cumulative >= half {
            return values[i];
        }
    }
    values[order[order.len() - 1]]
}

impl Regressor for AdaBoostRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_data(x, y)?;
        if self.n_estimators == 0 {
            return Err(BmiError::InvalidParameter {
                name: "n_estimators".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let n = x.nrows();
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let mut sample_weights = vec![1.0 / n as f64; n];
        let mut estimators = Vec::with_capacity(self.n_estimators);
        let mut estimator_weights = Vec::with_capacity(self.n_estimators);

        for round in 0..self.n_estimators {
            let sample = Self::weighted_bootstrap(&sample_weights, &mut rng);
            let mut tree = DecisionTreeRegressor::new().with_max_depth(self.max_depth);
            tree.fit(&x.select(Axis(0), &sample), &y.select(Axis(0), &sample))?;

            let pred = tree.predict(x)?;
            let errors: Vec<f64> = pred.iter().zip(y.iter()).map(|(p, t)| (p - t).abs()).collect();
            let max_error = errors.iter().cloned().fold(0.0, f64::max);

            let loss: Vec<f64> = if max_error > 0.0 {
                errors.iter().map(|e| e / max_error).collect()
            } else {
                vec![0.0; n]
            };
            let estimator_error: f64 = loss.iter().zip(&sample_weights).map(|(l, w)| l * w).sum();

            if estimator_error <= 0.0 {
                // Perfect fit: keep it and stop
                estimators.push(tree);
                estimator_weights.push(1.0);
                break;
            }
            if estimator_error >= 0.5 {
                if estimators.is_empty() {
                    estimators.push(tree);
                    estimator_weights.push(1.0);
                }
                debug!(round, estimator_error, "AdaBoost stopped: weak learner no better than chance");
                break;
            }

            let beta = estimator_error / (1.0 - estimator_error);
            let weight = self.learning_rate * (1.0 / beta).ln();

            for (w, l) in sample_weights.iter_mut().zip(&loss) {
                *w *= beta.powf((1.0 - l) * self.learning_rate);
            }
            let total: f64 = sample_weights.iter().sum();
            if total <= 0.0 {
                estimators.push(tree);
                estimator_weights.push(weight);
                break;
            }
            sample_weights.iter_mut().for_each(|w| *w /= total);

            estimators.push(tree);
            estimator_weights.push(weight);
        }

        self.estimators = estimators;
        self.estimator_weights = estimator_weights;
        self.n_features = x.ncols();
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.estimators.is_empty() {
            return Err(BmiError::ModelNotFitted);
        }
        check_n_features(x, self.n_features)?;

        let per_round: Vec<Array1<f64>> = self
            .estimators
            .iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<_>>()?;

        let predictions = (0..x.nrows())
            .map(|i| {
                let values: Vec<f64> = per_round.iter().map(|p| p[i]).collect();
                weighted_median(&values, &self.estimator_weights)
            })
            .collect();
        Ok(predictions)
    }

    fn is_fitted(&self) -> bool {
        !self.estimators.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weighted_median() {
        assert_eq!(weighted_median(&[3.0, 1.0, 2.0], &[1.0, 1.0, 1.0]), 2.0);
        assert_eq!(weighted_median(&[3.0, 1.0, 2.0], &[5.0, 1.0, 1.0]), 3.0);
        assert_eq!(weighted_median(&[4.0, 8.0], &[1.0, 1.0]), 4.0);
    }

    #[test]
    fn test_weighted_bootstrap_respects_zero_weight() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let sample = AdaBoostRegressor::weighted_bootstrap(&[0.0, 1.0, 0.0], &mut rng);
        assert!(sample.iter().all(|&i| i == 1));
    }

    #[test]
    fn test_adaboost_fits_nonlinear_target() {
        let x = Array2::from_shape_fn((80, 1), |(i, _)| i as f64 / 8.0);
        let y = x.column(0).mapv(|v| (v - 5.0).powi(2));

        let mut model = AdaBoostRegressor::new(20, 1.0);
        model.fit(&x, &y).unwrap();
        assert!(model.n_rounds() >= 1 && model.n_rounds() <= 20);

        let pred = model.predict(&x).unwrap();
        let r2 = crate::training::r2_score(&y, &pred).unwrap();
        assert!(r2 > 0.8, "r2 = {}", r2);
    }

    #[test]
    fn test_adaboost_is_reproducible() {
        let x = Array2::from_shape_fn((40, 2), |(i, j)| ((i + 3 * j) % 17) as f64);
        let y = Array1::from_shape_fn(40, |i| (i % 7) as f64);

        let mut a = AdaBoostRegressor::new(10, 1.0);
        let mut b = AdaBoostRegressor::new(10, 1.0);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }
}
