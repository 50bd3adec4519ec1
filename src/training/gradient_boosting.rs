//! Least-squares gradient boosting
//!
//! Starts from the target mean and adds shrunken regression trees, each fitted
//! to the residuals of the ensemble so far.

use super::decision_tree::DecisionTreeRegressor;
use super::models::{check_n_features, check_training_data, Regressor};
use crate::error::{BmiError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// Gradient Boosting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    /// Row subsample ratio for each tree
    pub subsample: f64,
    /// Random seed
    pub random_state: u64,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 1,
            subsample: 1.0,
            random_state: 42,
        }
    }
}

/// Gradient Boosting Regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingRegressor {
    config: GradientBoostingConfig,
    trees: Vec<DecisionTreeRegressor>,
    initial_prediction: f64,
    n_features: usize,
}

impl Default for GradientBoostingRegressor {
    fn default() -> Self {
        Self::new(GradientBoostingConfig::default())
    }
}

impl GradientBoostingRegressor {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            initial_prediction: 0.0,
            n_features: 0,
        }
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.config.n_estimators = n;
        self
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn subsample_indices(&self, n: usize, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
        let sample_size = ((n as f64) * self.config.subsample).ceil() as usize;
        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(rng);
        indices.truncate(sample_size.clamp(1, n));
        indices.sort_unstable();
        indices
    }
}

impl Regressor for GradientBoostingRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_data(x, y)?;
        if !(self.config.subsample > 0.0 && self.config.subsample <= 1.0) {
            return Err(BmiError::InvalidParameter {
                name: "subsample".to_string(),
                value: self.config.subsample.to_string(),
                reason: "must be in (0, 1]".to_string(),
            });
        }

        let n_samples = x.nrows();
        self.initial_prediction = y.mean().unwrap_or(0.0);
        let mut predictions = Array1::from_elem(n_samples, self.initial_prediction);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);
        let mut trees = Vec::with_capacity(self.config.n_estimators);

        for _ in 0..self.config.n_estimators {
            let residuals = y - &predictions;

            let mut tree = DecisionTreeRegressor::new()
                .with_max_depth(self.config.max_depth)
                .with_min_samples_leaf(self.config.min_samples_leaf);

            if self.config.subsample < 1.0 {
                let rows = self.subsample_indices(n_samples, &mut rng);
                tree.fit(&x.select(Axis(0), &rows), &residuals.select(Axis(0), &rows))?;
            } else {
                tree.fit(x, &residuals)?;
            }

            predictions.scaled_add(self.config.learning_rate, &tree.predict(x)?);
            trees.push(tree);
        }

        self.trees = trees;
        self.n_features = x.ncols();
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.n_features == 0 {
            return Err(BmiError::ModelNotFitted);
        }
        check_n_features(x, self.n_features)?;

        let mut predictions = Array1::from_elem(x.nrows(), self.initial_prediction);
        for tree in &self.trees {
            predictions.scaled_add(self.config.learning_rate, &tree.predict(x)?);
        }
        Ok(predictions)
    }

    fn is_fitted(&self) -> bool {
        self.n_features > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((100, 1), |(i, _)| i as f64 / 10.0);
        let y = x.column(0).mapv(f64::sin);
        (x, y)
    }

    #[test]
    fn test_boosting_reduces_training_error() {
        let (x, y) = sine_data();

        let mut few = GradientBoostingRegressor::default().with_n_estimators(2);
        let mut many = GradientBoostingRegressor::default().with_n_estimators(50);
        few.fit(&x, &y).unwrap();
        many.fit(&x, &y).unwrap();

        let mse = |pred: Array1<f64>| (&pred - &y).mapv(|e| e * e).mean().unwrap();
        let few_mse = mse(few.predict(&x).unwrap());
        let many_mse = mse(many.predict(&x).unwrap());
        assert!(many_mse < few_mse);
        assert!(many_mse < 0.05, "mse = {}", many_mse);
    }

    #[test]
    fn test_zero_rounds_predicts_mean() {
        let (x, y) = sine_data();
        let mut model = GradientBoostingRegressor::default().with_n_estimators(0);
        model.fit(&x, &y).unwrap();
        let pred = model.predict(&x).unwrap();
        assert!((pred[0] - y.mean().unwrap()).abs() < 1e-12);
    }

    #[test]
    fn test_subsampled_boosting_is_reproducible() {
        let (x, y) = sine_data();
        let config = GradientBoostingConfig {
            n_estimators: 20,
            subsample: 0.7,
            ..Default::default()
        };
        let mut a = GradientBoostingRegressor::new(config.clone());
        let mut b = GradientBoostingRegressor::new(config);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.n_trees(), 20);
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }
}
