//! Random Forest regression

use super::decision_tree::DecisionTreeRegressor;
use super::models::{check_n_features, check_training_data, Regressor};
use crate::error::{BmiError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Bagged regression trees averaged at prediction time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    /// Individual trees
    trees: Vec<DecisionTreeRegressor>,
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: Option<usize>,
    /// Maximum leaves per tree
    pub max_leaf_nodes: Option<usize>,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Bootstrap sampling
    pub bootstrap: bool,
    /// Random state
    pub random_state: u64,
    n_features: usize,
}

impl Default for RandomForestRegressor {
    fn default() -> Self {
        Self::new(100)
    }
}

impl RandomForestRegressor {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            max_leaf_nodes: None,
            min_samples_leaf: 1,
            bootstrap: true,
            random_state: 42,
            n_features: 0,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_max_leaf_nodes(mut self, leaves: usize) -> Self {
        self.max_leaf_nodes = Some(leaves);
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    fn base_tree(&self) -> DecisionTreeRegressor {
        let mut tree = DecisionTreeRegressor::new().with_min_samples_leaf(self.min_samples_leaf);
        tree.max_depth = self.max_depth;
        tree.max_leaf_nodes = self.max_leaf_nodes;
        tree
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Regressor for RandomForestRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_data(x, y)?;
        if self.n_estimators == 0 {
            return Err(BmiError::InvalidParameter {
                name: "n_estimators".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let n_samples = x.nrows();
        let base_seed = self.random_state;

        let trees: Result<Vec<DecisionTreeRegressor>> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let mut tree = self.base_tree();
                if self.bootstrap {
                    let seed = base_seed.wrapping_add(tree_idx as u64);
                    let mut rng = ChaCha8Rng::seed_from_u64(seed);
                    let sample: Vec<usize> = (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();
                    tree.fit(&x.select(Axis(0), &sample), &y.select(Axis(0), &sample))?;
                } else {
                    tree.fit(x, y)?;
                }
                Ok(tree)
            })
            .collect();

        self.trees = trees?;
        self.n_features = x.ncols();
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(BmiError::ModelNotFitted);
        }
        check_n_features(x, self.n_features)?;

        let per_tree: Vec<Array1<f64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<_>>()?;

        // Summed in tree order so the average is reproducible
        let mut total: Array1<f64> = Array1::zeros(x.nrows());
        for pred in &per_tree {
            total += pred;
        }
        Ok(total / self.trees.len() as f64)
    }

    fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regression_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((60, 2), |(i, j)| if j == 0 { i as f64 } else { ((i * 7) % 13) as f64 });
        let y = x.column(0).mapv(|v| 3.0 * v + 1.0);
        (x, y)
    }

    #[test]
    fn test_forest_fits_trend() {
        let (x, y) = regression_data();
        let mut forest = RandomForestRegressor::new(20).with_max_leaf_nodes(30);
        forest.fit(&x, &y).unwrap();
        assert_eq!(forest.n_trees(), 20);

        let pred = forest.predict(&x).unwrap();
        let r2 = crate::training::r2_score(&y, &pred).unwrap();
        assert!(r2 > 0.9, "r2 = {}", r2);
    }

    #[test]
    fn test_forest_is_reproducible() {
        let (x, y) = regression_data();
        let mut a = RandomForestRegressor::new(10).with_random_state(7);
        let mut b = RandomForestRegressor::new(10).with_random_state(7);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_without_bootstrap_matches_single_tree() {
        let (x, y) = regression_data();
        let mut forest = RandomForestRegressor::new(3).with_bootstrap(false).with_max_depth(3);
        forest.fit(&x, &y).unwrap();

        let mut tree = DecisionTreeRegressor::new().with_max_depth(3);
        tree.fit(&x, &y).unwrap();
        let expected = tree.predict(&x).unwrap();
        let got = forest.predict(&x).unwrap();
        for (a, b) in got.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }
}
