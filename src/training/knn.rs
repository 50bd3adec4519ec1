//! K-Nearest Neighbors regression

use super::models::{check_n_features, check_training_data, Regressor};
use crate::error::{BmiError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Distance metric for KNN
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// Euclidean distance (L2)
    #[default]
    Euclidean,
    /// Manhattan distance (L1)
    Manhattan,
}

/// Weighting scheme for neighbors
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum WeightScheme {
    /// All neighbors have equal weight
    #[default]
    Uniform,
    /// Closer neighbors have more weight (inverse distance)
    Distance,
}

/// KNN configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNConfig {
    /// Number of neighbors
    pub n_neighbors: usize,
    /// Distance metric
    pub metric: DistanceMetric,
    /// Weighting scheme
    pub weights: WeightScheme,
}

impl Default for KNNConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 5,
            metric: DistanceMetric::Euclidean,
            weights: WeightScheme::Uniform,
        }
    }
}

/// K-Nearest Neighbors Regressor.
///
/// When fewer than `k` training rows exist, all of them are used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNRegressor {
    config: KNNConfig,
    x_train: Option<Array2<f64>>,
    y_train: Option<Array1<f64>>,
}

impl KNNRegressor {
    pub fn new(config: KNNConfig) -> Self {
        Self {
            config,
            x_train: None,
            y_train: None,
        }
    }

    /// Create with default config and specified k
    pub fn with_k(k: usize) -> Self {
        Self::new(KNNConfig {
            n_neighbors: k,
            ..Default::default()
        })
    }

    pub fn with_weights(mut self, weights: WeightScheme) -> Self {
        self.config.weights = weights;
        self
    }

    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.config.metric = metric;
        self
    }
}

impl Regressor for KNNRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_data(x, y)?;
        if self.config.n_neighbors == 0 {
            return Err(BmiError::InvalidParameter {
                name: "n_neighbors".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        self.x_train = Some(x.clone());
        self.y_train = Some(y.clone());
        Ok(())
    }

    /// Predict target values (parallelized over query rows)
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (x_train, y_train) = match (&self.x_train, &self.y_train) {
            (Some(x), Some(y)) => (x, y),
            _ => return Err(BmiError::ModelNotFitted),
        };
        check_n_features(x, x_train.ncols())?;

        let k = self.config.n_neighbors.min(x_train.nrows());
        let metric = self.config.metric;
        let weights = self.config.weights;

        let predictions: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let neighbors = find_k_nearest(x.row(i), x_train, y_train, k, metric);
                weighted_mean_from(&neighbors, weights)
            })
            .collect();

        Ok(Array1::from_vec(predictions))
    }

    fn is_fitted(&self) -> bool {
        self.x_train.is_some()
    }
}

/// Max-heap entry keeping the k smallest distances; ties go to the earlier row
#[derive(PartialEq)]
struct Neighbor {
    dist: f64,
    index: usize,
    target: f64,
}

impl Eq for Neighbor {}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist
            .total_cmp(&other.dist)
            .then(self.index.cmp(&other.index))
    }
}

/// k nearest training rows in ascending distance, O(n log k)
fn find_k_nearest(
    point: ArrayView1<f64>,
    x_train: &Array2<f64>,
    y_train: &Array1<f64>,
    k: usize,
    metric: DistanceMetric,
) -> Vec<(f64, f64)> {
    let mut heap = BinaryHeap::with_capacity(k + 1);

    for (index, row) in x_train.rows().into_iter().enumerate() {
        let candidate = Neighbor {
            dist: compute_distance(point, row, metric),
            index,
            target: y_train[index],
        };
        if heap.len() < k {
            heap.push(candidate);
        } else if let Some(top) = heap.peek() {
            if candidate < *top {
                heap.pop();
                heap.push(candidate);
            }
        }
    }

    heap.into_sorted_vec()
        .into_iter()
        .map(|n| (n.dist, n.target))
        .collect()
}

fn compute_distance(a: ArrayView1<f64>, b: ArrayView1<f64>, metric: DistanceMetric) -> f64 {
    match metric {
        DistanceMetric::Euclidean => a
            .iter()
            .zip(b.iter())
            .map(|(ai, bi)| (ai - bi) * (ai - bi))
            .sum::<f64>()
            .sqrt(),
        DistanceMetric::Manhattan => a.iter().zip(b.iter()).map(|(ai, bi)| (ai - bi).abs()).sum(),
    }
}

fn weighted_mean_from(neighbors: &[(f64, f64)], weights: WeightScheme) -> f64 {
    let uniform = || neighbors.iter().map(|(_, y)| y).sum::<f64>() / neighbors.len() as f64;
    match weights {
        WeightScheme::Uniform => uniform(),
        WeightScheme::Distance => {
            // An exact match takes the average of all exact matches
            let exact: Vec<f64> = neighbors
                .iter()
                .filter(|(d, _)| *d == 0.0)
                .map(|(_, y)| *y)
                .collect();
            if !exact.is_empty() {
                return exact.iter().sum::<f64>() / exact.len() as f64;
            }

            let (weighted_sum, weight_total) = neighbors
                .iter()
                .fold((0.0, 0.0), |(s, t), &(dist, y)| (s + y / dist, t + 1.0 / dist));
            if weight_total > 0.0 {
                weighted_sum / weight_total
            } else {
                uniform()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn create_regression_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_vec((6, 1), vec![1.0, 2.0, 3.0, 10.0, 11.0, 12.0]).unwrap();
        let y = array![1.0, 2.0, 3.0, 10.0, 11.0, 12.0];
        (x, y)
    }

    #[test]
    fn test_knn_regressor() {
        let (x, y) = create_regression_data();
        let mut knn = KNNRegressor::with_k(3);
        knn.fit(&x, &y).unwrap();

        let pred = knn.predict(&array![[2.0], [11.0]]).unwrap();
        assert!((pred[0] - 2.0).abs() < 1e-12);
        assert!((pred[1] - 11.0).abs() < 1e-12);
    }

    #[test]
    fn test_k_larger_than_training_set() {
        let (x, y) = create_regression_data();
        let mut knn = KNNRegressor::with_k(20);
        knn.fit(&x, &y).unwrap();

        let pred = knn.predict(&array![[0.0]]).unwrap();
        assert!((pred[0] - y.mean().unwrap()).abs() < 1e-12);
    }

    #[test]
    fn test_distance_weighting() {
        let (x, y) = create_regression_data();
        let mut knn = KNNRegressor::with_k(2).with_weights(WeightScheme::Distance);
        knn.fit(&x, &y).unwrap();

        // Neighbours 1.0 (d=0.25) and 2.0 (d=0.75)
        let pred = knn.predict(&array![[1.25]]).unwrap();
        assert!((pred[0] - 1.25).abs() < 1e-9);

        let exact = knn.predict(&array![[3.0]]).unwrap();
        assert_eq!(exact[0], 3.0);
    }

    #[test]
    fn test_manhattan_metric() {
        // From the origin: (3, 0) is nearer in L1, (2, 2) is nearer in L2
        let x = array![[3.0, 0.0], [2.0, 2.0]];
        let y = array![1.0, 2.0];
        let query = array![[0.0, 0.0]];

        let mut l1 = KNNRegressor::with_k(1).with_metric(DistanceMetric::Manhattan);
        l1.fit(&x, &y).unwrap();
        assert_eq!(l1.predict(&query).unwrap()[0], 1.0);

        let mut l2 = KNNRegressor::with_k(1);
        l2.fit(&x, &y).unwrap();
        assert_eq!(l2.predict(&query).unwrap()[0], 2.0);
    }

    #[test]
    fn test_predict_before_fit() {
        let knn = KNNRegressor::with_k(3);
        assert!(knn.predict(&array![[1.0]]).is_err());
    }
}
