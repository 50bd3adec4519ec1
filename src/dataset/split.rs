//! Seeded train/test partitioning

use super::Dataset;
use crate::error::{BmiError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Disjoint train and test partitions of a [`Dataset`]
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub x_train: Array2<f64>,
    pub y_train: Array1<f64>,
    pub x_test: Array2<f64>,
    pub y_test: Array1<f64>,
}

impl TrainTestSplit {
    pub fn n_train(&self) -> usize {
        self.x_train.nrows()
    }

    pub fn n_test(&self) -> usize {
        self.x_test.nrows()
    }
}

impl Dataset {
    /// Shuffle rows with `seed`, then hold out `ceil(test_size * n)` of them.
    ///
    /// The same data, ratio and seed always yield the same partition.
    pub fn train_test_split(&self, test_size: f64, seed: u64) -> Result<TrainTestSplit> {
        if !(test_size > 0.0 && test_size < 1.0) {
            return Err(BmiError::InvalidParameter {
                name: "test_size".to_string(),
                value: test_size.to_string(),
                reason: "must be in (0, 1)".to_string(),
            });
        }

        let n = self.n_samples();
        let n_test = (test_size * n as f64).ceil() as usize;
        if n_test == 0 || n_test >= n {
            return Err(BmiError::DataError(format!(
                "cannot split {} rows with test_size {}: one partition would be empty",
                n, test_size
            )));
        }

        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        let (test_idx, train_idx) = indices.split_at(n_test);

        Ok(TrainTestSplit {
            x_train: self.features.select(Axis(0), train_idx),
            y_train: self.target.select(Axis(0), train_idx),
            x_test: self.features.select(Axis(0), test_idx),
            y_test: self.target.select(Axis(0), test_idx),
        })
    }
}
