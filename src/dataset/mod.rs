//! Dataset loading and partitioning
//!
//! The body-metric CSV carries identifiers and derived columns next to the
//! three features the models use. [`DatasetLoader`] reduces it to a fixed
//! `[Gender, Height, Weight]` matrix plus the `BMI_Post` target, and
//! [`Dataset::train_test_split`] partitions it with a seeded shuffle.

mod loader;
mod split;

pub use loader::{read_csv, DatasetLoader};
pub use split::TrainTestSplit;

use crate::error::{BmiError, Result};
use ndarray::{Array1, Array2};

/// Columns removed before feature extraction
pub const DROPPED_COLUMNS: [&str; 6] = ["Person ID A1", "Feet", "Inches", "Pounds", "Age", "BMI"];

/// Feature columns, in matrix order
pub const FEATURE_COLUMNS: [&str; 3] = ["Gender", "Height", "Weight"];

/// Regression target
pub const TARGET_COLUMN: &str = "BMI_Post";

/// Column index of each feature in the matrix
pub const GENDER_IDX: usize = 0;
pub const HEIGHT_IDX: usize = 1;
pub const WEIGHT_IDX: usize = 2;

/// A preprocessed dataset: `n × 3` features and `n` targets
#[derive(Debug, Clone)]
pub struct Dataset {
    pub features: Array2<f64>,
    pub target: Array1<f64>,
}

impl Dataset {
    pub fn new(features: Array2<f64>, target: Array1<f64>) -> Result<Self> {
        if features.ncols() != FEATURE_COLUMNS.len() {
            return Err(BmiError::ShapeError {
                expected: format!("{} feature columns", FEATURE_COLUMNS.len()),
                actual: format!("{} columns", features.ncols()),
            });
        }
        if features.nrows() != target.len() {
            return Err(BmiError::ShapeError {
                expected: format!("{} targets", features.nrows()),
                actual: format!("{} targets", target.len()),
            });
        }
        Ok(Self { features, target })
    }

    pub fn n_samples(&self) -> usize {
        self.features.nrows()
    }

    pub fn feature_names(&self) -> Vec<String> {
        FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect()
    }
}
