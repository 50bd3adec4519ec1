//! Training configuration
//!
//! Everything the startup training routine needs: where the dataset lives,
//! how it is split, how the router clusters it, and which optional models
//! are allowed into the bank. Server-side settings live in
//! [`crate::server::ServerConfig`].

use crate::error::{BmiError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default location of the body-metric CSV
pub const DEFAULT_DATASET_PATH: &str = "static/BMI_main.csv";

/// Configuration for the startup training routine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Path to the CSV dataset
    pub dataset_path: PathBuf,
    /// Factor applied to the dataset's `Height` column when loading
    pub height_scale: f64,
    /// Fraction of rows held out for evaluation
    pub test_size: f64,
    /// Seed for the train/test shuffle
    pub split_seed: u64,
    /// Number of KMeans clusters used for "Best Fit" routing
    pub n_clusters: usize,
    /// Seed for KMeans initialization
    pub cluster_seed: u64,
    /// Include the XGBoost entry when the capability is compiled in
    pub enable_xgboost: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from(DEFAULT_DATASET_PATH),
            height_scale: 100.0,
            test_size: 0.2,
            split_seed: 30,
            n_clusters: 5,
            cluster_seed: 42,
            enable_xgboost: true,
        }
    }
}

impl TrainingConfig {
    /// Defaults overridden by `DATASET_PATH` and `ENABLE_XGBOOST`
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(path) = std::env::var("DATASET_PATH") {
            config.dataset_path = PathBuf::from(path);
        }
        if let Ok(flag) = std::env::var("ENABLE_XGBOOST") {
            config.enable_xgboost = parse_flag(&flag).unwrap_or(config.enable_xgboost);
        }
        config
    }

    pub fn with_dataset_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.dataset_path = path.into();
        self
    }

    pub fn with_xgboost(mut self, enabled: bool) -> Self {
        self.enable_xgboost = enabled;
        self
    }

    /// Reject settings the training routine cannot run with
    pub fn validate(&self) -> Result<()> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(BmiError::InvalidParameter {
                name: "test_size".to_string(),
                value: self.test_size.to_string(),
                reason: "must be in (0, 1)".to_string(),
            });
        }
        if self.n_clusters == 0 {
            return Err(BmiError::InvalidParameter {
                name: "n_clusters".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if !self.height_scale.is_finite() || self.height_scale <= 0.0 {
            return Err(BmiError::ConfigError(format!(
                "height_scale must be a positive number, got {}",
                self.height_scale
            )));
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TrainingConfig::default();
        assert_eq!(config.split_seed, 30);
        assert_eq!(config.cluster_seed, 42);
        assert_eq!(config.n_clusters, 5);
        assert!((config.test_size - 0.2).abs() < 1e-12);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_test_size() {
        let mut config = TrainingConfig::default();
        config.test_size = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag("off"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
