//! Stacking ensemble method

use crate::error::{BmiError, Result};
use crate::training::cross_validation::KFold;
use crate::training::{DecisionTreeRegressor, Regressor, RegressorFactory};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Configuration for stacking ensemble
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackingConfig {
    /// Number of cross-validation folds, taken in row order
    pub n_folds: usize,
}

impl Default for StackingConfig {
    fn default() -> Self {
        Self { n_folds: 5 }
    }
}

/// Stacking regressor.
///
/// Base learners produce out-of-fold predictions that become the features of
/// an unbounded regression tree. After the meta-learner is fitted, every base
/// learner is refitted on the full training set for prediction.
pub struct StackingRegressor {
    /// Configuration
    config: StackingConfig,
    /// Base model factory functions
    base_model_factories: Vec<RegressorFactory>,
    /// Base models refitted on all rows
    fitted_base_models: Vec<Box<dyn Regressor>>,
    /// Fitted meta-learner
    meta_learner: Option<DecisionTreeRegressor>,
}

impl std::fmt::Debug for StackingRegressor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StackingRegressor")
            .field("config", &self.config)
            .field("n_base_models", &self.base_model_factories.len())
            .field("fitted", &self.meta_learner.is_some())
            .finish()
    }
}

impl StackingRegressor {
    /// Create a new stacking regressor
    pub fn new(config: StackingConfig) -> Self {
        Self {
            config,
            base_model_factories: Vec::new(),
            fitted_base_models: Vec::new(),
            meta_learner: None,
        }
    }

    /// Add a base model
    pub fn add_base_model(mut self, factory: RegressorFactory) -> Self {
        self.base_model_factories.push(factory);
        self
    }

    pub fn n_base_models(&self) -> usize {
        self.base_model_factories.len()
    }
}

impl Regressor for StackingRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if self.base_model_factories.is_empty() {
            return Err(BmiError::TrainingError("No base models provided".to_string()));
        }

        let n_samples = x.nrows();
        let splits = KFold::new(self.config.n_folds).split(n_samples)?;

        let mut meta_features = Array2::zeros((n_samples, self.base_model_factories.len()));

        for (base_idx, factory) in self.base_model_factories.iter().enumerate() {
            for split in &splits {
                let x_train = x.select(Axis(0), &split.train_indices);
                let y_train = y.select(Axis(0), &split.train_indices);
                let x_val = x.select(Axis(0), &split.test_indices);

                let mut model = factory();
                model.fit(&x_train, &y_train)?;
                let predictions = model.predict(&x_val)?;

                for (local_idx, &global_idx) in split.test_indices.iter().enumerate() {
                    meta_features[[global_idx, base_idx]] = predictions[local_idx];
                }
            }
        }

        let mut meta_learner = DecisionTreeRegressor::new();
        meta_learner.fit(&meta_features, y)?;

        let mut fitted = Vec::with_capacity(self.base_model_factories.len());
        for factory in &self.base_model_factories {
            let mut model = factory();
            model.fit(x, y)?;
            fitted.push(model);
        }

        self.fitted_base_models = fitted;
        self.meta_learner = Some(meta_learner);
        Ok(())
    }

    /// Make predictions
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let meta_learner = self.meta_learner.as_ref().ok_or(BmiError::ModelNotFitted)?;

        let mut meta_features = Array2::zeros((x.nrows(), self.fitted_base_models.len()));
        for (base_idx, model) in self.fitted_base_models.iter().enumerate() {
            meta_features.column_mut(base_idx).assign(&model.predict(x)?);
        }

        meta_learner.predict(&meta_features)
    }

    fn is_fitted(&self) -> bool {
        self.meta_learner.is_some()
    }
}
