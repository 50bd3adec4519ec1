//! The model bank: the fixed catalog of named regressors trained at startup

use super::adaboost::AdaBoostRegressor;
use super::decision_tree::DecisionTreeRegressor;
use super::gradient_boosting::{GradientBoostingConfig, GradientBoostingRegressor};
use super::knn::KNNRegressor;
use super::linear_models::LinearRegression;
use super::models::{Regressor, RegressorFactory};
use super::random_forest::RandomForestRegressor;
use super::svm::{LinearSVR, SVMConfig};
use crate::ensemble::{StackingConfig, StackingRegressor};
use crate::error::{BmiError, Result};
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

pub const LINEAR_REGRESSION: &str = "Linear Regression";
pub const SVR: &str = "SVR";
pub const KNN: &str = "KNN";
pub const DECISION_TREE: &str = "Decision Tree";
pub const RANDOM_FOREST: &str = "Random Forest";
pub const ADABOOST: &str = "AdaBoost";
pub const GRADIENT_BOOSTING: &str = "Gradient Boosting";
pub const XGBOOST: &str = "XGBoost";
pub const STACKING: &str = "Stacking";

/// Optional estimators available to this build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub xgboost: bool,
}

impl Capabilities {
    /// What was compiled in
    pub fn detect() -> Self {
        Self {
            xgboost: cfg!(feature = "xgboost"),
        }
    }

    /// Runtime switch; cannot enable something that was not compiled in
    pub fn with_xgboost(mut self, enabled: bool) -> Self {
        self.xgboost = self.xgboost && enabled;
        self
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::detect()
    }
}

fn svr() -> Box<dyn Regressor> {
    Box::new(LinearSVR::new(SVMConfig::default()).with_max_iter(251))
}

fn knn() -> Box<dyn Regressor> {
    Box::new(KNNRegressor::with_k(20))
}

fn random_forest() -> Box<dyn Regressor> {
    Box::new(
        RandomForestRegressor::new(100)
            .with_max_leaf_nodes(30)
            .with_random_state(42),
    )
}

#[cfg(feature = "xgboost")]
fn xgboost() -> Option<Box<dyn Regressor>> {
    Some(Box::new(super::xgboost::XGBoostRegressor::default()))
}

#[cfg(not(feature = "xgboost"))]
fn xgboost() -> Option<Box<dyn Regressor>> {
    None
}

fn stacking() -> Box<dyn Regressor> {
    let base: [RegressorFactory; 3] = [Box::new(svr), Box::new(knn), Box::new(random_forest)];
    let stack = base
        .into_iter()
        .fold(StackingRegressor::new(StackingConfig::default()), |stack, factory| {
            stack.add_base_model(factory)
        });
    Box::new(stack)
}

/// Named regressors in display order.
///
/// Built unfitted by [`ModelBank::new`]; [`ModelBank::fit`] trains every entry
/// on the same rows. After that the bank is only read.
pub struct ModelBank {
    models: Vec<(String, Box<dyn Regressor>)>,
}

impl std::fmt::Debug for ModelBank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelBank").field("models", &self.names()).finish()
    }
}

impl ModelBank {
    pub fn new(capabilities: Capabilities) -> Self {
        let mut models: Vec<(String, Box<dyn Regressor>)> = vec![
            (LINEAR_REGRESSION.to_string(), Box::new(LinearRegression::new())),
            (SVR.to_string(), svr()),
            (KNN.to_string(), knn()),
            (
                DECISION_TREE.to_string(),
                Box::new(DecisionTreeRegressor::new().with_max_leaf_nodes(20)),
            ),
            (RANDOM_FOREST.to_string(), random_forest()),
            (ADABOOST.to_string(), Box::new(AdaBoostRegressor::new(20, 1.0))),
            (
                GRADIENT_BOOSTING.to_string(),
                Box::new(GradientBoostingRegressor::new(GradientBoostingConfig {
                    n_estimators: 50,
                    ..Default::default()
                })),
            ),
        ];

        if capabilities.xgboost {
            if let Some(model) = xgboost() {
                models.push((XGBOOST.to_string(), model));
            }
        }
        models.push((STACKING.to_string(), stacking()));

        Self { models }
    }

    /// Fit every model on the same training rows
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let start = Instant::now();
        self.models
            .par_iter_mut()
            .map(|(name, model)| {
                let model_start = Instant::now();
                model
                    .fit(x, y)
                    .map_err(|e| BmiError::TrainingError(format!("{}: {}", name, e)))?;
                info!(
                    model = %name,
                    elapsed_ms = model_start.elapsed().as_millis() as u64,
                    "Model fitted"
                );
                Ok(())
            })
            .collect::<Result<Vec<()>>>()?;

        info!(
            n_models = self.models.len(),
            n_samples = x.nrows(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Model bank trained"
        );
        Ok(())
    }

    /// Look a model up by exact name
    pub fn get(&self, name: &str) -> Result<&dyn Regressor> {
        self.models
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, m)| m.as_ref())
            .ok_or_else(|| BmiError::UnknownModel(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.models.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &dyn Regressor)> {
        self.models.iter().map(|(n, m)| (n.as_str(), m.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_order() {
        let bank = ModelBank::new(Capabilities { xgboost: false });
        assert_eq!(
            bank.names(),
            vec![
                "Linear Regression",
                "SVR",
                "KNN",
                "Decision Tree",
                "Random Forest",
                "AdaBoost",
                "Gradient Boosting",
                "Stacking"
            ]
        );
    }

    #[cfg(feature = "xgboost")]
    #[test]
    fn test_xgboost_capability() {
        let bank = ModelBank::new(Capabilities::detect());
        assert_eq!(bank.len(), 9);
        assert_eq!(bank.names()[7], "XGBoost");

        let disabled = Capabilities::detect().with_xgboost(false);
        assert!(!disabled.xgboost);
    }

    #[test]
    fn test_unknown_model() {
        let bank = ModelBank::new(Capabilities { xgboost: false });
        assert!(matches!(bank.get("Lasso"), Err(BmiError::UnknownModel(_))));
        assert!(bank.get("KNN").is_ok());
    }

    #[test]
    fn test_fit_trains_every_model() {
        let x = Array2::from_shape_fn((60, 3), |(i, j)| match j {
            0 => (i % 2) as f64,
            1 => 150.0 + i as f64,
            _ => 50.0 + (i * 7 % 40) as f64,
        });
        let y = x.column(2).to_owned() / 3.0;

        let mut bank = ModelBank::new(Capabilities { xgboost: false });
        bank.fit(&x, &y).unwrap();
        for (name, model) in bank.iter() {
            assert!(model.is_fitted(), "{} not fitted", name);
            assert_eq!(model.predict(&x).unwrap().len(), 60);
        }
    }
}
