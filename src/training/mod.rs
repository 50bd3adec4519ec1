//! Model training module
//!
//! Native regression estimators on `ndarray`:
//! - Ordinary least squares
//! - Linear ε-SVR
//! - K-Nearest Neighbors
//! - Decision trees and Random Forests
//! - AdaBoost.R2, gradient boosting, XGBoost-style boosting (feature `xgboost`)
//! - KMeans clustering
//!
//! and the [`ModelBank`] that trains the fixed catalog used by the service.

mod bank;
mod models;
pub mod adaboost;
pub mod clustering;
pub mod cross_validation;
pub mod decision_tree;
pub mod gradient_boosting;
pub mod knn;
pub mod linear_models;
pub mod random_forest;
pub mod svm;
#[cfg(feature = "xgboost")]
pub mod xgboost;

pub use adaboost::AdaBoostRegressor;
pub use bank::{
    Capabilities, ModelBank, ADABOOST, DECISION_TREE, GRADIENT_BOOSTING, KNN, LINEAR_REGRESSION,
    RANDOM_FOREST, STACKING, SVR, XGBOOST,
};
pub use clustering::KMeans;
pub use cross_validation::{CVSplit, KFold};
pub use decision_tree::{DecisionTreeRegressor, TreeNode};
pub use gradient_boosting::{GradientBoostingConfig, GradientBoostingRegressor};
pub use knn::{DistanceMetric, KNNConfig, KNNRegressor, WeightScheme};
pub use linear_models::LinearRegression;
pub use models::{r2_score, ModelMetrics, Regressor, RegressorFactory};
pub use random_forest::RandomForestRegressor;
pub use svm::{LinearSVR, SVMConfig};
#[cfg(feature = "xgboost")]
pub use xgboost::{XGBoostConfig, XGBoostRegressor};
