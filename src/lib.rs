//! bmi-forecast - Post-intervention BMI prediction service
//!
//! Trains a bank of regression models once at startup, routes each incoming
//! request to the model that performed best on its KMeans cluster, and serves
//! the result through a small signup/login web front end.
//!
//! # Modules
//!
//! ## Core ML Modules
//! - [`dataset`] - CSV loading, column selection, seeded train/test split
//! - [`preprocessing`] - Feature standardization
//! - [`training`] - Regression estimators, KMeans, the model bank
//! - [`ensemble`] - Stacked regression
//! - [`routing`] - Cluster-based "Best Fit" model selection
//! - [`evaluation`] - Hold-out metrics per model
//! - [`prediction`] - The immutable trained context and request parsing
//! - [`analysis`] - Descriptive statistics over the raw dataset
//!
//! ## Services
//! - [`auth`] - Password hashing, user storage, cookie sessions
//! - [`server`] - HTTP server
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;
pub mod config;

// Core ML modules
pub mod dataset;
pub mod preprocessing;
pub mod training;
pub mod ensemble;
pub mod routing;
pub mod evaluation;
pub mod prediction;
pub mod analysis;

// Services
pub mod auth;
pub mod server;
pub mod cli;

pub use error::{BmiError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{BmiError, Result};
    pub use crate::config::TrainingConfig;

    pub use crate::dataset::{Dataset, DatasetLoader, TrainTestSplit};
    pub use crate::preprocessing::StandardScaler;
    pub use crate::training::{Capabilities, ModelBank, ModelMetrics, Regressor};
    pub use crate::routing::{ClusterRouter, RouteDecision};
    pub use crate::evaluation::{EvaluationReport, Evaluator};
    pub use crate::prediction::{Gender, ModelContext, ModelSelection, Prediction, PredictionRequest};
    pub use crate::analysis::DatasetAnalysis;
}
