//! The trained model context and prediction requests
//!
//! [`ModelContext`] is built once at startup and then shared read-only. It owns
//! the fitted bank, the cluster router and the hold-out report.

use crate::config::TrainingConfig;
use crate::dataset::{Dataset, DatasetLoader, FEATURE_COLUMNS};
use crate::error::{BmiError, Result};
use crate::evaluation::{EvaluationReport, Evaluator};
use crate::routing::{ClusterRouter, RouterConfig};
use crate::training::{Capabilities, ModelBank};
use ndarray::{Array1, Array2};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// Selector value that asks for cluster routing
pub const BEST_FIT: &str = "Best Fit";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// `"male"` in any case, surrounding whitespace ignored; anything else is female
    pub fn from_label(label: &str) -> Self {
        if label.trim().eq_ignore_ascii_case("male") {
            Gender::Male
        } else {
            Gender::Female
        }
    }

    pub fn as_feature(self) -> f64 {
        match self {
            Gender::Male => 1.0,
            Gender::Female => 0.0,
        }
    }
}

/// Which model answers a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelSelection {
    BestFit,
    Named(String),
}

impl ModelSelection {
    pub fn from_option(algorithm: Option<&str>) -> Self {
        match algorithm {
            None => ModelSelection::BestFit,
            Some(name) if name == BEST_FIT => ModelSelection::BestFit,
            Some(name) => ModelSelection::Named(name.to_string()),
        }
    }
}

/// A validated prediction input. `height` is in centimetres, the unit the
/// models are trained on, and is used as given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub gender: Gender,
    pub height: f64,
    pub weight: f64,
    pub selection: ModelSelection,
}

fn parse_number(field: &str, raw: &str) -> Result<f64> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| BmiError::InvalidInput(format!("could not convert {} to a number: '{}'", field, raw)))?;
    if !value.is_finite() {
        return Err(BmiError::InvalidInput(format!("{} must be a finite number", field)));
    }
    Ok(value)
}

impl PredictionRequest {
    /// Parse raw form fields
    pub fn parse(gender: &str, height: &str, weight: &str, algorithm: Option<&str>) -> Result<Self> {
        Ok(Self {
            gender: Gender::from_label(gender),
            height: parse_number("height", height)?,
            weight: parse_number("weight", weight)?,
            selection: ModelSelection::from_option(algorithm),
        })
    }

    /// Model-space feature row `[Gender, Height, Weight]`
    pub fn features(&self) -> Array1<f64> {
        Array1::from_vec(vec![self.gender.as_feature(), self.height, self.weight])
    }
}

/// A single predicted value and where it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub value: f64,
    pub model: String,
    /// Set when the model was picked by cluster routing
    pub cluster: Option<usize>,
}

/// Everything produced by the startup training routine
#[derive(Debug)]
pub struct ModelContext {
    bank: ModelBank,
    router: ClusterRouter,
    report: EvaluationReport,
    n_train: usize,
    n_test: usize,
}

impl ModelContext {
    /// Load the configured dataset and train everything
    pub fn train(config: &TrainingConfig) -> Result<Self> {
        config.validate()?;
        let dataset = DatasetLoader::new(config.height_scale).load(&config.dataset_path)?;
        Self::from_dataset(&dataset, config)
    }

    /// Train from an already loaded raw frame
    pub fn from_frame(df: &DataFrame, config: &TrainingConfig) -> Result<Self> {
        config.validate()?;
        let dataset = DatasetLoader::new(config.height_scale).from_frame(df)?;
        Self::from_dataset(&dataset, config)
    }

    pub fn from_dataset(dataset: &Dataset, config: &TrainingConfig) -> Result<Self> {
        let start = Instant::now();
        let split = dataset.train_test_split(config.test_size, config.split_seed)?;
        info!(
            n_train = split.n_train(),
            n_test = split.n_test(),
            features = ?FEATURE_COLUMNS,
            "Split dataset"
        );

        let capabilities = Capabilities::detect().with_xgboost(config.enable_xgboost);
        let mut bank = ModelBank::new(capabilities);
        bank.fit(&split.x_train, &split.y_train)?;

        let router = ClusterRouter::build(
            &bank,
            &split.x_train,
            &split.y_train,
            RouterConfig {
                n_clusters: config.n_clusters,
                random_state: config.cluster_seed,
            },
        )?;
        let report = Evaluator::evaluate(&bank, &split.x_test, &split.y_test)?;

        info!(
            n_models = bank.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Training complete"
        );

        Ok(Self {
            bank,
            router,
            report,
            n_train: split.n_train(),
            n_test: split.n_test(),
        })
    }

    pub fn predict(&self, request: &PredictionRequest) -> Result<Prediction> {
        let features = request.features();

        let (model_name, cluster) = match &request.selection {
            ModelSelection::BestFit => {
                let decision = self.router.route(features.view())?;
                (decision.model, Some(decision.cluster))
            }
            ModelSelection::Named(name) => (name.clone(), None),
        };

        let model = self.bank.get(&model_name)?;
        let input = Array2::from_shape_vec((1, features.len()), features.to_vec())?;
        let value = model
            .predict(&input)?
            .first()
            .copied()
            .ok_or_else(|| BmiError::TrainingError(format!("{} returned no prediction", model_name)))?;

        debug!(model = %model_name, ?cluster, value, "Prediction");
        Ok(Prediction {
            value,
            model: model_name,
            cluster,
        })
    }

    /// `Best Fit` followed by every model name
    pub fn algorithm_options(&self) -> Vec<String> {
        std::iter::once(BEST_FIT.to_string())
            .chain(self.bank.names().into_iter().map(str::to_string))
            .collect()
    }

    pub fn report(&self) -> &EvaluationReport {
        &self.report
    }

    pub fn router(&self) -> &ClusterRouter {
        &self.router
    }

    pub fn bank(&self) -> &ModelBank {
        &self.bank
    }

    pub fn n_train(&self) -> usize {
        self.n_train
    }

    pub fn n_test(&self) -> usize {
        self.n_test
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gender_labels() {
        assert_eq!(Gender::from_label("Male"), Gender::Male);
        assert_eq!(Gender::from_label("  MALE "), Gender::Male);
        assert_eq!(Gender::from_label("female"), Gender::Female);
        assert_eq!(Gender::from_label("other"), Gender::Female);
        assert_eq!(Gender::Male.as_feature(), 1.0);
    }

    #[test]
    fn test_parse_request() {
        let req = PredictionRequest::parse("female", "165", " 60 ", Some("Linear Regression")).unwrap();
        assert_eq!(req.gender, Gender::Female);
        assert_eq!(req.selection, ModelSelection::Named("Linear Regression".to_string()));
        let features = req.features();
        assert_eq!(features[0], 0.0);
        assert_eq!(features[1], 165.0);
        assert_eq!(features[2], 60.0);
    }

    #[test]
    fn test_request_height_is_not_rescaled() {
        let req = PredictionRequest::parse("male", "1.65", "60", None).unwrap();
        assert_eq!(req.features()[1], 1.65);
    }

    #[test]
    fn test_selection_defaults_to_best_fit() {
        assert_eq!(ModelSelection::from_option(None), ModelSelection::BestFit);
        assert_eq!(ModelSelection::from_option(Some("Best Fit")), ModelSelection::BestFit);
    }

    #[test]
    fn test_parse_rejects_bad_numbers() {
        assert!(PredictionRequest::parse("male", "tall", "70", None).is_err());
        assert!(PredictionRequest::parse("male", "1.8", "NaN", None).is_err());
        assert!(PredictionRequest::parse("male", "1.8", "", None).is_err());
    }
}
