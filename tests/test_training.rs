//! Integration test: startup training pipeline end-to-end

mod common;

use bmi_forecast::dataset::{read_csv, DatasetLoader};
use bmi_forecast::prediction::{Gender, ModelContext, ModelSelection, PredictionRequest};
use bmi_forecast::preprocessing::StandardScaler;
use bmi_forecast::training::{Capabilities, DECISION_TREE, KNN, LINEAR_REGRESSION, STACKING};

fn request(algorithm: &str, height: f64, weight: f64) -> PredictionRequest {
    PredictionRequest {
        gender: Gender::Female,
        height,
        weight,
        selection: ModelSelection::from_option(Some(algorithm)),
    }
}

#[test]
fn test_loading_twice_gives_identical_scaled_matrices() {
    let file = common::write_fixture();
    let loader = DatasetLoader::new(100.0);

    let first = loader.load(file.path()).unwrap();
    let second = loader.load(file.path()).unwrap();
    assert_eq!(first.features, second.features);
    assert_eq!(first.target, second.target);

    let scaled_first = StandardScaler::new().fit_transform(&first.features).unwrap();
    let scaled_second = StandardScaler::new().fit_transform(&second.features).unwrap();
    assert_eq!(scaled_first, scaled_second);
}

#[test]
fn test_loader_drops_unused_columns_and_rescales_height() {
    let file = common::write_fixture();
    let df = read_csv(file.path()).unwrap();
    let dataset = DatasetLoader::new(100.0).from_frame(&df).unwrap();

    assert_eq!(dataset.features.dim(), (common::N_ROWS, 3));
    assert_eq!(dataset.feature_names(), vec!["Gender", "Height", "Weight"]);
    // Row 0 is male, 1.58 m
    assert_eq!(dataset.features[[0, 0]], 1.0);
    assert!((dataset.features[[0, 1]] - 158.0).abs() < 1e-9);
    assert_eq!(dataset.features[[1, 0]], 0.0);
}

#[test]
fn test_bank_catalog_and_split_sizes() {
    let context = common::shared_context();
    assert_eq!(context.n_train() + context.n_test(), common::N_ROWS);
    assert_eq!(context.n_test(), 24);

    let names = context.bank().names();
    assert_eq!(names.first().copied(), Some(LINEAR_REGRESSION));
    assert_eq!(names.last().copied(), Some(STACKING));
    let expected = if Capabilities::detect().xgboost { 9 } else { 8 };
    assert_eq!(context.bank().len(), expected);
}

#[test]
fn test_named_prediction_returns_one_finite_number() {
    let context = common::shared_context();
    let prediction = context.predict(&request(LINEAR_REGRESSION, 165.0, 60.0)).unwrap();
    assert_eq!(prediction.model, LINEAR_REGRESSION);
    assert!(prediction.cluster.is_none());
    assert!(prediction.value.is_finite());
    // 60 / 1.65^2 * 0.94 is roughly 20.7; a height rescaled to 16500 would not land here
    assert!(prediction.value > 15.0 && prediction.value < 27.0);
}

#[test]
fn test_repeated_predictions_are_identical() {
    let context = common::shared_context();
    for name in context.bank().names() {
        let req = request(name, 170.0, 68.0);
        let first = context.predict(&req).unwrap();
        let second = context.predict(&req).unwrap();
        assert_eq!(first.value, second.value, "{}", name);
    }
}

#[test]
fn test_retraining_is_deterministic() {
    let file = common::write_fixture();
    let config = common::training_config(&file);
    let first = ModelContext::train(&config).unwrap();
    let second = ModelContext::train(&config).unwrap();

    for name in [LINEAR_REGRESSION, KNN, DECISION_TREE] {
        let req = request(name, 162.0, 55.0);
        assert_eq!(first.predict(&req).unwrap().value, second.predict(&req).unwrap().value, "{}", name);
    }
    assert_eq!(first.router().assignments(), second.router().assignments());
}

#[test]
fn test_best_fit_uses_cluster_model() {
    let context = common::shared_context();
    for (height, weight) in [(152.0, 46.0), (166.0, 62.0), (180.0, 90.0)] {
        let routed = context.predict(&request("Best Fit", height, weight)).unwrap();
        let cluster = routed.cluster.unwrap();
        let assignment = &context.router().assignments()[&cluster];
        assert_eq!(routed.model, assignment.model);

        let direct = context.predict(&request(&assignment.model, height, weight)).unwrap();
        assert_eq!(routed.value, direct.value);
    }
}

#[test]
fn test_evaluation_best_has_highest_r2() {
    let context = common::shared_context();
    let report = context.report();
    let best = report.best();
    assert_eq!(report.iter().count(), context.bank().len());
    for score in report.iter() {
        assert!(score.metrics.r2 <= best.metrics.r2, "{}", score.name);
    }
    assert!(best.metrics.r2 > 0.5);
}

#[test]
fn test_missing_dataset_fails() {
    let config = bmi_forecast::config::TrainingConfig::default().with_dataset_path("/nonexistent/bmi.csv");
    assert!(ModelContext::train(&config).is_err());
}
