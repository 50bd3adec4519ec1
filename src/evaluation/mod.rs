//! Hold-out evaluation of the model bank

use crate::error::{BmiError, Result};
use crate::training::{ModelBank, ModelMetrics};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Metrics of one named model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelScore {
    pub name: String,
    pub metrics: ModelMetrics,
}

/// Test-set metrics for every model, in catalog order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub entries: Vec<ModelScore>,
    /// Index into `entries` of the highest R²
    best: usize,
}

impl EvaluationReport {
    /// Highest test R²; the earlier entry wins ties
    pub fn best(&self) -> &ModelScore {
        &self.entries[self.best]
    }

    pub fn get(&self, name: &str) -> Option<&ModelMetrics> {
        self.entries.iter().find(|e| e.name == name).map(|e| &e.metrics)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModelScore> {
        self.entries.iter()
    }
}

pub struct Evaluator;

impl Evaluator {
    pub fn evaluate(bank: &ModelBank, x_test: &Array2<f64>, y_test: &Array1<f64>) -> Result<EvaluationReport> {
        let mut entries: Vec<ModelScore> = Vec::with_capacity(bank.len());
        let mut best = 0;

        for (name, model) in bank.iter() {
            let metrics = ModelMetrics::compute(y_test, &model.predict(x_test)?)?;
            if !entries.is_empty() && metrics.r2 > entries[best].metrics.r2 {
                best = entries.len();
            }
            entries.push(ModelScore {
                name: name.to_string(),
                metrics,
            });
        }

        if entries.is_empty() {
            return Err(BmiError::TrainingError("no models to evaluate".to_string()));
        }

        let report = EvaluationReport { entries, best };
        info!(
            best_model = %report.best().name,
            r2 = report.best().metrics.r2,
            "Evaluation complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::Capabilities;

    #[test]
    fn test_report_covers_every_model() {
        let x = Array2::from_shape_fn((50, 3), |(i, j)| (i * (j + 1) % 23) as f64);
        let y = Array1::from_shape_fn(50, |i| 2.0 * x[[i, 0]] - x[[i, 2]] + 4.0);

        let mut bank = ModelBank::new(Capabilities { xgboost: false });
        bank.fit(&x, &y).unwrap();
        let report = Evaluator::evaluate(&bank, &x, &y).unwrap();

        assert_eq!(report.entries.len(), bank.len());
        let best_r2 = report.best().metrics.r2;
        assert!(report.iter().all(|e| e.metrics.r2 <= best_r2));

        // Linear target: OLS is exact
        let linear = report.get("Linear Regression").unwrap();
        assert!(linear.r2 > 0.999_999);
        assert!(report.get("Lasso").is_none());
    }
}
