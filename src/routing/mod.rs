//! Cluster-based "Best Fit" model selection
//!
//! The training rows are standardized and partitioned with KMeans. Each
//! cluster remembers the bank entry with the highest in-sample R² on its own
//! rows, and an incoming feature vector is served by the entry recorded for
//! its nearest centroid.

use crate::error::{BmiError, Result};
use crate::preprocessing::StandardScaler;
use crate::training::{r2_score, KMeans, ModelBank};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Clustering settings for the router
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RouterConfig {
    pub n_clusters: usize,
    pub random_state: u64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            n_clusters: 5,
            random_state: 42,
        }
    }
}

/// The winning model of one cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    pub cluster: usize,
    pub model: String,
    /// In-sample R² of `model` on the cluster's rows
    pub score: f64,
    pub n_samples: usize,
}

/// Outcome of routing one feature vector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDecision {
    pub cluster: usize,
    pub model: String,
}

#[derive(Debug)]
pub struct ClusterRouter {
    scaler: StandardScaler,
    kmeans: KMeans,
    assignments: BTreeMap<usize, ClusterAssignment>,
}

impl ClusterRouter {
    /// Fit scaler and KMeans on `x_train`, then score every bank entry per cluster.
    ///
    /// Scores use the unscaled rows, the same inputs the models were fitted on.
    /// Ties keep the earlier catalog entry. Clusters left without rows get no
    /// assignment.
    pub fn build(bank: &ModelBank, x_train: &Array2<f64>, y_train: &Array1<f64>, config: RouterConfig) -> Result<Self> {
        if bank.is_empty() {
            return Err(BmiError::TrainingError("model bank is empty".to_string()));
        }
        if x_train.nrows() != y_train.len() {
            return Err(BmiError::ShapeError {
                expected: format!("{} targets", x_train.nrows()),
                actual: format!("{} targets", y_train.len()),
            });
        }

        let mut scaler = StandardScaler::new();
        let scaled = scaler.fit_transform(x_train)?;

        let mut kmeans = KMeans::new(config.n_clusters).with_random_state(config.random_state);
        kmeans.fit(&scaled)?;

        let mut members: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (row, &cluster) in kmeans.labels().iter().enumerate() {
            members.entry(cluster).or_default().push(row);
        }

        let mut assignments = BTreeMap::new();
        for cluster in 0..config.n_clusters {
            let Some(rows) = members.get(&cluster) else {
                warn!(cluster, "Cluster has no training rows; it will not be routable");
                continue;
            };
            let x_c = x_train.select(Axis(0), rows);
            let y_c = y_train.select(Axis(0), rows);

            let mut best: Option<(&str, f64)> = None;
            for (name, model) in bank.iter() {
                let score = r2_score(&y_c, &model.predict(&x_c)?)?;
                if best.map_or(true, |(_, s)| score > s) {
                    best = Some((name, score));
                }
            }

            if let Some((model, score)) = best {
                info!(cluster, model, score, n_samples = rows.len(), "Cluster assignment");
                assignments.insert(
                    cluster,
                    ClusterAssignment {
                        cluster,
                        model: model.to_string(),
                        score,
                        n_samples: rows.len(),
                    },
                );
            }
        }

        Ok(Self {
            scaler,
            kmeans,
            assignments,
        })
    }

    /// Route one unscaled feature vector to the model recorded for its cluster
    pub fn route(&self, features: ArrayView1<f64>) -> Result<RouteDecision> {
        let scaled = self.scaler.transform(features.insert_axis(Axis(0)))?;
        let cluster = self.kmeans.predict_one(scaled.row(0))?;
        let assignment = self
            .assignments
            .get(&cluster)
            .ok_or(BmiError::UnknownCluster(cluster))?;
        Ok(RouteDecision {
            cluster,
            model: assignment.model.clone(),
        })
    }

    /// Cluster of each training row passed to [`ClusterRouter::build`]
    pub fn training_labels(&self) -> &[usize] {
        self.kmeans.labels()
    }

    pub fn assignments(&self) -> &BTreeMap<usize, ClusterAssignment> {
        &self.assignments
    }

    pub fn centroids(&self) -> Option<&Array2<f64>> {
        self.kmeans.centroids()
    }
}
