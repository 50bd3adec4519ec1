//! K-Means clustering
//!
//! Unsupervised: takes X only. Used by the router to partition the scaled
//! training features; `labels()` always agrees with `predict()` on the
//! training rows.

use crate::error::{BmiError, Result};
use ndarray::{Array2, ArrayView1};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════════
//  K-Means Clustering
// ═══════════════════════════════════════════════════════════════════════════

/// K-Means clustering with k-means++ initialization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KMeans {
    pub n_clusters: usize,
    pub max_iter: usize,
    pub tol: f64,
    /// Number of independent restarts; the lowest inertia wins
    pub n_init: usize,
    pub random_state: u64,
    /// Fitted cluster centroids (n_clusters × n_features)
    centroids: Option<Array2<f64>>,
    /// Cluster of each training row
    labels: Vec<usize>,
    /// Sum of squared distances to nearest centroid (inertia)
    inertia: Option<f64>,
}

impl Default for KMeans {
    fn default() -> Self {
        Self::new(5)
    }
}

impl KMeans {
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            max_iter: 300,
            tol: 1e-4,
            n_init: 1,
            random_state: 42,
            centroids: None,
            labels: Vec::new(),
            inertia: None,
        }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init.max(1);
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    fn euclidean_sq(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
    }

    /// Nearest centroid; the lower index wins ties
    fn nearest(row: ArrayView1<f64>, centroids: &Array2<f64>) -> (usize, f64) {
        let mut best_c = 0;
        let mut best_dist = f64::INFINITY;
        for (c, centroid) in centroids.outer_iter().enumerate() {
            let d = Self::euclidean_sq(row, centroid);
            if d < best_dist {
                best_dist = d;
                best_c = c;
            }
        }
        (best_c, best_dist)
    }

    fn assign(x: &Array2<f64>, centroids: &Array2<f64>) -> Vec<(usize, f64)> {
        (0..x.nrows())
            .into_par_iter()
            .map(|i| Self::nearest(x.row(i), centroids))
            .collect()
    }

    /// K-means++ initialization: pick centroids spread apart
    fn kmeans_pp_init(x: &Array2<f64>, k: usize, rng: &mut ChaCha8Rng) -> Array2<f64> {
        let n_samples = x.nrows();
        let mut centroids = Array2::zeros((k, x.ncols()));

        let first = rng.gen_range(0..n_samples);
        centroids.row_mut(0).assign(&x.row(first));

        let mut dists: Vec<f64> = (0..n_samples)
            .map(|i| Self::euclidean_sq(x.row(i), x.row(first)))
            .collect();

        for c in 1..k {
            // Weighted random selection proportional to D²
            let total: f64 = dists.iter().sum();
            let chosen = if total <= 0.0 {
                rng.gen_range(0..n_samples)
            } else {
                let r = rng.gen::<f64>() * total;
                let mut cumulative = 0.0;
                let mut chosen = n_samples - 1;
                for (i, &d) in dists.iter().enumerate() {
                    cumulative += d;
                    if cumulative > r {
                        chosen = i;
                        break;
                    }
                }
                chosen
            };
            centroids.row_mut(c).assign(&x.row(chosen));

            for (i, d) in dists.iter_mut().enumerate() {
                *d = d.min(Self::euclidean_sq(x.row(i), x.row(chosen)));
            }
        }

        centroids
    }

    /// One Lloyd run from a k-means++ start
    fn run(&self, x: &Array2<f64>, rng: &mut ChaCha8Rng) -> (Array2<f64>, Vec<usize>, f64) {
        let n_samples = x.nrows();
        let mut centroids = Self::kmeans_pp_init(x, self.n_clusters, rng);

        for _iter in 0..self.max_iter {
            let labels: Vec<usize> = Self::assign(x, &centroids).into_iter().map(|(c, _)| c).collect();

            let mut new_centroids = Array2::zeros(centroids.dim());
            let mut counts = vec![0usize; self.n_clusters];
            for (i, &c) in labels.iter().enumerate() {
                counts[c] += 1;
                let mut row = new_centroids.row_mut(c);
                row += &x.row(i);
            }

            for c in 0..self.n_clusters {
                if counts[c] > 0 {
                    new_centroids.row_mut(c).mapv_inplace(|v| v / counts[c] as f64);
                } else {
                    // Empty cluster: restart it on a random row
                    let idx = rng.gen_range(0..n_samples);
                    new_centroids.row_mut(c).assign(&x.row(idx));
                }
            }

            let shift: f64 = (&centroids - &new_centroids).mapv(|v| v * v).sum();
            centroids = new_centroids;
            if shift <= self.tol * self.tol {
                break;
            }
        }

        // Final assignment against the final centroids
        let assigned = Self::assign(x, &centroids);
        let inertia = assigned.iter().map(|(_, d)| d).sum();
        let labels = assigned.into_iter().map(|(c, _)| c).collect();
        (centroids, labels, inertia)
    }

    /// Fit the model (unsupervised, no y needed)
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        if self.n_clusters == 0 {
            return Err(BmiError::InvalidParameter {
                name: "n_clusters".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if n_samples < self.n_clusters {
            return Err(BmiError::TrainingError(format!(
                "n_samples ({}) < n_clusters ({})",
                n_samples, self.n_clusters
            )));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let mut best: Option<(Array2<f64>, Vec<usize>, f64)> = None;
        for _ in 0..self.n_init.max(1) {
            let candidate = self.run(x, &mut rng);
            if best.as_ref().map_or(true, |b| candidate.2 < b.2) {
                best = Some(candidate);
            }
        }

        if let Some((centroids, labels, inertia)) = best {
            self.centroids = Some(centroids);
            self.labels = labels;
            self.inertia = Some(inertia);
        }
        Ok(self)
    }

    /// Predict cluster labels for new data
    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        let centroids = self.centroids.as_ref().ok_or(BmiError::ModelNotFitted)?;
        if x.ncols() != centroids.ncols() {
            return Err(BmiError::ShapeError {
                expected: format!("{} features", centroids.ncols()),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(Self::assign(x, centroids).into_iter().map(|(c, _)| c).collect())
    }

    /// Cluster of a single row
    pub fn predict_one(&self, row: ArrayView1<f64>) -> Result<usize> {
        let centroids = self.centroids.as_ref().ok_or(BmiError::ModelNotFitted)?;
        if row.len() != centroids.ncols() {
            return Err(BmiError::ShapeError {
                expected: format!("{} features", centroids.ncols()),
                actual: format!("{} features", row.len()),
            });
        }
        Ok(Self::nearest(row, centroids).0)
    }

    /// Get cluster centroids
    pub fn centroids(&self) -> Option<&Array2<f64>> {
        self.centroids.as_ref()
    }

    /// Training-row labels from the last fit
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    pub fn inertia(&self) -> Option<f64> {
        self.inertia
    }

    pub fn is_fitted(&self) -> bool {
        self.centroids.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn three_blobs() -> Array2<f64> {
        let mut data = Vec::new();
        for (cx, cy) in [(0.0, 0.0), (10.0, 10.0), (-10.0, 10.0)] {
            for k in 0..10 {
                let dx = (k % 3) as f64 * 0.1;
                let dy = (k / 3) as f64 * 0.1;
                data.push(cx + dx);
                data.push(cy + dy);
            }
        }
        Array2::from_shape_vec((30, 2), data).unwrap()
    }

    #[test]
    fn test_kmeans_separates_blobs() {
        let x = three_blobs();
        let mut km = KMeans::new(3).with_random_state(42);
        km.fit(&x).unwrap();

        let labels = km.labels();
        for blob in 0..3 {
            let first = labels[blob * 10];
            assert!(labels[blob * 10..blob * 10 + 10].iter().all(|&l| l == first));
        }
        assert_ne!(labels[0], labels[10]);
        assert_ne!(labels[10], labels[20]);
        assert_ne!(labels[0], labels[20]);
    }

    #[test]
    fn test_labels_match_predict() {
        let x = three_blobs();
        let mut km = KMeans::new(3);
        km.fit(&x).unwrap();
        assert_eq!(km.predict(&x).unwrap(), km.labels().to_vec());
        assert_eq!(km.predict_one(x.row(25)).unwrap(), km.labels()[25]);
    }

    #[test]
    fn test_kmeans_is_seeded() {
        let x = three_blobs();
        let mut a = KMeans::new(4).with_random_state(7);
        let mut b = KMeans::new(4).with_random_state(7);
        a.fit(&x).unwrap();
        b.fit(&x).unwrap();
        assert_eq!(a.labels(), b.labels());
        assert_eq!(a.centroids(), b.centroids());
    }

    #[test]
    fn test_kmeans_inertia_small_for_tight_blobs() {
        let x = three_blobs();
        let mut km = KMeans::new(3).with_n_init(3);
        km.fit(&x).unwrap();
        assert!(km.inertia().unwrap() < 1.0);
    }

    #[test]
    fn test_too_few_samples() {
        let x = array![[1.0, 2.0]];
        assert!(KMeans::new(2).fit(&x).is_err());
    }
}
