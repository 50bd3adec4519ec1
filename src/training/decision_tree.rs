//! Regression tree (CART, squared-error criterion)
//!
//! Without a leaf budget the tree grows until its stopping rules hold. With
//! `max_leaf_nodes` set, growth is best-first: the frontier leaf whose split
//! removes the most squared error is expanded next, until the budget is spent.

use super::models::{check_n_features, check_training_data, Regressor};
use crate::error::{BmiError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Decision tree node, stored in a flat arena; children are arena indices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf { value: f64, n_samples: usize },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: usize,
        right: usize,
        n_samples: usize,
    },
}

/// Best split found for one node
#[derive(Debug, Clone)]
struct SplitInfo {
    feature_idx: usize,
    threshold: f64,
    /// Reduction in total squared error
    gain: f64,
}

/// A leaf that may still be split
struct Frontier {
    node: usize,
    depth: usize,
    indices: Vec<usize>,
    split: SplitInfo,
}

/// Decision tree regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTreeRegressor {
    /// Maximum depth (root is depth 0)
    pub max_depth: Option<usize>,
    /// Maximum number of leaves, grown best-first
    pub max_leaf_nodes: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    nodes: Vec<TreeNode>,
    n_features: usize,
}

impl Default for DecisionTreeRegressor {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTreeRegressor {
    pub fn new() -> Self {
        Self {
            max_depth: None,
            max_leaf_nodes: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            nodes: Vec::new(),
            n_features: 0,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_max_leaf_nodes(mut self, leaves: usize) -> Self {
        self.max_leaf_nodes = Some(leaves);
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    fn leaf(y: &Array1<f64>, indices: &[usize]) -> TreeNode {
        let sum: f64 = indices.iter().map(|&i| y[i]).sum();
        TreeNode::Leaf {
            value: sum / indices.len() as f64,
            n_samples: indices.len(),
        }
    }

    /// Best split for the rows in `indices`, or `None` if the node must stay a leaf
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        depth: usize,
    ) -> Option<SplitInfo> {
        let n = indices.len();
        if n < self.min_samples_split.max(2) || n < 2 * self.min_samples_leaf.max(1) {
            return None;
        }
        if self.max_depth.map_or(false, |d| depth >= d) {
            return None;
        }

        let first = y[indices[0]];
        if indices.iter().all(|&i| y[i] == first) {
            return None;
        }

        let total_sum: f64 = indices.iter().map(|&i| y[i]).sum();
        let total_sq: f64 = indices.iter().map(|&i| y[i] * y[i]).sum();
        let parent_sse = total_sq - total_sum * total_sum / n as f64;
        let min_leaf = self.min_samples_leaf.max(1);

        // Each feature is scanned independently
        let per_feature: Vec<Option<SplitInfo>> = (0..x.ncols())
            .into_par_iter()
            .map(|feature_idx| {
                let mut order = indices.to_vec();
                order.sort_by(|&a, &b| x[[a, feature_idx]].total_cmp(&x[[b, feature_idx]]));

                let mut best: Option<SplitInfo> = None;
                let mut left_sum = 0.0;
                let mut left_sq = 0.0;

                for pos in 0..n - 1 {
                    let yi = y[order[pos]];
                    left_sum += yi;
                    left_sq += yi * yi;

                    let current = x[[order[pos], feature_idx]];
                    let next = x[[order[pos + 1], feature_idx]];
                    if next <= current {
                        continue;
                    }

                    let left_n = pos + 1;
                    let right_n = n - left_n;
                    if left_n < min_leaf || right_n < min_leaf {
                        continue;
                    }

                    let right_sum = total_sum - left_sum;
                    let right_sq = total_sq - left_sq;
                    let left_sse = left_sq - left_sum * left_sum / left_n as f64;
                    let right_sse = right_sq - right_sum * right_sum / right_n as f64;
                    let gain = parent_sse - left_sse - right_sse;

                    if gain > best.as_ref().map_or(1e-12, |b| b.gain) {
                        let mut threshold = current + (next - current) / 2.0;
                        if threshold >= next {
                            threshold = current;
                        }
                        best = Some(SplitInfo { feature_idx, threshold, gain });
                    }
                }
                best
            })
            .collect();

        // Earlier features win ties
        per_feature.into_iter().flatten().fold(None, |acc: Option<SplitInfo>, s| match acc {
            Some(a) if a.gain >= s.gain => Some(a),
            _ => Some(s),
        })
    }

    fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut node = 0;
        loop {
            match &self.nodes[node] {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    node = if row[*feature_idx] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, TreeNode::Leaf { .. }))
            .count()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[TreeNode], node: usize) -> usize {
            match &nodes[node] {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }
}

impl Regressor for DecisionTreeRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_data(x, y)?;
        if self.max_leaf_nodes.map_or(false, |m| m < 2) {
            return Err(BmiError::InvalidParameter {
                name: "max_leaf_nodes".to_string(),
                value: format!("{:?}", self.max_leaf_nodes),
                reason: "must be at least 2".to_string(),
            });
        }

        let root: Vec<usize> = (0..x.nrows()).collect();
        let mut nodes = vec![Self::leaf(y, &root)];
        let mut frontier: Vec<Frontier> = Vec::new();
        if let Some(split) = self.find_best_split(x, y, &root, 0) {
            frontier.push(Frontier { node: 0, depth: 0, indices: root, split });
        }

        let mut n_leaves = 1;
        while !frontier.is_empty() {
            if self.max_leaf_nodes.map_or(false, |m| n_leaves >= m) {
                break;
            }

            let pos = if self.max_leaf_nodes.is_some() {
                // Largest gain first; the oldest node wins ties
                let mut best = 0;
                for (i, f) in frontier.iter().enumerate().skip(1) {
                    let b = &frontier[best];
                    if f.split.gain > b.split.gain || (f.split.gain == b.split.gain && f.node < b.node) {
                        best = i;
                    }
                }
                best
            } else {
                frontier.len() - 1
            };
            let Frontier { node, depth, indices, split } = frontier.remove(pos);

            let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
                .iter()
                .partition(|&&i| x[[i, split.feature_idx]] <= split.threshold);

            let left = nodes.len();
            nodes.push(Self::leaf(y, &left_idx));
            let right = nodes.len();
            nodes.push(Self::leaf(y, &right_idx));
            nodes[node] = TreeNode::Split {
                feature_idx: split.feature_idx,
                threshold: split.threshold,
                left,
                right,
                n_samples: indices.len(),
            };
            n_leaves += 1;

            for (child, child_idx) in [(left, left_idx), (right, right_idx)] {
                if let Some(s) = self.find_best_split(x, y, &child_idx, depth + 1) {
                    frontier.push(Frontier {
                        node: child,
                        depth: depth + 1,
                        indices: child_idx,
                        split: s,
                    });
                }
            }
        }

        self.nodes = nodes;
        self.n_features = x.ncols();
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.nodes.is_empty() {
            return Err(BmiError::ModelNotFitted);
        }
        check_n_features(x, self.n_features)?;
        Ok(x.outer_iter().map(|row| self.predict_row(row)).collect())
    }

    fn is_fitted(&self) -> bool {
        !self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn step_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((40, 2), |(i, j)| if j == 0 { i as f64 } else { (i % 3) as f64 });
        let y = Array1::from_shape_fn(40, |i| (i / 5) as f64 * 10.0);
        (x, y)
    }

    #[test]
    fn test_unbounded_tree_interpolates_training_data() {
        let (x, y) = step_data();
        let mut tree = DecisionTreeRegressor::new();
        tree.fit(&x, &y).unwrap();

        let pred = tree.predict(&x).unwrap();
        assert_eq!(pred, y);
        assert_eq!(tree.n_leaves(), 8);
    }

    #[test]
    fn test_max_leaf_nodes_is_respected() {
        let (x, y) = step_data();
        let mut tree = DecisionTreeRegressor::new().with_max_leaf_nodes(4);
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.n_leaves(), 4);
    }

    #[test]
    fn test_best_first_takes_largest_gain() {
        // One big jump at x = 10 and a small wiggle on the left
        let x = Array2::from_shape_fn((20, 1), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(20, |i| if i >= 10 { 100.0 } else if i >= 5 { 1.0 } else { 0.0 });

        let mut tree = DecisionTreeRegressor::new().with_max_leaf_nodes(2);
        tree.fit(&x, &y).unwrap();
        let pred = tree.predict(&array![[3.0], [7.0], [15.0]]).unwrap();
        assert!((pred[0] - 0.5).abs() < 1e-12);
        assert!((pred[1] - 0.5).abs() < 1e-12);
        assert_eq!(pred[2], 100.0);
    }

    #[test]
    fn test_max_depth() {
        let (x, y) = step_data();
        let mut tree = DecisionTreeRegressor::new().with_max_depth(2);
        tree.fit(&x, &y).unwrap();
        assert!(tree.depth() <= 2);
        assert!(tree.n_leaves() <= 4);
    }

    #[test]
    fn test_constant_target_is_single_leaf() {
        let x = array![[1.0], [2.0], [3.0]];
        let y = array![5.0, 5.0, 5.0];
        let mut tree = DecisionTreeRegressor::new();
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.n_leaves(), 1);
        assert_eq!(tree.predict(&array![[10.0]]).unwrap()[0], 5.0);
    }

    #[test]
    fn test_predict_before_fit() {
        let tree = DecisionTreeRegressor::new();
        assert!(matches!(tree.predict(&array![[1.0]]), Err(BmiError::ModelNotFitted)));
    }
}
