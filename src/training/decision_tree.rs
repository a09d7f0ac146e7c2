//! CART decision tree used as the base learner of the random forests

use crate::error::{RaError, Result};
use ndarray::{Array1, Array2};
use rand::seq::index::sample;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf {
        value: f64,
        n_samples: usize,
    },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum Criterion {
    /// Gini impurity (classification)
    Gini,
    /// Entropy (classification)
    Entropy,
    /// Mean squared error (regression)
    MSE,
    /// Mean absolute error (regression)
    MAE,
}

impl Criterion {
    /// Parse a criterion name, accepting both the short and the long spellings
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "gini" => Some(Criterion::Gini),
            "entropy" | "log_loss" => Some(Criterion::Entropy),
            "mse" | "squared_error" => Some(Criterion::MSE),
            "mae" | "absolute_error" => Some(Criterion::MAE),
            _ => None,
        }
    }

    pub fn is_classification(&self) -> bool {
        matches!(self, Criterion::Gini | Criterion::Entropy)
    }
}

/// Running statistics of one side of a candidate split
#[derive(Default, Clone)]
struct SideStats {
    count: usize,
    sum: f64,
    sq_sum: f64,
    class_counts: HashMap<i64, usize>,
}

impl SideStats {
    fn push(&mut self, y: f64) {
        self.count += 1;
        self.sum += y;
        self.sq_sum += y * y;
        *self.class_counts.entry(y.round() as i64).or_insert(0) += 1;
    }

    fn pop(&mut self, y: f64) {
        self.count -= 1;
        self.sum -= y;
        self.sq_sum -= y * y;
        if let Some(c) = self.class_counts.get_mut(&(y.round() as i64)) {
            *c -= 1;
        }
    }
}

/// Decision tree model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Number of features drawn at every split (all when `None`)
    pub max_features: Option<usize>,
    /// A split is kept only if it decreases the weighted impurity by at least this much
    pub min_impurity_decrease: f64,
    /// Impurity criterion
    pub criterion: Criterion,
    /// Seed for the per-split feature draw
    pub random_state: Option<u64>,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
    is_classification: bool,
    classes: Vec<f64>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new_classifier()
    }
}

impl DecisionTree {
    /// Create a new classifier tree
    pub fn new_classifier() -> Self {
        Self::with_task(true)
    }

    /// Create a new regressor tree
    pub fn new_regressor() -> Self {
        Self::with_task(false)
    }

    fn with_task(is_classification: bool) -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            min_impurity_decrease: 0.0,
            criterion: if is_classification { Criterion::Gini } else { Criterion::MSE },
            random_state: None,
            n_features: 0,
            feature_importances: None,
            is_classification,
            classes: Vec::new(),
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features.max(1));
        self
    }

    pub fn with_min_impurity_decrease(mut self, decrease: f64) -> Self {
        self.min_impurity_decrease = decrease.max(0.0);
        self
    }

    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Fit the tree to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(RaError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 || n_features == 0 {
            return Err(RaError::ValidationError(
                "Cannot fit a tree on an empty matrix".to_string(),
            ));
        }
        if self.criterion.is_classification() != self.is_classification {
            return Err(RaError::ValidationError(format!(
                "Criterion {:?} does not match the tree task",
                self.criterion
            )));
        }

        self.n_features = n_features;

        if self.is_classification {
            let mut classes: Vec<f64> = y.iter().copied().collect();
            classes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
            classes.dedup();
            self.classes = classes;
        }

        let mut importances = vec![0.0; n_features];
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state.unwrap_or(0));

        let indices: Vec<usize> = (0..n_samples).collect();
        let root = self.build_tree(x, y, &indices, 0, n_samples, &mut importances, &mut rng);
        self.root = Some(root);

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(self)
    }

    #[allow(clippy::too_many_arguments)]
    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        depth: usize,
        n_total: usize,
        importances: &mut [f64],
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n_samples = indices.len();
        let y_subset: Vec<f64> = indices.iter().map(|&i| y[i]).collect();

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || is_pure(&y_subset);

        let leaf = || TreeNode::Leaf {
            value: self.compute_leaf_value(&y_subset),
            n_samples,
        };

        if should_stop {
            return leaf();
        }

        let features = self.draw_features(x.ncols(), rng);
        let parent_impurity = self.compute_impurity(&y_subset);

        let Some((feature, threshold, gain)) = self.find_best_split(x, y, indices, &features, parent_impurity) else {
            return leaf();
        };

        // Weighted decrease relative to the whole training set
        let weighted_decrease = n_samples as f64 / n_total as f64 * gain;
        if weighted_decrease < self.min_impurity_decrease {
            return leaf();
        }

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, feature]] <= threshold);

        if left_indices.len() < self.min_samples_leaf || right_indices.len() < self.min_samples_leaf {
            return leaf();
        }

        importances[feature] += n_samples as f64 * gain;

        let left = Box::new(self.build_tree(x, y, &left_indices, depth + 1, n_total, importances, rng));
        let right = Box::new(self.build_tree(x, y, &right_indices, depth + 1, n_total, importances, rng));

        TreeNode::Split {
            feature_idx: feature,
            threshold,
            left,
            right,
            n_samples,
            impurity: parent_impurity,
        }
    }

    fn draw_features(&self, n_features: usize, rng: &mut ChaCha8Rng) -> Vec<usize> {
        match self.max_features {
            Some(k) if k < n_features => {
                let mut features = sample(rng, n_features, k).into_vec();
                features.sort_unstable();
                features
            }
            _ => (0..n_features).collect(),
        }
    }

    /// Returns `(feature, threshold, impurity decrease)` of the best split, if any improves.
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        features: &[usize],
        parent_impurity: f64,
    ) -> Option<(usize, f64, f64)> {
        let n = indices.len() as f64;

        let feature_results: Vec<Option<(usize, f64, f64)>> = features
            .par_iter()
            .map(|&feature_idx| {
                let mut sorted: Vec<usize> = indices.to_vec();
                sorted.sort_by(|&a, &b| {
                    x[[a, feature_idx]]
                        .partial_cmp(&x[[b, feature_idx]])
                        .unwrap_or(Ordering::Equal)
                });

                let mut left = SideStats::default();
                let mut right = SideStats::default();
                for &i in &sorted {
                    right.push(y[i]);
                }

                let mut best: Option<(f64, f64)> = None;
                for pos in 0..sorted.len() - 1 {
                    let yi = y[sorted[pos]];
                    left.push(yi);
                    right.pop(yi);

                    let current = x[[sorted[pos], feature_idx]];
                    let next = x[[sorted[pos + 1], feature_idx]];
                    if next <= current {
                        continue;
                    }
                    if left.count < self.min_samples_leaf || right.count < self.min_samples_leaf {
                        continue;
                    }

                    let (left_imp, right_imp) = if self.criterion == Criterion::MAE {
                        let left_y: Vec<f64> = sorted[..=pos].iter().map(|&i| y[i]).collect();
                        let right_y: Vec<f64> = sorted[pos + 1..].iter().map(|&i| y[i]).collect();
                        (mae(&left_y), mae(&right_y))
                    } else {
                        (self.impurity_from_stats(&left), self.impurity_from_stats(&right))
                    };

                    let weighted = (left.count as f64 * left_imp + right.count as f64 * right_imp) / n;
                    let gain = parent_impurity - weighted;
                    if gain > best.map_or(0.0, |(g, _)| g) {
                        best = Some((gain, (current + next) / 2.0));
                    }
                }

                best.map(|(gain, threshold)| (feature_idx, threshold, gain))
            })
            .collect();

        feature_results
            .into_iter()
            .flatten()
            .max_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(Ordering::Equal))
    }

    fn impurity_from_stats(&self, stats: &SideStats) -> f64 {
        if stats.count == 0 {
            return 0.0;
        }
        let n = stats.count as f64;
        match self.criterion {
            Criterion::Gini => {
                1.0 - stats
                    .class_counts
                    .values()
                    .map(|&c| (c as f64 / n).powi(2))
                    .sum::<f64>()
            }
            Criterion::Entropy => -stats
                .class_counts
                .values()
                .filter(|&&c| c > 0)
                .map(|&c| {
                    let p = c as f64 / n;
                    p * p.ln()
                })
                .sum::<f64>(),
            // Var = E[X²] - E[X]²
            Criterion::MSE | Criterion::MAE => (stats.sq_sum / n - (stats.sum / n).powi(2)).max(0.0),
        }
    }

    fn compute_impurity(&self, y: &[f64]) -> f64 {
        if y.is_empty() {
            return 0.0;
        }
        match self.criterion {
            Criterion::MAE => mae(y),
            _ => {
                let mut stats = SideStats::default();
                for &v in y {
                    stats.push(v);
                }
                self.impurity_from_stats(&stats)
            }
        }
    }

    fn compute_leaf_value(&self, y: &[f64]) -> f64 {
        if y.is_empty() {
            return 0.0;
        }

        if self.is_classification {
            // Mode; ties resolve to the smallest class
            let mut counts: HashMap<i64, usize> = HashMap::new();
            for &val in y {
                *counts.entry(val.round() as i64).or_insert(0) += 1;
            }
            counts
                .into_iter()
                .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
                .map(|(class, _)| class as f64)
                .unwrap_or(0.0)
        } else if self.criterion == Criterion::MAE {
            median(y)
        } else {
            y.iter().sum::<f64>() / y.len() as f64
        }
    }

    /// Make predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self
            .root
            .as_ref()
            .ok_or_else(|| RaError::not_fitted("DecisionTree"))?;

        if x.ncols() != self.n_features {
            return Err(RaError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }

        let predictions: Vec<f64> = x
            .outer_iter()
            .map(|row| {
                let mut node = root;
                loop {
                    match node {
                        TreeNode::Leaf { value, .. } => break *value,
                        TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                            node = if row[*feature_idx] <= *threshold { &**left } else { &**right };
                        }
                    }
                }
            })
            .collect();

        Ok(Array1::from_vec(predictions))
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Classes seen during fit (classification only)
    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    /// Get tree depth
    pub fn get_depth(&self) -> usize {
        fn depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => 1 + depth(left).max(depth(right)),
            }
        }
        self.root.as_ref().map_or(0, depth)
    }

    /// Get number of leaves
    pub fn get_n_leaves(&self) -> usize {
        fn leaves(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => leaves(left) + leaves(right),
            }
        }
        self.root.as_ref().map_or(0, leaves)
    }
}

fn is_pure(y: &[f64]) -> bool {
    match y.first() {
        None => true,
        Some(&first) => y.iter().all(|&v| (v - first).abs() < 1e-10),
    }
}

fn median(y: &[f64]) -> f64 {
    let mut sorted = y.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn mae(y: &[f64]) -> f64 {
    if y.is_empty() {
        return 0.0;
    }
    let m = median(y);
    y.iter().map(|&v| (v - m).abs()).sum::<f64>() / y.len() as f64
}
