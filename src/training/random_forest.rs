//! Random Forest implementation

use crate::error::{RaError, Result};
use super::decision_tree::{Criterion, DecisionTree};
use ndarray::{Array1, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Random Forest model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: MinSamplesSplit,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Minimum fraction of the training set required in a leaf
    pub min_weight_fraction_leaf: f64,
    /// Features drawn at every split
    pub max_features: MaxFeatures,
    /// Minimum weighted impurity decrease of a split
    pub min_impurity_decrease: f64,
    /// Bootstrap sampling
    pub bootstrap: bool,
    /// Compute the out-of-bag score after fit
    pub oob_score: bool,
    /// Size of each bootstrap sample (whole training set when `None`)
    pub max_samples: Option<MaxSamples>,
    /// Impurity criterion
    pub criterion: Criterion,
    /// Random state
    pub random_state: Option<u64>,
    /// Per-tree progress logging
    pub verbose: i64,
    is_classification: bool,
    oob_score_value: Option<f64>,
    feature_importances: Option<Array1<f64>>,
    n_features: usize,
    classes: Vec<f64>,
}

/// Strategy for max features
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// Square root of n_features
    Sqrt,
    /// Log2 of n_features
    Log2,
    /// Fraction of n_features
    Fraction(f64),
    /// Fixed number
    Fixed(usize),
    /// All features
    All,
}

/// Minimum node size eligible for splitting
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MinSamplesSplit {
    Count(usize),
    /// Fraction of the training samples, rounded up
    Fraction(f64),
}

/// Bootstrap sample size
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxSamples {
    Count(usize),
    /// Fraction of the training samples, rounded up
    Fraction(f64),
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new_classifier(100)
    }
}

impl RandomForest {
    /// Create a new classifier forest
    pub fn new_classifier(n_estimators: usize) -> Self {
        Self::with_task(n_estimators, true)
    }

    /// Create a new regressor forest
    pub fn new_regressor(n_estimators: usize) -> Self {
        Self::with_task(n_estimators, false)
    }

    fn with_task(n_estimators: usize, is_classification: bool) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_split: MinSamplesSplit::Count(2),
            min_samples_leaf: 1,
            min_weight_fraction_leaf: 0.0,
            max_features: if is_classification { MaxFeatures::Sqrt } else { MaxFeatures::All },
            min_impurity_decrease: 0.0,
            bootstrap: true,
            oob_score: false,
            max_samples: None,
            criterion: if is_classification { Criterion::Gini } else { Criterion::MSE },
            random_state: None,
            verbose: 0,
            is_classification,
            oob_score_value: None,
            feature_importances: None,
            n_features: 0,
            classes: Vec::new(),
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: MinSamplesSplit) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    pub fn with_min_weight_fraction_leaf(mut self, fraction: f64) -> Self {
        self.min_weight_fraction_leaf = fraction;
        self
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_min_impurity_decrease(mut self, decrease: f64) -> Self {
        self.min_impurity_decrease = decrease;
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    pub fn with_max_samples(mut self, max_samples: Option<MaxSamples>) -> Self {
        self.max_samples = max_samples;
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

    /// Enable OOB score computation
    pub fn with_oob_score(mut self, oob_score: bool) -> Self {
        self.oob_score = oob_score;
        self
    }

    pub fn with_verbose(mut self, verbose: i64) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn is_classification(&self) -> bool {
        self.is_classification
    }

    fn compute_max_features(&self, n_features: usize) -> usize {
        match self.max_features {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().floor() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().floor() as usize,
            MaxFeatures::Fraction(f) => (n_features as f64 * f).floor() as usize,
            MaxFeatures::Fixed(n) => n.min(n_features),
            MaxFeatures::All => n_features,
        }
        .clamp(1, n_features.max(1))
    }

    fn bootstrap_size(&self, n_samples: usize) -> usize {
        match self.max_samples {
            None => n_samples,
            Some(MaxSamples::Count(n)) => n.clamp(1, n_samples),
            Some(MaxSamples::Fraction(f)) => ((n_samples as f64 * f).ceil() as usize).clamp(1, n_samples),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(RaError::ValidationError("n_estimators must be positive".to_string()));
        }
        if self.criterion.is_classification() != self.is_classification {
            return Err(RaError::ValidationError(format!(
                "Criterion {:?} does not match the forest task",
                self.criterion
            )));
        }
        if !(0.0..=0.5).contains(&self.min_weight_fraction_leaf) {
            return Err(RaError::ValidationError(
                "min_weight_fraction_leaf must be in [0, 0.5]".to_string(),
            ));
        }
        if self.oob_score && !self.bootstrap {
            return Err(RaError::ValidationError(
                "Out of bag estimation is only available if bootstrap=true".to_string(),
            ));
        }
        Ok(())
    }

    /// Fit the forest to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(RaError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        self.validate()?;

        self.n_features = n_features;
        let max_features = self.compute_max_features(n_features);
        let min_samples_split = match self.min_samples_split {
            MinSamplesSplit::Count(n) => n,
            MinSamplesSplit::Fraction(f) => (n_samples as f64 * f).ceil() as usize,
        }
        .max(2);
        let min_samples_leaf = self
            .min_samples_leaf
            .max((self.min_weight_fraction_leaf * n_samples as f64).ceil() as usize)
            .max(1);
        let draw_size = self.bootstrap_size(n_samples);

        if self.is_classification {
            let mut classes: Vec<f64> = y.iter().copied().collect();
            classes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            classes.dedup();
            self.classes = classes;
        }

        let base_seed = self.random_state.unwrap_or(42);

        let fitted: Vec<(DecisionTree, Vec<bool>)> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let seed = base_seed.wrapping_add(tree_idx as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);

                let sample_indices: Vec<usize> = if self.bootstrap {
                    (0..draw_size).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };
                let mut in_bag = vec![false; n_samples];
                for &i in &sample_indices {
                    in_bag[i] = true;
                }

                let x_boot = x.select(Axis(0), &sample_indices);
                let y_boot = y.select(Axis(0), &sample_indices);

                let mut tree = if self.is_classification {
                    DecisionTree::new_classifier()
                } else {
                    DecisionTree::new_regressor()
                };
                if let Some(d) = self.max_depth {
                    tree = tree.with_max_depth(d);
                }
                tree = tree
                    .with_min_samples_split(min_samples_split)
                    .with_min_samples_leaf(min_samples_leaf)
                    .with_min_impurity_decrease(self.min_impurity_decrease)
                    .with_criterion(self.criterion)
                    .with_max_features(max_features)
                    .with_random_state(rng.gen());

                tree.fit(&x_boot, &y_boot)?;
                if self.verbose > 0 {
                    debug!(tree = tree_idx + 1, total = self.n_estimators, "Built tree");
                }
                Ok((tree, in_bag))
            })
            .collect::<Result<Vec<_>>>()?;

        let (trees, in_bag): (Vec<DecisionTree>, Vec<Vec<bool>>) = fitted.into_iter().unzip();
        self.trees = trees;

        self.compute_feature_importances();
        self.oob_score_value = if self.oob_score {
            self.compute_oob_score(x, y, &in_bag)
        } else {
            None
        };

        Ok(self)
    }

    fn compute_feature_importances(&mut self) {
        if self.trees.is_empty() {
            return;
        }

        let mut total_importances = vec![0.0; self.n_features];
        for tree in &self.trees {
            if let Some(imp) = tree.feature_importances() {
                for (acc, &val) in total_importances.iter_mut().zip(imp.iter()) {
                    *acc += val;
                }
            }
        }

        let total: f64 = total_importances.iter().sum();
        if total > 0.0 {
            for imp in &mut total_importances {
                *imp /= total;
            }
        }

        self.feature_importances = Some(Array1::from_vec(total_importances));
    }

    /// R² (regression) or accuracy (classification) over samples left out of at least one bootstrap
    fn compute_oob_score(&self, x: &Array2<f64>, y: &Array1<f64>, in_bag: &[Vec<bool>]) -> Option<f64> {
        let n_samples = x.nrows();
        let mut collected: Vec<Vec<f64>> = vec![Vec::new(); n_samples];

        for (tree, bag) in self.trees.iter().zip(in_bag) {
            let oob_rows: Vec<usize> = (0..n_samples).filter(|&i| !bag[i]).collect();
            if oob_rows.is_empty() {
                continue;
            }
            let preds = tree.predict(&x.select(Axis(0), &oob_rows)).ok()?;
            for (&row, &p) in oob_rows.iter().zip(preds.iter()) {
                collected[row].push(p);
            }
        }

        let pairs: Vec<(f64, f64)> = collected
            .iter()
            .enumerate()
            .filter(|(_, preds)| !preds.is_empty())
            .map(|(i, preds)| {
                let p = if self.is_classification {
                    majority_vote(preds)
                } else {
                    preds.iter().sum::<f64>() / preds.len() as f64
                };
                (y[i], p)
            })
            .collect();

        if pairs.is_empty() {
            return None;
        }

        let n = pairs.len() as f64;
        if self.is_classification {
            Some(pairs.iter().filter(|(t, p)| (t - p).abs() < 0.5).count() as f64 / n)
        } else {
            let mean = pairs.iter().map(|(t, _)| t).sum::<f64>() / n;
            let ss_res: f64 = pairs.iter().map(|(t, p)| (t - p).powi(2)).sum();
            let ss_tot: f64 = pairs.iter().map(|(t, _)| (t - mean).powi(2)).sum();
            Some(if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 })
        }
    }

    fn tree_predictions(&self, x: &Array2<f64>) -> Result<Vec<Array1<f64>>> {
        if self.trees.is_empty() {
            return Err(RaError::not_fitted("RandomForest"));
        }
        self.trees.par_iter().map(|tree| tree.predict(x)).collect()
    }

    /// Make predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let all_predictions = self.tree_predictions(x)?;
        let n_trees = all_predictions.len() as f64;

        let predictions: Vec<f64> = (0..x.nrows())
            .map(|i| {
                if self.is_classification {
                    let votes: Vec<f64> = all_predictions.iter().map(|p| p[i]).collect();
                    majority_vote(&votes)
                } else {
                    all_predictions.iter().map(|p| p[i]).sum::<f64>() / n_trees
                }
            })
            .collect();

        Ok(Array1::from_vec(predictions))
    }

    /// Predict class probabilities as vote shares, columns ordered like [`classes`](Self::classes)
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_classification {
            return Err(RaError::ValidationError(
                "predict_proba is only available for classification".to_string(),
            ));
        }
        let all_predictions = self.tree_predictions(x)?;

        let n_samples = x.nrows();
        let n_classes = self.classes.len();
        let mut proba = Array2::zeros((n_samples, n_classes));

        for preds in &all_predictions {
            for (i, &p) in preds.iter().enumerate() {
                let class = p.round() as i64;
                if let Some(class_idx) = self.classes.iter().position(|&c| c.round() as i64 == class) {
                    proba[[i, class_idx]] += 1.0;
                }
            }
        }
        for mut row in proba.outer_iter_mut() {
            let row_sum = row.sum();
            if row_sum > 0.0 {
                row /= row_sum;
            }
        }

        Ok(proba)
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Get OOB score
    pub fn oob_score_value(&self) -> Option<f64> {
        self.oob_score_value
    }

    /// Classes seen during fit (classification only)
    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    /// Get number of trees
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

/// Most frequent class label; ties resolve to the smallest label
fn majority_vote(preds: &[f64]) -> f64 {
    let mut votes: HashMap<i64, usize> = HashMap::new();
    for p in preds {
        *votes.entry(p.round() as i64).or_insert(0) += 1;
    }
    votes
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
        .map(|(class, _)| class as f64)
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classifier() {
        let x = array![
            [0.0, 0.0],
            [0.1, 0.1],
            [0.2, 0.2],
            [1.0, 1.0],
            [1.1, 1.1],
            [1.2, 1.2],
        ];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut rf = RandomForest::new_classifier(15).with_random_state(13);
        rf.fit(&x, &y).unwrap();

        let predictions = rf.predict(&x).unwrap();
        let accuracy = predictions
            .iter()
            .zip(y.iter())
            .filter(|(p, a)| (*p - *a).abs() < 0.5)
            .count() as f64
            / y.len() as f64;

        assert!(accuracy >= 0.8, "Accuracy too low: {}", accuracy);
    }

    #[test]
    fn test_regressor() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0];

        let mut rf = RandomForest::new_regressor(10).with_random_state(13);
        rf.fit(&x, &y).unwrap();

        let predictions = rf.predict(&x).unwrap();
        let mse: f64 = predictions
            .iter()
            .zip(y.iter())
            .map(|(p, a)| (p - a).powi(2))
            .sum::<f64>()
            / y.len() as f64;

        assert!(mse < 2.0, "MSE too high: {}", mse);
    }

    #[test]
    fn test_fit_is_deterministic_for_a_seed() {
        let x = array![[1.0, 5.0], [2.0, 3.0], [3.0, 8.0], [4.0, 1.0], [5.0, 2.0], [6.0, 7.0]];
        let y = array![1.5, 2.1, 2.9, 4.2, 5.1, 5.8];

        let mut a = RandomForest::new_regressor(8).with_random_state(13);
        let mut b = RandomForest::new_regressor(8).with_random_state(13);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();

        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_predict_proba() {
        let x = array![[0.0, 0.0], [1.0, 1.0]];
        let y = array![0.0, 1.0];

        let mut rf = RandomForest::new_classifier(10).with_random_state(13);
        rf.fit(&x, &y).unwrap();

        let proba = rf.predict_proba(&x).unwrap();
        assert_eq!(proba.nrows(), 2);
        assert_eq!(proba.ncols(), 2);
        for row in proba.outer_iter() {
            assert!((row.sum() - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_oob_score_requires_bootstrap() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = array![0.0, 1.0, 2.0, 3.0];

        let mut rf = RandomForest::new_regressor(5)
            .with_bootstrap(false)
            .with_oob_score(true);
        assert!(rf.fit(&x, &y).is_err());
    }

    #[test]
    fn test_oob_score_is_computed() {
        let x = Array2::from_shape_fn((40, 1), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(40, |i| 2.0 * i as f64);

        let mut rf = RandomForest::new_regressor(20)
            .with_random_state(13)
            .with_oob_score(true);
        rf.fit(&x, &y).unwrap();

        let oob = rf.oob_score_value().unwrap();
        assert!(oob > 0.8, "OOB R² too low: {}", oob);
    }

    #[test]
    fn test_max_samples_limits_bootstrap() {
        let rf = RandomForest::new_regressor(1).with_max_samples(Some(MaxSamples::Fraction(0.25)));
        assert_eq!(rf.bootstrap_size(10), 3);
        let rf = rf.with_max_samples(Some(MaxSamples::Count(50)));
        assert_eq!(rf.bootstrap_size(10), 10);
    }

    #[test]
    fn test_feature_importances() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![1.0, 2.0, 3.0, 4.0];

        let mut rf = RandomForest::new_regressor(10).with_random_state(13);
        rf.fit(&x, &y).unwrap();

        let importances = rf.feature_importances().unwrap();
        assert_eq!(importances.len(), 2);
        assert!(importances[0] >= importances[1]);
    }
}
