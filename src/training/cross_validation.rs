//! Cross-validation splitters and the hold-out train/test split

use crate::error::{RaError, Result};
use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cross-validation strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CVStrategy {
    /// K-Fold cross-validation over consecutive rows
    KFold { n_splits: usize },
    /// Stratified K-Fold (maintains class distribution)
    StratifiedKFold { n_splits: usize },
}

impl Default for CVStrategy {
    fn default() -> Self {
        CVStrategy::KFold { n_splits: 5 }
    }
}

/// A single train/test split
#[derive(Debug, Clone)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Cross-validation splitter.
///
/// Folds are deterministic: rows are never reordered, so callers that want
/// a random assignment shuffle the rows beforehand (see [`train_test_split`]).
pub struct CrossValidator {
    strategy: CVStrategy,
}

impl CrossValidator {
    pub fn new(strategy: CVStrategy) -> Self {
        Self { strategy }
    }

    /// Generate train/test splits
    pub fn split(&self, n_samples: usize, y: Option<&Array1<f64>>) -> Result<Vec<CVSplit>> {
        match &self.strategy {
            CVStrategy::KFold { n_splits } => self.k_fold_split(n_samples, *n_splits),
            CVStrategy::StratifiedKFold { n_splits } => {
                let y = y.ok_or_else(|| RaError::ValidationError(
                    "StratifiedKFold requires target array".to_string()
                ))?;
                self.stratified_k_fold_split(y, *n_splits)
            }
        }
    }

    fn k_fold_split(&self, n_samples: usize, n_splits: usize) -> Result<Vec<CVSplit>> {
        if n_splits < 2 {
            return Err(RaError::ValidationError(
                "n_splits must be at least 2".to_string()
            ));
        }
        if n_samples < n_splits {
            return Err(RaError::ValidationError(
                format!("n_samples ({}) must be >= n_splits ({})", n_samples, n_splits)
            ));
        }

        let indices: Vec<usize> = (0..n_samples).collect();

        let base = n_samples / n_splits;
        let remainder = n_samples % n_splits;

        let mut splits = Vec::with_capacity(n_splits);
        let mut current = 0;
        for fold_idx in 0..n_splits {
            let fold_size = if fold_idx < remainder { base + 1 } else { base };
            let test_indices: Vec<usize> = indices[current..current + fold_size].to_vec();
            let train_indices: Vec<usize> = indices[..current]
                .iter()
                .chain(indices[current + fold_size..].iter())
                .copied()
                .collect();

            splits.push(CVSplit {
                train_indices,
                test_indices,
                fold_idx,
            });
            current += fold_size;
        }

        Ok(splits)
    }

    fn stratified_k_fold_split(&self, y: &Array1<f64>, n_splits: usize) -> Result<Vec<CVSplit>> {
        if n_splits < 2 {
            return Err(RaError::ValidationError(
                "n_splits must be at least 2".to_string()
            ));
        }
        if y.len() < n_splits {
            return Err(RaError::ValidationError(
                format!("n_samples ({}) must be >= n_splits ({})", y.len(), n_splits)
            ));
        }

        // Group samples by class, ordered by label so fold assignment is reproducible
        let mut class_indices: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (idx, &val) in y.iter().enumerate() {
            class_indices.entry(val.round() as i64).or_default().push(idx);
        }

        // Deal each class round-robin, continuing where the previous class stopped
        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); n_splits];
        let mut next = 0;
        for indices in class_indices.values() {
            for &idx in indices {
                folds[next % n_splits].push(idx);
                next += 1;
            }
        }

        let splits = (0..n_splits)
            .map(|fold_idx| {
                let train_indices: Vec<usize> = folds
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != fold_idx)
                    .flat_map(|(_, f)| f.iter().copied())
                    .collect();
                CVSplit {
                    train_indices,
                    test_indices: folds[fold_idx].clone(),
                    fold_idx,
                }
            })
            .collect();

        Ok(splits)
    }
}

/// Cross-validation results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CVResults {
    /// Scores for each fold
    pub scores: Vec<f64>,
    /// Mean score across folds
    pub mean_score: f64,
    /// Standard deviation of scores
    pub std_score: f64,
    pub n_folds: usize,
}

impl CVResults {
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let n_folds = scores.len();
        let mean_score = if n_folds == 0 {
            f64::NAN
        } else {
            scores.iter().sum::<f64>() / n_folds as f64
        };
        let variance = if n_folds == 0 {
            f64::NAN
        } else {
            scores.iter().map(|s| (s - mean_score).powi(2)).sum::<f64>() / n_folds as f64
        };

        Self {
            scores,
            mean_score,
            std_score: variance.sqrt(),
            n_folds,
        }
    }
}

/// Shuffled hold-out split of `n_samples` rows.
///
/// Returns `(train, test)` index vectors where the train part holds
/// `round(n_samples * train_split)` rows, clamped so both parts are non-empty.
pub fn train_test_split(n_samples: usize, train_split: f64, seed: u64) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(train_split > 0.0 && train_split < 1.0) {
        return Err(RaError::InvalidParameter {
            name: "train_split".to_string(),
            value: train_split.to_string(),
            reason: "must lie strictly between 0 and 1".to_string(),
        });
    }
    if n_samples < 2 {
        return Err(RaError::DataError(format!(
            "Need at least 2 rows to split into train and test, got {}",
            n_samples
        )));
    }

    let mut indices: Vec<usize> = (0..n_samples).collect();
    indices.shuffle(&mut ChaCha8Rng::seed_from_u64(seed));

    let n_train = ((n_samples as f64) * train_split).round() as usize;
    let n_train = n_train.clamp(1, n_samples - 1);
    let test = indices.split_off(n_train);
    Ok((indices, test))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_k_fold() {
        let cv = CrossValidator::new(CVStrategy::KFold { n_splits: 5 });
        let splits = cv.split(100, None).unwrap();

        assert_eq!(splits.len(), 5);
        for split in &splits {
            assert_eq!(split.test_indices.len(), 20);
            assert_eq!(split.train_indices.len(), 80);
        }

        let mut all_test: Vec<usize> = splits.iter().flat_map(|s| s.test_indices.clone()).collect();
        all_test.sort();
        assert_eq!(all_test, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_k_fold_uneven() {
        let cv = CrossValidator::new(CVStrategy::KFold { n_splits: 3 });
        let sizes: Vec<usize> = cv.split(10, None).unwrap().iter().map(|s| s.test_indices.len()).collect();
        assert_eq!(sizes, vec![4, 3, 3]);
    }

    #[test]
    fn test_k_fold_too_few_samples() {
        let cv = CrossValidator::new(CVStrategy::KFold { n_splits: 5 });
        assert!(cv.split(3, None).is_err());
    }

    #[test]
    fn test_stratified_k_fold() {
        let y = Array1::from_vec(vec![0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0]);

        let cv = CrossValidator::new(CVStrategy::StratifiedKFold { n_splits: 5 });
        let splits = cv.split(10, Some(&y)).unwrap();

        assert_eq!(splits.len(), 5);
        for split in &splits {
            assert_eq!(split.test_indices.len(), 2);
            let ones = split.test_indices.iter().filter(|&&i| y[i] == 1.0).count();
            assert_eq!(ones, 1);
        }
    }

    #[test]
    fn test_folds_keep_row_order() {
        let cv = CrossValidator::new(CVStrategy::KFold { n_splits: 2 });
        let splits = cv.split(6, None).unwrap();
        assert_eq!(splits[0].test_indices, vec![0, 1, 2]);
        assert_eq!(splits[1].test_indices, vec![3, 4, 5]);
        assert_eq!(splits[1].train_indices, vec![0, 1, 2]);

        let y = Array1::from_vec(vec![1.0, 0.0, 1.0, 0.0]);
        let stratified = CrossValidator::new(CVStrategy::StratifiedKFold { n_splits: 2 });
        let splits = stratified.split(4, Some(&y)).unwrap();
        assert_eq!(splits[0].test_indices, vec![1, 0]);
        assert_eq!(splits[1].test_indices, vec![3, 2]);
    }

    #[test]
    fn test_stratified_requires_target() {
        let cv = CrossValidator::new(CVStrategy::StratifiedKFold { n_splits: 2 });
        assert!(cv.split(10, None).is_err());
    }

    #[test]
    fn test_cv_results() {
        let res = CVResults::from_scores(vec![1.0, 3.0]);
        assert_eq!(res.mean_score, 2.0);
        assert_eq!(res.std_score, 1.0);
        assert_eq!(res.n_folds, 2);
    }

    #[test]
    fn test_train_test_split_sizes_and_determinism() {
        let (train, test) = train_test_split(10, 0.8, 13).unwrap();
        assert_eq!(train.len(), 8);
        assert_eq!(test.len(), 2);

        let (train2, test2) = train_test_split(10, 0.8, 13).unwrap();
        assert_eq!(train, train2);
        assert_eq!(test, test2);

        let mut all: Vec<usize> = train.into_iter().chain(test).collect();
        all.sort();
        assert_eq!(all, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_train_test_split_keeps_both_sides() {
        let (train, test) = train_test_split(3, 0.99, 13).unwrap();
        assert_eq!(train.len(), 2);
        assert_eq!(test.len(), 1);
    }

    #[test]
    fn test_train_test_split_rejects_bounds() {
        assert!(train_test_split(10, 0.0, 13).is_err());
        assert!(train_test_split(10, 1.0, 13).is_err());
        assert!(train_test_split(1, 0.5, 13).is_err());
    }
}
