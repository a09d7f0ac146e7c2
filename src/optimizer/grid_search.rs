//! Exhaustive grid search scored by k-fold cross-validation

use super::config::Scoring;
use super::grid::{combination_at, n_combinations};
use super::params::{FitConfiguration, GridConfiguration};
use crate::error::{RaError, Result};
use crate::training::cross_validation::{CVResults, CVStrategy, CrossValidator};
use crate::utils::ParallelConfig;
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Result of one grid combination
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialResult {
    /// Position of the combination in the grid
    pub trial_id: usize,
    /// Parameters used
    pub params: FitConfiguration,
    /// Mean cross-validated score
    pub value: f64,
    /// Per-fold scores, absent when the combination failed
    pub cv: Option<CVResults>,
    /// Trial duration in seconds
    pub duration_secs: f64,
    /// Failure message of a skipped combination
    pub error: Option<String>,
}

impl TrialResult {
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

/// All evaluated combinations of one search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Study {
    pub trials: Vec<TrialResult>,
    pub best_trial_idx: Option<usize>,
    pub total_duration_secs: f64,
    pub scoring: Scoring,
}

impl Study {
    pub fn new(scoring: Scoring) -> Self {
        Self {
            trials: Vec::new(),
            best_trial_idx: None,
            total_duration_secs: 0.0,
            scoring,
        }
    }

    pub fn best_trial(&self) -> Option<&TrialResult> {
        self.best_trial_idx.map(|idx| &self.trials[idx])
    }

    pub fn best_value(&self) -> Option<f64> {
        self.best_trial().map(|t| t.value)
    }

    pub fn best_params(&self) -> Option<&FitConfiguration> {
        self.best_trial().map(|t| &t.params)
    }

    pub fn n_failed(&self) -> usize {
        self.trials.iter().filter(|t| t.failed()).count()
    }

    /// Add a trial result; ties keep the earlier combination
    pub fn add_trial(&mut self, result: TrialResult) {
        let idx = self.trials.len();

        let is_better = !result.failed()
            && match self.best_trial_idx {
                None => true,
                Some(best_idx) => result.value > self.trials[best_idx].value,
            };
        if is_better {
            self.best_trial_idx = Some(idx);
        }

        self.trials.push(result);
    }
}

struct Fold {
    x_train: Array2<f64>,
    y_train: Array1<f64>,
    x_test: Array2<f64>,
    y_test: Array1<f64>,
}

/// Grid search over a resolved [`GridConfiguration`]
pub struct GridSearch {
    grid: GridConfiguration,
    scoring: Scoring,
    n_splits: usize,
    stratified: bool,
    parallel: ParallelConfig,
}

impl GridSearch {
    pub fn new(grid: GridConfiguration, scoring: Scoring) -> Self {
        Self {
            grid,
            scoring,
            n_splits: 5,
            stratified: false,
            parallel: ParallelConfig::new().with_threads(1),
        }
    }

    /// Number of folds; stratified folds keep class proportions
    pub fn with_cv(mut self, n_splits: usize, stratified: bool) -> Self {
        self.n_splits = n_splits;
        self.stratified = stratified;
        self
    }

    pub fn with_n_jobs(mut self, n_jobs: i64) -> Self {
        self.parallel = ParallelConfig::from_n_jobs(n_jobs);
        self
    }

    pub fn grid(&self) -> &GridConfiguration {
        &self.grid
    }

    pub fn n_combinations(&self) -> usize {
        n_combinations(&self.grid)
    }

    /// Total number of fits the search performs
    pub fn n_fits(&self) -> usize {
        self.n_combinations() * self.n_splits
    }

    /// Estimated wall time given the cost of one fit
    pub fn estimate_secs(&self, seconds_per_fit: f64) -> f64 {
        let workers = self.parallel.num_threads().max(1) as f64;
        seconds_per_fit * self.n_fits() as f64 / workers
    }

    /// Log the grid, its size and, when known, the estimated duration
    pub fn log_plan(&self, name: &str, seconds_per_fit: Option<f64>) {
        info!("Learning GridSearch {}...", name);
        for (param, values) in self.grid.iter() {
            let values: Vec<String> = values.iter().map(ToString::to_string).collect();
            info!("  {}: [{}]", param, values.join(", "));
        }
        match seconds_per_fit {
            Some(secs) => info!(
                combinations = self.n_combinations(),
                folds = self.n_splits,
                estimated_secs = self.estimate_secs(secs),
                "Grid search plan"
            ),
            None => info!(
                combinations = self.n_combinations(),
                folds = self.n_splits,
                "Grid search plan"
            ),
        }
    }

    fn folds(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<Vec<Fold>> {
        let strategy = if self.stratified {
            CVStrategy::StratifiedKFold { n_splits: self.n_splits }
        } else {
            CVStrategy::KFold { n_splits: self.n_splits }
        };
        let splits = CrossValidator::new(strategy).split(x.nrows(), Some(y))?;

        Ok(splits
            .iter()
            .map(|s| Fold {
                x_train: x.select(Axis(0), &s.train_indices),
                y_train: y.select(Axis(0), &s.train_indices),
                x_test: x.select(Axis(0), &s.test_indices),
                y_test: y.select(Axis(0), &s.test_indices),
            })
            .collect())
    }

    /// Evaluate every combination with `objective(params, x_train, y_train, x_test, y_test)`.
    ///
    /// Combinations whose objective fails on any fold are skipped with a
    /// warning; the search fails only when none succeeds.
    pub fn run<F>(&self, x: &Array2<f64>, y: &Array1<f64>, objective: F) -> Result<Study>
    where
        F: Fn(&FitConfiguration, &Array2<f64>, &Array1<f64>, &Array2<f64>, &Array1<f64>) -> Result<f64> + Sync,
    {
        if x.nrows() != y.len() {
            return Err(RaError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }

        let start = Instant::now();
        let folds = self.folds(x, y)?;
        let n_combos = self.n_combinations();
        debug!(combinations = n_combos, folds = folds.len(), "Starting grid search");

        let evaluated: Vec<(usize, FitConfiguration, Result<Vec<f64>>, f64)> = self.parallel.install(|| {
            (0..n_combos)
                .into_par_iter()
                .filter_map(|trial_id| combination_at(&self.grid, trial_id).map(|params| (trial_id, params)))
                .map(|(trial_id, params)| {
                    let trial_start = Instant::now();
                    let scores = folds
                        .iter()
                        .map(|f| objective(&params, &f.x_train, &f.y_train, &f.x_test, &f.y_test))
                        .collect::<Result<Vec<f64>>>();
                    (trial_id, params, scores, trial_start.elapsed().as_secs_f64())
                })
                .collect()
        })?;

        let mut study = Study::new(self.scoring);
        for (trial_id, params, scores, duration_secs) in evaluated {
            let outcome = scores.and_then(|scores| {
                let cv = CVResults::from_scores(scores);
                if cv.mean_score.is_finite() {
                    Ok(cv)
                } else {
                    Err(RaError::ComputationError(format!("non-finite {} score", self.scoring)))
                }
            });

            let trial = match outcome {
                Ok(cv) => TrialResult {
                    trial_id,
                    value: cv.mean_score,
                    params,
                    cv: Some(cv),
                    duration_secs,
                    error: None,
                },
                Err(e) => {
                    warn!(trial = trial_id, params = %params, error = %e, "Skipping grid combination");
                    TrialResult {
                        trial_id,
                        params,
                        value: f64::NEG_INFINITY,
                        cv: None,
                        duration_secs,
                        error: Some(e.to_string()),
                    }
                }
            };
            study.add_trial(trial);
        }
        study.total_duration_secs = start.elapsed().as_secs_f64();

        if study.best_trial_idx.is_none() {
            return Err(RaError::ComputationError(format!(
                "All {} grid combinations failed",
                study.trials.len()
            )));
        }
        Ok(study)
    }
}
