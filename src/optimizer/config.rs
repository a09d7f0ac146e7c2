//! Grid search and fit configuration

use crate::error::{RaError, Result};
use crate::training::metrics;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Scoring rule used to rank grid combinations. Higher is always better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scoring {
    R2,
    NegMeanAbsoluteError,
    NegMeanSquaredError,
    Accuracy,
    RocAuc,
}

impl Scoring {
    pub fn name(&self) -> &'static str {
        match self {
            Scoring::R2 => "r2",
            Scoring::NegMeanAbsoluteError => "neg_mean_absolute_error",
            Scoring::NegMeanSquaredError => "neg_mean_squared_error",
            Scoring::Accuracy => "accuracy",
            Scoring::RocAuc => "roc_auc",
        }
    }

    /// Whether the rule ranks continuous scores rather than hard predictions
    pub fn needs_scores(&self) -> bool {
        matches!(self, Scoring::RocAuc)
    }

    /// Score held-out predictions; `y_score` is used by ranking rules when present
    pub fn evaluate(&self, y_true: &Array1<f64>, y_pred: &Array1<f64>, y_score: Option<&Array1<f64>>) -> Result<f64> {
        match self {
            Scoring::R2 => metrics::r2_score(y_true, y_pred),
            Scoring::NegMeanAbsoluteError => metrics::mean_absolute_error(y_true, y_pred).map(|v| -v),
            Scoring::NegMeanSquaredError => metrics::mean_squared_error(y_true, y_pred).map(|v| -v),
            Scoring::Accuracy => metrics::accuracy_score(y_true, y_pred),
            Scoring::RocAuc => metrics::roc_auc_score(y_true, y_score.unwrap_or(y_pred)),
        }
    }
}

impl fmt::Display for Scoring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scoring {
    type Err = RaError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "r2" => Ok(Scoring::R2),
            "neg_mean_absolute_error" => Ok(Scoring::NegMeanAbsoluteError),
            "neg_mean_squared_error" => Ok(Scoring::NegMeanSquaredError),
            "accuracy" => Ok(Scoring::Accuracy),
            "roc_auc" => Ok(Scoring::RocAuc),
            other => Err(RaError::InvalidParameter {
                name: "scoring".to_string(),
                value: other.to_string(),
                reason: "unknown scoring rule".to_string(),
            }),
        }
    }
}

/// Configuration for a grid search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridSearchConfig {
    /// Values kept per non-locked parameter; 0 searches only the defaults and overrides
    pub count: usize,

    /// Cross-validation folds (estimator default when `None`)
    pub cv: Option<usize>,

    /// Number of parallel workers; non-positive uses every core
    pub n_jobs: i64,

    /// Scoring rule (estimator default when `None`)
    pub scoring: Option<Scoring>,
}

impl Default for GridSearchConfig {
    fn default() -> Self {
        Self {
            count: 0,
            cv: None,
            n_jobs: 1,
            scoring: None,
        }
    }
}

impl GridSearchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    pub fn with_cv(mut self, folds: usize) -> Self {
        self.cv = Some(folds);
        self
    }

    /// Builder method to enable parallel execution
    pub fn with_n_jobs(mut self, n: i64) -> Self {
        self.n_jobs = n;
        self
    }

    pub fn with_scoring(mut self, scoring: Scoring) -> Self {
        self.scoring = Some(scoring);
        self
    }
}

/// Options of a single fit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitOptions {
    /// Worker threads for the back-end; non-positive uses every core
    pub n_jobs: i64,
    /// Back-end verbosity, logged at debug level
    pub verbose: i64,
    /// Log fit progress at info level
    pub show: bool,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            n_jobs: 1,
            verbose: 0,
            show: false,
        }
    }
}

impl FitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_n_jobs(mut self, n: i64) -> Self {
        self.n_jobs = n;
        self
    }

    pub fn with_verbose(mut self, verbose: i64) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_show(mut self, show: bool) -> Self {
        self.show = show;
        self
    }
}
