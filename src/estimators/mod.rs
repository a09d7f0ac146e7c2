//! Estimator wrappers
//!
//! [`Estimator`] owns a shuffled train/test split of a task/target frame
//! pair and drives one model kind through direct fits, grid search and
//! refits from the best grid combination. The three wrappers are
//! [`ENCVRegressor`], [`RFRegressor`] and [`RFClassifier`].

mod elastic_net_cv;
mod forest;
mod rf_classifier;
mod rf_regressor;

pub use elastic_net_cv::ElasticNetCVKind;
pub use rf_classifier::RandomForestClassifierKind;
pub use rf_regressor::RandomForestRegressorKind;

use crate::error::{RaError, Result};
use crate::optimizer::{
    resolve_grid, FitConfiguration, FitOptions, GridConfiguration, GridSearch, GridSearchConfig,
    ParamKind, ParamMap, ParamTable, ParamValue, Scoring, Study,
};
use crate::training::{metrics, train_test_split};
use crate::utils::{column_names, columns_to_array2, target_to_array1, ParallelConfig};
use crate::visualization::PredictionPlot;
use ndarray::{Array1, Array2, Axis};
use polars::prelude::DataFrame;
use std::fmt;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// Seed of the train/test split and of every seeded back-end
pub const RANDOM_STATE: u64 = 13;

/// Elastic net with cross-validated alpha
pub type ENCVRegressor = Estimator<ElasticNetCVKind>;
/// Random forest regressor
pub type RFRegressor = Estimator<RandomForestRegressorKind>;
/// Random forest classifier
pub type RFClassifier = Estimator<RandomForestClassifierKind>;

/// A model family the wrapper can drive
pub trait EstimatorKind: Send + Sync + 'static {
    /// Fitted back-end model
    type Model: Send + Sync;

    /// Name used in messages and plot file names
    const NAME: &'static str;
    /// Short name used by `Display`
    const ALIAS: &'static str;
    /// Grid search folds when not configured
    const DEFAULT_CV: usize;
    const DEFAULT_SCORING: Scoring;
    /// Classifiers get stratified folds and probability scores
    const IS_CLASSIFIER: bool = false;

    /// Parameter table for a task with `n_features` columns
    fn param_table(n_features: usize) -> Result<ParamTable>;

    /// Build an unfitted model; `verbose` raises the configured verbosity
    fn build(config: &FitConfiguration, verbose: i64) -> Result<Self::Model>;

    fn fit_model(model: &mut Self::Model, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    fn predict(model: &Self::Model, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Continuous scores used for ROC AUC
    fn decision_scores(model: &Self::Model, x: &Array2<f64>) -> Result<Array1<f64>> {
        Self::predict(model, x)
    }

    fn feature_importances(model: &Self::Model) -> Result<Array1<f64>>;
}

/// Typed access to a resolved configuration
pub(crate) struct ConfigReader<'a> {
    config: &'a FitConfiguration,
}

impl<'a> ConfigReader<'a> {
    pub(crate) fn new(config: &'a FitConfiguration) -> Self {
        Self { config }
    }

    pub(crate) fn value(&self, name: &str) -> Result<&'a ParamValue> {
        self.config
            .get(name)
            .ok_or_else(|| RaError::ValidationError(format!("Configuration is missing {}", name)))
    }

    fn mismatch(name: &str, expected: ParamKind, value: &ParamValue) -> RaError {
        RaError::TypeMismatch {
            name: name.to_string(),
            expected: expected.to_string(),
            actual: format!("{} ({})", value.kind(), value),
        }
    }

    pub(crate) fn int(&self, name: &str) -> Result<i64> {
        let value = self.value(name)?;
        value.as_int().ok_or_else(|| Self::mismatch(name, ParamKind::Int, value))
    }

    pub(crate) fn float(&self, name: &str) -> Result<f64> {
        let value = self.value(name)?;
        value.as_float().ok_or_else(|| Self::mismatch(name, ParamKind::Float, value))
    }

    pub(crate) fn boolean(&self, name: &str) -> Result<bool> {
        let value = self.value(name)?;
        value.as_bool().ok_or_else(|| Self::mismatch(name, ParamKind::Bool, value))
    }

    pub(crate) fn string(&self, name: &str) -> Result<&'a str> {
        let value = self.value(name)?;
        value.as_str().ok_or_else(|| Self::mismatch(name, ParamKind::Str, value))
    }

    /// Integer that must be at least `min`
    pub(crate) fn int_at_least(&self, name: &str, min: i64) -> Result<usize> {
        let v = self.int(name)?;
        if v < min {
            return Err(invalid(name, v, &format!("must be at least {}", min)));
        }
        Ok(v as usize)
    }
}

pub(crate) fn invalid(name: &str, value: impl fmt::Display, reason: &str) -> RaError {
    RaError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Fit/evaluate wrapper around one model kind
pub struct Estimator<K: EstimatorKind> {
    feature_names: Vec<String>,
    x_train: Array2<f64>,
    y_train: Array1<f64>,
    x_test: Array2<f64>,
    y_test: Array1<f64>,
    show: bool,
    table: ParamTable,
    model: Option<K::Model>,
    fit_params: Option<FitConfiguration>,
    best_params: Option<FitConfiguration>,
    study: Option<Study>,
    _kind: PhantomData<K>,
}

impl<K: EstimatorKind> Estimator<K> {
    /// Split `task`/`target` into train and test parts.
    ///
    /// `train_split` is the training fraction in `(0, 1)`; the split is
    /// shuffled with a fixed seed so repeated runs see the same rows.
    pub fn new(task: &DataFrame, target: &DataFrame, train_split: f64, show: bool) -> Result<Self> {
        let feature_names = column_names(task);
        if feature_names.is_empty() {
            return Err(RaError::DataError("Task frame has no feature columns".to_string()));
        }
        let x = columns_to_array2(task, &feature_names)?;
        let y = target_to_array1(target)?;
        if x.nrows() != y.len() {
            return Err(RaError::ShapeError {
                expected: format!("{} target rows", x.nrows()),
                actual: format!("{} target rows", y.len()),
            });
        }

        let (train, test) = train_test_split(x.nrows(), train_split, RANDOM_STATE)?;
        let table = K::param_table(feature_names.len())?;

        Ok(Self {
            x_train: x.select(Axis(0), &train),
            y_train: y.select(Axis(0), &train),
            x_test: x.select(Axis(0), &test),
            y_test: y.select(Axis(0), &test),
            feature_names,
            show,
            table,
            model: None,
            fit_params: None,
            best_params: None,
            study: None,
            _kind: PhantomData,
        })
    }

    /// Train on the training split.
    ///
    /// `params` overrides defaults for a direct fit; `use_grid_params`
    /// refits with the best grid combination. Asking for both is an error.
    pub fn fit(&mut self, params: Option<&FitConfiguration>, use_grid_params: bool, options: FitOptions) -> Result<&mut Self> {
        let config = match (params, use_grid_params) {
            (Some(_), true) => return Err(RaError::ConflictingFitModes),
            (None, true) => self.best_params.clone().ok_or(RaError::GridNotFitted)?,
            (params, false) => self.table.resolve_fit(params)?,
        };

        if self.show || options.show {
            info!(params = %config, "Learning {}...", K::NAME);
        }

        let mut model = K::build(&config, options.verbose)?;
        let (x, y) = (&self.x_train, &self.y_train);
        ParallelConfig::from_n_jobs(options.n_jobs).install(|| K::fit_model(&mut model, x, y))??;

        self.model = Some(model);
        self.fit_params = Some(config);
        Ok(self)
    }

    /// Cross-validated search over the grid; stores the best combination
    /// for a later `fit(None, true, ..)`. The wrapped model is left as is.
    pub fn fit_grid(&mut self, overrides: Option<&GridConfiguration>, config: GridSearchConfig) -> Result<&Study> {
        let grid = resolve_grid(&self.table, overrides, config.count)?;
        let scoring = config.scoring.unwrap_or(K::DEFAULT_SCORING);
        let search = GridSearch::new(grid, scoring)
            .with_cv(config.cv.unwrap_or(K::DEFAULT_CV), K::IS_CLASSIFIER)
            .with_n_jobs(config.n_jobs);

        if self.show {
            let per_fit = match self.time_default_fit() {
                Ok(secs) => Some(secs),
                Err(e) => {
                    warn!(error = %e, "Could not time a default fit");
                    None
                }
            };
            search.log_plan(K::NAME, per_fit);
        }

        let study = search.run(&self.x_train, &self.y_train, |params, x_train, y_train, x_test, y_test| {
            let mut model = K::build(params, 0)?;
            K::fit_model(&mut model, x_train, y_train)?;
            let pred = K::predict(&model, x_test)?;
            let scores = if scoring.needs_scores() {
                Some(K::decision_scores(&model, x_test)?)
            } else {
                None
            };
            scoring.evaluate(y_test, &pred, scores.as_ref())
        })?;

        let best = study
            .best_params()
            .cloned()
            .ok_or_else(|| RaError::ComputationError("Grid search produced no result".to_string()))?;
        if self.show {
            info!(
                scoring = %scoring,
                best_score = study.best_value().unwrap_or(f64::NAN),
                best_params = %best,
                "Grid search finished"
            );
        }

        self.best_params = Some(best);
        Ok(self.study.insert(study))
    }

    fn time_default_fit(&self) -> Result<f64> {
        let start = Instant::now();
        let mut model = K::build(&self.table.default_values(), 0)?;
        K::fit_model(&mut model, &self.x_train, &self.y_train)?;
        Ok(start.elapsed().as_secs_f64())
    }

    fn fitted(&self) -> Result<&K::Model> {
        self.model.as_ref().ok_or_else(|| RaError::not_fitted(K::NAME))
    }

    /// Predict rows of `data`, which must carry the task's feature columns
    pub fn predict(&self, data: &DataFrame) -> Result<Array1<f64>> {
        let model = self.fitted()?;
        let x = columns_to_array2(data, &self.feature_names)?;
        K::predict(model, &x)
    }

    pub fn name(&self) -> &'static str {
        K::NAME
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn train_size(&self) -> usize {
        self.y_train.len()
    }

    pub fn test_size(&self) -> usize {
        self.y_test.len()
    }

    pub fn locked_params(&self) -> Vec<&str> {
        self.table.locked_params()
    }

    pub fn non_locked_params(&self) -> Vec<&str> {
        self.table.non_locked_params()
    }

    pub fn default_param_types(&self) -> ParamMap<Vec<ParamKind>> {
        self.table.default_types()
    }

    pub fn default_param_values(&self) -> FitConfiguration {
        self.table.default_values()
    }

    pub fn default_grid_param_values(&self) -> GridConfiguration {
        self.table.default_grid()
    }

    pub fn param_table(&self) -> &ParamTable {
        &self.table
    }

    pub fn is_model_fit(&self) -> bool {
        self.model.is_some()
    }

    pub fn is_grid_fit(&self) -> bool {
        self.best_params.is_some()
    }

    pub fn grid_best_params(&self) -> Result<&FitConfiguration> {
        self.best_params.as_ref().ok_or(RaError::GridNotFitted)
    }

    /// Configuration of the current model
    pub fn fit_params(&self) -> Option<&FitConfiguration> {
        self.fit_params.as_ref()
    }

    /// Every combination evaluated by the last grid search
    pub fn study(&self) -> Option<&Study> {
        self.study.as_ref()
    }

    pub fn model(&self) -> Option<&K::Model> {
        self.model.as_ref()
    }

    /// Feature name and importance, most important first
    pub fn feature_importance(&self) -> Result<Vec<(String, f64)>> {
        let importances = K::feature_importances(self.fitted()?)?;
        let mut pairs: Vec<(String, f64)> = self
            .feature_names
            .iter()
            .cloned()
            .zip(importances.iter().copied())
            .collect();
        pairs.sort_by(|a, b| b.1.total_cmp(&a.1));
        Ok(pairs)
    }

    fn test_metric<F>(&self, metric: &str, use_scores: bool, score: F) -> Result<f64>
    where
        F: FnOnce(&Array1<f64>, &Array1<f64>) -> Result<f64>,
    {
        let model = self.fitted()?;
        let output = if use_scores {
            K::decision_scores(model, &self.x_test)
        } else {
            K::predict(model, &self.x_test)
        };
        let value = output.and_then(|p| score(&self.y_test, &p)).and_then(|v| {
            if v.is_finite() {
                Ok(v)
            } else {
                Err(RaError::ComputationError(format!("{} is not finite", metric)))
            }
        });

        Ok(value.unwrap_or_else(|e| {
            warn!(model = K::NAME, metric, error = %e, "Metric computation failed");
            f64::INFINITY
        }))
    }

    /// Test-set MSE, or `INFINITY` when it cannot be computed
    pub fn mean_squared_error(&self) -> Result<f64> {
        self.test_metric("mean_squared_error", false, metrics::mean_squared_error)
    }

    /// Test-set MAE, or `INFINITY` when it cannot be computed
    pub fn mean_absolute_error(&self) -> Result<f64> {
        self.test_metric("mean_absolute_error", false, metrics::mean_absolute_error)
    }

    /// Test-set ROC AUC, or `INFINITY` when it cannot be computed (e.g. a non-binary target)
    pub fn roc_auc_score(&self) -> Result<f64> {
        self.test_metric("roc_auc_score", true, metrics::roc_auc_score)
    }

    /// Save the test truth/prediction plot as `Test predict <Name>.png` in `save_dir`
    pub fn plot_predictions(&self, save_dir: impl AsRef<Path>) -> Result<PathBuf> {
        let model = self.fitted()?;
        let prediction = K::predict(model, &self.x_test)?;
        PredictionPlot::default().save(save_dir.as_ref(), K::NAME, &self.y_test, &prediction)
    }

    /// Write the best grid combination as JSON
    pub fn save_best_params(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self.grid_best_params()?)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load a best combination saved by [`save_best_params`](Self::save_best_params)
    pub fn load_best_params(&mut self, path: impl AsRef<Path>) -> Result<&FitConfiguration> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(RaError::PathNotFound(path.display().to_string()));
        }
        let loaded: FitConfiguration = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        let config = self.table.resolve_fit(Some(&loaded))?;
        Ok(self.best_params.insert(config))
    }
}

impl<K: EstimatorKind> fmt::Display for Estimator<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Ra.{} model>", K::ALIAS)
    }
}

impl<K: EstimatorKind> fmt::Debug for Estimator<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Ra.{} model>", K::ALIAS)
    }
}
