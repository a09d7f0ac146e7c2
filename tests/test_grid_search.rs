//! Integration test: grid search, refit from the best combination and
//! best-parameter persistence

use polars::prelude::*;
use ra_models::optimizer::{n_combinations, resolve_grid};
use ra_models::prelude::*;
use tempfile::tempdir;

fn regression_frames() -> (DataFrame, DataFrame) {
    let x1: Vec<f64> = (0..30).map(|i| i as f64 * 0.5).collect();
    let x2: Vec<f64> = (0..30).map(|i| ((i * 5) % 7) as f64).collect();
    let y: Vec<f64> = x1.iter().zip(&x2).map(|(a, b)| 2.0 * a + b).collect();
    (
        df!("x1" => &x1, "x2" => &x2).unwrap(),
        df!("y" => &y).unwrap(),
    )
}

fn classification_frames() -> (DataFrame, DataFrame) {
    let f1: Vec<f64> = (0..30).map(|i| i as f64).collect();
    let f2: Vec<f64> = (0..30).map(|i| ((i * 2) % 3) as f64).collect();
    let y: Vec<f64> = f1.iter().map(|&v| if v >= 15.0 { 1.0 } else { 0.0 }).collect();
    (
        df!("f1" => &f1, "f2" => &f2).unwrap(),
        df!("label" => &y).unwrap(),
    )
}

#[test]
fn test_rf_regressor_grid_then_refit() {
    let (task, target) = regression_frames();
    let mut model = RFRegressor::new(&task, &target, 0.8, false).unwrap();

    let overrides = GridConfiguration::new()
        .with_values("n_estimators", vec![5, 10])
        .with_values("max_depth", vec![ParamValue::Int(3), ParamValue::None]);
    let study = model
        .fit_grid(Some(&overrides), GridSearchConfig::new().with_count(1))
        .unwrap();

    // 2 x 2 overridden values, every other parameter collapsed to one value
    assert_eq!(study.trials.len(), 4);
    assert_eq!(study.scoring, Scoring::NegMeanAbsoluteError);
    assert!(study.best_value().unwrap() <= 0.0);

    // grid search alone leaves the model unfitted
    assert!(model.is_grid_fit());
    assert!(!model.is_model_fit());

    let best = model.grid_best_params().unwrap().clone();
    assert!(matches!(best.get("n_estimators"), Some(ParamValue::Int(5)) | Some(ParamValue::Int(10))));
    assert_eq!(best.get("criterion"), Some(&ParamValue::from("mse")));

    model.fit(None, true, FitOptions::default()).unwrap();
    assert!(model.is_model_fit());
    assert_eq!(model.fit_params(), Some(&best));
    assert!(model.mean_absolute_error().unwrap().is_finite());

    // an explicit configuration together with the grid flag is refused
    let err = model
        .fit(Some(&FitConfiguration::new().with("n_estimators", 3)), true, FitOptions::default())
        .unwrap_err();
    assert!(matches!(err, RaError::ConflictingFitModes));
}

#[test]
fn test_default_config_searches_defaults_only() {
    let (task, target) = regression_frames();
    let mut model = RFRegressor::new(&task, &target, 0.8, false).unwrap();
    let defaults = model.default_param_values();

    let grid = resolve_grid(model.param_table(), None, 0).unwrap();
    for name in model.non_locked_params() {
        assert_eq!(grid.get(name), Some(&vec![defaults.get(name).unwrap().clone()]), "{}", name);
    }
    assert_eq!(n_combinations(&grid), 1);

    let study = model.fit_grid(None, GridSearchConfig::default()).unwrap();
    assert_eq!(study.trials.len(), 1);
    assert_eq!(model.grid_best_params().unwrap(), &defaults);

    let (task, target) = regression_frames();
    let mut encv = ENCVRegressor::new(&task, &target, 0.8, false).unwrap();
    assert_eq!(encv.fit_grid(None, GridSearchConfig::default()).unwrap().trials.len(), 1);
}

#[test]
fn test_default_config_keeps_overrides() {
    let (task, target) = regression_frames();
    let mut model = RFRegressor::new(&task, &target, 0.8, false).unwrap();

    let overrides = GridConfiguration::new().with_values("n_estimators", vec![5, 10, 20]);
    let study = model.fit_grid(Some(&overrides), GridSearchConfig::default()).unwrap();
    assert_eq!(study.trials.len(), 3);

    let tried: Vec<&ParamValue> = study.trials.iter().map(|t| t.params.get("n_estimators").unwrap()).collect();
    assert_eq!(tried, vec![&ParamValue::Int(5), &ParamValue::Int(10), &ParamValue::Int(20)]);

    let best = model.grid_best_params().unwrap();
    assert_eq!(best.get("max_depth"), Some(&ParamValue::None));
    assert_eq!(best.get("min_samples_leaf"), Some(&ParamValue::Int(1)));
}

#[test]
fn test_invalid_combinations_are_skipped() {
    let (task, target) = regression_frames();
    let mut model = RFRegressor::new(&task, &target, 0.8, false).unwrap();

    // 1.5 is neither a count >= 2 nor a fraction in (0, 1]
    let overrides = GridConfiguration::new()
        .with_values("n_estimators", vec![5])
        .with_values("min_samples_split", vec![ParamValue::Float(1.5), ParamValue::Int(2)]);
    let study = model
        .fit_grid(Some(&overrides), GridSearchConfig::new().with_count(1))
        .unwrap();

    assert_eq!(study.trials.len(), 2);
    assert_eq!(study.n_failed(), 1);
    assert_eq!(
        model.grid_best_params().unwrap().get("min_samples_split"),
        Some(&ParamValue::Int(2))
    );
}

#[test]
fn test_all_combinations_failing_is_an_error() {
    let (task, target) = regression_frames();
    let mut model = RFRegressor::new(&task, &target, 0.8, false).unwrap();

    let overrides = GridConfiguration::new()
        .with_values("n_estimators", vec![5])
        .with_values("min_samples_split", vec![ParamValue::Float(1.5)]);
    let err = model
        .fit_grid(Some(&overrides), GridSearchConfig::new().with_count(1))
        .unwrap_err();
    assert!(matches!(err, RaError::ComputationError(_)));
    assert!(!model.is_grid_fit());
}

#[test]
fn test_empty_override_list_is_rejected() {
    let (task, target) = regression_frames();
    let mut model = RFRegressor::new(&task, &target, 0.8, false).unwrap();
    let overrides = GridConfiguration::new().with_values("n_estimators", Vec::<i64>::new());
    assert!(matches!(
        model.fit_grid(Some(&overrides), GridSearchConfig::default()),
        Err(RaError::InvalidParameter { .. })
    ));
}

#[test]
fn test_rf_classifier_grid_with_roc_auc() {
    let (task, target) = classification_frames();
    let mut model = RFClassifier::new(&task, &target, 0.7, false).unwrap();

    let config = GridSearchConfig::new()
        .with_count(1)
        .with_cv(3)
        .with_n_jobs(2)
        .with_scoring(Scoring::RocAuc);
    let overrides = GridConfiguration::new()
        .with_values("n_estimators", vec![5, 15])
        .with_values("max_samples", vec![ParamValue::None]);
    let study = model.fit_grid(Some(&overrides), config).unwrap();

    // max_depth keeps None next to the resampled range
    assert_eq!(study.trials.len(), 4);
    assert_eq!(study.scoring, Scoring::RocAuc);
    let best = study.best_value().unwrap();
    assert!((0.0..=1.0).contains(&best));

    model.fit(None, true, FitOptions::default()).unwrap();
    assert!(model.roc_auc_score().unwrap() >= 0.8);
}

#[test]
fn test_encv_grid_defaults() {
    let (task, target) = regression_frames();
    let mut model = ENCVRegressor::new(&task, &target, 0.8, false).unwrap();

    let grid = resolve_grid(model.param_table(), None, 2).unwrap();
    let expected = n_combinations(&grid);

    let study = model.fit_grid(None, GridSearchConfig::new().with_count(2)).unwrap();
    assert_eq!(study.trials.len(), expected);
    assert_eq!(study.scoring, Scoring::R2);

    model.fit(None, true, FitOptions::default()).unwrap();
    assert!(model.mean_squared_error().unwrap() < 10.0);
}

#[test]
fn test_best_params_round_trip() {
    let (task, target) = regression_frames();
    let mut model = RFRegressor::new(&task, &target, 0.8, false).unwrap();

    let dir = tempdir().unwrap();
    let path = dir.path().join("best.json");
    assert!(matches!(model.save_best_params(&path), Err(RaError::GridNotFitted)));

    let overrides = GridConfiguration::new().with_values("n_estimators", vec![4, 8]);
    model
        .fit_grid(Some(&overrides), GridSearchConfig::new().with_count(1))
        .unwrap();
    model.save_best_params(&path).unwrap();
    let saved = model.grid_best_params().unwrap().clone();

    let mut fresh = RFRegressor::new(&task, &target, 0.8, false).unwrap();
    assert!(matches!(
        fresh.load_best_params(dir.path().join("missing.json")),
        Err(RaError::PathNotFound(_))
    ));
    assert_eq!(fresh.load_best_params(&path).unwrap(), &saved);

    fresh.fit(None, true, FitOptions::default()).unwrap();
    assert!(fresh.is_model_fit());
}
