//! Parameter table and builder shared by the random-forest wrappers

use super::{invalid, ConfigReader, RANDOM_STATE};
use crate::error::Result;
use crate::optimizer::{conf_params, FitConfiguration, ParamKind, ParamSpec, ParamTable, ParamValue};
use crate::training::{Criterion, MaxFeatures, MaxSamples, MinSamplesSplit, RandomForest};
use ndarray::Array1;

use ParamKind::{Bool, Float, Int, Str};

fn strs(values: &[&str]) -> Vec<ParamValue> {
    values.iter().map(|&v| ParamValue::from(v)).collect()
}

pub(super) fn param_table(n_features: usize, classifier: bool) -> Result<ParamTable> {
    let c = n_features as f64 + 1.0;
    let count = n_features + 1;

    let (criterion, criteria) = if classifier {
        ("gini", strs(&["gini", "entropy"]))
    } else {
        ("mse", strs(&["mse", "mae"]))
    };
    let (max_depth, min_split, min_leaf) = if classifier {
        let mut depth = conf_params(1.0, Some(c), count, Int)?;
        depth.push(ParamValue::None);
        (depth, conf_params(2.0, None, count, Int)?, conf_params(1.0, None, count, Int)?)
    } else {
        (
            conf_params(2.0, Some(5.0 * c), count, Int)?,
            conf_params(2.0, None, 5 * count, Int)?,
            conf_params(1.0, None, 5 * count, Int)?,
        )
    };

    Ok(ParamTable::new(vec![
        ParamSpec::new("n_estimators", &[Int], 100)
            .with_grid(conf_params(2.0, Some(5.0 * c), count, Int)?),
        ParamSpec::new("criterion", &[Str], criterion).with_grid(criteria).locked(),
        ParamSpec::new("max_depth", &[Int, ParamKind::None], ParamValue::None).with_grid(max_depth),
        ParamSpec::new("min_samples_split", &[Int, Float], 2).with_grid(min_split),
        ParamSpec::new("min_samples_leaf", &[Int], 1).with_grid(min_leaf),
        ParamSpec::new("min_weight_fraction_leaf", &[Float], 0.0),
        ParamSpec::new("max_features", &[Str, ParamKind::None], "auto")
            .with_grid(vec!["sqrt".into(), "auto".into(), "log2".into(), ParamValue::None])
            .locked(),
        ParamSpec::new("min_impurity_decrease", &[Float], 0.0),
        ParamSpec::new("bootstrap", &[Bool], true)
            .with_grid(vec![true.into(), false.into()])
            .locked(),
        ParamSpec::new("oob_score", &[Bool], false).locked(),
        ParamSpec::new("verbose", &[Int], 0),
        ParamSpec::new("max_samples", &[Int, Float, ParamKind::None], ParamValue::None)
            .with_grid(conf_params(2.0, Some(c), count, Int)?),
    ]))
}

fn fraction(name: &str, v: f64) -> Result<f64> {
    if v > 0.0 && v <= 1.0 {
        Ok(v)
    } else {
        Err(invalid(name, v, "a fraction must lie in (0, 1]"))
    }
}

pub(super) fn build(config: &FitConfiguration, classifier: bool, verbose: i64) -> Result<RandomForest> {
    let params = ConfigReader::new(config);

    let n_estimators = params.int_at_least("n_estimators", 1)?;
    let forest = if classifier {
        RandomForest::new_classifier(n_estimators)
    } else {
        RandomForest::new_regressor(n_estimators)
    };

    let criterion_name = params.string("criterion")?;
    let criterion = Criterion::from_name(criterion_name)
        .filter(|c| c.is_classification() == classifier)
        .ok_or_else(|| invalid("criterion", criterion_name, "not a criterion for this task"))?;

    let min_samples_split = match params.value("min_samples_split")? {
        ParamValue::Int(_) => MinSamplesSplit::Count(params.int_at_least("min_samples_split", 2)?),
        _ => MinSamplesSplit::Fraction(fraction("min_samples_split", params.float("min_samples_split")?)?),
    };

    let max_features = match params.value("max_features")? {
        ParamValue::None => MaxFeatures::All,
        _ => match params.string("max_features")? {
            "sqrt" => MaxFeatures::Sqrt,
            "log2" => MaxFeatures::Log2,
            "auto" if classifier => MaxFeatures::Sqrt,
            "auto" => MaxFeatures::All,
            other => return Err(invalid("max_features", other, "expected 'sqrt', 'auto', 'log2' or None")),
        },
    };

    let max_samples = match params.value("max_samples")? {
        ParamValue::None => None,
        ParamValue::Int(_) => Some(MaxSamples::Count(params.int_at_least("max_samples", 1)?)),
        _ => Some(MaxSamples::Fraction(fraction("max_samples", params.float("max_samples")?)?)),
    };

    let min_weight_fraction_leaf = params.float("min_weight_fraction_leaf")?;
    if !(0.0..=0.5).contains(&min_weight_fraction_leaf) {
        return Err(invalid("min_weight_fraction_leaf", min_weight_fraction_leaf, "must lie in [0, 0.5]"));
    }
    let min_impurity_decrease = params.float("min_impurity_decrease")?;
    if min_impurity_decrease < 0.0 {
        return Err(invalid("min_impurity_decrease", min_impurity_decrease, "must be non-negative"));
    }

    let bootstrap = params.boolean("bootstrap")?;
    let oob_score = params.boolean("oob_score")?;
    if oob_score && !bootstrap {
        return Err(invalid("oob_score", true, "out-of-bag estimation needs bootstrap=True"));
    }

    let mut forest = forest
        .with_criterion(criterion)
        .with_min_samples_split(min_samples_split)
        .with_min_samples_leaf(params.int_at_least("min_samples_leaf", 1)?)
        .with_min_weight_fraction_leaf(min_weight_fraction_leaf)
        .with_max_features(max_features)
        .with_min_impurity_decrease(min_impurity_decrease)
        .with_bootstrap(bootstrap)
        .with_oob_score(oob_score)
        .with_max_samples(max_samples)
        .with_verbose(params.int("verbose")?.max(verbose))
        .with_random_state(RANDOM_STATE);

    if !params.value("max_depth")?.is_none() {
        forest = forest.with_max_depth(params.int_at_least("max_depth", 1)?);
    }
    Ok(forest)
}

pub(super) fn importances(forest: &RandomForest) -> Result<Array1<f64>> {
    forest
        .feature_importances()
        .cloned()
        .ok_or_else(|| crate::error::RaError::not_fitted("RandomForest"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RaError;

    #[test]
    fn test_regressor_table_grids() {
        let table = param_table(3, false).unwrap();
        let grid = table.default_grid();
        // c = 4
        assert_eq!(grid.get("n_estimators").unwrap().len(), 4);
        assert_eq!(grid.get("n_estimators").unwrap().last(), Some(&ParamValue::Int(20)));
        assert_eq!(grid.get("min_samples_split").unwrap().len(), 20);
        assert_eq!(grid.get("min_samples_split").unwrap()[0], ParamValue::Int(2));
        assert_eq!(grid.get("max_samples").unwrap().first(), Some(&ParamValue::Int(2)));
        assert_eq!(
            table.locked_params(),
            vec!["criterion", "max_features", "bootstrap", "oob_score"]
        );
    }

    #[test]
    fn test_classifier_table_grids() {
        let table = param_table(3, true).unwrap();
        let grid = table.default_grid();
        let depth = grid.get("max_depth").unwrap();
        assert_eq!(depth.len(), 5);
        assert_eq!(depth.last(), Some(&ParamValue::None));
        assert_eq!(grid.get("min_samples_leaf").unwrap().len(), 4);
        assert_eq!(table.default_values().get("criterion"), Some(&ParamValue::from("gini")));
    }

    #[test]
    fn test_build_defaults() {
        let table = param_table(4, true).unwrap();
        let forest = build(&table.default_values(), true, 0).unwrap();
        assert_eq!(forest.n_estimators, 100);
        assert_eq!(forest.max_features, MaxFeatures::Sqrt);
        assert_eq!(forest.random_state, Some(RANDOM_STATE));
        assert!(forest.max_depth.is_none());

        let regressor = build(&param_table(4, false).unwrap().default_values(), false, 0).unwrap();
        assert_eq!(regressor.max_features, MaxFeatures::All);
        assert_eq!(regressor.criterion, Criterion::MSE);
    }

    #[test]
    fn test_build_rejects_bad_values() {
        let table = param_table(2, false).unwrap();
        let bad = |name: &str, value: ParamValue| {
            let overrides = FitConfiguration::new().with(name, value);
            build(&table.resolve_fit(Some(&overrides)).unwrap(), false, 0)
        };

        assert!(matches!(bad("criterion", "gini".into()), Err(RaError::InvalidParameter { .. })));
        assert!(matches!(bad("max_features", "half".into()), Err(RaError::InvalidParameter { .. })));
        assert!(matches!(bad("min_samples_split", 1.5.into()), Err(RaError::InvalidParameter { .. })));
        assert!(matches!(bad("min_samples_split", 1.into()), Err(RaError::InvalidParameter { .. })));
        assert!(matches!(bad("n_estimators", 0.into()), Err(RaError::InvalidParameter { .. })));
        assert!(matches!(bad("max_samples", 0.0.into()), Err(RaError::InvalidParameter { .. })));
    }

    #[test]
    fn test_build_fractions_and_oob() {
        let table = param_table(2, false).unwrap();
        let overrides = FitConfiguration::new()
            .with("min_samples_split", 0.25)
            .with("max_samples", 0.5)
            .with("oob_score", true)
            .with("max_depth", 3);
        let forest = build(&table.resolve_fit(Some(&overrides)).unwrap(), false, 0).unwrap();
        assert_eq!(forest.min_samples_split, MinSamplesSplit::Fraction(0.25));
        assert_eq!(forest.max_samples, Some(MaxSamples::Fraction(0.5)));
        assert_eq!(forest.max_depth, Some(3));
        assert!(forest.oob_score);

        let no_bootstrap = FitConfiguration::new().with("oob_score", true).with("bootstrap", false);
        assert!(build(&table.resolve_fit(Some(&no_bootstrap)).unwrap(), false, 0).is_err());
    }
}
