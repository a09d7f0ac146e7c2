use super::{invalid, ConfigReader, EstimatorKind, RANDOM_STATE};
use crate::error::{RaError, Result};
use crate::optimizer::{conf_params, FitConfiguration, ParamKind, ParamSpec, ParamTable, ParamValue, Scoring};
use crate::training::{ElasticNetCV, Precompute, Selection};
use ndarray::{Array1, Array2};

use ParamKind::{Bool, Float, Int, Str};

/// Elastic net whose alpha is chosen by internal cross-validation
pub struct ElasticNetCVKind;

/// Folds of the internal alpha search when `cv` is None
const DEFAULT_INTERNAL_CV: usize = 5;

impl EstimatorKind for ElasticNetCVKind {
    type Model = ElasticNetCV;

    const NAME: &'static str = "ElasticNetCVRegressor";
    const ALIAS: &'static str = "ENCVRegressor";
    const DEFAULT_CV: usize = 3;
    const DEFAULT_SCORING: Scoring = Scoring::R2;

    fn param_table(n_features: usize) -> Result<ParamTable> {
        let c = n_features as f64 + 1.0;
        let count = n_features + 1;
        let both = || vec![ParamValue::Bool(true), ParamValue::Bool(false)];

        Ok(ParamTable::new(vec![
            ParamSpec::new("l1_ratio", &[Float], 0.5).with_grid(conf_params(0.1, Some(1.0), count, Float)?),
            ParamSpec::new("eps", &[Float], 1e-3),
            ParamSpec::new("n_alphas", &[Int], 100).with_grid(conf_params(1.0, Some(10.0 * c), count, Int)?),
            ParamSpec::new("alphas", &[ParamKind::None, Float], ParamValue::None),
            ParamSpec::new("fit_intercept", &[Bool], true).with_grid(both()).locked(),
            ParamSpec::new("normalize", &[Bool], false).with_grid(both()).locked(),
            ParamSpec::new("precompute", &[Str, Bool], "auto").locked(),
            ParamSpec::new("max_iter", &[Int], 1000).with_grid(conf_params(100.0, Some(100.0 * c), count, Int)?),
            ParamSpec::new("tol", &[Float], 1e-4),
            ParamSpec::new("cv", &[Int, ParamKind::None], ParamValue::None),
            ParamSpec::new("positive", &[Bool], false).with_grid(both()).locked(),
            ParamSpec::new("selection", &[Str], "cyclic")
                .with_grid(vec!["cyclic".into(), "random".into()])
                .locked(),
        ]))
    }

    fn build(config: &FitConfiguration, verbose: i64) -> Result<ElasticNetCV> {
        let params = ConfigReader::new(config);

        let l1_ratio = params.float("l1_ratio")?;
        if !(0.0..=1.0).contains(&l1_ratio) {
            return Err(invalid("l1_ratio", l1_ratio, "must lie in [0, 1]"));
        }
        let eps = params.float("eps")?;
        if eps <= 0.0 {
            return Err(invalid("eps", eps, "must be positive"));
        }
        let tol = params.float("tol")?;
        if tol <= 0.0 {
            return Err(invalid("tol", tol, "must be positive"));
        }

        let alphas = match params.value("alphas")? {
            ParamValue::None => None,
            _ => {
                let alpha = params.float("alphas")?;
                if alpha < 0.0 {
                    return Err(invalid("alphas", alpha, "must be non-negative"));
                }
                Some(vec![alpha])
            }
        };

        let precompute = match params.value("precompute")? {
            ParamValue::Bool(true) => Precompute::Always,
            ParamValue::Bool(false) => Precompute::Never,
            _ => match params.string("precompute")? {
                "auto" => Precompute::Auto,
                other => return Err(invalid("precompute", other, "expected 'auto', True or False")),
            },
        };

        let selection_name = params.string("selection")?;
        let selection = Selection::from_name(selection_name)
            .ok_or_else(|| invalid("selection", selection_name, "expected 'cyclic' or 'random'"))?;

        let cv = match params.value("cv")? {
            ParamValue::None => DEFAULT_INTERNAL_CV,
            _ => params.int_at_least("cv", 2)?,
        };

        let mut model = ElasticNetCV::new();
        model.l1_ratios = vec![l1_ratio];
        model.eps = eps;
        model.n_alphas = params.int_at_least("n_alphas", 1)?;
        model.alphas = alphas;
        model.fit_intercept = params.boolean("fit_intercept")?;
        model.normalize = params.boolean("normalize")?;
        model.precompute = precompute;
        model.max_iter = params.int_at_least("max_iter", 1)?;
        model.tol = tol;
        model.cv = cv;
        model.positive = params.boolean("positive")?;
        model.selection = selection;
        model.random_state = Some(RANDOM_STATE);
        model.verbose = verbose;
        Ok(model)
    }

    fn fit_model(model: &mut ElasticNetCV, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        model.fit(x, y)?;
        Ok(())
    }

    fn predict(model: &ElasticNetCV, x: &Array2<f64>) -> Result<Array1<f64>> {
        model.predict(x)
    }

    /// Absolute coefficients scaled to sum to one
    fn feature_importances(model: &ElasticNetCV) -> Result<Array1<f64>> {
        let coef = model
            .coefficients()
            .ok_or_else(|| RaError::not_fitted(Self::NAME))?;
        let magnitudes = coef.mapv(f64::abs);
        let total = magnitudes.sum();
        Ok(if total > 0.0 { magnitudes / total } else { magnitudes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_grids() {
        let table = ElasticNetCVKind::param_table(2).unwrap();
        let grid = table.default_grid();
        assert_eq!(grid.get("l1_ratio").unwrap().len(), 3);
        assert_eq!(grid.get("n_alphas").unwrap(), &vec![ParamValue::Int(1), ParamValue::Int(16), ParamValue::Int(30)]);
        assert_eq!(grid.get("max_iter").unwrap().last(), Some(&ParamValue::Int(300)));
        assert_eq!(
            table.locked_params(),
            vec!["fit_intercept", "normalize", "precompute", "positive", "selection"]
        );
    }

    #[test]
    fn test_build_defaults() {
        let table = ElasticNetCVKind::param_table(2).unwrap();
        let model = ElasticNetCVKind::build(&table.default_values(), 0).unwrap();
        assert_eq!(model.cv, DEFAULT_INTERNAL_CV);
        assert_eq!(model.l1_ratios, vec![0.5]);
        assert_eq!(model.precompute, Precompute::Auto);
        assert!(model.alphas.is_none());
    }

    #[test]
    fn test_build_overrides() {
        let table = ElasticNetCVKind::param_table(2).unwrap();
        let overrides = FitConfiguration::new()
            .with("alphas", 0.1)
            .with("precompute", false)
            .with("selection", "random")
            .with("cv", 3);
        let model = ElasticNetCVKind::build(&table.resolve_fit(Some(&overrides)).unwrap(), 2).unwrap();
        assert_eq!(model.alphas, Some(vec![0.1]));
        assert_eq!(model.precompute, Precompute::Never);
        assert_eq!(model.selection, Selection::Random);
        assert_eq!(model.cv, 3);
        assert_eq!(model.verbose, 2);
    }

    #[test]
    fn test_build_rejects_bad_values() {
        let table = ElasticNetCVKind::param_table(2).unwrap();
        for (name, value) in [
            ("l1_ratio", ParamValue::Float(1.5)),
            ("selection", "shuffled".into()),
            ("precompute", "always".into()),
            ("cv", ParamValue::Int(1)),
            ("n_alphas", ParamValue::Int(0)),
        ] {
            let overrides = FitConfiguration::new().with(name, value);
            let config = table.resolve_fit(Some(&overrides)).unwrap();
            assert!(
                matches!(ElasticNetCVKind::build(&config, 0), Err(RaError::InvalidParameter { .. })),
                "{} should be rejected",
                name
            );
        }
    }
}
