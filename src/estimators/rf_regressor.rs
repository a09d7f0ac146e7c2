use super::{forest, EstimatorKind};
use crate::error::Result;
use crate::optimizer::{FitConfiguration, ParamTable, Scoring};
use crate::training::RandomForest;
use ndarray::{Array1, Array2};

/// Random forest regression
pub struct RandomForestRegressorKind;

impl EstimatorKind for RandomForestRegressorKind {
    type Model = RandomForest;

    const NAME: &'static str = "RandomForestRegressor";
    const ALIAS: &'static str = "RFRegressor";
    const DEFAULT_CV: usize = 2;
    const DEFAULT_SCORING: Scoring = Scoring::NegMeanAbsoluteError;

    fn param_table(n_features: usize) -> Result<ParamTable> {
        forest::param_table(n_features, false)
    }

    fn build(config: &FitConfiguration, verbose: i64) -> Result<RandomForest> {
        forest::build(config, false, verbose)
    }

    fn fit_model(model: &mut RandomForest, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        model.fit(x, y)?;
        Ok(())
    }

    fn predict(model: &RandomForest, x: &Array2<f64>) -> Result<Array1<f64>> {
        model.predict(x)
    }

    fn feature_importances(model: &RandomForest) -> Result<Array1<f64>> {
        forest::importances(model)
    }
}
