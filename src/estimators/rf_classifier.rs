use super::{forest, EstimatorKind};
use crate::error::{RaError, Result};
use crate::optimizer::{FitConfiguration, ParamTable, Scoring};
use crate::training::RandomForest;
use ndarray::{Array1, Array2};

/// Random forest classification
pub struct RandomForestClassifierKind;

impl EstimatorKind for RandomForestClassifierKind {
    type Model = RandomForest;

    const NAME: &'static str = "RandomForestClassifier";
    const ALIAS: &'static str = "RFClassifier";
    const DEFAULT_CV: usize = 5;
    const DEFAULT_SCORING: Scoring = Scoring::Accuracy;
    const IS_CLASSIFIER: bool = true;

    fn param_table(n_features: usize) -> Result<ParamTable> {
        forest::param_table(n_features, true)
    }

    fn build(config: &FitConfiguration, verbose: i64) -> Result<RandomForest> {
        forest::build(config, true, verbose)
    }

    fn fit_model(model: &mut RandomForest, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        model.fit(x, y)?;
        Ok(())
    }

    fn predict(model: &RandomForest, x: &Array2<f64>) -> Result<Array1<f64>> {
        model.predict(x)
    }

    /// Vote share of the larger class label
    fn decision_scores(model: &RandomForest, x: &Array2<f64>) -> Result<Array1<f64>> {
        if model.classes().len() != 2 {
            return Err(RaError::ValidationError(format!(
                "Probability scores need a binary target, the forest saw {} classes",
                model.classes().len()
            )));
        }
        Ok(model.predict_proba(x)?.column(1).to_owned())
    }

    fn feature_importances(model: &RandomForest) -> Result<Array1<f64>> {
        forest::importances(model)
    }
}
