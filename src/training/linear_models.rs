//! Elastic-net linear models: a single-alpha coordinate-descent solver and
//! its cross-validated variant that picks alpha (and l1 ratio) on a path.

use crate::error::{RaError, Result};
use super::cross_validation::{CVStrategy, CrossValidator};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Whether to precompute the Gram matrix `XᵀX` for the coordinate updates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Precompute {
    /// Precompute when there are more samples than features
    Auto,
    Always,
    Never,
}

impl Precompute {
    fn resolve(self, n_samples: usize, n_features: usize) -> bool {
        match self {
            Precompute::Auto => n_samples > n_features,
            Precompute::Always => true,
            Precompute::Never => false,
        }
    }
}

/// Order in which coordinates are visited during descent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Selection {
    Cyclic,
    /// A fresh seeded permutation every epoch
    Random,
}

impl Selection {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "cyclic" => Some(Selection::Cyclic),
            "random" => Some(Selection::Random),
            _ => None,
        }
    }
}

fn soft_threshold(x: f64, lambda: f64) -> f64 {
    if x > lambda {
        x - lambda
    } else if x < -lambda {
        x + lambda
    } else {
        0.0
    }
}

/// Centred (and optionally column-normalised) design used by both solvers
struct Prepared {
    x: Array2<f64>,
    y: Array1<f64>,
    x_mean: Option<Array1<f64>>,
    y_mean: f64,
    x_scale: Array1<f64>,
}

fn prepare(x: &Array2<f64>, y: &Array1<f64>, fit_intercept: bool, normalize: bool) -> Prepared {
    let n_features = x.ncols();
    if !fit_intercept {
        return Prepared {
            x: x.clone(),
            y: y.clone(),
            x_mean: None,
            y_mean: 0.0,
            x_scale: Array1::ones(n_features),
        };
    }

    let x_mean = x
        .mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(n_features));
    let y_mean = y.mean().unwrap_or(0.0);
    let mut x_c = x - &x_mean.clone().insert_axis(Axis(0));
    let y_c = y - y_mean;

    let x_scale = if normalize {
        let norms = x_c.map_axis(Axis(0), |col| {
            let n = col.dot(&col).sqrt();
            if n > 0.0 { n } else { 1.0 }
        });
        x_c /= &norms.clone().insert_axis(Axis(0));
        norms
    } else {
        Array1::ones(n_features)
    };

    Prepared {
        x: x_c,
        y: y_c,
        x_mean: Some(x_mean),
        y_mean,
        x_scale,
    }
}

/// Elastic Net Regression (L1 + L2 regularization via coordinate descent)
///
/// Minimises `1/(2n)·‖y - Xw‖² + alpha·l1_ratio·‖w‖₁ + alpha·(1 - l1_ratio)/2·‖w‖²`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElasticNetRegression {
    pub coefficients: Option<Array1<f64>>,
    pub intercept: Option<f64>,
    pub fit_intercept: bool,
    /// Scale centred columns to unit L2 norm before fitting (only with an intercept)
    pub normalize: bool,
    /// Overall regularization strength
    pub alpha: f64,
    /// L1 ratio (0.0 = pure L2/Ridge, 1.0 = pure L1/Lasso)
    pub l1_ratio: f64,
    pub max_iter: usize,
    pub tol: f64,
    /// Constrain coefficients to be non-negative
    pub positive: bool,
    pub precompute: Precompute,
    pub selection: Selection,
    pub random_state: Option<u64>,
    /// Epochs actually run by the last fit
    pub n_iter: usize,
    pub is_fitted: bool,
}

impl Default for ElasticNetRegression {
    fn default() -> Self {
        Self::new(1.0, 0.5)
    }
}

impl ElasticNetRegression {
    pub fn new(alpha: f64, l1_ratio: f64) -> Self {
        Self {
            coefficients: None,
            intercept: None,
            fit_intercept: true,
            normalize: false,
            alpha,
            l1_ratio: l1_ratio.clamp(0.0, 1.0),
            max_iter: 1000,
            tol: 1e-4,
            positive: false,
            precompute: Precompute::Auto,
            selection: Selection::Cyclic,
            random_state: None,
            n_iter: 0,
            is_fitted: false,
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_l1_ratio(mut self, l1_ratio: f64) -> Self {
        self.l1_ratio = l1_ratio.clamp(0.0, 1.0);
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    pub fn with_fit_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }

    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    pub fn with_positive(mut self, positive: bool) -> Self {
        self.positive = positive;
        self
    }

    pub fn with_precompute(mut self, precompute: Precompute) -> Self {
        self.precompute = precompute;
        self
    }

    pub fn with_selection(mut self, selection: Selection, random_state: Option<u64>) -> Self {
        self.selection = selection;
        self.random_state = random_state;
        self
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(RaError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(RaError::ValidationError("Cannot fit on zero samples".to_string()));
        }
        if self.alpha < 0.0 {
            return Err(RaError::InvalidParameter {
                name: "alpha".to_string(),
                value: self.alpha.to_string(),
                reason: "must be non-negative".to_string(),
            });
        }

        let prepared = prepare(x, y, self.fit_intercept, self.normalize);
        let w = self.descend(&prepared.x, &prepared.y);

        // Undo the column scaling
        let w = &w / &prepared.x_scale;
        self.intercept = Some(match &prepared.x_mean {
            Some(xm) => prepared.y_mean - w.dot(xm),
            None => 0.0,
        });
        self.coefficients = Some(w);
        self.is_fitted = true;
        Ok(self)
    }

    fn descend(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Array1<f64> {
        let (n_samples, n_features) = x.dim();
        let n = n_samples as f64;
        let l1_penalty = self.alpha * self.l1_ratio * n;
        let l2_penalty = self.alpha * (1.0 - self.l1_ratio) * n;

        let col_norms: Vec<f64> = (0..n_features)
            .map(|j| x.column(j).dot(&x.column(j)))
            .collect();
        let gram = if self.precompute.resolve(n_samples, n_features) {
            Some((x.t().dot(x), x.t().dot(y)))
        } else {
            None
        };

        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state.unwrap_or(0));
        let mut order: Vec<usize> = (0..n_features).collect();
        let mut w = Array1::<f64>::zeros(n_features);
        let mut r = y.clone();
        // Scale-aware tolerance on the largest coordinate update
        let tol = self.tol * y.dot(y).max(f64::EPSILON) / n;

        self.n_iter = 0;
        for _ in 0..self.max_iter {
            self.n_iter += 1;
            if self.selection == Selection::Random {
                order.shuffle(&mut rng);
            }

            let mut max_update = 0.0f64;
            for &j in &order {
                let denom = col_norms[j] + l2_penalty;
                if denom < 1e-15 {
                    w[j] = 0.0;
                    continue;
                }
                let old_wj = w[j];
                let rho = match &gram {
                    Some((g, q)) => q[j] - g.row(j).dot(&w) + col_norms[j] * old_wj,
                    None => x.column(j).dot(&r) + col_norms[j] * old_wj,
                };
                let mut new_wj = soft_threshold(rho, l1_penalty) / denom;
                if self.positive && new_wj < 0.0 {
                    new_wj = 0.0;
                }
                w[j] = new_wj;

                let delta = old_wj - new_wj;
                if delta != 0.0 {
                    if gram.is_none() {
                        r.scaled_add(delta, &x.column(j));
                    }
                    max_update = max_update.max(delta.abs() * col_norms[j].sqrt());
                }
            }

            if max_update * max_update / n < tol {
                break;
            }
        }

        w
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = match (&self.coefficients, self.is_fitted) {
            (Some(c), true) => c,
            _ => return Err(RaError::not_fitted("ElasticNet")),
        };
        if x.ncols() != coefficients.len() {
            return Err(RaError::ShapeError {
                expected: format!("{} features", coefficients.len()),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(x.dot(coefficients) + self.intercept.unwrap_or(0.0))
    }

    pub fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        let p = self.predict(x)?;
        let ym = y.mean().unwrap_or(0.0);
        let ss_res = (&p - y).mapv(|v| v * v).sum();
        let ss_tot = y.mapv(|v| (v - ym).powi(2)).sum();
        Ok(if ss_tot == 0.0 { 1.0 } else { 1.0 - ss_res / ss_tot })
    }
}

/// Elastic net with alpha (and optionally l1 ratio) chosen by k-fold cross-validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElasticNetCV {
    /// Candidate l1 ratios; the best one is kept in `l1_ratio_`
    pub l1_ratios: Vec<f64>,
    /// Path length ratio `alpha_min / alpha_max`
    pub eps: f64,
    /// Number of alphas on the path
    pub n_alphas: usize,
    /// Explicit alphas replacing the computed path
    pub alphas: Option<Vec<f64>>,
    pub fit_intercept: bool,
    pub normalize: bool,
    pub precompute: Precompute,
    pub max_iter: usize,
    pub tol: f64,
    /// Number of folds
    pub cv: usize,
    pub positive: bool,
    pub selection: Selection,
    pub random_state: Option<u64>,
    pub verbose: i64,
    /// Selected alpha
    pub alpha_: Option<f64>,
    /// Selected l1 ratio
    pub l1_ratio_: Option<f64>,
    /// Mean held-out MSE per (l1 ratio, alpha), shape `(l1_ratios, alphas)`
    pub mse_path_: Option<Array2<f64>>,
    model: Option<ElasticNetRegression>,
}

impl Default for ElasticNetCV {
    fn default() -> Self {
        Self {
            l1_ratios: vec![0.5],
            eps: 1e-3,
            n_alphas: 100,
            alphas: None,
            fit_intercept: true,
            normalize: false,
            precompute: Precompute::Auto,
            max_iter: 1000,
            tol: 1e-4,
            cv: 5,
            positive: false,
            selection: Selection::Cyclic,
            random_state: None,
            verbose: 0,
            alpha_: None,
            l1_ratio_: None,
            mse_path_: None,
            model: None,
        }
    }
}

impl ElasticNetCV {
    pub fn new() -> Self {
        Self::default()
    }

    fn validate(&self) -> Result<()> {
        let invalid = |name: &str, value: String, reason: &str| RaError::InvalidParameter {
            name: name.to_string(),
            value,
            reason: reason.to_string(),
        };
        if self.l1_ratios.is_empty() || self.l1_ratios.iter().any(|r| !(0.0..=1.0).contains(r)) {
            return Err(invalid("l1_ratio", format!("{:?}", self.l1_ratios), "must lie in [0, 1]"));
        }
        if !(self.eps > 0.0) {
            return Err(invalid("eps", self.eps.to_string(), "must be positive"));
        }
        if self.n_alphas == 0 && self.alphas.is_none() {
            return Err(invalid("n_alphas", "0".to_string(), "must be positive"));
        }
        if self.cv < 2 {
            return Err(invalid("cv", self.cv.to_string(), "needs at least 2 folds"));
        }
        if self.max_iter == 0 {
            return Err(invalid("max_iter", "0".to_string(), "must be positive"));
        }
        Ok(())
    }

    /// Log-spaced decreasing alphas from the smallest alpha that zeroes every coefficient
    fn alpha_grid(&self, x: &Array2<f64>, y: &Array1<f64>, l1_ratio: f64) -> Vec<f64> {
        if let Some(alphas) = &self.alphas {
            let mut alphas = alphas.clone();
            alphas.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
            return alphas;
        }

        let prepared = prepare(x, y, self.fit_intercept, self.normalize);
        let n = x.nrows() as f64;
        let xy = prepared.x.t().dot(&prepared.y);
        let l1 = l1_ratio.max(1e-3);
        let alpha_max = xy.iter().fold(0.0f64, |m, v| m.max(v.abs())) / (n * l1);

        if alpha_max <= f64::EPSILON {
            return vec![f64::EPSILON; self.n_alphas];
        }
        if self.n_alphas == 1 {
            return vec![alpha_max];
        }

        let hi = alpha_max.log10();
        let lo = (alpha_max * self.eps).log10();
        let step = (hi - lo) / (self.n_alphas - 1) as f64;
        (0..self.n_alphas)
            .map(|i| 10f64.powf(hi - step * i as f64))
            .collect()
    }

    fn base_model(&self, alpha: f64, l1_ratio: f64) -> ElasticNetRegression {
        ElasticNetRegression::new(alpha, l1_ratio)
            .with_fit_intercept(self.fit_intercept)
            .with_normalize(self.normalize)
            .with_precompute(self.precompute)
            .with_max_iter(self.max_iter)
            .with_tol(self.tol)
            .with_positive(self.positive)
            .with_selection(self.selection, self.random_state)
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        if x.nrows() != y.len() {
            return Err(RaError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }
        self.validate()?;

        let splits = CrossValidator::new(CVStrategy::KFold { n_splits: self.cv })
            .split(x.nrows(), None)?;

        let paths: Vec<(f64, Vec<f64>)> = self
            .l1_ratios
            .iter()
            .map(|&l1| (l1, self.alpha_grid(x, y, l1)))
            .collect();
        let n_path = paths.iter().map(|(_, a)| a.len()).max().unwrap_or(0);
        let mut mse_path = Array2::from_elem((paths.len(), n_path), f64::INFINITY);

        let mut best: Option<(f64, f64, f64)> = None;
        for (li, (l1_ratio, alphas)) in paths.iter().enumerate() {
            let fold_mse: Vec<Result<f64>> = alphas
                .par_iter()
                .map(|&alpha| {
                    let mut total = 0.0;
                    for split in &splits {
                        let x_train = x.select(Axis(0), &split.train_indices);
                        let y_train = y.select(Axis(0), &split.train_indices);
                        let x_test = x.select(Axis(0), &split.test_indices);
                        let y_test = y.select(Axis(0), &split.test_indices);

                        let mut model = self.base_model(alpha, *l1_ratio);
                        model.fit(&x_train, &y_train)?;
                        let preds = model.predict(&x_test)?;
                        total += (&preds - &y_test).mapv(|v| v * v).mean().unwrap_or(0.0);
                    }
                    Ok(total / splits.len() as f64)
                })
                .collect();

            for (ai, (alpha, mse)) in alphas.iter().zip(fold_mse).enumerate() {
                let mse = mse?;
                mse_path[[li, ai]] = mse;
                if best.map_or(true, |(_, _, b)| mse < b) {
                    best = Some((*alpha, *l1_ratio, mse));
                }
            }
            if self.verbose > 0 {
                debug!(l1_ratio = *l1_ratio, n_alphas = alphas.len(), "Finished alpha path");
            }
        }

        let (alpha, l1_ratio, _) = best.ok_or_else(|| {
            RaError::ComputationError("Elastic net path produced no candidate".to_string())
        })?;

        let mut model = self.base_model(alpha, l1_ratio);
        model.fit(x, y)?;

        self.alpha_ = Some(alpha);
        self.l1_ratio_ = Some(l1_ratio);
        self.mse_path_ = Some(mse_path);
        self.model = Some(model);
        Ok(self)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.model
            .as_ref()
            .ok_or_else(|| RaError::not_fitted("ElasticNetCV"))?
            .predict(x)
    }

    /// Coefficients of the model refit with the selected alpha
    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.model.as_ref().and_then(|m| m.coefficients.as_ref())
    }

    pub fn intercept(&self) -> Option<f64> {
        self.model.as_ref().and_then(|m| m.intercept)
    }

    pub fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        self.model
            .as_ref()
            .ok_or_else(|| RaError::not_fitted("ElasticNetCV"))?
            .score(x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn linear_data() -> (Array2<f64>, Array1<f64>) {
        // y = 3*x1 - 2*x2 + 1
        let x = Array2::from_shape_fn((30, 2), |(i, j)| {
            if j == 0 { i as f64 * 0.5 } else { ((i * 7) % 11) as f64 }
        });
        let y = x.map_axis(Axis(1), |row| 3.0 * row[0] - 2.0 * row[1] + 1.0);
        (x, y)
    }

    #[test]
    fn test_elastic_net() {
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0]];
        let y = array![3.0, 5.0, 7.0, 9.0];
        let mut model = ElasticNetRegression::new(0.01, 0.5);
        model.fit(&x, &y).unwrap();
        assert!(model.is_fitted);
        let r2 = model.score(&x, &y).unwrap();
        assert!(r2 > 0.9, "ElasticNet R² = {}", r2);
    }

    #[test]
    fn test_gram_and_residual_paths_agree() {
        let (x, y) = linear_data();
        let mut gram = ElasticNetRegression::new(0.05, 0.7).with_precompute(Precompute::Always);
        let mut plain = ElasticNetRegression::new(0.05, 0.7).with_precompute(Precompute::Never);
        gram.fit(&x, &y).unwrap();
        plain.fit(&x, &y).unwrap();

        let a = gram.coefficients.unwrap();
        let b = plain.coefficients.unwrap();
        for (p, q) in a.iter().zip(b.iter()) {
            assert!((p - q).abs() < 1e-3, "{} vs {}", p, q);
        }
    }

    #[test]
    fn test_positive_constraint() {
        let (x, y) = linear_data();
        let mut model = ElasticNetRegression::new(0.01, 0.5).with_positive(true);
        model.fit(&x, &y).unwrap();
        assert!(model.coefficients.unwrap().iter().all(|&c| c >= 0.0));
    }

    #[test]
    fn test_random_selection_converges() {
        let (x, y) = linear_data();
        let mut model = ElasticNetRegression::new(0.001, 0.5).with_selection(Selection::Random, Some(13));
        model.fit(&x, &y).unwrap();
        assert!(model.score(&x, &y).unwrap() > 0.99);
    }

    #[test]
    fn test_normalize_recovers_original_scale() {
        let (x, y) = linear_data();
        let mut model = ElasticNetRegression::new(1e-6, 0.5)
            .with_normalize(true)
            .with_max_iter(5000)
            .with_tol(1e-10);
        model.fit(&x, &y).unwrap();
        let coef = model.coefficients.unwrap();
        assert!((coef[0] - 3.0).abs() < 0.05, "coef = {}", coef);
        assert!((coef[1] + 2.0).abs() < 0.05, "coef = {}", coef);
    }

    #[test]
    fn test_cv_selects_small_alpha_for_noiseless_data() {
        let (x, y) = linear_data();
        let mut model = ElasticNetCV {
            l1_ratios: vec![0.2, 0.9],
            n_alphas: 20,
            cv: 3,
            ..ElasticNetCV::default()
        };
        model.fit(&x, &y).unwrap();

        let path = model.mse_path_.as_ref().unwrap();
        assert_eq!(path.dim(), (2, 20));
        assert!(model.alpha_.unwrap() < 0.1);
        assert!(model.score(&x, &y).unwrap() > 0.95);
    }

    #[test]
    fn test_cv_uses_explicit_alphas() {
        let (x, y) = linear_data();
        let mut model = ElasticNetCV {
            alphas: Some(vec![0.5]),
            cv: 3,
            ..ElasticNetCV::default()
        };
        model.fit(&x, &y).unwrap();
        assert_eq!(model.alpha_, Some(0.5));
    }

    #[test]
    fn test_cv_rejects_single_fold() {
        let (x, y) = linear_data();
        let mut model = ElasticNetCV { cv: 1, ..ElasticNetCV::default() };
        assert!(matches!(model.fit(&x, &y), Err(RaError::InvalidParameter { .. })));
    }

    #[test]
    fn test_predict_before_fit() {
        let model = ElasticNetCV::new();
        assert!(model.predict(&array![[1.0, 2.0]]).is_err());
    }
}
