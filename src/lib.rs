//! ra-models - estimator wrappers with hyperparameter grids
//!
//! This crate wraps three supervised models behind one fit/evaluate API:
//! - [`estimators::ENCVRegressor`] - elastic net with cross-validated alpha
//! - [`estimators::RFRegressor`] - random forest regression
//! - [`estimators::RFClassifier`] - random forest classification
//!
//! Each wrapper owns a seeded train/test split, validates parameter
//! overrides against its parameter table, runs cross-validated grid search,
//! refits from the best combination and reports test-set metrics.
//!
//! # Modules
//!
//! - [`estimators`] - the wrappers and their parameter tables
//! - [`optimizer`] - parameter values, grid construction and grid search
//! - [`training`] - native back-ends (trees, forests, elastic net, metrics)
//! - [`visualization`] - prediction plots exported as PNG
//! - [`utils`] - DataFrame conversion and thread pools
//! - [`cli`] - command-line interface
//!
//! # Example
//!
//! ```no_run
//! use polars::prelude::*;
//! use ra_models::prelude::*;
//!
//! # fn main() -> ra_models::error::Result<()> {
//! let task = df!("x" => &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0])?;
//! let target = df!("y" => &[2.0, 4.0, 6.0, 8.0, 10.0, 12.0])?;
//!
//! let mut model = RFRegressor::new(&task, &target, 0.7, false)?;
//! model.fit_grid(None, GridSearchConfig::new().with_count(2))?;
//! model.fit(None, true, FitOptions::default())?;
//! println!("{} MAE = {}", model, model.mean_absolute_error()?);
//! # Ok(())
//! # }
//! ```

pub mod error;

pub mod estimators;
pub mod optimizer;
pub mod training;

pub mod cli;
pub mod utils;
pub mod visualization;

pub use error::{RaError, Result};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{RaError, Result};
    pub use crate::estimators::{ENCVRegressor, Estimator, EstimatorKind, RFClassifier, RFRegressor};
    pub use crate::optimizer::{
        FitConfiguration, FitOptions, GridConfiguration, GridSearchConfig, ParamKind, ParamValue, Scoring,
    };
}
