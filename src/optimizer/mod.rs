//! Hyperparameter configuration and grid search
//!
//! - Parameter values, per-estimator parameter tables and validation
//! - Grid construction (`conf_params`, `choose_params`, `resolve_grid`)
//! - Exhaustive cross-validated grid search

mod config;
pub mod grid;
pub mod grid_search;
pub mod params;

pub use config::{FitOptions, GridSearchConfig, Scoring};
pub use grid::{choose_params, combination_at, conf_params, n_combinations, resolve_grid};
pub use grid_search::{GridSearch, Study, TrialResult};
pub use params::{FitConfiguration, GridConfiguration, ParamKind, ParamMap, ParamSpec, ParamTable, ParamValue};
