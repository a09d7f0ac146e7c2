//! Estimator back-ends
//!
//! Native implementations the wrappers delegate to:
//! - Decision trees and random forests (regression and classification)
//! - Elastic net and its cross-validated variant
//! - K-fold / stratified k-fold splitting and the hold-out split
//! - Evaluation metrics

pub mod cross_validation;
pub mod decision_tree;
pub mod linear_models;
pub mod metrics;
pub mod random_forest;

pub use cross_validation::{train_test_split, CVResults, CVSplit, CVStrategy, CrossValidator};
pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use linear_models::{ElasticNetCV, ElasticNetRegression, Precompute, Selection};
pub use metrics::{accuracy_score, mean_absolute_error, mean_squared_error, r2_score, roc_auc_score};
pub use random_forest::{MaxFeatures, MaxSamples, MinSamplesSplit, RandomForest};
