//! Error types for the ra-models estimator wrappers

use thiserror::Error;

/// Result type alias for ra-models operations
pub type Result<T> = std::result::Result<T, RaError>;

/// Main error type for the estimator wrappers and their back-ends
#[derive(Error, Debug)]
pub enum RaError {
    #[error("The parameter {0} does not exist in the set of allowed parameters!")]
    UnknownParameter(String),

    #[error("Parameter {name} expects {expected}, got {actual}")]
    TypeMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("You should only choose one way to select hyperparameters!")]
    ConflictingFitModes,

    #[error("At first you need to learn grid")]
    GridNotFitted,

    #[error("You haven't trained the {0} yet!")]
    ModelNotFitted(String),

    #[error("The specified path was not found: {0}")]
    PathNotFound(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Plot error: {0}")]
    PlotError(String),

    #[error("Thread pool error: {0}")]
    ThreadPoolError(String),
}

impl RaError {
    /// Shorthand for an estimator that was queried before `fit`
    pub fn not_fitted(name: impl Into<String>) -> Self {
        RaError::ModelNotFitted(name.into())
    }
}

impl From<polars::error::PolarsError> for RaError {
    fn from(err: polars::error::PolarsError) -> Self {
        RaError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for RaError {
    fn from(err: serde_json::Error) -> Self {
        RaError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for RaError {
    fn from(err: ndarray::ShapeError) -> Self {
        RaError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

impl From<rayon::ThreadPoolBuildError> for RaError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        RaError::ThreadPoolError(err.to_string())
    }
}
