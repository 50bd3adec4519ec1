//! Error types for bmi-forecast

use thiserror::Error;

/// Result type alias for bmi-forecast operations
pub type Result<T> = std::result::Result<T, BmiError>;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum BmiError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("No model recorded for cluster {0}")]
    UnknownCluster(usize),

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),
}

impl From<polars::error::PolarsError> for BmiError {
    fn from(err: polars::error::PolarsError) -> Self {
        BmiError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for BmiError {
    fn from(err: serde_json::Error) -> Self {
        BmiError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for BmiError {
    fn from(err: ndarray::ShapeError) -> Self {
        BmiError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

impl From<sqlx::Error> for BmiError {
    fn from(err: sqlx::Error) -> Self {
        BmiError::DatabaseError(err.to_string())
    }
}
