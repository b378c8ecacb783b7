//! Error types for cartcast

use thiserror::Error;

/// Result type alias for cartcast operations
pub type Result<T> = std::result::Result<T, CartcastError>;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum CartcastError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Fit failure on slot '{slot}': {reason}")]
    FitFailure { slot: String, reason: String },

    #[error("Transformer '{transformer}' is not fitted")]
    NotFitted { transformer: String },

    #[error("Unseen category '{value}' in column '{column}'")]
    UnseenCategory { column: String, value: String },

    #[error("Transformer '{transformer}' produced {actual} rows, expected {expected}")]
    ShapeMismatch {
        transformer: String,
        expected: usize,
        actual: usize,
    },

    #[error("No artifact stored under slot '{slot}' ({path})")]
    ArtifactNotFound { slot: String, path: String },

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Optimization error: {0}")]
    OptimizationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },
}

impl From<polars::error::PolarsError> for CartcastError {
    fn from(err: polars::error::PolarsError) -> Self {
        CartcastError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for CartcastError {
    fn from(err: serde_json::Error) -> Self {
        CartcastError::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for CartcastError {
    fn from(err: bincode::Error) -> Self {
        CartcastError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for CartcastError {
    fn from(err: ndarray::ShapeError) -> Self {
        CartcastError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CartcastError::UnseenCategory {
            column: "TopCategory".to_string(),
            value: "Garden".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Unseen category 'Garden' in column 'TopCategory'"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: CartcastError = io_err.into();
        assert!(matches!(err, CartcastError::IoError(_)));
    }
}
