//! Error types for model training, storage and serving

use thiserror::Error;

/// Result type alias for service operations
pub type Result<T> = std::result::Result<T, MlopsError>;

/// Main error type.
///
/// The first group of variants is caller-visible and is propagated unchanged
/// up to the transport boundary; the second group covers internal failures.
#[derive(Error, Debug)]
pub enum MlopsError {
    #[error("Dataset not found: {0}")]
    DatasetNotFound(String),

    #[error("Failed to read dataset: {0}")]
    DatasetReadError(String),

    #[error("Failed to parse dataset: {0}")]
    DatasetParseError(String),

    #[error("Empty dataset")]
    EmptyDataset,

    #[error("Target column {0} not found")]
    TargetColumnNotFound(String),

    #[error("Unknown model_key: {0}")]
    UnknownModelKey(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("No instances provided")]
    NoInstances,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl MlopsError {
    /// Errors that name a resource that does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            MlopsError::DatasetNotFound(_) | MlopsError::ModelNotFound(_)
        )
    }

    /// Errors caused by the caller's input rather than by the service.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            MlopsError::DatasetReadError(_)
                | MlopsError::DatasetParseError(_)
                | MlopsError::EmptyDataset
                | MlopsError::TargetColumnNotFound(_)
                | MlopsError::UnknownModelKey(_)
                | MlopsError::NoInstances
                | MlopsError::ValidationError(_)
                | MlopsError::FeatureNotFound(_)
        )
    }
}

impl From<polars::error::PolarsError> for MlopsError {
    fn from(err: polars::error::PolarsError) -> Self {
        MlopsError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for MlopsError {
    fn from(err: serde_json::Error) -> Self {
        MlopsError::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for MlopsError {
    fn from(err: bincode::Error) -> Self {
        MlopsError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for MlopsError {
    fn from(err: ndarray::ShapeError) -> Self {
        MlopsError::ShapeError {
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
        let err = MlopsError::TargetColumnNotFound("label".to_string());
        assert_eq!(err.to_string(), "Target column label not found");
        assert_eq!(MlopsError::NoInstances.to_string(), "No instances provided");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: MlopsError = io_err.into();
        assert!(matches!(err, MlopsError::IoError(_)));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_error_classification() {
        assert!(MlopsError::ModelNotFound("x".into()).is_not_found());
        assert!(MlopsError::DatasetNotFound("x".into()).is_not_found());
        assert!(MlopsError::UnknownModelKey("svm".into()).is_validation());
        assert!(MlopsError::NoInstances.is_validation());
        assert!(!MlopsError::ModelNotFitted.is_validation());
        assert!(!MlopsError::ModelNotFitted.is_not_found());
    }
}
