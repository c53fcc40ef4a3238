//! Error types for odyssey-ml

use thiserror::Error;

/// Result type alias for odyssey-ml operations
pub type Result<T> = std::result::Result<T, OdysseyError>;

/// Main error type for the model lifecycle
#[derive(Error, Debug)]
pub enum OdysseyError {
    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Dataset not found: {0}")]
    NotFound(String),

    #[error("Failed to delete {name}: {reason}")]
    Deletion { name: String, reason: String },

    #[error("Training configuration error: {0}")]
    TrainingConfig(String),

    #[error("Failed to load model {id}: {reason}")]
    ModelLoad { id: String, reason: String },

    #[error("Input is missing required features: {}", .missing.join(", "))]
    SchemaMismatch { missing: Vec<String> },

    #[error("Explainability computation failed in {section}: {reason}")]
    ExplainabilityComputation { section: String, reason: String },

    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    #[error("Data error: {0}")]
    Data(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    Shape { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Computation error: {0}")]
    Computation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl OdysseyError {
    pub(crate) fn explain(section: &str, reason: impl std::fmt::Display) -> Self {
        OdysseyError::ExplainabilityComputation {
            section: section.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn model_load(id: impl std::fmt::Display, reason: impl std::fmt::Display) -> Self {
        OdysseyError::ModelLoad {
            id: id.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<polars::error::PolarsError> for OdysseyError {
    fn from(err: polars::error::PolarsError) -> Self {
        OdysseyError::Data(err.to_string())
    }
}

impl From<serde_json::Error> for OdysseyError {
    fn from(err: serde_json::Error) -> Self {
        OdysseyError::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for OdysseyError {
    fn from(err: bincode::Error) -> Self {
        OdysseyError::Serialization(err.to_string())
    }
}

impl From<ndarray::ShapeError> for OdysseyError {
    fn from(err: ndarray::ShapeError) -> Self {
        OdysseyError::Shape {
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
        let err = OdysseyError::InvalidData("no header row".to_string());
        assert_eq!(err.to_string(), "Invalid data: no header row");
    }

    #[test]
    fn test_schema_mismatch_lists_missing_names() {
        let err = OdysseyError::SchemaMismatch {
            missing: vec!["B".to_string(), "C".to_string()],
        };
        assert_eq!(err.to_string(), "Input is missing required features: B, C");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: OdysseyError = io_err.into();
        assert!(matches!(err, OdysseyError::Io(_)));
    }
}
