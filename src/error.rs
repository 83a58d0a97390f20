//! Error types for the chord pipeline

use std::fmt;

/// Custom error type for chord feature/label processing
#[derive(Debug, Clone)]
pub enum ChordError {
    /// E001: Input validation error (caller contract violation)
    InputValidationError(String),
    /// E002: Array shape mismatch
    ShapeMismatch(String),
    /// E003: Unsupported pooling reducer
    UnsupportedReducer(String),
    /// E004: No quality table for the requested vocabulary size
    UnsupportedVocabulary(usize),
    /// E005: Malformed chord label
    LabelParseError(String),
    /// E006: Configuration validation failed
    ConfigValidationFailed(String),
    /// E007: Estimation or statistics file I/O error
    EstimationFileError(String),
    /// E008: Malformed estimation report
    ReportFormatError(String),
}

impl fmt::Display for ChordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChordError::InputValidationError(msg) => {
                write!(f, "E001: Input validation error - {}", msg)
            }
            ChordError::ShapeMismatch(msg) => {
                write!(f, "E002: Shape mismatch - {}", msg)
            }
            ChordError::UnsupportedReducer(name) => {
                write!(
                    f,
                    "E003: Function '{}' unsupported. Expected one of {{mean, median, max, mode}}",
                    name
                )
            }
            ChordError::UnsupportedVocabulary(dim) => {
                write!(f, "E004: Unsupported vocabulary size {}", dim)
            }
            ChordError::LabelParseError(msg) => {
                write!(f, "E005: Label parse error - {}", msg)
            }
            ChordError::ConfigValidationFailed(msg) => {
                write!(f, "E006: Configuration validation failed - {}", msg)
            }
            ChordError::EstimationFileError(msg) => {
                write!(f, "E007: Estimation file error - {}", msg)
            }
            ChordError::ReportFormatError(msg) => {
                write!(f, "E008: Report format error - {}", msg)
            }
        }
    }
}

impl std::error::Error for ChordError {}

impl From<std::io::Error> for ChordError {
    fn from(err: std::io::Error) -> Self {
        ChordError::EstimationFileError(format!("File I/O error: {}", err))
    }
}

impl From<serde_json::Error> for ChordError {
    fn from(err: serde_json::Error) -> Self {
        ChordError::ReportFormatError(format!("JSON error: {}", err))
    }
}

impl From<ndarray::ShapeError> for ChordError {
    fn from(err: ndarray::ShapeError) -> Self {
        ChordError::ShapeMismatch(err.to_string())
    }
}

impl From<anyhow::Error> for ChordError {
    fn from(err: anyhow::Error) -> Self {
        ChordError::ConfigValidationFailed(format!("Generic error: {}", err))
    }
}

/// Result type alias for chord pipeline operations
pub type Result<T> = std::result::Result<T, ChordError>;
