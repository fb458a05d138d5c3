//! Error types for provclust operations.
//!
//! Every failure belongs to one of three caller-facing kinds: a missing
//! prerequisite step ([`ErrorKind::State`]), an invalid caller-supplied
//! parameter ([`ErrorKind::Validation`]) or an unreadable input
//! ([`ErrorKind::Io`]). Anything else is an internal failure.

use thiserror::Error;

/// Main error type for provclust operations.
///
/// # Examples
///
/// ```
/// use provclust::error::{ClusterError, ErrorKind};
///
/// let err = ClusterError::no_dataset();
/// assert_eq!(err.kind(), ErrorKind::State);
/// assert!(err.to_string().contains("no dataset loaded"));
/// ```
#[derive(Debug, Error)]
pub enum ClusterError {
    /// Operation requires a prior step that has not been performed.
    #[error("State error: {message}")]
    State {
        /// What is missing.
        message: String,
    },

    /// Caller-supplied parameter is invalid or conflicts with another.
    #[error("Validation error: {message}")]
    Validation {
        /// Validation failure message
        message: String,
    },

    /// Invalid hyperparameter value provided.
    #[error("Invalid hyperparameter: {param} = {value}, expected {constraint}")]
    InvalidHyperparameter {
        /// Parameter name
        param: String,
        /// Provided value
        value: String,
        /// Constraint description
        constraint: String,
    },

    /// I/O error (file not found, permission denied, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Input file could not be parsed as a delimited table.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration file is malformed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization of an artifact failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Matrix/vector dimensions don't match for the operation.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimensions description
        expected: String,
        /// Actual dimensions found
        actual: String,
    },

    /// A numerical routine could not produce a result.
    #[error("Numerical error: {0}")]
    Numerical(String),
}

/// Caller-facing error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A prerequisite step is missing.
    State,
    /// A parameter is invalid.
    Validation,
    /// The input could not be read.
    Io,
    /// Internal failure.
    Internal,
}

impl ClusterError {
    /// Returns the caller-facing category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::State { .. } => ErrorKind::State,
            Self::Validation { .. } | Self::InvalidHyperparameter { .. } => ErrorKind::Validation,
            Self::Io(_) | Self::Csv(_) => ErrorKind::Io,
            Self::Config(_)
            | Self::Serialization(_)
            | Self::DimensionMismatch { .. }
            | Self::Numerical(_) => ErrorKind::Internal,
        }
    }

    /// Create a state error.
    #[must_use]
    pub fn state(message: impl Into<String>) -> Self {
        Self::State {
            message: message.into(),
        }
    }

    /// Create a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// The error every preprocessing step returns before `load`.
    #[must_use]
    pub fn no_dataset() -> Self {
        Self::state("no dataset loaded")
    }

    /// Create an invalid hyperparameter error.
    #[must_use]
    pub fn invalid_param(
        param: &str,
        value: impl std::fmt::Display,
        constraint: &str,
    ) -> Self {
        Self::InvalidHyperparameter {
            param: param.to_string(),
            value: value.to_string(),
            constraint: constraint.to_string(),
        }
    }

    /// Create an error for an unrecognized method or strategy name.
    #[must_use]
    pub fn unknown_method(what: &str, value: &str, expected: &[&str]) -> Self {
        Self::validation(format!(
            "unknown {what} '{value}' (expected one of: {})",
            expected.join(", ")
        ))
    }

    /// Create a dimension mismatch error with descriptive context
    #[must_use]
    pub fn dimension_mismatch(context: &str, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            expected: format!("{context}={expected}"),
            actual: format!("{actual}"),
        }
    }

    /// Create a column-not-found error.
    #[must_use]
    pub fn unknown_column(name: &str) -> Self {
        Self::validation(format!("column '{name}' not found"))
    }
}

/// Convenience type alias for Results.
pub type Result<T> = std::result::Result<T, ClusterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        let err = ClusterError::no_dataset();
        assert!(err.to_string().contains("State error"));
        assert!(err.to_string().contains("no dataset loaded"));
        assert_eq!(err.kind(), ErrorKind::State);
    }

    #[test]
    fn test_invalid_hyperparameter_display() {
        let err = ClusterError::invalid_param("n_clusters", 0, ">= 1");
        let msg = err.to_string();
        assert!(msg.contains("Invalid hyperparameter"));
        assert!(msg.contains("n_clusters"));
        assert!(msg.contains(">= 1"));
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_unknown_method_names_value() {
        let err = ClusterError::unknown_method("normalization method", "zscore", &["standard"]);
        assert!(err.to_string().contains("'zscore'"));
        assert!(err.to_string().contains("standard"));
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ClusterError = io_err.into();
        assert!(matches!(err, ClusterError::Io(_)));
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_error_source_io() {
        use std::error::Error;
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = ClusterError::Io(io_err);
        assert!(err.source().is_some());
    }

    #[test]
    fn test_error_source_validation() {
        use std::error::Error;
        let err = ClusterError::validation("test");
        assert!(err.source().is_none());
    }

    #[test]
    fn test_dimension_mismatch_helper() {
        let err = ClusterError::dimension_mismatch("rows", 100, 50);
        let msg = err.to_string();
        assert!(msg.contains("rows=100"));
        assert!(msg.contains("50"));
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}
