//! Error types for registration optimization.

use thiserror::Error;
use voxalign_io::DocumentError;

/// Main error type for registration operations.
#[derive(Error, Debug)]
pub enum RegistrationError {
    /// Invalid configuration detected before or at the start of a run.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Scales length does not match the metric's local parameter count.
    #[error("scales length mismatch: expected {expected}, got {actual}")]
    ScalesLengthMismatch { expected: usize, actual: usize },

    /// The metric failed while computing its value or derivative, or while
    /// applying a parameter update.
    #[error("metric evaluation error: {0}")]
    Evaluation(String),

    /// Virtual-domain bookkeeping failure (undefined region, point outside
    /// the domain, singular direction matrix).
    #[error("virtual domain error: {0}")]
    Domain(String),

    /// A configuration document is missing required content or cannot be
    /// parsed.
    #[error("malformed input document: {0}")]
    MalformedDocument(#[from] DocumentError),
}

/// Result type for registration operations.
pub type Result<T> = std::result::Result<T, RegistrationError>;

impl RegistrationError {
    /// Create a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a metric evaluation error.
    pub fn evaluation(msg: impl Into<String>) -> Self {
        Self::Evaluation(msg.into())
    }

    /// Create a virtual-domain error.
    pub fn domain(msg: impl Into<String>) -> Self {
        Self::Domain(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = RegistrationError::configuration("no metric attached");
        assert!(matches!(err, RegistrationError::Configuration(_)));
    }

    #[test]
    fn test_error_display() {
        let err = RegistrationError::ScalesLengthMismatch {
            expected: 6,
            actual: 4,
        };
        assert_eq!(err.to_string(), "scales length mismatch: expected 6, got 4");
    }

    #[test]
    fn test_document_error_conversion() {
        let err: RegistrationError = DocumentError::MissingElement {
            parent: "registration".into(),
            name: "gradient-descent".into(),
        }
        .into();
        assert!(err.to_string().contains("gradient-descent"));
    }
}
