//! Error types for depurar operations.
//!
//! Provides rich error context for library consumers.

use std::fmt;

/// Main error type for depurar operations.
///
/// Configuration problems are caught at construction time and reported
/// through these variants; shape violations inside a forward pass are
/// programming errors and panic with a descriptive message instead.
///
/// # Examples
///
/// ```
/// use depurar::error::DepurarError;
///
/// let err = DepurarError::MismatchedPyramid {
///     forward_len: 4,
///     backward_len: 2,
/// };
/// assert!(err.to_string().contains("pyramid"));
/// ```
#[derive(Debug)]
pub enum DepurarError {
    /// Tensor dimensions don't match for the operation.
    DimensionMismatch {
        /// Expected dimensions description
        expected: String,
        /// Actual dimensions found
        actual: String,
    },

    /// Forward and backward pyramid configuration arrays disagree.
    ///
    /// The backward pyramid must have exactly one level fewer than the
    /// forward pyramid (the deepest forward output seeds the upsampling
    /// pass directly).
    MismatchedPyramid {
        /// Number of forward scales configured
        forward_len: usize,
        /// Number of backward scales configured
        backward_len: usize,
    },

    /// Invalid hyperparameter value provided.
    InvalidHyperparameter {
        /// Parameter name
        param: String,
        /// Provided value
        value: String,
        /// Constraint description
        constraint: String,
    },

    /// Generic error with string message.
    Other(String),
}

impl fmt::Display for DepurarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DimensionMismatch { expected, actual } => {
                write!(f, "dimension mismatch: expected {expected}, got {actual}")
            }
            Self::MismatchedPyramid {
                forward_len,
                backward_len,
            } => {
                write!(
                    f,
                    "mismatched pyramid configuration: {forward_len} forward scales require \
                     {} backward scales, got {backward_len}",
                    forward_len.saturating_sub(1)
                )
            }
            Self::InvalidHyperparameter {
                param,
                value,
                constraint,
            } => {
                write!(
                    f,
                    "invalid hyperparameter {param} = {value}: must satisfy {constraint}"
                )
            }
            Self::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for DepurarError {}

/// Convenience result type for depurar operations.
pub type Result<T> = std::result::Result<T, DepurarError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mismatched_pyramid_display() {
        let err = DepurarError::MismatchedPyramid {
            forward_len: 4,
            backward_len: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains('4'));
        assert!(msg.contains('3'));
        assert!(msg.contains('2'));
    }

    #[test]
    fn test_invalid_hyperparameter_display() {
        let err = DepurarError::InvalidHyperparameter {
            param: "hard_mining".to_string(),
            value: "1.5".to_string(),
            constraint: "0.0 <= f <= 1.0".to_string(),
        };
        assert!(err.to_string().contains("hard_mining"));
        assert!(err.to_string().contains("1.5"));
    }

    #[test]
    fn test_error_is_std_error() {
        let err: Box<dyn std::error::Error> = Box::new(DepurarError::Other("boom".to_string()));
        assert_eq!(err.to_string(), "boom");
    }
}
