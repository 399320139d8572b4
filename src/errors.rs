//! Errors
//!
//! Custom error types used throughout the `model_diagnostics` crate.
use thiserror::Error;

/// Errors that can occur while computing diagnostics.
#[derive(Debug, Error)]
pub enum DiagnosticsError {
    /// Unable to write model to file.
    #[error("Unable to write model to file: {0}")]
    UnableToWrite(String),
    /// Unable to read model from file.
    #[error("Unable to read model from a file {0}")]
    UnableToRead(String),
    /// Invalid value parsing.
    #[error("Invalid value {0} passed for {1}, expected one of {2}.")]
    ParseString(String, String, String),
    /// First value is the name of the parameter, second is expected, third is what was passed.
    #[error("Invalid parameter value passed for {0}, expected {1} but {2} provided.")]
    InvalidParameter(String, String, String),
    /// Two paired inputs do not have the same number of rows.
    #[error("Arrays must have the same length, got {0} with {1} and {2} with {3} rows.")]
    ShapeMismatch(String, usize, String, usize),
    /// A NaN or infinite value was found where only finite values are allowed.
    #[error("Array {0} contains a non-finite value at position {1}.")]
    NonFiniteValue(String, usize),
    /// Weights must be finite, non-negative and not all zero.
    #[error("Invalid weights: {0}")]
    InvalidWeight(String),
}
