//! Type conversion error types.

use thiserror::Error;

/// Errors that can occur when extracting typed data from host values.
///
/// The codec itself never fails: encoding falls back to text and decoding
/// falls back to raw bytes. These errors come from the typed accessors
/// layered on top of it.
#[derive(Debug, Error)]
pub enum TypeError {
    /// Value is null when non-null was expected.
    #[error("unexpected null value")]
    UnexpectedNull,

    /// Type mismatch during conversion.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Expected type name.
        expected: &'static str,
        /// Actual type name.
        actual: String,
    },

    /// Value is out of range for target type.
    #[error("value out of range for {target_type}")]
    OutOfRange {
        /// Target type name.
        target_type: &'static str,
    },

    /// Text data is not valid UTF-8.
    #[error("invalid string encoding: {0}")]
    InvalidEncoding(String),

    /// Text could not be parsed as a number.
    #[error("invalid number: {0}")]
    InvalidNumber(String),

    /// Unknown decimal policy name.
    #[error("unknown decimal policy: {0}")]
    UnknownPolicy(String),
}
