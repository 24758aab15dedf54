//! # Error Types: Structured Error Hierarchy
//!
//! Foundational error types for the `fisco` workspace. Component crates
//! define their own `thiserror` enums (tax, chain, lifecycle, series) with
//! structured fields; this module holds the errors raised by the value
//! types themselves.
//!
//! - Validation errors name the field and the offending value.
//! - Integrity errors carry the expected vs actual representation.

use thiserror::Error;

/// Top-level error type for core value construction.
#[derive(Error, Debug)]
pub enum FiscoError {
    /// Canonicalization failed.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// Content integrity violation (malformed digest, corrupted value).
    #[error("integrity error: {0}")]
    Integrity(String),

    /// A value failed validation at construction.
    #[error("validation error on {field}: {reason}")]
    Validation {
        /// The field or type that failed validation.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

impl FiscoError {
    /// Shorthand for a [`FiscoError::Validation`] error.
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }
}

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Float values are not permitted in canonical representations.
    #[error("float values are not permitted in canonical representations; render amounts as decimal strings: {0}")]
    FloatRejected(f64),

    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}
