//! Tax engine and configuration errors.
//!
//! Every [`TaxError`] is an input error: it is raised before any series or
//! document state is touched, and it is never retried.

use std::path::PathBuf;

use fisco_core::{Decimal, TaxRateCode};
use thiserror::Error;

/// Errors raised while computing document totals.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TaxError {
    /// The rate code is not in the configured rate table.
    #[error("line {line}: unknown tax rate code {code}")]
    InvalidRate { line: usize, code: TaxRateCode },

    /// Negative quantity on a document type that does not carry a reversal.
    #[error("line {line}: quantity {quantity} must not be negative")]
    InvalidQuantity { line: usize, quantity: Decimal },

    /// Negative unit price.
    #[error("line {line}: unit price {unit_price} must not be negative")]
    InvalidUnitPrice { line: usize, unit_price: Decimal },

    /// A discount fraction outside `[0, 1]`. `line` is `None` for the
    /// document-level discount.
    #[error("discount {discount} outside [0, 1] (line {line:?})")]
    InvalidDiscount {
        line: Option<usize>,
        discount: Decimal,
    },

    /// A document with no lines cannot be totalled.
    #[error("document has no line items")]
    EmptyDocument,

    /// An amount exceeded the representable decimal range.
    #[error("line {line}: amount overflow")]
    AmountOverflow { line: usize },
}

/// Errors raised while loading or validating a [`crate::FiscalConfiguration`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed.
    #[error("failed to parse fiscal configuration at {path}: {source}")]
    YamlParse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    /// The configuration file could not be read.
    #[error("failed to read fiscal configuration at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A field holds an unusable value.
    #[error("invalid fiscal configuration field {field}: {reason}")]
    Invalid { field: String, reason: String },
}
