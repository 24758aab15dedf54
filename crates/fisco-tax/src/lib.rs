//! # fisco-tax: Tax Engine
//!
//! Stateless VAT and industrial-withholding arithmetic for fiscal
//! documents, driven by a company's [`FiscalConfiguration`].
//!
//! Everything here is a pure function of its inputs and safe to call from
//! any number of threads. Input errors are raised as [`TaxError`] before a
//! caller has touched any series or document state.

pub mod calculator;
pub mod config;
pub mod engine;
pub mod error;

pub use calculator::{gross_up, withholding_on, GrossUp};
pub use config::{FiscalConfiguration, TaxRegime};
pub use engine::{compute_totals, LineBreakdown, RateSummary, TaxComputation};
pub use error::{ConfigError, TaxError};
