//! # fisco-core: Foundational Types for the Certification Engine
//!
//! This crate is the leaf of the `fisco` workspace. It defines the value
//! types every other crate builds on: identifiers, money, fiscal periods,
//! the document vocabulary, and the canonical byte pipeline that feeds the
//! certification fingerprint.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** `DocumentId`, `SeriesId`,
//!    `CompanyId`, `PartyId`, `Nif`; no bare strings or UUIDs cross a
//!    crate boundary.
//!
//! 2. **`CanonicalBytes` newtype.** All fingerprint computation flows through
//!    `CanonicalBytes::new()`. Floats are rejected; monetary amounts reach
//!    the digest as fixed-scale decimal strings.
//!
//! 3. **Decimal money.** Amounts are `rust_decimal::Decimal`. Arithmetic runs
//!    at full precision and is rounded once, at the storage boundary, by a
//!    [`RoundingPolicy`].
//!
//! 4. **Sign by type, not by quantity.** Every [`DocumentType`] carries a
//!    [`DocumentEffect`]; credit notes are reversals, never negative lines.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `fisco-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod canonical;
pub mod digest;
pub mod document;
pub mod error;
pub mod identity;
pub mod money;
pub mod temporal;

// Re-export primary types for ergonomic imports.
pub use canonical::CanonicalBytes;
pub use digest::{sha256_digest, sha256_hex, ContentDigest, DigestAlgorithm};
pub use document::{
    DocumentEffect, DocumentSide, DocumentType, LineItem, PartySnapshot, TaxRateCode, Totals,
};
pub use error::{CanonicalizationError, FiscoError};
pub use identity::{CompanyId, DocumentId, Nif, PartyId, SeriesId};
pub use money::{format_amount, Currency, RoundingPolicy, MONEY_SCALE};
pub use temporal::{FiscalPeriod, Timestamp};

pub use rust_decimal::Decimal;
