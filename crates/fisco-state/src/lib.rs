//! # fisco-state: Document Lifecycle
//!
//! The [`FiscalDocument`] aggregate and its status machine:
//!
//! ```text
//! Draft → Certified → PartiallyPaid → Paid
//!   └────────┴──────────┴─────────────┴──→ Cancelled
//! ```
//!
//! - **Lifecycle** (`lifecycle.rs`): the transition table, transition log
//!   records and [`LifecycleError`].
//! - **Document** (`document.rs`): draft editing with totals recomputation,
//!   certification freeze, payments, cancellation within open periods,
//!   discard, and derived credit/debit notes.
//! - **Record** (`record.rs`): validating conversion from persisted rows.
//!
//! This crate never allocates numbers or computes hashes itself;
//! `fisco-series` drives certification and hands the result to
//! [`FiscalDocument::apply_certification`].

pub mod document;
pub mod lifecycle;
pub mod record;

pub use document::{Certification, Derivation, DocumentHeader, FiscalDocument, Payment};
pub use lifecycle::{DocumentStatus, LifecycleError, TransitionRecord};
pub use record::{PaymentRecord, RecordError, StoreRecord};
