//! # fisco-series: Numbering and Certification
//!
//! - **Series** (`series.rs`): [`DocumentSeries`], its head and the
//!   allocation check.
//! - **Registry** (`registry.rs`): [`SeriesRegistry`], allocation,
//!   compare-and-swap commit, rollover and halt.
//! - **Book** (`book.rs`): [`DocumentBook`], per-document serialized
//!   payments and cancellations.
//! - **Certifier** (`certifier.rs`): the atomic certification unit.
//! - **Audit** (`audit.rs`): chain re-verification against the series head.
//!
//! Within one series, certifications commit one at a time and each sees
//! the head the previous one left. Different series never wait on each
//! other.

pub mod audit;
pub mod book;
pub mod certifier;
pub mod error;
pub mod registry;
pub mod series;

pub use audit::{audit_series, resume_after_audit};
pub use book::DocumentBook;
pub use certifier::{CertifiedDocument, Certifier, MAX_ALLOCATION_RETRIES};
pub use error::{CertificationError, SeriesError};
pub use registry::SeriesRegistry;
pub use series::{Allocation, DocumentSeries, DEFAULT_MAX_NUMBER};
