//! # Series Errors
//!
//! [`SeriesError`] covers the registry and the document book.
//! [`CertificationError`] is the umbrella returned by the certification
//! unit: every failure below it aborts the whole unit, and only an
//! allocation conflict is worth retrying.

use fisco_core::{CompanyId, DocumentId, DocumentType, SeriesId};
use fisco_crypto::ChainError;
use fisco_state::LifecycleError;
use fisco_tax::TaxError;
use thiserror::Error;

/// Errors raised by the series registry and document book.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SeriesError {
    #[error("series {series_id} not found")]
    SeriesNotFound { series_id: SeriesId },

    #[error("series {series_id} is inactive")]
    SeriesInactive { series_id: SeriesId },

    /// The next number would pass the configured ceiling.
    #[error("series {series_id} exhausted at {max_number}")]
    SeriesExhausted { series_id: SeriesId, max_number: u64 },

    /// Certification is suspended until the series passes an audit.
    #[error("series {series_id} halted: {reason}")]
    SeriesHalted { series_id: SeriesId, reason: String },

    #[error("series {series_id} already exists")]
    DuplicateSeries { series_id: SeriesId },

    /// Issue date or rollover year does not fit the series year.
    #[error("series {series_id} covers {series_year}, got {year}")]
    YearMismatch {
        series_id: SeriesId,
        series_year: i32,
        year: i32,
    },

    #[error("series {series_id} numbers {series_type} documents, got {document_type}")]
    TypeMismatch {
        series_id: SeriesId,
        series_type: DocumentType,
        document_type: DocumentType,
    },

    #[error("series {series_id} belongs to {series_company}, document to {document_company}")]
    CompanyMismatch {
        series_id: SeriesId,
        series_company: CompanyId,
        document_company: CompanyId,
    },

    /// The series moved between allocation and commit.
    #[error("allocation conflict on {series_id}: expected last number {expected}, found {actual}")]
    ConcurrentAllocationConflict {
        series_id: SeriesId,
        expected: u64,
        actual: u64,
    },

    /// The series head does not match the last certified document.
    #[error("series {series_id} head at {expected}, documents end at {actual}")]
    HeadMismatch {
        series_id: SeriesId,
        expected: u64,
        actual: u64,
    },

    #[error("document {document_id} already registered")]
    DuplicateDocument { document_id: DocumentId },

    #[error("document {document_id} not found")]
    DocumentNotFound { document_id: DocumentId },
}

/// Failure of a certification unit.
#[derive(Error, Debug)]
pub enum CertificationError {
    #[error(transparent)]
    Tax(#[from] TaxError),

    #[error(transparent)]
    Series(#[from] SeriesError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Chain(#[from] ChainError),
}

impl CertificationError {
    /// Whether retrying the same unit may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Series(SeriesError::ConcurrentAllocationConflict { .. })
        )
    }
}
