//! # Document Series
//!
//! A series numbers one document type for one company in one calendar
//! year. Its head is the pair `(last_number, last_hash)`: the number and
//! fingerprint of the most recent certification, or `(0, GENESIS_HASH)`
//! for an empty series.
//!
//! ## Invariant
//!
//! The head only moves through [`DocumentSeries::advance`], and only by
//! one. Numbers are never reused or skipped, and a series never wraps to a
//! new year; the next year gets a new series through
//! [`DocumentSeries::next_year`].

use chrono::Datelike;
use fisco_core::{CompanyId, DocumentType, FiscoError, SeriesId};
use fisco_crypto::GENESIS_HASH;
use fisco_state::DocumentHeader;
use serde::{Deserialize, Serialize};

use crate::error::SeriesError;

/// Default ceiling on series numbers.
pub const DEFAULT_MAX_NUMBER: u64 = 999_999_999;

/// Number and previous hash handed out for one certification attempt.
///
/// Allocating does not move the series; the allocation must be committed
/// against an unchanged head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub series_id: SeriesId,
    pub number: u64,
    pub previous_hash: String,
}

/// A numbering series and its chain head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSeries {
    pub id: SeriesId,
    pub document_type: DocumentType,
    pub prefix: String,
    pub year: i32,
    pub company_id: CompanyId,
    pub max_number: u64,
    last_number: u64,
    last_hash: String,
    active: bool,
    halted: Option<String>,
}

impl DocumentSeries {
    /// Empty series `{prefix}/{year}`.
    pub fn new(
        prefix: impl Into<String>,
        document_type: DocumentType,
        year: i32,
        company_id: CompanyId,
    ) -> Result<Self, FiscoError> {
        let prefix = prefix.into();
        let id = SeriesId::new(format!("{prefix}/{year}"))?;
        Ok(Self {
            id,
            document_type,
            prefix,
            year,
            company_id,
            max_number: DEFAULT_MAX_NUMBER,
            last_number: 0,
            last_hash: GENESIS_HASH.to_string(),
            active: true,
            halted: None,
        })
    }

    /// Empty series prefixed with the document type code, e.g. `FT/2025`.
    pub fn for_type(
        document_type: DocumentType,
        year: i32,
        company_id: CompanyId,
    ) -> Result<Self, FiscoError> {
        Self::new(document_type.code(), document_type, year, company_id)
    }

    /// Set the number ceiling.
    pub fn with_max_number(mut self, max_number: u64) -> Self {
        self.max_number = max_number;
        self
    }

    /// Resume from a persisted head.
    pub fn at_head(mut self, last_number: u64, last_hash: impl Into<String>) -> Self {
        self.last_number = last_number;
        self.last_hash = last_hash.into();
        self
    }

    // ─── Head ───────────────────────────────────────────────────────

    pub fn last_number(&self) -> u64 {
        self.last_number
    }

    pub fn last_hash(&self) -> &str {
        &self.last_hash
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Reason the series was halted, if it is.
    pub fn halted(&self) -> Option<&str> {
        self.halted.as_deref()
    }

    /// Printed form of `number` in this series: `{prefix}/{year}/{number}`.
    pub fn display_number(&self, number: u64) -> String {
        format!("{}/{}/{}", self.prefix, self.year, number)
    }

    // ─── Allocation ─────────────────────────────────────────────────

    /// Next number and the hash it must chain to.
    pub fn allocate(&self) -> Result<Allocation, SeriesError> {
        self.ensure_open()?;
        if self.last_number >= self.max_number {
            return Err(SeriesError::SeriesExhausted {
                series_id: self.id.clone(),
                max_number: self.max_number,
            });
        }
        Ok(Allocation {
            series_id: self.id.clone(),
            number: self.last_number + 1,
            previous_hash: self.last_hash.clone(),
        })
    }

    /// Whether `allocation` was taken from the current head of a series
    /// that still accepts certification.
    pub fn check(&self, allocation: &Allocation) -> Result<(), SeriesError> {
        self.ensure_open()?;
        let expected = allocation.number.saturating_sub(1);
        if allocation.series_id != self.id
            || expected != self.last_number
            || allocation.previous_hash != self.last_hash
        {
            return Err(SeriesError::ConcurrentAllocationConflict {
                series_id: self.id.clone(),
                expected,
                actual: self.last_number,
            });
        }
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), SeriesError> {
        if !self.active {
            return Err(SeriesError::SeriesInactive {
                series_id: self.id.clone(),
            });
        }
        if let Some(reason) = &self.halted {
            return Err(SeriesError::SeriesHalted {
                series_id: self.id.clone(),
                reason: reason.clone(),
            });
        }
        Ok(())
    }

    /// Move the head to a committed allocation.
    pub(crate) fn advance(&mut self, allocation: &Allocation, hash: &str) {
        self.last_number = allocation.number;
        self.last_hash = hash.to_string();
    }

    /// Whether a document with `header` may be numbered here.
    pub fn admits(&self, header: &DocumentHeader) -> Result<(), SeriesError> {
        if header.doc_type != self.document_type {
            return Err(SeriesError::TypeMismatch {
                series_id: self.id.clone(),
                series_type: self.document_type,
                document_type: header.doc_type,
            });
        }
        if header.company_id != self.company_id {
            return Err(SeriesError::CompanyMismatch {
                series_id: self.id.clone(),
                series_company: self.company_id,
                document_company: header.company_id,
            });
        }
        let year = header.issue_date.year();
        if year != self.year {
            return Err(SeriesError::YearMismatch {
                series_id: self.id.clone(),
                series_year: self.year,
                year,
            });
        }
        Ok(())
    }

    // ─── Lifecycle ──────────────────────────────────────────────────

    /// Empty successor series for `year`, same prefix, type and company.
    pub fn next_year(&self, year: i32) -> Result<Self, SeriesError> {
        if year <= self.year {
            return Err(SeriesError::YearMismatch {
                series_id: self.id.clone(),
                series_year: self.year,
                year,
            });
        }
        let next = Self::new(self.prefix.clone(), self.document_type, year, self.company_id)
            .map_err(|_| SeriesError::YearMismatch {
                series_id: self.id.clone(),
                series_year: self.year,
                year,
            })?;
        Ok(next.with_max_number(self.max_number))
    }

    pub(crate) fn deactivate(&mut self) {
        self.active = false;
    }

    pub(crate) fn halt(&mut self, reason: &str) {
        self.halted = Some(reason.to_string());
    }

    pub(crate) fn resume(&mut self) {
        self.halted = None;
    }
}
