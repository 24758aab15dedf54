//! # Document Book
//!
//! In-memory store of fiscal documents backed by `DashMap`.
//!
//! Every change to a document runs through [`DocumentBook::update`], which
//! holds the entry's write lock for the whole read-validate-update. Two
//! payments on one document therefore never interleave, while documents
//! in other shards proceed in parallel.

use chrono::NaiveDate;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use fisco_core::{Decimal, DocumentId, FiscalPeriod, SeriesId};
use fisco_crypto::ChainEntry;
use fisco_state::{DocumentStatus, FiscalDocument};

use crate::error::{CertificationError, SeriesError};

/// Documents by id.
pub struct DocumentBook {
    documents: DashMap<DocumentId, FiscalDocument>,
}

impl DocumentBook {
    /// Create an empty book.
    pub fn new() -> Self {
        Self {
            documents: DashMap::new(),
        }
    }

    /// Add a document. Also used to hydrate persisted rows.
    pub fn insert(&self, document: FiscalDocument) -> Result<(), SeriesError> {
        match self.documents.entry(document.id()) {
            Entry::Occupied(_) => Err(SeriesError::DuplicateDocument {
                document_id: document.id(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(document);
                Ok(())
            }
        }
    }

    pub fn get(&self, id: &DocumentId) -> Option<FiscalDocument> {
        self.documents.get(id).map(|r| r.value().clone())
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Run `f` on a document under its entry lock.
    ///
    /// `f` must leave the document untouched when it fails; every
    /// [`FiscalDocument`] mutator does.
    pub fn update<T, E>(
        &self,
        id: &DocumentId,
        f: impl FnOnce(&mut FiscalDocument) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<SeriesError>,
    {
        let mut entry = self
            .documents
            .get_mut(id)
            .ok_or(SeriesError::DocumentNotFound { document_id: *id })?;
        f(entry.value_mut())
    }

    // ─── Lifecycle ──────────────────────────────────────────────────

    /// Register a payment; returns the resulting status.
    pub fn register_payment(
        &self,
        id: &DocumentId,
        amount: Decimal,
        date: NaiveDate,
    ) -> Result<DocumentStatus, CertificationError> {
        self.update(id, |doc| Ok(doc.register_payment(amount, date)?))
    }

    /// Cancel a document, refusing periods up to `closed_through`.
    pub fn cancel(
        &self,
        id: &DocumentId,
        reason: &str,
        closed_through: Option<FiscalPeriod>,
    ) -> Result<(), CertificationError> {
        self.update(id, |doc| Ok(doc.cancel(reason, closed_through)?))
    }

    /// Discard a draft.
    pub fn discard(&self, id: &DocumentId, reason: &str) -> Result<(), CertificationError> {
        self.update(id, |doc| Ok(doc.discard(reason)?))
    }

    // ─── Queries ────────────────────────────────────────────────────

    /// All documents, certified first in series and number order, then
    /// uncertified ones by id.
    pub fn list(&self) -> Vec<FiscalDocument> {
        let mut all: Vec<_> = self.documents.iter().map(|r| r.value().clone()).collect();
        all.sort_by(|a, b| {
            (a.number().is_none(), a.series_id(), a.number(), a.id().as_uuid())
                .cmp(&(b.number().is_none(), b.series_id(), b.number(), b.id().as_uuid()))
        });
        all
    }

    /// Certified documents of `series_id` in number order, cancelled ones
    /// included.
    pub fn in_series(&self, series_id: &SeriesId) -> Vec<FiscalDocument> {
        let mut docs: Vec<_> = self
            .documents
            .iter()
            .filter(|r| r.value().series_id() == series_id && r.value().is_certified())
            .map(|r| r.value().clone())
            .collect();
        docs.sort_by_key(|d| d.number());
        docs
    }

    /// Chain entries of `series_id` in number order.
    pub fn chain_entries(&self, series_id: &SeriesId) -> Vec<ChainEntry> {
        self.in_series(series_id)
            .iter()
            .filter_map(FiscalDocument::chain_entry)
            .collect()
    }
}

impl Default for DocumentBook {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DocumentBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentBook")
            .field("documents_count", &self.documents.len())
            .finish()
    }
}
