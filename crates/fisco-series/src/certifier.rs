//! # Certification Unit
//!
//! Certifying a draft prices it with the current rates, takes the next
//! number and the previous hash from its series, computes the fingerprint,
//! freezes the document and advances the series. These steps succeed
//! together or leave both the document and the series as they were.
//!
//! ## Concurrency
//!
//! The document stays under its book entry lock for the whole unit. The
//! series is locked only to allocate and to commit; the fingerprint is
//! computed in between. A commit that finds the series head moved fails
//! with a conflict and the unit retries, up to
//! [`MAX_ALLOCATION_RETRIES`] times. After that the unit runs once more
//! with the series locked from allocation to commit, which cannot
//! conflict.
//!
//! Lock order is always document entry, then series.

use std::sync::Arc;

use fisco_core::{DocumentId, LineItem, SeriesId, Timestamp, Totals};
use fisco_crypto::compute_hash;
use fisco_state::{Certification, DocumentHeader, DocumentStatus, FiscalDocument, LifecycleError};
use fisco_tax::{FiscalConfiguration, TaxComputation};
use serde::{Deserialize, Serialize};

use crate::book::DocumentBook;
use crate::error::{CertificationError, SeriesError};
use crate::registry::SeriesRegistry;
use crate::series::Allocation;

/// Optimistic attempts before the unit falls back to holding the series
/// lock throughout.
pub const MAX_ALLOCATION_RETRIES: u32 = 3;

/// Result of a committed certification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertifiedDocument {
    pub document_id: DocumentId,
    pub series_id: SeriesId,
    pub number: u64,
    pub display_number: String,
    pub hash: String,
    pub previous_hash: String,
    pub totals: Totals,
    /// Commit attempts used, the locked fallback included.
    pub attempts: u32,
}

/// Drives certification against a series registry and a document book.
#[derive(Debug, Clone)]
pub struct Certifier {
    config: Arc<FiscalConfiguration>,
    registry: Arc<SeriesRegistry>,
    book: Arc<DocumentBook>,
}

impl Certifier {
    pub fn new(
        config: Arc<FiscalConfiguration>,
        registry: Arc<SeriesRegistry>,
        book: Arc<DocumentBook>,
    ) -> Self {
        Self {
            config,
            registry,
            book,
        }
    }

    pub fn config(&self) -> &FiscalConfiguration {
        &self.config
    }

    pub fn registry(&self) -> &SeriesRegistry {
        &self.registry
    }

    pub fn book(&self) -> &DocumentBook {
        &self.book
    }

    // ─── Drafting ───────────────────────────────────────────────────

    /// Compute totals for a new draft and store it.
    pub fn draft(
        &self,
        header: DocumentHeader,
        lines: Vec<LineItem>,
    ) -> Result<DocumentId, CertificationError> {
        let doc = FiscalDocument::draft(header, lines, &self.config).map_err(lift_tax)?;
        let id = doc.id();
        self.book.insert(doc)?;
        Ok(id)
    }

    /// Store a draft derived from the stored document `origin_id`.
    pub fn draft_derived(
        &self,
        origin_id: &DocumentId,
        header: DocumentHeader,
        lines: Vec<LineItem>,
    ) -> Result<DocumentId, CertificationError> {
        let origin = self.book.get(origin_id).ok_or(SeriesError::DocumentNotFound {
            document_id: *origin_id,
        })?;
        let doc = FiscalDocument::derive_from(&origin, header, lines, &self.config).map_err(lift_tax)?;
        let id = doc.id();
        self.book.insert(doc)?;
        Ok(id)
    }

    /// Draft and certify in one call. A draft that fails certification
    /// stays in the book as a draft.
    pub fn issue(
        &self,
        header: DocumentHeader,
        lines: Vec<LineItem>,
    ) -> Result<CertifiedDocument, CertificationError> {
        let id = self.draft(header, lines)?;
        self.certify(&id)
    }

    // ─── Certification ──────────────────────────────────────────────

    /// Certify the stored draft `id`.
    pub fn certify(&self, id: &DocumentId) -> Result<CertifiedDocument, CertificationError> {
        self.book.update(id, |doc| self.certify_in_place(doc, |_| {}))
    }

    /// `before_commit` runs after each optimistic allocation is sealed,
    /// with the attempt number.
    fn certify_in_place(
        &self,
        doc: &mut FiscalDocument,
        mut before_commit: impl FnMut(u32),
    ) -> Result<CertifiedDocument, CertificationError> {
        if doc.status() != DocumentStatus::Draft {
            return Err(LifecycleError::IllegalTransition {
                document_id: doc.id(),
                from: doc.status(),
                to: DocumentStatus::Certified,
            }
            .into());
        }
        let series_id = doc.series_id().clone();
        self.registry.get(&series_id)?.admits(doc.header())?;
        let priced = doc.price(&self.config).map_err(lift_tax)?;

        for attempt in 1..=MAX_ALLOCATION_RETRIES {
            let allocation = self.registry.allocate_next(&series_id)?;
            let certification = seal(doc, &priced, &allocation)?;
            before_commit(attempt);
            let committed = self.registry.commit_with(&allocation, &certification.hash, || {
                doc.apply_certification(priced.totals.clone(), certification.clone())
                    .map_err(CertificationError::from)
            });
            match committed {
                Ok(()) => return Ok(self.committed(doc, &certification, attempt)),
                Err(e) if e.is_transient() => {
                    tracing::warn!(
                        series_id = %series_id,
                        document_id = %doc.id(),
                        attempt,
                        error = %e,
                        "allocation conflict, retrying"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        let certification = self.registry.with_locked(&series_id, |series| {
            let allocation = series.allocate()?;
            let certification = seal(doc, &priced, &allocation)?;
            series.check(&allocation)?;
            doc.apply_certification(priced.totals.clone(), certification.clone())?;
            series.advance(&allocation, &certification.hash);
            Ok::<_, CertificationError>(certification)
        })?;
        Ok(self.committed(doc, &certification, MAX_ALLOCATION_RETRIES + 1))
    }

    fn committed(
        &self,
        doc: &FiscalDocument,
        certification: &Certification,
        attempts: u32,
    ) -> CertifiedDocument {
        let display_number = self
            .registry
            .get(doc.series_id())
            .map(|s| s.display_number(certification.number))
            .unwrap_or_else(|_| format!("{}/{}", doc.series_id(), certification.number));
        tracing::info!(
            series_id = %doc.series_id(),
            number = certification.number,
            document_id = %doc.id(),
            attempts,
            "document certified"
        );
        CertifiedDocument {
            document_id: doc.id(),
            series_id: doc.series_id().clone(),
            number: certification.number,
            display_number,
            hash: certification.hash.clone(),
            previous_hash: certification.previous_hash.clone(),
            totals: doc.totals().clone(),
            attempts,
        }
    }

    // ─── Lifecycle ──────────────────────────────────────────────────

    /// Cancel a stored document against the configured closed period.
    pub fn cancel(&self, id: &DocumentId, reason: &str) -> Result<(), CertificationError> {
        self.book.cancel(id, reason, self.config.closed_through)
    }
}

/// Fingerprint `doc`, priced as `priced`, under `allocation`.
fn seal(
    doc: &FiscalDocument,
    priced: &TaxComputation,
    allocation: &Allocation,
) -> Result<Certification, CertificationError> {
    let input = doc.hash_input_with(&priced.totals, allocation.number, &allocation.previous_hash);
    let hash = compute_hash(&input)?;
    Ok(Certification {
        number: allocation.number,
        hash,
        previous_hash: allocation.previous_hash.clone(),
        certified_at: Timestamp::now(),
        tax_lines: priced.by_rate.clone(),
    })
}

/// Report tax failures as tax errors rather than lifecycle errors.
fn lift_tax(err: LifecycleError) -> CertificationError {
    match err {
        LifecycleError::Tax(tax) => CertificationError::Tax(tax),
        other => CertificationError::Lifecycle(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::audit_series;
    use crate::series::DocumentSeries;
    use chrono::NaiveDate;
    use fisco_core::{CompanyId, Decimal, DocumentType, Nif, PartySnapshot, TaxRateCode};
    use fisco_crypto::GENESIS_HASH;
    use fisco_tax::TaxError;

    struct Fixture {
        certifier: Certifier,
        company: CompanyId,
        series: SeriesId,
    }

    fn fixture() -> Fixture {
        let config = FiscalConfiguration::angola_default(Nif::new("5417000001").unwrap(), "Exemplo Lda");
        let registry = SeriesRegistry::new();
        let company = CompanyId::new();
        let series = DocumentSeries::for_type(DocumentType::Invoice, 2025, company).unwrap();
        let id = series.id.clone();
        registry.open(series).unwrap();
        Fixture {
            certifier: Certifier::new(Arc::new(config), Arc::new(registry), Arc::new(DocumentBook::new())),
            company,
            series: id,
        }
    }

    fn header(f: &Fixture) -> DocumentHeader {
        DocumentHeader::new(
            DocumentType::Invoice,
            f.series.clone(),
            f.company,
            NaiveDate::from_ymd_opt(2025, 3, 15).unwrap(),
            PartySnapshot::new(None, "Cliente", Nif::new("5000000001").unwrap()),
        )
    }

    fn line(code: &str) -> LineItem {
        LineItem::new("Serviço", Decimal::ONE, Decimal::from(1000), TaxRateCode::new(code).unwrap())
    }

    #[test]
    fn test_first_certification_chains_to_genesis() {
        let f = fixture();
        let out = f.certifier.issue(header(&f), vec![line("NOR")]).unwrap();
        assert_eq!(out.number, 1);
        assert_eq!(out.display_number, "FT/2025/1");
        assert_eq!(out.previous_hash, GENESIS_HASH);
        assert_eq!(out.attempts, 1);
        let series = f.certifier.registry().get(&f.series).unwrap();
        assert_eq!(series.last_number(), 1);
        assert_eq!(series.last_hash(), out.hash);
    }

    #[test]
    fn test_certify_twice_is_illegal() {
        let f = fixture();
        let out = f.certifier.issue(header(&f), vec![line("NOR")]).unwrap();
        assert!(matches!(
            f.certifier.certify(&out.document_id),
            Err(CertificationError::Lifecycle(LifecycleError::IllegalTransition { .. }))
        ));
        assert_eq!(f.certifier.registry().get(&f.series).unwrap().last_number(), 1);
    }

    #[test]
    fn test_invalid_rate_rejected_before_mutation() {
        let f = fixture();
        let result = f.certifier.issue(header(&f), vec![line("XYZ")]);
        assert!(matches!(result, Err(CertificationError::Tax(TaxError::InvalidRate { .. }))));
        assert!(f.certifier.book().is_empty());
        assert_eq!(f.certifier.registry().get(&f.series).unwrap().last_number(), 0);
    }

    #[test]
    fn test_wrong_year_leaves_draft_and_series_untouched() {
        let f = fixture();
        let mut h = header(&f);
        h.issue_date = NaiveDate::from_ymd_opt(2026, 1, 2).unwrap();
        let id = f.certifier.draft(h, vec![line("NOR")]).unwrap();
        assert!(matches!(
            f.certifier.certify(&id),
            Err(CertificationError::Series(SeriesError::YearMismatch { .. }))
        ));
        assert_eq!(f.certifier.book().get(&id).unwrap().status(), DocumentStatus::Draft);
        assert_eq!(f.certifier.registry().get(&f.series).unwrap().last_number(), 0);
    }

    #[test]
    fn test_halted_series_refuses_certification() {
        let f = fixture();
        f.certifier.registry().halt(&f.series, "audit").unwrap();
        let result = f.certifier.issue(header(&f), vec![line("NOR")]);
        assert!(matches!(
            result,
            Err(CertificationError::Series(SeriesError::SeriesHalted { .. }))
        ));
    }

    #[test]
    fn test_lift_tax_unwraps_tax_errors() {
        let err = lift_tax(LifecycleError::Tax(TaxError::EmptyDocument));
        assert!(matches!(err, CertificationError::Tax(TaxError::EmptyDocument)));
    }

    /// Certify a standalone document straight against the registry, as a
    /// concurrent writer would.
    fn certify_elsewhere(f: &Fixture) -> FiscalDocument {
        let c = &f.certifier;
        let mut doc = FiscalDocument::draft(header(f), vec![line("RED")], c.config()).unwrap();
        let priced = doc.price(c.config()).unwrap();
        let allocation = c.registry().allocate_next(&f.series).unwrap();
        let certification = seal(&doc, &priced, &allocation).unwrap();
        c.registry().commit(&allocation, &certification.hash).unwrap();
        doc.apply_certification(priced.totals, certification).unwrap();
        doc
    }

    fn certify_contended(f: &Fixture, contended_attempts: u32) -> (CertifiedDocument, Vec<FiscalDocument>) {
        let id = f.certifier.draft(header(f), vec![line("NOR")]).unwrap();
        let mut rivals = Vec::new();
        let out = f
            .certifier
            .book()
            .update(&id, |doc| {
                f.certifier.certify_in_place(doc, |attempt| {
                    if attempt <= contended_attempts {
                        rivals.push(certify_elsewhere(f));
                    }
                })
            })
            .unwrap();
        (out, rivals)
    }

    #[test]
    fn test_conflict_is_retried_on_the_new_head() {
        let f = fixture();
        let (out, rivals) = certify_contended(&f, 1);
        assert_eq!(out.attempts, 2);
        assert_eq!(out.number, 2);
        assert_eq!(out.previous_hash, rivals[0].hash().unwrap());

        for rival in rivals {
            f.certifier.book().insert(rival).unwrap();
        }
        let report = audit_series(f.certifier.registry(), f.certifier.book(), &f.series).unwrap();
        assert_eq!(report.verified, 2);
        assert_eq!(report.last_hash, out.hash);
    }

    #[test]
    fn test_persistent_conflict_falls_back_to_locked_commit() {
        let f = fixture();
        let (out, rivals) = certify_contended(&f, MAX_ALLOCATION_RETRIES);
        assert_eq!(out.attempts, MAX_ALLOCATION_RETRIES + 1);
        assert_eq!(rivals.len() as u32, MAX_ALLOCATION_RETRIES);
        assert_eq!(out.number, u64::from(MAX_ALLOCATION_RETRIES) + 1);

        for rival in rivals {
            f.certifier.book().insert(rival).unwrap();
        }
        let report = audit_series(f.certifier.registry(), f.certifier.book(), &f.series).unwrap();
        assert_eq!(report.verified, MAX_ALLOCATION_RETRIES as usize + 1);
        assert_eq!(report.last_number, Some(out.number));
        assert_eq!(f.certifier.registry().get(&f.series).unwrap().last_hash(), out.hash);
    }

    #[test]
    fn test_refused_allocation_leaves_draft_totals_alone() {
        let f = fixture();
        let id = f.certifier.draft(header(&f), vec![line("NOR")]).unwrap();
        let mut raised = f.certifier.config().clone();
        raised.rates.insert(TaxRateCode::new("NOR").unwrap(), Decimal::new(2, 1));
        let repriced = Certifier::new(
            Arc::new(raised),
            f.certifier.registry.clone(),
            f.certifier.book.clone(),
        );
        f.certifier.registry().halt(&f.series, "audit").unwrap();

        assert!(matches!(
            repriced.certify(&id),
            Err(CertificationError::Series(SeriesError::SeriesHalted { .. }))
        ));
        let draft = f.certifier.book().get(&id).unwrap();
        assert_eq!(draft.status(), DocumentStatus::Draft);
        assert_eq!(draft.totals().total, Decimal::from(1140));
    }

    #[test]
    fn test_certification_records_rate_breakdown() {
        let f = fixture();
        let out = f.certifier.issue(header(&f), vec![line("NOR"), line("RED")]).unwrap();
        let doc = f.certifier.book().get(&out.document_id).unwrap();
        let lines = &doc.certification().unwrap().tax_lines;
        assert_eq!(lines.len(), 2);
        let nor = lines.iter().find(|l| l.tax_rate_code.as_str() == "NOR").unwrap();
        assert_eq!(nor.rate, Decimal::new(14, 2));
        assert_eq!(nor.tax, Decimal::from(140));
    }
}
