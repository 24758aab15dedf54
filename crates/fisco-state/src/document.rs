//! # Fiscal Document Aggregate
//!
//! `FiscalDocument` owns a document's header, lines, computed totals, status
//! and certification. Fields are private; every change goes through a
//! method that checks the lifecycle table first and appends to the
//! transition log.
//!
//! ## Frozen Fields
//!
//! While the document is a Draft, editing lines, discount, party or dates
//! recomputes the totals through the tax engine. From certification on,
//! number, totals and hash are fixed; only status, payments and the
//! cancellation reason change.
//!
//! ## Derived Documents
//!
//! A credit or debit note names its origin and carries the effect of its
//! type. Origins must be certified and on the same side of the books, so
//! derivation always points at an older, frozen document and never forms a
//! cycle.

use chrono::NaiveDate;
use fisco_core::{
    CompanyId, Currency, Decimal, DocumentEffect, DocumentId, DocumentSide, DocumentType,
    FiscalPeriod, LineItem, PartySnapshot, SeriesId, Timestamp, Totals,
};
use fisco_crypto::{ChainEntry, HashInput};
use fisco_tax::{compute_totals, FiscalConfiguration, RateSummary, TaxComputation};
use serde::{Deserialize, Serialize};

use crate::lifecycle::{DocumentStatus, LifecycleError, TransitionRecord};

/// Descriptive fields of a document, set at drafting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentHeader {
    pub id: DocumentId,
    pub doc_type: DocumentType,
    pub series_id: SeriesId,
    pub company_id: CompanyId,
    pub issue_date: NaiveDate,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub accounting_date: Option<NaiveDate>,
    pub party: PartySnapshot,
    #[serde(default)]
    pub currency: Currency,
    #[serde(default = "one")]
    pub exchange_rate: Decimal,
    #[serde(default)]
    pub global_discount: Decimal,
}

fn one() -> Decimal {
    Decimal::ONE
}

impl DocumentHeader {
    /// Header with a fresh id, kwanza currency and no discount.
    pub fn new(
        doc_type: DocumentType,
        series_id: SeriesId,
        company_id: CompanyId,
        issue_date: NaiveDate,
        party: PartySnapshot,
    ) -> Self {
        Self {
            id: DocumentId::new(),
            doc_type,
            series_id,
            company_id,
            issue_date,
            due_date: None,
            accounting_date: None,
            party,
            currency: Currency::aoa(),
            exchange_rate: Decimal::ONE,
            global_discount: Decimal::ZERO,
        }
    }
}

/// What certification fixed on the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certification {
    pub number: u64,
    pub hash: String,
    pub previous_hash: String,
    pub certified_at: Timestamp,
    /// Base and tax per rate code as priced at certification.
    #[serde(default)]
    pub tax_lines: Vec<RateSummary>,
}

/// A registered payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub amount: Decimal,
    pub date: NaiveDate,
}

/// Parent reference of a derived document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Derivation {
    pub origin_id: DocumentId,
    pub effect: DocumentEffect,
}

/// A tax-relevant document and its lifecycle.
#[derive(Debug, Clone, Serialize)]
pub struct FiscalDocument {
    header: DocumentHeader,
    lines: Vec<LineItem>,
    totals: Totals,
    status: DocumentStatus,
    certification: Option<Certification>,
    payments: Vec<Payment>,
    derived_from: Option<Derivation>,
    cancellation_reason: Option<String>,
    transitions: Vec<TransitionRecord>,
}

/// Everything needed to rebuild a document loaded from storage. Consistency
/// is checked by the caller.
pub(crate) struct RestoredDocument {
    pub header: DocumentHeader,
    pub lines: Vec<LineItem>,
    pub totals: Totals,
    pub status: DocumentStatus,
    pub certification: Option<Certification>,
    pub payments: Vec<Payment>,
    pub derived_from: Option<Derivation>,
    pub cancellation_reason: Option<String>,
}

impl FiscalDocument {
    /// Create a draft and compute its totals.
    pub fn draft(
        header: DocumentHeader,
        lines: Vec<LineItem>,
        config: &FiscalConfiguration,
    ) -> Result<Self, LifecycleError> {
        let computation = compute(&header, &lines, config)?;
        Ok(Self {
            header,
            lines,
            totals: computation.totals,
            status: DocumentStatus::Draft,
            certification: None,
            payments: Vec::new(),
            derived_from: None,
            cancellation_reason: None,
            transitions: Vec::new(),
        })
    }

    /// Create a draft derived from `origin` (credit note, debit note).
    pub fn derive_from(
        origin: &FiscalDocument,
        header: DocumentHeader,
        lines: Vec<LineItem>,
        config: &FiscalConfiguration,
    ) -> Result<Self, LifecycleError> {
        let invalid = |reason: &str| LifecycleError::InvalidDerivation {
            document_id: header.id,
            origin_id: origin.id(),
            reason: reason.to_string(),
        };
        if origin.id() == header.id {
            return Err(invalid("a document cannot derive from itself"));
        }
        if !origin.is_certified() || origin.status() == DocumentStatus::Cancelled {
            return Err(invalid("origin must be certified and not cancelled"));
        }
        if origin.doc_type().side() != header.doc_type.side() {
            return Err(invalid("origin is on the other side of the books"));
        }
        if origin.doc_type() == DocumentType::CreditNote {
            return Err(invalid("credit notes cannot be derived from"));
        }
        let derivation = Derivation {
            origin_id: origin.id(),
            effect: header.doc_type.effect(),
        };
        let mut doc = Self::draft(header, lines, config)?;
        doc.derived_from = Some(derivation);
        Ok(doc)
    }

    pub(crate) fn restore(parts: RestoredDocument) -> Self {
        Self {
            header: parts.header,
            lines: parts.lines,
            totals: parts.totals,
            status: parts.status,
            certification: parts.certification,
            payments: parts.payments,
            derived_from: parts.derived_from,
            cancellation_reason: parts.cancellation_reason,
            transitions: Vec::new(),
        }
    }

    // ─── Accessors ──────────────────────────────────────────────────

    pub fn id(&self) -> DocumentId {
        self.header.id
    }

    pub fn doc_type(&self) -> DocumentType {
        self.header.doc_type
    }

    pub fn series_id(&self) -> &SeriesId {
        &self.header.series_id
    }

    pub fn header(&self) -> &DocumentHeader {
        &self.header
    }

    pub fn lines(&self) -> &[LineItem] {
        &self.lines
    }

    pub fn totals(&self) -> &Totals {
        &self.totals
    }

    pub fn status(&self) -> DocumentStatus {
        self.status
    }

    pub fn certification(&self) -> Option<&Certification> {
        self.certification.as_ref()
    }

    /// Sequence number, set once certified.
    pub fn number(&self) -> Option<u64> {
        self.certification.as_ref().map(|c| c.number)
    }

    /// Certification hash, set once certified.
    pub fn hash(&self) -> Option<&str> {
        self.certification.as_ref().map(|c| c.hash.as_str())
    }

    pub fn payments(&self) -> &[Payment] {
        &self.payments
    }

    pub fn derived_from(&self) -> Option<&Derivation> {
        self.derived_from.as_ref()
    }

    pub fn cancellation_reason(&self) -> Option<&str> {
        self.cancellation_reason.as_deref()
    }

    /// Ordered log of status changes made through this value.
    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    /// True once the document holds a number and hash, including after
    /// cancellation of a certified document.
    pub fn is_certified(&self) -> bool {
        self.certification.is_some()
    }

    /// Fiscal period of the issue date.
    pub fn period(&self) -> FiscalPeriod {
        FiscalPeriod::of(self.header.issue_date)
    }

    pub fn side(&self) -> DocumentSide {
        self.header.doc_type.side()
    }

    /// Sign applied when aggregating this document with others.
    pub fn effect(&self) -> DocumentEffect {
        self.header.doc_type.effect()
    }

    /// Sum of registered payments.
    pub fn amount_paid(&self) -> Decimal {
        self.payments.iter().map(|p| p.amount).sum()
    }

    /// Total still owed.
    pub fn outstanding(&self) -> Decimal {
        self.totals.total - self.amount_paid()
    }

    // ─── Draft Editing ──────────────────────────────────────────────

    /// Replace the lines and recompute totals.
    pub fn set_lines(
        &mut self,
        lines: Vec<LineItem>,
        config: &FiscalConfiguration,
    ) -> Result<(), LifecycleError> {
        self.require_editable()?;
        let computation = compute(&self.header, &lines, config)?;
        self.lines = lines;
        self.totals = computation.totals;
        Ok(())
    }

    /// Change the document-level discount and recompute totals.
    pub fn set_global_discount(
        &mut self,
        discount: Decimal,
        config: &FiscalConfiguration,
    ) -> Result<(), LifecycleError> {
        self.require_editable()?;
        let mut header = self.header.clone();
        header.global_discount = discount;
        let computation = compute(&header, &self.lines, config)?;
        self.header = header;
        self.totals = computation.totals;
        Ok(())
    }

    /// Change the counterparty snapshot.
    pub fn set_party(&mut self, party: PartySnapshot) -> Result<(), LifecycleError> {
        self.require_editable()?;
        self.header.party = party;
        Ok(())
    }

    /// Change the issue date.
    pub fn set_issue_date(&mut self, date: NaiveDate) -> Result<(), LifecycleError> {
        self.require_editable()?;
        self.header.issue_date = date;
        Ok(())
    }

    /// Price the draft with `config` without touching its totals. The
    /// result is applied only by [`apply_certification`](Self::apply_certification).
    pub fn price(&self, config: &FiscalConfiguration) -> Result<TaxComputation, LifecycleError> {
        self.require_editable()?;
        compute(&self.header, &self.lines, config)
    }

    // ─── Certification ──────────────────────────────────────────────

    /// Fingerprint input for this document under `number` and `previous_hash`.
    pub fn hash_input(&self, number: u64, previous_hash: &str) -> HashInput {
        self.hash_input_with(&self.totals, number, previous_hash)
    }

    /// Fingerprint input for this document priced at `totals`.
    pub fn hash_input_with(&self, totals: &Totals, number: u64, previous_hash: &str) -> HashInput {
        HashInput {
            series_id: self.header.series_id.clone(),
            number,
            totals: totals.clone(),
            issue_date: self.header.issue_date,
            party_tax_id: self.header.party.nif.clone(),
            previous_hash: previous_hash.to_string(),
        }
    }

    /// Chain entry for a certified document.
    pub fn chain_entry(&self) -> Option<ChainEntry> {
        let cert = self.certification.as_ref()?;
        Some(ChainEntry {
            document_id: self.header.id,
            input: self.hash_input(cert.number, &cert.previous_hash),
            stored_hash: cert.hash.clone(),
        })
    }

    /// Freeze the document at `totals` under an allocated number and hash.
    /// Nothing changes when the transition is refused.
    pub fn apply_certification(
        &mut self,
        totals: Totals,
        certification: Certification,
    ) -> Result<(), LifecycleError> {
        self.require_transition(DocumentStatus::Certified)?;
        let reason = format!("certified as number {}", certification.number);
        self.totals = totals;
        self.certification = Some(certification);
        self.do_transition(DocumentStatus::Certified, &reason);
        Ok(())
    }

    // ─── Payments ───────────────────────────────────────────────────

    /// Register a payment. Returns the resulting status.
    ///
    /// Cumulative payments must not exceed the total; reaching it exactly
    /// moves the document to Paid. A payment on a Paid document is an
    /// overpayment.
    pub fn register_payment(
        &mut self,
        amount: Decimal,
        date: NaiveDate,
    ) -> Result<DocumentStatus, LifecycleError> {
        if !self.status.accepts_payment() {
            return Err(LifecycleError::IllegalTransition {
                document_id: self.header.id,
                from: self.status,
                to: DocumentStatus::Paid,
            });
        }
        if amount <= Decimal::ZERO {
            return Err(LifecycleError::InvalidPayment {
                document_id: self.header.id,
                amount,
            });
        }
        let outstanding = self.outstanding();
        if amount > outstanding {
            return Err(LifecycleError::Overpayment {
                document_id: self.header.id,
                outstanding,
                attempted: amount,
            });
        }

        let next = if amount == outstanding {
            DocumentStatus::Paid
        } else {
            DocumentStatus::PartiallyPaid
        };
        self.payments.push(Payment { amount, date });
        if next != self.status {
            self.do_transition(next, &format!("payment of {amount} on {date}"));
        }
        tracing::debug!(document_id = %self.header.id, %amount, status = %next, "payment registered");
        Ok(next)
    }

    // ─── Cancellation ───────────────────────────────────────────────

    /// Cancel the document. Certified documents keep number and hash and
    /// may only be cancelled while their fiscal period is open. A draft is
    /// discarded.
    pub fn cancel(
        &mut self,
        reason: &str,
        closed_through: Option<FiscalPeriod>,
    ) -> Result<(), LifecycleError> {
        self.require_transition(DocumentStatus::Cancelled)?;
        if self.is_certified() {
            if let Some(closed) = closed_through {
                if self.period() <= closed {
                    return Err(LifecycleError::PeriodClosed {
                        document_id: self.header.id,
                        issue_date: self.header.issue_date,
                        closed_through: closed,
                    });
                }
            }
        }
        self.cancellation_reason = Some(reason.to_string());
        self.do_transition(DocumentStatus::Cancelled, reason);
        tracing::info!(document_id = %self.header.id, number = ?self.number(), "document cancelled");
        Ok(())
    }

    /// Discard a draft. No number or hash is ever assigned.
    pub fn discard(&mut self, reason: &str) -> Result<(), LifecycleError> {
        if self.status != DocumentStatus::Draft {
            return Err(LifecycleError::IllegalTransition {
                document_id: self.header.id,
                from: self.status,
                to: DocumentStatus::Cancelled,
            });
        }
        self.cancel(reason, None)
    }

    // ─── Internals ──────────────────────────────────────────────────

    fn require_editable(&self) -> Result<(), LifecycleError> {
        if !self.status.is_editable() {
            return Err(LifecycleError::Frozen {
                document_id: self.header.id,
                status: self.status,
            });
        }
        Ok(())
    }

    fn require_transition(&self, to: DocumentStatus) -> Result<(), LifecycleError> {
        if !self.status.can_transition_to(to) {
            return Err(LifecycleError::IllegalTransition {
                document_id: self.header.id,
                from: self.status,
                to,
            });
        }
        Ok(())
    }

    fn do_transition(&mut self, to: DocumentStatus, reason: &str) {
        self.transitions.push(TransitionRecord {
            from_state: self.status,
            to_state: to,
            timestamp: Timestamp::now(),
            reason: reason.to_string(),
        });
        self.status = to;
    }
}

fn compute(
    header: &DocumentHeader,
    lines: &[LineItem],
    config: &FiscalConfiguration,
) -> Result<TaxComputation, LifecycleError> {
    Ok(compute_totals(
        lines,
        header.doc_type,
        header.global_discount,
        config,
    )?)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use fisco_core::{Nif, TaxRateCode};
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Op {
        SetLines(i64),
        Discount(i64),
        Certify(u64),
        Pay(i64),
        Cancel,
        Discard,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1i64..100_000).prop_map(Op::SetLines),
            (0i64..=100).prop_map(Op::Discount),
            (1u64..10).prop_map(Op::Certify),
            (1i64..200_000).prop_map(Op::Pay),
            Just(Op::Cancel),
            Just(Op::Discard),
        ]
    }

    fn config() -> FiscalConfiguration {
        FiscalConfiguration::angola_default(Nif::new("5417000001").unwrap(), "Exemplo Lda")
    }

    fn line(cents: i64) -> LineItem {
        LineItem::new("item", Decimal::ONE, Decimal::new(cents, 2), TaxRateCode::new("NOR").unwrap())
    }

    fn draft() -> FiscalDocument {
        let header = DocumentHeader::new(
            DocumentType::Invoice,
            SeriesId::new("FT/2025").unwrap(),
            CompanyId::new(),
            NaiveDate::from_ymd_opt(2025, 3, 15).unwrap(),
            PartySnapshot::final_consumer(),
        );
        FiscalDocument::draft(header, vec![line(100_000)], &config()).unwrap()
    }

    fn apply(doc: &mut FiscalDocument, op: &Op, c: &FiscalConfiguration) {
        let date = NaiveDate::from_ymd_opt(2025, 3, 20).unwrap();
        let _ = match op {
            Op::SetLines(cents) => doc.set_lines(vec![line(*cents)], c),
            Op::Discount(pct) => doc.set_global_discount(Decimal::new(*pct, 2), c),
            Op::Certify(number) => doc.price(c).and_then(|priced| {
                doc.apply_certification(
                    priced.totals,
                    Certification {
                        number: *number,
                        hash: "a".repeat(64),
                        previous_hash: "0".repeat(64),
                        certified_at: Timestamp::now(),
                        tax_lines: priced.by_rate,
                    },
                )
            }),
            Op::Pay(cents) => doc.register_payment(Decimal::new(*cents, 2), date).map(|_| ()),
            Op::Cancel => doc.cancel("erro", None),
            Op::Discard => doc.discard("erro"),
        };
    }

    proptest! {
        #[test]
        fn settlement_requires_certification(ops in prop::collection::vec(op_strategy(), 1..24)) {
            let c = config();
            let mut doc = draft();
            for op in &ops {
                apply(&mut doc, op, &c);
                if matches!(doc.status(), DocumentStatus::PartiallyPaid | DocumentStatus::Paid) {
                    prop_assert!(doc.is_certified());
                    prop_assert_eq!(doc.transitions()[0].to_state, DocumentStatus::Certified);
                }
                if doc.status() == DocumentStatus::Draft {
                    prop_assert!(doc.payments().is_empty());
                }
            }
        }

        #[test]
        fn totals_are_frozen_from_certification(ops in prop::collection::vec(op_strategy(), 1..24)) {
            let c = config();
            let mut doc = draft();
            let mut frozen: Option<Totals> = None;
            for op in &ops {
                apply(&mut doc, op, &c);
                match &frozen {
                    Some(totals) => {
                        prop_assert_eq!(doc.totals(), totals);
                        prop_assert!(doc.amount_paid() <= totals.total);
                    }
                    None if doc.is_certified() => frozen = Some(doc.totals().clone()),
                    None => {}
                }
            }
        }
    }
}
