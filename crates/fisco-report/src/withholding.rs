//! # Withholding Maps
//!
//! Monthly withholding declarations, one per side of the books.
//!
//! A document enters a map when it is certified, not cancelled, carries a
//! non-zero withholding amount and was issued inside the period.
//!
//! - **Sales** ("a receber"): tax withheld by clients on our invoices.
//!   Credit notes go to their own column and reduce the net.
//! - **Purchases** ("a pagar"): tax we withheld from suppliers. Every
//!   qualifying document counts positively.
//!
//! Both maps are pure projections of the documents passed in.

use chrono::NaiveDate;
use fisco_core::{Decimal, DocumentEffect, DocumentId, DocumentSide, FiscalPeriod};
use fisco_state::FiscalDocument;
use serde::{Deserialize, Serialize};

use crate::{display_number, reportable};

// ─── Sales ──────────────────────────────────────────────────────────

/// One document in the sales withholding map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesWithholdingRow {
    pub document_id: DocumentId,
    pub client_name: String,
    pub client_nif: String,
    pub issue_date: NaiveDate,
    pub number: String,
    pub doc_type: String,
    pub rate: Decimal,
    pub base: Decimal,
    /// Withholding reversed by a credit note.
    pub credit_note: Decimal,
    /// Withholding receivable on a charge document.
    pub receivable: Decimal,
}

/// Column totals of the sales map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesWithholdingTotals {
    pub base: Decimal,
    pub credit_notes: Decimal,
    pub receivable: Decimal,
    /// `receivable - credit_notes`.
    pub net: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesWithholdingMap {
    pub period: FiscalPeriod,
    pub rows: Vec<SalesWithholdingRow>,
    pub totals: SalesWithholdingTotals,
}

/// Sales withholding map for `period` at the configured `rate`.
pub fn sales_withholding(
    documents: &[FiscalDocument],
    period: FiscalPeriod,
    rate: Decimal,
) -> SalesWithholdingMap {
    let mut rows: Vec<_> = documents
        .iter()
        .filter(|doc| doc.side() == DocumentSide::Sales && qualifies(doc, period))
        .map(|doc| {
            let withholding = doc.totals().withholding_amount;
            let (credit_note, receivable) = match doc.effect() {
                DocumentEffect::Reversal => (withholding, Decimal::ZERO),
                DocumentEffect::Charge => (Decimal::ZERO, withholding),
            };
            SalesWithholdingRow {
                document_id: doc.id(),
                client_name: doc.header().party.name.clone(),
                client_nif: doc.header().party.nif.to_string(),
                issue_date: doc.header().issue_date,
                number: display_number(doc),
                doc_type: doc.doc_type().code().to_string(),
                rate,
                base: doc.totals().subtotal,
                credit_note,
                receivable,
            }
        })
        .collect();
    rows.sort_by(|a, b| (a.issue_date, &a.number).cmp(&(b.issue_date, &b.number)));

    let mut totals = SalesWithholdingTotals::default();
    for row in &rows {
        totals.base += row.base;
        totals.credit_notes += row.credit_note;
        totals.receivable += row.receivable;
    }
    totals.net = totals.receivable - totals.credit_notes;

    SalesWithholdingMap {
        period,
        rows,
        totals,
    }
}

// ─── Purchases ──────────────────────────────────────────────────────

/// One document in the purchase withholding map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseWithholdingRow {
    pub document_id: DocumentId,
    pub supplier_nif: String,
    pub supplier_name: String,
    pub number: String,
    pub issue_date: NaiveDate,
    /// Date of the latest payment, if any.
    pub payment_date: Option<NaiveDate>,
    pub total: Decimal,
    pub amount_paid: Decimal,
    /// Tax-exclusive value subject to withholding.
    pub subject_value: Decimal,
    pub rate: Decimal,
    pub withheld: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseWithholdingTotals {
    pub total: Decimal,
    pub amount_paid: Decimal,
    pub subject_value: Decimal,
    pub withheld: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseWithholdingMap {
    pub period: FiscalPeriod,
    pub rows: Vec<PurchaseWithholdingRow>,
    pub totals: PurchaseWithholdingTotals,
}

/// Purchase withholding map for `period` at the configured `rate`.
pub fn purchase_withholding(
    documents: &[FiscalDocument],
    period: FiscalPeriod,
    rate: Decimal,
) -> PurchaseWithholdingMap {
    let mut rows: Vec<_> = documents
        .iter()
        .filter(|doc| doc.side() == DocumentSide::Purchases && qualifies(doc, period))
        .map(|doc| PurchaseWithholdingRow {
            document_id: doc.id(),
            supplier_nif: doc.header().party.nif.to_string(),
            supplier_name: doc.header().party.name.clone(),
            number: display_number(doc),
            issue_date: doc.header().issue_date,
            payment_date: doc.payments().iter().map(|p| p.date).max(),
            total: doc.totals().total,
            amount_paid: doc.amount_paid(),
            subject_value: doc.totals().subtotal,
            rate,
            withheld: doc.totals().withholding_amount,
        })
        .collect();
    rows.sort_by(|a, b| (a.issue_date, &a.number).cmp(&(b.issue_date, &b.number)));

    let mut totals = PurchaseWithholdingTotals::default();
    for row in &rows {
        totals.total += row.total;
        totals.amount_paid += row.amount_paid;
        totals.subject_value += row.subject_value;
        totals.withheld += row.withheld;
    }

    PurchaseWithholdingMap {
        period,
        rows,
        totals,
    }
}

// ─── Both Sides ─────────────────────────────────────────────────────

/// Both withholding maps for one month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithholdingReport {
    pub sales: SalesWithholdingMap,
    pub purchases: PurchaseWithholdingMap,
}

/// Aggregate withholding for `period` on both sides.
pub fn aggregate(documents: &[FiscalDocument], period: FiscalPeriod, rate: Decimal) -> WithholdingReport {
    let report = WithholdingReport {
        sales: sales_withholding(documents, period, rate),
        purchases: purchase_withholding(documents, period, rate),
    };
    tracing::debug!(
        %period,
        sales_rows = report.sales.rows.len(),
        purchase_rows = report.purchases.rows.len(),
        "withholding aggregated"
    );
    report
}

fn qualifies(doc: &FiscalDocument, period: FiscalPeriod) -> bool {
    reportable(doc, period) && !doc.totals().withholding_amount.is_zero()
}
