//! # fisco-report: Fiscal Projections
//!
//! Read-only views over certified documents:
//!
//! - **Withholding** (`withholding.rs`): monthly sales and purchase maps.
//! - **VAT** (`vat.rs`): output VAT, deductible input VAT and the net.
//! - **Audit file** (`saft.rs`): one [`AuditRecord`] per certified document.
//!
//! Nothing here mutates a document. Drafts never appear in a report, and
//! cancelled documents appear only in the audit file.

pub mod saft;
pub mod vat;
pub mod withholding;

use fisco_core::FiscalPeriod;
use fisco_state::{DocumentStatus, FiscalDocument};

pub use saft::{audit_record, audit_records, AuditRecord, AuditStatus, AuditTaxLine, ReportError};
pub use vat::{vat_summary, VatSide, VatSummary};
pub use withholding::{
    aggregate, purchase_withholding, sales_withholding, PurchaseWithholdingMap,
    PurchaseWithholdingRow, PurchaseWithholdingTotals, SalesWithholdingMap, SalesWithholdingRow,
    SalesWithholdingTotals, WithholdingReport,
};

/// Certified, not cancelled, issued in `period`.
pub(crate) fn reportable(doc: &FiscalDocument, period: FiscalPeriod) -> bool {
    doc.is_certified()
        && doc.status() != DocumentStatus::Cancelled
        && period.contains(doc.header().issue_date)
}

/// `{series}/{number}`, e.g. `FT/2025/12`; the series id alone for drafts.
pub(crate) fn display_number(doc: &FiscalDocument) -> String {
    match doc.number() {
        Some(number) => format!("{}/{}", doc.series_id(), number),
        None => doc.series_id().to_string(),
    }
}
