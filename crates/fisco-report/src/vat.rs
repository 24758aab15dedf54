//! # Periodic VAT Summary
//!
//! Output VAT comes from sales documents, with credit notes subtracting
//! and debit notes adding. Deductible input VAT comes from purchase
//! documents. The net is output minus input: positive is payable,
//! negative is recoverable.

use fisco_core::{Decimal, DocumentSide, FiscalPeriod};
use fisco_state::FiscalDocument;
use serde::{Deserialize, Serialize};

use crate::reportable;

/// Signed base and tax on one side of the books.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VatSide {
    pub documents: usize,
    pub base: Decimal,
    pub tax: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VatSummary {
    pub period: FiscalPeriod,
    pub output: VatSide,
    pub input: VatSide,
    /// `output.tax - input.tax`.
    pub net: Decimal,
}

impl VatSummary {
    pub fn is_payable(&self) -> bool {
        self.net > Decimal::ZERO
    }
}

/// VAT summary of the certified, non-cancelled documents issued in
/// `period`.
pub fn vat_summary(documents: &[FiscalDocument], period: FiscalPeriod) -> VatSummary {
    let mut output = VatSide::default();
    let mut input = VatSide::default();

    for doc in documents.iter().filter(|doc| reportable(doc, period)) {
        let sign = doc.effect().sign();
        let side = match doc.side() {
            DocumentSide::Sales => &mut output,
            DocumentSide::Purchases => &mut input,
        };
        side.documents += 1;
        side.base += sign * doc.totals().subtotal;
        side.tax += sign * doc.totals().tax_amount;
    }

    let net = output.tax - input.tax;
    VatSummary {
        period,
        output,
        input,
        net,
    }
}
