//! # Document Vocabulary
//!
//! The value types a fiscal document is built from: its type (and the sign
//! that type carries), line items, computed totals and the party snapshot
//! frozen at issue time.
//!
//! Sign is carried by type. A credit note is a [`DocumentEffect::Reversal`]
//! with positive amounts; consumers that aggregate across documents apply
//! [`DocumentEffect::sign()`] instead of storing negative lines.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::FiscoError;
use crate::identity::{Nif, PartyId};

/// Kind of tax-relevant document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    /// Fatura (FT).
    Invoice,
    /// Nota de crédito (NC).
    CreditNote,
    /// Nota de débito (ND).
    DebitNote,
    /// Fatura-recibo (FR).
    ReceiptInvoice,
    /// Supplier invoice recorded on the purchase side.
    PurchaseInvoice,
    /// Supplier receipt recorded on the purchase side.
    PurchaseReceipt,
}

impl DocumentType {
    /// All document types.
    pub const ALL: [DocumentType; 6] = [
        Self::Invoice,
        Self::CreditNote,
        Self::DebitNote,
        Self::ReceiptInvoice,
        Self::PurchaseInvoice,
        Self::PurchaseReceipt,
    ];

    /// Short code used in document numbers and audit files.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Invoice => "FT",
            Self::CreditNote => "NC",
            Self::DebitNote => "ND",
            Self::ReceiptInvoice => "FR",
            Self::PurchaseInvoice => "FC",
            Self::PurchaseReceipt => "RC",
        }
    }

    /// Parse a short code (case-insensitive) or a snake_case type name.
    pub fn from_code(code: &str) -> Result<Self, FiscoError> {
        let c = code.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.code().eq_ignore_ascii_case(c) || t.as_str() == c)
            .ok_or_else(|| {
                FiscoError::validation("document_type", format!("unknown document type {c:?}"))
            })
    }

    /// snake_case name, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Invoice => "invoice",
            Self::CreditNote => "credit_note",
            Self::DebitNote => "debit_note",
            Self::ReceiptInvoice => "receipt_invoice",
            Self::PurchaseInvoice => "purchase_invoice",
            Self::PurchaseReceipt => "purchase_receipt",
        }
    }

    /// Whether the document adds to or reverses its origin.
    pub fn effect(&self) -> DocumentEffect {
        match self {
            Self::CreditNote => DocumentEffect::Reversal,
            _ => DocumentEffect::Charge,
        }
    }

    /// Sales or purchases side of the books.
    pub fn side(&self) -> DocumentSide {
        match self {
            Self::PurchaseInvoice | Self::PurchaseReceipt => DocumentSide::Purchases,
            _ => DocumentSide::Sales,
        }
    }

    /// True if documents of this type must reference an origin document.
    pub fn requires_origin(&self) -> bool {
        matches!(self, Self::CreditNote | Self::DebitNote)
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Sign tag carried by a document type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentEffect {
    /// Adds to the amounts owed.
    Charge,
    /// Reduces the amounts owed on an origin document.
    Reversal,
}

impl DocumentEffect {
    /// `1` for charges, `-1` for reversals.
    pub fn sign(&self) -> Decimal {
        match self {
            Self::Charge => Decimal::ONE,
            Self::Reversal => Decimal::NEGATIVE_ONE,
        }
    }
}

/// Which side of the books a document belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentSide {
    /// Issued to clients.
    Sales,
    /// Received from suppliers.
    Purchases,
}

/// Code of an entry in the configured rate table (e.g. `NOR`, `RED`, `ISE`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaxRateCode(String);

impl TaxRateCode {
    /// Validate and upper-case a rate code.
    pub fn new(code: impl AsRef<str>) -> Result<Self, FiscoError> {
        let code = code.as_ref().trim();
        if code.is_empty() || code.len() > 16 {
            return Err(FiscoError::validation(
                "tax_rate_code",
                format!("{code:?} must be 1 to 16 characters"),
            ));
        }
        if !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(FiscoError::validation(
                "tax_rate_code",
                format!("{code:?} contains invalid characters"),
            ));
        }
        Ok(Self(code.to_ascii_uppercase()))
    }

    /// Access the code string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TaxRateCode {
    type Error = FiscoError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<TaxRateCode> for String {
    fn from(c: TaxRateCode) -> Self {
        c.0
    }
}

impl std::fmt::Display for TaxRateCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One line of a document.
///
/// `discount` is a fraction in `[0, 1]` applied to `quantity * unit_price`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub tax_rate_code: TaxRateCode,
    #[serde(default)]
    pub discount: Decimal,
    #[serde(default)]
    pub withholding_applicable: bool,
}

impl LineItem {
    /// A line with no discount and no withholding.
    pub fn new(
        description: impl Into<String>,
        quantity: Decimal,
        unit_price: Decimal,
        tax_rate_code: TaxRateCode,
    ) -> Self {
        Self {
            description: description.into(),
            quantity,
            unit_price,
            tax_rate_code,
            discount: Decimal::ZERO,
            withholding_applicable: false,
        }
    }

    /// Set the line discount fraction.
    pub fn with_discount(mut self, discount: Decimal) -> Self {
        self.discount = discount;
        self
    }

    /// Flag the line as subject to industrial withholding.
    pub fn with_withholding(mut self) -> Self {
        self.withholding_applicable = true;
        self
    }
}

/// Computed document totals, rounded to two decimals.
///
/// `total = subtotal + tax_amount`. Withholding is reported alongside, not
/// netted from the total.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub withholding_amount: Decimal,
    pub total: Decimal,
}

impl Totals {
    /// All-zero totals.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Amount payable by the counterparty once withholding is retained.
    pub fn net_payable(&self) -> Decimal {
        self.total - self.withholding_amount
    }
}

/// Name and tax id of the counterparty as they were at issue time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartySnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub party_id: Option<PartyId>,
    pub name: String,
    pub nif: Nif,
}

impl PartySnapshot {
    /// Snapshot for a named party.
    pub fn new(party_id: Option<PartyId>, name: impl Into<String>, nif: Nif) -> Self {
        Self {
            party_id,
            name: name.into(),
            nif,
        }
    }

    /// Snapshot for an unidentified final consumer.
    pub fn final_consumer() -> Self {
        Self {
            party_id: None,
            name: "Consumidor Final".to_string(),
            nif: Nif::final_consumer(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_roundtrip() {
        for t in DocumentType::ALL {
            assert_eq!(DocumentType::from_code(t.code()).unwrap(), t);
            assert_eq!(DocumentType::from_code(t.as_str()).unwrap(), t);
        }
        assert_eq!(DocumentType::from_code("ft").unwrap(), DocumentType::Invoice);
        assert!(DocumentType::from_code("XX").is_err());
    }

    #[test]
    fn test_effect_and_side() {
        assert_eq!(DocumentType::CreditNote.effect(), DocumentEffect::Reversal);
        assert_eq!(DocumentType::DebitNote.effect(), DocumentEffect::Charge);
        assert_eq!(DocumentType::Invoice.side(), DocumentSide::Sales);
        assert_eq!(DocumentType::PurchaseInvoice.side(), DocumentSide::Purchases);
        assert_eq!(DocumentEffect::Reversal.sign(), Decimal::NEGATIVE_ONE);
        assert!(DocumentType::CreditNote.requires_origin());
        assert!(!DocumentType::Invoice.requires_origin());
    }

    #[test]
    fn test_serde_name_matches_as_str() {
        for t in DocumentType::ALL {
            let json = serde_json::to_string(&t).unwrap();
            assert_eq!(json, format!("\"{}\"", t.as_str()));
        }
    }

    #[test]
    fn test_tax_rate_code_normalizes() {
        assert_eq!(TaxRateCode::new(" nor ").unwrap().as_str(), "NOR");
        assert!(TaxRateCode::new("").is_err());
        assert!(TaxRateCode::new("N-R").is_err());
    }

    #[test]
    fn test_line_item_defaults_from_json() {
        let line: LineItem = serde_json::from_str(
            r#"{"description":"Cimento","quantity":"2","unit_price":"500","tax_rate_code":"NOR"}"#,
        )
        .unwrap();
        assert_eq!(line.discount, Decimal::ZERO);
        assert!(!line.withholding_applicable);
        assert_eq!(line.quantity, Decimal::from(2));
    }

    #[test]
    fn test_net_payable() {
        let t = Totals {
            subtotal: Decimal::from(1000),
            tax_amount: Decimal::from(140),
            withholding_amount: Decimal::from(65),
            total: Decimal::from(1140),
        };
        assert_eq!(t.net_payable(), Decimal::from(1075));
    }
}
