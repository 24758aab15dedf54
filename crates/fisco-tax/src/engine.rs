//! # Document Totals
//!
//! `compute_totals` turns a list of line items into document totals. It is
//! a pure function of its inputs: no clock, no registry, no I/O.
//!
//! ## Arithmetic
//!
//! For line `i` with quantity `q`, unit price `p`, line discount `d` and the
//! document-level discount `g`:
//!
//! ```text
//! line_subtotal = q * p * (1 - d)
//! base          = line_subtotal * (1 - g)
//! tax           = base * rate(code)
//! withholding   = base * withholding_rate     (flagged lines only)
//! ```
//!
//! The document sums are kept at full precision and rounded once by the
//! configured [`RoundingPolicy`](fisco_core::RoundingPolicy). `total` is the
//! sum of the rounded subtotal and rounded tax, so the stored triple always
//! adds up. Withholding is reported, not deducted from `total`.
//!
//! ## Sign
//!
//! Quantities must be non-negative. A credit note may arrive with negative
//! quantities from a caller that signs lines; the magnitude is used, since
//! the reversal is carried by the document type.

use std::collections::BTreeMap;

use fisco_core::{Decimal, DocumentEffect, DocumentType, LineItem, TaxRateCode, Totals};
use serde::{Deserialize, Serialize};

use crate::config::FiscalConfiguration;
use crate::error::TaxError;

/// Per-line result, rounded for display. Document totals are not the sum
/// of these rounded values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineBreakdown {
    pub index: usize,
    pub tax_rate_code: TaxRateCode,
    pub rate: Decimal,
    pub base: Decimal,
    pub tax: Decimal,
    pub withholding: Decimal,
}

/// Taxable base and tax per rate code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateSummary {
    pub tax_rate_code: TaxRateCode,
    pub rate: Decimal,
    pub base: Decimal,
    pub tax: Decimal,
}

/// Output of [`compute_totals`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxComputation {
    pub totals: Totals,
    pub lines: Vec<LineBreakdown>,
    pub by_rate: Vec<RateSummary>,
}

struct RawLine {
    base: Decimal,
    tax: Decimal,
    withholding: Decimal,
    rate: Decimal,
}

/// Compute the totals of a document.
///
/// `global_discount` is a fraction in `[0, 1]` applied to every line base
/// before tax and withholding.
///
/// # Errors
///
/// Any [`TaxError`]. Validation of all lines happens before a result is
/// produced; a failing document yields no partial totals.
pub fn compute_totals(
    items: &[LineItem],
    doc_type: DocumentType,
    global_discount: Decimal,
    config: &FiscalConfiguration,
) -> Result<TaxComputation, TaxError> {
    if items.is_empty() {
        return Err(TaxError::EmptyDocument);
    }
    check_discount(global_discount, None)?;
    let keep = Decimal::ONE - global_discount;

    let mut raw = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        raw.push(compute_line(index, item, doc_type, keep, config)?);
    }

    let policy = config.rounding;
    let mut sum_base = Decimal::ZERO;
    let mut sum_tax = Decimal::ZERO;
    let mut sum_withholding = Decimal::ZERO;
    let mut rates: BTreeMap<TaxRateCode, (Decimal, Decimal, Decimal)> = BTreeMap::new();
    let mut lines = Vec::with_capacity(raw.len());

    for (index, (item, line)) in items.iter().zip(&raw).enumerate() {
        let overflow = || TaxError::AmountOverflow { line: index };
        sum_base = sum_base.checked_add(line.base).ok_or_else(overflow)?;
        sum_tax = sum_tax.checked_add(line.tax).ok_or_else(overflow)?;
        sum_withholding = sum_withholding
            .checked_add(line.withholding)
            .ok_or_else(overflow)?;

        let entry = rates
            .entry(item.tax_rate_code.clone())
            .or_insert((line.rate, Decimal::ZERO, Decimal::ZERO));
        entry.1 = entry.1.checked_add(line.base).ok_or_else(overflow)?;
        entry.2 = entry.2.checked_add(line.tax).ok_or_else(overflow)?;

        lines.push(LineBreakdown {
            index,
            tax_rate_code: item.tax_rate_code.clone(),
            rate: line.rate,
            base: policy.round(line.base),
            tax: policy.round(line.tax),
            withholding: policy.round(line.withholding),
        });
    }

    let subtotal = policy.round(sum_base);
    let tax_amount = policy.round(sum_tax);
    let total = subtotal
        .checked_add(tax_amount)
        .ok_or(TaxError::AmountOverflow { line: items.len() - 1 })?;
    let totals = Totals {
        subtotal,
        tax_amount,
        withholding_amount: policy.round(sum_withholding),
        total,
    };

    let by_rate = rates
        .into_iter()
        .map(|(tax_rate_code, (rate, base, tax))| RateSummary {
            tax_rate_code,
            rate,
            base: policy.round(base),
            tax: policy.round(tax),
        })
        .collect();

    tracing::debug!(
        doc_type = %doc_type,
        lines = items.len(),
        subtotal = %totals.subtotal,
        tax = %totals.tax_amount,
        withholding = %totals.withholding_amount,
        "computed document totals"
    );

    Ok(TaxComputation {
        totals,
        lines,
        by_rate,
    })
}

fn compute_line(
    index: usize,
    item: &LineItem,
    doc_type: DocumentType,
    keep: Decimal,
    config: &FiscalConfiguration,
) -> Result<RawLine, TaxError> {
    let quantity = if item.quantity.is_sign_negative() && !item.quantity.is_zero() {
        if doc_type.effect() != DocumentEffect::Reversal {
            return Err(TaxError::InvalidQuantity {
                line: index,
                quantity: item.quantity,
            });
        }
        item.quantity.abs()
    } else {
        item.quantity
    };
    if item.unit_price.is_sign_negative() && !item.unit_price.is_zero() {
        return Err(TaxError::InvalidUnitPrice {
            line: index,
            unit_price: item.unit_price,
        });
    }
    check_discount(item.discount, Some(index))?;
    let rate = config.effective_rate(&item.tax_rate_code, index)?;

    let overflow = || TaxError::AmountOverflow { line: index };
    let line_subtotal = quantity
        .checked_mul(item.unit_price)
        .and_then(|v| v.checked_mul(Decimal::ONE - item.discount))
        .ok_or_else(overflow)?;
    let base = line_subtotal.checked_mul(keep).ok_or_else(overflow)?;
    let tax = base.checked_mul(rate).ok_or_else(overflow)?;
    let withholding = if item.withholding_applicable {
        base.checked_mul(config.withholding_rate)
            .ok_or_else(overflow)?
    } else {
        Decimal::ZERO
    };

    Ok(RawLine {
        base,
        tax,
        withholding,
        rate,
    })
}

fn check_discount(discount: Decimal, line: Option<usize>) -> Result<(), TaxError> {
    if (discount.is_sign_negative() && !discount.is_zero()) || discount > Decimal::ONE {
        return Err(TaxError::InvalidDiscount { line, discount });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TaxRegime;
    use fisco_core::{Nif, RoundingPolicy};
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn config() -> FiscalConfiguration {
        FiscalConfiguration::angola_default(Nif::new("5417000001").unwrap(), "Exemplo Lda")
    }

    fn line(q: &str, p: &str, code: &str) -> LineItem {
        LineItem::new("item", d(q), d(p), TaxRateCode::new(code).unwrap())
    }

    #[test]
    fn test_single_line_general_rate() {
        let out = compute_totals(&[line("1", "1000", "NOR")], DocumentType::Invoice, Decimal::ZERO, &config())
            .unwrap();
        assert_eq!(out.totals.subtotal, d("1000.00"));
        assert_eq!(out.totals.tax_amount, d("140.00"));
        assert_eq!(out.totals.total, d("1140.00"));
        assert_eq!(out.totals.withholding_amount, Decimal::ZERO);
    }

    #[test]
    fn test_withholding_on_tax_exclusive_base() {
        let items = [line("1", "1000", "NOR").with_withholding()];
        let out = compute_totals(&items, DocumentType::Invoice, Decimal::ZERO, &config()).unwrap();
        assert_eq!(out.totals.withholding_amount, d("65.00"));
        // Withholding is reported, not netted.
        assert_eq!(out.totals.total, d("1140.00"));
    }

    #[test]
    fn test_withholding_only_on_flagged_lines() {
        let items = [
            line("1", "1000", "NOR").with_withholding(),
            line("2", "250", "RED"),
        ];
        let out = compute_totals(&items, DocumentType::Invoice, Decimal::ZERO, &config()).unwrap();
        assert_eq!(out.totals.subtotal, d("1500.00"));
        assert_eq!(out.totals.tax_amount, d("175.00"));
        assert_eq!(out.totals.withholding_amount, d("65.00"));
        assert_eq!(out.by_rate.len(), 2);
    }

    #[test]
    fn test_line_discount_before_tax() {
        let items = [line("4", "250", "NOR").with_discount(d("0.10"))];
        let out = compute_totals(&items, DocumentType::Invoice, Decimal::ZERO, &config()).unwrap();
        assert_eq!(out.totals.subtotal, d("900.00"));
        assert_eq!(out.totals.tax_amount, d("126.00"));
        assert_eq!(out.totals.total, d("1026.00"));
    }

    #[test]
    fn test_global_discount_before_tax_and_withholding() {
        let items = [line("1", "1000", "NOR").with_withholding()];
        let out = compute_totals(&items, DocumentType::Invoice, d("0.5"), &config()).unwrap();
        assert_eq!(out.totals.subtotal, d("500.00"));
        assert_eq!(out.totals.tax_amount, d("70.00"));
        assert_eq!(out.totals.withholding_amount, d("32.50"));
    }

    #[test]
    fn test_rounding_once_at_document_level() {
        // Three lines of 0.333 tax each: per-line rounding would give 0.99.
        let mut c = config();
        c.rates.insert(TaxRateCode::new("TST").unwrap(), d("0.333"));
        let items = [line("1", "1", "TST"), line("1", "1", "TST"), line("1", "1", "TST")];
        let out = compute_totals(&items, DocumentType::Invoice, Decimal::ZERO, &c).unwrap();
        assert_eq!(out.totals.tax_amount, d("1.00"));
        assert_eq!(out.lines[0].tax, d("0.33"));
    }

    #[test]
    fn test_rounding_policy_applies_at_boundary() {
        let mut c = config();
        let items = [line("1", "0.125", "ISE")];
        let up = compute_totals(&items, DocumentType::Invoice, Decimal::ZERO, &c).unwrap();
        assert_eq!(up.totals.subtotal, d("0.13"));
        c.rounding = RoundingPolicy::HalfEven;
        let even = compute_totals(&items, DocumentType::Invoice, Decimal::ZERO, &c).unwrap();
        assert_eq!(even.totals.subtotal, d("0.12"));
    }

    #[test]
    fn test_unknown_rate_rejected() {
        let items = [line("1", "10", "NOR"), line("1", "10", "ZZZ")];
        let err = compute_totals(&items, DocumentType::Invoice, Decimal::ZERO, &config()).unwrap_err();
        assert!(matches!(err, TaxError::InvalidRate { line: 1, .. }));
    }

    #[test]
    fn test_negative_quantity_rejected_on_invoice() {
        let err = compute_totals(&[line("-1", "10", "NOR")], DocumentType::Invoice, Decimal::ZERO, &config())
            .unwrap_err();
        assert!(matches!(err, TaxError::InvalidQuantity { line: 0, .. }));
    }

    #[test]
    fn test_negative_quantity_normalized_on_credit_note() {
        let out = compute_totals(
            &[line("-1", "1000", "NOR")],
            DocumentType::CreditNote,
            Decimal::ZERO,
            &config(),
        )
        .unwrap();
        assert_eq!(out.totals.total, d("1140.00"));
    }

    #[test]
    fn test_invalid_inputs() {
        let c = config();
        assert_eq!(
            compute_totals(&[], DocumentType::Invoice, Decimal::ZERO, &c).unwrap_err(),
            TaxError::EmptyDocument
        );
        assert!(matches!(
            compute_totals(&[line("1", "-5", "NOR")], DocumentType::Invoice, Decimal::ZERO, &c),
            Err(TaxError::InvalidUnitPrice { .. })
        ));
        assert!(matches!(
            compute_totals(&[line("1", "5", "NOR")], DocumentType::Invoice, d("1.5"), &c),
            Err(TaxError::InvalidDiscount { line: None, .. })
        ));
        assert!(matches!(
            compute_totals(
                &[line("1", "5", "NOR").with_discount(d("-0.1"))],
                DocumentType::Invoice,
                Decimal::ZERO,
                &c
            ),
            Err(TaxError::InvalidDiscount { line: Some(0), .. })
        ));
    }

    #[test]
    fn test_simplified_and_non_subject_regimes() {
        let mut c = config();
        c.regime = TaxRegime::Simplified;
        let items = [line("1", "1000", "NOR"), line("1", "100", "ISE")];
        let out = compute_totals(&items, DocumentType::Invoice, Decimal::ZERO, &c).unwrap();
        assert_eq!(out.totals.tax_amount, d("70.00"));

        c.regime = TaxRegime::NonSubject;
        let out = compute_totals(&items, DocumentType::Invoice, Decimal::ZERO, &c).unwrap();
        assert_eq!(out.totals.tax_amount, d("0.00"));
        assert_eq!(out.totals.total, d("1100.00"));
    }

    #[test]
    fn test_overflow_reported() {
        let items = [line("79228162514264337593543950335", "2", "NOR")];
        assert!(matches!(
            compute_totals(&items, DocumentType::Invoice, Decimal::ZERO, &config()),
            Err(TaxError::AmountOverflow { line: 0 })
        ));
    }

    #[test]
    fn test_overflow_of_base_plus_tax_reported() {
        let items = [line("70000000000000000000000000000", "1", "NOR")];
        assert!(matches!(
            compute_totals(&items, DocumentType::Invoice, Decimal::ZERO, &config()),
            Err(TaxError::AmountOverflow { line: 0 })
        ));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use fisco_core::Nif;
    use proptest::prelude::*;

    fn config() -> FiscalConfiguration {
        FiscalConfiguration::angola_default(Nif::new("5417000001").unwrap(), "Exemplo Lda")
    }

    fn line_strategy() -> impl Strategy<Value = LineItem> {
        (
            0i64..1_000,
            0i64..10_000_000,
            prop_oneof![Just("NOR"), Just("RED"), Just("ISE")],
            0i64..=100,
            any::<bool>(),
        )
            .prop_map(|(q, cents, code, disc, wh)| LineItem {
                description: "item".to_string(),
                quantity: Decimal::from(q),
                unit_price: Decimal::new(cents, 2),
                tax_rate_code: TaxRateCode::new(code).unwrap(),
                discount: Decimal::new(disc, 2),
                withholding_applicable: wh,
            })
    }

    proptest! {
        #[test]
        fn compute_totals_is_deterministic(items in prop::collection::vec(line_strategy(), 1..8)) {
            let c = config();
            let a = compute_totals(&items, DocumentType::Invoice, Decimal::ZERO, &c).unwrap();
            let b = compute_totals(&items, DocumentType::Invoice, Decimal::ZERO, &c).unwrap();
            prop_assert_eq!(a, b);
        }

        #[test]
        fn total_is_subtotal_plus_tax(items in prop::collection::vec(line_strategy(), 1..8)) {
            let t = compute_totals(&items, DocumentType::Invoice, Decimal::ZERO, &config()).unwrap().totals;
            prop_assert_eq!(t.total, t.subtotal + t.tax_amount);
            prop_assert!(t.withholding_amount <= t.subtotal);
            prop_assert_eq!(t.subtotal.scale(), 2);
        }

        #[test]
        fn line_order_does_not_change_totals(items in prop::collection::vec(line_strategy(), 1..8)) {
            let c = config();
            let mut reversed = items.clone();
            reversed.reverse();
            let a = compute_totals(&items, DocumentType::Invoice, Decimal::ZERO, &c).unwrap().totals;
            let b = compute_totals(&reversed, DocumentType::Invoice, Decimal::ZERO, &c).unwrap().totals;
            prop_assert_eq!(a, b);
        }
    }
}
