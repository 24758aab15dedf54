//! Quick calculations on a single amount, outside any document: add VAT to
//! a net amount and compute withholding on a base. Both use the configured
//! rounding policy.

use fisco_core::{Decimal, TaxRateCode};
use serde::{Deserialize, Serialize};

use crate::config::FiscalConfiguration;
use crate::error::TaxError;

/// Net, tax and gross for one amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrossUp {
    pub net: Decimal,
    pub rate: Decimal,
    pub tax: Decimal,
    pub gross: Decimal,
}

/// Apply the effective rate for `code` to `net`.
pub fn gross_up(
    net: Decimal,
    code: &TaxRateCode,
    config: &FiscalConfiguration,
) -> Result<GrossUp, TaxError> {
    let rate = config.effective_rate(code, 0)?;
    let tax = net
        .checked_mul(rate)
        .ok_or(TaxError::AmountOverflow { line: 0 })?;
    let net = config.rounding.round(net);
    let tax = config.rounding.round(tax);
    Ok(GrossUp {
        net,
        rate,
        tax,
        gross: net + tax,
    })
}

/// Industrial withholding on a tax-exclusive base.
pub fn withholding_on(base: Decimal, config: &FiscalConfiguration) -> Result<Decimal, TaxError> {
    let amount = base
        .checked_mul(config.withholding_rate)
        .ok_or(TaxError::AmountOverflow { line: 0 })?;
    Ok(config.rounding.round(amount))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fisco_core::Nif;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn config() -> FiscalConfiguration {
        FiscalConfiguration::angola_default(Nif::new("5417000001").unwrap(), "Exemplo Lda")
    }

    #[test]
    fn test_gross_up_general() {
        let g = gross_up(d("1000"), &TaxRateCode::new("NOR").unwrap(), &config()).unwrap();
        assert_eq!(g.tax, d("140.00"));
        assert_eq!(g.gross, d("1140.00"));
    }

    #[test]
    fn test_gross_up_reduced_rounds() {
        let g = gross_up(d("10.05"), &TaxRateCode::new("RED").unwrap(), &config()).unwrap();
        // 10.05 * 0.07 = 0.7035
        assert_eq!(g.tax, d("0.70"));
        assert_eq!(g.gross, d("10.75"));
    }

    #[test]
    fn test_gross_up_unknown_code() {
        assert!(gross_up(d("1"), &TaxRateCode::new("XX").unwrap(), &config()).is_err());
    }

    #[test]
    fn test_withholding_on() {
        assert_eq!(withholding_on(d("1000"), &config()).unwrap(), d("65.00"));
        assert_eq!(withholding_on(d("333.33"), &config()).unwrap(), d("21.67"));
    }
}
