//! # Fiscal Configuration
//!
//! The company's tax settings as the engine sees them: NIF, regime, the
//! rate table, the industrial withholding rate, the rounding policy and the
//! last closed fiscal period. Read-only to the core; loaded from YAML.
//!
//! ```yaml
//! company_nif: "5417000001"
//! company_name: Exemplo Comercial Lda
//! regime: general
//! rates:
//!   NOR: "0.14"
//!   RED: "0.07"
//!   ISE: "0"
//! withholding_rate: "0.065"
//! rounding: half_up
//! closed_through: 2025-02
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use fisco_core::{Currency, Decimal, FiscalPeriod, Nif, RoundingPolicy, TaxRateCode};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, TaxError};

/// VAT regime the company is registered under.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxRegime {
    /// Per-line rates from the rate table.
    #[default]
    General,
    /// Every taxable line is charged `simplified_rate`; exempt lines stay exempt.
    Simplified,
    /// No VAT is charged. Rate codes are still validated.
    NonSubject,
}

/// Company fiscal configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiscalConfiguration {
    pub company_nif: Nif,
    pub company_name: String,
    #[serde(default)]
    pub regime: TaxRegime,
    pub rates: BTreeMap<TaxRateCode, Decimal>,
    #[serde(default = "default_simplified_rate")]
    pub simplified_rate: Decimal,
    #[serde(default = "default_withholding_rate")]
    pub withholding_rate: Decimal,
    #[serde(default)]
    pub rounding: RoundingPolicy,
    /// Last fiscal period closed for declarations. Documents issued in or
    /// before it can no longer be cancelled.
    #[serde(default)]
    pub closed_through: Option<FiscalPeriod>,
    #[serde(default)]
    pub currency: Currency,
}

fn default_simplified_rate() -> Decimal {
    Decimal::new(7, 2)
}

fn default_withholding_rate() -> Decimal {
    Decimal::new(65, 3)
}

impl FiscalConfiguration {
    /// Standard Angolan table: `NOR` 14%, `RED` 7%, `ISE` 0%, withholding
    /// 6.5%, half-up rounding, kwanza.
    pub fn angola_default(company_nif: Nif, company_name: impl Into<String>) -> Self {
        let mut rates = BTreeMap::new();
        for (code, rate) in [
            ("NOR", Decimal::new(14, 2)),
            ("RED", Decimal::new(7, 2)),
            ("ISE", Decimal::ZERO),
        ] {
            if let Ok(code) = TaxRateCode::new(code) {
                rates.insert(code, rate);
            }
        }
        Self {
            company_nif,
            company_name: company_name.into(),
            regime: TaxRegime::General,
            rates,
            simplified_rate: default_simplified_rate(),
            withholding_rate: default_withholding_rate(),
            rounding: RoundingPolicy::HalfUp,
            closed_through: None,
            currency: Currency::aoa(),
        }
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Self::parse_at(yaml, Path::new("<inline>"))
    }

    /// Read, parse and validate a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_at(&yaml, path)
    }

    fn parse_at(yaml: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml).map_err(|source| ConfigError::YamlParse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every rate is a fraction in `[0, 1)`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.company_name.trim().is_empty() {
            return Err(invalid("company_name", "must not be empty"));
        }
        if self.rates.is_empty() {
            return Err(invalid("rates", "rate table must not be empty"));
        }
        for (code, rate) in &self.rates {
            check_fraction(&format!("rates.{code}"), *rate)?;
        }
        check_fraction("simplified_rate", self.simplified_rate)?;
        check_fraction("withholding_rate", self.withholding_rate)?;
        Ok(())
    }

    /// Nominal rate for `code` from the table.
    pub fn rate(&self, code: &TaxRateCode) -> Option<Decimal> {
        self.rates.get(code).copied()
    }

    /// Rate actually charged for `code` under the configured regime.
    ///
    /// `line` is only used to label the error.
    pub fn effective_rate(&self, code: &TaxRateCode, line: usize) -> Result<Decimal, TaxError> {
        let nominal = self.rate(code).ok_or_else(|| TaxError::InvalidRate {
            line,
            code: code.clone(),
        })?;
        Ok(match self.regime {
            TaxRegime::General => nominal,
            TaxRegime::Simplified if nominal.is_zero() => Decimal::ZERO,
            TaxRegime::Simplified => self.simplified_rate,
            TaxRegime::NonSubject => Decimal::ZERO,
        })
    }

    /// Resolve a rate code given as text.
    pub fn rate_code(&self, code: &str) -> Option<TaxRateCode> {
        let code = TaxRateCode::new(code).ok()?;
        self.rates.contains_key(&code).then_some(code)
    }
}

fn check_fraction(field: &str, value: Decimal) -> Result<(), ConfigError> {
    if value.is_sign_negative() || value >= Decimal::ONE {
        return Err(invalid(field, format!("{value} must be in [0, 1)")));
    }
    Ok(())
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        reason: reason.into(),
    }
}

impl FromStr for TaxRegime {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "general" => Ok(Self::General),
            "simplified" => Ok(Self::Simplified),
            "non_subject" => Ok(Self::NonSubject),
            other => Err(invalid("regime", format!("unknown regime {other:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nif() -> Nif {
        Nif::new("5417000001").unwrap()
    }

    fn code(s: &str) -> TaxRateCode {
        TaxRateCode::new(s).unwrap()
    }

    #[test]
    fn test_angola_default_table() {
        let c = FiscalConfiguration::angola_default(nif(), "Exemplo Lda");
        assert_eq!(c.rate(&code("NOR")), Some(Decimal::new(14, 2)));
        assert_eq!(c.rate(&code("RED")), Some(Decimal::new(7, 2)));
        assert_eq!(c.rate(&code("ISE")), Some(Decimal::ZERO));
        assert_eq!(c.withholding_rate, Decimal::new(65, 3));
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_from_yaml_with_defaults() {
        let yaml = r#"
company_nif: "5417000001"
company_name: Exemplo Comercial Lda
rates:
  NOR: "0.14"
  ISE: "0"
"#;
        let c = FiscalConfiguration::from_yaml_str(yaml).unwrap();
        assert_eq!(c.regime, TaxRegime::General);
        assert_eq!(c.rounding, RoundingPolicy::HalfUp);
        assert_eq!(c.withholding_rate, Decimal::new(65, 3));
        assert_eq!(c.currency.as_str(), "AOA");
        assert!(c.closed_through.is_none());
    }

    #[test]
    fn test_from_yaml_full() {
        let yaml = r#"
company_nif: "5417000001"
company_name: Exemplo Comercial Lda
regime: simplified
rates:
  NOR: "0.14"
withholding_rate: "0.065"
rounding: half_even
closed_through: "2025-02"
"#;
        let c = FiscalConfiguration::from_yaml_str(yaml).unwrap();
        assert_eq!(c.regime, TaxRegime::Simplified);
        assert_eq!(c.rounding, RoundingPolicy::HalfEven);
        assert_eq!(c.closed_through, Some(FiscalPeriod::new(2025, 2).unwrap()));
    }

    #[test]
    fn test_rejects_rate_out_of_range() {
        let yaml = r#"
company_nif: "5417000001"
company_name: X
rates:
  NOR: "1.4"
"#;
        match FiscalConfiguration::from_yaml_str(yaml).unwrap_err() {
            ConfigError::Invalid { field, .. } => assert_eq!(field, "rates.NOR"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rejects_bad_nif_and_empty_table() {
        let bad_nif = "company_nif: \"54-17\"\ncompany_name: X\nrates:\n  NOR: \"0.14\"\n";
        assert!(matches!(
            FiscalConfiguration::from_yaml_str(bad_nif),
            Err(ConfigError::YamlParse { .. })
        ));
        let empty = "company_nif: \"5417\"\ncompany_name: X\nrates: {}\n";
        assert!(matches!(
            FiscalConfiguration::from_yaml_str(empty),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_effective_rate_by_regime() {
        let mut c = FiscalConfiguration::angola_default(nif(), "X");
        assert_eq!(c.effective_rate(&code("NOR"), 0).unwrap(), Decimal::new(14, 2));

        c.regime = TaxRegime::Simplified;
        assert_eq!(c.effective_rate(&code("NOR"), 0).unwrap(), Decimal::new(7, 2));
        assert_eq!(c.effective_rate(&code("ISE"), 0).unwrap(), Decimal::ZERO);

        c.regime = TaxRegime::NonSubject;
        assert_eq!(c.effective_rate(&code("NOR"), 0).unwrap(), Decimal::ZERO);
        assert!(matches!(
            c.effective_rate(&code("XYZ"), 3),
            Err(TaxError::InvalidRate { line: 3, .. })
        ));
    }

    #[test]
    fn test_regime_from_str() {
        assert_eq!("non_subject".parse::<TaxRegime>().unwrap(), TaxRegime::NonSubject);
        assert!("vat".parse::<TaxRegime>().is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = FiscalConfiguration::load(Path::new("/nonexistent/fisco.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
