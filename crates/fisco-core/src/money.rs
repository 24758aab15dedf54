//! # Money: Decimal Amounts, Currency, Rounding Policy
//!
//! All amounts are `rust_decimal::Decimal`. Intermediate arithmetic keeps
//! full precision; a [`RoundingPolicy`] is applied once, when a value is
//! stored on a document or rendered. Stored amounts have [`MONEY_SCALE`]
//! fractional digits.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::FiscoError;

/// Number of fractional digits carried by stored amounts.
pub const MONEY_SCALE: u32 = 2;

/// Rounding rule applied at the storage/display boundary.
///
/// Fixed per deployment through the fiscal configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingPolicy {
    /// Ties away from zero (`0.125 -> 0.13`).
    #[default]
    HalfUp,
    /// Ties to the even neighbour (`0.125 -> 0.12`).
    HalfEven,
}

impl RoundingPolicy {
    /// Round `value` to [`MONEY_SCALE`] digits.
    pub fn round(&self, value: Decimal) -> Decimal {
        self.round_dp(value, MONEY_SCALE)
    }

    /// Round `value` to `dp` digits.
    pub fn round_dp(&self, value: Decimal, dp: u32) -> Decimal {
        let strategy = match self {
            Self::HalfUp => RoundingStrategy::MidpointAwayFromZero,
            Self::HalfEven => RoundingStrategy::MidpointNearestEven,
        };
        let mut rounded = value.round_dp_with_strategy(dp, strategy);
        rounded.rescale(dp);
        rounded
    }
}

/// Render an amount with exactly [`MONEY_SCALE`] fractional digits.
///
/// This is the form amounts take inside certification fingerprints, so
/// `1140`, `1140.0` and `1140.00` all render as `"1140.00"`.
pub fn format_amount(value: Decimal) -> String {
    let mut v = value;
    v.rescale(MONEY_SCALE);
    let s = v.to_string();
    // Decimal prints negative zero as "-0.00".
    if v.is_zero() {
        s.trim_start_matches('-').to_string()
    } else {
        s
    }
}

/// ISO 4217 currency code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    /// Validate a three-letter code. Lowercase input is upper-cased.
    pub fn new(code: impl AsRef<str>) -> Result<Self, FiscoError> {
        let code = code.as_ref().trim();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(FiscoError::validation(
                "currency",
                format!("{code:?} is not a three-letter ISO 4217 code"),
            ));
        }
        Ok(Self(code.to_ascii_uppercase()))
    }

    /// Angolan kwanza.
    pub fn aoa() -> Self {
        Self("AOA".to_string())
    }

    /// Access the code.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Currency {
    fn default() -> Self {
        Self::aoa()
    }
}

impl TryFrom<String> for Currency {
    type Error = FiscoError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Currency> for String {
    fn from(c: Currency) -> Self {
        c.0
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
