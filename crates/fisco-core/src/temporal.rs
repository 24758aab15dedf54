//! # Temporal Types: UTC Timestamps and Fiscal Periods
//!
//! `Timestamp` is a UTC-only instant truncated to seconds. It stamps
//! certification and lifecycle transitions, and it renders as
//! `YYYY-MM-DDTHH:MM:SSZ` so two machines produce the same bytes for the
//! same instant.
//!
//! `FiscalPeriod` is a calendar month (`YYYY-MM`). Withholding maps, VAT
//! summaries and period closing all operate on it. Issue dates are plain
//! `chrono::NaiveDate` values; a document belongs to the period containing
//! its issue date.

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FiscoError;

/// A UTC-only timestamp, truncated to seconds precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Current UTC time, truncated to seconds.
    pub fn now() -> Self {
        Self(truncate_to_seconds(Utc::now()))
    }

    /// From a `DateTime<Utc>`, truncating sub-seconds.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(truncate_to_seconds(dt))
    }

    /// Parse an RFC 3339 string. Only the `Z` suffix is accepted.
    pub fn parse(s: &str) -> Result<Self, FiscoError> {
        if !s.ends_with('Z') {
            return Err(FiscoError::validation(
                "timestamp",
                format!("must use Z suffix (UTC only), got {s:?}"),
            ));
        }
        let dt = DateTime::parse_from_rfc3339(s).map_err(|e| {
            FiscoError::validation("timestamp", format!("invalid RFC 3339 {s:?}: {e}"))
        })?;
        Ok(Self(truncate_to_seconds(dt.with_timezone(&Utc))))
    }

    /// Access the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// The UTC calendar date of this instant.
    pub fn date(&self) -> NaiveDate {
        self.0.date_naive()
    }

    /// Render as ISO8601 with Z suffix (e.g., `2025-03-15T12:00:00Z`).
    pub fn to_iso8601(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

fn truncate_to_seconds(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.with_nanosecond(0).unwrap_or(dt)
}

// ─── Fiscal Period ──────────────────────────────────────────────────

/// A fiscal reporting period: one calendar month.
///
/// Ordered chronologically. Serialized as `"YYYY-MM"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FiscalPeriod {
    year: i32,
    month: u32,
}

impl FiscalPeriod {
    /// Construct a period, validating `month` in 1..=12 and a four-digit year.
    pub fn new(year: i32, month: u32) -> Result<Self, FiscoError> {
        if !(1..=12).contains(&month) {
            return Err(FiscoError::validation(
                "fiscal_period",
                format!("month {month} outside 1..=12"),
            ));
        }
        if !(1000..=9999).contains(&year) {
            return Err(FiscoError::validation(
                "fiscal_period",
                format!("year {year} is not a four-digit year"),
            ));
        }
        Ok(Self { year, month })
    }

    /// The period containing `date`.
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Parse `"YYYY-MM"`.
    pub fn parse(s: &str) -> Result<Self, FiscoError> {
        let (y, m) = s.trim().split_once('-').ok_or_else(|| {
            FiscoError::validation("fiscal_period", format!("expected YYYY-MM, got {s:?}"))
        })?;
        let year = y.parse::<i32>().map_err(|_| {
            FiscoError::validation("fiscal_period", format!("invalid year in {s:?}"))
        })?;
        let month = m.parse::<u32>().map_err(|_| {
            FiscoError::validation("fiscal_period", format!("invalid month in {s:?}"))
        })?;
        Self::new(year, month)
    }

    /// Calendar year.
    pub fn year(&self) -> i32 {
        self.year
    }

    /// Calendar month, 1-based.
    pub fn month(&self) -> u32 {
        self.month
    }

    /// True if `date` falls in this month.
    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    /// First day of the period.
    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }
}

impl TryFrom<String> for FiscalPeriod {
    type Error = FiscoError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<FiscalPeriod> for String {
    fn from(p: FiscalPeriod) -> Self {
        p.to_string()
    }
}

impl std::fmt::Display for FiscalPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}
