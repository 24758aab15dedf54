//! # Hash Chain
//!
//! ## Fingerprint
//!
//! The fingerprint of a certified document is
//!
//! ```text
//! SHA256( JCS({
//!     "series_id", "number", "issue_date", "party_tax_id", "previous_hash",
//!     "subtotal", "tax_amount", "withholding_amount", "total"
//! }) )
//! ```
//!
//! rendered as 64 lowercase hex characters. Amounts enter as two-decimal
//! strings and the issue date as `YYYY-MM-DD`, so the same stored fields
//! always reproduce the same bytes.
//!
//! ## Genesis
//!
//! The first document of a series chains to [`GENESIS_HASH`], a fixed public
//! seed of 64 zeros. A series never chains to an empty or null value.

use chrono::NaiveDate;
use fisco_core::{
    format_amount, sha256_hex, CanonicalBytes, CanonicalizationError, DocumentId, Nif, SeriesId,
    Totals,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Previous-hash value of the first document in every series.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// The fields a fingerprint is computed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashInput {
    pub series_id: SeriesId,
    pub number: u64,
    pub totals: Totals,
    pub issue_date: NaiveDate,
    pub party_tax_id: Nif,
    pub previous_hash: String,
}

#[derive(Serialize)]
struct FingerprintPayload<'a> {
    series_id: &'a str,
    number: u64,
    issue_date: String,
    party_tax_id: &'a str,
    previous_hash: &'a str,
    subtotal: String,
    tax_amount: String,
    withholding_amount: String,
    total: String,
}

impl HashInput {
    fn payload(&self) -> FingerprintPayload<'_> {
        FingerprintPayload {
            series_id: self.series_id.as_str(),
            number: self.number,
            issue_date: self.issue_date.format("%Y-%m-%d").to_string(),
            party_tax_id: self.party_tax_id.as_str(),
            previous_hash: &self.previous_hash,
            subtotal: format_amount(self.totals.subtotal),
            tax_amount: format_amount(self.totals.tax_amount),
            withholding_amount: format_amount(self.totals.withholding_amount),
            total: format_amount(self.totals.total),
        }
    }
}

/// Compute the fingerprint of a document as lowercase hex.
pub fn compute_hash(input: &HashInput) -> Result<String, ChainError> {
    let bytes = CanonicalBytes::new(&input.payload())?;
    Ok(sha256_hex(&bytes))
}

// ─── Verification ───────────────────────────────────────────────────

/// A certified document as persisted: the fingerprint inputs plus the hash
/// that was stored at certification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainEntry {
    pub document_id: DocumentId,
    pub input: HashInput,
    pub stored_hash: String,
}

/// Where a verified segment starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainAnchor {
    pub next_number: u64,
    pub previous_hash: String,
}

impl ChainAnchor {
    /// Number 1, chained to [`GENESIS_HASH`].
    pub fn genesis() -> Self {
        Self {
            next_number: 1,
            previous_hash: GENESIS_HASH.to_string(),
        }
    }
}

/// Result of a successful verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainReport {
    pub series_id: SeriesId,
    pub verified: usize,
    pub last_number: Option<u64>,
    pub last_hash: String,
}

/// How a chain entry diverged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DivergenceKind {
    /// The entry belongs to another series.
    SeriesMismatch,
    /// The number is not the successor of the previous entry.
    NumberGap,
    /// The stored previous hash is not the predecessor's stored hash.
    PreviousHashMismatch,
    /// Recomputing the fingerprint does not reproduce the stored hash.
    HashMismatch,
}

impl std::fmt::Display for DivergenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::SeriesMismatch => "series mismatch",
            Self::NumberGap => "number gap",
            Self::PreviousHashMismatch => "previous hash mismatch",
            Self::HashMismatch => "hash mismatch",
        };
        f.write_str(s)
    }
}

/// Errors raised by the hash chain.
#[derive(Debug, Error)]
pub enum ChainError {
    /// The first divergent document in a series.
    #[error("chain integrity violated in series {series_id} at number {number} ({document_id}): {kind}, expected {expected}, actual {actual}")]
    ChainIntegrity {
        series_id: SeriesId,
        document_id: DocumentId,
        number: u64,
        kind: DivergenceKind,
        expected: String,
        actual: String,
    },

    /// Fingerprint payload could not be canonicalized.
    #[error("fingerprint canonicalization failed: {0}")]
    Canonicalization(#[from] CanonicalizationError),
}

/// Verify a whole series from its genesis.
///
/// Entries may be passed in any order; they are checked in number order.
pub fn verify_chain(series_id: &SeriesId, entries: &[ChainEntry]) -> Result<ChainReport, ChainError> {
    verify_segment(series_id, entries, &ChainAnchor::genesis())
}

/// Verify a contiguous run of a series starting at `anchor`.
pub fn verify_segment(
    series_id: &SeriesId,
    entries: &[ChainEntry],
    anchor: &ChainAnchor,
) -> Result<ChainReport, ChainError> {
    let mut ordered: Vec<&ChainEntry> = entries.iter().collect();
    ordered.sort_by_key(|e| e.input.number);

    let mut expected_number = anchor.next_number;
    let mut expected_previous = anchor.previous_hash.clone();
    let mut last_number = None;

    for entry in ordered {
        let diverged = |kind, expected: String, actual: String| ChainError::ChainIntegrity {
            series_id: series_id.clone(),
            document_id: entry.document_id,
            number: entry.input.number,
            kind,
            expected,
            actual,
        };

        if &entry.input.series_id != series_id {
            return Err(diverged(
                DivergenceKind::SeriesMismatch,
                series_id.to_string(),
                entry.input.series_id.to_string(),
            ));
        }
        if entry.input.number != expected_number {
            return Err(diverged(
                DivergenceKind::NumberGap,
                expected_number.to_string(),
                entry.input.number.to_string(),
            ));
        }
        if entry.input.previous_hash != expected_previous {
            return Err(diverged(
                DivergenceKind::PreviousHashMismatch,
                expected_previous,
                entry.input.previous_hash.clone(),
            ));
        }
        let recomputed = compute_hash(&entry.input)?;
        if recomputed != entry.stored_hash {
            return Err(diverged(
                DivergenceKind::HashMismatch,
                recomputed,
                entry.stored_hash.clone(),
            ));
        }

        last_number = Some(entry.input.number);
        expected_previous = entry.stored_hash.clone();
        expected_number += 1;
    }

    Ok(ChainReport {
        series_id: series_id.clone(),
        verified: entries.len(),
        last_number,
        last_hash: expected_previous,
    })
}
