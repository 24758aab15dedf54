//! # Series Audit
//!
//! Re-verifies a series' hash chain from the documents in the book and
//! checks that the chain ends at the series head. Any divergence halts the
//! series; [`resume_after_audit`] lifts the halt once the chain verifies
//! again.

use fisco_core::SeriesId;
use fisco_crypto::{verify_chain, ChainReport};

use crate::book::DocumentBook;
use crate::error::{CertificationError, SeriesError};
use crate::registry::SeriesRegistry;

/// Verify `series_id` and halt it on failure.
pub fn audit_series(
    registry: &SeriesRegistry,
    book: &DocumentBook,
    series_id: &SeriesId,
) -> Result<ChainReport, CertificationError> {
    let series = registry.get(series_id)?;
    let entries = book.chain_entries(series_id);

    let report = match verify_chain(series_id, &entries) {
        Ok(report) => report,
        Err(err) => {
            registry.halt(series_id, &err.to_string())?;
            return Err(err.into());
        }
    };

    let chain_end = report.last_number.unwrap_or(0);
    if chain_end != series.last_number() || report.last_hash != series.last_hash() {
        let err = SeriesError::HeadMismatch {
            series_id: series_id.clone(),
            expected: series.last_number(),
            actual: chain_end,
        };
        registry.halt(series_id, &err.to_string())?;
        return Err(err.into());
    }

    tracing::debug!(series_id = %series_id, verified = report.verified, "series chain verified");
    Ok(report)
}

/// Audit `series_id` and, if it verifies, lift any halt.
pub fn resume_after_audit(
    registry: &SeriesRegistry,
    book: &DocumentBook,
    series_id: &SeriesId,
) -> Result<ChainReport, CertificationError> {
    let report = audit_series(registry, book, series_id)?;
    registry.resume(series_id)?;
    Ok(report)
}
