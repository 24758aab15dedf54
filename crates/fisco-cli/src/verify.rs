//! # Verify Subcommand
//!
//! Re-verifies series hash chains from the documents stored in the ledger.
//! A series whose chain breaks or whose head disagrees with its last
//! document is halted, and the halt is written back to the ledger.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use fisco_core::SeriesId;
use fisco_series::audit_series;
use fisco_tax::FiscalConfiguration;

use crate::ledger::with_ledger;
use crate::series::parse_series_id;

/// Arguments for `fisco verify`.
#[derive(Args, Debug)]
pub struct VerifyArgs {
    #[arg(long, env = "FISCO_LEDGER")]
    pub ledger: PathBuf,
    /// Verify only this series.
    #[arg(long, value_parser = parse_series_id)]
    pub series: Option<SeriesId>,
}

/// Returns `1` when any series fails verification.
pub fn run_verify(args: &VerifyArgs, config: FiscalConfiguration) -> Result<u8> {
    let failures = with_ledger(&args.ledger, config, |certifier| {
        let targets: Vec<SeriesId> = match &args.series {
            Some(id) => vec![id.clone()],
            None => certifier.registry().list().into_iter().map(|s| s.id).collect(),
        };

        let mut failures = 0usize;
        for id in &targets {
            match audit_series(certifier.registry(), certifier.book(), id) {
                Ok(report) => {
                    let head = report.last_number.unwrap_or(0);
                    println!("OK: {id} verified {} documents, head {head}", report.verified);
                }
                Err(e) => {
                    failures += 1;
                    println!("FAIL: {id}: {e}");
                }
            }
        }
        Ok(failures)
    })?;

    if failures > 0 {
        tracing::error!(failures, "chain verification failed");
        return Ok(1);
    }
    Ok(0)
}
