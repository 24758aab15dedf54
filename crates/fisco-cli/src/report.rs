//! # Report Subcommands
//!
//! `withholding`, `vat` and `audit-export`. Reports read the ledger and
//! never write it back.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use fisco_core::{FiscalPeriod, FiscoError};
use fisco_report::{aggregate, audit_records, vat_summary};
use fisco_series::Certifier;
use fisco_tax::FiscalConfiguration;

use crate::ledger::LedgerFile;
use crate::print_json;

fn parse_period(s: &str) -> Result<FiscalPeriod, FiscoError> {
    FiscalPeriod::parse(s)
}

/// Arguments for `fisco withholding` and `fisco vat`.
#[derive(Args, Debug)]
pub struct PeriodArgs {
    #[arg(long, env = "FISCO_LEDGER")]
    pub ledger: PathBuf,
    /// Month to report (YYYY-MM).
    #[arg(long, value_parser = parse_period)]
    pub period: FiscalPeriod,
}

/// Arguments for `fisco audit-export`.
#[derive(Args, Debug)]
pub struct AuditExportArgs {
    #[arg(long, env = "FISCO_LEDGER")]
    pub ledger: PathBuf,
    /// Limit to one month (YYYY-MM). All certified documents otherwise.
    #[arg(long, value_parser = parse_period)]
    pub period: Option<FiscalPeriod>,
    /// Write the records here instead of stdout.
    #[arg(long)]
    pub output: Option<PathBuf>,
}

fn open(ledger: &Path, config: FiscalConfiguration) -> Result<Certifier> {
    LedgerFile::load(ledger)?.hydrate(config)
}

pub fn run_withholding(args: &PeriodArgs, config: FiscalConfiguration) -> Result<u8> {
    let certifier = open(&args.ledger, config)?;
    let report = aggregate(
        &certifier.book().list(),
        args.period,
        certifier.config().withholding_rate,
    );
    print_json(&report)?;
    Ok(0)
}

pub fn run_vat(args: &PeriodArgs, config: FiscalConfiguration) -> Result<u8> {
    let certifier = open(&args.ledger, config)?;
    let summary = vat_summary(&certifier.book().list(), args.period);
    print_json(&summary)?;
    Ok(0)
}

pub fn run_audit_export(args: &AuditExportArgs, config: FiscalConfiguration) -> Result<u8> {
    let certifier = open(&args.ledger, config)?;
    let records = audit_records(&certifier.book().list(), certifier.config(), args.period)?;
    match &args.output {
        Some(path) => {
            let content = serde_json::to_string_pretty(&records)?;
            std::fs::write(path, content)
                .with_context(|| format!("writing audit export {}", path.display()))?;
            println!("OK: {} records written to {}", records.len(), path.display());
        }
        None => print_json(&records)?,
    }
    Ok(0)
}
