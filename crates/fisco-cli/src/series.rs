//! # Series Subcommand
//!
//! Numbering series management against the ledger file.
//!
//! ## Subcommands
//!
//! - `open`: open an empty series for a document type and year.
//! - `rollover`: open the next year's series and close the current one.
//! - `halt`: stop certification on a series.
//! - `resume`: re-verify the chain and lift a halt.
//! - `list`: show every series and its head.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};
use fisco_core::{CompanyId, DocumentType, FiscoError, SeriesId};
use fisco_series::{resume_after_audit, DocumentSeries, DEFAULT_MAX_NUMBER};
use fisco_tax::FiscalConfiguration;

use crate::ledger::with_ledger;
use crate::print_json;

/// Arguments for the `fisco series` subcommand.
#[derive(Args, Debug)]
pub struct SeriesArgs {
    /// Ledger file.
    #[arg(long, env = "FISCO_LEDGER", global = true)]
    pub ledger: Option<PathBuf>,

    #[command(subcommand)]
    pub command: SeriesCommand,
}

/// Series subcommands.
#[derive(Subcommand, Debug)]
pub enum SeriesCommand {
    /// Open an empty series.
    Open {
        /// Document type code (FT, FR, NC, ND, FC, ...).
        #[arg(long = "type")]
        doc_type: String,
        /// Fiscal year.
        #[arg(long)]
        year: i32,
        /// Issuing company. A new identifier is generated when omitted.
        #[arg(long)]
        company: Option<CompanyId>,
        /// Prefix; defaults to the document type code.
        #[arg(long)]
        prefix: Option<String>,
        #[arg(long, default_value_t = DEFAULT_MAX_NUMBER)]
        max_number: u64,
    },

    /// Open the `year` successor of a series and close it to new numbers.
    Rollover {
        #[arg(long, value_parser = parse_series_id)]
        series: SeriesId,
        #[arg(long)]
        year: i32,
    },

    /// Stop certification on a series.
    Halt {
        #[arg(long, value_parser = parse_series_id)]
        series: SeriesId,
        #[arg(long)]
        reason: String,
    },

    /// Re-verify a halted series and lift the halt.
    Resume {
        #[arg(long, value_parser = parse_series_id)]
        series: SeriesId,
    },

    /// List all series.
    List,
}

pub(crate) fn parse_series_id(s: &str) -> Result<SeriesId, FiscoError> {
    SeriesId::new(s)
}

/// Execute a series subcommand.
pub fn run_series(args: &SeriesArgs, config: FiscalConfiguration) -> Result<u8> {
    let ledger = args
        .ledger
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("--ledger (or FISCO_LEDGER) is required"))?;

    match &args.command {
        SeriesCommand::Open {
            doc_type,
            year,
            company,
            prefix,
            max_number,
        } => {
            let doc_type = DocumentType::from_code(doc_type)?;
            let company = company.unwrap_or_default();
            let prefix = prefix.clone().unwrap_or_else(|| doc_type.code().to_string());
            let series =
                DocumentSeries::new(prefix, doc_type, *year, company)?.with_max_number(*max_number);
            let id = series.id.clone();
            with_ledger(ledger, config, |certifier| Ok(certifier.registry().open(series)?))?;
            println!("OK: series {id} opened for {company}");
        }
        SeriesCommand::Rollover { series, year } => {
            let next = with_ledger(ledger, config, |certifier| {
                Ok(certifier.registry().rollover(series, *year)?)
            })?;
            println!("OK: {series} closed, {next} opened");
        }
        SeriesCommand::Halt { series, reason } => {
            with_ledger(ledger, config, |certifier| {
                Ok(certifier.registry().halt(series, reason)?)
            })?;
            println!("OK: {series} halted");
        }
        SeriesCommand::Resume { series } => {
            let report = with_ledger(ledger, config, |certifier| {
                Ok(resume_after_audit(certifier.registry(), certifier.book(), series)?)
            })?;
            println!("OK: {series} resumed after verifying {} documents", report.verified);
        }
        SeriesCommand::List => {
            let listed = with_ledger(ledger, config, |certifier| Ok(certifier.registry().list()))?;
            print_json(&listed)?;
        }
    }
    Ok(0)
}
