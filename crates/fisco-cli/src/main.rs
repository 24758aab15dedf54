//! # fisco CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use fisco_cli::document::{
    run_cancel, run_certify, run_discard, run_pay, run_totals, CancelArgs, CertifyArgs, PayArgs,
    TotalsArgs,
};
use fisco_cli::load_config;
use fisco_cli::report::{run_audit_export, run_vat, run_withholding, AuditExportArgs, PeriodArgs};
use fisco_cli::series::{run_series, SeriesArgs};
use fisco_cli::verify::{run_verify, VerifyArgs};

/// Fiscal document certification and numbering.
///
/// Computes document totals, certifies documents into gap-free hash-chained
/// series, records payments and cancellations, verifies chains, and
/// produces withholding, VAT and audit-file reports.
#[derive(Parser, Debug)]
#[command(name = "fisco", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Fiscal configuration file (YAML or JSON).
    #[arg(long, env = "FISCO_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compute totals for a set of lines without certifying.
    Totals(TotalsArgs),

    /// Numbering series management (open, rollover, halt, resume, list).
    Series(SeriesArgs),

    /// Draft and certify documents from a payload file.
    Certify(CertifyArgs),

    /// Register a payment against a certified document.
    Pay(PayArgs),

    /// Cancel a certified document.
    Cancel(CancelArgs),

    /// Discard a draft.
    Discard(CancelArgs),

    /// Re-verify series hash chains.
    Verify(VerifyArgs),

    /// Monthly withholding maps (sales and purchases).
    Withholding(PeriodArgs),

    /// Monthly VAT summary.
    Vat(PeriodArgs),

    /// Export audit-file records.
    #[command(name = "audit-export")]
    AuditExport(AuditExportArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    tracing::debug!("fisco CLI starting");

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{e:#}");
            return ExitCode::from(2);
        }
    };

    let result = match cli.command {
        Commands::Totals(args) => run_totals(&args, &config),
        Commands::Series(args) => run_series(&args, config),
        Commands::Certify(args) => run_certify(&args, config),
        Commands::Pay(args) => run_pay(&args, config),
        Commands::Cancel(args) => run_cancel(&args, config),
        Commands::Discard(args) => run_discard(&args, config),
        Commands::Verify(args) => run_verify(&args, config),
        Commands::Withholding(args) => run_withholding(&args, config),
        Commands::Vat(args) => run_vat(&args, config),
        Commands::AuditExport(args) => run_audit_export(&args, config),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
