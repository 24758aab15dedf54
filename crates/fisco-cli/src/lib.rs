//! # fisco-cli: Command-Line Interface
//!
//! The `fisco` binary. State lives in a ledger file (JSON) holding the
//! series rows and document rows; every mutating command loads it,
//! applies the change through the engine and writes it back.
//!
//! ## Subcommands
//!
//! - `fisco totals`: compute totals for a document payload.
//! - `fisco series`: open, roll over, halt, resume and list series.
//! - `fisco certify`: draft and certify documents from a payload file.
//! - `fisco pay` / `fisco cancel`: payments and cancellations.
//! - `fisco verify`: re-verify series hash chains.
//! - `fisco withholding` / `fisco vat`: monthly reports.
//! - `fisco audit-export`: audit-file records.
//!
//! Handlers return an exit code: `0` success, `1` a failed check (for
//! example a broken chain). Errors propagate as `anyhow::Error`.

pub mod document;
pub mod ledger;
pub mod report;
pub mod series;
pub mod verify;

use std::path::Path;

use anyhow::{Context, Result};
use fisco_core::Nif;
use fisco_tax::FiscalConfiguration;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Load the fiscal configuration from `path`, or the standard table when
/// no path is given.
pub fn load_config(path: Option<&Path>) -> Result<FiscalConfiguration> {
    match path {
        Some(path) => FiscalConfiguration::load(path)
            .with_context(|| format!("loading configuration {}", path.display())),
        None => {
            tracing::warn!("no configuration given; using the standard rate table");
            Ok(FiscalConfiguration::angola_default(
                Nif::final_consumer(),
                "Contribuinte",
            ))
        }
    }
}

/// Read a JSON or YAML payload, chosen by file extension.
pub fn read_payload<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    if is_yaml {
        serde_yaml::from_str(&content).with_context(|| format!("parsing YAML {}", path.display()))
    } else {
        serde_json::from_str(&content).with_context(|| format!("parsing JSON {}", path.display()))
    }
}

/// Print `value` as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
