//! # Document Subcommands
//!
//! `totals`, `certify`, `pay`, `cancel` and `discard`.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use clap::Args;
use fisco_core::{CompanyId, Decimal, DocumentId, DocumentType, LineItem, Nif, PartyId, PartySnapshot, SeriesId};
use fisco_series::{CertifiedDocument, Certifier};
use fisco_state::DocumentHeader;
use fisco_tax::{compute_totals, FiscalConfiguration};
use serde::Deserialize;

use crate::ledger::with_ledger;
use crate::{print_json, read_payload};

// ─── Payloads ───────────────────────────────────────────────────────

/// Counterparty in a payload.
#[derive(Debug, Clone, Deserialize)]
pub struct PartyPayload {
    #[serde(default)]
    pub party_id: Option<PartyId>,
    pub name: String,
    pub nif: String,
}

/// A document to draft and certify.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentPayload {
    pub doc_type: String,
    pub series_id: String,
    /// Defaults to the series' company.
    #[serde(default)]
    pub company_id: Option<CompanyId>,
    pub issue_date: NaiveDate,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    /// Final consumer when absent.
    #[serde(default)]
    pub party: Option<PartyPayload>,
    pub lines: Vec<LineItem>,
    #[serde(default)]
    pub global_discount: Decimal,
    /// Origin of a credit or debit note.
    #[serde(default)]
    pub derived_from: Option<DocumentId>,
}

/// Lines to total without touching a ledger.
#[derive(Debug, Clone, Deserialize)]
pub struct TotalsPayload {
    pub doc_type: String,
    pub lines: Vec<LineItem>,
    #[serde(default)]
    pub global_discount: Decimal,
}

/// One document or a batch.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Batch {
    Many(Vec<DocumentPayload>),
    One(Box<DocumentPayload>),
}

impl Batch {
    fn into_vec(self) -> Vec<DocumentPayload> {
        match self {
            Self::Many(v) => v,
            Self::One(one) => vec![*one],
        }
    }
}

// ─── Arguments ──────────────────────────────────────────────────────

/// Arguments for `fisco totals`.
#[derive(Args, Debug)]
pub struct TotalsArgs {
    /// Payload with `doc_type`, `lines` and optional `global_discount`.
    pub input: PathBuf,
}

/// Arguments for `fisco certify`.
#[derive(Args, Debug)]
pub struct CertifyArgs {
    /// Ledger file.
    #[arg(long, env = "FISCO_LEDGER")]
    pub ledger: PathBuf,
    /// Document payload or list of payloads (JSON or YAML).
    pub input: PathBuf,
}

/// Arguments for `fisco pay`.
#[derive(Args, Debug)]
pub struct PayArgs {
    #[arg(long, env = "FISCO_LEDGER")]
    pub ledger: PathBuf,
    #[arg(long)]
    pub document: DocumentId,
    #[arg(long)]
    pub amount: Decimal,
    /// Payment date (YYYY-MM-DD).
    #[arg(long)]
    pub date: NaiveDate,
}

/// Arguments for `fisco cancel` and `fisco discard`.
#[derive(Args, Debug)]
pub struct CancelArgs {
    #[arg(long, env = "FISCO_LEDGER")]
    pub ledger: PathBuf,
    #[arg(long)]
    pub document: DocumentId,
    #[arg(long)]
    pub reason: String,
}

// ─── Handlers ───────────────────────────────────────────────────────

pub fn run_totals(args: &TotalsArgs, config: &FiscalConfiguration) -> Result<u8> {
    let payload: TotalsPayload = read_payload(&args.input)?;
    let doc_type = DocumentType::from_code(&payload.doc_type)?;
    let computation = compute_totals(&payload.lines, doc_type, payload.global_discount, config)?;
    print_json(&computation)?;
    Ok(0)
}

pub fn run_certify(args: &CertifyArgs, config: FiscalConfiguration) -> Result<u8> {
    let batch: Batch = read_payload(&args.input)?;
    let certified = with_ledger(&args.ledger, config, |certifier| {
        batch
            .into_vec()
            .into_iter()
            .enumerate()
            .map(|(i, payload)| {
                certify_payload(certifier, payload).with_context(|| format!("document #{}", i + 1))
            })
            .collect::<Result<Vec<_>>>()
    })?;
    print_json(&certified)?;
    Ok(0)
}

pub fn run_pay(args: &PayArgs, config: FiscalConfiguration) -> Result<u8> {
    let status = with_ledger(&args.ledger, config, |certifier| {
        Ok(certifier
            .book()
            .register_payment(&args.document, args.amount, args.date)?)
    })?;
    println!("OK: {} is {status}", args.document);
    Ok(0)
}

pub fn run_cancel(args: &CancelArgs, config: FiscalConfiguration) -> Result<u8> {
    with_ledger(&args.ledger, config, |certifier| {
        Ok(certifier.cancel(&args.document, &args.reason)?)
    })?;
    println!("OK: {} cancelled", args.document);
    Ok(0)
}

pub fn run_discard(args: &CancelArgs, config: FiscalConfiguration) -> Result<u8> {
    with_ledger(&args.ledger, config, |certifier| {
        Ok(certifier.book().discard(&args.document, &args.reason)?)
    })?;
    println!("OK: draft {} discarded", args.document);
    Ok(0)
}

/// Draft `payload` (derived when it names an origin) and certify it.
pub fn certify_payload(certifier: &Certifier, payload: DocumentPayload) -> Result<CertifiedDocument> {
    let doc_type = DocumentType::from_code(&payload.doc_type)?;
    let series_id = SeriesId::new(&payload.series_id)?;
    let company_id = match payload.company_id {
        Some(id) => id,
        None => certifier.registry().get(&series_id)?.company_id,
    };
    let party = match payload.party {
        Some(p) => PartySnapshot::new(p.party_id, p.name, Nif::new(&p.nif)?),
        None => PartySnapshot::final_consumer(),
    };
    let mut header = DocumentHeader::new(doc_type, series_id, company_id, payload.issue_date, party);
    header.due_date = payload.due_date;
    header.global_discount = payload.global_discount;
    header.currency = certifier.config().currency.clone();

    let id = match payload.derived_from {
        Some(origin) => certifier.draft_derived(&origin, header, payload.lines)?,
        None if doc_type.requires_origin() => {
            return Err(anyhow!("{} documents must name the document they derive from", doc_type.code()));
        }
        None => certifier.draft(header, payload.lines)?,
    };
    Ok(certifier.certify(&id)?)
}
