//! # Store Records
//!
//! Documents arrive from storage as loosely-shaped JSON rows. [`StoreRecord`]
//! accepts that shape (including the legacy Portuguese column names) and
//! [`FiscalDocument::from_record`] turns it into the typed aggregate in one
//! validating step. A record that is internally inconsistent is rejected,
//! never repaired.
//!
//! Amounts may be JSON numbers or strings. Numbers may be integers, numeric
//! strings, display forms such as `FT/2025/12`, or the legacy placeholder
//! `---` meaning "not numbered".

use chrono::{NaiveDate, NaiveTime};
use fisco_core::{
    CompanyId, ContentDigest, Currency, Decimal, DocumentId, DocumentType,
    LineItem, Nif, PartyId, PartySnapshot, SeriesId, Timestamp, Totals,
};
use fisco_tax::RateSummary;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::document::{
    Certification, Derivation, DocumentHeader, FiscalDocument, Payment, RestoredDocument,
};
use crate::lifecycle::DocumentStatus;

/// Errors raised while mapping a store record.
#[derive(Error, Debug)]
pub enum RecordError {
    /// The record is not valid JSON for the expected shape.
    #[error("malformed store record: {0}")]
    Json(#[from] serde_json::Error),

    /// A field holds a value of the wrong form.
    #[error("record {document_id}: field {field}: {reason}")]
    Malformed {
        document_id: DocumentId,
        field: &'static str,
        reason: String,
    },

    /// Fields contradict each other.
    #[error("record {document_id} is inconsistent: {reason}")]
    Inconsistent {
        document_id: DocumentId,
        reason: String,
    },
}

/// A payment row inside a store record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub amount: Decimal,
    pub date: NaiveDate,
}

/// Persisted shape of a fiscal document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreRecord {
    pub id: DocumentId,
    #[serde(alias = "tipo_fatura", alias = "type")]
    pub doc_type: String,
    #[serde(alias = "serie_id")]
    pub series_id: String,
    #[serde(alias = "empresa_id")]
    pub company_id: CompanyId,
    #[serde(default, alias = "numero_fatura")]
    pub number: Value,
    #[serde(alias = "data_fatura", alias = "date")]
    pub issue_date: NaiveDate,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub accounting_date: Option<NaiveDate>,
    #[serde(default, alias = "cliente_id", alias = "fornecedor_id")]
    pub party_id: Option<PartyId>,
    #[serde(alias = "cliente_nome", alias = "fornecedor_nome")]
    pub party_name: String,
    #[serde(alias = "cliente_nif", alias = "fornecedor_nif")]
    pub party_nif: String,
    #[serde(default)]
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub global_discount: Option<Decimal>,
    #[serde(default)]
    pub subtotal: Option<Decimal>,
    #[serde(default, alias = "iva")]
    pub tax_amount: Option<Decimal>,
    #[serde(default, alias = "retencao")]
    pub withholding_amount: Option<Decimal>,
    pub total: Decimal,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub exchange_rate: Option<Decimal>,
    pub status: String,
    #[serde(default)]
    pub is_certified: Option<bool>,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub previous_hash: Option<String>,
    #[serde(default)]
    pub certified_at: Option<Timestamp>,
    /// Per-rate breakdown frozen at certification. Empty on legacy rows.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tax_lines: Vec<RateSummary>,
    #[serde(default)]
    pub payments: Vec<PaymentRecord>,
    #[serde(default)]
    pub derived_from: Option<DocumentId>,
    #[serde(default)]
    pub cancellation_reason: Option<String>,
}

impl StoreRecord {
    /// Parse a record from a JSON value.
    pub fn from_value(value: Value) -> Result<Self, RecordError> {
        Ok(serde_json::from_value(value)?)
    }
}

fn parse_status(s: &str) -> Option<DocumentStatus> {
    let norm = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
    Some(match norm.as_str() {
        "draft" | "rascunho" => DocumentStatus::Draft,
        "certified" | "pending" | "pendente" | "emitida" | "emitido" => DocumentStatus::Certified,
        "partially_paid" | "parcialmente_pago" | "parcial" => DocumentStatus::PartiallyPaid,
        "paid" | "pago" | "paga" => DocumentStatus::Paid,
        "cancelled" | "canceled" | "anulado" | "anulada" => DocumentStatus::Cancelled,
        _ => return None,
    })
}

fn parse_number(value: &Value) -> Result<Option<u64>, String> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => match n.as_u64() {
            Some(0) | None => Err(format!("{n} is not a positive integer")),
            Some(v) => Ok(Some(v)),
        },
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() || s.chars().all(|c| c == '-') {
                return Ok(None);
            }
            let tail = s.rsplit('/').next().unwrap_or(s);
            match tail.parse::<u64>() {
                Ok(0) | Err(_) => Err(format!("{s:?} does not end in a positive integer")),
                Ok(v) => Ok(Some(v)),
            }
        }
        other => Err(format!("unexpected value {other}")),
    }
}

impl FiscalDocument {
    /// Validate a store record into a document.
    ///
    /// # Errors
    ///
    /// [`RecordError::Malformed`] for fields of the wrong form,
    /// [`RecordError::Inconsistent`] when status, number, hash, payments or
    /// totals contradict each other.
    pub fn from_record(record: StoreRecord) -> Result<Self, RecordError> {
        let id = record.id;
        let malformed = |field: &'static str, reason: String| RecordError::Malformed {
            document_id: id,
            field,
            reason,
        };
        let inconsistent = |reason: String| RecordError::Inconsistent {
            document_id: id,
            reason,
        };

        let doc_type = DocumentType::from_code(&record.doc_type)
            .map_err(|e| malformed("doc_type", e.to_string()))?;
        let series_id =
            SeriesId::new(&record.series_id).map_err(|e| malformed("series_id", e.to_string()))?;
        let nif = Nif::new(&record.party_nif).map_err(|e| malformed("party_nif", e.to_string()))?;
        let currency = match &record.currency {
            Some(c) => Currency::new(c).map_err(|e| malformed("currency", e.to_string()))?,
            None => Currency::aoa(),
        };
        let status = parse_status(&record.status)
            .ok_or_else(|| malformed("status", format!("unknown status {:?}", record.status)))?;
        let number = parse_number(&record.number).map_err(|r| malformed("number", r))?;

        let hash = record.hash.as_deref().map(str::trim).filter(|h| !h.is_empty());
        if let Some(h) = hash {
            ContentDigest::from_hex(h).map_err(|e| malformed("hash", e.to_string()))?;
        }
        if let Some(flag) = record.is_certified {
            if flag != hash.is_some() {
                return Err(inconsistent(format!(
                    "is_certified is {flag} but hash is {}",
                    if hash.is_some() { "present" } else { "absent" }
                )));
            }
        }

        let certification = match (number, hash) {
            (None, None) => None,
            (Some(number), Some(hash)) => {
                let previous_hash = record
                    .previous_hash
                    .as_deref()
                    .map(str::trim)
                    .filter(|h| !h.is_empty())
                    .ok_or_else(|| inconsistent("certified record has no previous_hash".into()))?;
                ContentDigest::from_hex(previous_hash)
                    .map_err(|e| malformed("previous_hash", e.to_string()))?;
                let certified_at = match record.certified_at {
                    Some(ts) => ts,
                    None => Timestamp::from_utc(record.issue_date.and_time(NaiveTime::MIN).and_utc()),
                };
                Some(Certification {
                    number,
                    hash: hash.to_ascii_lowercase(),
                    previous_hash: previous_hash.to_ascii_lowercase(),
                    certified_at,
                    tax_lines: record.tax_lines.clone(),
                })
            }
            (Some(_), None) => return Err(inconsistent("number without hash".into())),
            (None, Some(_)) => return Err(inconsistent("hash without number".into())),
        };

        match (status, certification.is_some()) {
            (DocumentStatus::Draft, true) => {
                return Err(inconsistent("draft holds a number and hash".into()))
            }
            (DocumentStatus::Certified | DocumentStatus::PartiallyPaid | DocumentStatus::Paid, false) => {
                return Err(inconsistent(format!("status {status} without certification")))
            }
            _ => {}
        }

        let tax_amount = record.tax_amount.unwrap_or(Decimal::ZERO);
        let subtotal = match record.subtotal {
            Some(subtotal) => subtotal,
            None => record.total.checked_sub(tax_amount).ok_or_else(|| {
                inconsistent(format!("total {} minus tax {tax_amount} overflows", record.total))
            })?,
        };
        if subtotal.checked_add(tax_amount) != Some(record.total) {
            return Err(inconsistent(format!(
                "subtotal {subtotal} + tax {tax_amount} != total {}",
                record.total
            )));
        }
        let totals = Totals {
            subtotal,
            tax_amount,
            withholding_amount: record.withholding_amount.unwrap_or(Decimal::ZERO),
            total: record.total,
        };

        let mut payments: Vec<Payment> = record
            .payments
            .iter()
            .map(|p| Payment {
                amount: p.amount,
                date: p.date,
            })
            .collect();
        if payments.iter().any(|p| p.amount <= Decimal::ZERO) {
            return Err(malformed("payments", "non-positive payment amount".into()));
        }
        let paid = payments
            .iter()
            .try_fold(Decimal::ZERO, |acc, p| acc.checked_add(p.amount))
            .ok_or_else(|| inconsistent("payments overflow".into()))?;
        if paid > totals.total {
            return Err(inconsistent(format!("payments {paid} exceed total {}", totals.total)));
        }
        match status {
            // Legacy rows mark settlement without a payment list.
            DocumentStatus::Paid if payments.is_empty() => payments.push(Payment {
                amount: totals.total,
                date: record.issue_date,
            }),
            DocumentStatus::Paid if paid != totals.total => {
                return Err(inconsistent(format!("paid status with payments {paid} of {}", totals.total)))
            }
            DocumentStatus::PartiallyPaid if paid.is_zero() || paid >= totals.total => {
                return Err(inconsistent(format!("partially paid status with payments {paid} of {}", totals.total)))
            }
            DocumentStatus::Draft | DocumentStatus::Certified if !paid.is_zero() => {
                return Err(inconsistent(format!("status {status} with payments {paid}")))
            }
            _ => {}
        }

        let derived_from = record.derived_from.map(|origin_id| Derivation {
            origin_id,
            effect: doc_type.effect(),
        });
        if derived_from.map(|d| d.origin_id) == Some(id) {
            return Err(inconsistent("document derives from itself".into()));
        }

        let header = DocumentHeader {
            id,
            doc_type,
            series_id,
            company_id: record.company_id,
            issue_date: record.issue_date,
            due_date: record.due_date,
            accounting_date: record.accounting_date,
            party: PartySnapshot::new(record.party_id, record.party_name, nif),
            currency,
            exchange_rate: record.exchange_rate.unwrap_or(Decimal::ONE),
            global_discount: record.global_discount.unwrap_or(Decimal::ZERO),
        };

        Ok(Self::restore(RestoredDocument {
            header,
            lines: record.items,
            totals,
            status,
            certification,
            payments,
            derived_from,
            cancellation_reason: record.cancellation_reason,
        }))
    }

    /// Parse and validate a JSON row.
    pub fn from_json(value: Value) -> Result<Self, RecordError> {
        Self::from_record(StoreRecord::from_value(value)?)
    }

    /// Persisted shape of this document.
    pub fn to_record(&self) -> StoreRecord {
        let header = self.header();
        let cert = self.certification();
        StoreRecord {
            id: header.id,
            doc_type: header.doc_type.code().to_string(),
            series_id: header.series_id.to_string(),
            company_id: header.company_id,
            number: cert.map_or(Value::Null, |c| Value::from(c.number)),
            issue_date: header.issue_date,
            due_date: header.due_date,
            accounting_date: header.accounting_date,
            party_id: header.party.party_id,
            party_name: header.party.name.clone(),
            party_nif: header.party.nif.to_string(),
            items: self.lines().to_vec(),
            global_discount: Some(header.global_discount),
            subtotal: Some(self.totals().subtotal),
            tax_amount: Some(self.totals().tax_amount),
            withholding_amount: Some(self.totals().withholding_amount),
            total: self.totals().total,
            currency: Some(header.currency.to_string()),
            exchange_rate: Some(header.exchange_rate),
            status: self.status().as_str().to_ascii_lowercase(),
            is_certified: Some(self.is_certified()),
            hash: cert.map(|c| c.hash.clone()),
            previous_hash: cert.map(|c| c.previous_hash.clone()),
            certified_at: cert.map(|c| c.certified_at),
            tax_lines: cert.map(|c| c.tax_lines.clone()).unwrap_or_default(),
            payments: self
                .payments()
                .iter()
                .map(|p| PaymentRecord {
                    amount: p.amount,
                    date: p.date,
                })
                .collect(),
            derived_from: self.derived_from().map(|d| d.origin_id),
            cancellation_reason: self.cancellation_reason().map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::str::FromStr;

    const HASH: &str = "8d11bc9c4ce4187c1a711f5e592acba85694488bd67c1335ff24d627dca7445b";
    const GENESIS: &str = "0000000000000000000000000000000000000000000000000000000000000000";

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn legacy_row() -> Value {
        json!({
            "id": "7b0c9a52-6f4e-4b8e-9a57-0d7f3b1e2c11",
            "tipo_fatura": "FT",
            "serie_id": "FT/2025",
            "empresa_id": "1f0e7c1c-3c55-4a8f-8d3c-6a3c4b2d1e00",
            "numero_fatura": "FT/2025/1",
            "data_fatura": "2025-03-15",
            "cliente_nome": "Cliente A",
            "cliente_nif": "5000000001",
            "total": 1140,
            "iva": 140,
            "status": "Pago",
            "hash": HASH,
            "previous_hash": GENESIS
        })
    }

    #[test]
    fn test_legacy_row_maps() {
        let doc = FiscalDocument::from_json(legacy_row()).unwrap();
        assert_eq!(doc.doc_type(), DocumentType::Invoice);
        assert_eq!(doc.number(), Some(1));
        assert_eq!(doc.totals().subtotal, d("1000"));
        assert_eq!(doc.status(), DocumentStatus::Paid);
        assert_eq!(doc.amount_paid(), d("1140"));
        assert!(doc.is_certified());
        assert_eq!(doc.header().currency.as_str(), "AOA");
    }

    #[test]
    fn test_unnumbered_draft_row() {
        let mut row = legacy_row();
        row["numero_fatura"] = json!("---");
        row["hash"] = json!("");
        row["status"] = json!("rascunho");
        row.as_object_mut().unwrap().remove("previous_hash");
        let doc = FiscalDocument::from_json(row).unwrap();
        assert_eq!(doc.status(), DocumentStatus::Draft);
        assert_eq!(doc.number(), None);
        assert!(!doc.is_certified());
    }

    #[test]
    fn test_number_without_hash_rejected() {
        let mut row = legacy_row();
        row["hash"] = Value::Null;
        assert!(matches!(FiscalDocument::from_json(row), Err(RecordError::Inconsistent { .. })));
    }

    #[test]
    fn test_certified_flag_must_match_hash() {
        let mut row = legacy_row();
        row["is_certified"] = json!(false);
        assert!(matches!(FiscalDocument::from_json(row), Err(RecordError::Inconsistent { .. })));
    }

    #[test]
    fn test_bad_hash_rejected() {
        let mut row = legacy_row();
        row["hash"] = json!("not-a-hash");
        assert!(matches!(
            FiscalDocument::from_json(row),
            Err(RecordError::Malformed { field: "hash", .. })
        ));
    }

    #[test]
    fn test_certified_status_without_hash_rejected() {
        let mut row = legacy_row();
        row["status"] = json!("pendente");
        row["hash"] = Value::Null;
        row["numero_fatura"] = Value::Null;
        assert!(matches!(FiscalDocument::from_json(row), Err(RecordError::Inconsistent { .. })));
    }

    #[test]
    fn test_unknown_status_and_type_rejected() {
        let mut row = legacy_row();
        row["status"] = json!("archived");
        assert!(matches!(FiscalDocument::from_json(row), Err(RecordError::Malformed { field: "status", .. })));
        let mut row = legacy_row();
        row["tipo_fatura"] = json!("XX");
        assert!(matches!(FiscalDocument::from_json(row), Err(RecordError::Malformed { field: "doc_type", .. })));
    }

    #[test]
    fn test_totals_must_add_up() {
        let mut row = legacy_row();
        row["subtotal"] = json!("999.00");
        assert!(matches!(FiscalDocument::from_json(row), Err(RecordError::Inconsistent { .. })));
    }

    #[test]
    fn test_partial_payment_consistency() {
        let mut row = legacy_row();
        row["status"] = json!("partially_paid");
        row["payments"] = json!([{"amount": "140", "date": "2025-03-20"}]);
        let doc = FiscalDocument::from_json(row.clone()).unwrap();
        assert_eq!(doc.outstanding(), d("1000"));

        row["payments"] = json!([{"amount": "1140", "date": "2025-03-20"}]);
        assert!(matches!(FiscalDocument::from_json(row), Err(RecordError::Inconsistent { .. })));
    }

    #[test]
    fn test_missing_field_is_json_error() {
        let mut row = legacy_row();
        row.as_object_mut().unwrap().remove("total");
        assert!(matches!(FiscalDocument::from_json(row), Err(RecordError::Json(_))));
    }

    #[test]
    fn test_record_roundtrip_preserves_state() {
        let doc = FiscalDocument::from_json(legacy_row()).unwrap();
        let value = serde_json::to_value(doc.to_record()).unwrap();
        let back = FiscalDocument::from_json(value).unwrap();
        assert_eq!(back.number(), doc.number());
        assert_eq!(back.hash(), doc.hash());
        assert_eq!(back.totals(), doc.totals());
        assert_eq!(back.status(), doc.status());
        assert_eq!(back.payments(), doc.payments());
    }

    #[test]
    fn test_certified_tax_lines_survive_roundtrip() {
        let mut row = legacy_row();
        row["tax_lines"] = json!([{"tax_rate_code": "NOR", "rate": "0.14", "base": "1000", "tax": "140"}]);
        let doc = FiscalDocument::from_json(row).unwrap();
        let lines = &doc.certification().unwrap().tax_lines;
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].rate, d("0.14"));

        let back = FiscalDocument::from_json(serde_json::to_value(doc.to_record()).unwrap()).unwrap();
        assert_eq!(back.certification().unwrap().tax_lines, *lines);
    }

    #[test]
    fn test_overflowing_amounts_are_inconsistent() {
        let max = "79228162514264337593543950335";
        let mut row = legacy_row();
        row["status"] = json!("partially_paid");
        row["payments"] = json!([
            {"amount": max, "date": "2025-03-20"},
            {"amount": max, "date": "2025-03-21"}
        ]);
        assert!(matches!(FiscalDocument::from_json(row), Err(RecordError::Inconsistent { .. })));

        let mut row = legacy_row();
        row["total"] = json!(format!("-{max}"));
        row["iva"] = json!("1");
        assert!(matches!(FiscalDocument::from_json(row), Err(RecordError::Inconsistent { .. })));
    }
}
