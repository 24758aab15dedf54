//! # Audit-File Records
//!
//! Projects each certified document onto the fields the tax authority's
//! audit file needs: printed number, status, hash, dates, counterparty tax
//! id, totals, and tax per rate. Cancelled documents are exported with
//! status `A`, since their numbers stay in the series.
//!
//! Tax per rate is the breakdown frozen at certification. Rows persisted
//! without one are priced again with the current table, and the result is
//! exported only if it reproduces the frozen tax amount.

use chrono::NaiveDate;
use fisco_core::{Currency, Decimal, DocumentId, FiscalPeriod, TaxRateCode};
use fisco_state::{DocumentStatus, FiscalDocument};
use fisco_tax::{compute_totals, FiscalConfiguration, RateSummary, TaxError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::display_number;

#[derive(Error, Debug)]
pub enum ReportError {
    /// A certified document without a stored breakdown no longer computes
    /// under the current rate table.
    #[error("document {document_id}: {source}")]
    Tax {
        document_id: DocumentId,
        #[source]
        source: TaxError,
    },

    /// Repricing a document without a stored breakdown does not give the
    /// tax it was certified with.
    #[error("document {document_id}: current rates give tax {computed}, certified tax is {certified}")]
    BreakdownMismatch {
        document_id: DocumentId,
        computed: Decimal,
        certified: Decimal,
    },
}

/// Audit-file status of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditStatus {
    /// Normal.
    #[serde(rename = "N")]
    Normal,
    /// Cancelled ("anulado").
    #[serde(rename = "A")]
    Cancelled,
}

impl AuditStatus {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Normal => "N",
            Self::Cancelled => "A",
        }
    }
}

/// Tax on one rate within a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditTaxLine {
    pub tax_rate_code: TaxRateCode,
    pub rate: Decimal,
    pub base: Decimal,
    pub tax: Decimal,
}

/// One certified document as exported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub document_number: String,
    pub status: AuditStatus,
    pub hash: String,
    pub period: FiscalPeriod,
    pub issue_date: NaiveDate,
    pub system_entry_date: String,
    pub document_type: String,
    pub party_tax_id: String,
    pub party_name: String,
    pub net_total: Decimal,
    pub tax_payable: Decimal,
    pub gross_total: Decimal,
    pub withholding: Decimal,
    pub currency: Currency,
    pub tax_lines: Vec<AuditTaxLine>,
    pub source_id: DocumentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_id: Option<DocumentId>,
}

/// Audit record of one document; `None` for documents never certified.
pub fn audit_record(
    doc: &FiscalDocument,
    config: &FiscalConfiguration,
) -> Result<Option<AuditRecord>, ReportError> {
    let Some(certification) = doc.certification() else {
        return Ok(None);
    };
    let by_rate = if certification.tax_lines.is_empty() {
        legacy_breakdown(doc, config)?
    } else {
        certification.tax_lines.clone()
    };

    let status = if doc.status() == DocumentStatus::Cancelled {
        AuditStatus::Cancelled
    } else {
        AuditStatus::Normal
    };
    let totals = doc.totals();
    Ok(Some(AuditRecord {
        document_number: display_number(doc),
        status,
        hash: certification.hash.clone(),
        period: doc.period(),
        issue_date: doc.header().issue_date,
        system_entry_date: certification.certified_at.to_iso8601(),
        document_type: doc.doc_type().code().to_string(),
        party_tax_id: doc.header().party.nif.to_string(),
        party_name: doc.header().party.name.clone(),
        net_total: totals.subtotal,
        tax_payable: totals.tax_amount,
        gross_total: totals.total,
        withholding: totals.withholding_amount,
        currency: doc.header().currency.clone(),
        tax_lines: by_rate
            .into_iter()
            .map(|r| AuditTaxLine {
                tax_rate_code: r.tax_rate_code,
                rate: r.rate,
                base: r.base,
                tax: r.tax,
            })
            .collect(),
        source_id: doc.id(),
        origin_id: doc.derived_from().map(|d| d.origin_id),
    }))
}

fn legacy_breakdown(
    doc: &FiscalDocument,
    config: &FiscalConfiguration,
) -> Result<Vec<RateSummary>, ReportError> {
    let computation = compute_totals(
        doc.lines(),
        doc.doc_type(),
        doc.header().global_discount,
        config,
    )
    .map_err(|source| ReportError::Tax {
        document_id: doc.id(),
        source,
    })?;
    let certified = doc.totals().tax_amount;
    if computation.totals.tax_amount != certified {
        return Err(ReportError::BreakdownMismatch {
            document_id: doc.id(),
            computed: computation.totals.tax_amount,
            certified,
        });
    }
    Ok(computation.by_rate)
}

/// Audit records of every certified document, optionally limited to one
/// period, ordered by type, series and number.
pub fn audit_records(
    documents: &[FiscalDocument],
    config: &FiscalConfiguration,
    period: Option<FiscalPeriod>,
) -> Result<Vec<AuditRecord>, ReportError> {
    let mut selected: Vec<&FiscalDocument> = documents
        .iter()
        .filter(|doc| doc.is_certified())
        .filter(|doc| period.map_or(true, |p| p.contains(doc.header().issue_date)))
        .collect();
    selected.sort_by(|a, b| {
        (a.doc_type().code(), a.series_id(), a.number())
            .cmp(&(b.doc_type().code(), b.series_id(), b.number()))
    });

    let mut records = Vec::with_capacity(selected.len());
    for doc in selected {
        if let Some(record) = audit_record(doc, config)? {
            records.push(record);
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fisco_core::{CompanyId, DocumentType, LineItem, Nif, PartySnapshot, SeriesId, Timestamp};
    use fisco_state::{Certification, DocumentHeader};
    use std::str::FromStr;

    fn config() -> FiscalConfiguration {
        FiscalConfiguration::angola_default(Nif::new("5417000001").unwrap(), "Exemplo Lda")
    }

    fn doc(number: Option<u64>) -> FiscalDocument {
        let header = DocumentHeader::new(
            DocumentType::Invoice,
            SeriesId::new("FT/2025").unwrap(),
            CompanyId::new(),
            NaiveDate::from_ymd_opt(2025, 3, 15).unwrap(),
            PartySnapshot::new(None, "Cliente", Nif::new("5000000001").unwrap()),
        );
        let lines = vec![
            LineItem::new("A", Decimal::ONE, Decimal::from(1000), TaxRateCode::new("NOR").unwrap()),
            LineItem::new("B", Decimal::ONE, Decimal::from(100), TaxRateCode::new("ISE").unwrap()),
        ];
        let mut doc = FiscalDocument::draft(header, lines, &config()).unwrap();
        if let Some(number) = number {
            let priced = doc.price(&config()).unwrap();
            doc.apply_certification(
                priced.totals,
                Certification {
                    number,
                    hash: "b".repeat(64),
                    previous_hash: "0".repeat(64),
                    certified_at: Timestamp::now(),
                    tax_lines: priced.by_rate,
                },
            )
            .unwrap();
        }
        doc
    }

    /// Certified the way rows persisted before breakdowns were stored are.
    fn legacy_doc() -> FiscalDocument {
        let mut record = doc(Some(3)).to_record();
        record.tax_lines.clear();
        FiscalDocument::from_record(record).unwrap()
    }

    fn nor(record: &AuditRecord) -> &AuditTaxLine {
        record.tax_lines.iter().find(|l| l.tax_rate_code.as_str() == "NOR").unwrap()
    }

    #[test]
    fn test_record_fields() {
        let record = audit_record(&doc(Some(7)), &config()).unwrap().unwrap();
        assert_eq!(record.document_number, "FT/2025/7");
        assert_eq!(record.status, AuditStatus::Normal);
        assert_eq!(record.document_type, "FT");
        assert_eq!(record.party_tax_id, "5000000001");
        assert_eq!(record.gross_total, Decimal::from_str("1240").unwrap());
        assert_eq!(record.tax_lines.len(), 2);
        let taxed: Decimal = record.tax_lines.iter().map(|l| l.tax).sum();
        assert_eq!(taxed, record.tax_payable);
    }

    #[test]
    fn test_export_keeps_rates_frozen_at_certification() {
        let certified = doc(Some(1));

        let mut raised = config();
        raised.rates.insert(TaxRateCode::new("NOR").unwrap(), Decimal::new(15, 2));
        let record = audit_record(&certified, &raised).unwrap().unwrap();
        assert_eq!(nor(&record).rate, Decimal::new(14, 2));
        assert_eq!(nor(&record).tax, Decimal::from(140));

        let mut retired = config();
        retired.rates.remove(&TaxRateCode::new("NOR").unwrap());
        let record = audit_record(&certified, &retired).unwrap().unwrap();
        assert_eq!(nor(&record).tax, Decimal::from(140));
        assert_eq!(record.tax_payable, Decimal::from(140));
    }

    #[test]
    fn test_rows_without_breakdown_are_repriced_only_when_tax_matches() {
        let legacy = legacy_doc();
        let record = audit_record(&legacy, &config()).unwrap().unwrap();
        assert_eq!(nor(&record).tax, Decimal::from(140));

        let mut raised = config();
        raised.rates.insert(TaxRateCode::new("NOR").unwrap(), Decimal::new(15, 2));
        assert!(matches!(
            audit_record(&legacy, &raised),
            Err(ReportError::BreakdownMismatch { .. })
        ));
    }

    #[test]
    fn test_drafts_skipped_and_cancelled_marked() {
        let mut cancelled = doc(Some(2));
        cancelled.cancel("erro", None).unwrap();
        let docs = vec![doc(None), cancelled, doc(Some(1))];
        let records = audit_records(&docs, &config(), None).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].document_number, "FT/2025/1");
        assert_eq!(records[1].status, AuditStatus::Cancelled);
        assert_eq!(records[1].status.code(), "A");
    }

    #[test]
    fn test_period_filter() {
        let docs = vec![doc(Some(1))];
        let april = FiscalPeriod::new(2025, 4).unwrap();
        assert!(audit_records(&docs, &config(), Some(april)).unwrap().is_empty());
    }

    #[test]
    fn test_status_serializes_as_code() {
        assert_eq!(serde_json::to_string(&AuditStatus::Cancelled).unwrap(), "\"A\"");
    }
}
