//! # Document Lifecycle
//!
//! ## States
//!
//! ```text
//! Draft ──certify──▶ Certified ──pay (partial)──▶ PartiallyPaid
//!   │                   │  │                         │
//!   │                   │  └──pay (exact)──▶ Paid ◀──┘
//!   │                   │                    │
//!   │                   ▼                    ▼
//!   └──discard──▶   Cancelled ◀──────────────┘
//! ```
//!
//! Certification is irreversible. Cancellation keeps the number and hash;
//! it never frees a slot in the series. Every other move is an
//! [`LifecycleError::IllegalTransition`] naming both states.
//!
//! The states form a small closed table, so they are an enum checked by
//! [`DocumentStatus::can_transition_to`] rather than one type per state.

use chrono::NaiveDate;
use fisco_core::{Decimal, DocumentId, FiscalPeriod, Timestamp};
use fisco_tax::TaxError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ─── Status ─────────────────────────────────────────────────────────

/// Lifecycle status of a fiscal document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Draft,
    Certified,
    PartiallyPaid,
    Paid,
    Cancelled,
}

impl DocumentStatus {
    /// Whether `self -> to` is in the transition table.
    pub fn can_transition_to(&self, to: DocumentStatus) -> bool {
        use DocumentStatus::*;
        matches!(
            (self, to),
            (Draft, Certified)
                | (Draft, Cancelled)
                | (Certified, PartiallyPaid)
                | (Certified, Paid)
                | (PartiallyPaid, PartiallyPaid)
                | (PartiallyPaid, Paid)
                | (Certified, Cancelled)
                | (PartiallyPaid, Cancelled)
                | (Paid, Cancelled)
        )
    }

    /// Whether this state is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether financial fields may still be edited.
    pub fn is_editable(&self) -> bool {
        matches!(self, Self::Draft)
    }

    /// Whether payments may be registered in this state.
    pub fn accepts_payment(&self) -> bool {
        matches!(self, Self::Certified | Self::PartiallyPaid | Self::Paid)
    }

    /// Upper-case state name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Certified => "CERTIFIED",
            Self::PartiallyPaid => "PARTIALLY_PAID",
            Self::Paid => "PAID",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Transition Log ─────────────────────────────────────────────────

/// Record of a status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from_state: DocumentStatus,
    pub to_state: DocumentStatus,
    pub timestamp: Timestamp,
    pub reason: String,
}

// ─── Errors ─────────────────────────────────────────────────────────

/// Errors raised by document lifecycle operations. None of them is retried.
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// The requested move is not in the transition table.
    #[error("illegal transition for {document_id}: {from} -> {to}")]
    IllegalTransition {
        document_id: DocumentId,
        from: DocumentStatus,
        to: DocumentStatus,
    },

    /// Payment would take cumulative payments above the document total.
    #[error("overpayment on {document_id}: outstanding {outstanding}, attempted {attempted}")]
    Overpayment {
        document_id: DocumentId,
        outstanding: Decimal,
        attempted: Decimal,
    },

    /// Payment amount is zero or negative.
    #[error("invalid payment amount {amount} on {document_id}")]
    InvalidPayment {
        document_id: DocumentId,
        amount: Decimal,
    },

    /// The document's fiscal period is closed.
    #[error("cannot cancel {document_id}: issued {issue_date}, periods closed through {closed_through}")]
    PeriodClosed {
        document_id: DocumentId,
        issue_date: NaiveDate,
        closed_through: FiscalPeriod,
    },

    /// Financial fields are immutable outside Draft.
    #[error("document {document_id} is {status}; financial fields are frozen")]
    Frozen {
        document_id: DocumentId,
        status: DocumentStatus,
    },

    /// The derivation would not form a tree.
    #[error("invalid derivation of {document_id} from {origin_id}: {reason}")]
    InvalidDerivation {
        document_id: DocumentId,
        origin_id: DocumentId,
        reason: String,
    },

    /// Totals could not be computed for a draft.
    #[error(transparent)]
    Tax(#[from] TaxError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use DocumentStatus::*;

    const ALL: [DocumentStatus; 5] = [Draft, Certified, PartiallyPaid, Paid, Cancelled];

    #[test]
    fn test_allowed_transitions() {
        assert!(Draft.can_transition_to(Certified));
        assert!(Draft.can_transition_to(Cancelled));
        assert!(Certified.can_transition_to(PartiallyPaid));
        assert!(Certified.can_transition_to(Paid));
        assert!(PartiallyPaid.can_transition_to(Paid));
        assert!(Paid.can_transition_to(Cancelled));
    }

    #[test]
    fn test_paid_unreachable_from_draft() {
        assert!(!Draft.can_transition_to(Paid));
        assert!(!Draft.can_transition_to(PartiallyPaid));
    }

    #[test]
    fn test_cancelled_is_terminal() {
        for to in ALL {
            assert!(!Cancelled.can_transition_to(to), "Cancelled -> {to}");
        }
        assert!(Cancelled.is_terminal());
    }

    #[test]
    fn test_certification_irreversible() {
        for from in [Certified, PartiallyPaid, Paid, Cancelled] {
            assert!(!from.can_transition_to(Draft));
            assert!(!from.can_transition_to(Certified));
        }
    }

    #[test]
    fn test_display_and_serde() {
        assert_eq!(PartiallyPaid.to_string(), "PARTIALLY_PAID");
        assert_eq!(serde_json::to_string(&PartiallyPaid).unwrap(), "\"partially_paid\"");
    }

    #[test]
    fn test_error_names_both_states() {
        let err = LifecycleError::IllegalTransition {
            document_id: DocumentId::new(),
            from: Cancelled,
            to: Cancelled,
        };
        assert!(err.to_string().contains("CANCELLED -> CANCELLED"));
    }
}
