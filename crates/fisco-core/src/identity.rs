//! # Domain Identity Newtypes
//!
//! Newtype wrappers for identifiers in the certification engine. You cannot
//! pass a `PartyId` where a `DocumentId` is expected, and a `SeriesId` or
//! `Nif` that reached a function has already been validated.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::FiscoError;

/// Unique identifier for a fiscal document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(pub Uuid);

/// Unique identifier for the issuing company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompanyId(pub Uuid);

/// Unique identifier for a client or supplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartyId(pub Uuid);

macro_rules! uuid_id {
    ($ty:ident, $prefix:literal) => {
        impl $ty {
            /// Generate a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Access the inner UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $ty {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }

        /// Accepts a bare UUID or the displayed `prefix:uuid` form.
        impl std::str::FromStr for $ty {
            type Err = FiscoError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = s.trim();
                let raw = raw.strip_prefix(concat!($prefix, ":")).unwrap_or(raw);
                Uuid::parse_str(raw)
                    .map(Self)
                    .map_err(|e| FiscoError::validation($prefix, format!("{s:?}: {e}")))
            }
        }
    };
}

uuid_id!(DocumentId, "document");
uuid_id!(CompanyId, "company");
uuid_id!(PartyId, "party");

/// Identifier of a document series, e.g. `FT/2025`.
///
/// Non-empty, at most 32 characters, ASCII alphanumerics plus `/ - _ .`.
/// The series identifier is part of every certification fingerprint, so it
/// must not carry whitespace or characters that render ambiguously.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SeriesId(String);

impl SeriesId {
    /// Maximum accepted length of a series identifier.
    pub const MAX_LEN: usize = 32;

    /// Validate and wrap a series identifier.
    pub fn new(id: impl Into<String>) -> Result<Self, FiscoError> {
        let id = id.into();
        if id.is_empty() {
            return Err(FiscoError::validation("series_id", "must not be empty"));
        }
        if id.len() > Self::MAX_LEN {
            return Err(FiscoError::validation(
                "series_id",
                format!("{id:?} exceeds {} characters", Self::MAX_LEN),
            ));
        }
        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '-' | '_' | '.'))
        {
            return Err(FiscoError::validation(
                "series_id",
                format!("{id:?} contains characters outside [A-Za-z0-9/-_.]"),
            ));
        }
        Ok(Self(id))
    }

    /// Access the identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SeriesId {
    type Error = FiscoError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<SeriesId> for String {
    fn from(id: SeriesId) -> Self {
        id.0
    }
}

impl std::fmt::Display for SeriesId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Taxpayer identification number (NIF).
///
/// ASCII alphanumeric, 1 to 20 characters, stored upper-cased. Surrounding
/// whitespace is trimmed. Sales to unidentified buyers use
/// [`Nif::FINAL_CONSUMER`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Nif(String);

impl Nif {
    /// The NIF recorded for sales to an unidentified final consumer.
    pub const FINAL_CONSUMER: &'static str = "999999999";

    /// Validate and normalize a taxpayer number.
    pub fn new(nif: impl AsRef<str>) -> Result<Self, FiscoError> {
        let nif = nif.as_ref().trim();
        if nif.is_empty() || nif.len() > 20 {
            return Err(FiscoError::validation(
                "nif",
                format!("{nif:?} must be 1 to 20 characters"),
            ));
        }
        if !nif.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(FiscoError::validation(
                "nif",
                format!("{nif:?} must be ASCII alphanumeric"),
            ));
        }
        Ok(Self(nif.to_ascii_uppercase()))
    }

    /// The final-consumer NIF.
    pub fn final_consumer() -> Self {
        Self(Self::FINAL_CONSUMER.to_string())
    }

    /// True for the final-consumer placeholder.
    pub fn is_final_consumer(&self) -> bool {
        self.0 == Self::FINAL_CONSUMER
    }

    /// Access the NIF string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Nif {
    type Error = FiscoError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Nif> for String {
    fn from(nif: Nif) -> Self {
        nif.0
    }
}

impl std::fmt::Display for Nif {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_ids_are_unique_and_prefixed() {
        let a = DocumentId::new();
        let b = DocumentId::new();
        assert_ne!(a, b);
        assert!(a.to_string().starts_with("document:"));
        assert!(PartyId::new().to_string().starts_with("party:"));
        assert!(CompanyId::new().to_string().starts_with("company:"));
    }

    #[test]
    fn test_uuid_ids_parse_bare_and_prefixed() {
        let id = DocumentId::new();
        assert_eq!(id.to_string().parse::<DocumentId>().unwrap(), id);
        assert_eq!(id.as_uuid().to_string().parse::<DocumentId>().unwrap(), id);
        assert!("party:not-a-uuid".parse::<PartyId>().is_err());
    }

    #[test]
    fn test_series_id_accepts_common_forms() {
        for s in ["FT/2025", "NC-2025", "FR.A_1", "A"] {
            assert!(SeriesId::new(s).is_ok(), "{s} should be valid");
        }
    }

    #[test]
    fn test_series_id_rejects_bad_input() {
        assert!(SeriesId::new("").is_err());
        assert!(SeriesId::new("FT 2025").is_err());
        assert!(SeriesId::new("X".repeat(33)).is_err());
    }

    #[test]
    fn test_series_id_serde_validates() {
        let ok: SeriesId = serde_json::from_str("\"FT/2025\"").unwrap();
        assert_eq!(ok.as_str(), "FT/2025");
        assert!(serde_json::from_str::<SeriesId>("\"bad id\"").is_err());
    }

    #[test]
    fn test_nif_normalizes() {
        let nif = Nif::new("  5417abc001  ").unwrap();
        assert_eq!(nif.as_str(), "5417ABC001");
    }

    #[test]
    fn test_nif_rejects_bad_input() {
        assert!(Nif::new("").is_err());
        assert!(Nif::new("541-7").is_err());
        assert!(Nif::new("1".repeat(21)).is_err());
    }

    #[test]
    fn test_final_consumer() {
        assert!(Nif::final_consumer().is_final_consumer());
        assert!(!Nif::new("5417000001").unwrap().is_final_consumer());
    }
}
