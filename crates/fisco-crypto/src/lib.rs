//! # fisco-crypto: Certification Hash Chain
//!
//! Every certified document carries a fingerprint computed over its series,
//! number, totals, issue date, counterparty tax id and the fingerprint of
//! the document certified before it in the same series. Altering any
//! certified document breaks every link after it.
//!
//! - [`compute_hash`] is a pure function of a [`HashInput`].
//! - [`verify_chain`] replays a series from [`GENESIS_HASH`] and reports the
//!   first divergent document.
//!
//! ## Crate Policy
//!
//! - Depends only on `fisco-core` internally.
//! - The fingerprint is a deterministic digest, not a signature. No keys
//!   are involved.
//! - All digest input flows through `CanonicalBytes`.

pub mod chain;

pub use chain::{
    compute_hash, verify_chain, verify_segment, ChainAnchor, ChainEntry, ChainError,
    ChainReport, DivergenceKind, HashInput, GENESIS_HASH,
};
