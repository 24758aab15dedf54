//! # Ledger File
//!
//! One JSON file with a row per series and a row per document. Loading
//! hydrates a [`SeriesRegistry`] and a [`DocumentBook`]; every document row
//! goes through the validating store-record conversion, so a corrupt row
//! stops the command before anything runs.
//!
//! Saving writes and syncs a sibling temporary file, then renames it over
//! the ledger, so series rows and document rows are replaced together.
//!
//! A command that writes holds an exclusive advisory lock on the sibling
//! `.json.lock` file from load to save. Two processes therefore never
//! certify against the same loaded head.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use fs4::fs_std::FileExt;
use fisco_series::{Certifier, DocumentBook, DocumentSeries, SeriesRegistry};
use fisco_state::{FiscalDocument, StoreRecord};
use fisco_tax::FiscalConfiguration;
use serde::{Deserialize, Serialize};

/// Persisted ledger.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerFile {
    #[serde(default)]
    pub series: Vec<DocumentSeries>,
    #[serde(default)]
    pub documents: Vec<StoreRecord>,
}

impl LedgerFile {
    /// Read `path`; a missing file is an empty ledger.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading ledger {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("parsing ledger {}", path.display()))
    }

    /// Write to `path` through a temporary sibling.
    pub fn save(&self, path: &Path) -> Result<()> {
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(self)?;
        let mut file = File::create(&tmp).with_context(|| format!("creating {}", tmp.display()))?;
        file.write_all(content.as_bytes())
            .and_then(|()| file.sync_all())
            .with_context(|| format!("writing {}", tmp.display()))?;
        drop(file);
        std::fs::rename(&tmp, path).with_context(|| format!("replacing ledger {}", path.display()))?;
        Ok(())
    }

    /// Build an engine over this ledger's rows.
    pub fn hydrate(&self, config: FiscalConfiguration) -> Result<Certifier> {
        let registry = SeriesRegistry::new();
        for series in &self.series {
            registry.open(series.clone())?;
        }
        let book = DocumentBook::new();
        for record in &self.documents {
            let doc = FiscalDocument::from_record(record.clone())
                .with_context(|| format!("loading document {}", record.id))?;
            book.insert(doc)?;
        }
        Ok(Certifier::new(Arc::new(config), Arc::new(registry), Arc::new(book)))
    }

    /// Rows of an engine's current state.
    pub fn snapshot(certifier: &Certifier) -> Self {
        Self {
            series: certifier.registry().list(),
            documents: certifier
                .book()
                .list()
                .iter()
                .map(FiscalDocument::to_record)
                .collect(),
        }
    }
}

/// Exclusive hold on a ledger, released on drop.
#[derive(Debug)]
pub struct LedgerLock {
    _file: File,
}

impl LedgerLock {
    /// Block until no other command holds the ledger at `path`.
    pub fn acquire(path: &Path) -> Result<Self> {
        let lock_path = path.with_extension("json.lock");
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .with_context(|| format!("opening lock {}", lock_path.display()))?;
        FileExt::lock_exclusive(&file)
            .with_context(|| format!("locking ledger {}", path.display()))?;
        tracing::debug!(ledger = %path.display(), "ledger locked");
        Ok(Self { _file: file })
    }
}

/// Lock, load, run `f` against the engine, and save if `f` succeeded.
pub fn with_ledger<T>(
    path: &Path,
    config: FiscalConfiguration,
    f: impl FnOnce(&Certifier) -> Result<T>,
) -> Result<T> {
    let _lock = LedgerLock::acquire(path)?;
    let certifier = LedgerFile::load(path)?.hydrate(config)?;
    let out = f(&certifier)?;
    LedgerFile::snapshot(&certifier).save(path)?;
    Ok(out)
}
