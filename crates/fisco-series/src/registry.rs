//! # Series Registry
//!
//! In-memory registry of document series backed by `DashMap`.
//!
//! Each series sits behind its own `parking_lot::Mutex`. The map only
//! hands out the `Arc` to that mutex, so no shard lock is held while a
//! series is locked, and series never contend with each other.
//!
//! ## Commit Discipline
//!
//! [`SeriesRegistry::allocate_next`] reads the head without moving it.
//! [`SeriesRegistry::commit_with`] re-checks the allocation against the
//! head under the series lock, runs the caller's write, and only then
//! advances the head. A failed check or a failed write leaves the series
//! exactly as it was.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use fisco_core::SeriesId;
use parking_lot::Mutex;

use crate::error::SeriesError;
use crate::series::{Allocation, DocumentSeries};

/// Registry of numbering series.
pub struct SeriesRegistry {
    series: DashMap<SeriesId, Arc<Mutex<DocumentSeries>>>,
}

impl SeriesRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            series: DashMap::new(),
        }
    }

    /// Register a series. Also used to hydrate persisted series rows.
    pub fn open(&self, series: DocumentSeries) -> Result<(), SeriesError> {
        match self.series.entry(series.id.clone()) {
            Entry::Occupied(_) => Err(SeriesError::DuplicateSeries {
                series_id: series.id,
            }),
            Entry::Vacant(slot) => {
                tracing::info!(series_id = %series.id, last_number = series.last_number(), "series opened");
                slot.insert(Arc::new(Mutex::new(series)));
                Ok(())
            }
        }
    }

    /// Snapshot of a series.
    pub fn get(&self, id: &SeriesId) -> Result<DocumentSeries, SeriesError> {
        Ok(self.handle(id)?.lock().clone())
    }

    /// Snapshots of every series, ordered by id.
    pub fn list(&self) -> Vec<DocumentSeries> {
        let handles: Vec<_> = self.series.iter().map(|r| Arc::clone(r.value())).collect();
        let mut all: Vec<_> = handles.iter().map(|h| h.lock().clone()).collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    // ─── Numbering ──────────────────────────────────────────────────

    /// Next number and previous hash for `id`. Does not commit.
    pub fn allocate_next(&self, id: &SeriesId) -> Result<Allocation, SeriesError> {
        self.handle(id)?.lock().allocate()
    }

    /// Advance the series to `allocation` with fingerprint `hash`.
    pub fn commit(&self, allocation: &Allocation, hash: &str) -> Result<(), SeriesError> {
        self.commit_with(allocation, hash, || Ok::<(), SeriesError>(()))
    }

    /// Commit `allocation` together with `write`.
    ///
    /// Under the series lock: the allocation is checked against the head,
    /// `write` runs, and the head advances only if `write` succeeded.
    pub fn commit_with<T, E>(
        &self,
        allocation: &Allocation,
        hash: &str,
        write: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<SeriesError>,
    {
        let handle = self.handle(&allocation.series_id)?;
        let mut series = handle.lock();
        series.check(allocation)?;
        let out = write()?;
        series.advance(allocation, hash);
        Ok(out)
    }

    /// Run `f` with the series locked for its whole duration.
    pub(crate) fn with_locked<T, E>(
        &self,
        id: &SeriesId,
        f: impl FnOnce(&mut DocumentSeries) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<SeriesError>,
    {
        let handle = self.handle(id)?;
        let mut series = handle.lock();
        f(&mut series)
    }

    // ─── Lifecycle ──────────────────────────────────────────────────

    /// Open the `year` successor of `id` and close `id` to new numbers.
    pub fn rollover(&self, id: &SeriesId, year: i32) -> Result<SeriesId, SeriesError> {
        let handle = self.handle(id)?;
        let mut current = handle.lock();
        let next = current.next_year(year)?;
        let next_id = next.id.clone();
        match self.series.entry(next_id.clone()) {
            Entry::Occupied(_) => {
                return Err(SeriesError::DuplicateSeries { series_id: next_id });
            }
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(next)));
            }
        }
        current.deactivate();
        tracing::info!(from = %id, to = %next_id, closed_at = current.last_number(), "series rolled over");
        Ok(next_id)
    }

    /// Stop certification on `id` until [`SeriesRegistry::resume`].
    pub fn halt(&self, id: &SeriesId, reason: &str) -> Result<(), SeriesError> {
        self.handle(id)?.lock().halt(reason);
        tracing::error!(series_id = %id, reason, "series halted");
        Ok(())
    }

    pub fn resume(&self, id: &SeriesId) -> Result<(), SeriesError> {
        self.handle(id)?.lock().resume();
        tracing::info!(series_id = %id, "series resumed");
        Ok(())
    }

    /// Close `id` to new numbers.
    pub fn deactivate(&self, id: &SeriesId) -> Result<(), SeriesError> {
        self.handle(id)?.lock().deactivate();
        Ok(())
    }

    fn handle(&self, id: &SeriesId) -> Result<Arc<Mutex<DocumentSeries>>, SeriesError> {
        self.series
            .get(id)
            .map(|r| Arc::clone(r.value()))
            .ok_or_else(|| SeriesError::SeriesNotFound {
                series_id: id.clone(),
            })
    }
}

impl Default for SeriesRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SeriesRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeriesRegistry")
            .field("series_count", &self.series.len())
            .finish()
    }
}
