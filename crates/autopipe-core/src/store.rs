//! Pipeline store
//!
//! The engine keeps every pipeline record behind a [`PipelineStore`]. Writes
//! to one record are serialised by `update`; unrelated records never share
//! a lock.

use crate::error::PipelineError;
use crate::types::{Pipeline, PipelineConfig, PipelineId};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

/// A pipeline together with its creation-time config
///
/// Records are only built inside the engine; loading a pipeline from
/// outside goes through `PipelineEngine::restore`.
///
/// ```compile_fail
/// let _: autopipe_core::PipelineRecord = serde_json::from_str("{}").unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineRecord {
    pub(crate) pipeline: Pipeline,
    pub(crate) config: PipelineConfig,
    /// Set while an `execute` call is walking the stages
    #[serde(skip)]
    pub(crate) driver_active: bool,
}

impl PipelineRecord {
    pub(crate) fn new(pipeline: Pipeline, config: PipelineConfig) -> Self {
        Self {
            pipeline,
            config,
            driver_active: false,
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> PipelineId {
        self.pipeline.id()
    }

    #[inline]
    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

/// Storage backend for pipeline records
pub trait PipelineStore: Send + Sync {
    /// Snapshot of a record
    fn get(&self, id: PipelineId) -> Option<PipelineRecord>;

    /// Insert or replace a record
    fn put(&self, record: PipelineRecord);

    /// Mutate one record under its own lock
    ///
    /// # Errors
    /// Returns `PipelineError::NotFound` for unknown ids, otherwise whatever `f` returns.
    fn update<T, F>(&self, id: PipelineId, f: F) -> Result<T, PipelineError>
    where
        F: FnOnce(&mut PipelineRecord) -> Result<T, PipelineError>;

    /// Snapshots of all records
    fn list(&self) -> Vec<PipelineRecord>;

    /// Remove a record
    fn remove(&self, id: PipelineId) -> Option<PipelineRecord>;
}

/// In-memory store: sharded map of individually locked records
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: DashMap<PipelineId, Arc<Mutex<PipelineRecord>>>,
}

impl InMemoryStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn slot(&self, id: PipelineId) -> Option<Arc<Mutex<PipelineRecord>>> {
        // clone the Arc so the shard guard is released before locking the record
        self.records.get(&id).map(|entry| Arc::clone(entry.value()))
    }
}

impl PipelineStore for InMemoryStore {
    fn get(&self, id: PipelineId) -> Option<PipelineRecord> {
        self.slot(id).map(|slot| slot.lock().clone())
    }

    fn put(&self, record: PipelineRecord) {
        self.records
            .insert(record.id(), Arc::new(Mutex::new(record)));
    }

    fn update<T, F>(&self, id: PipelineId, f: F) -> Result<T, PipelineError>
    where
        F: FnOnce(&mut PipelineRecord) -> Result<T, PipelineError>,
    {
        let slot = self.slot(id).ok_or(PipelineError::NotFound(id))?;
        let mut record = slot.lock();
        f(&mut record)
    }

    fn list(&self) -> Vec<PipelineRecord> {
        let slots: Vec<_> = self
            .records
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        let mut records: Vec<_> = slots.iter().map(|slot| slot.lock().clone()).collect();
        records.sort_by_key(PipelineRecord::id);
        records
    }

    fn remove(&self, id: PipelineId) -> Option<PipelineRecord> {
        self.records
            .remove(&id)
            .map(|(_, slot)| slot.lock().clone())
    }
}
