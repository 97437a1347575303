use std::sync::{PoisonError, RwLock};

use super::{next_id, PersistenceError, StartupStore};
use crate::record::{RecordId, ScoreUpdate, StartupRecord};

/// In-process store for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Vec<StartupRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with records; ids are assigned to records that lack one.
    pub fn with_records(records: impl IntoIterator<Item = StartupRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|mut r| {
                if r.id.is_none() {
                    r.id = Some(next_id());
                }
                r
            })
            .collect();
        Self {
            inner: RwLock::new(records),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl StartupStore for MemoryStore {
    async fn find_all(&self) -> Result<Vec<StartupRecord>, PersistenceError> {
        Ok(self.inner.read().unwrap_or_else(PoisonError::into_inner).clone())
    }

    async fn insert(&self, mut record: StartupRecord) -> Result<RecordId, PersistenceError> {
        let id = next_id();
        record.id = Some(id.clone());
        self.inner.write().unwrap_or_else(PoisonError::into_inner).push(record);
        Ok(id)
    }

    async fn update(&self, id: &RecordId, fields: &ScoreUpdate) -> Result<(), PersistenceError> {
        let mut g = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let rec = g
            .iter_mut()
            .find(|r| r.id.as_ref() == Some(id))
            .ok_or_else(|| PersistenceError::NotFound(id.clone()))?;
        rec.apply_update(fields);
        Ok(())
    }
}
