use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::RwLock;

use super::{Column, KeyValueStore, ScanResult, StoreError, WriteBatch, WriteOp};

type MemoryStoreMap = BTreeMap<(Column, Vec<u8>), Vec<u8>>;

/// Store backed by a single ordered map. Used by tests and short-lived runs.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryStoreMap>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries in `column`.
    pub fn len(&self, column: Column) -> Result<usize, StoreError> {
        let guard = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(guard.keys().filter(|(c, _)| *c == column).count())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, column: Column, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let guard = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(guard.get(&(column, key.to_vec())).cloned())
    }

    fn put(&self, column: Column, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let mut guard = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        guard.insert((column, key.to_vec()), value.to_vec());
        Ok(())
    }

    fn delete(&self, column: Column, key: &[u8]) -> Result<(), StoreError> {
        let mut guard = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        guard.remove(&(column, key.to_vec()));
        Ok(())
    }

    fn scan_prefix(&self, column: Column, prefix: &[u8]) -> Result<ScanResult, StoreError> {
        let guard = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        let start = Bound::Included((column, prefix.to_vec()));
        Ok(guard
            .range((start, Bound::Unbounded))
            .take_while(|((entry_column, key), _)| *entry_column == column && key.starts_with(prefix))
            .map(|((_, key), value)| (key.clone(), value.clone()))
            .collect())
    }

    fn scan_range(
        &self,
        column: Column,
        start: &[u8],
        end: &[u8],
    ) -> Result<ScanResult, StoreError> {
        if start >= end {
            return Ok(Vec::new());
        }
        let guard = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        let bounds = (
            Bound::Included((column, start.to_vec())),
            Bound::Excluded((column, end.to_vec())),
        );
        Ok(guard
            .range(bounds)
            .map(|((_, key), value)| (key.clone(), value.clone()))
            .collect())
    }

    fn write_batch(&self, batch: &WriteBatch) -> Result<(), StoreError> {
        let mut guard = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        for op in batch.iter() {
            match op {
                WriteOp::Put { column, key, value } => {
                    guard.insert((*column, key.clone()), value.clone());
                }
                WriteOp::Delete { column, key } => {
                    guard.remove(&(*column, key.clone()));
                }
            }
        }
        Ok(())
    }
}
