use std::sync::{Arc, Mutex};

use log::debug;

use super::{Column, KeyValueStore, StoreError, WriteBatch};

/// Shared write buffer for bulk inserts.
///
/// Writers append to one active batch. Once it holds `threshold` operations
/// it is swapped for an empty one and committed outside the lock, so other
/// writers keep appending while the commit runs.
pub struct BatchWriter {
    store: Arc<dyn KeyValueStore>,
    active: Mutex<WriteBatch>,
    threshold: usize,
}

impl BatchWriter {
    pub fn new(store: Arc<dyn KeyValueStore>, threshold: usize) -> Self {
        Self {
            store,
            active: Mutex::new(WriteBatch::new()),
            threshold: threshold.max(1),
        }
    }

    pub fn put(&self, column: Column, key: Vec<u8>, value: Vec<u8>) -> Result<(), StoreError> {
        let full = {
            let mut active = self.active.lock().map_err(|_| StoreError::Poisoned)?;
            active.put(column, key, value);
            self.rotate_if_full(&mut active)
        };
        self.commit(full)
    }

    pub fn delete(&self, column: Column, key: Vec<u8>) -> Result<(), StoreError> {
        let full = {
            let mut active = self.active.lock().map_err(|_| StoreError::Poisoned)?;
            active.delete(column, key);
            self.rotate_if_full(&mut active)
        };
        self.commit(full)
    }

    /// Moves every operation of `ops` into the active batch.
    pub fn append(&self, ops: WriteBatch) -> Result<(), StoreError> {
        let full = {
            let mut active = self.active.lock().map_err(|_| StoreError::Poisoned)?;
            active.extend(ops);
            self.rotate_if_full(&mut active)
        };
        self.commit(full)
    }

    /// Commits whatever is buffered.
    pub fn flush(&self) -> Result<(), StoreError> {
        let pending = {
            let mut active = self.active.lock().map_err(|_| StoreError::Poisoned)?;
            std::mem::take(&mut *active)
        };
        self.commit(Some(pending))
    }

    pub fn pending(&self) -> Result<usize, StoreError> {
        Ok(self.active.lock().map_err(|_| StoreError::Poisoned)?.len())
    }

    fn rotate_if_full(&self, active: &mut WriteBatch) -> Option<WriteBatch> {
        (active.len() >= self.threshold).then(|| std::mem::take(active))
    }

    fn commit(&self, batch: Option<WriteBatch>) -> Result<(), StoreError> {
        match batch {
            Some(batch) if !batch.is_empty() => {
                debug!("committing {} buffered writes", batch.len());
                self.store.write_batch(&batch)
            }
            _ => Ok(()),
        }
    }
}
