//! Column-oriented key/value storage.
//!
//! Everything the oracle persists goes through [`KeyValueStore`]. Records are
//! encoded by [`codec`], grouped into [`WriteBatch`]es and committed
//! atomically. [`Db`] is the typed facade the rest of the crate uses.

use std::sync::Arc;

use thiserror::Error;

mod batch;
pub mod codec;
mod db;
pub mod memory;

#[cfg(feature = "fjall")]
pub mod fjall;

pub use batch::BatchWriter;
pub use db::Db;
pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend: {0}")]
    Backend(String),
    #[error("storage lock poisoned")]
    Poisoned,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Column {
    Tweak,
    Utxo,
    HeaderInv,
    Header,
    SpentIndex,
    TweakIndex,
    TweakIndexDust,
    Filter,
}

impl Column {
    pub const ALL: [Column; 8] = [
        Column::Tweak,
        Column::Utxo,
        Column::HeaderInv,
        Column::Header,
        Column::SpentIndex,
        Column::TweakIndex,
        Column::TweakIndexDust,
        Column::Filter,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Column::Tweak => "tweak",
            Column::Utxo => "utxo",
            Column::HeaderInv => "header_inv",
            Column::Header => "header",
            Column::SpentIndex => "spent_index",
            Column::TweakIndex => "tweak_index",
            Column::TweakIndexDust => "tweak_index_dust",
            Column::Filter => "filter",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteOp {
    Put {
        column: Column,
        key: Vec<u8>,
        value: Vec<u8>,
    },
    Delete {
        column: Column,
        key: Vec<u8>,
    },
}

#[derive(Clone, Debug, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, column: Column, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.ops.push(WriteOp::Put {
            column,
            key: key.into(),
            value: value.into(),
        });
    }

    pub fn delete(&mut self, column: Column, key: impl Into<Vec<u8>>) {
        self.ops.push(WriteOp::Delete {
            column,
            key: key.into(),
        });
    }

    pub fn extend(&mut self, other: WriteBatch) {
        self.ops.extend(other.ops);
    }

    pub fn iter(&self) -> impl Iterator<Item = &WriteOp> {
        self.ops.iter()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

pub type ScanResult = Vec<(Vec<u8>, Vec<u8>)>;

pub trait KeyValueStore: Send + Sync {
    fn get(&self, column: Column, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;
    fn put(&self, column: Column, key: &[u8], value: &[u8]) -> Result<(), StoreError>;
    fn delete(&self, column: Column, key: &[u8]) -> Result<(), StoreError>;
    fn scan_prefix(&self, column: Column, prefix: &[u8]) -> Result<ScanResult, StoreError>;
    /// Entries with `start <= key < end`, in key order.
    fn scan_range(
        &self,
        column: Column,
        start: &[u8],
        end: &[u8],
    ) -> Result<ScanResult, StoreError>;
    /// Applies every operation of `batch` atomically.
    fn write_batch(&self, batch: &WriteBatch) -> Result<(), StoreError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn get(&self, column: Column, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        self.as_ref().get(column, key)
    }

    fn put(&self, column: Column, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.as_ref().put(column, key, value)
    }

    fn delete(&self, column: Column, key: &[u8]) -> Result<(), StoreError> {
        self.as_ref().delete(column, key)
    }

    fn scan_prefix(&self, column: Column, prefix: &[u8]) -> Result<ScanResult, StoreError> {
        self.as_ref().scan_prefix(column, prefix)
    }

    fn scan_range(
        &self,
        column: Column,
        start: &[u8],
        end: &[u8],
    ) -> Result<ScanResult, StoreError> {
        self.as_ref().scan_range(column, start, end)
    }

    fn write_batch(&self, batch: &WriteBatch) -> Result<(), StoreError> {
        self.as_ref().write_batch(batch)
    }
}
