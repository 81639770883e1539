mod backend;
mod config;
pub mod constants;
mod error;
pub mod filters;
mod script;
pub mod store;
mod structs;
pub mod sync;
pub mod tweak;
pub mod updater;

#[cfg(test)]
mod test_utils;

pub use bitcoin;

pub use backend::ChainBackend;
pub use config::{IndexModes, OracleConfig};
pub use error::{Error, Result};
pub use script::ScriptKind;
pub use store::{Db, KeyValueStore, MemoryStore, StoreError};
pub use structs::*;
pub use sync::{BlockPipeline, ChainSync, TipPoller};
pub use updater::{BlockProcessor, StateUpdater};
