//! Immutable runtime configuration.
//!
//! One [`OracleConfig`] is built at startup and handed to every component
//! constructor. Nothing reads configuration from global state.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which tweak tables the updater maintains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexModes {
    /// Mutable per-transaction tweak rows with cut-through and dust bound.
    pub cut_through: bool,
    /// Append-only per-block tweak list.
    pub full_basic: bool,
    /// Append-only per-block tweak list paired with the highest output value.
    pub full_with_dust: bool,
}

impl Default for IndexModes {
    fn default() -> Self {
        Self {
            cut_through: true,
            full_basic: false,
            full_with_dust: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// First height that gets indexed.
    pub sync_start_height: u32,
    /// Heights per bulk-sync window.
    pub sync_window: u32,
    /// Maximum concurrent block fetches.
    pub max_parallel_requests: usize,
    /// Hashes or headers per batched RPC call.
    pub header_batch_size: usize,
    /// Task count for tweak computation.
    pub parallelism: usize,
    /// In-flight bound for per-transaction fan-out and the worker pool gate.
    pub max_in_flight: usize,
    /// Capacity of the fetched-block channel.
    pub fetch_channel_capacity: usize,
    /// Operations per batch before the writer rotates and commits.
    pub batch_flush_threshold: usize,
    /// Tip polling interval.
    #[serde(with = "duration_secs")]
    pub poll_interval: Duration,
    pub index: IndexModes,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            sync_start_height: 0,
            sync_window: 20_000,
            max_parallel_requests: 24,
            header_batch_size: 1_000,
            parallelism: 8,
            max_in_flight: 64,
            fetch_channel_capacity: 64,
            batch_flush_threshold: 10_000,
            poll_interval: Duration::from_secs(5),
            index: IndexModes::default(),
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}
