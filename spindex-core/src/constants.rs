/// BIP341 "nothing up my sleeve" x-only point. A taproot script-path spend whose
/// internal key is NUMS cannot carry a silent payment tweak.
pub const NUMS: [u8; 32] = [
    0x50, 0x92, 0x9b, 0x74, 0xc1, 0xa0, 0x49, 0x54, 0xb7, 0x8b, 0x4b, 0x60, 0x35, 0xe9, 0x7a, 0x5e,
    0x07, 0x8a, 0x5a, 0x0f, 0x28, 0xec, 0x96, 0xd5, 0x47, 0xbf, 0xee, 0x9a, 0xce, 0x80, 0x3a, 0xc0,
];

/// First byte of a taproot annex.
pub const TAPROOT_ANNEX_PREFIX: u8 = 0x50;

/// Blocks at or above this many transactions use per-transaction fan-out,
/// smaller ones are statically partitioned.
pub const LARGE_BLOCK_TX_THRESHOLD: usize = 1000;

/// Length of a truncated spent-outpoint hash in the spent index.
pub const SPENT_HASH_LEN: usize = 8;

/// BIP158 filter parameters.
pub const FILTER_P: u8 = 19;
pub const FILTER_M: u64 = 784_931;

/// Value of the probe output used while reindexing highest values. Larger than
/// any real output, so every tweak gets recomputed.
pub const PROBE_VALUE: u64 = u64::MAX;
