//! BIP352 tweak derivation.
//!
//! For a transaction with at least one taproot output:
//!
//! 1. every input's previous output is classified and a candidate public key
//!    is extracted ([`input_pubkey`]),
//! 2. the keys are summed into `A` ([`aggregate_keys`]),
//! 3. the smallest serialized outpoint and `A` are hashed under
//!    `BIP0352/Inputs` ([`input_hash`]),
//! 4. the tweak is `input_hash · A`, compressed to 33 bytes.
//!
//! [`TaskDistribution`] implementations run this over a whole block.

mod compute;
mod extract;
mod hash;
mod strategy;

pub use compute::{compute_tweak, TweakOutcome, TxTweak};
pub use extract::input_pubkey;
pub use hash::{aggregate_keys, input_hash, smallest_outpoint, tweak_data, InvalidReason};
pub use strategy::{select_distribution, FanOut, Partition, Serial, TaskDistribution, WorkerPool};
