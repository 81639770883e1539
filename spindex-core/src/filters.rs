//! Per-block compact filters for light clients.
//!
//! Two BIP158-parameterised filters are kept per block: one over the x-only
//! keys of new taproot outputs, one over truncated hashes of the taproot
//! outpoints the block spends. Both are keyed with the block hash, so
//! wallets can test them with [`bitcoin::bip158::BlockFilter::match_any`].

use bitcoin::bip158::{self, GcsFilterWriter};
use bitcoin::hashes::{sha256, Hash};
use bitcoin::{BlockHash, OutPoint};

use crate::constants::{FILTER_M, FILTER_P, SPENT_HASH_LEN};
use crate::error::Result;
use crate::structs::{FilterData, FilterType, Utxo};

/// `sha256(txid ‖ vout_le ‖ spending_block_hash)[..8]`.
pub fn spent_outpoint_hash(outpoint: &OutPoint, spending_block: &BlockHash) -> [u8; SPENT_HASH_LEN] {
    let mut preimage = [0u8; 68];
    preimage[..32].copy_from_slice(outpoint.txid.as_byte_array());
    preimage[32..36].copy_from_slice(&outpoint.vout.to_le_bytes());
    preimage[36..].copy_from_slice(spending_block.as_byte_array());
    let hash = sha256::Hash::hash(&preimage);

    let mut out = [0u8; SPENT_HASH_LEN];
    out.copy_from_slice(&hash[..SPENT_HASH_LEN]);
    out
}

/// Filter over the output keys of `utxos`.
pub fn new_utxos_filter(block_hash: BlockHash, utxos: &[Utxo]) -> Result<FilterData> {
    let elements = utxos
        .iter()
        .filter(|utxo| utxo.script_pubkey.is_p2tr())
        .map(|utxo| &utxo.script_pubkey.as_bytes()[2..]);
    Ok(FilterData {
        filter_type: FilterType::NewUtxos,
        block_hash,
        data: build(&block_hash, elements)?,
    })
}

/// Filter over the spent-outpoint hashes of a block.
pub fn spent_filter(block_hash: BlockHash, spent_hashes: &[[u8; SPENT_HASH_LEN]]) -> Result<FilterData> {
    Ok(FilterData {
        filter_type: FilterType::Spent,
        block_hash,
        data: build(&block_hash, spent_hashes.iter().map(|h| &h[..]))?,
    })
}

fn build<'a>(block_hash: &BlockHash, elements: impl Iterator<Item = &'a [u8]>) -> Result<Vec<u8>> {
    let key = block_hash.as_byte_array();
    let mut k0 = [0u8; 8];
    let mut k1 = [0u8; 8];
    k0.copy_from_slice(&key[0..8]);
    k1.copy_from_slice(&key[8..16]);

    let mut data = Vec::new();
    let mut writer = GcsFilterWriter::new(
        &mut data,
        u64::from_le_bytes(k0),
        u64::from_le_bytes(k1),
        FILTER_M,
        FILTER_P,
    );
    for element in elements {
        writer.add_element(element);
    }
    writer.finish().map_err(bip158::Error::Io)?;
    Ok(data)
}
