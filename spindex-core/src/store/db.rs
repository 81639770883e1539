use std::sync::Arc;

use bitcoin::{BlockHash, Txid};

use super::codec;
use super::{Column, KeyValueStore, WriteBatch};
use crate::error::Result;
use crate::structs::{
    BlockHeader, BlockHeaderInv, FilterData, FilterType, SpentOutpointsIndex, Tweak, TweakIndex,
    TweakIndexDust, Utxo,
};

/// Typed access to the oracle's records.
#[derive(Clone)]
pub struct Db {
    store: Arc<dyn KeyValueStore>,
}

impl Db {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub fn write(&self, batch: &WriteBatch) -> Result<()> {
        Ok(self.store.write_batch(batch)?)
    }

    pub fn header_inv(&self, height: u32) -> Result<Option<BlockHeaderInv>> {
        let key = codec::height_key(height);
        self.store
            .get(Column::HeaderInv, &key)?
            .map(|value| codec::decode_header_inv(&key, &value))
            .transpose()
    }

    /// Inventory entries for heights in `[start, end)`.
    pub fn header_invs(&self, start: u32, end: u32) -> Result<Vec<BlockHeaderInv>> {
        self.store
            .scan_range(
                Column::HeaderInv,
                &codec::height_key(start),
                &codec::height_key(end),
            )?
            .iter()
            .map(|(key, value)| codec::decode_header_inv(key, value))
            .collect()
    }

    /// Heights in `[start, end)` whose block body has not been applied.
    pub fn unprocessed_heights(&self, start: u32, end: u32) -> Result<Vec<u32>> {
        let processed: std::collections::HashSet<u32> = self
            .header_invs(start, end)?
            .into_iter()
            .filter(|inv| inv.processed)
            .map(|inv| inv.height)
            .collect();
        Ok((start..end).filter(|h| !processed.contains(h)).collect())
    }

    /// Highest height flagged as processed.
    pub fn best_processed_height(&self) -> Result<Option<u32>> {
        let mut best = None;
        for (key, value) in self.store.scan_prefix(Column::HeaderInv, &[])? {
            let inv = codec::decode_header_inv(&key, &value)?;
            if inv.processed {
                best = best.max(Some(inv.height));
            }
        }
        Ok(best)
    }

    pub fn header(&self, hash: &BlockHash) -> Result<Option<BlockHeader>> {
        let key = codec::block_key(hash);
        self.store
            .get(Column::Header, &key)?
            .map(|value| codec::decode_header(&key, &value))
            .transpose()
    }

    /// True once the block with `hash` is in the inventory and flagged processed.
    pub fn is_processed(&self, hash: &BlockHash) -> Result<bool> {
        let Some(header) = self.header(hash)? else {
            return Ok(false);
        };
        Ok(self
            .header_inv(header.height)?
            .is_some_and(|inv| inv.hash == *hash && inv.processed))
    }

    pub fn tweak(&self, block_hash: &BlockHash, txid: &Txid) -> Result<Option<Tweak>> {
        let key = codec::tweak_key(block_hash, txid);
        self.store
            .get(Column::Tweak, &key)?
            .map(|value| codec::decode_tweak(&key, &value))
            .transpose()
    }

    pub fn tweaks_for_block(&self, block_hash: &BlockHash) -> Result<Vec<Tweak>> {
        self.scan_decode(
            Column::Tweak,
            &codec::block_key(block_hash),
            codec::decode_tweak,
        )
    }

    /// Tweaks of the block currently indexed at `height`.
    pub fn tweaks_at_height(&self, height: u32) -> Result<Vec<Tweak>> {
        match self.header_inv(height)? {
            Some(inv) => self.tweaks_for_block(&inv.hash),
            None => Ok(Vec::new()),
        }
    }

    /// Every stored tweak row, in key order.
    pub fn all_tweaks(&self) -> Result<Vec<Tweak>> {
        self.scan_decode(Column::Tweak, &[], codec::decode_tweak)
    }

    pub fn utxo_group(&self, block_hash: &BlockHash, txid: &Txid) -> Result<Vec<Utxo>> {
        self.scan_decode(
            Column::Utxo,
            &codec::utxo_group_prefix(block_hash, txid),
            codec::decode_utxo,
        )
    }

    pub fn utxos_for_block(&self, block_hash: &BlockHash) -> Result<Vec<Utxo>> {
        self.scan_decode(
            Column::Utxo,
            &codec::block_key(block_hash),
            codec::decode_utxo,
        )
    }

    pub fn spent_index(&self, block_hash: &BlockHash) -> Result<Option<SpentOutpointsIndex>> {
        let key = codec::block_key(block_hash);
        self.store
            .get(Column::SpentIndex, &key)?
            .map(|value| codec::decode_spent_index(&key, &value))
            .transpose()
    }

    pub fn tweak_index(&self, block_hash: &BlockHash) -> Result<Option<TweakIndex>> {
        let key = codec::block_key(block_hash);
        self.store
            .get(Column::TweakIndex, &key)?
            .map(|value| codec::decode_tweak_index(&key, &value))
            .transpose()
    }

    pub fn tweak_index_dust(&self, block_hash: &BlockHash) -> Result<Option<TweakIndexDust>> {
        let key = codec::block_key(block_hash);
        self.store
            .get(Column::TweakIndexDust, &key)?
            .map(|value| codec::decode_tweak_index_dust(&key, &value))
            .transpose()
    }

    pub fn filter(
        &self,
        filter_type: FilterType,
        block_hash: &BlockHash,
    ) -> Result<Option<FilterData>> {
        let key = codec::filter_key(filter_type, block_hash);
        self.store
            .get(Column::Filter, &key)?
            .map(|value| codec::decode_filter(&key, &value))
            .transpose()
    }

    fn scan_decode<T>(
        &self,
        column: Column,
        prefix: &[u8],
        decode: fn(&[u8], &[u8]) -> Result<T>,
    ) -> Result<Vec<T>> {
        self.store
            .scan_prefix(column, prefix)?
            .iter()
            .map(|(key, value)| decode(key, value))
            .collect()
    }
}

impl WriteBatch {
    pub fn put_tweak(&mut self, tweak: &Tweak) {
        self.put(
            Column::Tweak,
            codec::tweak_key(&tweak.block_hash, &tweak.txid),
            codec::encode_tweak(tweak),
        );
    }

    pub fn delete_tweak(&mut self, block_hash: &BlockHash, txid: &Txid) {
        self.delete(Column::Tweak, codec::tweak_key(block_hash, txid));
    }

    pub fn put_utxo(&mut self, utxo: &Utxo) {
        self.put(
            Column::Utxo,
            codec::utxo_key(&utxo.block_hash, &utxo.txid, utxo.vout),
            codec::encode_utxo(utxo),
        );
    }

    pub fn delete_utxo(&mut self, block_hash: &BlockHash, txid: &Txid, vout: u32) {
        self.delete(Column::Utxo, codec::utxo_key(block_hash, txid, vout));
    }

    pub fn put_header_inv(&mut self, inv: &BlockHeaderInv) {
        self.put(
            Column::HeaderInv,
            codec::height_key(inv.height).to_vec(),
            codec::encode_header_inv(inv),
        );
    }

    pub fn put_header(&mut self, header: &BlockHeader) {
        self.put(
            Column::Header,
            codec::block_key(&header.hash),
            codec::encode_header(header),
        );
    }

    pub fn put_spent_index(&mut self, index: &SpentOutpointsIndex) {
        self.put(
            Column::SpentIndex,
            codec::block_key(&index.block_hash),
            codec::encode_spent_index(index),
        );
    }

    pub fn put_tweak_index(&mut self, index: &TweakIndex) {
        self.put(
            Column::TweakIndex,
            codec::block_key(&index.block_hash),
            codec::encode_tweak_index(index),
        );
    }

    pub fn put_tweak_index_dust(&mut self, index: &TweakIndexDust) {
        self.put(
            Column::TweakIndexDust,
            codec::block_key(&index.block_hash),
            codec::encode_tweak_index_dust(index),
        );
    }

    pub fn put_filter(&mut self, filter: &FilterData) {
        self.put(
            Column::Filter,
            codec::filter_key(filter.filter_type, &filter.block_hash),
            filter.data.clone(),
        );
    }
}
