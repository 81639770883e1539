use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use bitcoin::{BlockHash, Txid};
use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use super::cut_through::{highest_value_update, spend_outputs, HighestValueUpdate, SpendEffect};
use super::BlockProcessor;
use crate::config::OracleConfig;
use crate::constants::PROBE_VALUE;
use crate::error::{Error, Result};
use crate::filters::{new_utxos_filter, spent_filter, spent_outpoint_hash};
use crate::store::{BatchWriter, Db, WriteBatch};
use crate::structs::{
    Block, BlockHeader, BlockHeaderInv, BlockTx, SpentOutpointsIndex, Tweak, TweakIndex,
    TweakIndexDust, Utxo,
};
use crate::tweak::{select_distribution, TxTweak};

/// Counts reported after a block has been applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockSummary {
    pub tweaks: usize,
    pub new_utxos: usize,
    pub spent_taproot_inputs: usize,
}

/// Persists blocks and maintains the cut-through state.
pub struct StateUpdater {
    db: Db,
    config: OracleConfig,
}

/// Spent taproot outputs of one block, grouped by the transaction that
/// created them.
#[derive(Default)]
struct Spends {
    hashes: Vec<[u8; 8]>,
    groups: BTreeMap<(BlockHash, Txid), Vec<u32>>,
}

/// Rows created by the block being applied. Same-block spends are resolved
/// against these before anything is written.
struct PendingRows {
    tweaks: HashMap<Txid, Tweak>,
    utxos: BTreeMap<Txid, Vec<Utxo>>,
}

impl StateUpdater {
    pub fn new(db: Db, config: OracleConfig) -> Self {
        Self { db, config }
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    /// Applies `block` in a single atomic write.
    pub async fn apply_block(
        &self,
        block: Block,
        cancel: &CancellationToken,
    ) -> Result<BlockSummary> {
        let Block {
            hash,
            height,
            prev_hash,
            time,
            txs,
        } = block;
        let txs: Arc<[BlockTx]> = txs.into();

        let strategy = select_distribution(txs.len(), &self.config);
        let computed = strategy.compute(txs.clone(), cancel).await?;
        debug!(
            "block {height}: {} tweaks via {} strategy",
            computed.len(),
            strategy.name()
        );
        let tweaked: HashMap<Txid, TxTweak> =
            computed.into_iter().map(|tweak| (tweak.txid, tweak)).collect();

        let mut pending = PendingRows::new(hash, height, time, &txs, &tweaked);
        let created: Vec<Utxo> = pending.utxos.values().flatten().cloned().collect();
        let spends = self.collect_spends(hash, height, &txs)?;

        let mut batch = WriteBatch::new();
        self.write_indexes(&mut batch, hash, height, &pending);
        batch.put_filter(&new_utxos_filter(hash, &created)?);
        batch.put_filter(&spent_filter(hash, &spends.hashes)?);
        batch.put_spent_index(&SpentOutpointsIndex {
            block_hash: hash,
            block_height: height,
            data: spends.hashes.clone(),
        });

        for ((origin, txid), vouts) in &spends.groups {
            if *origin == hash {
                pending.spend(txid, vouts, self.config.index.cut_through);
            } else {
                self.spend_persisted(&mut batch, origin, txid, vouts)?;
            }
        }
        pending.write(&mut batch, self.config.index.cut_through);

        batch.put_header(&BlockHeader {
            hash,
            prev_hash,
            time,
            height,
        });
        batch.put_header_inv(&BlockHeaderInv {
            hash,
            height,
            processed: true,
        });
        self.db.write(&batch)?;

        Ok(BlockSummary {
            tweaks: tweaked.len(),
            new_utxos: created.len(),
            spent_taproot_inputs: spends.hashes.len(),
        })
    }

    /// Recomputes the highest value of every stored tweak from its unspent
    /// outputs. Tweaks without unspent outputs are removed.
    pub fn reindex_highest_values(&self) -> Result<usize> {
        let writer = BatchWriter::new(self.db.store().clone(), self.config.batch_flush_threshold);
        let mut changed = 0;

        for tweak in self.db.all_tweaks()? {
            let mut before: Vec<u64> = self
                .db
                .utxo_group(&tweak.block_hash, &tweak.txid)?
                .into_iter()
                .filter(|utxo| !utxo.spent)
                .map(|utxo| utxo.value)
                .collect();
            before.push(PROBE_VALUE);

            let mut ops = WriteBatch::new();
            match highest_value_update(&before, &[PROBE_VALUE]) {
                HighestValueUpdate::Set(value) if value == tweak.highest_value => continue,
                HighestValueUpdate::Set(value) => ops.put_tweak(&Tweak {
                    highest_value: value,
                    ..tweak
                }),
                HighestValueUpdate::Delete => ops.delete_tweak(&tweak.block_hash, &tweak.txid),
                HighestValueUpdate::Unchanged => continue,
            }
            writer.append(ops)?;
            changed += 1;
        }

        writer.flush()?;
        info!("reindexed highest values, {changed} tweaks changed");
        Ok(changed)
    }

    fn collect_spends(&self, hash: BlockHash, height: u32, txs: &[BlockTx]) -> Result<Spends> {
        let mut spends = Spends::default();
        let mut origins: HashMap<u32, Option<BlockHash>> = HashMap::new();

        for input in txs.iter().flat_map(|tx| tx.inputs.iter()) {
            let Some(prevout) = &input.prevout else {
                continue;
            };
            if input.previous_output.is_null() || !prevout.txout.script_pubkey.is_p2tr() {
                continue;
            }
            spends
                .hashes
                .push(spent_outpoint_hash(&input.previous_output, &hash));

            let origin = if prevout.height == height {
                Some(hash)
            } else if let Some(origin) = origins.get(&prevout.height) {
                *origin
            } else {
                let origin = self.resolve_origin(prevout.height)?;
                origins.insert(prevout.height, origin);
                origin
            };

            if let Some(origin) = origin {
                spends
                    .groups
                    .entry((origin, input.previous_output.txid))
                    .or_default()
                    .push(input.previous_output.vout);
            }
        }
        Ok(spends)
    }

    /// Hash of the block at `height`, `None` when it predates indexing.
    fn resolve_origin(&self, height: u32) -> Result<Option<BlockHash>> {
        match self.db.header_inv(height)? {
            Some(inv) => Ok(Some(inv.hash)),
            None if height < self.config.sync_start_height => Ok(None),
            None => Err(Error::MissingHeaderInv(height)),
        }
    }

    fn spend_persisted(
        &self,
        batch: &mut WriteBatch,
        origin: &BlockHash,
        txid: &Txid,
        vouts: &[u32],
    ) -> Result<()> {
        let mut group = self.db.utxo_group(origin, txid)?;
        if group.is_empty() {
            return Ok(());
        }
        let Some(effect) = spend_outputs(&mut group, vouts) else {
            return Ok(());
        };

        if effect.all_spent {
            for row in &group {
                batch.delete_utxo(origin, txid, row.vout);
            }
        } else {
            for row in group.iter().filter(|row| effect.newly_spent.contains(&row.vout)) {
                batch.put_utxo(row);
            }
        }

        if self.config.index.cut_through {
            match effect.highest_value {
                HighestValueUpdate::Unchanged => {}
                HighestValueUpdate::Delete => batch.delete_tweak(origin, txid),
                HighestValueUpdate::Set(value) => {
                    if let Some(tweak) = self.db.tweak(origin, txid)? {
                        batch.put_tweak(&Tweak {
                            highest_value: value,
                            ..tweak
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn write_indexes(
        &self,
        batch: &mut WriteBatch,
        hash: BlockHash,
        height: u32,
        pending: &PendingRows,
    ) {
        let index = &self.config.index;
        // highest values as created, before any same-block spend
        let mut created: Vec<([u8; 33], u64)> = pending
            .tweaks
            .values()
            .map(|tweak| (tweak.data, tweak.highest_value))
            .collect();
        created.sort_unstable();

        if index.full_basic {
            batch.put_tweak_index(&TweakIndex {
                block_hash: hash,
                block_height: height,
                data: created.iter().map(|(data, _)| *data).collect(),
            });
        }
        if index.full_with_dust {
            batch.put_tweak_index_dust(&TweakIndexDust {
                block_hash: hash,
                block_height: height,
                data: created,
            });
        }
    }
}

impl PendingRows {
    fn new(
        hash: BlockHash,
        height: u32,
        time: u32,
        txs: &[BlockTx],
        tweaked: &HashMap<Txid, TxTweak>,
    ) -> Self {
        let mut tweaks = HashMap::with_capacity(tweaked.len());
        let mut utxos = BTreeMap::new();

        for tx in txs {
            let Some(tweak) = tweaked.get(&tx.txid) else {
                continue;
            };
            if tweak.highest_value == 0 {
                warn!("tx {} at height {height} only has zero-value taproot outputs", tx.txid);
            }
            tweaks.insert(
                tx.txid,
                Tweak {
                    block_hash: hash,
                    block_height: height,
                    txid: tx.txid,
                    data: tweak.data,
                    highest_value: tweak.highest_value,
                },
            );
            let rows: Vec<Utxo> = tx
                .taproot_outputs()
                .map(|(vout, out)| Utxo {
                    txid: tx.txid,
                    vout,
                    value: out.value.to_sat(),
                    script_pubkey: out.script_pubkey.clone(),
                    block_height: height,
                    block_hash: hash,
                    timestamp: time,
                    spent: false,
                })
                .collect();
            utxos.insert(tx.txid, rows);
        }

        Self { tweaks, utxos }
    }

    fn spend(&mut self, txid: &Txid, vouts: &[u32], cut_through: bool) {
        let Some(group) = self.utxos.get_mut(txid) else {
            return;
        };
        let Some(SpendEffect { highest_value, .. }) = spend_outputs(group, vouts) else {
            return;
        };
        if !cut_through {
            return;
        }
        match highest_value {
            HighestValueUpdate::Unchanged => {}
            HighestValueUpdate::Delete => {
                self.tweaks.remove(txid);
            }
            HighestValueUpdate::Set(value) => {
                if let Some(tweak) = self.tweaks.get_mut(txid) {
                    tweak.highest_value = value;
                }
            }
        }
    }

    fn write(&self, batch: &mut WriteBatch, cut_through: bool) {
        if cut_through {
            for tweak in self.tweaks.values() {
                batch.put_tweak(tweak);
            }
        }
        for group in self.utxos.values() {
            if group.iter().all(|row| row.spent) {
                continue;
            }
            for row in group {
                batch.put_utxo(row);
            }
        }
    }
}

#[async_trait]
impl BlockProcessor for StateUpdater {
    async fn process_block(&self, block: Block, cancel: &CancellationToken) -> Result<()> {
        let height = block.height;
        let summary = self.apply_block(block, cancel).await?;
        debug!("applied block {height}: {summary:?}");
        Ok(())
    }
}
