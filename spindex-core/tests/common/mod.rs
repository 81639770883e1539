#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use spindex_core::bitcoin::hashes::Hash;
use spindex_core::bitcoin::secp256k1::{Keypair, Secp256k1, SecretKey};
use spindex_core::bitcoin::{Amount, BlockHash, OutPoint, ScriptBuf, TxOut, Txid, Witness};
use spindex_core::store::{Column, KeyValueStore, ScanResult, WriteBatch};
use spindex_core::{
    Block, BlockHeader, BlockPipeline, BlockTx, ChainBackend, ChainSync, Db, Error, MemoryStore,
    OracleConfig, PrevOut, StateUpdater, StoreError, TipPoller, TxInput,
};
use tokio_util::sync::CancellationToken;

pub fn taproot_script(seed: u8) -> ScriptBuf {
    let secp = Secp256k1::new();
    let mut bytes = [seed; 32];
    bytes[0] = 0x01;
    let secret = SecretKey::from_slice(&bytes).unwrap();
    let (xonly, _) = Keypair::from_secret_key(&secp, &secret).x_only_public_key();
    let mut script = vec![0x51, 0x20];
    script.extend_from_slice(&xonly.serialize());
    ScriptBuf::from_bytes(script)
}

/// An output that can be spent by a later transaction.
#[derive(Debug, Clone)]
pub struct Coin {
    pub outpoint: OutPoint,
    pub txout: TxOut,
    pub height: u32,
}

impl Coin {
    pub fn of(tx: &BlockTx, vout: u32, height: u32) -> Self {
        Self {
            outpoint: OutPoint { txid: tx.txid, vout },
            txout: tx.outputs[vout as usize].clone(),
            height,
        }
    }
}

/// Key-path spend of `coins` paying `values` to fresh taproot outputs.
pub fn spend(id: u8, coins: &[Coin], values: &[u64]) -> BlockTx {
    BlockTx {
        txid: Txid::from_byte_array([id; 32]),
        inputs: coins
            .iter()
            .map(|coin| TxInput {
                previous_output: coin.outpoint,
                script_sig: ScriptBuf::new(),
                witness: Witness::from_slice(&[vec![0u8; 64]]),
                prevout: Some(PrevOut {
                    txout: coin.txout.clone(),
                    height: coin.height,
                }),
            })
            .collect(),
        outputs: values
            .iter()
            .enumerate()
            .map(|(i, value)| TxOut {
                value: Amount::from_sat(*value),
                script_pubkey: taproot_script(id.wrapping_add(i as u8).wrapping_add(1)),
            })
            .collect(),
    }
}

/// A transaction funded from an output that predates the indexed range.
pub fn funding(id: u8, values: &[u64]) -> BlockTx {
    let mut prev = [0xee; 32];
    prev[0] = id;
    let coin = Coin {
        outpoint: OutPoint {
            txid: Txid::from_byte_array(prev),
            vout: 0,
        },
        txout: TxOut {
            value: Amount::from_sat(1_000_000),
            script_pubkey: taproot_script(id.wrapping_add(100)),
        },
        height: 0,
    };
    spend(id, &[coin], values)
}

pub fn block_hash(height: u32, fork: u8) -> BlockHash {
    let mut bytes = [0u8; 32];
    bytes[..4].copy_from_slice(&height.to_le_bytes());
    bytes[4] = fork;
    bytes[31] = 0xa5;
    BlockHash::from_byte_array(bytes)
}

pub fn block(height: u32, txs: Vec<BlockTx>) -> Block {
    Block {
        hash: block_hash(height, 0),
        height,
        prev_hash: block_hash(height.saturating_sub(1), 0),
        time: 1_700_000_000 + height,
        txs,
    }
}

pub fn empty_blocks(start: u32, end: u32) -> Vec<Block> {
    (start..end).map(|height| block(height, Vec::new())).collect()
}

#[derive(Default)]
pub struct MockChain {
    blocks: Mutex<BTreeMap<u32, Block>>,
    jitter: bool,
}

impl MockChain {
    pub fn new(blocks: Vec<Block>) -> Self {
        let chain = Self::default();
        chain.extend(blocks);
        chain
    }

    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }

    pub fn extend(&self, blocks: Vec<Block>) {
        let mut map = self.blocks.lock().unwrap();
        for block in blocks {
            map.insert(block.height, block);
        }
    }

    fn find(&self, hash: &BlockHash) -> spindex_core::Result<Block> {
        self.blocks
            .lock()
            .unwrap()
            .values()
            .find(|block| block.hash == *hash)
            .cloned()
            .ok_or_else(|| Error::backend("getblock", format!("unknown block {hash}")))
    }
}

#[async_trait]
impl ChainBackend for MockChain {
    async fn best_block_hash(&self) -> spindex_core::Result<BlockHash> {
        let blocks = self.blocks.lock().unwrap();
        blocks
            .values()
            .next_back()
            .map(|block| block.hash)
            .ok_or_else(|| Error::backend("getbestblockhash", "empty chain"))
    }

    async fn tip_height(&self) -> spindex_core::Result<u32> {
        let blocks = self.blocks.lock().unwrap();
        blocks
            .keys()
            .next_back()
            .copied()
            .ok_or_else(|| Error::backend("getblockchaininfo", "empty chain"))
    }

    async fn block_hash(&self, height: u32) -> spindex_core::Result<BlockHash> {
        let blocks = self.blocks.lock().unwrap();
        blocks
            .get(&height)
            .map(|block| block.hash)
            .ok_or_else(|| Error::backend("getblockhash", format!("no block at {height}")))
    }

    async fn block_header(&self, hash: &BlockHash) -> spindex_core::Result<BlockHeader> {
        let block = self.find(hash)?;
        Ok(BlockHeader {
            hash: block.hash,
            prev_hash: block.prev_hash,
            time: block.time,
            height: block.height,
        })
    }

    async fn block(&self, hash: &BlockHash) -> spindex_core::Result<Block> {
        let block = self.find(hash)?;
        if self.jitter {
            let delay = u64::from((block.height * 13) % 7);
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        Ok(block)
    }
}

/// Memory store that counts every mutation.
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryStore,
    writes: AtomicUsize,
}

impl CountingStore {
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl KeyValueStore for CountingStore {
    fn get(&self, column: Column, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        self.inner.get(column, key)
    }

    fn put(&self, column: Column, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.put(column, key, value)
    }

    fn delete(&self, column: Column, key: &[u8]) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(column, key)
    }

    fn scan_prefix(&self, column: Column, prefix: &[u8]) -> Result<ScanResult, StoreError> {
        self.inner.scan_prefix(column, prefix)
    }

    fn scan_range(&self, column: Column, start: &[u8], end: &[u8]) -> Result<ScanResult, StoreError> {
        self.inner.scan_range(column, start, end)
    }

    fn write_batch(&self, batch: &WriteBatch) -> Result<(), StoreError> {
        self.writes.fetch_add(batch.len(), Ordering::SeqCst);
        self.inner.write_batch(batch)
    }
}

/// Wires a mock node, a counting store and the sync components together.
pub struct Harness {
    pub chain: Arc<MockChain>,
    pub store: Arc<CountingStore>,
    pub db: Db,
    pub updater: Arc<StateUpdater>,
    pub sync: ChainSync,
    pub poller: TipPoller,
}

impl Harness {
    pub fn new(chain: MockChain, config: OracleConfig) -> Self {
        let chain = Arc::new(chain);
        let store = Arc::new(CountingStore::default());
        let db = Db::new(store.clone());
        let updater = Arc::new(StateUpdater::new(db.clone(), config.clone()));
        let pipeline = BlockPipeline::new(
            chain.clone(),
            updater.clone(),
            db.clone(),
            config.max_parallel_requests,
            config.fetch_channel_capacity,
        );
        Self {
            sync: ChainSync::new(chain.clone(), db.clone(), pipeline.clone(), config.clone()),
            poller: TipPoller::new(chain.clone(), db.clone(), pipeline, config),
            chain,
            store,
            db,
            updater,
        }
    }

    /// Bulk sync followed by one tip poll, as the daemon does on startup.
    pub async fn sync(&self) -> usize {
        let cancel = CancellationToken::new();
        let bulk = self.sync.sync_to_tip(&cancel).await.unwrap();
        bulk + self.poller.poll_once(&cancel).await.unwrap()
    }
}
