use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bitcoin::hashes::Hash;
use bitcoin::secp256k1::{Keypair, Secp256k1, SecretKey};
use bitcoin::{Amount, BlockHash, OutPoint, ScriptBuf, TxOut, Txid, Witness};

use crate::backend::ChainBackend;
use crate::error::{Error, Result};
use crate::structs::{Block, BlockHeader, BlockTx, PrevOut, TxInput};

pub fn p2tr_script(seed: u8) -> ScriptBuf {
    let secp = Secp256k1::new();
    let mut bytes = [seed; 32];
    bytes[0] = 0x01;
    let secret = SecretKey::from_slice(&bytes).unwrap();
    let (xonly, _) = Keypair::from_secret_key(&secp, &secret).x_only_public_key();
    let mut script = vec![0x51, 0x20];
    script.extend_from_slice(&xonly.serialize());
    ScriptBuf::from_bytes(script)
}

pub fn p2tr_outputs(seed: u8, values: &[u64]) -> Vec<TxOut> {
    values
        .iter()
        .enumerate()
        .map(|(i, value)| TxOut {
            value: Amount::from_sat(*value),
            script_pubkey: p2tr_script(seed.wrapping_add(i as u8 + 1)),
        })
        .collect()
}

/// A key-path taproot spend of one fresh output, paying `values` to new
/// taproot outputs.
pub fn p2tr_spend_tx(seed: u8, values: &[u64]) -> BlockTx {
    let mut prev_txid = [0xee; 32];
    prev_txid[0] = seed;
    BlockTx {
        txid: Txid::from_byte_array([seed; 32]),
        inputs: vec![TxInput {
            previous_output: OutPoint {
                txid: Txid::from_byte_array(prev_txid),
                vout: 0,
            },
            script_sig: ScriptBuf::new(),
            witness: Witness::from_slice(&[vec![0u8; 64]]),
            prevout: Some(PrevOut {
                txout: TxOut {
                    value: Amount::from_sat(100_000),
                    script_pubkey: p2tr_script(seed),
                },
                height: 1,
            }),
        }],
        outputs: p2tr_outputs(seed.wrapping_mul(7), values),
    }
}

/// Two P2PKH inputs from the first BIP352 sending vector and one taproot
/// output worth 1000 sat.
pub fn bip352_simple_send() -> BlockTx {
    let input = |txid: &str, script_sig: &str, prevout: &str| TxInput {
        previous_output: OutPoint {
            txid: Txid::from_str(txid).unwrap(),
            vout: 0,
        },
        script_sig: ScriptBuf::from_bytes(hex::decode(script_sig).unwrap()),
        witness: Witness::new(),
        prevout: Some(PrevOut {
            txout: TxOut {
                value: Amount::from_sat(10_000),
                script_pubkey: ScriptBuf::from_bytes(hex::decode(prevout).unwrap()),
            },
            height: 1,
        }),
    };

    BlockTx {
        txid: Txid::from_byte_array([0xab; 32]),
        inputs: vec![
            input(
                "f4184fc596403b9d638783cf57adfe4c75c605f6356fbc91338530e9831e9e16",
                "483046022100ad79e6801dd9a8727f342f31c71c4912866f59dc6e7981878e92c5844a0ce929022100fb0d2393e813968648b9753b7e9871d90ab3d815ebf91820d704b19f4ed224d621025a1e61f898173040e20616d43e9f496fba90338a39faa1ed98fcbaeee4dd9be5",
                "76a91419c2f3ae0ca3b642bd3e49598b8da89f50c1416188ac",
            ),
            input(
                "a1075db55d416d3ca199f55b6084e2115b9345e16c5cf302fc80e9d5fbf5d48d",
                "48304602210086783ded73e961037e77d49d9deee4edc2b23136e9728d56e4491c80015c3a63022100fda4c0f21ea18de29edbce57f7134d613e044ee150a89e2e64700de2d4e83d4e2103bd85685d03d111699b15d046319febe77f8de5286e9e512703cdee1bf3be3792",
                "76a914d9317c66f54ff0a152ec50b1d19c25be50c8e15988ac",
            ),
        ],
        outputs: p2tr_outputs(9, &[1_000]),
    }
}

/// Deterministic block hash. `fork` separates competing chains.
pub fn block_hash(height: u32, fork: u8) -> BlockHash {
    let mut bytes = [0u8; 32];
    bytes[..4].copy_from_slice(&height.to_le_bytes());
    bytes[4] = fork;
    bytes[31] = 0x5a;
    BlockHash::from_byte_array(bytes)
}

/// Linked blocks for heights `[start, end)` without transactions.
pub fn empty_chain(start: u32, end: u32, fork: u8) -> Vec<Block> {
    (start..end)
        .map(|height| Block {
            hash: block_hash(height, fork),
            height,
            prev_hash: block_hash(height.saturating_sub(1), fork),
            time: 1_700_000_000 + height,
            txs: Vec::new(),
        })
        .collect()
}

/// In-memory node. Block fetches can be delayed by a height-dependent amount
/// so that concurrent requests complete out of order.
#[derive(Default)]
pub struct MockChain {
    blocks: Mutex<BTreeMap<u32, Block>>,
    fetches: AtomicUsize,
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

    /// Adds or replaces blocks by height.
    pub fn extend(&self, blocks: Vec<Block>) {
        let mut map = self.blocks.lock().unwrap();
        for block in blocks {
            map.insert(block.height, block);
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn find(&self, hash: &BlockHash) -> Result<Block> {
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
    async fn best_block_hash(&self) -> Result<BlockHash> {
        let blocks = self.blocks.lock().unwrap();
        blocks
            .values()
            .next_back()
            .map(|block| block.hash)
            .ok_or_else(|| Error::backend("getbestblockhash", "empty chain"))
    }

    async fn tip_height(&self) -> Result<u32> {
        let blocks = self.blocks.lock().unwrap();
        blocks
            .keys()
            .next_back()
            .copied()
            .ok_or_else(|| Error::backend("getblockchaininfo", "empty chain"))
    }

    async fn block_hash(&self, height: u32) -> Result<BlockHash> {
        let blocks = self.blocks.lock().unwrap();
        blocks
            .get(&height)
            .map(|block| block.hash)
            .ok_or_else(|| Error::backend("getblockhash", format!("no block at {height}")))
    }

    async fn block_header(&self, hash: &BlockHash) -> Result<BlockHeader> {
        let block = self.find(hash)?;
        Ok(BlockHeader {
            hash: block.hash,
            prev_hash: block.prev_hash,
            time: block.time,
            height: block.height,
        })
    }

    async fn block(&self, hash: &BlockHash) -> Result<Block> {
        let block = self.find(hash)?;
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.jitter {
            let delay = u64::from((block.height * 7) % 5);
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        Ok(block)
    }
}
