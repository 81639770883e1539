use bitcoin::{BlockHash, OutPoint, ScriptBuf, TxOut, Txid, Witness};

/// A block as delivered by the node, with every input's previous output
/// resolved inline.
#[derive(Debug, Clone)]
pub struct Block {
    pub hash: BlockHash,
    pub height: u32,
    pub prev_hash: BlockHash,
    pub time: u32,
    pub txs: Vec<BlockTx>,
}

#[derive(Debug, Clone)]
pub struct BlockTx {
    pub txid: Txid,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOut>,
}

impl BlockTx {
    pub fn has_taproot_output(&self) -> bool {
        self.outputs.iter().any(|out| out.script_pubkey.is_p2tr())
    }

    /// Taproot outputs with their output index.
    pub fn taproot_outputs(&self) -> impl Iterator<Item = (u32, &TxOut)> {
        self.outputs
            .iter()
            .enumerate()
            .filter(|(_, out)| out.script_pubkey.is_p2tr())
            .map(|(vout, out)| (vout as u32, out))
    }
}

#[derive(Debug, Clone)]
pub struct TxInput {
    pub previous_output: OutPoint,
    pub script_sig: ScriptBuf,
    pub witness: Witness,
    /// `None` for coinbase inputs.
    pub prevout: Option<PrevOut>,
}

impl TxInput {
    pub fn is_coinbase(&self) -> bool {
        self.prevout.is_none() || self.previous_output.is_null()
    }
}

/// The output an input spends and the height of the block that created it.
#[derive(Debug, Clone)]
pub struct PrevOut {
    pub txout: TxOut,
    pub height: u32,
}

/// Header as returned by the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub hash: BlockHash,
    pub prev_hash: BlockHash,
    pub time: u32,
    pub height: u32,
}

/// Height to hash entry. `processed` flips once the block body has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeaderInv {
    pub hash: BlockHash,
    pub height: u32,
    pub processed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tweak {
    pub block_hash: BlockHash,
    pub block_height: u32,
    pub txid: Txid,
    pub data: [u8; 33],
    pub highest_value: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utxo {
    pub txid: Txid,
    pub vout: u32,
    pub value: u64,
    pub script_pubkey: ScriptBuf,
    pub block_height: u32,
    pub block_hash: BlockHash,
    pub timestamp: u32,
    pub spent: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpentOutpointsIndex {
    pub block_hash: BlockHash,
    pub block_height: u32,
    pub data: Vec<[u8; 8]>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TweakIndex {
    pub block_hash: BlockHash,
    pub block_height: u32,
    pub data: Vec<[u8; 33]>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TweakIndexDust {
    pub block_hash: BlockHash,
    pub block_height: u32,
    pub data: Vec<([u8; 33], u64)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterType {
    NewUtxos,
    Spent,
}

impl FilterType {
    pub const fn tag(self) -> u8 {
        match self {
            FilterType::NewUtxos => 0,
            FilterType::Spent => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterData {
    pub filter_type: FilterType,
    pub block_hash: BlockHash,
    pub data: Vec<u8>,
}
