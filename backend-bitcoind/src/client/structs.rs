//! bitcoind JSON-RPC request and response shapes.

use bitcoin::hashes::Hash;
use bitcoin::{Amount, BlockHash, OutPoint, ScriptBuf, TxOut, Txid, Witness};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use spindex_core::{Block, BlockHeader, BlockTx, PrevOut, TxInput};

use crate::error::{Error, Result};

#[derive(Debug, Serialize)]
pub struct RpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: Value,
}

#[derive(Debug, Deserialize)]
pub struct RpcResponse<T> {
    pub id: Option<u64>,
    pub result: Option<T>,
    pub error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
}

/// Subset of `getblockchaininfo`.
#[derive(Debug, Clone, Deserialize)]
pub struct BlockchainInfoResponse {
    pub blocks: u32,
    pub bestblockhash: BlockHash,
}

/// `getblockheader <hash> true`.
#[derive(Debug, Clone, Deserialize)]
pub struct HeaderResponse {
    pub hash: BlockHash,
    pub height: u32,
    pub time: u32,
    /// Absent for the genesis block.
    pub previousblockhash: Option<BlockHash>,
}

impl From<HeaderResponse> for BlockHeader {
    fn from(header: HeaderResponse) -> Self {
        BlockHeader {
            hash: header.hash,
            prev_hash: header.previousblockhash.unwrap_or_else(BlockHash::all_zeros),
            time: header.time,
            height: header.height,
        }
    }
}

/// `getblock <hash> 3`.
#[derive(Debug, Clone, Deserialize)]
pub struct BlockResponse {
    pub hash: BlockHash,
    pub height: u32,
    pub time: u32,
    pub previousblockhash: Option<BlockHash>,
    pub tx: Vec<TxResponse>,
}

/// Transaction as embedded in `getblock 3` or returned by
/// `getrawtransaction <txid> 2`.
#[derive(Debug, Clone, Deserialize)]
pub struct TxResponse {
    pub txid: Txid,
    pub vin: Vec<VinResponse>,
    pub vout: Vec<VoutResponse>,
    /// Only set by `getrawtransaction`.
    #[serde(default)]
    pub blockhash: Option<BlockHash>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VinResponse {
    #[serde(default)]
    pub coinbase: Option<String>,
    #[serde(default)]
    pub txid: Option<Txid>,
    #[serde(default)]
    pub vout: Option<u32>,
    #[serde(rename = "scriptSig", default)]
    pub script_sig: Option<ScriptHex>,
    #[serde(default)]
    pub txinwitness: Vec<String>,
    /// Missing when the node cannot resolve the spent output.
    #[serde(default)]
    pub prevout: Option<PrevoutResponse>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrevoutResponse {
    pub height: u32,
    #[serde(with = "bitcoin::amount::serde::as_btc")]
    pub value: Amount,
    #[serde(rename = "scriptPubKey")]
    pub script_pub_key: ScriptHex,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoutResponse {
    #[serde(with = "bitcoin::amount::serde::as_btc")]
    pub value: Amount,
    pub n: u32,
    #[serde(rename = "scriptPubKey")]
    pub script_pub_key: ScriptHex,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptHex {
    #[serde(with = "hex::serde")]
    pub hex: Vec<u8>,
}

impl From<ScriptHex> for ScriptBuf {
    fn from(script: ScriptHex) -> Self {
        ScriptBuf::from_bytes(script.hex)
    }
}

impl From<VoutResponse> for TxOut {
    fn from(out: VoutResponse) -> Self {
        TxOut {
            value: out.value,
            script_pubkey: out.script_pub_key.into(),
        }
    }
}

impl From<PrevoutResponse> for PrevOut {
    fn from(prevout: PrevoutResponse) -> Self {
        PrevOut {
            txout: TxOut {
                value: prevout.value,
                script_pubkey: prevout.script_pub_key.into(),
            },
            height: prevout.height,
        }
    }
}

impl TryFrom<VinResponse> for TxInput {
    type Error = Error;

    fn try_from(vin: VinResponse) -> Result<Self> {
        let witness: Vec<Vec<u8>> = vin
            .txinwitness
            .iter()
            .map(hex::decode)
            .collect::<std::result::Result<_, _>>()?;

        let previous_output = match (vin.coinbase.is_some(), vin.txid, vin.vout) {
            (true, _, _) => OutPoint::null(),
            (false, Some(txid), Some(vout)) => OutPoint { txid, vout },
            _ => {
                return Err(Error::InvalidResponse(
                    "input without coinbase or outpoint".to_string(),
                ))
            }
        };

        Ok(TxInput {
            previous_output,
            script_sig: vin.script_sig.map(ScriptBuf::from).unwrap_or_default(),
            witness: Witness::from_slice(&witness),
            prevout: vin.prevout.map(PrevOut::from),
        })
    }
}

impl TryFrom<TxResponse> for BlockTx {
    type Error = Error;

    fn try_from(tx: TxResponse) -> Result<Self> {
        let mut vout = tx.vout;
        vout.sort_by_key(|out| out.n);
        Ok(BlockTx {
            txid: tx.txid,
            inputs: tx
                .vin
                .into_iter()
                .map(TxInput::try_from)
                .collect::<Result<_>>()?,
            outputs: vout.into_iter().map(TxOut::from).collect(),
        })
    }
}

impl TryFrom<BlockResponse> for Block {
    type Error = Error;

    fn try_from(block: BlockResponse) -> Result<Self> {
        Ok(Block {
            hash: block.hash,
            height: block.height,
            prev_hash: block.previousblockhash.unwrap_or_else(BlockHash::all_zeros),
            time: block.time,
            txs: block
                .tx
                .into_iter()
                .map(BlockTx::try_from)
                .collect::<Result<_>>()?,
        })
    }
}
