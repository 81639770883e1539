//! Fixed-width record encodings.
//!
//! Hashes are stored in internal byte order and every integer is big-endian,
//! so keys sort by block hash, txid and vout (or by height for the header
//! inventory).

use bitcoin::hashes::Hash;
use bitcoin::{BlockHash, ScriptBuf, Txid};

use crate::error::{Error, Result};
use crate::structs::{
    BlockHeader, BlockHeaderInv, FilterData, FilterType, SpentOutpointsIndex, Tweak, TweakIndex,
    TweakIndexDust, Utxo,
};

pub const HASH_LEN: usize = 32;
pub const TWEAK_LEN: usize = 33;

/// Key of the per-block records, and prefix of every tweak and UTXO row of
/// that block.
pub fn block_key(block_hash: &BlockHash) -> Vec<u8> {
    block_hash.as_byte_array().to_vec()
}

pub fn tweak_key(block_hash: &BlockHash, txid: &Txid) -> Vec<u8> {
    let mut key = Vec::with_capacity(2 * HASH_LEN);
    key.extend_from_slice(block_hash.as_byte_array());
    key.extend_from_slice(txid.as_byte_array());
    key
}

pub fn encode_tweak(tweak: &Tweak) -> Vec<u8> {
    let mut value = Vec::with_capacity(TWEAK_LEN + 12);
    value.extend_from_slice(&tweak.data);
    value.extend_from_slice(&tweak.highest_value.to_be_bytes());
    value.extend_from_slice(&tweak.block_height.to_be_bytes());
    value
}

pub fn decode_tweak(key: &[u8], value: &[u8]) -> Result<Tweak> {
    let mut k = Reader::new("tweak", key);
    let block_hash = k.block_hash()?;
    let txid = k.txid()?;
    k.finish()?;

    let mut v = Reader::new("tweak", value);
    let data = v.array::<TWEAK_LEN>()?;
    let highest_value = v.u64()?;
    let block_height = v.u32()?;
    v.finish()?;

    Ok(Tweak {
        block_hash,
        block_height,
        txid,
        data,
        highest_value,
    })
}

/// Prefix of every UTXO row created by `txid` in `block_hash`.
pub fn utxo_group_prefix(block_hash: &BlockHash, txid: &Txid) -> Vec<u8> {
    tweak_key(block_hash, txid)
}

pub fn utxo_key(block_hash: &BlockHash, txid: &Txid, vout: u32) -> Vec<u8> {
    let mut key = utxo_group_prefix(block_hash, txid);
    key.extend_from_slice(&vout.to_be_bytes());
    key
}

pub fn encode_utxo(utxo: &Utxo) -> Vec<u8> {
    let script = utxo.script_pubkey.as_bytes();
    let mut value = Vec::with_capacity(17 + script.len());
    value.extend_from_slice(&utxo.value.to_be_bytes());
    value.extend_from_slice(&utxo.block_height.to_be_bytes());
    value.extend_from_slice(&utxo.timestamp.to_be_bytes());
    value.push(utxo.spent as u8);
    value.extend_from_slice(script);
    value
}

pub fn decode_utxo(key: &[u8], value: &[u8]) -> Result<Utxo> {
    let mut k = Reader::new("utxo", key);
    let block_hash = k.block_hash()?;
    let txid = k.txid()?;
    let vout = k.u32()?;
    k.finish()?;

    let mut v = Reader::new("utxo", value);
    let amount = v.u64()?;
    let block_height = v.u32()?;
    let timestamp = v.u32()?;
    let spent = v.flag()?;
    let script_pubkey = ScriptBuf::from_bytes(v.rest().to_vec());

    Ok(Utxo {
        txid,
        vout,
        value: amount,
        script_pubkey,
        block_height,
        block_hash,
        timestamp,
        spent,
    })
}

pub fn height_key(height: u32) -> [u8; 4] {
    height.to_be_bytes()
}

pub fn encode_header_inv(inv: &BlockHeaderInv) -> Vec<u8> {
    let mut value = Vec::with_capacity(HASH_LEN + 1);
    value.extend_from_slice(inv.hash.as_byte_array());
    value.push(inv.processed as u8);
    value
}

pub fn decode_header_inv(key: &[u8], value: &[u8]) -> Result<BlockHeaderInv> {
    let mut k = Reader::new("header inventory", key);
    let height = k.u32()?;
    k.finish()?;

    let mut v = Reader::new("header inventory", value);
    let hash = v.block_hash()?;
    let processed = v.flag()?;
    v.finish()?;

    Ok(BlockHeaderInv {
        hash,
        height,
        processed,
    })
}

pub fn encode_header(header: &BlockHeader) -> Vec<u8> {
    let mut value = Vec::with_capacity(HASH_LEN + 8);
    value.extend_from_slice(header.prev_hash.as_byte_array());
    value.extend_from_slice(&header.time.to_be_bytes());
    value.extend_from_slice(&header.height.to_be_bytes());
    value
}

pub fn decode_header(key: &[u8], value: &[u8]) -> Result<BlockHeader> {
    let mut k = Reader::new("header", key);
    let hash = k.block_hash()?;
    k.finish()?;

    let mut v = Reader::new("header", value);
    let prev_hash = v.block_hash()?;
    let time = v.u32()?;
    let height = v.u32()?;
    v.finish()?;

    Ok(BlockHeader {
        hash,
        prev_hash,
        time,
        height,
    })
}

pub fn encode_spent_index(index: &SpentOutpointsIndex) -> Vec<u8> {
    let mut value = Vec::with_capacity(4 + index.data.len() * 8);
    value.extend_from_slice(&index.block_height.to_be_bytes());
    for hash in &index.data {
        value.extend_from_slice(hash);
    }
    value
}

pub fn decode_spent_index(key: &[u8], value: &[u8]) -> Result<SpentOutpointsIndex> {
    let mut k = Reader::new("spent index", key);
    let block_hash = k.block_hash()?;
    k.finish()?;

    let mut v = Reader::new("spent index", value);
    let block_height = v.u32()?;
    let mut data = Vec::with_capacity(v.remaining() / 8);
    while v.remaining() > 0 {
        data.push(v.array::<8>()?);
    }

    Ok(SpentOutpointsIndex {
        block_hash,
        block_height,
        data,
    })
}

pub fn encode_tweak_index(index: &TweakIndex) -> Vec<u8> {
    let mut value = Vec::with_capacity(4 + index.data.len() * TWEAK_LEN);
    value.extend_from_slice(&index.block_height.to_be_bytes());
    for tweak in &index.data {
        value.extend_from_slice(tweak);
    }
    value
}

pub fn decode_tweak_index(key: &[u8], value: &[u8]) -> Result<TweakIndex> {
    let mut k = Reader::new("tweak index", key);
    let block_hash = k.block_hash()?;
    k.finish()?;

    let mut v = Reader::new("tweak index", value);
    let block_height = v.u32()?;
    let mut data = Vec::with_capacity(v.remaining() / TWEAK_LEN);
    while v.remaining() > 0 {
        data.push(v.array::<TWEAK_LEN>()?);
    }

    Ok(TweakIndex {
        block_hash,
        block_height,
        data,
    })
}

pub fn encode_tweak_index_dust(index: &TweakIndexDust) -> Vec<u8> {
    let mut value = Vec::with_capacity(4 + index.data.len() * (TWEAK_LEN + 8));
    value.extend_from_slice(&index.block_height.to_be_bytes());
    for (tweak, highest) in &index.data {
        value.extend_from_slice(tweak);
        value.extend_from_slice(&highest.to_be_bytes());
    }
    value
}

pub fn decode_tweak_index_dust(key: &[u8], value: &[u8]) -> Result<TweakIndexDust> {
    let mut k = Reader::new("dust tweak index", key);
    let block_hash = k.block_hash()?;
    k.finish()?;

    let mut v = Reader::new("dust tweak index", value);
    let block_height = v.u32()?;
    let mut data = Vec::with_capacity(v.remaining() / (TWEAK_LEN + 8));
    while v.remaining() > 0 {
        let tweak = v.array::<TWEAK_LEN>()?;
        let highest = v.u64()?;
        data.push((tweak, highest));
    }

    Ok(TweakIndexDust {
        block_hash,
        block_height,
        data,
    })
}

pub fn filter_key(filter_type: FilterType, block_hash: &BlockHash) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + HASH_LEN);
    key.push(filter_type.tag());
    key.extend_from_slice(block_hash.as_byte_array());
    key
}

pub fn decode_filter(key: &[u8], value: &[u8]) -> Result<FilterData> {
    let mut k = Reader::new("filter", key);
    let filter_type = match k.array::<1>()?[0] {
        0 => FilterType::NewUtxos,
        1 => FilterType::Spent,
        other => return Err(Error::corrupt("filter", format!("unknown filter type {other}"))),
    };
    let block_hash = k.block_hash()?;
    k.finish()?;

    Ok(FilterData {
        filter_type,
        block_hash,
        data: value.to_vec(),
    })
}

/// Cursor over a stored byte string.
struct Reader<'a> {
    record: &'static str,
    bytes: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(record: &'static str, bytes: &'a [u8]) -> Self {
        Self { record, bytes }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.bytes.len() < len {
            return Err(Error::corrupt(
                self.record,
                format!("needed {len} bytes, {} left", self.bytes.len()),
            ));
        }
        let (head, tail) = self.bytes.split_at(len);
        self.bytes = tail;
        Ok(head)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.array()?))
    }

    fn flag(&mut self) -> Result<bool> {
        match self.array::<1>()?[0] {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(Error::corrupt(self.record, format!("invalid flag byte {other}"))),
        }
    }

    fn block_hash(&mut self) -> Result<BlockHash> {
        Ok(BlockHash::from_byte_array(self.array()?))
    }

    fn txid(&mut self) -> Result<Txid> {
        Ok(Txid::from_byte_array(self.array()?))
    }

    fn remaining(&self) -> usize {
        self.bytes.len()
    }

    fn rest(&mut self) -> &'a [u8] {
        std::mem::take(&mut self.bytes)
    }

    fn finish(&self) -> Result<()> {
        if self.bytes.is_empty() {
            Ok(())
        } else {
            Err(Error::corrupt(
                self.record,
                format!("{} trailing bytes", self.bytes.len()),
            ))
        }
    }
}
