use bitcoin::secp256k1::{Secp256k1, Verification};
use bitcoin::Txid;
use log::debug;

use super::extract::input_pubkey;
use super::hash::{aggregate_keys, input_hash, smallest_outpoint, tweak_data, InvalidReason};
use crate::error::{Error, Result};
use crate::structs::BlockTx;

/// Tweak of one transaction together with its largest taproot output value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxTweak {
    pub txid: Txid,
    pub data: [u8; 33],
    pub highest_value: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TweakOutcome {
    Tweak(TxTweak),
    /// No input contributed a key.
    NoKeys,
    /// Keys were found but no tweak can be derived from them.
    Invalid(InvalidReason),
}

impl TweakOutcome {
    pub fn into_tweak(self) -> Option<TxTweak> {
        match self {
            TweakOutcome::Tweak(tweak) => Some(tweak),
            _ => None,
        }
    }
}

/// Derives the tweak of a transaction.
///
/// Coinbase transactions and transactions whose inputs carry no usable key
/// yield [`TweakOutcome::NoKeys`].
pub fn compute_tweak<C: Verification>(secp: &Secp256k1<C>, tx: &BlockTx) -> Result<TweakOutcome> {
    let keys: Vec<&[u8]> = tx.inputs.iter().filter_map(input_pubkey).collect();
    if keys.is_empty() {
        return Ok(TweakOutcome::NoKeys);
    }

    let aggregate = match aggregate_keys(&keys) {
        Ok(aggregate) => aggregate,
        Err(reason) => return Ok(invalid(tx.txid, reason)),
    };

    let smallest = smallest_outpoint(
        tx.inputs
            .iter()
            .filter(|input| !input.is_coinbase())
            .map(|input| &input.previous_output),
    )
    .ok_or(Error::NoInputs(tx.txid))?;

    let data = match tweak_data(secp, input_hash(&smallest, &aggregate), &aggregate) {
        Ok(data) => data,
        Err(reason) => return Ok(invalid(tx.txid, reason)),
    };

    let highest_value = tx
        .taproot_outputs()
        .map(|(_, out)| out.value.to_sat())
        .max()
        .unwrap_or_default();

    Ok(TweakOutcome::Tweak(TxTweak {
        txid: tx.txid,
        data,
        highest_value,
    }))
}

fn invalid(txid: Txid, reason: InvalidReason) -> TweakOutcome {
    debug!("no tweak for {txid}: {reason:?}");
    TweakOutcome::Invalid(reason)
}
