use bitcoin::hashes::{hash160, Hash};

use crate::constants::{NUMS, TAPROOT_ANNEX_PREFIX};
use crate::script::ScriptKind;
use crate::structs::TxInput;

const COMPRESSED_KEY_LEN: usize = 33;

/// Returns the public key an input contributes to the tweak, if any.
///
/// The returned bytes are either a 33-byte compressed key or, for taproot
/// spends, the 32-byte x-only output key. Nothing is validated as a curve
/// point here.
pub fn input_pubkey(input: &TxInput) -> Option<&[u8]> {
    let prevout = input.prevout.as_ref()?;
    if input.previous_output.is_null() {
        return None;
    }
    let spk = prevout.txout.script_pubkey.as_bytes();

    match ScriptKind::classify(&prevout.txout.script_pubkey) {
        ScriptKind::P2tr => taproot_key(input, spk),
        ScriptKind::P2wpkh => compressed_witness_key(input),
        ScriptKind::P2sh => {
            let script_sig = input.script_sig.as_bytes();
            let wrapped_p2wpkh = script_sig.len() == 23
                && script_sig[0] == 0x16
                && script_sig[1] == 0x00
                && script_sig[2] == 0x14;
            if wrapped_p2wpkh {
                compressed_witness_key(input)
            } else {
                None
            }
        }
        ScriptKind::P2pkh => legacy_key(input.script_sig.as_bytes(), &spk[3..23]),
        ScriptKind::Other => None,
    }
}

fn taproot_key<'a>(input: &TxInput, spk: &'a [u8]) -> Option<&'a [u8]> {
    let mut stack: Vec<&[u8]> = input.witness.iter().collect();
    if stack.len() >= 2 && stack.last().is_some_and(|e| e.first() == Some(&TAPROOT_ANNEX_PREFIX)) {
        stack.pop();
    }

    match stack.len() {
        0 => None,
        1 => Some(&spk[2..]),
        _ => {
            let control_block = stack.last()?;
            // A script path spend whose internal key is NUMS has no usable key.
            if control_block.get(1..33) == Some(&NUMS[..]) {
                None
            } else {
                Some(&spk[2..])
            }
        }
    }
}

fn compressed_witness_key(input: &TxInput) -> Option<&[u8]> {
    input
        .witness
        .last()
        .filter(|item| item.len() == COMPRESSED_KEY_LEN)
}

/// Scans the scriptSig from the right for a 33-byte window whose HASH160
/// equals the pubkey hash committed to by the previous output.
fn legacy_key<'a>(script_sig: &'a [u8], pubkey_hash: &[u8]) -> Option<&'a [u8]> {
    if script_sig.len() < COMPRESSED_KEY_LEN {
        return None;
    }
    (0..=script_sig.len() - COMPRESSED_KEY_LEN)
        .rev()
        .map(|start| &script_sig[start..start + COMPRESSED_KEY_LEN])
        .find(|window| hash160::Hash::hash(window).as_byte_array()[..] == *pubkey_hash)
}
