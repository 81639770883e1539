use bitcoin::hashes::{sha256t_hash_newtype, Hash, HashEngine};
use bitcoin::secp256k1::{PublicKey, Scalar, Secp256k1, Verification};
use bitcoin::OutPoint;

sha256t_hash_newtype! {
    pub struct InputsTag = hash_str("BIP0352/Inputs");

    /// BIP352 input hash over the smallest outpoint and the summed input key.
    pub struct InputsHash(_);
}

/// Why a transaction with candidate keys still produced no tweak.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    /// A candidate key is not a point on the curve.
    InvalidKey,
    /// The candidate keys sum to the point at infinity.
    InfiniteAggregate,
    /// The input hash is not a valid scalar, or the product is infinity.
    InvalidScalar,
}

/// Parses every candidate key and sums them.
pub fn aggregate_keys(keys: &[&[u8]]) -> Result<PublicKey, InvalidReason> {
    let parsed = keys
        .iter()
        .map(|key| parse_key(key))
        .collect::<Result<Vec<_>, _>>()?;
    let refs: Vec<&PublicKey> = parsed.iter().collect();
    PublicKey::combine_keys(&refs).map_err(|_| InvalidReason::InfiniteAggregate)
}

fn parse_key(key: &[u8]) -> Result<PublicKey, InvalidReason> {
    let parsed = if key.len() == 32 {
        let mut compressed = [0u8; 33];
        compressed[0] = 0x02;
        compressed[1..].copy_from_slice(key);
        PublicKey::from_slice(&compressed)
    } else {
        PublicKey::from_slice(key)
    };
    parsed.map_err(|_| InvalidReason::InvalidKey)
}

/// `txid ‖ vout` in the byte order used for the lexicographic comparison.
pub fn serialize_outpoint(outpoint: &OutPoint) -> [u8; 36] {
    let mut out = [0u8; 36];
    out[..32].copy_from_slice(outpoint.txid.as_byte_array());
    out[32..].copy_from_slice(&outpoint.vout.to_le_bytes());
    out
}

/// Smallest serialized outpoint, `None` when there are none.
pub fn smallest_outpoint<'a>(outpoints: impl IntoIterator<Item = &'a OutPoint>) -> Option<[u8; 36]> {
    outpoints.into_iter().map(serialize_outpoint).min()
}

/// `tagged_hash("BIP0352/Inputs", smallest_outpoint ‖ A)`.
pub fn input_hash(smallest_outpoint: &[u8; 36], aggregate: &PublicKey) -> [u8; 32] {
    let mut engine = InputsHash::engine();
    engine.input(smallest_outpoint);
    engine.input(&aggregate.serialize());
    InputsHash::from_engine(engine).to_byte_array()
}

/// `input_hash · A`, compressed.
pub fn tweak_data<C: Verification>(
    secp: &Secp256k1<C>,
    input_hash: [u8; 32],
    aggregate: &PublicKey,
) -> Result<[u8; 33], InvalidReason> {
    let scalar = Scalar::from_be_bytes(input_hash).map_err(|_| InvalidReason::InvalidScalar)?;
    aggregate
        .mul_tweak(secp, &scalar)
        .map(|point| point.serialize())
        .map_err(|_| InvalidReason::InvalidScalar)
}
