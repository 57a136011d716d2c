//! BLS12-381 signature primitives.
//!
//! Thin wrappers over `blst`'s min-pk scheme: public keys on G1 (48 bytes
//! compressed, 96 uncompressed), signatures on G2 (96 bytes compressed).
//! Individual signatures over the same message aggregate into a single
//! signature verifiable against the aggregate of the signers' public keys.
//!
//! ## Helper Functions
//! - `generate_bls_keypair()` / `bls_keypair_from_seed()` - Key generation
//! - `verify_signature()` / `verify_aggregate()` - Verification
//! - `aggregate_signatures()` / `aggregate_public_keys()` - Aggregation

use blst::min_pk;
use blst::BLST_ERROR;
use std::fmt;

/// Ciphersuite domain separation tag (proof-of-possession scheme).
const DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_";

/// Compressed size of a BLS signature in bytes.
pub const BLS_SIGNATURE_BYTES: usize = 96;

/// Uncompressed size of a BLS public key in bytes.
const BLS_PUBLIC_KEY_UNCOMPRESSED_BYTES: usize = 96;

/// Errors from BLS operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlsError {
    /// Public key bytes failed to deserialize or group-check.
    #[error("invalid BLS public key bytes")]
    InvalidPublicKey,

    /// Signature bytes failed to deserialize.
    #[error("invalid BLS signature bytes")]
    InvalidSignature,

    /// Aggregation over an empty or malformed input set.
    #[error("BLS aggregation failed: {0}")]
    Aggregation(&'static str),
}

/// A BLS12-381 secret key.
#[derive(Clone)]
pub struct BlsSecretKey(min_pk::SecretKey);

impl BlsSecretKey {
    /// Sign a message with the POP ciphersuite.
    pub fn sign(&self, message: &[u8]) -> BlsSignature {
        BlsSignature(self.0.sign(message, DST, &[]))
    }

    /// Derive the corresponding public key.
    pub fn public_key(&self) -> BlsPublicKey {
        BlsPublicKey(self.0.sk_to_pk())
    }
}

impl fmt::Debug for BlsSecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print key material.
        write!(f, "BlsSecretKey(..)")
    }
}

/// A BLS12-381 public key (G1).
#[derive(Clone, Copy)]
pub struct BlsPublicKey(min_pk::PublicKey);

impl BlsPublicKey {
    /// Deserialize from compressed (48-byte) or uncompressed (96-byte) bytes,
    /// with subgroup check.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BlsError> {
        min_pk::PublicKey::key_validate(bytes)
            .map(Self)
            .map_err(|_| BlsError::InvalidPublicKey)
    }

    /// Uncompressed 96-byte serialization.
    ///
    /// Canonical validator ordering sorts on these bytes.
    pub fn uncompressed_bytes(&self) -> [u8; BLS_PUBLIC_KEY_UNCOMPRESSED_BYTES] {
        self.0.serialize()
    }

    /// Compressed 48-byte serialization.
    pub fn compressed_bytes(&self) -> [u8; 48] {
        self.0.compress()
    }
}

impl PartialEq for BlsPublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.compress() == other.0.compress()
    }
}

impl Eq for BlsPublicKey {}

impl fmt::Debug for BlsPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.compressed_bytes();
        write!(f, "BlsPublicKey({:02x}{:02x}{:02x}..)", bytes[0], bytes[1], bytes[2])
    }
}

/// A BLS12-381 signature (G2), possibly aggregated.
#[derive(Clone, Copy)]
pub struct BlsSignature(min_pk::Signature);

impl BlsSignature {
    /// Deserialize from compressed 96-byte form, with subgroup check.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BlsError> {
        let sig = min_pk::Signature::sig_validate(bytes, false)
            .map_err(|_| BlsError::InvalidSignature)?;
        Ok(Self(sig))
    }

    /// Compressed 96-byte serialization.
    pub fn to_bytes(&self) -> [u8; BLS_SIGNATURE_BYTES] {
        self.0.compress()
    }
}

impl PartialEq for BlsSignature {
    fn eq(&self, other: &Self) -> bool {
        self.0.compress() == other.0.compress()
    }
}

impl Eq for BlsSignature {}

impl fmt::Debug for BlsSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.to_bytes();
        write!(f, "BlsSignature({:02x}{:02x}{:02x}..)", bytes[0], bytes[1], bytes[2])
    }
}

/// Generate a new random BLS12-381 keypair.
pub fn generate_bls_keypair() -> BlsSecretKey {
    let mut ikm = [0u8; 32];
    rand::RngCore::fill_bytes(&mut rand::rngs::OsRng, &mut ikm);
    bls_keypair_from_seed(&ikm)
}

/// Generate a BLS12-381 keypair from a seed (deterministic, for testing).
///
/// Uses blst's key_gen which hashes the full seed to derive a valid scalar.
pub fn bls_keypair_from_seed(seed: &[u8; 32]) -> BlsSecretKey {
    let sk = min_pk::SecretKey::key_gen(seed, &[]).expect("key_gen accepts any 32-byte seed");
    BlsSecretKey(sk)
}

/// Verify an individual signature over `message`.
pub fn verify_signature(public_key: &BlsPublicKey, message: &[u8], signature: &BlsSignature) -> bool {
    // Group checks already ran at deserialization time.
    signature.0.verify(false, message, DST, &[], &public_key.0, false) == BLST_ERROR::BLST_SUCCESS
}

/// Aggregate individual signatures into one.
///
/// Aggregation is order-independent; callers that need determinism should
/// still pass a deterministic order.
pub fn aggregate_signatures(signatures: &[BlsSignature]) -> Result<BlsSignature, BlsError> {
    if signatures.is_empty() {
        return Err(BlsError::Aggregation("empty signature set"));
    }
    let refs: Vec<&min_pk::Signature> = signatures.iter().map(|s| &s.0).collect();
    let agg = min_pk::AggregateSignature::aggregate(&refs, false)
        .map_err(|_| BlsError::Aggregation("signature not in group"))?;
    Ok(BlsSignature(agg.to_signature()))
}

/// Aggregate public keys into one.
pub fn aggregate_public_keys(public_keys: &[BlsPublicKey]) -> Result<BlsPublicKey, BlsError> {
    if public_keys.is_empty() {
        return Err(BlsError::Aggregation("empty public key set"));
    }
    let refs: Vec<&min_pk::PublicKey> = public_keys.iter().map(|pk| &pk.0).collect();
    let agg = min_pk::AggregatePublicKey::aggregate(&refs, false)
        .map_err(|_| BlsError::Aggregation("public key not in group"))?;
    Ok(BlsPublicKey(agg.to_public_key()))
}

/// Verify an aggregated signature over a single message.
///
/// Aggregates the signers' public keys and performs one pairing check, which
/// is the common case here: every validator signs the same message bytes.
pub fn verify_aggregate(
    message: &[u8],
    signature: &BlsSignature,
    signer_keys: &[BlsPublicKey],
) -> bool {
    let agg_pk = match aggregate_public_keys(signer_keys) {
        Ok(pk) => pk,
        Err(_) => return false,
    };
    verify_signature(&agg_pk, message, signature)
}
