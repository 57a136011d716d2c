//! Cross-chain warp messages, unsigned and signed.

use crate::bitset::SignerBitset;
use crate::crypto::{verify_aggregate, BlsSignature, BLS_SIGNATURE_BYTES};
use crate::ids::ChainId;
use crate::validator::{required_stake, Validator};
use std::fmt;

/// Version tag leading every canonical message encoding.
pub const WARP_CODEC_VERSION: u16 = 0;

/// Errors from message encoding, decoding, and verification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessageError {
    /// The encoding starts with an unknown codec version.
    #[error("unsupported codec version {0}, expected {WARP_CODEC_VERSION}")]
    UnsupportedCodecVersion(u16),

    /// The encoding ends before all declared fields.
    #[error("message encoding truncated")]
    Truncated,

    /// Extra bytes follow a complete encoding.
    #[error("trailing bytes after message encoding")]
    TrailingBytes,

    /// The signers bitset does not match the validator set.
    #[error("signers bitset length {bitset} does not match validator set size {validators}")]
    SignerBitsetMismatch {
        /// Bit positions in the bitset.
        bitset: usize,
        /// Validators in the canonical set.
        validators: usize,
    },

    /// The signers' combined stake is below the required threshold.
    #[error("signed weight {achieved} below required weight {required}")]
    QuorumNotMet {
        /// Stake weight of the validators whose bits are set.
        achieved: u64,
        /// Minimum stake weight for the requested quorum.
        required: u64,
    },

    /// The aggregate signature does not verify against the signers' keys.
    #[error("aggregate signature verification failed")]
    InvalidAggregateSignature,
}

/// An unsigned cross-chain message.
///
/// The canonical byte encoding (see [`UnsignedMessage::bytes`]) is the input
/// to BLS signing and is computed once at construction.
#[derive(Clone, PartialEq, Eq)]
pub struct UnsignedMessage {
    network_id: u32,
    source_chain_id: ChainId,
    payload: Vec<u8>,
    /// Cached canonical encoding.
    bytes: Vec<u8>,
}

impl UnsignedMessage {
    /// Create a message, computing its canonical encoding.
    pub fn new(network_id: u32, source_chain_id: ChainId, payload: Vec<u8>) -> Self {
        let mut bytes =
            Vec::with_capacity(2 + 4 + ChainId::BYTES + 4 + payload.len());
        bytes.extend_from_slice(&WARP_CODEC_VERSION.to_be_bytes());
        bytes.extend_from_slice(&network_id.to_be_bytes());
        bytes.extend_from_slice(source_chain_id.as_bytes());
        bytes.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&payload);
        Self {
            network_id,
            source_chain_id,
            payload,
            bytes,
        }
    }

    /// Decode a message from its canonical encoding.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MessageError> {
        let mut cursor = Cursor::new(bytes);
        let version = u16::from_be_bytes(cursor.take_array()?);
        if version != WARP_CODEC_VERSION {
            return Err(MessageError::UnsupportedCodecVersion(version));
        }
        let network_id = u32::from_be_bytes(cursor.take_array()?);
        let source_chain_id = ChainId::from_bytes(cursor.take_array()?);
        let payload_len = u32::from_be_bytes(cursor.take_array()?) as usize;
        let payload = cursor.take(payload_len)?.to_vec();
        cursor.finish()?;
        Ok(Self::new(network_id, source_chain_id, payload))
    }

    /// Network this message belongs to.
    pub fn network_id(&self) -> u32 {
        self.network_id
    }

    /// Chain the message originates from.
    pub fn source_chain_id(&self) -> ChainId {
        self.source_chain_id
    }

    /// Application payload.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Canonical encoding; the exact bytes validators sign.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for UnsignedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnsignedMessage")
            .field("network_id", &self.network_id)
            .field("source_chain_id", &self.source_chain_id)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

/// A message carrying an aggregated BLS signature and the signer bitset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedMessage {
    /// The message that was signed.
    pub unsigned: UnsignedMessage,
    /// Bit `i` set iff canonical validator `i` contributed.
    pub signers: SignerBitset,
    /// Aggregate of the contributing validators' signatures.
    pub signature: BlsSignature,
}

impl SignedMessage {
    /// Serialize: canonical unsigned encoding, bitset length and bytes, then
    /// the 96-byte aggregate signature.
    pub fn to_bytes(&self) -> Vec<u8> {
        let unsigned = self.unsigned.bytes();
        let bitset = self.signers.as_bytes();
        let mut bytes =
            Vec::with_capacity(unsigned.len() + 4 + bitset.len() + BLS_SIGNATURE_BYTES);
        bytes.extend_from_slice(unsigned);
        bytes.extend_from_slice(&(self.signers.len() as u32).to_be_bytes());
        bytes.extend_from_slice(bitset);
        bytes.extend_from_slice(&self.signature.to_bytes());
        bytes
    }

    /// Verify the aggregate signature against a canonical validator set and
    /// quorum numerator.
    ///
    /// Checks that the set bits select validators whose combined weight meets
    /// `ceil(total * quorum / 100)` and that the aggregate signature verifies
    /// against the aggregate of their public keys.
    pub fn verify(
        &self,
        validators: &[Validator],
        quorum_numerator: u64,
    ) -> Result<(), MessageError> {
        if self.signers.len() != validators.len() {
            return Err(MessageError::SignerBitsetMismatch {
                bitset: self.signers.len(),
                validators: validators.len(),
            });
        }

        let mut signer_keys = Vec::with_capacity(self.signers.count_ones());
        let mut achieved: u64 = 0;
        let mut total: u64 = 0;
        for (i, validator) in validators.iter().enumerate() {
            total = total.saturating_add(validator.weight);
            if self.signers.get(i) {
                signer_keys.push(validator.public_key);
                achieved = achieved.saturating_add(validator.weight);
            }
        }

        let required = required_stake(total, quorum_numerator);
        if achieved < required {
            return Err(MessageError::QuorumNotMet { achieved, required });
        }

        if !verify_aggregate(self.unsigned.bytes(), &self.signature, &signer_keys) {
            return Err(MessageError::InvalidAggregateSignature);
        }
        Ok(())
    }
}

/// Minimal forward-only reader over an encoding.
struct Cursor<'a> {
    bytes: &'a [u8],
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], MessageError> {
        if self.bytes.len() < n {
            return Err(MessageError::Truncated);
        }
        let (head, rest) = self.bytes.split_at(n);
        self.bytes = rest;
        Ok(head)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], MessageError> {
        Ok(self.take(N)?.try_into().expect("split_at returns N bytes"))
    }

    fn finish(self) -> Result<(), MessageError> {
        if self.bytes.is_empty() {
            Ok(())
        } else {
            Err(MessageError::TrailingBytes)
        }
    }
}
