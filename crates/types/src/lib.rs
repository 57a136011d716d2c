//! Core types for Crosslink signature aggregation.
//!
//! This crate provides the foundational types used throughout the service:
//!
//! - **Identifiers**: ChainId, SubnetId, NodeId
//! - **Crypto**: BLS12-381 keys, signatures, and aggregation helpers
//! - **Messages**: UnsignedMessage, SignedMessage, SignerBitset
//! - **Validators**: canonical validator sets with connectivity info
//!
//! # Design Philosophy
//!
//! This crate is self-contained with minimal dependencies. It does not depend
//! on any other workspace crates, making it the foundation layer.

mod bitset;
mod crypto;
mod ids;
mod message;
mod validator;

pub use bitset::SignerBitset;
pub use crypto::{
    aggregate_public_keys, aggregate_signatures, bls_keypair_from_seed, generate_bls_keypair,
    verify_aggregate, verify_signature, BlsError, BlsPublicKey, BlsSecretKey, BlsSignature,
    BLS_SIGNATURE_BYTES,
};
pub use ids::{ChainId, IdParseError, NodeId, SubnetId};
pub use message::{MessageError, SignedMessage, UnsignedMessage, WARP_CODEC_VERSION};
pub use validator::{required_stake, ConnectedValidators, Validator};
