//! Signature aggregation engine.
//!
//! Collects individual BLS signatures over an unsigned cross-chain message
//! from the signing subnet's validators, verifies them, and aggregates them
//! into a [`crosslink_types::SignedMessage`] once the requested share of
//! stake weight has signed.
//!
//! The entry point is [`SignatureAggregator::create_signed_message`]. The
//! engine rides on an abstract [`crosslink_network::AppRequestNetwork`]; it
//! owns request-id allocation, per-attempt deadlines, retries with backoff,
//! and an LRU cache of verified signatures keyed by job fingerprint.

mod cache;
mod config;
mod coordinator;
mod engine;
mod error;

pub use cache::{CacheConflict, Fingerprint, SignatureCache};
pub use config::AggregatorConfig;
pub use engine::SignatureAggregator;
pub use error::AggregateError;
