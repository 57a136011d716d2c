//! Error taxonomy surfaced by the aggregation engine.

use crosslink_network::NetworkError;
use crosslink_types::SubnetId;

/// Final outcome errors of an aggregation job.
///
/// Per-response problems (decode failures, invalid signatures) are counted
/// and logged at debug level but never surfaced; per-attempt timeouts end the
/// attempt and trigger a retry. Only the final outcome bubbles up.
#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    /// Malformed caller input (bad hex, bad subnet id, quorum out of range).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The signing subnet has no registered stake.
    #[error("no validators with stake registered for subnet {0}")]
    NoValidators(SubnetId),

    /// Quorum cannot possibly be reached with currently connected peers.
    #[error(
        "failed to connect to a threshold of stake: connected {connected} of {total}, required {required}"
    )]
    InsufficientConnectedStake {
        /// Stake weight of validators with at least one connected node.
        connected: u64,
        /// Total stake weight of the subnet.
        total: u64,
        /// Minimum stake weight for the requested quorum.
        required: u64,
    },

    /// Rounds exhausted without meeting the threshold.
    #[error(
        "not enough signatures after {attempts} attempts: achieved weight {achieved}, required {required}"
    )]
    NotEnoughSignatures {
        /// Stake weight of verified signatures gathered.
        achieved: u64,
        /// Minimum stake weight for the requested quorum.
        required: u64,
        /// Signature-request rounds issued.
        attempts: u32,
    },

    /// Subnet lookup or validator-set fetch failed.
    #[error("network unavailable: {0}")]
    NetworkUnavailable(#[from] NetworkError),

    /// BLS aggregation error, cache conflict, or other unexpected failure.
    #[error("internal error: {0}")]
    Internal(String),
}
