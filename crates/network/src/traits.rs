//! Network trait for app-level request fan-out.
//!
//! Defines the `AppRequestNetwork` interface the aggregation engine consumes.
//! The production backend wraps the real p2p transport; tests and the local
//! harness use the in-memory backend from `crosslink-network-memory`.

use crosslink_types::{ChainId, ConnectedValidators, NodeId, SubnetId};
use std::collections::HashSet;
use tokio::sync::mpsc;

/// Error returned when a network lookup fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    /// The chain is not registered with any subnet.
    #[error("no subnet registered for chain {0}")]
    UnknownChain(ChainId),

    /// The validator set could not be fetched at the current height.
    #[error("validator set fetch failed for subnet {subnet}: {reason}")]
    ValidatorFetch {
        /// Subnet whose validator set was requested.
        subnet: SubnetId,
        /// Backend-specific failure description.
        reason: String,
    },

    /// The network is shutting down.
    #[error("network shutting down")]
    Shutdown,
}

/// Identifies one expected response: a node answering one request id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResponseKey {
    /// Node expected to answer.
    pub node_id: NodeId,
    /// Chain the request concerns.
    pub chain_id: ChainId,
    /// Request id the answer must carry.
    pub request_id: u32,
}

/// An outbound app-level request.
#[derive(Debug, Clone)]
pub struct OutboundAppRequest {
    /// Chain the request concerns.
    pub chain_id: ChainId,
    /// Request id echoed by responses.
    pub request_id: u32,
    /// Encoded request payload (see the wire module).
    pub payload: Vec<u8>,
}

/// Payload of an inbound response.
#[derive(Debug, Clone)]
pub enum ResponsePayload {
    /// The node answered with these bytes.
    Response(Vec<u8>),
    /// The transport reported the request as undeliverable or failed.
    Failed,
}

/// A response (or delivery failure) for a registered request.
#[derive(Debug, Clone)]
pub struct InboundResponse {
    /// Node the response came from.
    pub node_id: NodeId,
    /// Request id this response answers.
    pub request_id: u32,
    /// Response payload or failure marker.
    pub payload: ResponsePayload,
}

/// Interface to the app-request layer of the p2p network.
///
/// A narrow capability set so the engine can be tested against a simple
/// in-memory implementation. Methods are synchronous; responses arrive on the
/// bounded channel returned by [`register_request`](Self::register_request).
/// Implementations must be thread-safe. Responses arriving after the receiver
/// is dropped are discarded.
pub trait AppRequestNetwork: Send + Sync {
    /// Resolve the subnet a chain belongs to.
    fn subnet_for_chain(&self, chain_id: ChainId) -> Result<SubnetId, NetworkError>;

    /// Begin peering with a subnet's validators. Idempotent.
    fn track_subnet(&self, subnet_id: SubnetId);

    /// Snapshot the subnet's canonical validator set with connectivity info.
    fn connected_validators(&self, subnet_id: SubnetId)
        -> Result<ConnectedValidators, NetworkError>;

    /// Register a response channel for `request_id`, sized to the number of
    /// expected responses.
    fn register_request(
        &self,
        request_id: u32,
        expected_responses: usize,
    ) -> mpsc::Receiver<InboundResponse>;

    /// Arm the expectation of a response from an individual node.
    fn expect_response(&self, key: ResponseKey);

    /// Send a request to a set of nodes on a subnet.
    ///
    /// Nodes that are not currently connected are skipped; the returned set
    /// contains the nodes the request was actually transmitted to.
    fn send_app_request(
        &self,
        request: OutboundAppRequest,
        targets: &HashSet<NodeId>,
        subnet_id: SubnetId,
    ) -> HashSet<NodeId>;
}
