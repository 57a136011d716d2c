//! Request/response coordination for signature rounds.
//!
//! Allocates globally monotonic request ids, picks one target node per
//! unsigned validator, arms per-node response expectations, and hands the
//! encoded request to the transport.

use crosslink_metrics as metrics;
use crosslink_network::{
    encode_signature_request, AppRequestNetwork, InboundResponse, OutboundAppRequest, ResponseKey,
    SignatureRequest,
};
use crosslink_types::{ConnectedValidators, NodeId, SubnetId, UnsignedMessage};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::mpsc;
use tracing::debug;

/// One issued signature-request round.
pub(crate) struct SignatureRound {
    /// Request id shared by every node contacted this round.
    pub request_id: u32,
    /// Targeted node to canonical validator index.
    pub targets: HashMap<NodeId, usize>,
    /// Nodes the transport actually transmitted to.
    pub sent: HashSet<NodeId>,
    /// Channel the round's responses arrive on.
    pub responses: mpsc::Receiver<InboundResponse>,
}

/// Allocates request ids and opens signature rounds.
pub(crate) struct RequestCoordinator {
    current_request_id: AtomicU32,
}

impl RequestCoordinator {
    pub fn new() -> Self {
        Self {
            current_request_id: AtomicU32::new(0),
        }
    }

    /// Next request id. Monotonic process-wide, so no two in-flight jobs
    /// ever share one.
    pub fn next_request_id(&self) -> u32 {
        self.current_request_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Issue signature requests to one node per unsigned validator.
    pub fn open_round<N: AppRequestNetwork>(
        &self,
        network: &N,
        message: &UnsignedMessage,
        justification: Option<&[u8]>,
        subnet_id: SubnetId,
        validators: &ConnectedValidators,
        unsigned: &[usize],
    ) -> SignatureRound {
        let request_id = self.next_request_id();
        let targets = select_target_nodes(validators, unsigned);

        let responses = network.register_request(request_id, targets.len());
        for node_id in targets.keys() {
            network.expect_response(ResponseKey {
                node_id: *node_id,
                chain_id: message.source_chain_id(),
                request_id,
            });
        }

        let payload = encode_signature_request(&SignatureRequest {
            message: message.bytes().to_vec(),
            justification: justification.unwrap_or_default().to_vec(),
        });
        let target_set: HashSet<NodeId> = targets.keys().copied().collect();
        let sent = network.send_app_request(
            OutboundAppRequest {
                chain_id: message.source_chain_id(),
                request_id,
                payload,
            },
            &target_set,
            subnet_id,
        );

        metrics::record_app_requests_sent(sent.len());
        if sent.len() < target_set.len() {
            debug!(
                request_id,
                targeted = target_set.len(),
                sent = sent.len(),
                "some nodes unreachable this attempt"
            );
        }

        SignatureRound {
            request_id,
            targets,
            sent,
            responses,
        }
    }
}

/// One node per unsigned validator, preferring the first connected node in
/// the validator's node list.
fn select_target_nodes(
    validators: &ConnectedValidators,
    unsigned: &[usize],
) -> HashMap<NodeId, usize> {
    let mut targets = HashMap::new();
    for &index in unsigned {
        let validator = &validators.validators()[index];
        let node_id = validator
            .node_ids
            .iter()
            .find(|node_id| validators.is_connected(node_id))
            .or_else(|| validator.node_ids.first());
        if let Some(node_id) = node_id {
            targets.insert(*node_id, index);
        }
    }
    targets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crosslink_types::{bls_keypair_from_seed, Validator};

    fn node(byte: u8) -> NodeId {
        NodeId::from_bytes([byte; 20])
    }

    fn view(connected: &[u8]) -> ConnectedValidators {
        let raw = vec![
            Validator::new(
                bls_keypair_from_seed(&[1; 32]).public_key(),
                1,
                vec![node(1), node(2)],
            ),
            Validator::new(bls_keypair_from_seed(&[2; 32]).public_key(), 1, vec![node(3)]),
        ];
        ConnectedValidators::canonicalize(raw, connected.iter().map(|b| node(*b)).collect())
    }

    #[test]
    fn test_request_ids_monotonic() {
        let coordinator = RequestCoordinator::new();
        let first = coordinator.next_request_id();
        let second = coordinator.next_request_id();
        assert!(second > first);
    }

    #[test]
    fn test_select_prefers_connected_node() {
        let validators = view(&[2, 3]);
        let all: Vec<usize> = (0..validators.len()).collect();
        let targets = select_target_nodes(&validators, &all);

        assert_eq!(targets.len(), 2);
        // The two-node validator is reachable only through node 2.
        let two_node_index = validators.index_of_node(&node(1)).unwrap();
        assert_eq!(targets.get(&node(2)), Some(&two_node_index));
        assert!(!targets.contains_key(&node(1)));
    }

    #[test]
    fn test_select_falls_back_to_first_node() {
        let validators = view(&[]);
        let all: Vec<usize> = (0..validators.len()).collect();
        let targets = select_target_nodes(&validators, &all);

        // Nothing connected: first listed node of each validator.
        assert_eq!(targets.len(), 2);
        assert!(targets.contains_key(&node(1)));
        assert!(targets.contains_key(&node(3)));
    }

    #[test]
    fn test_select_skips_signed_validators() {
        let validators = view(&[1, 3]);
        let unsigned = vec![validators.index_of_node(&node(3)).unwrap()];
        let targets = select_target_nodes(&validators, &unsigned);

        assert_eq!(targets.len(), 1);
        assert!(targets.contains_key(&node(3)));
    }
}
