//! Deterministic in-memory app-request network.

use crosslink_network::{
    decode_signature_request, encode_signature_response, AppRequestNetwork, InboundResponse,
    NetworkError, OutboundAppRequest, ResponseKey, ResponsePayload, SignatureResponse,
};
use crosslink_types::{
    BlsSecretKey, ChainId, ConnectedValidators, NodeId, SubnetId, Validator,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc;
use tracing::trace;

/// How a scripted node answers signature requests.
pub enum SignerBehavior {
    /// Sign the request's message bytes and answer with a well-formed payload.
    Sign(BlsSecretKey),
    /// Never answer.
    Silent,
    /// Answer with bytes that do not decode as a signature response.
    Malformed,
    /// Answer with a structurally valid signature over the wrong bytes.
    WrongMessage(BlsSecretKey),
    /// Report the request as failed at the transport level.
    Failed,
}

#[derive(Default)]
struct Inner {
    subnet_by_chain: HashMap<ChainId, SubnetId>,
    validators: HashMap<SubnetId, Vec<Validator>>,
    connected: HashSet<NodeId>,
    behaviors: HashMap<NodeId, SignerBehavior>,
    tracked: HashSet<SubnetId>,
    pending: HashMap<u32, mpsc::Sender<InboundResponse>>,
    expected: HashSet<ResponseKey>,
    messages_sent: usize,
}

/// An in-memory [`AppRequestNetwork`] with scripted signers.
#[derive(Default)]
pub struct MemoryNetwork {
    inner: Mutex<Inner>,
}

impl MemoryNetwork {
    /// Create an empty network with no subnets or peers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a chain to its subnet.
    pub fn register_chain(&self, chain_id: ChainId, subnet_id: SubnetId) {
        self.inner.lock().subnet_by_chain.insert(chain_id, subnet_id);
    }

    /// Register the raw validator set snapshot for a subnet.
    pub fn set_validators(&self, subnet_id: SubnetId, validators: Vec<Validator>) {
        self.inner.lock().validators.insert(subnet_id, validators);
    }

    /// Script how `node_id` answers signature requests.
    pub fn set_behavior(&self, node_id: NodeId, behavior: SignerBehavior) {
        self.inner.lock().behaviors.insert(node_id, behavior);
    }

    /// Mark a node as reachable.
    pub fn connect(&self, node_id: NodeId) {
        self.inner.lock().connected.insert(node_id);
    }

    /// Mark a node as unreachable.
    pub fn disconnect(&self, node_id: NodeId) {
        self.inner.lock().connected.remove(&node_id);
    }

    /// Whether the subnet has been tracked.
    pub fn is_tracked(&self, subnet_id: SubnetId) -> bool {
        self.inner.lock().tracked.contains(&subnet_id)
    }

    /// Total app-request messages transmitted so far (per target node).
    pub fn messages_sent(&self) -> usize {
        self.inner.lock().messages_sent
    }

    fn respond(inner: &Inner, request: &OutboundAppRequest, node_id: NodeId) {
        let key = ResponseKey {
            node_id,
            chain_id: request.chain_id,
            request_id: request.request_id,
        };
        if !inner.expected.contains(&key) {
            trace!(?node_id, request_id = request.request_id, "no armed expectation, dropping");
            return;
        }
        let Some(sender) = inner.pending.get(&request.request_id) else {
            return;
        };

        let payload = match inner.behaviors.get(&node_id) {
            Some(SignerBehavior::Sign(keypair)) => {
                let Ok(decoded) = decode_signature_request(&request.payload) else {
                    return;
                };
                let signature = keypair.sign(&decoded.message);
                ResponsePayload::Response(encode_signature_response(&SignatureResponse {
                    signature: signature.to_bytes().to_vec(),
                }))
            }
            Some(SignerBehavior::Malformed) => {
                ResponsePayload::Response(vec![0xFF, 0xFF, 0xFF, 0xFF])
            }
            Some(SignerBehavior::WrongMessage(keypair)) => {
                let signature = keypair.sign(b"unrelated bytes");
                ResponsePayload::Response(encode_signature_response(&SignatureResponse {
                    signature: signature.to_bytes().to_vec(),
                }))
            }
            Some(SignerBehavior::Failed) => ResponsePayload::Failed,
            Some(SignerBehavior::Silent) | None => return,
        };

        // Channel capacity equals the expected response count, so this only
        // fails if the caller undersized its registration.
        let _ = sender.try_send(InboundResponse {
            node_id,
            request_id: request.request_id,
            payload,
        });
    }
}

impl AppRequestNetwork for MemoryNetwork {
    fn subnet_for_chain(&self, chain_id: ChainId) -> Result<SubnetId, NetworkError> {
        self.inner
            .lock()
            .subnet_by_chain
            .get(&chain_id)
            .copied()
            .ok_or(NetworkError::UnknownChain(chain_id))
    }

    fn track_subnet(&self, subnet_id: SubnetId) {
        self.inner.lock().tracked.insert(subnet_id);
    }

    fn connected_validators(
        &self,
        subnet_id: SubnetId,
    ) -> Result<ConnectedValidators, NetworkError> {
        let inner = self.inner.lock();
        let raw = inner
            .validators
            .get(&subnet_id)
            .cloned()
            .ok_or_else(|| NetworkError::ValidatorFetch {
                subnet: subnet_id,
                reason: "subnet not registered".to_string(),
            })?;
        Ok(ConnectedValidators::canonicalize(
            raw,
            inner.connected.clone(),
        ))
    }

    fn register_request(
        &self,
        request_id: u32,
        expected_responses: usize,
    ) -> mpsc::Receiver<InboundResponse> {
        let (sender, receiver) = mpsc::channel(expected_responses.max(1));
        self.inner.lock().pending.insert(request_id, sender);
        receiver
    }

    fn expect_response(&self, key: ResponseKey) {
        self.inner.lock().expected.insert(key);
    }

    fn send_app_request(
        &self,
        request: OutboundAppRequest,
        targets: &HashSet<NodeId>,
        _subnet_id: SubnetId,
    ) -> HashSet<NodeId> {
        let mut inner = self.inner.lock();
        let mut sent = HashSet::new();
        for node_id in targets {
            if !inner.connected.contains(node_id) {
                continue;
            }
            sent.insert(*node_id);
            Self::respond(&inner, &request, *node_id);
        }
        inner.messages_sent += sent.len();
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crosslink_network::{encode_signature_request, SignatureRequest};
    use crosslink_types::bls_keypair_from_seed;

    fn node(byte: u8) -> NodeId {
        NodeId::from_bytes([byte; 20])
    }

    fn request(request_id: u32) -> OutboundAppRequest {
        OutboundAppRequest {
            chain_id: ChainId::from_bytes([1u8; 32]),
            request_id,
            payload: encode_signature_request(&SignatureRequest {
                message: b"msg".to_vec(),
                justification: Vec::new(),
            }),
        }
    }

    #[tokio::test]
    async fn test_send_skips_disconnected_nodes() {
        let network = MemoryNetwork::new();
        network.connect(node(1));

        let sent = network.send_app_request(
            request(1),
            &HashSet::from([node(1), node(2)]),
            SubnetId::PRIMARY,
        );
        assert_eq!(sent, HashSet::from([node(1)]));
        assert_eq!(network.messages_sent(), 1);
    }

    #[tokio::test]
    async fn test_scripted_signer_responds() {
        let network = MemoryNetwork::new();
        let keypair = bls_keypair_from_seed(&[1u8; 32]);
        network.connect(node(1));
        network.set_behavior(node(1), SignerBehavior::Sign(keypair));

        let mut receiver = network.register_request(7, 1);
        network.expect_response(ResponseKey {
            node_id: node(1),
            chain_id: ChainId::from_bytes([1u8; 32]),
            request_id: 7,
        });

        network.send_app_request(request(7), &HashSet::from([node(1)]), SubnetId::PRIMARY);

        let inbound = receiver.recv().await.unwrap();
        assert_eq!(inbound.node_id, node(1));
        assert_eq!(inbound.request_id, 7);
        assert!(matches!(inbound.payload, ResponsePayload::Response(_)));
    }

    #[tokio::test]
    async fn test_unarmed_expectation_is_dropped() {
        let network = MemoryNetwork::new();
        network.connect(node(1));
        network.set_behavior(node(1), SignerBehavior::Sign(bls_keypair_from_seed(&[1u8; 32])));

        let mut receiver = network.register_request(7, 1);
        // No expect_response call: the response must not be delivered.
        network.send_app_request(request(7), &HashSet::from([node(1)]), SubnetId::PRIMARY);

        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn test_track_subnet_idempotent() {
        let network = MemoryNetwork::new();
        let subnet = SubnetId::from_bytes([4u8; 32]);
        assert!(!network.is_tracked(subnet));
        network.track_subnet(subnet);
        network.track_subnet(subnet);
        assert!(network.is_tracked(subnet));
    }

    #[test]
    fn test_unknown_chain_and_subnet() {
        let network = MemoryNetwork::new();
        let chain = ChainId::from_bytes([9u8; 32]);
        assert_eq!(
            network.subnet_for_chain(chain),
            Err(NetworkError::UnknownChain(chain))
        );
        assert!(network
            .connected_validators(SubnetId::from_bytes([9u8; 32]))
            .is_err());
    }
}
