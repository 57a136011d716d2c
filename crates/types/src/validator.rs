//! Canonical validator sets.

use crate::crypto::BlsPublicKey;
use crate::ids::NodeId;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Minimum stake weight required to satisfy a quorum numerator, computed as
/// `ceil(total_weight * quorum_numerator / 100)`.
pub fn required_stake(total_weight: u64, quorum_numerator: u64) -> u64 {
    let product = total_weight as u128 * quorum_numerator as u128;
    (product.div_ceil(100)) as u64
}

/// A validator of the signing subnet.
///
/// A validator may bind several node ids; any one of its nodes may answer a
/// signature request on its behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validator {
    /// BLS public key used to verify this validator's signatures.
    pub public_key: BlsPublicKey,
    /// Uncompressed public key serialization; canonical order sorts on this.
    pub public_key_bytes: Vec<u8>,
    /// Stake weight.
    pub weight: u64,
    /// Nodes operated by this validator.
    pub node_ids: Vec<NodeId>,
}

impl Validator {
    /// Create a validator, deriving `public_key_bytes` from the key.
    pub fn new(public_key: BlsPublicKey, weight: u64, node_ids: Vec<NodeId>) -> Self {
        Self {
            public_key_bytes: public_key.uncompressed_bytes().to_vec(),
            public_key,
            weight,
            node_ids,
        }
    }
}

/// The signing subnet's validators in canonical order, with connectivity.
///
/// Canonical order is ascending uncompressed-public-key bytes; positions in
/// this order define the bit positions of a signed message's signer bitset.
#[derive(Debug, Clone)]
pub struct ConnectedValidators {
    validators: Vec<Validator>,
    /// Node id to position in `validators`.
    node_index_map: HashMap<NodeId, usize>,
    /// Nodes currently reachable through the p2p layer.
    connected_nodes: HashSet<NodeId>,
    connected_weight: u64,
    total_weight: u64,
}

impl ConnectedValidators {
    /// Build the canonical view from a raw validator-set snapshot.
    ///
    /// Validators sharing a BLS public key are merged: node ids are unioned
    /// and weights summed. Aggregation indexes by key, not by node, so a key
    /// registered twice must occupy a single canonical position. The merged
    /// set is sorted by uncompressed public key bytes; the input is consumed,
    /// not mutated in place.
    pub fn canonicalize(raw: Vec<Validator>, connected_nodes: HashSet<NodeId>) -> Self {
        let mut merged: BTreeMap<Vec<u8>, Validator> = BTreeMap::new();
        for validator in raw {
            match merged.entry(validator.public_key_bytes.clone()) {
                std::collections::btree_map::Entry::Vacant(entry) => {
                    entry.insert(validator);
                }
                std::collections::btree_map::Entry::Occupied(mut entry) => {
                    let existing = entry.get_mut();
                    existing.weight = existing.weight.saturating_add(validator.weight);
                    for node_id in validator.node_ids {
                        if !existing.node_ids.contains(&node_id) {
                            existing.node_ids.push(node_id);
                        }
                    }
                }
            }
        }

        // BTreeMap iteration yields ascending key bytes: canonical order.
        let validators: Vec<Validator> = merged.into_values().collect();

        let mut node_index_map = HashMap::new();
        let mut total_weight: u64 = 0;
        let mut connected_weight: u64 = 0;
        for (index, validator) in validators.iter().enumerate() {
            total_weight = total_weight.saturating_add(validator.weight);
            if validator
                .node_ids
                .iter()
                .any(|node_id| connected_nodes.contains(node_id))
            {
                connected_weight = connected_weight.saturating_add(validator.weight);
            }
            for node_id in &validator.node_ids {
                node_index_map.insert(*node_id, index);
            }
        }

        Self {
            validators,
            node_index_map,
            connected_nodes,
            connected_weight,
            total_weight,
        }
    }

    /// Validators in canonical order.
    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    /// Number of canonical validators.
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Canonical index of the validator operating `node_id`.
    pub fn index_of_node(&self, node_id: &NodeId) -> Option<usize> {
        self.node_index_map.get(node_id).copied()
    }

    /// Whether `node_id` is currently reachable.
    pub fn is_connected(&self, node_id: &NodeId) -> bool {
        self.connected_nodes.contains(node_id)
    }

    /// Summed weight of validators with at least one connected node.
    pub fn connected_weight(&self) -> u64 {
        self.connected_weight
    }

    /// Summed weight of all validators.
    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }
}
