//! The aggregation engine.
//!
//! For each job: probe the cache, snapshot the signing subnet's canonical
//! validators, fan signature requests out to unsigned validators in bounded
//! rounds, verify each response, and aggregate once the requested share of
//! stake weight has signed.

use crate::cache::{Fingerprint, SignatureCache};
use crate::config::AggregatorConfig;
use crate::coordinator::{RequestCoordinator, SignatureRound};
use crate::error::AggregateError;
use crosslink_metrics as metrics;
use crosslink_network::{
    decode_signature_response, AppRequestNetwork, InboundResponse, ResponsePayload,
};
use crosslink_types::{
    aggregate_signatures, required_stake, verify_signature, BlsSignature, ConnectedValidators,
    SignedMessage, SignerBitset, SubnetId, UnsignedMessage,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Collects and aggregates validator signatures over unsigned messages.
///
/// Thread-safe and re-entrant: any number of jobs may run concurrently.
/// Concurrent jobs with identical fingerprints share cache progress but are
/// not coalesced into a single job.
pub struct SignatureAggregator<N> {
    network: Arc<N>,
    cache: SignatureCache,
    coordinator: RequestCoordinator,
    config: AggregatorConfig,
}

impl<N: AppRequestNetwork> SignatureAggregator<N> {
    /// Create an aggregator over a network backend.
    pub fn new(network: Arc<N>, config: AggregatorConfig) -> Self {
        Self {
            network,
            cache: SignatureCache::new(config.signature_cache_size),
            coordinator: RequestCoordinator::new(),
            config,
        }
    }

    /// Collect signatures for `message` from the signing subnet's validators
    /// until `quorum_numerator` percent of total stake weight has signed, and
    /// return the aggregated signed message.
    ///
    /// Passing [`SubnetId::PRIMARY`] derives the signing subnet from the
    /// message's source chain. The optional justification is forwarded to
    /// validators verbatim; the signature always covers the message bytes
    /// alone.
    pub async fn create_signed_message(
        &self,
        message: &UnsignedMessage,
        justification: Option<&[u8]>,
        signing_subnet: SubnetId,
        quorum_numerator: u64,
    ) -> Result<SignedMessage, AggregateError> {
        let job_started = Instant::now();

        if !(1..=100).contains(&quorum_numerator) {
            return Err(AggregateError::InvalidRequest(format!(
                "quorum numerator {quorum_numerator} outside [1, 100]"
            )));
        }

        let subnet_id = if signing_subnet.is_primary() {
            self.network.subnet_for_chain(message.source_chain_id())?
        } else {
            signing_subnet
        };
        self.network.track_subnet(subnet_id);

        let fetch_started = Instant::now();
        let validators = self.network.connected_validators(subnet_id)?;
        metrics::record_validator_fetch_latency(fetch_started.elapsed().as_secs_f64());

        if validators.total_weight() == 0 {
            return Err(AggregateError::NoValidators(subnet_id));
        }
        let required = required_stake(validators.total_weight(), quorum_numerator);

        let fingerprint = Fingerprint::new(
            message.bytes(),
            justification,
            subnet_id,
            quorum_numerator,
        );

        // Seed from cache. Entries may be stale after a validator-set change;
        // anything that no longer verifies is dropped, not an error.
        let mut accumulated: BTreeMap<usize, BlsSignature> = BTreeMap::new();
        match self.cache.get(&fingerprint) {
            Some(cached) => {
                metrics::record_cache_hit();
                for (index, signature) in cached {
                    let Some(validator) = validators.validators().get(index) else {
                        continue;
                    };
                    if self.verify_timed(&validator.public_key, message.bytes(), &signature) {
                        accumulated.insert(index, signature);
                    } else {
                        debug!(index, "dropping stale cached signature");
                    }
                }
            }
            None => metrics::record_cache_miss(),
        }

        // A cache that already covers quorum short-circuits the job; current
        // connectivity only gates jobs that still need to issue requests.
        if signed_weight(&validators, &accumulated) < required
            && (validators.connected_weight() as u128) * 100
                < (validators.total_weight() as u128) * (quorum_numerator as u128)
        {
            return Err(AggregateError::InsufficientConnectedStake {
                connected: validators.connected_weight(),
                total: validators.total_weight(),
                required,
            });
        }

        let mut attempts = 0;
        for attempt in 1..=self.config.max_attempts {
            if signed_weight(&validators, &accumulated) >= required {
                break;
            }
            if attempt > 1 {
                tokio::time::sleep(self.backoff_before(attempt)).await;
            }
            attempts = attempt;

            let unsigned: Vec<usize> = (0..validators.len())
                .filter(|index| !accumulated.contains_key(index))
                .collect();
            let round = self.coordinator.open_round(
                &*self.network,
                message,
                justification,
                subnet_id,
                &validators,
                &unsigned,
            );
            if round.sent.is_empty() {
                debug!(attempt, "no reachable nodes this attempt");
                continue;
            }

            let received = self
                .drain_round(round, attempt, message, &validators, required, &fingerprint, &mut accumulated)
                .await?;
            metrics::record_signature_responses(attempt, received);
        }

        let achieved = signed_weight(&validators, &accumulated);
        if achieved < required {
            metrics::record_quorum_failure();
            warn!(
                achieved,
                required, attempts, "aggregation ended below quorum"
            );
            return Err(AggregateError::NotEnoughSignatures {
                achieved,
                required,
                attempts,
            });
        }

        // Ascending validator index: aggregation is order-independent, but a
        // deterministic order aids testing.
        let mut signers = SignerBitset::new(validators.len());
        let mut signatures = Vec::with_capacity(accumulated.len());
        for (index, signature) in &accumulated {
            signers.set(*index);
            signatures.push(*signature);
        }
        let signature = aggregate_signatures(&signatures)
            .map_err(|e| AggregateError::Internal(e.to_string()))?;

        metrics::record_aggregation_latency(job_started.elapsed().as_secs_f64());
        info!(
            signers = signers.count_ones(),
            achieved,
            required,
            attempts,
            "aggregated signed message"
        );
        Ok(SignedMessage {
            unsigned: message.clone(),
            signers,
            signature,
        })
    }

    /// Drain one round's responses until quorum, all answers, or the
    /// per-attempt deadline. Returns the number of responses taken off the
    /// channel. Timeouts are not errors; they end the attempt.
    #[allow(clippy::too_many_arguments)]
    async fn drain_round(
        &self,
        mut round: SignatureRound,
        attempt: u32,
        message: &UnsignedMessage,
        validators: &ConnectedValidators,
        required: u64,
        fingerprint: &Fingerprint,
        accumulated: &mut BTreeMap<usize, BlsSignature>,
    ) -> Result<usize, AggregateError> {
        let deadline = tokio::time::Instant::now() + self.config.per_attempt_deadline;
        let mut received = 0;
        while received < round.sent.len() && signed_weight(validators, accumulated) < required {
            let inbound = match tokio::time::timeout_at(deadline, round.responses.recv()).await {
                Ok(Some(inbound)) => inbound,
                // Channel closed: the transport dropped the round.
                Ok(None) => break,
                // Deadline reached.
                Err(_) => {
                    debug!(attempt, received, "attempt deadline reached");
                    break;
                }
            };
            received += 1;
            self.process_response(inbound, &round, message, validators, fingerprint, accumulated)?;
        }
        Ok(received)
    }

    /// Handle one inbound response. Decode failures and invalid signatures
    /// are counted and ignored; only cache conflicts surface (as internal
    /// errors).
    fn process_response(
        &self,
        inbound: InboundResponse,
        round: &SignatureRound,
        message: &UnsignedMessage,
        validators: &ConnectedValidators,
        fingerprint: &Fingerprint,
        accumulated: &mut BTreeMap<usize, BlsSignature>,
    ) -> Result<(), AggregateError> {
        let node_id = inbound.node_id;
        if inbound.request_id != round.request_id || !round.targets.contains_key(&node_id) {
            debug!(?node_id, "response from unexpected source, ignoring");
            return Ok(());
        }

        let bytes = match inbound.payload {
            ResponsePayload::Response(bytes) => bytes,
            ResponsePayload::Failed => {
                metrics::record_app_request_failures(1);
                debug!(?node_id, "transport reported request failure");
                return Ok(());
            }
        };

        let Some(index) = validators.index_of_node(&node_id) else {
            debug!(?node_id, "response from node outside validator set");
            return Ok(());
        };
        if accumulated.contains_key(&index) {
            // Another of the validator's nodes answered first.
            debug!(?node_id, index, "duplicate response for signed validator");
            return Ok(());
        }

        // A malformed response counts as a silent refusal.
        let response = match decode_signature_response(&bytes) {
            Ok(response) => response,
            Err(e) => {
                metrics::record_app_request_failures(1);
                debug!(?node_id, error = %e, "malformed signature response");
                return Ok(());
            }
        };
        let signature = match BlsSignature::from_bytes(&response.signature) {
            Ok(signature) => signature,
            Err(e) => {
                metrics::record_app_request_failures(1);
                debug!(?node_id, error = %e, "undecodable signature bytes");
                return Ok(());
            }
        };

        let validator = &validators.validators()[index];
        if !self.verify_timed(&validator.public_key, message.bytes(), &signature) {
            metrics::record_app_request_failures(1);
            debug!(?node_id, index, "signature failed verification");
            return Ok(());
        }

        accumulated.insert(index, signature);
        self.cache
            .insert(*fingerprint, index, signature)
            .map_err(|e| AggregateError::Internal(e.to_string()))?;
        Ok(())
    }

    fn verify_timed(
        &self,
        public_key: &crosslink_types::BlsPublicKey,
        message_bytes: &[u8],
        signature: &BlsSignature,
    ) -> bool {
        let started = Instant::now();
        let valid = verify_signature(public_key, message_bytes, signature);
        metrics::record_bls_verify_latency(started.elapsed().as_secs_f64());
        valid
    }

    /// Exponential backoff before `attempt` (2 and later): base doubling per
    /// attempt, capped.
    fn backoff_before(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(2).min(16);
        self.config
            .backoff_base
            .saturating_mul(1u32 << shift)
            .min(self.config.backoff_cap)
    }
}

/// Summed stake weight of the validators indexed by `accumulated`.
fn signed_weight(
    validators: &ConnectedValidators,
    accumulated: &BTreeMap<usize, BlsSignature>,
) -> u64 {
    accumulated
        .keys()
        .map(|&index| validators.validators()[index].weight)
        .fold(0u64, |total, weight| total.saturating_add(weight))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crosslink_network_memory::{MemoryNetwork, SignerBehavior};
    use crosslink_types::{bls_keypair_from_seed, BlsSecretKey, ChainId, NodeId, Validator};

    const CHAIN: ChainId = ChainId::from_bytes([100u8; 32]);
    const SUBNET: SubnetId = SubnetId::from_bytes([200u8; 32]);

    fn node(byte: u8) -> NodeId {
        NodeId::from_bytes([byte; 20])
    }

    fn keypair(index: usize) -> BlsSecretKey {
        bls_keypair_from_seed(&[index as u8 + 1; 32])
    }

    fn test_message() -> UnsignedMessage {
        UnsignedMessage::new(5, CHAIN, b"cross-chain payload".to_vec())
    }

    fn test_config() -> AggregatorConfig {
        AggregatorConfig {
            signature_cache_size: 16,
            per_attempt_deadline: Duration::from_millis(50),
            max_attempts: 2,
            backoff_base: Duration::from_millis(1),
            backoff_cap: Duration::from_millis(4),
        }
    }

    /// A subnet of `count` weight-1 validators, one node each, all connected,
    /// with behavior scripted per validator index.
    fn build_subnet(
        count: usize,
        behavior: impl Fn(usize, &BlsSecretKey) -> SignerBehavior,
    ) -> Arc<MemoryNetwork> {
        let network = Arc::new(MemoryNetwork::new());
        network.register_chain(CHAIN, SUBNET);
        let mut validators = Vec::new();
        for i in 0..count {
            let kp = keypair(i);
            validators.push(Validator::new(kp.public_key(), 1, vec![node(i as u8 + 1)]));
            network.connect(node(i as u8 + 1));
            network.set_behavior(node(i as u8 + 1), behavior(i, &kp));
        }
        network.set_validators(SUBNET, validators);
        network
    }

    fn aggregator(network: &Arc<MemoryNetwork>) -> SignatureAggregator<MemoryNetwork> {
        SignatureAggregator::new(Arc::clone(network), test_config())
    }

    #[tokio::test]
    async fn test_rejects_quorum_out_of_range() {
        let network = build_subnet(1, |_, kp| SignerBehavior::Sign(kp.clone()));
        let agg = aggregator(&network);

        for quorum in [0, 101] {
            let err = agg
                .create_signed_message(&test_message(), None, SUBNET, quorum)
                .await
                .unwrap_err();
            assert!(matches!(err, AggregateError::InvalidRequest(_)));
        }
    }

    #[tokio::test]
    async fn test_no_validators() {
        // One registered validator with zero weight.
        let network = Arc::new(MemoryNetwork::new());
        network.register_chain(CHAIN, SUBNET);
        let kp = keypair(0);
        network.set_validators(
            SUBNET,
            vec![Validator::new(kp.public_key(), 0, vec![node(1)])],
        );

        let err = aggregator(&network)
            .create_signed_message(&test_message(), None, SUBNET, 80)
            .await
            .unwrap_err();
        assert!(matches!(err, AggregateError::NoValidators(s) if s == SUBNET));
    }

    #[tokio::test]
    async fn test_insufficient_connected_stake_sends_nothing() {
        // One weight-1 validator, not connected.
        let network = Arc::new(MemoryNetwork::new());
        network.register_chain(CHAIN, SUBNET);
        let kp = keypair(0);
        network.set_validators(
            SUBNET,
            vec![Validator::new(kp.public_key(), 1, vec![node(1)])],
        );

        let err = aggregator(&network)
            .create_signed_message(&test_message(), None, SUBNET, 80)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AggregateError::InsufficientConnectedStake {
                connected: 0,
                total: 1,
                ..
            }
        ));
        assert_eq!(network.messages_sent(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_responses_exhausts_attempts() {
        let network = build_subnet(2, |_, _| SignerBehavior::Silent);
        let err = aggregator(&network)
            .create_signed_message(&test_message(), None, SUBNET, 80)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AggregateError::NotEnoughSignatures {
                achieved: 0,
                required: 2,
                attempts: 2,
            }
        ));
        // Both validators were retried each attempt.
        assert_eq!(network.messages_sent(), 4);
    }

    #[tokio::test]
    async fn test_happy_path_verifies() {
        let network = build_subnet(5, |_, kp| SignerBehavior::Sign(kp.clone()));
        let message = test_message();
        let signed = aggregator(&network)
            .create_signed_message(&message, None, SUBNET, 80)
            .await
            .unwrap();

        assert!(signed.signers.count_ones() >= 4);
        let validators = network.connected_validators(SUBNET).unwrap();
        signed.verify(validators.validators(), 80).unwrap();
        assert_eq!(signed.unsigned, message);
    }

    #[tokio::test]
    async fn test_subnet_derived_from_source_chain() {
        let network = build_subnet(1, |_, kp| SignerBehavior::Sign(kp.clone()));
        let signed = aggregator(&network)
            .create_signed_message(&test_message(), None, SubnetId::PRIMARY, 100)
            .await
            .unwrap();

        assert!(network.is_tracked(SUBNET));
        assert_eq!(signed.signers.count_ones(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_quorum_boundary() {
        // Validator 0 never answers; the other four sign.
        let behavior = |i: usize, kp: &BlsSecretKey| {
            if i == 0 {
                SignerBehavior::Silent
            } else {
                SignerBehavior::Sign(kp.clone())
            }
        };

        // 4/5 = 80%: met.
        let network = build_subnet(5, behavior);
        let signed = aggregator(&network)
            .create_signed_message(&test_message(), None, SUBNET, 80)
            .await
            .unwrap();
        assert_eq!(signed.signers.count_ones(), 4);

        // 81%: one silent validator is fatal.
        let network = build_subnet(5, behavior);
        let err = aggregator(&network)
            .create_signed_message(&test_message(), None, SUBNET, 81)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AggregateError::NotEnoughSignatures {
                achieved: 4,
                required: 5,
                attempts: 2,
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_responses_are_ignored() {
        let network = build_subnet(5, |i, kp| match i {
            0 => SignerBehavior::Malformed,
            1 => SignerBehavior::WrongMessage(kp.clone()),
            2 => SignerBehavior::Failed,
            _ => SignerBehavior::Sign(kp.clone()),
        });

        // Two honest signers are enough for 40%.
        let signed = aggregator(&network)
            .create_signed_message(&test_message(), None, SUBNET, 40)
            .await
            .unwrap();
        assert_eq!(signed.signers.count_ones(), 2);

        // But 80% is unreachable, and the bad responses never count.
        let network2 = build_subnet(5, |i, kp| match i {
            0 => SignerBehavior::Malformed,
            1 => SignerBehavior::WrongMessage(kp.clone()),
            2 => SignerBehavior::Failed,
            _ => SignerBehavior::Sign(kp.clone()),
        });
        let err = aggregator(&network2)
            .create_signed_message(&test_message(), None, SUBNET, 80)
            .await
            .unwrap_err();
        assert!(matches!(err, AggregateError::NotEnoughSignatures { achieved: 2, .. }));
    }

    #[tokio::test]
    async fn test_quorum_100_requires_everyone() {
        let network = build_subnet(3, |_, kp| SignerBehavior::Sign(kp.clone()));
        let signed = aggregator(&network)
            .create_signed_message(&test_message(), None, SUBNET, 100)
            .await
            .unwrap();
        assert_eq!(signed.signers.count_ones(), 3);
    }

    #[tokio::test]
    async fn test_warm_cache_sends_nothing() {
        let network = build_subnet(5, |_, kp| SignerBehavior::Sign(kp.clone()));
        let agg = aggregator(&network);
        let message = test_message();

        let first = agg
            .create_signed_message(&message, None, SUBNET, 80)
            .await
            .unwrap();
        let sent_after_first = network.messages_sent();
        assert!(sent_after_first > 0);

        let second = agg
            .create_signed_message(&message, None, SUBNET, 80)
            .await
            .unwrap();
        assert_eq!(network.messages_sent(), sent_after_first);
        second
            .verify(network.connected_validators(SUBNET).unwrap().validators(), 80)
            .unwrap();
        assert_eq!(first.unsigned, second.unsigned);
    }

    #[tokio::test]
    async fn test_warm_cache_survives_lost_connectivity() {
        let network = build_subnet(2, |_, kp| SignerBehavior::Sign(kp.clone()));
        let agg = aggregator(&network);
        let message = test_message();

        agg.create_signed_message(&message, None, SUBNET, 100)
            .await
            .unwrap();

        // Every peer drops off; the cached signatures still cover quorum.
        for i in 0..2u8 {
            network.disconnect(node(i + 1));
        }
        let sent_before = network.messages_sent();
        let signed = agg
            .create_signed_message(&message, None, SUBNET, 100)
            .await
            .unwrap();
        assert_eq!(signed.signers.count_ones(), 2);
        assert_eq!(network.messages_sent(), sent_before);

        // A cold fingerprint under the same connectivity still fails fast.
        let other = UnsignedMessage::new(6, CHAIN, b"other payload".to_vec());
        let err = agg
            .create_signed_message(&other, None, SUBNET, 100)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AggregateError::InsufficientConnectedStake { connected: 0, total: 2, .. }
        ));
    }

    #[tokio::test]
    async fn test_concurrent_jobs_share_cache() {
        let network = build_subnet(5, |_, kp| SignerBehavior::Sign(kp.clone()));
        let agg = Arc::new(aggregator(&network));
        let message = test_message();

        let (a, b) = tokio::join!(
            agg.create_signed_message(&message, None, SUBNET, 80),
            agg.create_signed_message(&message, Some(b"evidence"), SUBNET, 80),
        );
        let validators = network.connected_validators(SUBNET).unwrap();
        a.unwrap().verify(validators.validators(), 80).unwrap();
        b.unwrap().verify(validators.validators(), 80).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_picks_up_late_signers() {
        // All validators silent: first call fails and caches nothing, but a
        // rescripted subnet answers on the next job's first attempt.
        let network = build_subnet(2, |_, _| SignerBehavior::Silent);
        let agg = aggregator(&network);
        let message = test_message();

        agg.create_signed_message(&message, None, SUBNET, 100)
            .await
            .unwrap_err();

        for i in 0..2 {
            network.set_behavior(node(i as u8 + 1), SignerBehavior::Sign(keypair(i)));
        }
        let signed = agg
            .create_signed_message(&message, None, SUBNET, 100)
            .await
            .unwrap();
        assert_eq!(signed.signers.count_ones(), 2);
    }
}
