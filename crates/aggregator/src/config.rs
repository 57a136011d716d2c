//! Aggregator configuration.

use std::time::Duration;

/// Configuration for [`SignatureAggregator`](crate::SignatureAggregator).
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Maximum fingerprints retained in the signature cache.
    pub signature_cache_size: usize,

    /// How long one attempt waits for responses before retrying.
    pub per_attempt_deadline: Duration,

    /// Maximum signature-request rounds per job.
    pub max_attempts: u32,

    /// Backoff before the second attempt; doubles each attempt after that.
    pub backoff_base: Duration,

    /// Upper bound on the inter-attempt backoff.
    pub backoff_cap: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            signature_cache_size: 1024,
            per_attempt_deadline: Duration::from_secs(5),
            max_attempts: 5,
            backoff_base: Duration::from_millis(500),
            backoff_cap: Duration::from_secs(5),
        }
    }
}
