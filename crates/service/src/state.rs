//! Shared state handed to HTTP handlers.

use crosslink_aggregator::SignatureAggregator;
use std::sync::Arc;

/// State shared by all routes.
pub struct ServiceState<N> {
    /// The aggregation engine.
    pub aggregator: Arc<SignatureAggregator<N>>,
    /// Quorum percentage applied to aggregation requests.
    pub quorum_percentage: u64,
}

// Manual impl: `N` itself need not be `Clone` behind the `Arc`.
impl<N> Clone for ServiceState<N> {
    fn clone(&self) -> Self {
        Self {
            aggregator: Arc::clone(&self.aggregator),
            quorum_percentage: self.quorum_percentage,
        }
    }
}
