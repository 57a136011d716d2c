//! Route configuration.

use crate::handlers::{aggregate_signatures_handler, health_handler, metrics_handler};
use crate::state::ServiceState;
use axum::routing::{get, post};
use axum::Router;
use crosslink_network::AppRequestNetwork;

/// Create the full router with all service routes.
///
/// The Prometheus scrape endpoint is only mounted when `metrics_enabled` is
/// set.
pub fn create_router<N: AppRequestNetwork + 'static>(
    state: ServiceState<N>,
    metrics_enabled: bool,
) -> Router {
    let mut router = Router::new()
        .route("/aggregate-signatures", post(aggregate_signatures_handler))
        .route("/health", get(health_handler));
    if metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }
    router.with_state(state)
}
