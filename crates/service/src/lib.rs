//! HTTP surface for the signature aggregation service.
//!
//! Exposes `POST /aggregate-signatures` over an
//! [`crosslink_aggregator::SignatureAggregator`], plus health and Prometheus
//! metrics endpoints. Configuration loads from TOML with CLI overrides.

pub mod config;
mod handlers;
mod routes;
mod state;

pub use config::ServiceConfig;
pub use routes::create_router;
pub use state::ServiceState;
