//! Metrics facade for Crosslink.
//!
//! Provides a [`MetricsRecorder`] trait with domain-specific methods and
//! default no-op implementations. A global singleton recorder is accessed via
//! [`recorder()`], and convenience free functions delegate to it.
//!
//! # Usage
//!
//! Callers record metrics via free functions:
//! ```ignore
//! crosslink_metrics::record_aggregation_latency(latency_secs);
//! crosslink_metrics::record_cache_hit();
//! ```
//!
//! At startup, install a backend:
//! ```ignore
//! crosslink_metrics_prometheus::install();
//! ```
//! Without a backend every call is a no-op.

use std::sync::OnceLock;

/// Domain-specific metrics recording trait.
///
/// All methods have default no-op implementations so backends only need
/// to override the metrics they care about.
#[allow(unused_variables)]
pub trait MetricsRecorder: Send + Sync + 'static {
    /// Record the end-to-end latency of one aggregation job.
    fn record_aggregation_latency(&self, latency_secs: f64) {}

    /// Record how many signature responses one attempt received.
    fn record_signature_responses(&self, attempt: u32, count: usize) {}

    /// Record a cache probe that found usable signatures.
    fn record_cache_hit(&self) {}

    /// Record a cache probe that found nothing.
    fn record_cache_miss(&self) {}

    /// Record a job that ended without reaching quorum.
    fn record_quorum_failure(&self) {}

    /// Record the latency of a validator-set fetch.
    fn record_validator_fetch_latency(&self, latency_secs: f64) {}

    /// Record the latency of one BLS signature verification.
    fn record_bls_verify_latency(&self, latency_secs: f64) {}

    /// Record app-level requests handed to the transport.
    fn record_app_requests_sent(&self, count: usize) {}

    /// Record responses that were missing, malformed, or invalid.
    fn record_app_request_failures(&self, count: usize) {}
}

/// No-op recorder used until a backend is installed.
struct NoopRecorder;

impl MetricsRecorder for NoopRecorder {}

static NOOP: NoopRecorder = NoopRecorder;
static RECORDER: OnceLock<Box<dyn MetricsRecorder>> = OnceLock::new();

/// Install a metrics backend. Returns `false` if one is already installed.
pub fn install(recorder: Box<dyn MetricsRecorder>) -> bool {
    RECORDER.set(recorder).is_ok()
}

/// The installed recorder, or the no-op recorder.
pub fn recorder() -> &'static dyn MetricsRecorder {
    RECORDER.get().map(|r| r.as_ref()).unwrap_or(&NOOP)
}

/// Record the end-to-end latency of one aggregation job.
pub fn record_aggregation_latency(latency_secs: f64) {
    recorder().record_aggregation_latency(latency_secs);
}

/// Record how many signature responses one attempt received.
pub fn record_signature_responses(attempt: u32, count: usize) {
    recorder().record_signature_responses(attempt, count);
}

/// Record a cache probe that found usable signatures.
pub fn record_cache_hit() {
    recorder().record_cache_hit();
}

/// Record a cache probe that found nothing.
pub fn record_cache_miss() {
    recorder().record_cache_miss();
}

/// Record a job that ended without reaching quorum.
pub fn record_quorum_failure() {
    recorder().record_quorum_failure();
}

/// Record the latency of a validator-set fetch.
pub fn record_validator_fetch_latency(latency_secs: f64) {
    recorder().record_validator_fetch_latency(latency_secs);
}

/// Record the latency of one BLS signature verification.
pub fn record_bls_verify_latency(latency_secs: f64) {
    recorder().record_bls_verify_latency(latency_secs);
}

/// Record app-level requests handed to the transport.
pub fn record_app_requests_sent(count: usize) {
    recorder().record_app_requests_sent(count);
}

/// Record responses that were missing, malformed, or invalid.
pub fn record_app_request_failures(count: usize) {
    recorder().record_app_request_failures(count);
}
