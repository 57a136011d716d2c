//! Prometheus metrics backend for Crosslink.
//!
//! Implements [`crosslink_metrics::MetricsRecorder`] using native Prometheus
//! counters and histograms registered with the default registry, so the
//! service's `/metrics` endpoint picks them up via `prometheus::gather()`.
//!
//! Call [`install()`] once at startup before any metrics are recorded.

use crosslink_metrics::MetricsRecorder;
use prometheus::{
    register_counter, register_histogram, register_histogram_vec, Counter, Histogram, HistogramVec,
};

/// Domain-specific Prometheus metrics for production monitoring.
struct Metrics {
    aggregation_latency: Histogram,
    signature_responses: HistogramVec,
    cache_hits: Counter,
    cache_misses: Counter,
    quorum_failures: Counter,
    validator_fetch_latency: Histogram,
    bls_verify_latency: Histogram,
    app_requests_sent: Counter,
    app_request_failures: Counter,
}

impl Metrics {
    fn new() -> Self {
        let latency_buckets = vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
        ];

        Self {
            aggregation_latency: register_histogram!(
                "crosslink_aggregation_latency_seconds",
                "End-to-end latency of signature aggregation jobs",
                latency_buckets.clone()
            )
            .unwrap(),

            signature_responses: register_histogram_vec!(
                "crosslink_signature_responses",
                "Signature responses received per attempt",
                &["attempt"],
                vec![0.0, 1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0]
            )
            .unwrap(),

            cache_hits: register_counter!(
                "crosslink_signature_cache_hits_total",
                "Cache probes that found usable signatures"
            )
            .unwrap(),

            cache_misses: register_counter!(
                "crosslink_signature_cache_misses_total",
                "Cache probes that found nothing"
            )
            .unwrap(),

            quorum_failures: register_counter!(
                "crosslink_quorum_failures_total",
                "Aggregation jobs that ended without reaching quorum"
            )
            .unwrap(),

            validator_fetch_latency: register_histogram!(
                "crosslink_validator_fetch_latency_seconds",
                "Latency of canonical validator set fetches",
                latency_buckets.clone()
            )
            .unwrap(),

            bls_verify_latency: register_histogram!(
                "crosslink_bls_verify_latency_seconds",
                "Latency of individual BLS signature verifications",
                latency_buckets
            )
            .unwrap(),

            app_requests_sent: register_counter!(
                "crosslink_app_requests_sent_total",
                "App-level signature requests handed to the transport"
            )
            .unwrap(),

            app_request_failures: register_counter!(
                "crosslink_app_request_failures_total",
                "Signature responses that were missing, malformed, or invalid"
            )
            .unwrap(),
        }
    }
}

impl MetricsRecorder for Metrics {
    fn record_aggregation_latency(&self, latency_secs: f64) {
        self.aggregation_latency.observe(latency_secs);
    }

    fn record_signature_responses(&self, attempt: u32, count: usize) {
        self.signature_responses
            .with_label_values(&[&attempt.to_string()])
            .observe(count as f64);
    }

    fn record_cache_hit(&self) {
        self.cache_hits.inc();
    }

    fn record_cache_miss(&self) {
        self.cache_misses.inc();
    }

    fn record_quorum_failure(&self) {
        self.quorum_failures.inc();
    }

    fn record_validator_fetch_latency(&self, latency_secs: f64) {
        self.validator_fetch_latency.observe(latency_secs);
    }

    fn record_bls_verify_latency(&self, latency_secs: f64) {
        self.bls_verify_latency.observe(latency_secs);
    }

    fn record_app_requests_sent(&self, count: usize) {
        self.app_requests_sent.inc_by(count as f64);
    }

    fn record_app_request_failures(&self, count: usize) {
        self.app_request_failures.inc_by(count as f64);
    }
}

/// Register the Prometheus metrics and install them as the global recorder.
///
/// Returns `false` if a recorder was already installed.
pub fn install() -> bool {
    crosslink_metrics::install(Box::new(Metrics::new()))
}
