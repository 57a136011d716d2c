//! Service configuration.

use anyhow::{bail, Context, Result};
use crosslink_aggregator::AggregatorConfig;
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Top-level service configuration, loaded from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Address the HTTP API listens on.
    #[serde(default = "default_api_addr")]
    pub api_addr: SocketAddr,

    /// Whether to expose the Prometheus metrics endpoint.
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,

    /// Log level filter (overridden by `RUST_LOG`).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Quorum percentage applied to aggregation requests.
    #[serde(default = "default_quorum_percentage")]
    pub quorum_percentage: u64,

    /// Aggregation engine tuning.
    #[serde(default)]
    pub aggregator: AggregatorSection,
}

/// Aggregation engine tuning knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct AggregatorSection {
    /// Maximum fingerprints retained in the signature cache.
    #[serde(default = "default_signature_cache_size")]
    pub signature_cache_size: usize,

    /// How long one attempt waits for responses, in milliseconds.
    #[serde(default = "default_per_attempt_deadline_ms")]
    pub per_attempt_deadline_ms: u64,

    /// Maximum signature-request rounds per job.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_addr: default_api_addr(),
            metrics_enabled: default_metrics_enabled(),
            log_level: default_log_level(),
            quorum_percentage: default_quorum_percentage(),
            aggregator: AggregatorSection::default(),
        }
    }
}

impl Default for AggregatorSection {
    fn default() -> Self {
        Self {
            signature_cache_size: default_signature_cache_size(),
            per_attempt_deadline_ms: default_per_attempt_deadline_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_api_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_quorum_percentage() -> u64 {
    67
}

fn default_signature_cache_size() -> usize {
    1024
}

fn default_per_attempt_deadline_ms() -> u64 {
    5000
}

fn default_max_attempts() -> u32 {
    5
}

impl ServiceConfig {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check bounds the deserializer cannot express.
    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.quorum_percentage) {
            bail!(
                "quorum_percentage must be in [1, 100], got {}",
                self.quorum_percentage
            );
        }
        if self.aggregator.max_attempts == 0 {
            bail!("aggregator.max_attempts must be at least 1");
        }
        if self.aggregator.signature_cache_size == 0 {
            bail!("aggregator.signature_cache_size must be at least 1");
        }
        Ok(())
    }

    /// Build the engine configuration.
    pub fn aggregator_config(&self) -> AggregatorConfig {
        AggregatorConfig {
            signature_cache_size: self.aggregator.signature_cache_size,
            per_attempt_deadline: Duration::from_millis(self.aggregator.per_attempt_deadline_ms),
            max_attempts: self.aggregator.max_attempts,
            ..AggregatorConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.api_addr.port(), 8080);
        assert!(config.metrics_enabled);
        assert_eq!(config.quorum_percentage, 67);
        assert_eq!(config.aggregator.signature_cache_size, 1024);
        assert_eq!(config.aggregator.per_attempt_deadline_ms, 5000);
        assert_eq!(config.aggregator.max_attempts, 5);
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: ServiceConfig = toml::from_str(
            r#"
            quorum_percentage = 80

            [aggregator]
            max_attempts = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.quorum_percentage, 80);
        assert_eq!(config.aggregator.max_attempts, 3);
        // Untouched fields keep their defaults.
        assert_eq!(config.aggregator.signature_cache_size, 1024);
    }

    #[test]
    fn test_validate_rejects_bad_quorum() {
        let mut config = ServiceConfig::default();
        config.quorum_percentage = 0;
        assert!(config.validate().is_err());
        config.quorum_percentage = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_aggregator_config_conversion() {
        let mut config = ServiceConfig::default();
        config.aggregator.per_attempt_deadline_ms = 250;
        let engine = config.aggregator_config();
        assert_eq!(engine.per_attempt_deadline, Duration::from_millis(250));
        assert_eq!(engine.max_attempts, 5);
    }
}
