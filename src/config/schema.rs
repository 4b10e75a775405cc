//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the failover layer.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct FailoverConfig {
    /// Candidate endpoints and retry behaviour.
    pub cluster: ClusterConfig,

    /// Circuit breaker settings shared by every endpoint.
    pub breaker: BreakerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Candidate endpoints, in priority order, and per-request retry settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ClusterConfig {
    /// Endpoint base addresses. The first one is the preferred node.
    pub addresses: Vec<String>,

    /// Fixed pause between a failed attempt and its retry, in milliseconds.
    pub delay_between_retries_ms: u64,

    /// Optional response timeout handed to the transport for every call.
    pub receive_timeout_ms: Option<u64>,

    /// Maximum dispatches per logical request.
    /// Defaults to `addresses × max(failure_threshold, 1)`.
    pub max_attempts: Option<u32>,

    /// Reject duplicate addresses instead of collapsing them.
    pub reject_duplicate_addresses: bool,

    /// HTTP statuses the transport reports as failed dispatches.
    pub failover_status_codes: Vec<u16>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            addresses: Vec::new(),
            delay_between_retries_ms: 0,
            receive_timeout_ms: None,
            max_attempts: None,
            reject_duplicate_addresses: false,
            failover_status_codes: Vec::new(),
        }
    }
}

impl ClusterConfig {
    pub fn delay_between_retries(&self) -> Duration {
        Duration::from_millis(self.delay_between_retries_ms)
    }

    pub fn receive_timeout(&self) -> Option<Duration> {
        self.receive_timeout_ms.map(Duration::from_millis)
    }
}

/// Circuit breaker thresholds.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures that trip a closed circuit. 0 trips on the first failure.
    pub failure_threshold: u32,

    /// Cooldown an open circuit waits before admitting a probe, in milliseconds.
    pub reset_timeout_ms: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            reset_timeout_ms: 1_000,
        }
    }
}

impl BreakerConfig {
    pub fn new(failure_threshold: u32, reset_timeout_ms: u64) -> Self {
        Self {
            failure_threshold,
            reset_timeout_ms,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FailoverConfig::default();
        assert!(config.cluster.addresses.is_empty());
        assert_eq!(config.breaker.failure_threshold, 3);
        assert_eq!(config.breaker.reset_timeout_ms, 1_000);
        assert_eq!(config.cluster.delay_between_retries(), Duration::ZERO);
        assert!(config.cluster.receive_timeout().is_none());
        assert!(!config.observability.metrics_enabled);
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config: FailoverConfig = toml::from_str(
            r#"
            [cluster]
            addresses = ["http://node1:8080", "http://node2:8080"]
            receive_timeout_ms = 250

            [breaker]
            failure_threshold = 0
            "#,
        )
        .unwrap();

        assert_eq!(config.cluster.addresses.len(), 2);
        assert_eq!(config.cluster.receive_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.breaker.failure_threshold, 0);
        // untouched fields keep their defaults
        assert_eq!(config.breaker.reset_timeout_ms, 1_000);
        assert_eq!(config.observability.log_level, "info");
    }
}
