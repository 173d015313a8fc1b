//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the balancer.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the load balancer.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BalancerConfig {
    /// Listener configuration (bind host, port).
    pub listener: ListenerConfig,

    /// Peer selection settings.
    pub balancer: SelectionConfig,

    /// Upstream backend definitions, in rotation order.
    pub backends: Vec<BackendConfig>,

    /// Health check settings.
    pub health_check: HealthCheckConfig,

    /// Retry and failover budget.
    pub retries: RetryConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request limits.
    pub limits: LimitsConfig,

    /// Periodic per-backend statistics output.
    pub stats: StatsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Read-only admin API.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Host or IP to bind (e.g., "0.0.0.0").
    pub bind_host: String,

    /// Port to accept inbound HTTP on.
    pub port: u16,
}

impl ListenerConfig {
    /// The `host:port` string handed to the TCP listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_host, self.port)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            port: 3030,
        }
    }
}

/// Peer selection algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    /// Round robin among alive backends.
    #[default]
    Rr,
    /// Weighted round robin: `weight` consecutive picks per backend.
    Wrr,
}

impl std::str::FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rr" => Ok(Method::Rr),
            "wrr" => Ok(Method::Wrr),
            other => Err(format!("method should be either rr or wrr, got {:?}", other)),
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Rr => write!(f, "rr"),
            Method::Wrr => write!(f, "wrr"),
        }
    }
}

/// Peer selection configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SelectionConfig {
    /// Selection algorithm.
    pub method: Method,

    /// Let weighted round robin advance past dead backends.
    ///
    /// Off by default: the weighted rotation hands out a dead backend's turn
    /// and leaves it to the retry/failover path.
    pub wrr_skip_dead: bool,
}

/// Backend server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Backend base URL (e.g., "http://127.0.0.1:3000").
    pub url: String,

    /// Weight for weighted round robin (default: 1, zero is normalized to 1).
    #[serde(default = "default_weight")]
    pub weight: u32,
}

impl BackendConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            weight: default_weight(),
        }
    }

    pub fn weighted(url: impl Into<String>, weight: u32) -> Self {
        Self {
            url: url.into(),
            weight,
        }
    }
}

fn default_weight() -> u32 {
    1
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable the periodic connectivity probe.
    pub enabled: bool,

    /// Probe cycle period in seconds.
    pub interval_secs: u64,

    /// Per-backend TCP connect timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 120,
            timeout_secs: 2,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Dispatch attempts per inbound request (each picks a peer).
    pub max_attempts: u32,

    /// Forward retries against the same backend before failing over.
    pub max_retries: u32,

    /// Fixed delay between retries against the same backend, in milliseconds.
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            max_retries: 3,
            backoff_ms: 10,
        }
    }
}

/// Timeout configuration for upstream traffic.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Deadline for one forward (connect plus response headers) in seconds.
    /// A forward that misses it counts as failed and is retried.
    pub response_secs: u64,

    /// Whole-request deadline (including retries) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            response_secs: 10,
            request_secs: 60,
        }
    }
}

/// Request limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum buffered request body, in bytes.
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// How a completed upstream response is classified for the error counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSignal {
    /// Error unless the response carries a `Status: 200 OK` header.
    #[default]
    StatusHeader,
    /// Error unless the numeric status code is 2xx.
    StatusCode,
}

/// Statistics sink configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Enable the periodic stats writer.
    pub enabled: bool,

    /// Sampling interval in seconds.
    pub interval_secs: u64,

    /// Stats file path.
    pub path: String,

    /// Rotate once the file would grow past this many megabytes.
    pub max_size_mb: u64,

    /// Rotated files to keep (0 keeps all).
    pub max_backups: usize,

    /// Delete rotated files older than this many days (0 disables).
    pub max_age_days: u64,

    /// Gzip rotated files.
    pub compress: bool,

    /// Response classification used by the error counter.
    pub error_signal: ErrorSignal,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 10,
            path: "stats.txt".to_string(),
            max_size_mb: 10,
            max_backups: 3,
            max_age_days: 28,
            compress: true,
            error_signal: ErrorSignal::default(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
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

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:3031".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = BalancerConfig::default();
        assert_eq!(config.listener.port, 3030);
        assert_eq!(config.balancer.method, Method::Rr);
        assert_eq!(config.health_check.interval_secs, 120);
        assert_eq!(config.health_check.timeout_secs, 2);
        assert_eq!(config.retries.max_attempts, 3);
        assert_eq!(config.retries.max_retries, 3);
        assert_eq!(config.retries.backoff_ms, 10);
        assert_eq!(config.stats.interval_secs, 10);
        assert_eq!(config.stats.error_signal, ErrorSignal::StatusHeader);
    }

    #[test]
    fn parses_partial_toml() {
        let config: BalancerConfig = toml::from_str(
            r#"
            [balancer]
            method = "wrr"

            [[backends]]
            url = "http://127.0.0.1:9001"
            weight = 3

            [[backends]]
            url = "http://127.0.0.1:9002"

            [stats]
            error_signal = "status_code"
            "#,
        )
        .unwrap();

        assert_eq!(config.balancer.method, Method::Wrr);
        assert_eq!(config.backends.len(), 2);
        assert_eq!(config.backends[0].weight, 3);
        assert_eq!(config.backends[1].weight, 1);
        assert_eq!(config.stats.error_signal, ErrorSignal::StatusCode);
        assert_eq!(config.listener.port, 3030);
    }

    #[test]
    fn method_from_str() {
        assert_eq!("rr".parse::<Method>().unwrap(), Method::Rr);
        assert_eq!("wrr".parse::<Method>().unwrap(), Method::Wrr);
        assert!("random".parse::<Method>().is_err());
    }
}
