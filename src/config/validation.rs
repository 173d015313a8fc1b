//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate backend URLs (parsable, http, has host)
//! - Validate value ranges (intervals, timeouts and budgets > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BalancerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use url::Url;

use crate::config::schema::BalancerConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("no servers provided")]
    NoBackends,

    #[error("invalid backend url {url:?}: {reason}")]
    InvalidBackendUrl { url: String, reason: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{count} weights given for {servers} servers")]
    WeightCountMismatch { count: usize, servers: usize },
}

/// Check every backend URL and numeric setting, collecting all problems.
pub fn validate_config(config: &BalancerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.backends.is_empty() {
        errors.push(ValidationError::NoBackends);
    }

    for backend in &config.backends {
        if let Err(reason) = check_backend_url(&backend.url) {
            errors.push(ValidationError::InvalidBackendUrl {
                url: backend.url.clone(),
                reason,
            });
        }
    }

    let ranges: [(&'static str, u64); 7] = [
        ("health_check.interval_secs", config.health_check.interval_secs),
        ("health_check.timeout_secs", config.health_check.timeout_secs),
        ("retries.max_attempts", config.retries.max_attempts as u64),
        ("timeouts.connect_secs", config.timeouts.connect_secs),
        ("timeouts.response_secs", config.timeouts.response_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
        ("stats.interval_secs", config.stats.interval_secs),
    ];
    for (field, value) in ranges {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Parse a backend URL and make sure it can be proxied to.
pub fn check_backend_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw.trim()).map_err(|e| e.to_string())?;
    if url.scheme() != "http" {
        return Err(format!("unsupported scheme {:?}", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err("missing host".to_string());
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::BackendConfig;

    #[test]
    fn empty_server_list_is_rejected() {
        let config = BalancerConfig::default();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::NoBackends]);
    }

    #[test]
    fn collects_every_error() {
        let mut config = BalancerConfig::default();
        config.backends.push(BackendConfig::new("not a url"));
        config.backends.push(BackendConfig::new("https://127.0.0.1:9000"));
        config.backends.push(BackendConfig::new("http://127.0.0.1:9001"));
        config.health_check.interval_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(matches!(errors[0], ValidationError::InvalidBackendUrl { .. }));
        assert!(matches!(errors[1], ValidationError::InvalidBackendUrl { .. }));
        assert_eq!(
            errors[2],
            ValidationError::Zero { field: "health_check.interval_secs" }
        );
    }

    #[test]
    fn zero_upstream_timeouts_are_rejected() {
        let mut config = BalancerConfig::default();
        config.backends.push(BackendConfig::new("http://127.0.0.1:9001"));
        config.timeouts.connect_secs = 0;
        config.timeouts.response_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::Zero { field: "timeouts.connect_secs" },
                ValidationError::Zero { field: "timeouts.response_secs" },
            ]
        );
    }

    #[test]
    fn valid_config_passes() {
        let mut config = BalancerConfig::default();
        config.backends.push(BackendConfig::new("http://127.0.0.1:9001"));
        config.backends.push(BackendConfig::weighted("http://localhost:9002/api", 0));
        assert!(validate_config(&config).is_ok());
    }
}
