//! Command-line flags.
//!
//! Flags are layered over the (optional) config file, which is layered over
//! the schema defaults.

use std::path::PathBuf;

use clap::Parser;

use crate::config::schema::{BackendConfig, BalancerConfig, Method};
use crate::config::validation::ValidationError;

#[derive(Debug, Parser)]
#[command(name = "layer7-lb")]
#[command(about = "HTTP load balancer with round robin and weighted round robin", long_about = None)]
pub struct Cli {
    /// Load balanced servers, comma separated (e.g. http://10.0.0.1:8080,http://10.0.0.2:8080)
    #[arg(long)]
    pub servers: Option<String>,

    /// Per-server weights for wrr, comma separated, in the same order as --servers
    #[arg(long, value_delimiter = ',')]
    pub weights: Vec<u32>,

    /// Select load balancing method (rr|wrr)
    #[arg(long)]
    pub method: Option<Method>,

    /// Port to serve on
    #[arg(long)]
    pub port: Option<u16>,

    /// Optional TOML config file; flags take precedence over it
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Overlay the flags that were given onto `config`.
    pub fn apply(&self, config: &mut BalancerConfig) -> Result<(), Vec<ValidationError>> {
        if let Some(method) = self.method {
            config.balancer.method = method;
        }
        if let Some(port) = self.port {
            config.listener.port = port;
        }

        if let Some(servers) = &self.servers {
            config.backends = parse_server_list(servers, &self.weights)?;
        } else if !self.weights.is_empty() {
            if self.weights.len() != config.backends.len() {
                return Err(vec![ValidationError::WeightCountMismatch {
                    count: self.weights.len(),
                    servers: config.backends.len(),
                }]);
            }
            for (backend, weight) in config.backends.iter_mut().zip(&self.weights) {
                backend.weight = *weight;
            }
        }

        Ok(())
    }
}

/// Split a comma separated server list, pairing each entry with its weight.
pub fn parse_server_list(
    servers: &str,
    weights: &[u32],
) -> Result<Vec<BackendConfig>, Vec<ValidationError>> {
    if servers.trim().is_empty() {
        return Err(vec![ValidationError::NoBackends]);
    }

    let urls: Vec<&str> = servers.split(',').map(str::trim).collect();

    if !weights.is_empty() && weights.len() != urls.len() {
        return Err(vec![ValidationError::WeightCountMismatch {
            count: weights.len(),
            servers: urls.len(),
        }]);
    }

    Ok(urls
        .into_iter()
        .enumerate()
        .map(|(i, url)| match weights.get(i) {
            Some(weight) => BackendConfig::weighted(url, *weight),
            None => BackendConfig::new(url),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::parse_from([
            "layer7-lb",
            "--servers",
            "http://127.0.0.1:9001, http://127.0.0.1:9002",
            "--weights",
            "3,1",
            "--method",
            "wrr",
            "--port",
            "8000",
        ]);

        let mut config = BalancerConfig::default();
        cli.apply(&mut config).unwrap();

        assert_eq!(config.listener.port, 8000);
        assert_eq!(config.balancer.method, Method::Wrr);
        assert_eq!(config.backends.len(), 2);
        assert_eq!(config.backends[0].url, "http://127.0.0.1:9001");
        assert_eq!(config.backends[0].weight, 3);
        assert_eq!(config.backends[1].url, "http://127.0.0.1:9002");
        assert_eq!(config.backends[1].weight, 1);
    }

    #[test]
    fn unknown_method_is_rejected_by_parser() {
        let result = Cli::try_parse_from(["layer7-lb", "--method", "random"]);
        assert!(result.is_err());
    }

    #[test]
    fn weight_count_must_match() {
        let err = parse_server_list("http://a:1,http://b:2", &[1]).unwrap_err();
        assert_eq!(
            err,
            vec![ValidationError::WeightCountMismatch { count: 1, servers: 2 }]
        );
    }

    #[test]
    fn blank_server_list_is_rejected() {
        assert_eq!(
            parse_server_list("  ", &[]).unwrap_err(),
            vec![ValidationError::NoBackends]
        );
    }
}
