//! Configuration loading from disk and the command line.

use std::fs;
use std::path::Path;

use crate::config::cli::Cli;
use crate::config::schema::BalancerConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load a TOML file without validating it.
pub fn read_config(path: &Path) -> Result<BalancerConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: BalancerConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<BalancerConfig, ConfigError> {
    let config = read_config(path)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Build the effective configuration: defaults, then the optional file, then flags.
pub fn resolve(cli: &Cli) -> Result<BalancerConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => read_config(path)?,
        None => BalancerConfig::default(),
    };

    cli.apply(&mut config).map_err(ConfigError::Validation)?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}
