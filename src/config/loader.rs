//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::{Environment, GatewayConfig};
use crate::config::validation::{validate_config, ValidationError};

pub const ENV_RELAY_ACCESS_KEY: &str = "GATEWAY_RELAY_ACCESS_KEY";
pub const ENV_ENVIRONMENT: &str = "GATEWAY_ENV";
pub const ENV_BIND: &str = "GATEWAY_BIND";

/// Error type for configuration loading.
#[derive(Debug, Error)]
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

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<GatewayConfig, ConfigError> {
    let config: GatewayConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Apply environment overrides from the process environment.
pub fn apply_env_overrides(config: &mut GatewayConfig) {
    apply_overrides(config, |key| std::env::var(key).ok());
}

/// Apply overrides from an arbitrary lookup.
///
/// The relay credential is only ever read from the environment.
pub fn apply_overrides<F>(config: &mut GatewayConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(key) = lookup(ENV_RELAY_ACCESS_KEY) {
        let key = key.trim().to_string();
        config.relay.access_key = (!key.is_empty()).then_some(key);
    }

    if let Some(raw) = lookup(ENV_ENVIRONMENT) {
        match Environment::parse(&raw) {
            Some(env) => config.security.environment = env,
            None => tracing::warn!(value = %raw, "Ignoring unknown {}", ENV_ENVIRONMENT),
        }
    }

    if let Some(bind) = lookup(ENV_BIND) {
        config.listener.bind_address = bind;
    }
}
