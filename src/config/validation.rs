//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (windows > 0, probabilities in [0, 1])
//! - Validate addresses and relay endpoint
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::{GatewayConfig, RateLimitPolicyConfig};
use crate::validation::fields::is_email;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            "must be a socket address like 0.0.0.0:8080",
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be > 0"));
    }
    if config.timeouts.relay_secs == 0 {
        errors.push(ValidationError::new("timeouts.relay_secs", "must be > 0"));
    }

    validate_policy("rate_limit.global", &config.rate_limit.global, &mut errors);
    validate_policy("rate_limit.contact", &config.rate_limit.contact, &mut errors);

    if config.security.max_body_size == 0 {
        errors.push(ValidationError::new("security.max_body_size", "must be > 0"));
    }

    match url::Url::parse(&config.relay.endpoint) {
        Ok(u) if matches!(u.scheme(), "http" | "https") => {}
        _ => errors.push(ValidationError::new(
            "relay.endpoint",
            "must be an absolute http(s) URL",
        )),
    }
    if !is_email(&config.relay.recipient) {
        errors.push(ValidationError::new("relay.recipient", "must be an email address"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "must be a socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_policy(prefix: &str, policy: &RateLimitPolicyConfig, errors: &mut Vec<ValidationError>) {
    if policy.window_secs == 0 {
        errors.push(ValidationError::new(format!("{prefix}.window_secs"), "must be > 0"));
    }
    if policy.max_requests == 0 {
        errors.push(ValidationError::new(format!("{prefix}.max_requests"), "must be > 0"));
    }
    if !(0.0..=1.0).contains(&policy.sweep_probability) {
        errors.push(ValidationError::new(
            format!("{prefix}.sweep_probability"),
            "must be between 0.0 and 1.0",
        ));
    }
    if policy.max_entries == Some(0) {
        errors.push(ValidationError::new(format!("{prefix}.max_entries"), "must be > 0 when set"));
    }
}
