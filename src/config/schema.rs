//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the contact gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Rate limiting policies.
    pub rate_limit: RateLimitConfig,

    /// Security headers and request limits.
    pub security: SecurityConfig,

    /// Downstream mail relay.
    pub relay: RelayConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Whole-request timeout in seconds.
    pub request_secs: u64,

    /// Timeout for the hand-off to the mail relay in seconds.
    pub relay_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            relay_secs: 10,
        }
    }
}

/// Rate limiting configuration: two independent policies.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Applied to every route.
    pub global: RateLimitPolicyConfig,

    /// Applied only to the message-submission endpoint.
    pub contact: RateLimitPolicyConfig,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            global: RateLimitPolicyConfig {
                window_secs: 60 * 60,
                max_requests: 100,
                sweep_probability: 0.01,
                max_entries: None,
            },
            contact: RateLimitPolicyConfig {
                window_secs: 60 * 60,
                max_requests: 3,
                sweep_probability: 0.1,
                max_entries: None,
            },
        }
    }
}

/// A single fixed-window policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitPolicyConfig {
    /// Window length in seconds.
    pub window_secs: u64,

    /// Maximum requests per key per window.
    pub max_requests: u64,

    /// Chance (0.0..=1.0) that a request triggers an expired-window sweep.
    pub sweep_probability: f64,

    /// Optional hard cap on tracked keys (least-recently-seen eviction).
    pub max_entries: Option<usize>,
}

impl Default for RateLimitPolicyConfig {
    fn default() -> Self {
        Self {
            window_secs: 60 * 60,
            max_requests: 100,
            sweep_probability: 0.01,
            max_entries: None,
        }
    }
}

impl RateLimitPolicyConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    #[default]
    Production,
}

impl Environment {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Some(Self::Development),
            "production" | "prod" => Some(Self::Production),
            _ => None,
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Attach the security header set to every response.
    pub enable_headers: bool,

    /// Send Strict-Transport-Security (only meaningful behind HTTPS).
    pub hsts: bool,

    /// Maximum accepted body size in bytes.
    pub max_body_size: usize,

    /// Deployment environment.
    pub environment: Environment,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_headers: true,
            hsts: true,
            max_body_size: 64 * 1024,
            environment: Environment::Production,
        }
    }
}

impl SecurityConfig {
    /// HSTS is only sent in production.
    pub fn send_hsts(&self) -> bool {
        self.hsts && self.environment == Environment::Production
    }
}

/// Mail relay configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Relay submission endpoint.
    pub endpoint: String,

    /// Relay access credential. Absent means log-only mode.
    #[serde(skip_serializing)]
    pub access_key: Option<String>,

    /// Recipient mailbox.
    pub recipient: String,

    /// Prefix prepended to the forwarded subject.
    pub subject_prefix: String,

    /// Deliver even when running in development.
    pub enable_in_development: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.web3forms.com/submit".to_string(),
            access_key: None,
            recipient: "contact@example.com".to_string(),
            subject_prefix: "Contact Form: ".to_string(),
            enable_in_development: false,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
