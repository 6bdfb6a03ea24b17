//! Mail relay client with timeout and error handling.
//!
//! # Responsibilities
//! - POST validated submissions to the relay API
//! - Treat non-2xx, non-JSON, and `success: false` uniformly as failures
//! - Bound every call with a deadline

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::config::{Environment, GatewayConfig};
use crate::relay::types::{truncate_for_log, RelayError, RelayPayload, RelayResponse, RelayResult};
use crate::validation::ContactMessage;

const LOGGED_BODY_CHARS: usize = 500;

/// Downstream collaborator that delivers a validated message.
#[async_trait]
pub trait MailRelay: Send + Sync {
    async fn deliver(&self, message: &ContactMessage) -> RelayResult<()>;
}

/// HTTP relay speaking the JSON submit protocol.
#[derive(Clone)]
pub struct HttpMailRelay {
    client: reqwest::Client,
    endpoint: String,
    access_key: String,
    recipient: String,
    subject_prefix: String,
    timeout_duration: Duration,
}

impl HttpMailRelay {
    pub fn new(
        endpoint: impl Into<String>,
        access_key: impl Into<String>,
        recipient: impl Into<String>,
        subject_prefix: impl Into<String>,
        timeout_duration: Duration,
    ) -> RelayResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout_duration)
            .build()
            .map_err(|e| RelayError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            access_key: access_key.into(),
            recipient: recipient.into(),
            subject_prefix: subject_prefix.into(),
            timeout_duration,
        })
    }

    async fn submit(&self, payload: &RelayPayload) -> RelayResult<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RelayError::Timeout(self.timeout_duration.as_secs())
                } else {
                    RelayError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response
            .text()
            .await
            .map_err(|e| RelayError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(RelayError::Status {
                status: status.as_u16(),
                body: truncate_for_log(&body, LOGGED_BODY_CHARS),
            });
        }

        if !content_type.contains("application/json") {
            tracing::error!(
                content_type = %content_type,
                body = %truncate_for_log(&body, LOGGED_BODY_CHARS),
                "Relay returned non-JSON response"
            );
            return Err(RelayError::InvalidFormat { content_type });
        }

        let parsed: RelayResponse = serde_json::from_str(&body).map_err(|_| RelayError::InvalidFormat {
            content_type: content_type.clone(),
        })?;

        if parsed.success {
            Ok(())
        } else {
            Err(RelayError::Rejected(
                parsed
                    .message
                    .unwrap_or_else(|| "Failed to send email".to_string()),
            ))
        }
    }
}

#[async_trait]
impl MailRelay for HttpMailRelay {
    async fn deliver(&self, message: &ContactMessage) -> RelayResult<()> {
        let payload = RelayPayload::new(&self.access_key, &self.recipient, &self.subject_prefix, message);
        match timeout(self.timeout_duration, self.submit(&payload)).await {
            Ok(result) => result,
            Err(_) => Err(RelayError::Timeout(self.timeout_duration.as_secs())),
        }
    }
}

/// How accepted submissions leave the gateway.
#[derive(Clone)]
pub enum Delivery {
    /// No credential (or development): record the submission in the log.
    LogOnly,
    /// Forward to the relay.
    Relay(Arc<dyn MailRelay>),
}

impl Delivery {
    /// Pick the delivery mode for this deployment.
    pub fn from_config(config: &GatewayConfig) -> RelayResult<Self> {
        let relay = &config.relay;
        let dev_without_opt_in = config.security.environment == Environment::Development
            && !relay.enable_in_development;

        match relay.access_key.as_deref() {
            Some(key) if !dev_without_opt_in => {
                let client = HttpMailRelay::new(
                    relay.endpoint.clone(),
                    key,
                    relay.recipient.clone(),
                    relay.subject_prefix.clone(),
                    Duration::from_secs(config.timeouts.relay_secs),
                )?;
                Ok(Self::Relay(Arc::new(client)))
            }
            _ => Ok(Self::LogOnly),
        }
    }

    pub fn is_log_only(&self) -> bool {
        matches!(self, Self::LogOnly)
    }
}
