//! Relay wire types and errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::validation::ContactMessage;

/// Request body for the relay's submit endpoint.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RelayPayload {
    pub access_key: String,
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    pub from_name: String,
    pub replyto: String,
    pub to: String,
}

impl RelayPayload {
    pub fn new(access_key: &str, recipient: &str, subject_prefix: &str, msg: &ContactMessage) -> Self {
        Self {
            access_key: access_key.to_string(),
            name: msg.name.clone(),
            email: msg.email.clone(),
            subject: format!("{subject_prefix}{}", msg.subject),
            message: msg.message.clone(),
            from_name: msg.name.clone(),
            replyto: msg.email.clone(),
            to: recipient.to_string(),
        }
    }
}

/// Relay response body.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RelayResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Errors that can occur while handing a message to the relay.
///
/// These are for server-side diagnostics only and are never shown to
/// the submitter.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Connection or protocol failure.
    #[error("relay transport error: {0}")]
    Transport(String),

    /// No response within the configured deadline.
    #[error("relay timeout after {0} seconds")]
    Timeout(u64),

    /// Non-2xx response.
    #[error("relay returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// 2xx response that was not JSON.
    #[error("relay returned non-JSON response ({content_type})")]
    InvalidFormat { content_type: String },

    /// JSON response with `success: false`.
    #[error("relay rejected message: {0}")]
    Rejected(String),
}

impl RelayError {
    /// Stable label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Timeout(_) => "timeout",
            Self::Status { .. } => "status",
            Self::InvalidFormat { .. } => "invalid_format",
            Self::Rejected(_) => "rejected",
        }
    }
}

/// Result type for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;

/// Keep at most `max` chars of a relay body for logging.
pub fn truncate_for_log(body: &str, max: usize) -> String {
    body.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_mirrors_sender() {
        let msg = ContactMessage {
            name: "Bob".into(),
            email: "bob@example.com".into(),
            subject: "Hello".into(),
            message: "Hello there, friend".into(),
        };
        let payload = RelayPayload::new("key", "team@example.com", "Contact Form: ", &msg);
        assert_eq!(payload.subject, "Contact Form: Hello");
        assert_eq!(payload.from_name, "Bob");
        assert_eq!(payload.replyto, "bob@example.com");
        assert_eq!(payload.to, "team@example.com");

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["access_key"], "key");
    }

    #[test]
    fn test_response_defaults() {
        let r: RelayResponse = serde_json::from_str("{}").unwrap();
        assert!(!r.success);
        assert!(r.message.is_none());
    }
}
