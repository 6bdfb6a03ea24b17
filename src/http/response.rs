//! Caller-facing outcomes and their HTTP representation.
//!
//! # Design Decisions
//! - Every failure maps to a fixed status and a fixed message
//! - Threat hits look exactly like validation failures to the caller
//! - Relay and internal errors surface only as a generic 500

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::security::headers::apply_rate_limit_headers;
use crate::security::rate_limit::{RateLimitOutcome, RateLimitScope};

pub const DELIVERY_FAILED_MESSAGE: &str = "Failed to send message. Please try again later.";
pub const METHOD_NOT_ALLOWED_MESSAGE: &str = "Method not allowed. Use POST to submit contact form.";

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<String>,
}

impl ErrorBody {
    fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: None,
            limit: None,
            window: None,
        }
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct SuccessBody {
    pub success: bool,
    pub message: String,
}

/// 200 `{ success: true, message }`.
pub fn success(message: impl Into<String>) -> Response {
    (
        StatusCode::OK,
        Json(SuccessBody {
            success: true,
            message: message.into(),
        }),
    )
        .into_response()
}

/// Failures returned across the gateway boundary.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("rate limit exceeded")]
    RateLimited {
        outcome: RateLimitOutcome,
        scope: RateLimitScope,
    },

    /// Caller input rejected; the message is one of a fixed set.
    #[error("validation failed: {0}")]
    ValidationFailed(&'static str),

    /// Same response as `ValidationFailed`; kept distinct for logging.
    #[error("threat detected")]
    ThreatDetected(&'static str),

    #[error("delivery failed")]
    DeliveryFailed,

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("not found")]
    NotFound,

    #[error("internal error")]
    Internal,
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::ValidationFailed(_) | Self::ThreatDetected(_) => StatusCode::BAD_REQUEST,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::DeliveryFailed | Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> ErrorBody {
        match self {
            Self::RateLimited { outcome, scope } => {
                let minutes = outcome.retry_after_secs.unwrap_or(0).div_ceil(60);
                match scope {
                    RateLimitScope::Global => ErrorBody {
                        error: "Rate limit exceeded".into(),
                        message: Some(format!(
                            "Too many requests. Please try again in {minutes} minutes."
                        )),
                        limit: Some(outcome.limit),
                        window: None,
                    },
                    RateLimitScope::Contact => ErrorBody {
                        error: "Rate limit exceeded".into(),
                        message: Some(format!(
                            "Too many contact form submissions. Please try again in {minutes} minutes."
                        )),
                        limit: None,
                        window: None,
                    },
                }
            }
            Self::ValidationFailed(message) | Self::ThreatDetected(message) => ErrorBody::new(*message),
            Self::MethodNotAllowed => ErrorBody::new(METHOD_NOT_ALLOWED_MESSAGE),
            Self::NotFound => ErrorBody::new("Not found"),
            Self::DeliveryFailed | Self::Internal => ErrorBody::new(DELIVERY_FAILED_MESSAGE),
        }
    }

    /// Attach a human-readable window length to global rate-limit bodies.
    pub fn with_window(self, window: &str) -> WindowedError {
        WindowedError {
            error: self,
            window: window.to_string(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        render(self, None)
    }
}

/// A [`GatewayError`] whose body also names the rate-limit window.
#[derive(Debug)]
pub struct WindowedError {
    error: GatewayError,
    window: String,
}

impl IntoResponse for WindowedError {
    fn into_response(self) -> Response {
        render(self.error, Some(self.window))
    }
}

fn render(error: GatewayError, window: Option<String>) -> Response {
    let mut body = error.body();
    if matches!(
        error,
        GatewayError::RateLimited {
            scope: RateLimitScope::Global,
            ..
        }
    ) {
        body.window = window;
    }

    let mut response = (error.status(), Json(body)).into_response();
    if let GatewayError::RateLimited { outcome, .. } = &error {
        apply_rate_limit_headers(response.headers_mut(), outcome);
    }
    response
}

/// Describe a window length the way people read it ("1 hour", "15 minutes").
pub fn describe_window(secs: u64) -> String {
    let (value, unit) = if secs % 3600 == 0 {
        (secs / 3600, "hour")
    } else if secs % 60 == 0 {
        (secs / 60, "minute")
    } else {
        (secs, "second")
    };
    if value == 1 {
        format!("1 {unit}")
    } else {
        format!("{value} {unit}s")
    }
}
