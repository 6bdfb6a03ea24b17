//! Message-submission endpoint.
//!
//! # Request Path
//! ```text
//! (global rate limit already passed)
//!     → contact rate limit (before the body is read)
//!     → read + parse JSON body
//!     → honeypot check (silent success)
//!     → validate_contact (first failure wins)
//!     → Delivery (log-only or relay)
//! ```

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::Value;

use crate::http::request::RequestIdExt;
use crate::http::response::{success, GatewayError};
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::relay::Delivery;
use crate::security::client_ip::resolve_client_key;
use crate::security::rate_limit::RateLimitScope;
use crate::validation::contact::{honeypot_triggered, validate_contact, ContactRejection, ContactSubmission};

pub const SENT_MESSAGE: &str = "Message sent successfully";

/// `POST /api/contact`
pub async fn submit_contact(State(state): State<AppState>, request: Request<Body>) -> Response {
    match handle_submission(&state, request).await {
        Ok(response) => response,
        Err(error) => error.into_response(),
    }
}

async fn handle_submission(state: &AppState, request: Request<Body>) -> Result<Response, GatewayError> {
    let request_id = request.request_id().to_string();
    let client = resolve_client_key(request.headers());

    let outcome = state.contact_limiter.check(client.as_str());
    state.contact_limiter.maybe_sweep();
    if !outcome.allowed {
        tracing::warn!(
            request_id = %request_id,
            client = %client,
            policy = state.contact_limiter.policy().name,
            "Rate limit exceeded"
        );
        metrics::record_rate_limited(state.contact_limiter.policy().name);
        return Err(GatewayError::RateLimited {
            outcome,
            scope: RateLimitScope::Contact,
        });
    }

    let bytes = axum::body::to_bytes(request.into_body(), state.max_body_size)
        .await
        .map_err(|e| {
            tracing::warn!(request_id = %request_id, error = %e, "Failed to read request body");
            GatewayError::Internal
        })?;
    let body: Value = serde_json::from_slice(&bytes).map_err(|e| {
        tracing::warn!(request_id = %request_id, error = %e, "Malformed JSON body");
        GatewayError::Internal
    })?;

    if honeypot_triggered(&body) {
        tracing::info!(request_id = %request_id, client = %client, "Honeypot field populated, dropping submission");
        metrics::record_honeypot_hit();
        return Ok(success(SENT_MESSAGE));
    }

    let message = validate_contact(&ContactSubmission::from_json(&body)).map_err(|rejection| {
        metrics::record_validation_failure(rejection.reason());
        match rejection {
            ContactRejection::Threat { field, kind } => {
                tracing::warn!(
                    request_id = %request_id,
                    client = %client,
                    field,
                    kind = %kind,
                    "Threat signature matched"
                );
                metrics::record_threat(kind.as_str());
                GatewayError::ThreatDetected(rejection.message())
            }
            _ => {
                tracing::debug!(request_id = %request_id, reason = rejection.reason(), "Submission rejected");
                GatewayError::ValidationFailed(rejection.message())
            }
        }
    })?;

    match &state.delivery {
        Delivery::LogOnly => {
            tracing::info!(
                request_id = %request_id,
                name = %message.name,
                email = %message.email,
                subject = %message.subject,
                message_len = message.message.chars().count(),
                "Contact submission received (log-only delivery)"
            );
            metrics::record_delivery("logged");
            Ok(success(SENT_MESSAGE))
        }
        Delivery::Relay(relay) => match relay.deliver(&message).await {
            Ok(()) => {
                tracing::info!(request_id = %request_id, "Contact submission delivered");
                metrics::record_delivery("delivered");
                Ok(success(SENT_MESSAGE))
            }
            Err(e) => {
                tracing::error!(request_id = %request_id, kind = e.kind(), error = %e, "Relay delivery failed");
                metrics::record_delivery("failed");
                Err(GatewayError::DeliveryFailed)
            }
        },
    }
}

/// `OPTIONS /api/contact`
pub async fn contact_preflight() -> Response {
    let mut response = StatusCode::NO_CONTENT.into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    response
}

/// Any other method on `/api/contact`.
pub async fn method_not_allowed() -> Response {
    GatewayError::MethodNotAllowed.into_response()
}
