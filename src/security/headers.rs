//! Security and rate-limit response headers.
//!
//! # Responsibilities
//! - Build the fixed security header set attached to every response
//! - Write rate-limit accounting headers (`X-RateLimit-*`, `Retry-After`)
//!
//! # Design Decisions
//! - The CSP `connect-src` admits the mail relay origin only
//! - HSTS is emitted only for production deployments

use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::config::SecurityConfig;
use crate::security::rate_limit::RateLimitOutcome;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

const PERMISSIONS_POLICY: &str = "camera=(), microphone=(), geolocation=(), payment=(), usb=(), \
     magnetometer=(), gyroscope=(), accelerometer=()";

const HSTS: &str = "max-age=31536000; includeSubDomains; preload";

/// Content-Security-Policy value, optionally admitting one extra origin for fetches.
pub fn content_security_policy(connect_origin: Option<&str>) -> String {
    let connect_src = match connect_origin {
        Some(origin) => format!("connect-src 'self' {origin}"),
        None => "connect-src 'self'".to_string(),
    };
    [
        "default-src 'self'",
        "script-src 'self'",
        "style-src 'self' 'unsafe-inline'",
        "img-src 'self' data: blob:",
        "font-src 'self' data:",
        "media-src 'self' blob:",
        connect_src.as_str(),
        "frame-src 'none'",
        "frame-ancestors 'none'",
        "base-uri 'self'",
        "form-action 'self'",
        "object-src 'none'",
        "upgrade-insecure-requests",
    ]
    .join("; ")
}

/// Origin (`scheme://host[:port]`) of the relay endpoint, if it parses.
pub fn relay_origin(endpoint: &str) -> Option<String> {
    url::Url::parse(endpoint)
        .ok()
        .map(|u| u.origin().ascii_serialization())
        .filter(|o| o != "null")
}

/// The full security header set for this deployment.
pub fn security_headers(
    config: &SecurityConfig,
    connect_origin: Option<&str>,
) -> Vec<(HeaderName, HeaderValue)> {
    if !config.enable_headers {
        return Vec::new();
    }

    let mut headers = Vec::with_capacity(7);
    match HeaderValue::from_str(&content_security_policy(connect_origin)) {
        Ok(csp) => headers.push((axum::http::header::CONTENT_SECURITY_POLICY, csp)),
        Err(e) => tracing::error!(error = %e, "Invalid Content-Security-Policy value"),
    }
    headers.extend([
        (axum::http::header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY")),
        (
            axum::http::header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ),
        (
            axum::http::header::X_XSS_PROTECTION,
            HeaderValue::from_static("1; mode=block"),
        ),
        (
            axum::http::header::REFERRER_POLICY,
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ),
        (
            HeaderName::from_static("permissions-policy"),
            HeaderValue::from_static(PERMISSIONS_POLICY),
        ),
    ]);
    if config.send_hsts() {
        headers.push((
            axum::http::header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static(HSTS),
        ));
    }
    headers
}

/// Write `X-RateLimit-*` headers, plus `Retry-After` for denials.
pub fn apply_rate_limit_headers(headers: &mut HeaderMap, outcome: &RateLimitOutcome) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(outcome.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(outcome.remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(outcome.reset_at_ms));
    if let Some(retry_after) = outcome.retry_after_secs {
        headers.insert(axum::http::header::RETRY_AFTER, HeaderValue::from(retry_after));
    }
}
