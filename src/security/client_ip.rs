//! Client identity resolution from proxy headers.

use axum::http::HeaderMap;
use std::fmt;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_REAL_IP: &str = "x-real-ip";
pub const CF_CONNECTING_IP: &str = "cf-connecting-ip";

/// Sentinel key for requests without any identifying header.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Opaque, best-effort requester identity used as a rate-limit bucket.
///
/// Not validated as an IP address and not trustworthy: any client can
/// forge these headers. It only groups requests coarsely.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientKey(String);

impl ClientKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn unknown() -> Self {
        Self(UNKNOWN_CLIENT.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN_CLIENT
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolve the client key.
///
/// Precedence: first hop of `X-Forwarded-For` > `X-Real-IP` >
/// `CF-Connecting-IP` > `"unknown"`.
pub fn resolve_client_key(headers: &HeaderMap) -> ClientKey {
    if let Some(forwarded) = header_str(headers, X_FORWARDED_FOR) {
        let first = forwarded.split(',').next().unwrap_or_default().trim();
        return ClientKey::new(first);
    }
    if let Some(real_ip) = header_str(headers, X_REAL_IP) {
        return ClientKey::new(real_ip);
    }
    if let Some(cf_ip) = header_str(headers, CF_CONNECTING_IP) {
        return ClientKey::new(cf_ip);
    }
    ClientKey::unknown()
}

// Empty or non-UTF-8 header values count as absent.
fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}
