//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → client_ip.rs (derive the rate-limit bucket key)
//!     → rate_limit.rs (global policy; contact policy on submissions)
//!     → handler parses body
//!     → sanitize.rs (normalize untrusted strings)
//!     → threat.rs (signature scan over sanitized fields)
//! Outgoing response:
//!     → headers.rs (security + rate-limit headers)
//! ```
//!
//! # Design Decisions
//! - Defense in depth: sanitization is not trusted alone
//! - Fail closed: reject on any security check failure
//! - No trust in client input, client identity headers included

pub mod client_ip;
pub mod headers;
pub mod rate_limit;
pub mod sanitize;
pub mod threat;

pub use client_ip::{resolve_client_key, ClientKey};
pub use rate_limit::{RateLimitOutcome, RateLimitPolicy, RateLimiter};
pub use threat::{detect_threat, is_suspicious, ThreatKind};
