//! Downstream mail relay.
//!
//! # Data Flow
//! ```text
//! ContactMessage (validated, sanitized)
//!     → client.rs (Delivery: log-only or relay)
//!     → types.rs (RelayPayload JSON)
//!     → relay HTTP API
//!     → RelayResponse / RelayError
//! ```
//!
//! # Design Decisions
//! - Called only after rate limiting and validation have passed
//! - Every call has a deadline; timeouts are delivery failures
//! - Relay errors stay server-side

pub mod client;
pub mod types;

pub use client::{Delivery, HttpMailRelay, MailRelay};
pub use types::{RelayError, RelayPayload, RelayResponse, RelayResult};
