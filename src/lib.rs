//! Contact gateway library.
//!
//! Client identity, fixed-window rate limiting, input sanitization,
//! threat signatures, validation schemas, and the contact endpoint that
//! ties them together in front of a mail relay.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod relay;
pub mod security;
pub mod validation;

pub use config::schema::GatewayConfig;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
