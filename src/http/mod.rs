//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID assigned, echoed on the response)
//!     → contact.rs (contact limiter, honeypot, validation, delivery)
//!     → response.rs (fixed status + JSON body per outcome)
//!     → Send to client
//! ```

pub mod contact;
pub mod request;
pub mod response;
pub mod server;

pub use request::{MakeRequestUuidV4, RequestIdExt, X_REQUEST_ID};
pub use response::GatewayError;
pub use server::{build_router, AppState, GatewayServer, Limiters};
