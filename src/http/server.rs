//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the contact endpoint
//! - Wire up middleware (request ID, tracing, timeout, security headers, rate limit)
//! - Bind server to listener and drain on shutdown
//!
//! # Layer Order (outermost first)
//! ```text
//! SetRequestId → Trace → PropagateRequestId → metrics → Timeout
//!     → security headers → global rate limit → body limit → handler
//! ```

use axum::{
    body::Body,
    http::Request,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{GatewayConfig, RateLimitConfig};
use crate::http::contact::{contact_preflight, method_not_allowed, submit_contact};
use crate::http::request::{MakeRequestUuidV4, X_REQUEST_ID};
use crate::http::response::GatewayError;
use crate::observability::metrics;
use crate::relay::{Delivery, RelayResult};
use crate::security::headers::{relay_origin, security_headers};
use crate::security::rate_limit::{rate_limit_middleware, RateLimitPolicy, RateLimiter};

pub const CONTACT_PATH: &str = "/api/contact";

/// One limiter per policy; they never share windows.
#[derive(Clone)]
pub struct Limiters {
    pub global: Arc<RateLimiter>,
    pub contact: Arc<RateLimiter>,
}

impl Limiters {
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self {
            global: Arc::new(RateLimiter::new(RateLimitPolicy::from_config("global", &config.global))),
            contact: Arc::new(RateLimiter::new(RateLimitPolicy::from_config("contact", &config.contact))),
        }
    }
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub contact_limiter: Arc<RateLimiter>,
    pub delivery: Delivery,
    pub max_body_size: usize,
}

/// HTTP server for the contact gateway.
pub struct GatewayServer {
    router: Router,
    config: GatewayConfig,
}

impl GatewayServer {
    /// Create a server whose delivery mode and limiters come from `config`.
    pub fn new(config: GatewayConfig) -> RelayResult<Self> {
        let delivery = Delivery::from_config(&config)?;
        let limiters = Limiters::from_config(&config.rate_limit);
        Ok(Self::with_components(config, limiters, delivery))
    }

    pub fn with_components(config: GatewayConfig, limiters: Limiters, delivery: Delivery) -> Self {
        let router = build_router(&config, &limiters, delivery);
        Self { router, config }
    }

    /// A clone of the fully layered router.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            environment = ?self.config.security.environment,
            "HTTP server starting"
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Draining in-flight requests");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(config: &GatewayConfig, limiters: &Limiters, delivery: Delivery) -> Router {
    let state = AppState {
        contact_limiter: limiters.contact.clone(),
        delivery,
        max_body_size: config.security.max_body_size,
    };

    let mut router = Router::new()
        .route(
            CONTACT_PATH,
            post(submit_contact)
                .options(contact_preflight)
                .fallback(method_not_allowed),
        )
        .fallback(not_found)
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
        .layer(middleware::from_fn_with_state(
            limiters.global.clone(),
            rate_limit_middleware,
        ));

    let origin = relay_origin(&config.relay.endpoint);
    for (name, value) in security_headers(&config.security, origin.as_deref()) {
        router = router.layer(SetResponseHeaderLayer::overriding(name, value));
    }

    router
        .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
        .layer(middleware::from_fn(track_requests))
        .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuidV4))
}

async fn not_found() -> Response {
    GatewayError::NotFound.into_response()
}

async fn track_requests(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let response = next.run(request).await;
    metrics::record_request(&method, response.status().as_u16(), start);
    response
}
