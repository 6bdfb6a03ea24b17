//! Shared utilities for integration testing.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{body::Body, http::Request, response::Response, Router};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tower::ServiceExt;

use contact_gateway::config::GatewayConfig;
use contact_gateway::http::{build_router, Limiters};
use contact_gateway::relay::{Delivery, MailRelay, RelayError, RelayResult};
use contact_gateway::security::rate_limit::{FixedSampler, ManualClock, RateLimitPolicy, RateLimiter};
use contact_gateway::validation::ContactMessage;

pub const START_MS: u64 = 1_700_000_000_000;

/// What the mock relay answers with.
#[derive(Debug, Clone)]
pub struct MockReply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
    pub delay: Duration,
}

impl MockReply {
    pub fn json(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn html(body: &str) -> Self {
        Self {
            status: 200,
            content_type: "text/html; charset=utf-8",
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// A running mock relay plus every JSON body it received.
pub struct MockRelayServer {
    pub addr: SocketAddr,
    pub received: Arc<Mutex<Vec<Value>>>,
}

impl MockRelayServer {
    pub fn endpoint(&self) -> String {
        format!("http://{}/submit", self.addr)
    }

    pub fn received(&self) -> Vec<Value> {
        self.received.lock().unwrap().clone()
    }
}

/// Start a programmable mock relay on an ephemeral port.
pub async fn start_mock_relay(reply: MockReply) -> MockRelayServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let reply = reply.clone();
            let sink = sink.clone();
            tokio::spawn(async move {
                handle_connection(socket, reply, sink).await;
            });
        }
    });

    MockRelayServer { addr, received }
}

async fn handle_connection(mut socket: TcpStream, reply: MockReply, sink: Arc<Mutex<Vec<Value>>>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }

    if let Ok(body) = serde_json::from_slice::<Value>(&buf[header_end..]) {
        sink.lock().unwrap().push(body);
    }

    tokio::time::sleep(reply.delay).await;

    let status_text = match reply.status {
        200 => "200 OK",
        400 => "400 Bad Request",
        429 => "429 Too Many Requests",
        500 => "500 Internal Server Error",
        502 => "502 Bad Gateway",
        503 => "503 Service Unavailable",
        _ => "200 OK",
    };
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_text,
        reply.content_type,
        reply.body.len(),
        reply.body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

/// In-process relay that records deliveries and can be told to fail.
#[derive(Default)]
pub struct RecordingRelay {
    pub delivered: Mutex<Vec<ContactMessage>>,
    pub fail: bool,
}

impl RecordingRelay {
    pub fn failing() -> Self {
        Self {
            delivered: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn count(&self) -> usize {
        self.delivered.lock().unwrap().len()
    }
}

#[async_trait]
impl MailRelay for RecordingRelay {
    async fn deliver(&self, message: &ContactMessage) -> RelayResult<()> {
        if self.fail {
            return Err(RelayError::Status {
                status: 500,
                body: "upstream down".into(),
            });
        }
        self.delivered.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// Router plus the handles a test needs to steer it.
pub struct TestGateway {
    pub router: Router,
    pub clock: Arc<ManualClock>,
    pub limiters: Limiters,
}

impl TestGateway {
    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }
}

/// Build the full layered router with a manual clock and no sweeps.
pub fn gateway(config: GatewayConfig, delivery: Delivery) -> TestGateway {
    let clock = Arc::new(ManualClock::new(START_MS));
    let limiter = |name: &'static str, policy: &contact_gateway::config::RateLimitPolicyConfig| {
        Arc::new(RateLimiter::with_sources(
            RateLimitPolicy::from_config(name, policy).with_sweep_probability(0.0),
            clock.clone(),
            Arc::new(FixedSampler(1.0)),
        ))
    };
    let limiters = Limiters {
        global: limiter("global", &config.rate_limit.global),
        contact: limiter("contact", &config.rate_limit.contact),
    };
    let router = build_router(&config, &limiters, delivery);
    TestGateway {
        router,
        clock,
        limiters,
    }
}

pub fn contact_request(ip: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/contact")
        .header("content-type", "application/json")
        .header("x-forwarded-for", ip)
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
