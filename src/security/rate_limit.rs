//! Fixed-window rate limiting held entirely in process memory.
//!
//! Each policy owns its own [`RateLimiter`]; windows from different
//! policies never interact. A window is opened lazily on the first request
//! from a key, counts every request (denied ones included), and is replaced
//! once `now > reset_at`.
//!
//! This is a fixed-window counter, not a sliding log: a burst straddling a
//! window boundary can see up to `2 × max_requests` requests accepted in a
//! short span. That approximation buys O(1) memory per key and O(1) checks.
//!
//! Expired windows are removed by an opportunistic sweep triggered with a
//! fixed probability per request, so memory is bounded statistically. An
//! optional hard cap evicts the least-recently-seen key when exceeded; the
//! recency order lives in an [`LruCache`] so eviction is O(1).

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use lru::LruCache;
use rand::Rng;

use crate::config::RateLimitPolicyConfig;
use crate::http::response::{describe_window, GatewayError};
use crate::observability::metrics;
use crate::security::client_ip::resolve_client_key;
use crate::security::headers::{apply_rate_limit_headers, X_RATELIMIT_LIMIT};
use crate::security::sanitize::sanitize_input;

/// Source of wall-clock time in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// The real clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ms),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Source of uniform samples in `[0, 1)` used to decide when to sweep.
pub trait SweepSampler: Send + Sync {
    fn sample(&self) -> f64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRngSampler;

impl SweepSampler for ThreadRngSampler {
    fn sample(&self) -> f64 {
        rand::thread_rng().gen::<f64>()
    }
}

/// Always returns the same sample.
#[derive(Debug, Clone, Copy)]
pub struct FixedSampler(pub f64);

impl SweepSampler for FixedSampler {
    fn sample(&self) -> f64 {
        self.0
    }
}

/// Immutable policy parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitPolicy {
    pub name: &'static str,
    pub window: Duration,
    pub max_requests: u64,
    pub sweep_probability: f64,
    pub max_entries: Option<usize>,
}

impl RateLimitPolicy {
    pub fn new(name: &'static str, window: Duration, max_requests: u64) -> Self {
        Self {
            name,
            window,
            max_requests,
            sweep_probability: 0.0,
            max_entries: None,
        }
    }

    pub fn from_config(name: &'static str, config: &RateLimitPolicyConfig) -> Self {
        Self {
            name,
            window: config.window(),
            max_requests: config.max_requests,
            sweep_probability: config.sweep_probability,
            max_entries: config.max_entries,
        }
    }

    pub fn with_sweep_probability(mut self, probability: f64) -> Self {
        self.sweep_probability = probability;
        self
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries);
        self
    }

    fn window_ms(&self) -> u64 {
        self.window.as_millis() as u64
    }
}

/// Counter state for one key under one policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateWindow {
    pub count: u64,
    pub reset_at_ms: u64,
}

impl RateWindow {
    fn open(now_ms: u64, window_ms: u64) -> Self {
        Self {
            count: 0,
            reset_at_ms: now_ms + window_ms,
        }
    }

    fn is_expired(&self, now_ms: u64) -> bool {
        now_ms > self.reset_at_ms
    }
}

/// Result of a single check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitOutcome {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    pub reset_at_ms: u64,
    /// Present only when denied.
    pub retry_after_secs: Option<u64>,
}

/// Per-policy fixed-window limiter.
pub struct RateLimiter {
    policy: RateLimitPolicy,
    windows: DashMap<String, RateWindow>,
    /// Key recency, present only when the policy sets `max_entries`.
    recency: Option<Mutex<LruCache<String, ()>>>,
    clock: Arc<dyn Clock>,
    sampler: Arc<dyn SweepSampler>,
}

impl RateLimiter {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self::with_sources(policy, Arc::new(SystemClock), Arc::new(ThreadRngSampler))
    }

    pub fn with_sources(
        policy: RateLimitPolicy,
        clock: Arc<dyn Clock>,
        sampler: Arc<dyn SweepSampler>,
    ) -> Self {
        let recency = policy
            .max_entries
            .map(|cap| Mutex::new(LruCache::new(NonZeroUsize::new(cap).unwrap_or(NonZeroUsize::MIN))));
        Self {
            policy,
            windows: DashMap::new(),
            recency,
            clock,
            sampler,
        }
    }

    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    /// Count this request against `key` and decide whether it may proceed.
    ///
    /// The read-modify-write happens under the map shard lock for `key`, so
    /// concurrent checks on the same key never undercount. Denied requests
    /// are still counted.
    pub fn check(&self, key: &str) -> RateLimitOutcome {
        let now = self.clock.now_ms();
        let window_ms = self.policy.window_ms();

        // Held across the update so the map and the recency order agree.
        let recency_guard = self.recency.as_ref().map(|recency| {
            let mut order = recency.lock().unwrap_or_else(PoisonError::into_inner);
            self.touch(&mut order, key);
            order
        });

        let mut entry = self
            .windows
            .entry(key.to_string())
            .or_insert_with(|| RateWindow::open(now, window_ms));
        if entry.is_expired(now) {
            *entry = RateWindow::open(now, window_ms);
        }
        entry.count += 1;

        let window = *entry;
        drop(entry);
        drop(recency_guard);

        let limit = self.policy.max_requests;
        let allowed = window.count <= limit;
        let retry_after_secs = (!allowed).then(|| {
            let remaining_ms = window.reset_at_ms.saturating_sub(now);
            remaining_ms.div_ceil(1000)
        });

        RateLimitOutcome {
            allowed,
            limit,
            remaining: limit.saturating_sub(window.count),
            reset_at_ms: window.reset_at_ms,
            retry_after_secs,
        }
    }

    /// Sweep expired windows with the configured probability.
    ///
    /// Returns the number of windows removed (0 when the sweep was skipped).
    pub fn maybe_sweep(&self) -> usize {
        if self.policy.sweep_probability > 0.0
            && self.sampler.sample() < self.policy.sweep_probability
        {
            self.sweep()
        } else {
            0
        }
    }

    /// Remove every window whose reset time has passed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now_ms();
        let mut expired = Vec::new();
        self.windows.retain(|key, w| {
            let live = !w.is_expired(now);
            if !live {
                expired.push(key.clone());
            }
            live
        });
        let removed = expired.len();

        if let Some(recency) = &self.recency {
            let mut order = recency.lock().unwrap_or_else(PoisonError::into_inner);
            for key in &expired {
                order.pop(key);
            }
        }
        metrics::record_rate_windows(self.policy.name, self.windows.len());
        if removed > 0 {
            tracing::debug!(policy = self.policy.name, removed, "Swept expired rate windows");
        }
        removed
    }

    /// Current window for `key`, if any.
    pub fn window(&self, key: &str) -> Option<RateWindow> {
        self.windows.get(key).map(|w| *w)
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Mark `key` most recent; a new key at capacity pushes out the oldest.
    fn touch(&self, order: &mut LruCache<String, ()>, key: &str) {
        if order.get(key).is_some() {
            return;
        }
        if let Some((evicted, ())) = order.push(key.to_string(), ()) {
            self.windows.remove(&evicted);
            tracing::debug!(policy = self.policy.name, "Evicted least-recently-seen rate window");
        }
    }
}

/// Build a composite limiter key from a client address and a resource name.
pub fn rate_limit_key(ip: &str, resource: Option<&str>) -> String {
    let ip = sanitize_input(ip, 45);
    let resource = resource.map(|r| sanitize_input(r, 100)).unwrap_or_default();
    format!("{ip}:{resource}")
}

/// Global limiter applied to every route before any other processing.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let key = resolve_client_key(request.headers());
    let outcome = limiter.check(key.as_str());
    limiter.maybe_sweep();

    if !outcome.allowed {
        tracing::warn!(client = %key, policy = limiter.policy().name, "Rate limit exceeded");
        metrics::record_rate_limited(limiter.policy().name);
        return GatewayError::RateLimited {
            outcome,
            scope: RateLimitScope::Global,
        }
        .with_window(&describe_window(limiter.policy().window.as_secs()))
        .into_response();
    }

    let mut response = next.run(request).await;
    // A narrower policy that already denied keeps its own accounting.
    if !response.headers().contains_key(X_RATELIMIT_LIMIT) {
        apply_rate_limit_headers(response.headers_mut(), &outcome);
    }
    response
}

/// Which policy produced a denial; selects the caller-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitScope {
    Global,
    Contact,
}

#[cfg(test)]
mod tests {
    use super::*;

    const START: u64 = 1_700_000_000_000;

    fn limiter(max: u64, window_secs: u64) -> (RateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(START));
        let policy = RateLimitPolicy::new("test", Duration::from_secs(window_secs), max);
        let limiter = RateLimiter::with_sources(policy, clock.clone(), Arc::new(FixedSampler(0.5)));
        (limiter, clock)
    }

    #[test]
    fn test_denies_after_max_and_keeps_counting() {
        let (limiter, _clock) = limiter(3, 60);
        for i in 1..=3 {
            let outcome = limiter.check("1.2.3.4");
            assert!(outcome.allowed);
            assert_eq!(outcome.remaining, 3 - i);
            assert!(outcome.retry_after_secs.is_none());
        }

        let denied = limiter.check("1.2.3.4");
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
        assert_eq!(denied.retry_after_secs, Some(60));
        assert_eq!(limiter.window("1.2.3.4").unwrap().count, 4);

        limiter.check("1.2.3.4");
        assert_eq!(limiter.window("1.2.3.4").unwrap().count, 5);
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let (limiter, clock) = limiter(1, 60);
        limiter.check("k");
        clock.advance(Duration::from_millis(59_001));
        let denied = limiter.check("k");
        assert_eq!(denied.retry_after_secs, Some(1));
    }

    #[test]
    fn test_window_resets_after_expiry() {
        let (limiter, clock) = limiter(2, 60);
        limiter.check("k");
        limiter.check("k");
        assert!(!limiter.check("k").allowed);

        // Still inside the window at exactly reset_at.
        clock.advance(Duration::from_secs(60));
        assert!(!limiter.check("k").allowed);

        clock.advance(Duration::from_millis(1));
        let outcome = limiter.check("k");
        assert!(outcome.allowed);
        let window = limiter.window("k").unwrap();
        assert_eq!(window.count, 1);
        assert_eq!(window.reset_at_ms, START + 60_001 + 60_000);
        assert_eq!(outcome.reset_at_ms, window.reset_at_ms);
    }

    #[test]
    fn test_keys_are_independent() {
        let (limiter, _clock) = limiter(1, 60);
        assert!(limiter.check("a").allowed);
        assert!(!limiter.check("a").allowed);
        assert!(limiter.check("b").allowed);
    }

    #[test]
    fn test_policies_do_not_share_state() {
        let clock = Arc::new(ManualClock::new(START));
        let sampler = Arc::new(FixedSampler(0.99));
        let global = RateLimiter::with_sources(
            RateLimitPolicy::new("global", Duration::from_secs(3600), 100),
            clock.clone(),
            sampler.clone(),
        );
        let contact = RateLimiter::with_sources(
            RateLimitPolicy::new("contact", Duration::from_secs(3600), 1),
            clock,
            sampler,
        );

        assert!(contact.check("k").allowed);
        assert!(!contact.check("k").allowed);
        assert!(global.check("k").allowed);
        assert_eq!(global.window("k").unwrap().count, 1);
    }

    #[test]
    fn test_boundary_burst_is_fixed_window() {
        let (limiter, clock) = limiter(2, 10);
        clock.advance(Duration::from_millis(9_999));
        // Two at the tail of one window, two more right after it resets.
        assert!(limiter.check("k").allowed);
        assert!(limiter.check("k").allowed);
        clock.advance(Duration::from_millis(10_001));
        assert!(limiter.check("k").allowed);
        assert!(limiter.check("k").allowed);
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let (limiter, clock) = limiter(5, 10);
        limiter.check("old");
        clock.advance(Duration::from_secs(5));
        limiter.check("new");
        clock.advance(Duration::from_millis(5_001));

        assert_eq!(limiter.sweep(), 1);
        assert!(limiter.window("old").is_none());
        assert!(limiter.window("new").is_some());
    }

    #[test]
    fn test_maybe_sweep_respects_sampler() {
        let clock = Arc::new(ManualClock::new(START));
        let policy = RateLimitPolicy::new("p", Duration::from_secs(1), 5).with_sweep_probability(0.1);

        let skip = RateLimiter::with_sources(policy.clone(), clock.clone(), Arc::new(FixedSampler(0.1)));
        let hit = RateLimiter::with_sources(policy, clock.clone(), Arc::new(FixedSampler(0.05)));
        skip.check("k");
        hit.check("k");
        clock.advance(Duration::from_secs(2));

        assert_eq!(skip.maybe_sweep(), 0);
        assert_eq!(skip.len(), 1);
        assert_eq!(hit.maybe_sweep(), 1);
        assert!(hit.is_empty());
    }

    #[test]
    fn test_hard_cap_evicts_least_recent() {
        let clock = Arc::new(ManualClock::new(START));
        let policy = RateLimitPolicy::new("p", Duration::from_secs(60), 5).with_max_entries(2);
        let limiter = RateLimiter::with_sources(policy, clock.clone(), Arc::new(FixedSampler(1.0)));

        limiter.check("a");
        clock.advance(Duration::from_millis(10));
        limiter.check("b");
        clock.advance(Duration::from_millis(10));
        limiter.check("a");
        clock.advance(Duration::from_millis(10));
        limiter.check("c");

        assert_eq!(limiter.len(), 2);
        assert!(limiter.window("b").is_none());
        assert_eq!(limiter.window("a").unwrap().count, 2);
    }

    #[test]
    fn test_hard_cap_follows_access_order_without_clock_ticks() {
        let clock = Arc::new(ManualClock::new(START));
        let policy = RateLimitPolicy::new("p", Duration::from_secs(60), 5).with_max_entries(3);
        let limiter = RateLimiter::with_sources(policy, clock, Arc::new(FixedSampler(1.0)));

        for key in ["a", "b", "c", "a", "d", "e"] {
            limiter.check(key);
        }

        assert_eq!(limiter.len(), 3);
        assert!(limiter.window("b").is_none());
        assert!(limiter.window("c").is_none());
        for key in ["a", "d", "e"] {
            assert!(limiter.window(key).is_some(), "{key}");
        }
    }

    #[test]
    fn test_checks_at_capacity_stay_cheap() {
        const CAP: usize = 20_000;
        let clock = Arc::new(ManualClock::new(START));
        let policy = RateLimitPolicy::new("p", Duration::from_secs(60), 5).with_max_entries(CAP);
        let limiter = RateLimiter::with_sources(policy, clock, Arc::new(FixedSampler(1.0)));

        for i in 0..CAP {
            limiter.check(&format!("10.0.{}.{}", i / 256, i % 256));
        }
        let started = std::time::Instant::now();
        for i in 0..CAP {
            limiter.check(&format!("rotated-{i}"));
        }
        let elapsed = started.elapsed();

        assert_eq!(limiter.len(), CAP);
        // A full scan per new key takes tens of seconds here.
        assert!(elapsed < Duration::from_secs(3), "{elapsed:?}");
    }

    #[test]
    fn test_concurrent_checks_never_exceed_limit() {
        let clock = Arc::new(ManualClock::new(START));
        let policy = RateLimitPolicy::new("p", Duration::from_secs(60), 50);
        let limiter = Arc::new(RateLimiter::with_sources(policy, clock, Arc::new(FixedSampler(1.0))));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || (0..25).filter(|_| limiter.check("shared").allowed).count())
            })
            .collect();
        let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        assert_eq!(allowed, 50);
        assert_eq!(limiter.window("shared").unwrap().count, 200);
    }

    #[test]
    fn test_last_slot_race_admits_one() {
        let clock = Arc::new(ManualClock::new(START));
        let policy = RateLimitPolicy::new("p", Duration::from_secs(60), 3);
        let limiter = Arc::new(RateLimiter::with_sources(policy, clock, Arc::new(FixedSampler(1.0))));
        limiter.check("k");
        limiter.check("k");

        let barrier = Arc::new(std::sync::Barrier::new(2));
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let limiter = limiter.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    limiter.check("k").allowed
                })
            })
            .collect();
        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|allowed| *allowed)
            .count();
        assert_eq!(admitted, 1);
    }

    #[test]
    fn test_rate_limit_key() {
        assert_eq!(rate_limit_key(" 10.0.0.1\n", Some("contact")), "10.0.0.1:contact");
        assert_eq!(rate_limit_key("10.0.0.1", None), "10.0.0.1:");
        assert_eq!(rate_limit_key(&"9".repeat(60), None).len(), 46);
    }
}
