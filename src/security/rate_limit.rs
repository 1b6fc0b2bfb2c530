//! Per-client token bucket rate limiting.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::RateLimitConfig;
use crate::error::GuardError;
use crate::observability::metrics;
use crate::security::client_ip::client_ip;

/// A simple token bucket rate limiter.
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_update: now,
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();

        // Refill tokens
        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Buckets keyed by client address, created on first sight.
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, TokenBucket>>,
    rate: f64,
    burst: f64,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("rate", &self.rate)
            .field("burst", &self.burst)
            .field("buckets", &self.bucket_count())
            .finish()
    }
}

impl RateLimiter {
    /// `rate` tokens per second, at most `burst` banked.
    pub fn new(rate: f64, burst: u32) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            rate,
            burst: burst as f64,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.requests_per_second, config.burst_size)
    }

    pub fn allow(&self, key: &str) -> bool {
        self.allow_at(key, Instant::now())
    }

    pub fn allow_at(&self, key: &str, now: Instant) -> bool {
        let mut buckets = self.buckets.lock().expect("rate limiter mutex poisoned");
        let before = buckets.len();
        let allowed = buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(self.burst, now))
            .try_acquire(self.burst, self.rate, now);
        let after = buckets.len();
        drop(buckets);

        // The gauge moves up here and down in the sweep.
        if after != before {
            metrics::record_bucket_count(after);
        }
        allowed
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.lock().expect("rate limiter mutex poisoned").len()
    }

    /// Drop buckets untouched for longer than `max_idle`. Returns how many.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        self.evict_idle_at(max_idle, Instant::now())
    }

    pub fn evict_idle_at(&self, max_idle: Duration, now: Instant) -> usize {
        let mut buckets = self.buckets.lock().expect("rate limiter mutex poisoned");
        let before = buckets.len();
        buckets.retain(|_, b| now.saturating_duration_since(b.last_update) <= max_idle);
        let remaining = buckets.len();
        drop(buckets);

        metrics::record_bucket_count(remaining);
        before - remaining
    }

    /// Periodically evict idle buckets until `shutdown` fires.
    pub fn spawn_sweeper(
        self: Arc<Self>,
        interval: Duration,
        max_idle: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let evicted = self.evict_idle(max_idle);
                        if evicted > 0 {
                            tracing::debug!(evicted, "Evicted idle rate limit buckets");
                        }
                    }
                    _ = shutdown.recv() => break,
                }
            }
            tracing::debug!("Rate limit sweeper stopped");
        })
    }
}

/// Middleware: 429 once a client's bucket is empty.
pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let key = client_ip(&request);
    if limiter.allow(&key) {
        next.run(request).await
    } else {
        tracing::warn!(client = %key, path = %request.uri().path(), "Rate limit exceeded");
        GuardError::RateLimited.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_then_deny() {
        let limiter = RateLimiter::new(10.0, 5);
        let t0 = Instant::now();
        for _ in 0..5 {
            assert!(limiter.allow_at("1.1.1.1", t0));
        }
        assert!(!limiter.allow_at("1.1.1.1", t0));
    }

    #[test]
    fn test_refill_after_one_interval() {
        let limiter = RateLimiter::new(10.0, 2);
        let t0 = Instant::now();
        assert!(limiter.allow_at("k", t0));
        assert!(limiter.allow_at("k", t0));
        assert!(!limiter.allow_at("k", t0));

        let t1 = t0 + Duration::from_millis(100);
        assert!(limiter.allow_at("k", t1));
        assert!(!limiter.allow_at("k", t1));
    }

    #[test]
    fn test_refill_is_capped_at_burst() {
        let limiter = RateLimiter::new(100.0, 3);
        let t0 = Instant::now();
        assert!(limiter.allow_at("k", t0));

        let later = t0 + Duration::from_secs(60);
        for _ in 0..3 {
            assert!(limiter.allow_at("k", later));
        }
        assert!(!limiter.allow_at("k", later));
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = RateLimiter::new(1.0, 1);
        let t0 = Instant::now();
        assert!(limiter.allow_at("a", t0));
        assert!(!limiter.allow_at("a", t0));
        assert!(limiter.allow_at("b", t0));
        assert_eq!(limiter.bucket_count(), 2);
    }

    #[test]
    fn test_evict_idle() {
        let limiter = RateLimiter::new(1.0, 1);
        let t0 = Instant::now();
        limiter.allow_at("old", t0);
        limiter.allow_at("fresh", t0 + Duration::from_secs(50));

        let evicted = limiter.evict_idle_at(Duration::from_secs(30), t0 + Duration::from_secs(60));
        assert_eq!(evicted, 1);
        assert_eq!(limiter.bucket_count(), 1);
    }

    mod gauge {
        use std::sync::atomic::{AtomicU64, Ordering};

        use ::metrics::{
            Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit,
        };

        use super::*;

        /// Captures `guard_rate_limit_buckets`; everything else is dropped.
        #[derive(Default)]
        pub struct BucketGauge(pub Arc<AtomicU64>);

        impl BucketGauge {
            pub fn value(&self) -> f64 {
                f64::from_bits(self.0.load(Ordering::SeqCst))
            }
        }

        impl Recorder for BucketGauge {
            fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
            fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
            fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

            fn register_counter(&self, _: &Key, _: &Metadata<'_>) -> Counter {
                Counter::noop()
            }

            fn register_gauge(&self, key: &Key, _: &Metadata<'_>) -> Gauge {
                if key.name() == "guard_rate_limit_buckets" {
                    Gauge::from_arc(self.0.clone())
                } else {
                    Gauge::noop()
                }
            }

            fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
                Histogram::noop()
            }
        }
    }

    #[test]
    fn test_bucket_gauge_tracks_inserts_and_evictions() {
        let recorder = gauge::BucketGauge::default();
        let limiter = RateLimiter::new(1.0, 1);
        let t0 = Instant::now();

        ::metrics::with_local_recorder(&recorder, || {
            limiter.allow_at("a", t0);
            limiter.allow_at("b", t0);
        });
        assert_eq!(recorder.value(), 2.0);

        ::metrics::with_local_recorder(&recorder, || {
            limiter.allow_at("c", t0 + Duration::from_secs(60));
        });
        assert_eq!(recorder.value(), 3.0);

        ::metrics::with_local_recorder(&recorder, || {
            limiter.evict_idle_at(Duration::from_secs(30), t0 + Duration::from_secs(60));
        });
        assert_eq!(recorder.value(), 1.0);
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_shutdown() {
        let limiter = Arc::new(RateLimiter::new(1.0, 1));
        let (tx, rx) = broadcast::channel(1);
        let handle = limiter
            .clone()
            .spawn_sweeper(Duration::from_millis(10), Duration::from_secs(1), rx);
        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
