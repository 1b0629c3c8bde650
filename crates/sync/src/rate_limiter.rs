// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! Per-peer token bucket rate limiting for inbound sync RPCs (§4.8).
//!
//! Grounded on the gateway's sliding-window limiter: a mutex-protected map
//! keyed by peer, with stale entries swept on access rather than on a
//! background timer.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// 10 rps / burst 20 / queue 1000, per §4.8 defaults.
pub const DEFAULT_RATE_PER_SECOND: f64 = 10.0;
pub const DEFAULT_BURST: f64 = 20.0;
pub const DEFAULT_QUEUE_DEPTH: usize = 1000;

/// How long a peer can sit idle before its bucket is forgotten.
const IDLE_GC_INTERVAL: Duration = Duration::from_secs(600);

struct Bucket {
    tokens: f64,
    last_refill: Instant,
    last_seen: Instant,
}

impl Bucket {
    fn new(burst: f64, now: Instant) -> Self {
        Self { tokens: burst, last_refill: now, last_seen: now }
    }

    fn refill(&mut self, rate: f64, burst: f64, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate).min(burst);
        self.last_refill = now;
        self.last_seen = now;
    }
}

/// Result of a rate-limit admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    /// Corresponds to JSON-RPC code 429.
    RateLimited,
    /// Corresponds to JSON-RPC code 503: the global queue is saturated
    /// regardless of any individual peer's remaining tokens.
    QueueSaturated,
}

/// Token bucket per peer plus a global in-flight counter standing in for
/// queue depth.
pub struct RateLimiter {
    rate: f64,
    burst: f64,
    queue_cap: usize,
    buckets: Mutex<HashMap<String, Bucket>>,
    in_flight: Mutex<usize>,
}

impl RateLimiter {
    pub fn new(rate: f64, burst: f64, queue_cap: usize) -> Self {
        Self {
            rate,
            burst,
            queue_cap,
            buckets: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(0),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_RATE_PER_SECOND, DEFAULT_BURST, DEFAULT_QUEUE_DEPTH)
    }

    /// Checks and, if admitted, consumes one token and one queue slot for
    /// `peer_id`. Call [`RateLimiter::release`] once the request completes.
    pub fn admit(&self, peer_id: &str) -> Admission {
        {
            let mut in_flight = self.in_flight.lock();
            if *in_flight >= self.queue_cap {
                return Admission::QueueSaturated;
            }
        }

        let now = Instant::now();
        let mut buckets = self.buckets.lock();
        self.sweep_stale(&mut buckets, now);

        let bucket = buckets.entry(peer_id.to_string()).or_insert_with(|| Bucket::new(self.burst, now));
        bucket.refill(self.rate, self.burst, now);

        if bucket.tokens < 1.0 {
            return Admission::RateLimited;
        }
        bucket.tokens -= 1.0;
        drop(buckets);

        *self.in_flight.lock() += 1;
        Admission::Allowed
    }

    /// Frees the queue slot taken by a prior [`RateLimiter::admit`] call
    /// that returned [`Admission::Allowed`].
    pub fn release(&self) {
        let mut in_flight = self.in_flight.lock();
        *in_flight = in_flight.saturating_sub(1);
    }

    fn sweep_stale(&self, buckets: &mut HashMap<String, Bucket>, now: Instant) {
        buckets.retain(|_, bucket| now.saturating_duration_since(bucket.last_seen) < IDLE_GC_INTERVAL);
    }

    /// Number of distinct peers currently tracked, for diagnostics.
    pub fn tracked_peers(&self) -> usize {
        self.buckets.lock().len()
    }

    /// Requests currently holding a queue slot, for `health`'s rate-limit summary.
    pub fn in_flight(&self) -> usize {
        *self.in_flight.lock()
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn burst(&self) -> f64 {
        self.burst
    }

    pub fn queue_cap(&self) -> usize {
        self.queue_cap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_is_consumed_then_limited() {
        let limiter = RateLimiter::new(1.0, 2.0, 10);
        assert_eq!(limiter.admit("peer-a"), Admission::Allowed);
        limiter.release();
        assert_eq!(limiter.admit("peer-a"), Admission::Allowed);
        limiter.release();
        assert_eq!(limiter.admit("peer-a"), Admission::RateLimited);
    }

    #[test]
    fn distinct_peers_have_independent_buckets() {
        let limiter = RateLimiter::new(1.0, 1.0, 10);
        assert_eq!(limiter.admit("peer-a"), Admission::Allowed);
        assert_eq!(limiter.admit("peer-b"), Admission::Allowed);
    }

    #[test]
    fn queue_cap_returns_saturated_even_with_tokens_left() {
        let limiter = RateLimiter::new(100.0, 100.0, 1);
        assert_eq!(limiter.admit("peer-a"), Admission::Allowed);
        assert_eq!(limiter.admit("peer-b"), Admission::QueueSaturated);
        limiter.release();
        assert_eq!(limiter.admit("peer-b"), Admission::Allowed);
    }
}
