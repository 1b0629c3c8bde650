// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! Centralized environment variable access (§6 "Environment variables
//! consumed").

use std::time::Duration;

/// Identity fallback used by `agent.register` when a client omits a field
/// the environment already knows (e.g. a wrapper script launched per-agent).
#[derive(Debug, Clone, Default)]
pub struct IdentityFallback {
    pub name: Option<String>,
    pub role: Option<String>,
    pub module: Option<String>,
}

pub fn identity_fallback() -> IdentityFallback {
    IdentityFallback {
        name: std::env::var("THRUM_NAME").ok(),
        role: std::env::var("THRUM_ROLE").ok(),
        module: std::env::var("THRUM_MODULE").ok(),
    }
}

/// Security knobs, all independently overridable from the environment. Any
/// unset variable falls back to `thrum-sync`'s compiled-in default.
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub max_event_size: usize,
    pub max_batch_size: usize,
    pub max_rps: f64,
    pub burst_size: f64,
    pub max_queue_depth: usize,
    pub require_signatures: bool,
    pub rate_limit_enabled: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_event_size: thrum_sync::MAX_EVENT_BYTES,
            max_batch_size: 500,
            max_rps: thrum_sync::DEFAULT_RATE_PER_SECOND,
            burst_size: thrum_sync::DEFAULT_BURST,
            max_queue_depth: thrum_sync::DEFAULT_QUEUE_DEPTH,
            require_signatures: false,
            rate_limit_enabled: true,
        }
    }
}

impl SecurityConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_event_size: env_usize("THRUM_SECURITY_MAX_EVENT_SIZE").unwrap_or(defaults.max_event_size),
            max_batch_size: env_usize("THRUM_SECURITY_MAX_BATCH_SIZE").unwrap_or(defaults.max_batch_size),
            max_rps: env_f64("THRUM_SECURITY_MAX_RPS").unwrap_or(defaults.max_rps),
            burst_size: env_f64("THRUM_SECURITY_BURST_SIZE").unwrap_or(defaults.burst_size),
            max_queue_depth: env_usize("THRUM_SECURITY_MAX_QUEUE_DEPTH").unwrap_or(defaults.max_queue_depth),
            require_signatures: env_bool("THRUM_SECURITY_REQUIRE_SIGNATURES").unwrap_or(defaults.require_signatures),
            rate_limit_enabled: env_bool("THRUM_SECURITY_RATE_LIMIT_ENABLED").unwrap_or(defaults.rate_limit_enabled),
        }
    }
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_f64(key: &str) -> Option<f64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// How long a request context waits before it's treated as abandoned
/// (client disconnected mid-handler).
pub fn request_timeout() -> Duration {
    std::env::var("THRUM_REQUEST_TIMEOUT_MS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(30))
}

/// Grace period the shutdown sequence gives in-flight requests before it
/// stops waiting on them (§4.10).
pub fn drain_timeout() -> Duration {
    std::env::var("THRUM_DRAIN_TIMEOUT_MS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(5))
}

/// Interval between sync scheduler sweeps across registered peers.
pub fn sync_interval() -> Duration {
    std::env::var("THRUM_SYNC_INTERVAL_MS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(10))
}
