//! Per-identifier fixed-window rate limiting.
//!
//! Each identifier maps to a `{count, reset_at}` window. Counting is an
//! atomic check-and-set against the shared [`KeyValueStore`]; concurrent
//! requests racing on an expired window never double-count the reset.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::debug;

use crate::store::{now_millis, KeyValueStore};

/// Window configuration for one endpoint class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Window length in milliseconds.
    pub window_ms: u64,
    /// Maximum requests allowed per window.
    pub max_requests: u32,
}

impl RateLimitConfig {
    /// Sensitive endpoints: 10 requests / 15 minutes.
    pub const STRICT: Self = Self::per_window(10, 15 * 60 * 1000);
    /// General API traffic: 60 requests / minute.
    pub const STANDARD: Self = Self::per_window(60, 60 * 1000);
    /// Read-heavy endpoints: 120 requests / minute.
    pub const RELAXED: Self = Self::per_window(120, 60 * 1000);
    /// Authentication attempts: 5 requests / 15 minutes.
    pub const AUTH: Self = Self::per_window(5, 15 * 60 * 1000);
    /// Blockchain write operations: 30 requests / minute.
    pub const CONTRACT: Self = Self::per_window(30, 60 * 1000);

    const fn per_window(max_requests: u32, window_ms: u64) -> Self {
        Self {
            window_ms,
            max_requests,
        }
    }

    /// Look up a preset by its configured name.
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "strict" => Some(Self::STRICT),
            "standard" => Some(Self::STANDARD),
            "relaxed" => Some(Self::RELAXED),
            "auth" => Some(Self::AUTH),
            "contract" => Some(Self::CONTRACT),
            _ => None,
        }
    }
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitDecision {
    /// Whether the request may proceed.
    pub allowed: bool,
    /// Requests left in the current window.
    pub remaining: u32,
    /// When the window resets (epoch milliseconds).
    pub reset_at_ms: u64,
    /// The limit that applied (echoed into response headers).
    pub limit: u32,
    /// Seconds until retry is worthwhile; set only on rejection.
    pub retry_after_secs: Option<u64>,
}

/// Fixed-window rate limiter over a shared key-value store.
pub struct RateLimiter {
    store: Arc<dyn KeyValueStore>,
}

impl RateLimiter {
    /// Create a rate limiter over the given store.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Count a request for `identifier` and decide whether it may proceed.
    pub fn check(&self, identifier: &str, config: RateLimitConfig) -> RateLimitDecision {
        self.check_at(identifier, config, now_millis())
    }

    fn check_at(&self, identifier: &str, config: RateLimitConfig, now_ms: u64) -> RateLimitDecision {
        // Prefix mirrors the nonce store's; the two share one key space.
        let key = format!("rate:{identifier}");
        let snapshot = self
            .store
            .increment_window_at(&key, config.window_ms, now_ms);

        let allowed = snapshot.count <= config.max_requests;
        let remaining = config.max_requests.saturating_sub(snapshot.count);
        let retry_after_secs = if allowed {
            None
        } else {
            // ceil((reset_at - now) / 1000), never zero while the window is open.
            Some((snapshot.reset_at_ms.saturating_sub(now_ms) + 999) / 1000)
        };

        RateLimitDecision {
            allowed,
            remaining,
            reset_at_ms: snapshot.reset_at_ms,
            limit: config.max_requests,
            retry_after_secs,
        }
    }

    /// Number of identifiers currently tracked.
    pub fn tracked(&self) -> usize {
        self.store.len()
    }

    /// Drop windows whose reset time has passed.
    pub fn sweep(&self) {
        self.store.sweep_at(now_millis());
    }

    /// Start a background sweep task, stoppable via `shutdown`.
    pub fn start_sweep_task(
        self: &Arc<Self>,
        interval: Duration,
        shutdown: Arc<Notify>,
    ) -> tokio::task::JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // Pinned once so a notification during a sweep is retained.
            let stop = shutdown.notified();
            tokio::pin!(stop);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        limiter.sweep();
                        debug!(tracked = limiter.tracked(), "Rate limit sweep complete");
                    }
                    _ = &mut stop => {
                        debug!("Rate limit sweep task stopping");
                        break;
                    }
                }
            }
        })
    }
}
