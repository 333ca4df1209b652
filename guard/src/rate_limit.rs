//! Identity-agnostic sliding-window rate limiter.

use dashmap::DashMap;
use error::AccessError;

/// Per-client counter for the current window.
#[derive(Debug, Clone)]
pub struct RateWindow {
    pub count: u32,
    pub reset_at_ms: i64,
}

/// Tracks per-client request counts in a rolling window.
///
/// The window table is the only shared mutable state in the access layer;
/// each client's counter is updated under its shard lock so simultaneous
/// requests from one client cannot lose increments. Expired windows are
/// evicted lazily on every check to bound memory.
pub struct RateLimiter {
    window_ms: i64,
    max_requests: u32,
    windows: DashMap<String, RateWindow>,
}

impl RateLimiter {
    /// Create a limiter allowing `max_requests` per `window_ms` per client.
    pub fn new(window_ms: i64, max_requests: u32) -> Self {
        Self {
            window_ms,
            max_requests,
            windows: DashMap::new(),
        }
    }

    /// Check the requesting client against its current window.
    pub fn check(&self, client_key: &str) -> Result<(), AccessError> {
        self.check_at(client_key, chrono::Utc::now().timestamp_millis())
    }

    /// Time-parameterized variant of [`check`](Self::check).
    pub fn check_at(&self, client_key: &str, now_ms: i64) -> Result<(), AccessError> {
        self.windows.retain(|_, window| window.reset_at_ms > now_ms);

        let mut window = self
            .windows
            .entry(client_key.to_string())
            .or_insert_with(|| RateWindow {
                count: 0,
                reset_at_ms: now_ms + self.window_ms,
            });

        if now_ms >= window.reset_at_ms {
            window.count = 1;
            window.reset_at_ms = now_ms + self.window_ms;
        } else {
            window.count += 1;
        }

        if window.count > self.max_requests {
            let retry_after_secs = (window.reset_at_ms - now_ms + 999) / 1000;
            tracing::warn!(
                "Rate limit exceeded for {}: {} requests in window",
                client_key,
                window.count
            );
            return Err(AccessError::RateLimitExceeded { retry_after_secs });
        }

        Ok(())
    }

    /// Number of clients with a live window.
    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }
}
