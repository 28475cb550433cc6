use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use metrics::gauge;

/// Sliding-window limiter keyed by client and route.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    window: Duration,
    max_requests: u32,
    buckets: Arc<DashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            buckets: Arc::new(DashMap::new()),
        }
    }

    /// Record a request and report whether it fits in the window, along with
    /// the remaining allowance.
    pub fn allow(&self, key: &str, route: &str) -> (bool, u32) {
        let bucket_key = format!("{key}:{route}");
        let now = Instant::now();
        let window = self.window;

        let mut entry = self.buckets.entry(bucket_key).or_default();
        entry.retain(|instant| now.duration_since(*instant) < window);

        let remaining = self
            .max_requests
            .saturating_sub(u32::try_from(entry.len()).unwrap_or(u32::MAX));
        if remaining == 0 {
            return (false, 0);
        }

        entry.push(now);
        // after push, one fewer slot remains
        (true, remaining.saturating_sub(1))
    }

    /// Drop buckets whose requests have all aged out of the window.
    pub fn prune(&self) {
        let now = Instant::now();
        let window = self.window;
        self.buckets.retain(|_, hits| {
            hits.retain(|instant| now.duration_since(*instant) < window);
            !hits.is_empty()
        });
        gauge!("menuqr_rate_limiter_buckets").set(self.buckets.len() as f64);
    }

    pub fn retry_after_secs(&self) -> u64 {
        self.window.as_secs().max(1)
    }

    pub fn limit(&self) -> u32 {
        self.max_requests
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_once_the_window_is_full() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 2);

        assert_eq!(limiter.allow("203.0.113.7", "/api/menus/x/views"), (true, 1));
        assert_eq!(limiter.allow("203.0.113.7", "/api/menus/x/views"), (true, 0));
        assert_eq!(limiter.allow("203.0.113.7", "/api/menus/x/views"), (false, 0));

        // other clients and routes have their own buckets
        assert!(limiter.allow("198.51.100.4", "/api/menus/x/views").0);
        assert!(limiter.allow("203.0.113.7", "/api/health").0);
    }

    #[test]
    fn prune_drops_expired_buckets() {
        let limiter = RateLimiter::new(Duration::from_millis(1), 5);
        limiter.allow("client", "/api/health");
        std::thread::sleep(Duration::from_millis(5));
        limiter.prune();
        assert!(limiter.buckets.is_empty());
    }
}
