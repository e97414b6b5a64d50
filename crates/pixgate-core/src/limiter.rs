//! Per-client sliding-window rate limiter

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tracing::debug;

/// Configuration for the rate limiter
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Length of the sliding window in seconds
    pub window_secs: u64,
    /// Maximum admitted requests per identity within the window
    pub max_requests: usize,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            window_secs: 10,
            max_requests: 6,
        }
    }
}

/// Sliding-window rate limiter keyed by client identity.
///
/// One global lock over the identity map; admission is a short critical
/// section, so concurrent requests from the same identity never undercount.
/// The identity set is never pruned and grows for the process lifetime.
pub struct RateLimiter {
    config: RateLimiterConfig,
    windows: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    /// Create a new rate limiter
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Check whether a request from `identity` is admitted, recording it
    /// if so. Rejections leave the window untouched.
    pub fn allow(&self, identity: &str) -> bool {
        self.allow_at(identity, Instant::now())
    }

    fn allow_at(&self, identity: &str, now: Instant) -> bool {
        let window = Duration::from_secs(self.config.window_secs);
        let mut windows = self.windows.lock();
        let timestamps = windows.entry(identity.to_string()).or_default();

        // Evict entries that slid out of the window
        while let Some(oldest) = timestamps.front() {
            if now.duration_since(*oldest) >= window {
                timestamps.pop_front();
            } else {
                break;
            }
        }

        if timestamps.len() >= self.config.max_requests {
            debug!("Admission rejected for {}", identity);
            return false;
        }

        timestamps.push_back(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(window_secs: u64, max_requests: usize) -> RateLimiter {
        RateLimiter::new(RateLimiterConfig {
            window_secs,
            max_requests,
        })
    }

    #[test]
    fn test_admits_up_to_max_then_rejects() {
        let limiter = limiter(10, 6);
        let now = Instant::now();

        for _ in 0..6 {
            assert!(limiter.allow_at("10.0.0.1", now));
        }
        assert!(!limiter.allow_at("10.0.0.1", now));
    }

    #[test]
    fn test_admits_again_after_window_passes() {
        let limiter = limiter(10, 6);
        let start = Instant::now();

        for _ in 0..6 {
            assert!(limiter.allow_at("10.0.0.1", start));
        }
        assert!(!limiter.allow_at("10.0.0.1", start));

        // The full window elapsed; all prior entries are evicted
        assert!(limiter.allow_at("10.0.0.1", start + Duration::from_secs(10)));
    }

    #[test]
    fn test_rejection_does_not_consume_a_slot() {
        let limiter = limiter(10, 2);
        let start = Instant::now();

        assert!(limiter.allow_at("10.0.0.1", start));
        assert!(limiter.allow_at("10.0.0.1", start + Duration::from_secs(1)));
        assert!(!limiter.allow_at("10.0.0.1", start + Duration::from_secs(2)));
        assert!(!limiter.allow_at("10.0.0.1", start + Duration::from_secs(3)));

        // First admission slides out at start+10; only one slot frees up
        // because the rejected attempts were never recorded.
        assert!(limiter.allow_at("10.0.0.1", start + Duration::from_secs(10)));
        assert!(!limiter.allow_at("10.0.0.1", start + Duration::from_secs(10)));
    }

    #[test]
    fn test_identities_are_independent() {
        let limiter = limiter(10, 1);
        let now = Instant::now();

        assert!(limiter.allow_at("10.0.0.1", now));
        assert!(!limiter.allow_at("10.0.0.1", now));
        assert!(limiter.allow_at("10.0.0.2", now));
    }

    #[test]
    fn test_partial_window_eviction() {
        let limiter = limiter(10, 2);
        let start = Instant::now();

        assert!(limiter.allow_at("10.0.0.1", start));
        assert!(limiter.allow_at("10.0.0.1", start + Duration::from_secs(6)));
        assert!(!limiter.allow_at("10.0.0.1", start + Duration::from_secs(9)));

        // start has slid out at start+11, start+6 has not
        assert!(limiter.allow_at("10.0.0.1", start + Duration::from_secs(11)));
        assert!(!limiter.allow_at("10.0.0.1", start + Duration::from_secs(12)));
    }
}
