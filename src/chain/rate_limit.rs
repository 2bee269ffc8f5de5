//! Adaptive rate limiting for JSON-RPC calls, built on governor.
//!
//! Public RPC endpoints throttle aggressively, so the quota shrinks when the
//! recent error rate climbs and recovers toward the configured base once the
//! endpoint behaves again.

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::collections::VecDeque;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Adaptive rate limiter shared by every call an `EvmRpcClient` makes.
pub struct RpcRateLimiter {
    limiter: Mutex<Arc<DefaultDirectRateLimiter>>,
    window: Mutex<ErrorWindow>,
}

struct ErrorWindow {
    base_quota: u32,
    current_quota: u32,
    min_quota: u32,
    results: VecDeque<bool>,
    window_size: usize,
    error_threshold: f64,
    last_adjustment: Instant,
    adjustment_interval: Duration,
}

fn build_limiter(requests_per_second: u32) -> Arc<DefaultDirectRateLimiter> {
    let per_second = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
    Arc::new(RateLimiter::direct(Quota::per_second(per_second)))
}

impl RpcRateLimiter {
    /// Create a limiter allowing `requests_per_second`, judged over the last
    /// `window_size` calls.
    pub fn new(requests_per_second: u32, window_size: usize, error_threshold: f64) -> Self {
        let base_quota = requests_per_second.max(1);
        Self {
            limiter: Mutex::new(build_limiter(base_quota)),
            window: Mutex::new(ErrorWindow {
                base_quota,
                current_quota: base_quota,
                min_quota: (base_quota / 4).max(1),
                results: VecDeque::with_capacity(window_size),
                window_size: window_size.max(1),
                error_threshold: error_threshold.clamp(0.0, 1.0),
                last_adjustment: Instant::now(),
                adjustment_interval: Duration::from_secs(30),
            }),
        }
    }

    /// Wait until the current quota admits one more request.
    pub async fn acquire(&self) {
        let limiter = match self.limiter.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        limiter.until_ready().await;
    }

    pub fn record_success(&self) {
        self.record(true);
    }

    pub fn record_failure(&self) {
        self.record(false);
    }

    /// Quota currently enforced, in requests per second.
    pub fn current_quota(&self) -> u32 {
        self.with_window(|w| w.current_quota)
    }

    fn with_window<T>(&self, f: impl FnOnce(&mut ErrorWindow) -> T) -> T {
        match self.window.lock() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    fn record(&self, success: bool) {
        let new_quota = self.with_window(|window| {
            window.results.push_back(success);
            while window.results.len() > window.window_size {
                window.results.pop_front();
            }
            window.maybe_adjust()
        });

        if let Some(quota) = new_quota {
            let replacement = build_limiter(quota);
            match self.limiter.lock() {
                Ok(mut guard) => *guard = replacement,
                Err(poisoned) => *poisoned.into_inner() = replacement,
            }
        }
    }
}

impl ErrorWindow {
    fn error_rate(&self) -> f64 {
        if self.results.is_empty() {
            return 0.0;
        }
        let failures = self.results.iter().filter(|ok| !**ok).count();
        failures as f64 / self.results.len() as f64
    }

    /// Returns the new quota when it changed.
    fn maybe_adjust(&mut self) -> Option<u32> {
        if self.results.len() < self.window_size / 2 {
            return None;
        }
        if self.last_adjustment.elapsed() < self.adjustment_interval {
            return None;
        }

        let error_rate = self.error_rate();
        let old_quota = self.current_quota;

        if error_rate > self.error_threshold {
            let reduced = (self.current_quota as f64 * (1.0 - (error_rate - self.error_threshold) * 0.5)) as u32;
            self.current_quota = reduced.max(self.min_quota);
            warn!(
                "RPC error rate {:.1}%, reducing quota from {} to {} req/s",
                error_rate * 100.0,
                old_quota,
                self.current_quota
            );
        } else if error_rate < self.error_threshold * 0.5 && self.current_quota < self.base_quota {
            let raised = ((self.current_quota as f64) * 1.25).ceil() as u32;
            self.current_quota = raised.min(self.base_quota);
            debug!("RPC error rate recovered, raising quota to {} req/s", self.current_quota);
        }

        if self.current_quota == old_quota {
            return None;
        }
        self.last_adjustment = Instant::now();
        Some(self.current_quota)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn force_adjustable(limiter: &RpcRateLimiter) {
        limiter.with_window(|w| w.last_adjustment = Instant::now() - Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_acquire_within_quota() {
        let limiter = RpcRateLimiter::new(10, 20, 0.2);
        limiter.acquire().await;
        assert_eq!(limiter.current_quota(), 10);
    }

    #[test]
    fn test_quota_shrinks_on_errors() {
        let limiter = RpcRateLimiter::new(20, 10, 0.2);
        force_adjustable(&limiter);

        for _ in 0..8 {
            limiter.record_failure();
        }

        let quota = limiter.current_quota();
        assert!(quota < 20);
        assert!(quota >= 5);
    }

    #[test]
    fn test_quota_recovers_toward_base() {
        let limiter = RpcRateLimiter::new(20, 10, 0.2);
        force_adjustable(&limiter);
        for _ in 0..10 {
            limiter.record_failure();
        }
        let reduced = limiter.current_quota();

        limiter.with_window(|w| w.results.clear());
        force_adjustable(&limiter);
        for _ in 0..10 {
            limiter.record_success();
        }

        assert!(limiter.current_quota() > reduced);
        assert!(limiter.current_quota() <= 20);
    }

    #[test]
    fn test_no_adjustment_before_interval() {
        let limiter = RpcRateLimiter::new(20, 10, 0.2);
        for _ in 0..10 {
            limiter.record_failure();
        }
        assert_eq!(limiter.current_quota(), 20);
    }
}
