// crates/monitord-resilience/src/rate_limiter.rs
// ============================================================================
// Module: Rate Limiter
// Description: Sliding-window request-count limiter for upstream calls.
// Purpose: Cap how often a probe may call its upstream in any rolling
//          window, waiting out the window rather than failing the call.
// Dependencies: std::sync::Mutex, tokio::time, monitord_core::time
// ============================================================================

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use monitord_core::time::Clock;
use monitord_core::time::MillisSinceEpoch;

/// Tuning parameters for a [`RateLimiter`].
#[derive(Debug, Clone, Copy)]
pub struct RateLimiterConfig {
    /// Maximum calls admitted within any `window`.
    pub max_requests: usize,
    /// Rolling window length.
    pub window: Duration,
}

/// A sliding-window limiter over call timestamps.
///
/// # Invariants
/// - At most `max_requests` timestamps are ever recorded within `window`.
pub struct RateLimiter {
    config: RateLimiterConfig,
    clock: Arc<dyn Clock>,
    timestamps: Mutex<VecDeque<MillisSinceEpoch>>,
}

impl RateLimiter {
    /// Builds a limiter admitting at most `config.max_requests` calls per
    /// `config.window`.
    #[must_use]
    pub fn new(config: RateLimiterConfig, clock: Arc<dyn Clock>) -> Self {
        Self { config, clock, timestamps: Mutex::new(VecDeque::with_capacity(config.max_requests)) }
    }

    /// Reserves a slot, waiting as long as necessary for the oldest
    /// in-window timestamp to age out when the window is full.
    pub async fn acquire(&self) {
        loop {
            let wait = self.try_reserve();
            match wait {
                None => return,
                Some(wait_duration) => tokio::time::sleep(wait_duration).await,
            }
        }
    }

    /// Non-blocking variant: returns `true` and reserves a slot if one is
    /// free, or `false` without waiting if the window is currently full.
    #[must_use]
    pub fn try_acquire(&self) -> bool {
        self.try_reserve().is_none()
    }

    /// Returns the number of calls currently counted within the window.
    #[must_use]
    pub fn current_load(&self) -> usize {
        let now = self.clock.now_millis();
        #[allow(clippy::unwrap_used)]
        let mut timestamps = self.timestamps.lock().unwrap();
        self.evict_expired(&mut timestamps, now);
        timestamps.len()
    }

    fn try_reserve(&self) -> Option<Duration> {
        let now = self.clock.now_millis();
        #[allow(clippy::unwrap_used)]
        let mut timestamps = self.timestamps.lock().unwrap();
        self.evict_expired(&mut timestamps, now);

        if timestamps.len() < self.config.max_requests {
            timestamps.push_back(now);
            return None;
        }

        let oldest = timestamps.front().copied().unwrap_or(now);
        let window_ms = i64::try_from(self.config.window.as_millis()).unwrap_or(i64::MAX);
        let expires_at = oldest.saturating_add(window_ms);
        let remaining = expires_at.saturating_sub(now).max(1);
        #[allow(clippy::cast_sign_loss)]
        Some(Duration::from_millis(remaining as u64))
    }

    fn evict_expired(&self, timestamps: &mut VecDeque<MillisSinceEpoch>, now: MillisSinceEpoch) {
        let window_ms = i64::try_from(self.config.window.as_millis()).unwrap_or(i64::MAX);
        while let Some(&front) = timestamps.front() {
            if now.saturating_sub(front) >= window_ms {
                timestamps.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use monitord_core::time::testing::FakeClock;

    use super::*;

    #[test]
    fn admits_up_to_max_requests_then_rejects_without_waiting() {
        let clock = Arc::new(FakeClock::new(0));
        let limiter = RateLimiter::new(RateLimiterConfig { max_requests: 2, window: Duration::from_secs(1) }, clock);
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[test]
    fn admits_again_once_the_window_has_rolled_past() {
        let clock = Arc::new(FakeClock::new(0));
        let limiter = RateLimiter::new(RateLimiterConfig { max_requests: 1, window: Duration::from_millis(100) }, Arc::clone(&clock));
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
        clock.advance(100);
        assert!(limiter.try_acquire());
    }

    #[tokio::test]
    async fn acquire_waits_out_the_window_instead_of_failing() {
        use monitord_core::time::SystemClock;

        let limiter = RateLimiter::new(RateLimiterConfig { max_requests: 1, window: Duration::from_millis(30) }, Arc::new(SystemClock));

        let started = std::time::Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(started.elapsed() >= Duration::from_millis(30));
    }
}
