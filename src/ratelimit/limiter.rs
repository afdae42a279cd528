//! Core sliding-window rate limiter.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use crate::config::LimiterConfig;
use crate::error::{Result, SlidegateError};

use super::clock::{Clock, SystemClock};
use super::window::KeyWindow;

/// Reject limits that could never admit a request.
pub(crate) fn validate_limits(window_size: Duration, max_requests: u32) -> Result<()> {
    if window_size.is_zero() {
        return Err(SlidegateError::InvalidConfiguration(
            "window size must be greater than zero".to_string(),
        ));
    }
    if max_requests == 0 {
        return Err(SlidegateError::InvalidConfiguration(
            "max requests must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

/// Per-key sliding-window rate limiter.
///
/// Admits at most `max_requests` requests per key within any trailing window
/// of `window_size`. Every public operation first expires stale timestamps
/// for all keys and drops keys left with no history, so memory is bounded by
/// the set of recently active keys.
///
/// The limiter is single-owner; wrap it in [`SharedLimiter`] or use
/// [`ShardedLimiter`] to share it between threads.
///
/// [`SharedLimiter`]: super::SharedLimiter
/// [`ShardedLimiter`]: super::ShardedLimiter
#[derive(Debug)]
pub struct SlidingWindowLimiter<C: Clock = SystemClock> {
    /// Length of the trailing window
    window_size: Duration,
    /// Admissions allowed per key within one window
    max_requests: u32,
    /// Admission history indexed by key
    windows: HashMap<String, KeyWindow>,
    /// Source of "now" for the operations that don't take one
    clock: C,
}

impl SlidingWindowLimiter {
    /// Create a limiter reading time from the system clock.
    pub fn new(window_size: Duration, max_requests: u32) -> Result<Self> {
        Self::with_clock(window_size, max_requests, SystemClock)
    }

    /// Create a limiter from configuration.
    pub fn from_config(config: &LimiterConfig) -> Result<Self> {
        Self::new(config.window_size(), config.max_requests)
    }
}

impl<C: Clock> SlidingWindowLimiter<C> {
    /// Create a limiter reading time from `clock`.
    pub fn with_clock(window_size: Duration, max_requests: u32, clock: C) -> Result<Self> {
        validate_limits(window_size, max_requests)?;
        Ok(Self {
            window_size,
            max_requests,
            windows: HashMap::new(),
            clock,
        })
    }

    /// Whether a request for `key` would be admitted now.
    pub fn can_send(&mut self, key: &str) -> bool {
        let now = self.clock.now();
        self.can_send_at(key, now)
    }

    /// Whether a request for `key` would be admitted at `now`.
    ///
    /// Does not record anything; repeated calls give the same answer until
    /// time moves or an admission is recorded.
    pub fn can_send_at(&mut self, key: &str, now: Instant) -> bool {
        self.expire_stale(now);

        let count = self.windows.get(key).map_or(0, KeyWindow::len);
        trace!(
            key = %key,
            count = count,
            max_requests = self.max_requests,
            "Checking admission"
        );

        count < self.max_requests as usize
    }

    /// Admit and record a request for `key` if the window allows it.
    ///
    /// Returns `true` if the request was admitted.
    pub fn record_send(&mut self, key: &str) -> bool {
        let now = self.clock.now();
        self.record_send_at(key, now)
    }

    /// Admit and record a request for `key` at `now` if the window allows it.
    pub fn record_send_at(&mut self, key: &str, now: Instant) -> bool {
        if !self.can_send_at(key, now) {
            debug!(key = %key, "Rate limit exceeded");
            return false;
        }

        match self.windows.get_mut(key) {
            Some(window) => window.record(now),
            None => {
                debug!(key = %key, "Tracking new key");
                self.windows
                    .insert(key.to_string(), KeyWindow::starting_at(now));
            }
        }
        true
    }

    /// How long until a request for `key` would be admitted.
    ///
    /// Zero if it would be admitted now.
    pub fn time_until_next_allowed(&mut self, key: &str) -> Duration {
        let now = self.clock.now();
        self.time_until_next_allowed_at(key, now)
    }

    /// How long after `now` a request for `key` would be admitted.
    pub fn time_until_next_allowed_at(&mut self, key: &str, now: Instant) -> Duration {
        if self.can_send_at(key, now) {
            return Duration::ZERO;
        }

        self.windows
            .get(key)
            .map(|window| window.time_until_oldest_expires(now, self.window_size))
            .unwrap_or(Duration::ZERO)
    }

    /// Number of admissions currently counted against `key`.
    pub fn request_count(&mut self, key: &str) -> usize {
        let now = self.clock.now();
        self.expire_stale(now);
        self.windows.get(key).map_or(0, KeyWindow::len)
    }

    /// Admissions still available to `key` in the current window.
    pub fn remaining(&mut self, key: &str) -> u32 {
        let count = self.request_count(key);
        (self.max_requests as usize).saturating_sub(count) as u32
    }

    /// Run an expiry pass at the current clock reading.
    pub fn purge_expired(&mut self) {
        let now = self.clock.now();
        self.expire_stale(now);
    }

    /// Get the number of keys with admission history.
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }

    /// Drop all admission history.
    pub fn clear(&mut self) {
        self.windows.clear();
    }

    /// Length of the trailing window.
    pub fn window_size(&self) -> Duration {
        self.window_size
    }

    /// Admissions allowed per key within one window.
    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    fn expire_stale(&mut self, now: Instant) {
        let window_size = self.window_size;
        self.windows.retain(|key, window| {
            window.expire(now, window_size);
            if window.is_empty() {
                debug!(key = %key, "Evicting key with no recent admissions");
                false
            } else {
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::clock::ManualClock;
    use rand::Rng;

    fn limiter(window_secs: u64, max_requests: u32) -> (SlidingWindowLimiter<ManualClock>, ManualClock) {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let clock = ManualClock::new();
        let limiter = SlidingWindowLimiter::with_clock(
            Duration::from_secs(window_secs),
            max_requests,
            clock.clone(),
        )
        .unwrap();
        (limiter, clock)
    }

    #[test]
    fn test_rejects_invalid_configuration() {
        assert!(matches!(
            SlidingWindowLimiter::new(Duration::ZERO, 1),
            Err(SlidegateError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            SlidingWindowLimiter::new(Duration::from_secs(1), 0),
            Err(SlidegateError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_limiter_creation() {
        let limiter = SlidingWindowLimiter::new(Duration::from_secs(10), 1).unwrap();
        assert_eq!(limiter.tracked_keys(), 0);
        assert_eq!(limiter.window_size(), Duration::from_secs(10));
        assert_eq!(limiter.max_requests(), 1);
    }

    #[test]
    fn test_unknown_key_is_admissible() {
        let (mut limiter, _clock) = limiter(10, 1);
        assert!(limiter.can_send("nobody"));
        assert_eq!(limiter.time_until_next_allowed("nobody"), Duration::ZERO);
        assert_eq!(limiter.tracked_keys(), 0);
    }

    #[test]
    fn test_single_request_window_scenario() {
        let (mut limiter, clock) = limiter(10, 1);

        assert!(limiter.record_send("A"));

        clock.set(Duration::from_secs(5));
        assert!(!limiter.can_send("A"));
        assert_eq!(limiter.time_until_next_allowed("A"), Duration::from_secs(5));

        clock.set(Duration::from_millis(10_100));
        assert!(limiter.can_send("A"));
        assert!(limiter.record_send("A"));
    }

    #[test]
    fn test_burst_up_to_max_requests() {
        let (mut limiter, clock) = limiter(10, 3);

        for _ in 0..3 {
            assert!(limiter.record_send("B"));
            clock.advance(Duration::from_millis(200));
        }
        assert!(!limiter.record_send("B"));
        assert_eq!(limiter.request_count("B"), 3);
        assert_eq!(limiter.remaining("B"), 0);
    }

    #[test]
    fn test_rejected_request_is_not_recorded() {
        let (mut limiter, clock) = limiter(10, 1);

        assert!(limiter.record_send("A"));
        clock.advance(Duration::from_secs(9));
        assert!(!limiter.record_send("A"));

        // Only the first admission counts, so it frees up at t=10+
        clock.advance(Duration::from_millis(1001));
        assert!(limiter.record_send("A"));
    }

    #[test]
    fn test_keys_are_independent() {
        let (mut limiter, _clock) = limiter(10, 2);

        assert!(limiter.record_send("A"));
        assert!(limiter.record_send("A"));
        assert!(!limiter.can_send("A"));

        assert!(limiter.can_send("B"));
        assert!(limiter.record_send("B"));
        assert_eq!(limiter.tracked_keys(), 2);
    }

    #[test]
    fn test_can_send_is_idempotent() {
        let (mut limiter, _clock) = limiter(10, 2);
        limiter.record_send("A");

        let first = limiter.can_send("A");
        for _ in 0..5 {
            assert_eq!(limiter.can_send("A"), first);
        }
        assert_eq!(limiter.request_count("A"), 1);
    }

    #[test]
    fn test_entry_exactly_window_old_still_counts() {
        let (mut limiter, clock) = limiter(10, 1);
        limiter.record_send("A");

        clock.set(Duration::from_secs(10));
        assert!(!limiter.can_send("A"));
        assert_eq!(limiter.time_until_next_allowed("A"), Duration::ZERO);

        clock.set(Duration::from_secs(10) + Duration::from_nanos(1));
        assert!(limiter.can_send("A"));
    }

    #[test]
    fn test_wait_matches_oldest_entry() {
        let (mut limiter, clock) = limiter(10, 2);

        limiter.record_send("A");
        clock.advance(Duration::from_secs(3));
        limiter.record_send("A");
        clock.advance(Duration::from_secs(4));

        // Oldest entry is 7s old
        let wait = limiter.time_until_next_allowed("A");
        assert_eq!(wait, Duration::from_secs(3));

        clock.advance(wait + Duration::from_millis(1));
        assert!(limiter.can_send("A"));
        assert_eq!(limiter.request_count("A"), 1);
    }

    #[test]
    fn test_expired_keys_are_evicted() {
        let (mut limiter, clock) = limiter(10, 1);

        limiter.record_send("A");
        limiter.record_send("B");
        assert_eq!(limiter.tracked_keys(), 2);

        clock.advance(Duration::from_secs(11));
        limiter.record_send("C");

        assert_eq!(limiter.tracked_keys(), 1);

        clock.advance(Duration::from_secs(11));
        limiter.purge_expired();
        assert_eq!(limiter.tracked_keys(), 0);
    }

    #[test]
    fn test_explicit_instants() {
        let (mut limiter, clock) = limiter(10, 1);
        let t0 = clock.at(Duration::ZERO);

        assert!(limiter.record_send_at("A", t0));
        assert!(!limiter.can_send_at("A", t0 + Duration::from_secs(5)));
        assert_eq!(
            limiter.time_until_next_allowed_at("A", t0 + Duration::from_secs(5)),
            Duration::from_secs(5)
        );
        assert!(limiter.record_send_at("A", t0 + Duration::from_millis(10_100)));
    }

    #[test]
    fn test_clear() {
        let (mut limiter, _clock) = limiter(10, 1);
        limiter.record_send("A");
        assert_eq!(limiter.tracked_keys(), 1);

        limiter.clear();
        assert_eq!(limiter.tracked_keys(), 0);
        assert!(limiter.can_send("A"));
    }

    #[test]
    fn test_random_traffic_never_exceeds_window_bound() {
        let window = Duration::from_millis(1000);
        let max_requests = 4;
        let (mut limiter, clock) = limiter(1, max_requests);
        let mut rng = rand::thread_rng();
        let mut admitted: Vec<(usize, Duration)> = Vec::new();

        for _ in 0..2000 {
            clock.advance(Duration::from_millis(rng.gen_range(0..120)));
            let user = rng.gen_range(0..5);
            if limiter.record_send(&user.to_string()) {
                admitted.push((user, clock.elapsed()));
            }
        }

        for (user, at) in &admitted {
            let in_window = admitted
                .iter()
                .filter(|(u, t)| u == user && *t <= *at && *at - *t < window)
                .count();
            assert!(in_window <= max_requests as usize);
        }
    }
}
