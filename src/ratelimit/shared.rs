//! Single-lock thread-safe limiter.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

use crate::error::Result;

use super::backend::AdmissionControl;
use super::clock::{Clock, SystemClock};
use super::limiter::SlidingWindowLimiter;

/// A [`SlidingWindowLimiter`] behind one mutex.
///
/// Every operation holds the lock for its whole duration, so expiry, the
/// admission check and the append happen as one critical section.
#[derive(Debug)]
pub struct SharedLimiter<C: Clock = SystemClock> {
    inner: Mutex<SlidingWindowLimiter<C>>,
}

impl SharedLimiter {
    /// Create a shared limiter reading time from the system clock.
    pub fn new(window_size: Duration, max_requests: u32) -> Result<Self> {
        Ok(Self::from(SlidingWindowLimiter::new(window_size, max_requests)?))
    }
}

impl<C: Clock> SharedLimiter<C> {
    /// Create a shared limiter reading time from `clock`.
    pub fn with_clock(window_size: Duration, max_requests: u32, clock: C) -> Result<Self> {
        Ok(Self::from(SlidingWindowLimiter::with_clock(
            window_size,
            max_requests,
            clock,
        )?))
    }

    /// Whether a request for `key` would be admitted at `now`.
    pub fn can_send_at(&self, key: &str, now: Instant) -> bool {
        self.inner.lock().can_send_at(key, now)
    }

    /// Admit and record a request for `key` at `now` if the window allows it.
    pub fn record_send_at(&self, key: &str, now: Instant) -> bool {
        self.inner.lock().record_send_at(key, now)
    }

    /// How long after `now` a request for `key` would be admitted.
    pub fn time_until_next_allowed_at(&self, key: &str, now: Instant) -> Duration {
        self.inner.lock().time_until_next_allowed_at(key, now)
    }

    /// Admissions still available to `key` in the current window.
    pub fn remaining(&self, key: &str) -> u32 {
        self.inner.lock().remaining(key)
    }

    /// Drop all admission history.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// Consume the wrapper and return the limiter.
    pub fn into_inner(self) -> SlidingWindowLimiter<C> {
        self.inner.into_inner()
    }
}

impl<C: Clock> From<SlidingWindowLimiter<C>> for SharedLimiter<C> {
    fn from(limiter: SlidingWindowLimiter<C>) -> Self {
        Self {
            inner: Mutex::new(limiter),
        }
    }
}

impl<C: Clock> AdmissionControl for SharedLimiter<C> {
    fn can_send(&self, key: &str) -> bool {
        self.inner.lock().can_send(key)
    }

    fn record_send(&self, key: &str) -> bool {
        self.inner.lock().record_send(key)
    }

    fn time_until_next_allowed(&self, key: &str) -> Duration {
        self.inner.lock().time_until_next_allowed(key)
    }

    fn tracked_keys(&self) -> usize {
        self.inner.lock().tracked_keys()
    }
}
