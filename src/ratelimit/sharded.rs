//! Per-key locking limiter backed by a sharded map.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use crate::error::Result;

use super::backend::AdmissionControl;
use super::clock::{Clock, SystemClock};
use super::limiter::validate_limits;
use super::window::KeyWindow;

/// A sliding-window limiter with per-key locking.
///
/// Key windows live in a [`DashMap`], so callers working on different keys
/// mostly contend on different shards. The admission check and the append
/// for one key run under that key's entry lock.
///
/// Every operation starts with an expiry sweep over all shards. The sweep
/// never runs while an entry guard is held.
#[derive(Debug)]
pub struct ShardedLimiter<C: Clock = SystemClock> {
    /// Length of the trailing window
    window_size: Duration,
    /// Admissions allowed per key within one window
    max_requests: u32,
    /// Admission history indexed by key
    windows: DashMap<String, KeyWindow>,
    clock: C,
}

impl ShardedLimiter {
    /// Create a sharded limiter reading time from the system clock.
    pub fn new(window_size: Duration, max_requests: u32) -> Result<Self> {
        Self::with_clock(window_size, max_requests, SystemClock)
    }
}

impl<C: Clock> ShardedLimiter<C> {
    /// Create a sharded limiter reading time from `clock`.
    pub fn with_clock(window_size: Duration, max_requests: u32, clock: C) -> Result<Self> {
        validate_limits(window_size, max_requests)?;
        Ok(Self {
            window_size,
            max_requests,
            windows: DashMap::new(),
            clock,
        })
    }

    /// Whether a request for `key` would be admitted at `now`.
    pub fn can_send_at(&self, key: &str, now: Instant) -> bool {
        self.expire_stale(now);

        let count = self.windows.get(key).map_or(0, |window| window.len());
        trace!(
            key = %key,
            count = count,
            max_requests = self.max_requests,
            "Checking admission"
        );

        count < self.max_requests as usize
    }

    /// Admit and record a request for `key` at `now` if the window allows it.
    pub fn record_send_at(&self, key: &str, now: Instant) -> bool {
        self.expire_stale(now);

        // Fast path avoids allocating the key for already-tracked windows
        if let Some(mut window) = self.windows.get_mut(key) {
            return self.admit(key, &mut window, now);
        }

        match self.windows.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => self.admit(key, occupied.get_mut(), now),
            Entry::Vacant(vacant) => {
                debug!(key = %key, "Tracking new key");
                vacant.insert(KeyWindow::starting_at(now));
                true
            }
        }
    }

    /// How long after `now` a request for `key` would be admitted.
    pub fn time_until_next_allowed_at(&self, key: &str, now: Instant) -> Duration {
        if self.can_send_at(key, now) {
            return Duration::ZERO;
        }

        self.windows
            .get(key)
            .map(|window| window.time_until_oldest_expires(now, self.window_size))
            .unwrap_or(Duration::ZERO)
    }

    /// Admissions still available to `key` in the current window.
    pub fn remaining(&self, key: &str) -> u32 {
        self.expire_stale(self.clock.now());
        let count = self.windows.get(key).map_or(0, |window| window.len());
        (self.max_requests as usize).saturating_sub(count) as u32
    }

    /// Drop all admission history.
    pub fn clear(&self) {
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

    /// Check-and-append on a window whose entry lock the caller holds.
    fn admit(&self, key: &str, window: &mut KeyWindow, now: Instant) -> bool {
        // Another caller may have recorded since the sweep
        window.expire(now, self.window_size);
        if window.has_capacity(self.max_requests) {
            window.record(now);
            true
        } else {
            debug!(key = %key, "Rate limit exceeded");
            false
        }
    }

    fn expire_stale(&self, now: Instant) {
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

impl<C: Clock> AdmissionControl for ShardedLimiter<C> {
    fn can_send(&self, key: &str) -> bool {
        self.can_send_at(key, self.clock.now())
    }

    fn record_send(&self, key: &str) -> bool {
        self.record_send_at(key, self.clock.now())
    }

    fn time_until_next_allowed(&self, key: &str) -> Duration {
        self.time_until_next_allowed_at(key, self.clock.now())
    }

    fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}
