//! Time sources for the limiter.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A source of monotonic "now" readings.
///
/// Every public limiter operation reads the clock exactly once.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> Instant;
}

/// Clock backed by [`Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same offset, so a test can keep a handle and advance
/// time after moving a clone into a limiter.
#[derive(Debug, Clone)]
pub struct ManualClock {
    /// Instant corresponding to offset zero
    base: Instant,
    /// Time elapsed since `base`
    offset: Arc<Mutex<Duration>>,
}

impl ManualClock {
    /// Create a manual clock positioned at offset zero.
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// Move the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock();
        *offset += by;
    }

    /// Position the clock at `offset` past its base.
    ///
    /// Moving backwards is ignored.
    pub fn set(&self, offset: Duration) {
        let mut current = self.offset.lock();
        if offset > *current {
            *current = offset;
        }
    }

    /// Time elapsed since the clock's base.
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock()
    }

    /// The instant `offset` past the clock's base, without moving the clock.
    pub fn at(&self, offset: Duration) -> Instant {
        self.base + offset
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock()
    }
}
