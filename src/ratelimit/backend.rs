//! Admission trait for abstracting the thread-safe limiter implementations.

use std::time::Duration;

/// Trait for limiters that can be shared across threads.
///
/// This trait abstracts over [`SharedLimiter`] and [`ShardedLimiter`] so
/// callers can pick a locking strategy from configuration. Implementations
/// must make the check-and-record in [`record_send`](Self::record_send)
/// atomic per key.
///
/// [`SharedLimiter`]: super::SharedLimiter
/// [`ShardedLimiter`]: super::ShardedLimiter
pub trait AdmissionControl: Send + Sync {
    /// Whether a request for `key` would be admitted now.
    fn can_send(&self, key: &str) -> bool;

    /// Admit and record a request for `key` if the window allows it.
    fn record_send(&self, key: &str) -> bool;

    /// How long until a request for `key` would be admitted.
    fn time_until_next_allowed(&self, key: &str) -> Duration;

    /// Get the number of keys with admission history.
    fn tracked_keys(&self) -> usize;
}
