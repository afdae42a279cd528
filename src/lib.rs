//! Slidegate - Per-Key Sliding-Window Rate Limiting
//!
//! This crate implements an in-process rate limiter that admits at most
//! `max_requests` requests per key within any trailing window of
//! `window_size`. The core limiter is single-owner; `SharedLimiter` and
//! `ShardedLimiter` make it safe to share across threads.

pub mod config;
pub mod error;
pub mod ratelimit;

pub use crate::config::{LimiterConfig, LockingStrategy};
pub use error::{Result, SlidegateError};
pub use ratelimit::{
    AdmissionControl, Clock, ManualClock, ShardedLimiter, SharedLimiter, SlidingWindowLimiter,
    SystemClock,
};
