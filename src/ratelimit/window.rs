//! Per-key record of admission timestamps.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Admission timestamps for a single key, oldest at the front.
///
/// Timestamps are appended in the order they are read from the clock, so the
/// sequence is non-decreasing.
#[derive(Debug, Clone, Default)]
pub struct KeyWindow {
    entries: VecDeque<Instant>,
}

impl KeyWindow {
    /// Create a window holding a single admission.
    pub fn starting_at(now: Instant) -> Self {
        let mut entries = VecDeque::with_capacity(1);
        entries.push_back(now);
        Self { entries }
    }

    /// Drop every entry older than `window_size` relative to `now`.
    ///
    /// An entry exactly `window_size` old is kept. Returns the number of
    /// entries removed.
    pub fn expire(&mut self, now: Instant, window_size: Duration) -> usize {
        let mut removed = 0;
        while let Some(&front) = self.entries.front() {
            if now.saturating_duration_since(front) > window_size {
                self.entries.pop_front();
                removed += 1;
            } else {
                break;
            }
        }
        removed
    }

    /// Record an admission at `now`.
    ///
    /// A reading older than the newest entry is recorded at the newest entry's
    /// time, keeping the sequence non-decreasing.
    pub fn record(&mut self, now: Instant) {
        let at = match self.entries.back() {
            Some(&newest) if newest > now => newest,
            _ => now,
        };
        self.entries.push_back(at);
    }

    /// Whether another admission fits under `max_requests`.
    pub fn has_capacity(&self, max_requests: u32) -> bool {
        self.entries.len() < max_requests as usize
    }

    /// Time until the oldest entry leaves the window.
    ///
    /// Zero for an empty window.
    pub fn time_until_oldest_expires(&self, now: Instant, window_size: Duration) -> Duration {
        match self.entries.front() {
            Some(&oldest) => window_size.saturating_sub(now.saturating_duration_since(oldest)),
            None => Duration::ZERO,
        }
    }

    /// Oldest admission still tracked.
    pub fn oldest(&self) -> Option<Instant> {
        self.entries.front().copied()
    }

    /// Number of tracked admissions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no admissions are tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
