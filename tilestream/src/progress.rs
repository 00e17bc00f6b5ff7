//! Progress reporting for long tile drives.
//!
//! Long-running consumers (histogram passes, export drives) report
//! through a caller-supplied [`ProgressCallback`] in percent, backed by a
//! [`ProgressTracker`] whose counters are plain atomics so concurrent
//! stripes can share one tracker without locks.

use std::sync::atomic::{AtomicU64, Ordering};

/// Receives progress in percent (0.0 to 100.0).
///
/// Callbacks are invoked from whichever thread drives the work, so they
/// must be `Send + Sync`; keep them cheap.
pub type ProgressCallback = Box<dyn Fn(f64) + Send + Sync>;

/// Work-unit counters behind a pair of atomics.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    done: AtomicU64,
    total: AtomicU64,
}

impl ProgressTracker {
    /// Creates a tracker with no work registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets to `total` expected units with none done.
    pub fn reset(&self, total: u64) {
        self.total.store(total, Ordering::Relaxed);
        self.done.store(0, Ordering::Relaxed);
    }

    /// Adds `n` expected units.
    pub fn add_total(&self, n: u64) {
        self.total.fetch_add(n, Ordering::Relaxed);
    }

    /// Marks `n` units finished and returns the new completion percent.
    pub fn advance(&self, n: u64) -> f64 {
        self.done.fetch_add(n, Ordering::Relaxed);
        self.percent()
    }

    /// Units finished so far.
    pub fn done(&self) -> u64 {
        self.done.load(Ordering::Relaxed)
    }

    /// Units expected in total.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Completion in percent, clamped to 100; an empty tracker reads 100.
    pub fn percent(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 100.0;
        }
        let done = self.done().min(total);
        done as f64 / total as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_progression() {
        let tracker = ProgressTracker::new();
        tracker.reset(4);
        assert_eq!(tracker.percent(), 0.0);
        assert_eq!(tracker.advance(1), 25.0);
        assert_eq!(tracker.advance(2), 75.0);
        assert_eq!(tracker.advance(1), 100.0);
    }

    #[test]
    fn test_overshoot_clamps() {
        let tracker = ProgressTracker::new();
        tracker.reset(2);
        tracker.advance(5);
        assert_eq!(tracker.percent(), 100.0);
    }

    #[test]
    fn test_empty_total_reads_complete() {
        let tracker = ProgressTracker::new();
        assert_eq!(tracker.percent(), 100.0);
    }

    #[test]
    fn test_reset_clears_done() {
        let tracker = ProgressTracker::new();
        tracker.reset(2);
        tracker.advance(2);
        tracker.reset(10);
        assert_eq!(tracker.done(), 0);
        assert_eq!(tracker.total(), 10);
        assert_eq!(tracker.percent(), 0.0);
    }
}
