//! # Per-model latency tracking
//!
//! ## Responsibility
//! Maintain an exponentially-weighted moving average of response latency per
//! model, plus the warm-up flag that gates latency-based routing decisions.
//!
//! ## Guarantees
//! - Thread-safe: observations from concurrent request-completion paths
//!   compose correctly under the per-tracker lock.
//! - `value()` before the first sample returns 0.0 and never panics.
//! - `sample_count()` is monotonically non-decreasing, so `warmed_up()` is
//!   monotone: once true it stays true.
//!
//! ## NOT Responsible For
//! - Deciding *when* latency is observed (see `router`)
//! - Schedule expiry for re-probing (see `routing::least_latency`)

use std::sync::Mutex;
use std::time::Duration;

/// EWMA latency tracker.
///
/// `avg ← decay·avg + (1−decay)·sample` after each observation, or `sample`
/// on the first. A decay of 0.06 weights roughly the last ~30 samples.
#[derive(Debug)]
pub struct LatencyTracker {
    warmup_threshold: u32,
    decay: f64,
    state: Mutex<TrackerState>,
}

#[derive(Debug, Default)]
struct TrackerState {
    avg_ms: f64,
    samples: u64,
}

impl LatencyTracker {
    /// Create a tracker.
    ///
    /// # Arguments
    ///
    /// * `warmup_threshold` — samples required before `warmed_up()` is true.
    /// * `decay` — EWMA decay factor, in (0, 1). Validated at config load.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn new(warmup_threshold: u32, decay: f64) -> Self {
        Self {
            warmup_threshold,
            decay,
            state: Mutex::new(TrackerState::default()),
        }
    }

    /// Fold one latency sample into the average and bump the sample count.
    ///
    /// # Panics
    ///
    /// This function never panics; a poisoned lock is recovered.
    pub fn observe(&self, sample: Duration) {
        let sample_ms = sample.as_secs_f64() * 1000.0;
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.samples == 0 {
            state.avg_ms = sample_ms;
        } else {
            state.avg_ms = self.decay * state.avg_ms + (1.0 - self.decay) * sample_ms;
        }
        state.samples += 1;
    }

    /// Current EWMA in milliseconds. 0.0 before the first sample.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn value(&self) -> f64 {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .avg_ms
    }

    /// True once enough samples have been observed.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn warmed_up(&self) -> bool {
        self.sample_count() >= u64::from(self.warmup_threshold)
    }

    /// Number of samples observed so far.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn sample_count(&self) -> u64 {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .samples
    }
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    // -- value -----------------------------------------------------------

    #[test]
    fn test_value_before_first_sample_is_zero() {
        let tracker = LatencyTracker::new(3, 0.06);
        assert_eq!(tracker.value(), 0.0);
    }

    #[test]
    fn test_first_sample_sets_average_directly() {
        let tracker = LatencyTracker::new(3, 0.06);
        tracker.observe(Duration::from_millis(100));
        assert!((tracker.value() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_ewma_folds_subsequent_samples() {
        let tracker = LatencyTracker::new(3, 0.5);
        tracker.observe(Duration::from_millis(100));
        tracker.observe(Duration::from_millis(200));
        // 0.5 * 100 + 0.5 * 200 = 150
        assert!((tracker.value() - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_low_decay_weighs_recent_samples_heavily() {
        let tracker = LatencyTracker::new(1, 0.06);
        tracker.observe(Duration::from_millis(1000));
        tracker.observe(Duration::from_millis(10));
        // 0.06 * 1000 + 0.94 * 10 = 69.4 — close to the recent sample
        assert!(tracker.value() < 100.0);
    }

    // -- warm-up ---------------------------------------------------------

    #[test]
    fn test_warmed_up_flips_at_threshold() {
        let tracker = LatencyTracker::new(3, 0.06);
        assert!(!tracker.warmed_up());
        tracker.observe(Duration::from_millis(10));
        tracker.observe(Duration::from_millis(10));
        assert!(!tracker.warmed_up());
        tracker.observe(Duration::from_millis(10));
        assert!(tracker.warmed_up());
    }

    #[test]
    fn test_warmed_up_is_monotone() {
        let tracker = LatencyTracker::new(1, 0.06);
        tracker.observe(Duration::from_millis(5));
        for _ in 0..10 {
            tracker.observe(Duration::from_millis(5));
            assert!(tracker.warmed_up(), "warmed_up must never revert to false");
        }
    }

    #[test]
    fn test_sample_count_increments_per_observation() {
        let tracker = LatencyTracker::new(3, 0.06);
        for expected in 1..=5 {
            tracker.observe(Duration::from_millis(1));
            assert_eq!(tracker.sample_count(), expected);
        }
    }

    // -- concurrency -----------------------------------------------------

    #[test]
    fn test_concurrent_observations_all_counted() {
        let tracker = Arc::new(LatencyTracker::new(3, 0.06));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let t = Arc::clone(&tracker);
            handles.push(std::thread::spawn(move || {
                for _ in 0..100 {
                    t.observe(Duration::from_millis(10));
                }
            }));
        }
        for h in handles {
            h.join().expect("test: thread join");
        }
        assert_eq!(tracker.sample_count(), 800);
        // All samples identical, so the EWMA is exactly that value.
        assert!((tracker.value() - 10.0).abs() < 1e-6);
    }
}
