//! Delay estimator for adaptive quality control.
//!
//! Tracks the time each frame took to arrive over a bounded sliding
//! window and derives the current excess delay beyond the expected
//! per-frame cadence. The quality controller uses this to decide
//! whether to step the stream's resolution multiplier up or down.

use std::collections::VecDeque;

/// Number of samples kept by default.
pub const DEFAULT_WINDOW: usize = 10;

/// Upper clamp for the smoothed excess delay, in seconds.
pub const MAX_EXCESS_DELAY: f32 = 10.0;

/// Bounded sliding-window delay smoother.
///
/// Records per-frame elapsed times and reports their mean minus the
/// expected per-frame interval, so small jitter below the cadence
/// reads as zero rather than as latency.
#[derive(Debug)]
pub struct DelayEstimator {
    samples: VecDeque<f32>,
    capacity: usize,
}

impl DelayEstimator {
    /// Create an estimator with the default 10-sample window.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_WINDOW)
    }

    /// Create an estimator with a custom window size (at least 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest once past capacity.
    pub fn push(&mut self, sample: f32) {
        self.samples.push_back(sample);
        if self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    /// Arithmetic mean of the current window, `0.0` when empty.
    pub fn average(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f32>() / self.samples.len() as f32
    }

    /// Push `raw_elapsed`, then report the window average minus
    /// `reference_interval`, clamped to `[0, 10]` seconds.
    ///
    /// `reference_interval` is the expected time between frames —
    /// the peer's reported send interval when available, otherwise
    /// the configured cadence default.
    pub fn smoothed_delay(&mut self, raw_elapsed: f32, reference_interval: f32) -> f32 {
        self.push(raw_elapsed);
        (self.average() - reference_interval).clamp(0.0, MAX_EXCESS_DELAY)
    }

    /// Number of samples currently in the window.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl Default for DelayEstimator {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ────────────────────────────────────────────────────────
