//! Adaptive quality controller.
//!
//! Turns the measured excess delay into a bounded quality/resolution
//! parameter. This is a fixed-step integral controller, not PID: it
//! moves by one step per tick in either direction, giving slow, damped
//! convergence. Single-sample noise is already absorbed upstream by
//! the [`DelayEstimator`](crate::delay::DelayEstimator) moving average.

/// Bounded stepwise quality controller.
#[derive(Debug)]
pub struct QualityController {
    quality: f32,
    step: f32,
    threshold: f32,
    min: f32,
    max: f32,
}

impl QualityController {
    /// Create a controller starting at `initial`, clamped into `bounds`.
    pub fn new(initial: f32, step: f32, threshold: f32, bounds: (f32, f32)) -> Self {
        let (min, max) = bounds;
        Self {
            quality: initial.clamp(min, max),
            step,
            threshold,
            min,
            max,
        }
    }

    /// Apply one control tick for the given delay and return the
    /// adjusted quality.
    ///
    /// Delay at or above the threshold steps quality down; anything
    /// below steps it up. The result is clamped after every move.
    pub fn tick(&mut self, delay: f32) -> f32 {
        if delay >= self.threshold {
            self.quality -= self.step;
        } else {
            self.quality += self.step;
        }
        self.quality = self.quality.clamp(self.min, self.max);
        self.quality
    }

    /// Current quality value.
    pub fn quality(&self) -> f32 {
        self.quality
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sustained_delay_drives_quality_to_the_floor() {
        let mut ctl = QualityController::new(0.5, 0.05, 0.1, (0.1, 1.0));
        for _ in 0..10 {
            ctl.tick(0.2);
        }
        assert!((ctl.quality() - 0.1).abs() < 1e-6);
        // And no lower.
        ctl.tick(0.2);
        assert!(ctl.quality() >= 0.1);
    }

    #[test]
    fn zero_delay_drives_quality_to_the_ceiling() {
        let mut ctl = QualityController::new(0.5, 0.05, 0.1, (0.1, 1.0));
        for _ in 0..10 {
            ctl.tick(0.0);
        }
        assert!((ctl.quality() - 1.0).abs() < 1e-6);
        ctl.tick(0.0);
        assert!(ctl.quality() <= 1.0);
    }

    #[test]
    fn delay_exactly_at_threshold_steps_down() {
        let mut ctl = QualityController::new(0.5, 0.01, 0.1, (0.1, 1.0));
        let q = ctl.tick(0.1);
        assert!(q < 0.5);
    }

    #[test]
    fn initial_quality_is_clamped_into_bounds() {
        let ctl = QualityController::new(5.0, 0.01, 0.1, (0.1, 1.0));
        assert_eq!(ctl.quality(), 1.0);
    }
}
