//! Static bias tracker
//!
//! Follows the slowly drifting offset of each axis (gravity dominates the
//! vertical axis) with an exponential moving average so it can be removed
//! before spectral analysis.

/// Standard gravity in m/s²
pub const STANDARD_GRAVITY: f32 = 9.81;

/// Smoothing coefficient; small so the estimate drifts very slowly
pub const BIAS_ALPHA: f32 = 0.01;

/// Per-axis exponential moving average of the averaged accelerometer signal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiasTracker {
    /// Current estimate (x, y, z)
    bias: [f32; 3],

    /// Smoothing coefficient
    alpha: f32,
}

impl BiasTracker {
    /// Tracker for a level-mounted sensor: starts at (0, 0, g)
    ///
    /// A different mounting still converges to the true bias after a few
    /// thousand updates.
    pub fn new() -> Self {
        Self::with_initial([0.0, 0.0, STANDARD_GRAVITY])
    }

    pub fn with_initial(bias: [f32; 3]) -> Self {
        Self {
            bias,
            alpha: BIAS_ALPHA,
        }
    }

    /// Fold one averaged sample into the estimate and return the new bias
    ///
    /// bias = alpha * avg + (1 - alpha) * bias
    pub fn update(&mut self, avg: [f32; 3]) -> [f32; 3] {
        for (bias, value) in self.bias.iter_mut().zip(avg) {
            *bias = self.alpha * value + (1.0 - self.alpha) * *bias;
        }
        self.bias
    }

    /// Subtract the current estimate from a sample
    pub fn remove(&self, sample: [f32; 3]) -> [f32; 3] {
        [
            sample[0] - self.bias[0],
            sample[1] - self.bias[1],
            sample[2] - self.bias[2],
        ]
    }

    pub fn bias(&self) -> [f32; 3] {
        self.bias
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }
}

impl Default for BiasTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_estimate_is_gravity() {
        let tracker = BiasTracker::new();
        assert_eq!(tracker.bias(), [0.0, 0.0, STANDARD_GRAVITY]);
        assert_eq!(tracker.alpha(), 0.01);
    }

    #[test]
    fn test_single_update() {
        let mut tracker = BiasTracker::with_initial([0.0, 0.0, 0.0]);
        let bias = tracker.update([1.0, -2.0, 10.0]);

        assert!((bias[0] - 0.01).abs() < 1e-7);
        assert!((bias[1] + 0.02).abs() < 1e-7);
        assert!((bias[2] - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_converges_monotonically() {
        let target = [0.0, 0.0, STANDARD_GRAVITY];
        let mut tracker = BiasTracker::with_initial([3.0, -4.0, 0.0]);

        let mut last_error: Vec<f32> = (0..3)
            .map(|i| (tracker.bias()[i] - target[i]).abs())
            .collect();

        for _ in 0..460 {
            tracker.update(target);
            for i in 0..3 {
                let error = (tracker.bias()[i] - target[i]).abs();
                assert!(error <= last_error[i]);
                last_error[i] = error;
            }
        }

        // 0.99^460 < 0.01: within 1% of the starting offset
        assert!(last_error[0] < 0.03);
        assert!(last_error[1] < 0.04);
        assert!(last_error[2] < 0.0981);
    }

    #[test]
    fn test_remove_bias() {
        let tracker = BiasTracker::new();
        let debiased = tracker.remove([0.5, -0.5, STANDARD_GRAVITY + 1.0]);

        assert_eq!(debiased[0], 0.5);
        assert_eq!(debiased[1], -0.5);
        assert!((debiased[2] - 1.0).abs() < 1e-6);
    }
}
