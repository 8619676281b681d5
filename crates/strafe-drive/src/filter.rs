//! Driver input shaping.

/// Zeroes `value` when its magnitude is below `threshold`. Values at or above
/// the threshold pass through untouched.
pub fn apply_deadband(value: f64, threshold: f64) -> f64 {
    if value.abs() < threshold { 0.0 } else { value }
}

/// Squares the magnitude and keeps the sign, for finer control near zero.
pub fn square_magnitude(value: f64) -> f64 {
    value * value.abs()
}

/// Bounds how fast a signal may change, in units per second.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlewRateLimiter {
    rate: f64,
    previous: f64,
}

impl SlewRateLimiter {
    /// A limiter starting from zero. `rate` is the largest allowed change per
    /// second in either direction.
    pub fn new(rate: f64) -> Self {
        SlewRateLimiter {
            rate: rate.abs(),
            previous: 0.0,
        }
    }

    /// Moves toward `input` by at most `rate * dt` and returns the new output.
    pub fn calculate(&mut self, input: f64, dt: f64) -> f64 {
        let max_step = self.rate * dt.max(0.0);
        self.previous += (input - self.previous).clamp(-max_step, max_step);
        self.previous
    }

    /// Jumps the output to `value` without limiting.
    pub fn reset(&mut self, value: f64) {
        self.previous = value;
    }

    /// The last output.
    pub fn last(&self) -> f64 {
        self.previous
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_deadband_threshold() {
        assert_eq!(apply_deadband(0.019, 0.02), 0.0);
        assert_eq!(apply_deadband(-0.019, 0.02), 0.0);
        assert!((apply_deadband(0.021, 0.02) - 0.021).abs() < EPSILON);
        assert!((apply_deadband(-0.5, 0.02) - -0.5).abs() < EPSILON);
    }

    #[test]
    fn test_square_keeps_sign() {
        assert!((square_magnitude(0.5) - 0.25).abs() < EPSILON);
        assert!((square_magnitude(-0.5) - -0.25).abs() < EPSILON);
        assert_eq!(square_magnitude(0.0), 0.0);
        assert!((square_magnitude(-1.0) - -1.0).abs() < EPSILON);
    }

    #[test]
    fn test_slew_one_cycle() {
        let mut limiter = SlewRateLimiter::new(1.0);
        let output = limiter.calculate(1.0, 0.02);
        assert!((output - 0.02).abs() < EPSILON);
    }

    #[test]
    fn test_slew_reaches_target_and_reverses() {
        let mut limiter = SlewRateLimiter::new(2.0);
        for _ in 0..10 {
            limiter.calculate(1.0, 0.1);
        }
        assert!((limiter.last() - 1.0).abs() < EPSILON);

        let output = limiter.calculate(-1.0, 0.1);
        assert!((output - 0.8).abs() < EPSILON);
    }

    #[test]
    fn test_slew_reset() {
        let mut limiter = SlewRateLimiter::new(1.0);
        limiter.reset(0.7);
        assert!((limiter.calculate(0.7, 0.02) - 0.7).abs() < EPSILON);
        // Negative dt never moves the output.
        assert!((limiter.calculate(0.0, -1.0) - 0.7).abs() < EPSILON);
    }
}
