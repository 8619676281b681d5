#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Proportional, integral and derivative gains.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl PidGains {
    pub const fn new(kp: f64, ki: f64, kd: f64) -> Self {
        PidGains { kp, ki, kd }
    }
}

/// Single-loop PID controller with a fixed setpoint.
///
/// Built with chained `with_*` calls:
///
/// ```
/// use strafe_drive::{PidController, PidGains};
///
/// let mut turret = PidController::new(PidGains::new(0.02, 0.0, 0.001))
///     .with_continuous_input(-180.0, 180.0)
///     .with_tolerance(1.0)
///     .with_output_limit(1.0);
/// turret.set_setpoint(170.0);
/// // -170 is 20 degrees away going through 180, so drive negative.
/// assert!(turret.calculate(-170.0, 0.02) < 0.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidController {
    gains: PidGains,
    setpoint: f64,
    tolerance: f64,
    continuous: Option<(f64, f64)>,
    output_limit: Option<f64>,
    integral: f64,
    prev_error: Option<f64>,
}

impl PidController {
    pub fn new(gains: PidGains) -> Self {
        PidController {
            gains,
            setpoint: 0.0,
            tolerance: 0.05,
            continuous: None,
            output_limit: None,
            integral: 0.0,
            prev_error: None,
        }
    }

    /// Error magnitude at or below which [`PidController::at_setpoint`] holds.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance.abs();
        self
    }

    /// Treat `min` and `max` as the same point, so the error always takes
    /// the shorter way round.
    pub fn with_continuous_input(mut self, min: f64, max: f64) -> Self {
        self.continuous = Some((min.min(max), min.max(max)));
        self
    }

    /// Clamp the output, and the integral term, to `[-limit, limit]`.
    pub fn with_output_limit(mut self, limit: f64) -> Self {
        self.output_limit = Some(limit.abs());
        self
    }

    pub fn gains(&self) -> PidGains {
        self.gains
    }

    /// Replace the gains and clear accumulated state.
    pub fn set_gains(&mut self, gains: PidGains) {
        self.gains = gains;
        self.reset();
    }

    pub fn setpoint(&self) -> f64 {
        self.setpoint
    }

    pub fn set_setpoint(&mut self, setpoint: f64) {
        self.setpoint = setpoint;
    }

    /// Error from the last [`PidController::calculate`], if any.
    pub fn error(&self) -> Option<f64> {
        self.prev_error
    }

    /// `true` once a measurement has been seen and its error is within tolerance.
    pub fn at_setpoint(&self) -> bool {
        self.prev_error
            .is_some_and(|error| error.abs() <= self.tolerance)
    }

    /// Computes the output for `measurement` taken `dt` seconds after the
    /// previous one.
    pub fn calculate(&mut self, measurement: f64, dt: f64) -> f64 {
        let error = match self.continuous {
            Some((min, max)) => wrap(self.setpoint - measurement, max - min),
            None => self.setpoint - measurement,
        };

        let derivative = match self.prev_error {
            Some(prev) if dt > 0.0 => (error - prev) / dt,
            _ => 0.0,
        };
        self.prev_error = Some(error);

        if dt > 0.0 {
            self.integral += error * dt;
        }
        if let Some(limit) = self.output_limit.filter(|_| self.gains.ki != 0.0) {
            let bound = limit / self.gains.ki.abs();
            self.integral = self.integral.clamp(-bound, bound);
        }

        let output = self.gains.kp * error + self.gains.ki * self.integral + self.gains.kd * derivative;
        match self.output_limit {
            Some(limit) => output.clamp(-limit, limit),
            None => output,
        }
    }

    /// Clears the integral and derivative history. Setpoint and gains stay.
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_error = None;
    }
}

/// Wraps `error` into `[-period / 2, period / 2)`.
fn wrap(error: f64, period: f64) -> f64 {
    if period <= 0.0 {
        return error;
    }
    let half = period / 2.0;
    (error + half).rem_euclid(period) - half
}
