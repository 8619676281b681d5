//! Turns raw stick axes into the drive command handed to the wheels.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::filter::{SlewRateLimiter, apply_deadband, square_magnitude};

/// Input-shaping parameters.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveConfig {
    /// Stick magnitudes below this read as zero.
    pub deadband: f64,
    /// Largest change per second of the forward and sideways outputs.
    pub slew_rate: f64,
    /// Control loop period (s).
    pub loop_period: f64,
}

impl Default for DriveConfig {
    fn default() -> Self {
        DriveConfig {
            deadband: 0.02,
            slew_rate: 1.0,
            loop_period: 0.02,
        }
    }
}

/// Normalised drive request: forward, left, and counter-clockwise, each
/// nominally in `[-1, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DriveCommand {
    /// Positive drives toward the robot's front.
    pub forward: f64,
    /// Positive strafes to the robot's left.
    pub sideways: f64,
    /// Positive turns counter-clockwise.
    pub rotate: f64,
}

impl DriveCommand {
    pub const fn new(forward: f64, sideways: f64, rotate: f64) -> Self {
        DriveCommand {
            forward,
            sideways,
            rotate,
        }
    }
}

/// Applies deadband to every axis, squares rotation, and slew-limits the
/// two translation axes. Rotation is never slew-limited.
#[derive(Debug, Clone)]
pub struct DriveCommandMapper {
    deadband: f64,
    forward: SlewRateLimiter,
    sideways: SlewRateLimiter,
}

impl DriveCommandMapper {
    /// A mapper at rest, using the configured deadband and slew rate.
    pub fn new(config: DriveConfig) -> Self {
        DriveCommandMapper {
            deadband: config.deadband,
            forward: SlewRateLimiter::new(config.slew_rate),
            sideways: SlewRateLimiter::new(config.slew_rate),
        }
    }

    /// Shapes one cycle of raw stick input; `dt` is the time since the last call.
    pub fn map(&mut self, forward: f64, sideways: f64, rotate: f64, dt: f64) -> DriveCommand {
        let forward = apply_deadband(forward, self.deadband);
        let sideways = apply_deadband(sideways, self.deadband);
        let rotate = apply_deadband(rotate, self.deadband);

        DriveCommand {
            forward: self.forward.calculate(forward, dt),
            sideways: self.sideways.calculate(sideways, dt),
            rotate: square_magnitude(rotate),
        }
    }

    /// Drops any ramp in progress, e.g. when the robot is disabled.
    pub fn reset(&mut self) {
        self.forward.reset(0.0);
        self.sideways.reset(0.0);
    }
}
