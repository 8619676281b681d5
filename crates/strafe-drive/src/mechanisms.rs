//! Shooter hood and turret.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::DriveError;
use crate::pid::{PidController, PidGains};
use crate::traits::{PositionSensor, SpeedActuator};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoodConfig {
    pub pid: PidGains,
    /// Hood position error, in motor rotations, counted as on target.
    pub tolerance: f64,
}

impl Default for HoodConfig {
    fn default() -> Self {
        HoodConfig {
            pid: PidGains::new(1.0, 0.0, 0.0),
            tolerance: 0.05,
        }
    }
}

/// Adjustable shooter hood plus the flywheel it aims.
///
/// The hood runs either manually (`open`, `close`, `stop`) or closed-loop
/// toward a setpoint. Closed-loop mode ends by itself once the hood is on
/// target, and any manual command cancels it.
#[derive(Debug)]
pub struct Hood<A, S> {
    hood_motor: A,
    hood_encoder: S,
    shooter: A,
    controller: PidController,
    auto: bool,
}

impl<A: SpeedActuator, S: PositionSensor> Hood<A, S> {
    pub fn new(hood_motor: A, hood_encoder: S, shooter: A, config: HoodConfig) -> Self {
        Hood {
            hood_motor,
            hood_encoder,
            shooter,
            controller: PidController::new(config.pid)
                .with_tolerance(config.tolerance)
                .with_output_limit(1.0),
            auto: false,
        }
    }

    /// Raise the hood: steeper, shorter shots.
    pub fn open(&mut self) -> Result<(), DriveError> {
        self.manual(1.0)
    }

    /// Lower the hood: flatter, longer shots.
    pub fn close(&mut self) -> Result<(), DriveError> {
        self.manual(-1.0)
    }

    pub fn stop(&mut self) -> Result<(), DriveError> {
        self.auto = false;
        self.hood_motor
            .stop()
            .map_err(|e| DriveError::mechanism("hood", e))
    }

    pub fn shoot(&mut self) -> Result<(), DriveError> {
        self.shooter
            .set_speed(1.0)
            .map_err(|e| DriveError::mechanism("shooter", e))
    }

    pub fn stop_shooter(&mut self) -> Result<(), DriveError> {
        self.shooter
            .stop()
            .map_err(|e| DriveError::mechanism("shooter", e))
    }

    /// Drive the hood to `setpoint` (motor rotations) on subsequent
    /// [`Hood::periodic`] calls.
    pub fn set_setpoint(&mut self, setpoint: f64) {
        self.controller.set_setpoint(setpoint);
        self.controller.reset();
        self.auto = true;
    }

    pub fn setpoint(&self) -> f64 {
        self.controller.setpoint()
    }

    /// `true` while moving toward a setpoint.
    pub fn is_auto(&self) -> bool {
        self.auto
    }

    pub fn position(&mut self) -> Result<f64, DriveError> {
        self.hood_encoder
            .position()
            .map_err(|e| DriveError::mechanism("hood encoder", e))
    }

    pub fn periodic(&mut self, dt: f64) -> Result<(), DriveError> {
        if !self.auto {
            return Ok(());
        }
        let measurement = self.position()?;
        let output = self.controller.calculate(measurement, dt);
        if self.controller.at_setpoint() {
            debug!(setpoint = self.controller.setpoint(), measurement, "hood on target");
            return self.stop();
        }
        self.hood_motor
            .set_speed(output)
            .map_err(|e| DriveError::mechanism("hood", e))
    }

    fn manual(&mut self, speed: f64) -> Result<(), DriveError> {
        self.auto = false;
        self.hood_motor
            .set_speed(speed)
            .map_err(|e| DriveError::mechanism("hood", e))
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TurretConfig {
    pub pid: PidGains,
    /// Angle range treated as continuous (deg).
    pub continuous_min: f64,
    pub continuous_max: f64,
    /// Turret degrees per motor rotation.
    pub degrees_per_rotation: f64,
}

impl Default for TurretConfig {
    fn default() -> Self {
        TurretConfig {
            pid: PidGains::new(0.02, 0.0, 0.0),
            continuous_min: -180.0,
            continuous_max: 180.0,
            degrees_per_rotation: 3.6,
        }
    }
}

/// Rotating turret holding an angle in degrees, or turned by hand.
#[derive(Debug)]
pub struct Turret<A, S> {
    motor: A,
    encoder: S,
    controller: PidController,
    degrees_per_rotation: f64,
    holding: bool,
}

impl<A: SpeedActuator, S: PositionSensor> Turret<A, S> {
    /// # Errors
    ///
    /// Returns `Err(DriveError::InvalidConfig)` for a zero or non-finite gear factor.
    pub fn new(motor: A, encoder: S, config: TurretConfig) -> Result<Self, DriveError> {
        if !(config.degrees_per_rotation.is_finite() && config.degrees_per_rotation != 0.0) {
            return Err(DriveError::InvalidConfig(
                "turret degrees per rotation must be finite and non-zero",
            ));
        }
        Ok(Turret {
            motor,
            encoder,
            controller: PidController::new(config.pid)
                .with_continuous_input(config.continuous_min, config.continuous_max)
                .with_tolerance(1.0)
                .with_output_limit(1.0),
            degrees_per_rotation: config.degrees_per_rotation,
            holding: false,
        })
    }

    /// Hold `angle` degrees from now on.
    pub fn set_position(&mut self, angle: f64) {
        self.controller.set_setpoint(angle);
        self.controller.reset();
        self.holding = true;
    }

    pub fn target(&self) -> f64 {
        self.controller.setpoint()
    }

    /// Measured angle in degrees.
    pub fn position(&mut self) -> Result<f64, DriveError> {
        let rotations = self
            .encoder
            .position()
            .map_err(|e| DriveError::mechanism("turret encoder", e))?;
        Ok(rotations * self.degrees_per_rotation)
    }

    /// Turn at `speed` by hand, releasing any held angle.
    pub fn rotate(&mut self, speed: f64) -> Result<(), DriveError> {
        self.holding = false;
        self.motor
            .set_speed(speed)
            .map_err(|e| DriveError::mechanism("turret", e))
    }

    pub fn stop(&mut self) -> Result<(), DriveError> {
        self.holding = false;
        self.motor
            .stop()
            .map_err(|e| DriveError::mechanism("turret", e))
    }

    pub fn periodic(&mut self, dt: f64) -> Result<(), DriveError> {
        if !self.holding {
            return Ok(());
        }
        let angle = self.position()?;
        let output = self.controller.calculate(angle, dt);
        self.motor
            .set_speed(output)
            .map_err(|e| DriveError::mechanism("turret", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivetrain::tests::{FakeEncoder, FakeMotor};
    const EPSILON: f64 = 1e-9;

    fn hood() -> (Hood<FakeMotor, FakeEncoder>, FakeMotor, FakeEncoder, FakeMotor) {
        let motor = FakeMotor::default();
        let encoder = FakeEncoder::default();
        let shooter = FakeMotor::default();
        let hood = Hood::new(motor.clone(), encoder.clone(), shooter.clone(), HoodConfig::default());
        (hood, motor, encoder, shooter)
    }

    #[test]
    fn test_hood_manual_commands() {
        let (mut hood, motor, _, shooter) = hood();
        hood.open().unwrap();
        assert_eq!(motor.speed.get(), 1.0);
        hood.close().unwrap();
        assert_eq!(motor.speed.get(), -1.0);
        hood.stop().unwrap();
        assert_eq!(motor.speed.get(), 0.0);

        hood.shoot().unwrap();
        assert_eq!(shooter.speed.get(), 1.0);
        hood.stop_shooter().unwrap();
        assert_eq!(shooter.speed.get(), 0.0);
    }

    #[test]
    fn test_hood_setpoint_drives_then_disengages() {
        let (mut hood, motor, encoder, _) = hood();
        hood.set_setpoint(0.5);
        assert!(hood.is_auto());

        hood.periodic(0.02).unwrap();
        assert!((motor.speed.get() - 0.5).abs() < EPSILON);

        encoder.rotations.set(0.48);
        hood.periodic(0.02).unwrap();
        assert!(!hood.is_auto());
        assert_eq!(motor.speed.get(), 0.0);

        // Once disengaged, periodic leaves the motor alone.
        encoder.rotations.set(0.0);
        hood.periodic(0.02).unwrap();
        assert_eq!(motor.speed.get(), 0.0);
    }

    #[test]
    fn test_manual_command_cancels_setpoint() {
        let (mut hood, motor, _, _) = hood();
        hood.set_setpoint(2.0);
        hood.close().unwrap();
        assert!(!hood.is_auto());
        hood.periodic(0.02).unwrap();
        assert_eq!(motor.speed.get(), -1.0);
    }

    #[test]
    fn test_turret_holds_angle_the_short_way() {
        let motor = FakeMotor::default();
        let encoder = FakeEncoder::default();
        let mut turret = Turret::new(motor.clone(), encoder.clone(), TurretConfig::default()).unwrap();

        // 50 rotations * 3.6 = 180 degrees.
        encoder.rotations.set(50.0);
        turret.set_position(-170.0);
        turret.periodic(0.02).unwrap();
        // 10 degrees away through the wrap, so a small positive push.
        assert!((motor.speed.get() - 0.2).abs() < EPSILON);
        assert!((turret.position().unwrap() - 180.0).abs() < EPSILON);
    }

    #[test]
    fn test_turret_manual_releases_hold() {
        let motor = FakeMotor::default();
        let mut turret =
            Turret::new(motor.clone(), FakeEncoder::default(), TurretConfig::default()).unwrap();
        turret.set_position(90.0);
        turret.rotate(-0.3).unwrap();
        turret.periodic(0.02).unwrap();
        assert_eq!(motor.speed.get(), -0.3);
        turret.stop().unwrap();
        assert_eq!(motor.speed.get(), 0.0);
        assert!((turret.target() - 90.0).abs() < EPSILON);
    }

    #[test]
    fn test_turret_rejects_zero_gearing() {
        let config = TurretConfig {
            degrees_per_rotation: 0.0,
            ..TurretConfig::default()
        };
        assert!(matches!(
            Turret::new(FakeMotor::default(), FakeEncoder::default(), config),
            Err(DriveError::InvalidConfig(_))
        ));
    }
}
