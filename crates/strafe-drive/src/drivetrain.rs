//! The four-wheel mecanum drivetrain subsystem.

use std::f64::consts::PI;

use strafe_kinematics::{ChassisSpeeds, MecanumDrive, WheelPositions, WheelSpeeds};
use tracing::warn;

use crate::error::{DriveError, Wheel};
use crate::mapper::DriveCommand;
use crate::traits::{PositionSensor, SpeedActuator};

/// Meters traveled per motor rotation for a wheel of `wheel_diameter`
/// meters behind a `gear_ratio`:1 reduction.
pub fn meters_per_rotation(wheel_diameter: f64, gear_ratio: f64) -> f64 {
    wheel_diameter * PI / gear_ratio
}

/// Owns the four wheel motors and their encoders.
///
/// Motors and encoders are given in front-left, front-right, rear-left,
/// rear-right order.
#[derive(Debug)]
pub struct MecanumDrivetrain<A, S> {
    motors: [A; 4],
    encoders: [S; 4],
    kinematics: MecanumDrive,
    meters_per_rotation: f64,
    last_output: WheelSpeeds,
}

impl<A: SpeedActuator, S: PositionSensor> MecanumDrivetrain<A, S> {
    /// # Errors
    ///
    /// Returns `Err(DriveError::InvalidConfig)` if `meters_per_rotation` is not positive and finite.
    pub fn new(
        motors: [A; 4],
        encoders: [S; 4],
        kinematics: MecanumDrive,
        meters_per_rotation: f64,
    ) -> Result<Self, DriveError> {
        if !(meters_per_rotation.is_finite() && meters_per_rotation > 0.0) {
            return Err(DriveError::InvalidConfig(
                "meters per rotation must be positive and finite",
            ));
        }
        Ok(MecanumDrivetrain {
            motors,
            encoders,
            kinematics,
            meters_per_rotation,
            last_output: WheelSpeeds::default(),
        })
    }

    pub fn kinematics(&self) -> &MecanumDrive {
        &self.kinematics
    }

    /// The normalised outputs most recently written to the motors.
    pub fn last_output(&self) -> WheelSpeeds {
        self.last_output
    }

    /// Open-loop drive from a normalised command. Each wheel gets the sum of
    /// the three axes with mecanum signs; if any wheel would exceed 1 all four
    /// are scaled down together so the direction of travel is kept.
    pub fn drive_cartesian(&mut self, command: DriveCommand) -> Result<WheelSpeeds, DriveError> {
        let DriveCommand {
            forward,
            sideways,
            rotate,
        } = command;
        let mix = WheelSpeeds::new(
            forward - sideways - rotate,
            forward + sideways + rotate,
            forward + sideways - rotate,
            forward - sideways + rotate,
        );
        self.write(mix.desaturate(1.0))
    }

    /// Open-loop drive from chassis speeds through the kinematics model.
    /// Wheel speeds are divided by `max_linear_speed` and desaturated into
    /// `[-1, 1]`.
    pub fn drive_chassis(
        &mut self,
        speeds: ChassisSpeeds,
        max_linear_speed: f64,
    ) -> Result<WheelSpeeds, DriveError> {
        if !(max_linear_speed.is_finite() && max_linear_speed > 0.0) {
            return Err(DriveError::InvalidConfig(
                "max linear speed must be positive and finite",
            ));
        }
        let wheels = self.kinematics.to_wheel_speeds(speeds);
        let normalised = WheelSpeeds::from_array(wheels.as_array().map(|w| w / max_linear_speed));
        self.write(normalised.desaturate(1.0))
    }

    /// Reads all four encoders, converted to meters traveled.
    pub fn wheel_positions(&mut self) -> Result<WheelPositions, DriveError> {
        let mut rotations = [0.0; 4];
        for ((encoder, wheel), rotation) in self.encoders.iter_mut().zip(Wheel::ALL).zip(&mut rotations) {
            *rotation = encoder
                .position()
                .map_err(|e| DriveError::encoder(wheel, e))?;
        }
        Ok(WheelPositions::from_rotations(rotations, self.meters_per_rotation))
    }

    /// Zeroes all four encoders.
    pub fn reset_encoders(&mut self) -> Result<(), DriveError> {
        for (encoder, wheel) in self.encoders.iter_mut().zip(Wheel::ALL) {
            encoder.reset().map_err(|e| DriveError::encoder(wheel, e))?;
        }
        Ok(())
    }

    /// Stops every motor. All four are attempted even if one fails; the
    /// first failure is returned.
    pub fn stop(&mut self) -> Result<(), DriveError> {
        let mut first_error = None;
        for (motor, wheel) in self.motors.iter_mut().zip(Wheel::ALL) {
            if let Err(e) = motor.stop() {
                warn!(%wheel, error = %e, "failed to stop motor");
                first_error.get_or_insert(DriveError::actuator(wheel, e));
            }
        }
        self.last_output = WheelSpeeds::default();
        first_error.map_or(Ok(()), Err)
    }

    fn write(&mut self, speeds: WheelSpeeds) -> Result<WheelSpeeds, DriveError> {
        for ((motor, wheel), speed) in self
            .motors
            .iter_mut()
            .zip(Wheel::ALL)
            .zip(speeds.as_array())
        {
            motor
                .set_speed(speed)
                .map_err(|e| DriveError::actuator(wheel, e))?;
        }
        self.last_output = speeds;
        Ok(speeds)
    }
}
