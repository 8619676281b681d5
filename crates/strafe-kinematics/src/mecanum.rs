//! Mecanum-drive forward and inverse kinematics.
//!
//! Wheel order everywhere is front-left, front-right, rear-left, rear-right.
//! Chassis axes follow the field convention: `vx` forward, `vy` left, `omega`
//! counter-clockwise.

use core::fmt;
use libm::fabs;
use nalgebra::{Matrix3x4, Matrix4x3, Vector3, Vector4};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{ChassisSpeeds, KinematicsError, Pose, Translation, Twist, WheelPositions, WheelSpeeds};

/// Smallest `det(AᵀA)` accepted for the wheel matrix.
const MIN_DETERMINANT: f64 = 1e-12;

/// Rectangular chassis dimensions, as read from configuration.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MecanumGeometry {
    /// Distance between left and right wheel contact points (m).
    pub track_width: f64,
    /// Distance between front and rear wheel contact points (m).
    pub wheelbase: f64,
}

impl MecanumGeometry {
    /// Builds the kinematics model for this geometry.
    ///
    /// # Errors
    ///
    /// See [`MecanumDrive::new`].
    pub fn build(&self) -> Result<MecanumDrive, KinematicsError> {
        MecanumDrive::new(self.track_width, self.wheelbase)
    }
}

/// Mecanum‑drive kinematics helper.
///
/// Holds the wheel layout together with the 4×3 matrix mapping chassis
/// speeds to wheel speeds and its 3×4 least-squares pseudo-inverse. Both are
/// computed once at construction, so a layout that cannot be inverted is
/// rejected before it is ever used. The value is `Copy`: hand the same model
/// to the drivetrain and the pose estimator so both convert with identical
/// geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MecanumDrive {
    wheel_offsets: [Translation; 4],
    forward: Matrix4x3<f64>,
    inverse: Matrix3x4<f64>,
}

impl MecanumDrive {
    /// Construct kinematics for a rectangular wheel layout centred on the chassis.
    ///
    /// # Arguments
    ///
    /// * `track_width`: Left-to-right wheel spacing in meters.
    /// * `wheelbase`: Front-to-rear wheel spacing in meters.
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::InvalidTrackWidth)` if `track_width` is not positive and finite.
    /// Returns `Err(KinematicsError::InvalidWheelbase)` if `wheelbase` is not positive and finite.
    pub fn new(track_width: f64, wheelbase: f64) -> Result<Self, KinematicsError> {
        if !(track_width.is_finite() && track_width > 0.0) {
            return Err(KinematicsError::InvalidTrackWidth("must be positive and finite"));
        }
        if !(wheelbase.is_finite() && wheelbase > 0.0) {
            return Err(KinematicsError::InvalidWheelbase("must be positive and finite"));
        }

        let half_track = track_width / 2.0;
        let half_base = wheelbase / 2.0;
        MecanumDrive::from_wheel_offsets([
            Translation::new(half_base, half_track),
            Translation::new(half_base, -half_track),
            Translation::new(-half_base, half_track),
            Translation::new(-half_base, -half_track),
        ])
    }

    /// Construct kinematics from arbitrary wheel contact points.
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::NonFiniteInput)` if an offset is NaN or infinite.
    /// Returns `Err(KinematicsError::DegenerateKinematics)` if the layout cannot
    /// resolve forward, sideways and rotational motion independently.
    pub fn from_wheel_offsets(wheel_offsets: [Translation; 4]) -> Result<Self, KinematicsError> {
        if wheel_offsets
            .iter()
            .any(|o| !(o.x.is_finite() && o.y.is_finite()))
        {
            return Err(KinematicsError::NonFiniteInput("wheel offsets must be finite"));
        }

        let [fl, fr, rl, rr] = wheel_offsets;
        #[rustfmt::skip]
        let forward = Matrix4x3::new(
            1.0, -1.0, -(fl.x + fl.y),
            1.0,  1.0,   fr.x - fr.y,
            1.0,  1.0,   rl.x - rl.y,
            1.0, -1.0, -(rr.x + rr.y),
        );

        let normal = forward.transpose() * forward;
        if fabs(normal.determinant()) < MIN_DETERMINANT {
            return Err(KinematicsError::DegenerateKinematics(
                "wheel matrix is singular",
            ));
        }
        let normal_inverse = normal.try_inverse().ok_or(KinematicsError::DegenerateKinematics(
            "wheel matrix is singular",
        ))?;
        let inverse = normal_inverse * forward.transpose();

        Ok(MecanumDrive {
            wheel_offsets,
            forward,
            inverse,
        })
    }

    /// Returns the wheel contact points `[fl, fr, rl, rr]`.
    pub fn wheel_offsets(&self) -> [Translation; 4] {
        self.wheel_offsets
    }

    /// Left-to-right spacing of the front wheels.
    pub fn track_width(&self) -> f64 {
        self.wheel_offsets[0].y - self.wheel_offsets[1].y
    }

    /// Front-to-rear spacing of the left wheels.
    pub fn wheelbase(&self) -> f64 {
        self.wheel_offsets[0].x - self.wheel_offsets[2].x
    }

    /// Calculates the wheel speeds required to achieve the given chassis speeds.
    ///
    /// # Arguments
    ///
    /// * `chassis_speeds`: The desired chassis velocities.
    ///
    /// # Returns
    ///
    /// The linear speed each wheel must run at, in the units of the input.
    pub fn to_wheel_speeds(&self, chassis_speeds: ChassisSpeeds) -> WheelSpeeds {
        let chassis = Vector3::new(chassis_speeds.vx, chassis_speeds.vy, chassis_speeds.omega);
        let wheels = self.forward * chassis;
        WheelSpeeds::new(wheels[0], wheels[1], wheels[2], wheels[3])
    }

    /// Calculates the chassis speeds that best explain four measured wheel
    /// speeds. The system is overdetermined, so this is the least-squares
    /// solution through the pseudo-inverse.
    pub fn to_chassis_speeds(&self, wheel_speeds: WheelSpeeds) -> ChassisSpeeds {
        let chassis = self.inverse * Vector4::from(wheel_speeds.as_array());
        ChassisSpeeds::new(chassis[0], chassis[1], chassis[2])
    }

    /// Converts per-wheel displacements over one interval into a robot-frame twist.
    pub fn to_twist(&self, wheel_deltas: WheelPositions) -> Twist {
        let twist = self.inverse * Vector4::from(wheel_deltas.as_array());
        Twist::new(twist[0], twist[1], twist[2])
    }

    /// Updates the robot's pose given its current pose, chassis speeds, and time delta.
    ///
    /// The speeds are assumed constant over `dt`, so the robot follows a
    /// constant-curvature arc; the result is exact for that motion.
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::NegativeTimeDelta)` if `dt` is negative.
    pub fn update_pose(
        &self,
        current_pose: Pose,
        chassis_speeds: ChassisSpeeds,
        dt: f64,
    ) -> Result<Pose, KinematicsError> {
        if dt < 0.0 {
            return Err(KinematicsError::NegativeTimeDelta("must be non-negative"));
        }
        let twist = Twist::new(
            chassis_speeds.vx * dt,
            chassis_speeds.vy * dt,
            chassis_speeds.omega * dt,
        );
        Ok(current_pose.exp(twist))
    }

    /// Convenience function to update pose directly from wheel speeds and dt.
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::NegativeTimeDelta)` if `dt` is negative (propagated from `update_pose`).
    pub fn update_pose_from_wheel_speeds(
        &self,
        current_pose: Pose,
        wheel_speeds: WheelSpeeds,
        dt: f64,
    ) -> Result<Pose, KinematicsError> {
        let chassis_speeds = self.to_chassis_speeds(wheel_speeds);
        self.update_pose(current_pose, chassis_speeds, dt)
    }
}

impl fmt::Display for MecanumDrive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MecanumDrive (track: {:.3} m, wheelbase: {:.3} m)",
            self.track_width(),
            self.wheelbase()
        )
    }
}

/// Divides each chassis axis by `max_linear_speed`, giving values nominally
/// in `[-1, 1]` for an open-loop drive command.
///
/// Nothing is clamped: a result outside the unit range means the caller's
/// configuration or request is wrong, and that should show up downstream.
pub fn normalize_to_unit_range(
    chassis_speeds: ChassisSpeeds,
    max_linear_speed: f64,
) -> (f64, f64, f64) {
    (
        chassis_speeds.vx / max_linear_speed,
        chassis_speeds.vy / max_linear_speed,
        chassis_speeds.omega / max_linear_speed,
    )
}
