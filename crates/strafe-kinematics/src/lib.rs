#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![doc = "A `no_std` library for 2D mecanum-drive robot kinematics."]
#![doc = ""]
#![doc = "This crate provides pose and twist geometry, forward and inverse mecanum"]
#![doc = "kinematics, and exact pose integration from chassis speeds or wheel displacements."]

use core::f64::consts::PI;
use core::fmt;
use libm::{cos, fabs, hypot, sin};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub mod error;
pub mod mecanum;

pub use error::KinematicsError;
pub use mecanum::{MecanumDrive, MecanumGeometry, normalize_to_unit_range};

/// Below this magnitude an angle change is treated as a straight line when
/// integrating or taking the log of a pose.
const SMALL_ANGLE: f64 = 1e-9;

/// A 2‑D pose `(x, y, θ)` in meters and radians (θ measured counter‑clockwise
/// from the x‑axis in the field frame).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    /// Field‑frame x position (m).
    pub x: f64,
    /// Field‑frame y position (m).
    pub y: f64,
    /// Heading (rad), normalized to `(-PI, PI]`.
    pub theta: f64,
}

impl Pose {
    /// Construct a new pose. The heading is wrapped to `(-PI, PI]`.
    ///
    /// # Arguments
    ///
    /// * `x`: Field-frame x position in meters.
    /// * `y`: Field-frame y position in meters.
    /// * `theta`: Heading in radians.
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        Pose {
            x,
            y,
            theta: Pose::normalize_angle(theta),
        }
    }

    /// Normalize an angle to be within `(-PI, PI]`.
    ///
    /// Angles at `-PI` will be normalized to `PI`.
    ///
    /// # Arguments
    ///
    /// * `angle`: The angle in radians to normalize.
    ///
    /// # Returns
    ///
    /// The normalized angle in radians.
    pub fn normalize_angle(angle: f64) -> f64 {
        let a = angle % (2.0 * PI);
        if a > PI {
            a - 2.0 * PI
        } else if a <= -PI {
            a + 2.0 * PI
        } else {
            a
        }
    }

    /// Returns `true` when every component is a finite number.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.theta.is_finite()
    }

    /// Applies a twist expressed in this pose's frame, following a
    /// constant-curvature arc rather than a straight Euler step.
    ///
    /// # Arguments
    ///
    /// * `twist`: Displacement `(dx, dy, dθ)` in the robot frame at `self`.
    ///
    /// # Returns
    ///
    /// The pose reached at the end of the arc.
    pub fn exp(&self, twist: Twist) -> Pose {
        let dtheta = twist.dtheta;
        let sin_theta = sin(dtheta);
        let cos_theta = cos(dtheta);

        let (s, c) = if fabs(dtheta) < SMALL_ANGLE {
            (1.0 - dtheta * dtheta / 6.0, 0.5 * dtheta)
        } else {
            (sin_theta / dtheta, (1.0 - cos_theta) / dtheta)
        };

        let local = Pose {
            x: twist.dx * s - twist.dy * c,
            y: twist.dx * c + twist.dy * s,
            theta: dtheta,
        };
        self.transform_by(&local)
    }

    /// Inverse of [`Pose::exp`]: the twist that carries `self` onto `end`.
    pub fn log(&self, end: &Pose) -> Twist {
        let transform = end.relative_to(self);
        let dtheta = transform.theta;
        let half_dtheta = dtheta / 2.0;
        let cos_minus_one = cos(dtheta) - 1.0;

        let half_theta_by_tan = if fabs(cos_minus_one) < SMALL_ANGLE {
            1.0 - dtheta * dtheta / 12.0
        } else {
            -(half_dtheta * sin(dtheta)) / cos_minus_one
        };

        // Rotate by (half_theta_by_tan, -half_dtheta) and scale by its norm.
        let norm = hypot(half_theta_by_tan, half_dtheta);
        let c = half_theta_by_tan / norm;
        let s = -half_dtheta / norm;
        let dx = (transform.x * c - transform.y * s) * norm;
        let dy = (transform.x * s + transform.y * c) * norm;

        Twist::new(dx, dy, dtheta)
    }

    /// Expresses `self` in the frame of `origin`.
    pub fn relative_to(&self, origin: &Pose) -> Pose {
        let dx = self.x - origin.x;
        let dy = self.y - origin.y;
        let (s, c) = (sin(-origin.theta), cos(-origin.theta));
        Pose::new(dx * c - dy * s, dx * s + dy * c, self.theta - origin.theta)
    }

    /// Composes a transform expressed in this pose's frame onto this pose.
    pub fn transform_by(&self, transform: &Pose) -> Pose {
        let (s, c) = (sin(self.theta), cos(self.theta));
        Pose::new(
            self.x + transform.x * c - transform.y * s,
            self.y + transform.x * s + transform.y * c,
            self.theta + transform.theta,
        )
    }

    /// Interpolates along the twist between `self` and `end`; `t` is clamped to `[0, 1]`.
    pub fn interpolate(&self, end: &Pose, t: f64) -> Pose {
        if t <= 0.0 {
            *self
        } else if t >= 1.0 {
            *end
        } else {
            self.exp(self.log(end).scale(t))
        }
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(x: {:.2}, y: {:.2}, θ: {:.2} rad)", self.x, self.y, self.theta)
    }
}

/// A displacement expressed in the robot base frame over one interval.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Twist {
    /// Forward displacement (m).
    pub dx: f64,
    /// Leftward displacement (m).
    pub dy: f64,
    /// Counter-clockwise rotation (rad).
    pub dtheta: f64,
}

impl Twist {
    /// Construct a new twist.
    pub const fn new(dx: f64, dy: f64, dtheta: f64) -> Self {
        Twist { dx, dy, dtheta }
    }

    /// Scales every component by `factor`.
    pub fn scale(&self, factor: f64) -> Twist {
        Twist::new(self.dx * factor, self.dy * factor, self.dtheta * factor)
    }
}

impl fmt::Display for Twist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(dx: {:.3} m, dy: {:.3} m, dθ: {:.3} rad)", self.dx, self.dy, self.dtheta)
    }
}

/// Forward, sideways and angular chassis velocities.
/// These represent the overall motion of the robot's chassis.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChassisSpeeds {
    /// Forward velocity of the chassis center (m/s).
    pub vx: f64,
    /// Leftward velocity of the chassis center (m/s).
    pub vy: f64,
    /// Counter-clockwise angular speed of the chassis (rad/s).
    pub omega: f64,
}

impl ChassisSpeeds {
    /// Construct chassis speeds.
    ///
    /// # Arguments
    ///
    /// * `vx`: Forward velocity (m/s).
    /// * `vy`: Leftward velocity (m/s).
    /// * `omega`: Angular speed (rad/s).
    pub const fn new(vx: f64, vy: f64, omega: f64) -> Self {
        ChassisSpeeds { vx, vy, omega }
    }

    /// See [`normalize_to_unit_range`].
    pub fn normalize_to_unit_range(&self, max_linear_speed: f64) -> (f64, f64, f64) {
        normalize_to_unit_range(*self, max_linear_speed)
    }
}

impl fmt::Display for ChassisSpeeds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(vx: {:.2} m/s, vy: {:.2} m/s, ω: {:.2} rad/s)",
            self.vx, self.vy, self.omega
        )
    }
}

/// Position of a wheel contact point relative to the chassis center
/// (x forward, y left, meters).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Translation {
    /// Forward offset (m).
    pub x: f64,
    /// Leftward offset (m).
    pub y: f64,
}

impl Translation {
    /// Construct a wheel offset.
    pub const fn new(x: f64, y: f64) -> Self {
        Translation { x, y }
    }
}

/// Per-wheel linear velocities in front-left, front-right, rear-left,
/// rear-right order.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WheelSpeeds {
    /// Front-left wheel speed.
    pub front_left: f64,
    /// Front-right wheel speed.
    pub front_right: f64,
    /// Rear-left wheel speed.
    pub rear_left: f64,
    /// Rear-right wheel speed.
    pub rear_right: f64,
}

impl WheelSpeeds {
    /// Construct wheel speeds.
    pub const fn new(front_left: f64, front_right: f64, rear_left: f64, rear_right: f64) -> Self {
        WheelSpeeds {
            front_left,
            front_right,
            rear_left,
            rear_right,
        }
    }

    /// Builds wheel speeds from `[fl, fr, rl, rr]`.
    pub const fn from_array(values: [f64; 4]) -> Self {
        WheelSpeeds::new(values[0], values[1], values[2], values[3])
    }

    /// Returns `[fl, fr, rl, rr]`.
    pub const fn as_array(&self) -> [f64; 4] {
        [self.front_left, self.front_right, self.rear_left, self.rear_right]
    }

    /// Scales all four speeds by the same factor so that none exceeds
    /// `max_speed` in magnitude, preserving the direction of travel.
    /// Speeds already within range are returned unchanged.
    pub fn desaturate(&self, max_speed: f64) -> WheelSpeeds {
        let largest = self
            .as_array()
            .iter()
            .fold(0.0_f64, |acc, s| acc.max(fabs(*s)));
        if largest <= max_speed || largest == 0.0 {
            return *self;
        }
        let scale = max_speed / largest;
        WheelSpeeds::from_array(self.as_array().map(|s| s * scale))
    }
}

impl fmt::Display for WheelSpeeds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(FL: {:.2}, FR: {:.2}, RL: {:.2}, RR: {:.2})",
            self.front_left, self.front_right, self.rear_left, self.rear_right
        )
    }
}

/// Cumulative distance traveled by each wheel (m), sampled together once
/// per control cycle.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WheelPositions {
    /// Front-left wheel distance.
    pub front_left: f64,
    /// Front-right wheel distance.
    pub front_right: f64,
    /// Rear-left wheel distance.
    pub rear_left: f64,
    /// Rear-right wheel distance.
    pub rear_right: f64,
}

impl WheelPositions {
    /// Construct wheel positions.
    pub const fn new(front_left: f64, front_right: f64, rear_left: f64, rear_right: f64) -> Self {
        WheelPositions {
            front_left,
            front_right,
            rear_left,
            rear_right,
        }
    }

    /// Builds wheel positions from `[fl, fr, rl, rr]`.
    pub const fn from_array(values: [f64; 4]) -> Self {
        WheelPositions::new(values[0], values[1], values[2], values[3])
    }

    /// Returns `[fl, fr, rl, rr]`.
    pub const fn as_array(&self) -> [f64; 4] {
        [self.front_left, self.front_right, self.rear_left, self.rear_right]
    }

    /// Converts encoder rotations into meters traveled.
    ///
    /// # Arguments
    ///
    /// * `rotations`: Motor rotations `[fl, fr, rl, rr]`.
    /// * `meters_per_rotation`: Wheel circumference divided by the gear ratio.
    pub fn from_rotations(rotations: [f64; 4], meters_per_rotation: f64) -> Self {
        WheelPositions::from_array(rotations.map(|r| r * meters_per_rotation))
    }

    /// Per-wheel displacement since `previous`.
    pub fn delta(&self, previous: &WheelPositions) -> WheelPositions {
        WheelPositions::new(
            self.front_left - previous.front_left,
            self.front_right - previous.front_right,
            self.rear_left - previous.rear_left,
            self.rear_right - previous.rear_right,
        )
    }

    /// Linear interpolation toward `end`; `t` is clamped to `[0, 1]`.
    pub fn interpolate(&self, end: &WheelPositions, t: f64) -> WheelPositions {
        let t = t.clamp(0.0, 1.0);
        let start = self.as_array();
        let end = end.as_array();
        WheelPositions::new(
            start[0] + (end[0] - start[0]) * t,
            start[1] + (end[1] - start[1]) * t,
            start[2] + (end[2] - start[2]) * t,
            start[3] + (end[3] - start[3]) * t,
        )
    }

    /// Returns `true` when every wheel reading is a finite number.
    pub fn is_finite(&self) -> bool {
        self.as_array().iter().all(|p| p.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    const EPSILON: f64 = 1e-9;

    fn assert_pose_eq(actual: Pose, expected: Pose) {
        assert!((actual.x - expected.x).abs() < EPSILON, "x: {} != {}", actual, expected);
        assert!((actual.y - expected.y).abs() < EPSILON, "y: {} != {}", actual, expected);
        assert!(
            (actual.theta - expected.theta).abs() < EPSILON,
            "theta: {} != {}",
            actual,
            expected
        );
    }

    #[test]
    fn test_pose_normalization() {
        assert!((Pose::normalize_angle(0.0) - 0.0).abs() < EPSILON);
        assert!((Pose::normalize_angle(PI) - PI).abs() < EPSILON); // PI stays PI for (-PI, PI]
        assert!((Pose::normalize_angle(-PI) - PI).abs() < EPSILON);
        assert!((Pose::normalize_angle(3.0 * PI) - PI).abs() < EPSILON);
        assert!((Pose::normalize_angle(-3.0 * PI) - PI).abs() < EPSILON);
        assert!((Pose::normalize_angle(2.5 * PI) - 0.5 * PI).abs() < EPSILON);
        assert!((Pose::normalize_angle(-2.5 * PI) - -0.5 * PI).abs() < EPSILON);
        assert!((Pose::normalize_angle(3.5 * PI) - -0.5 * PI).abs() < EPSILON);
    }

    #[test]
    fn test_exp_straight_line() {
        let start = Pose::new(1.0, 2.0, PI / 2.0);
        let end = start.exp(Twist::new(1.0, 0.0, 0.0));
        assert_pose_eq(end, Pose::new(1.0, 3.0, PI / 2.0));
    }

    #[test]
    fn test_exp_quarter_circle() {
        // Arc of radius 1 turning left through 90 degrees.
        let end = Pose::default().exp(Twist::new(PI / 2.0, 0.0, PI / 2.0));
        assert_pose_eq(end, Pose::new(1.0, 1.0, PI / 2.0));
    }

    #[test]
    fn test_log_inverts_exp() {
        let start = Pose::new(0.5, -1.0, 0.3);
        let twist = Twist::new(0.7, -0.2, 1.1);
        let end = start.exp(twist);
        let recovered = start.log(&end);
        assert!((recovered.dx - twist.dx).abs() < EPSILON);
        assert!((recovered.dy - twist.dy).abs() < EPSILON);
        assert!((recovered.dtheta - twist.dtheta).abs() < EPSILON);
    }

    #[test]
    fn test_relative_to_and_transform_by() {
        let origin = Pose::new(1.0, 1.0, PI / 2.0);
        let pose = Pose::new(1.0, 2.0, PI);
        let relative = pose.relative_to(&origin);
        assert_pose_eq(relative, Pose::new(1.0, 0.0, PI / 2.0));
        assert_pose_eq(origin.transform_by(&relative), pose);
    }

    #[test]
    fn test_interpolate_endpoints_and_midpoint() {
        let start = Pose::new(0.0, 0.0, 0.0);
        let end = Pose::new(2.0, 0.0, 0.0);
        assert_pose_eq(start.interpolate(&end, -1.0), start);
        assert_pose_eq(start.interpolate(&end, 2.0), end);
        assert_pose_eq(start.interpolate(&end, 0.25), Pose::new(0.5, 0.0, 0.0));
    }

    #[test]
    fn test_wheel_speeds_desaturate() {
        let speeds = WheelSpeeds::new(2.0, -1.0, 0.5, 4.0);
        let scaled = speeds.desaturate(1.0);
        assert!((scaled.rear_right - 1.0).abs() < EPSILON);
        assert!((scaled.front_left - 0.5).abs() < EPSILON);
        assert!((scaled.front_right - -0.25).abs() < EPSILON);

        let within = WheelSpeeds::new(0.2, 0.3, -0.4, 0.1);
        assert_eq!(within.desaturate(1.0), within);
    }

    #[test]
    fn test_wheel_positions_delta_and_interpolate() {
        let previous = WheelPositions::new(1.0, 1.0, 1.0, 1.0);
        let current = WheelPositions::new(1.5, 2.0, 0.5, 1.0);
        let delta = current.delta(&previous);
        assert_eq!(delta.as_array(), [0.5, 1.0, -0.5, 0.0]);

        let mid = previous.interpolate(&current, 0.5);
        assert_eq!(mid.as_array(), [1.25, 1.5, 0.75, 1.0]);
    }

    #[test]
    fn test_wheel_positions_from_rotations() {
        let positions = WheelPositions::from_rotations([1.0, 2.0, -1.0, 0.0], 0.5);
        assert_eq!(positions.as_array(), [0.5, 1.0, -0.5, 0.0]);
        assert!(positions.is_finite());
        assert!(!WheelPositions::new(f64::NAN, 0.0, 0.0, 0.0).is_finite());
    }
}
