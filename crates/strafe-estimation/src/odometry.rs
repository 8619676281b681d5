//! Dead reckoning from absolute wheel distances and a gyro heading.

use strafe_kinematics::{KinematicsError, MecanumDrive, Pose, Twist, WheelPositions};

/// Wheel odometry integrator.
///
/// Keeps the previous wheel sample and turns each new one into a robot-frame
/// twist through the kinematics pseudo-inverse. The gyro is the authority on
/// heading: when one is supplied the twist's rotation is replaced by the
/// gyro's change and the pose takes the gyro heading (plus the offset fixed at
/// initialisation). Without a gyro the wheel-derived rotation is integrated.
#[derive(Debug, Clone)]
pub struct WheelOdometry {
    kinematics: MecanumDrive,
    pose: Pose,
    previous: Option<WheelPositions>,
    /// Field heading minus gyro reading.
    heading_offset: Option<f64>,
}

impl WheelOdometry {
    /// Creates an integrator starting at `initial_pose`.
    ///
    /// # Arguments
    ///
    /// * `kinematics`: Wheel geometry, shared with the drivetrain.
    /// * `initial_pose`: Field pose at start-up.
    /// * `initial_heading`: Gyro reading at start-up, if a gyro is fitted.
    pub fn new(kinematics: MecanumDrive, initial_pose: Pose, initial_heading: Option<f64>) -> Self {
        WheelOdometry {
            kinematics,
            pose: initial_pose,
            previous: None,
            heading_offset: initial_heading.map(|h| initial_pose.theta - h),
        }
    }

    /// Current dead-reckoned pose.
    pub fn pose(&self) -> Pose {
        self.pose
    }

    /// Returns `true` once a first wheel sample has been seen.
    pub fn is_seeded(&self) -> bool {
        self.previous.is_some()
    }

    /// Restarts integration at `pose`. Passing `positions` seeds the previous
    /// sample so the next update produces a real delta; `None` makes the next
    /// update a cold start.
    pub fn reset(&mut self, pose: Pose, heading: Option<f64>, positions: Option<WheelPositions>) {
        self.pose = pose;
        self.previous = positions;
        self.heading_offset = heading.map(|h| pose.theta - h);
    }

    /// Integrates one wheel/gyro sample.
    ///
    /// # Returns
    ///
    /// The robot-frame twist since the previous sample. The first call only
    /// seeds the previous sample and returns a zero twist.
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::NonFiniteInput)` if a wheel reading or the
    /// heading is NaN or infinite. The integrator state is left untouched.
    pub fn update(
        &mut self,
        positions: WheelPositions,
        heading: Option<f64>,
    ) -> Result<Twist, KinematicsError> {
        if !positions.is_finite() {
            return Err(KinematicsError::NonFiniteInput("wheel positions"));
        }
        if heading.is_some_and(|h| !h.is_finite()) {
            return Err(KinematicsError::NonFiniteInput("gyro heading"));
        }

        let field_heading = heading.map(|gyro| {
            let offset = *self.heading_offset.get_or_insert(self.pose.theta - gyro);
            Pose::normalize_angle(gyro + offset)
        });

        let Some(previous) = self.previous.replace(positions) else {
            if let Some(theta) = field_heading {
                self.pose = Pose::new(self.pose.x, self.pose.y, theta);
            }
            return Ok(Twist::default());
        };

        let mut twist = self.kinematics.to_twist(positions.delta(&previous));
        if let Some(theta) = field_heading {
            twist.dtheta = Pose::normalize_angle(theta - self.pose.theta);
        }

        let next = self.pose.exp(twist);
        self.pose = match field_heading {
            Some(theta) => Pose::new(next.x, next.y, theta),
            None => next,
        };
        Ok(twist)
    }
}
