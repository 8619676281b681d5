//! Pose estimation for a mecanum-drive robot.
//!
//! Wheel odometry and a gyro produce a dead-reckoned pose every control
//! cycle. Vision poses arrive late and out of order; [`PoseEstimator`] keeps a
//! short odometry history so each one can be applied at the instant it was
//! captured and carried forward to the present.
//!
//! ```
//! use strafe_estimation::{EstimatorConfig, PoseEstimator, VisionMeasurement};
//! use strafe_kinematics::{MecanumDrive, Pose, WheelPositions};
//!
//! let kinematics = MecanumDrive::new(0.5, 0.5).unwrap();
//! let mut estimator = PoseEstimator::new(kinematics, EstimatorConfig::default()).unwrap();
//! estimator.update(WheelPositions::default(), Some(0.0), 0.0);
//! estimator.update(WheelPositions::new(1.0, 1.0, 1.0, 1.0), Some(0.0), 1.0);
//! estimator.add_vision_measurement(VisionMeasurement::new(Pose::new(1.0, 0.0, 0.0), 0.0));
//! assert!((estimator.estimated_position().x - 2.0).abs() < 1e-9);
//! ```

pub mod config;
pub mod error;
pub mod estimator;
pub mod fuser;
pub mod history;
pub mod odometry;
pub mod vision;

pub use config::EstimatorConfig;
pub use error::EstimatorError;
pub use estimator::{PoseEstimator, PoseReader, PoseSnapshot};
pub use fuser::VisionFuser;
pub use history::{OdometryHistoryEntry, PoseHistory};
pub use odometry::WheelOdometry;
pub use vision::{
    FusionOutcome, FusionStats, RejectReason, VisionMeasurement, VisionQueue, VisionSender,
    VisionTrust,
};
