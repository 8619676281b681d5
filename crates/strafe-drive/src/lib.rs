//! Drivetrain and mechanism control.
//!
//! Hardware is reached only through the [`SpeedActuator`],
//! [`PositionSensor`] and [`HeadingSensor`] traits, so every subsystem here
//! runs unchanged against simulated devices.

pub mod drivetrain;
pub mod error;
pub mod filter;
pub mod mapper;
pub mod mechanisms;
pub mod pid;
pub mod traits;

pub use drivetrain::{MecanumDrivetrain, meters_per_rotation};
pub use error::{DriveError, Wheel};
pub use filter::{SlewRateLimiter, apply_deadband, square_magnitude};
pub use mapper::{DriveCommand, DriveCommandMapper, DriveConfig};
pub use mechanisms::{Hood, HoodConfig, Turret, TurretConfig};
pub use pid::{PidController, PidGains};
pub use traits::{HeadingSensor, PositionSensor, SpeedActuator};
