//! Capability interfaces for hardware the control code drives or reads.
//!
//! Subsystems own implementations of these rather than concrete devices, so
//! the same drivetrain runs against motor controllers on the robot and
//! simulated ones on a desk.

/// An actuator commanded with a normalised output.
pub trait SpeedActuator {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Set the output, nominally in `[-1, 1]`. Positive drives the
    /// mechanism forward.
    fn set_speed(&mut self, speed: f64) -> Result<(), Self::Error>;

    /// Stop the actuator.
    fn stop(&mut self) -> Result<(), Self::Error>;
}

/// A cumulative position sensor, such as a motor's built-in encoder.
pub trait PositionSensor {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Position in motor rotations since the last reset.
    fn position(&mut self) -> Result<f64, Self::Error>;

    /// Zero the position.
    fn reset(&mut self) -> Result<(), Self::Error>;
}

/// An absolute heading source.
pub trait HeadingSensor {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Heading in radians, counter-clockwise positive.
    fn heading(&mut self) -> Result<f64, Self::Error>;

    /// Make the current heading read as zero.
    fn reset(&mut self) -> Result<(), Self::Error>;
}
