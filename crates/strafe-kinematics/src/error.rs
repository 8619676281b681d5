#![warn(missing_docs)]

//! Error types for the kinematics library.
//!
//! This module defines error types that can occur while building a mecanum
//! kinematics model or integrating motion with it.

use core::fmt;

/// Errors that can occur in kinematic calculations.
#[derive(Debug, Clone, PartialEq)]
pub enum KinematicsError {
    /// Error for invalid track width.
    /// This variant is returned when the left/right wheel spacing is not positive and finite.
    InvalidTrackWidth(&'static str),
    /// Error for invalid wheelbase.
    /// This variant is returned when the front/rear wheel spacing is not positive and finite.
    InvalidWheelbase(&'static str),
    /// Error for a wheel layout whose conversion matrix cannot be inverted.
    /// Returned at construction so a bad geometry never reaches the control loop.
    DegenerateKinematics(&'static str),
    /// Error for NaN or infinite input.
    NonFiniteInput(&'static str),
    /// Error for negative time delta.
    /// This variant is returned when a negative time delta is used for pose updates.
    NegativeTimeDelta(&'static str),
}

impl fmt::Display for KinematicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KinematicsError::InvalidTrackWidth(msg) => write!(f, "Invalid track width: {}", msg),
            KinematicsError::InvalidWheelbase(msg) => write!(f, "Invalid wheelbase: {}", msg),
            KinematicsError::DegenerateKinematics(msg) => {
                write!(f, "Degenerate wheel geometry: {}", msg)
            }
            KinematicsError::NonFiniteInput(msg) => write!(f, "Non-finite input: {}", msg),
            KinematicsError::NegativeTimeDelta(msg) => write!(f, "Negative time delta: {}", msg),
        }
    }
}

impl core::error::Error for KinematicsError {}
