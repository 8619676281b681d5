use std::fmt;

use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Wheel position on the chassis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wheel {
    FrontLeft,
    FrontRight,
    RearLeft,
    RearRight,
}

impl Wheel {
    /// All wheels in front-left, front-right, rear-left, rear-right order.
    pub const ALL: [Wheel; 4] = [
        Wheel::FrontLeft,
        Wheel::FrontRight,
        Wheel::RearLeft,
        Wheel::RearRight,
    ];
}

impl fmt::Display for Wheel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Wheel::FrontLeft => "front-left",
            Wheel::FrontRight => "front-right",
            Wheel::RearLeft => "rear-left",
            Wheel::RearRight => "rear-right",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum DriveError {
    #[error("{wheel} motor: {source}")]
    Actuator { wheel: Wheel, source: BoxError },
    #[error("{wheel} encoder: {source}")]
    Encoder { wheel: Wheel, source: BoxError },
    #[error("{mechanism}: {source}")]
    Mechanism {
        mechanism: &'static str,
        source: BoxError,
    },
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

impl DriveError {
    pub(crate) fn actuator(wheel: Wheel, source: impl Into<BoxError>) -> Self {
        DriveError::Actuator {
            wheel,
            source: source.into(),
        }
    }

    pub(crate) fn encoder(wheel: Wheel, source: impl Into<BoxError>) -> Self {
        DriveError::Encoder {
            wheel,
            source: source.into(),
        }
    }

    pub(crate) fn mechanism(mechanism: &'static str, source: impl Into<BoxError>) -> Self {
        DriveError::Mechanism {
            mechanism,
            source: source.into(),
        }
    }
}
