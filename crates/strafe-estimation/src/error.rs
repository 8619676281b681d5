use thiserror::Error;

use crate::vision::VisionTrust;

/// Construction-time failures of the pose estimator.
#[derive(Debug, Error, PartialEq)]
pub enum EstimatorError {
    #[error("history window must be positive and finite, got {0}")]
    InvalidHistoryWindow(f64),
    #[error("vision trust {0:?} has a weight outside [0, 1]")]
    InvalidTrust(VisionTrust),
    #[error("standard deviations must be finite and non-negative")]
    InvalidStdDevs,
}
