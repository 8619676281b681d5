#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::EstimatorError;
use crate::vision::VisionTrust;

/// Tuning for [`crate::PoseEstimator`].
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatorConfig {
    /// Seconds of odometry kept for latency compensation. Must cover the
    /// worst vision latency.
    pub history_window: f64,
    /// Trust used for measurements that do not carry their own.
    pub vision_trust: VisionTrust,
    /// When both are set, the default trust is derived from these instead of
    /// `vision_trust`. Order is `[x (m), y (m), theta (rad)]`.
    pub state_std_devs: Option<[f64; 3]>,
    pub vision_std_devs: Option<[f64; 3]>,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        EstimatorConfig {
            history_window: 1.5,
            vision_trust: VisionTrust::FULL,
            state_std_devs: None,
            vision_std_devs: None,
        }
    }
}

impl EstimatorConfig {
    /// The trust applied to measurements without their own.
    pub fn default_trust(&self) -> VisionTrust {
        match (self.state_std_devs, self.vision_std_devs) {
            (Some(state), Some(vision)) => VisionTrust::from_std_devs(state, vision),
            _ => self.vision_trust,
        }
    }

    /// Checks the values a running estimator depends on.
    ///
    /// # Errors
    ///
    /// Returns `Err(EstimatorError::InvalidHistoryWindow)` for a window that is not positive.
    /// Returns `Err(EstimatorError::InvalidStdDevs)` for negative or non-finite deviations.
    /// Returns `Err(EstimatorError::InvalidTrust)` when the resulting trust is out of range.
    pub fn validate(&self) -> Result<(), EstimatorError> {
        if !(self.history_window.is_finite() && self.history_window > 0.0) {
            return Err(EstimatorError::InvalidHistoryWindow(self.history_window));
        }
        let std_devs_ok = [self.state_std_devs, self.vision_std_devs]
            .iter()
            .flatten()
            .flatten()
            .all(|s| s.is_finite() && *s >= 0.0);
        if !std_devs_ok {
            return Err(EstimatorError::InvalidStdDevs);
        }
        let trust = self.default_trust();
        if !trust.is_valid() {
            return Err(EstimatorError::InvalidTrust(trust));
        }
        Ok(())
    }
}
