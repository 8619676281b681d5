//! The pose estimator facade and its published read handle.

use std::sync::Arc;

use parking_lot::RwLock;
use strafe_kinematics::{MecanumDrive, Pose, WheelPositions};
use tracing::{debug, info, warn};

use crate::config::EstimatorConfig;
use crate::error::EstimatorError;
use crate::fuser::VisionFuser;
use crate::history::{OdometryHistoryEntry, PoseHistory};
use crate::odometry::WheelOdometry;
use crate::vision::{FusionOutcome, FusionStats, VisionMeasurement, VisionQueue, VisionSender};

/// What the estimator last published.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PoseSnapshot {
    /// Fused best estimate.
    pub pose: Pose,
    /// Dead reckoning alone.
    pub odometry_pose: Pose,
    /// Control-loop time of the update that produced this snapshot.
    pub timestamp: f64,
    pub stats: FusionStats,
}

/// Cloneable read-only view of the latest estimate, for telemetry and the
/// field display. Reading never blocks the control loop for longer than a
/// copy.
#[derive(Debug, Clone)]
pub struct PoseReader {
    inner: Arc<RwLock<PoseSnapshot>>,
}

impl PoseReader {
    /// Everything the estimator published on its latest update.
    pub fn snapshot(&self) -> PoseSnapshot {
        *self.inner.read()
    }

    /// The latest fused pose.
    pub fn pose(&self) -> Pose {
        self.inner.read().pose
    }
}

/// Fuses wheel odometry with latency-stamped vision poses.
///
/// Call [`PoseEstimator::update`] once per control cycle. Vision may be fed
/// directly with [`PoseEstimator::add_vision_measurement`] from the same
/// thread, or from anywhere through a [`VisionSender`]; queued measurements
/// are fused in timestamp order at the start of the next update.
#[derive(Debug)]
pub struct PoseEstimator {
    odometry: WheelOdometry,
    history: PoseHistory,
    fuser: VisionFuser,
    queue: VisionQueue,
    estimate: Pose,
    last_timestamp: Option<f64>,
    published: Arc<RwLock<PoseSnapshot>>,
}

impl PoseEstimator {
    /// Creates an estimator at the field origin.
    ///
    /// # Arguments
    ///
    /// * `kinematics`: The same model the drivetrain uses.
    /// * `config`: Estimator tuning.
    ///
    /// # Errors
    ///
    /// Returns the error from [`EstimatorConfig::validate`] if the config is unusable.
    pub fn new(kinematics: MecanumDrive, config: EstimatorConfig) -> Result<Self, EstimatorError> {
        config.validate()?;
        info!(
            history_window = config.history_window,
            trust = ?config.default_trust(),
            "{}",
            kinematics
        );
        Ok(PoseEstimator {
            odometry: WheelOdometry::new(kinematics, Pose::default(), None),
            history: PoseHistory::new(config.history_window),
            fuser: VisionFuser::new(config.default_trust()),
            queue: VisionQueue::new(),
            estimate: Pose::default(),
            last_timestamp: None,
            published: Arc::new(RwLock::new(PoseSnapshot::default())),
        })
    }

    /// Sets the starting pose before the first update.
    ///
    /// # Arguments
    ///
    /// * `pose`: Where the robot is on the field.
    /// * `heading`: The gyro reading at that moment, if a gyro is fitted.
    pub fn initialize(&mut self, pose: Pose, heading: Option<f64>) {
        self.reset_pose(pose, heading, None);
    }

    /// Teleports the estimate to `pose`, discarding history, corrections and
    /// any vision still queued. Passing the current wheel `positions` avoids a
    /// cold-start cycle.
    pub fn reset_pose(&mut self, pose: Pose, heading: Option<f64>, positions: Option<WheelPositions>) {
        self.odometry.reset(pose, heading, positions);
        self.history.clear();
        self.fuser.clear();
        let dropped = self.queue.drain().len();
        self.estimate = pose;
        self.last_timestamp = None;
        info!(%pose, dropped, "pose reset");
        self.publish(0.0);
    }

    /// Runs one control cycle.
    ///
    /// # Arguments
    ///
    /// * `positions`: Cumulative wheel distances (m), sampled together.
    /// * `heading`: Gyro heading (rad), or `None` to integrate wheel rotation.
    /// * `now`: Control-loop time (s). Must not go backwards.
    ///
    /// # Returns
    ///
    /// The fused estimate after this cycle. On invalid input or a clock that
    /// went backwards the cycle is skipped and the previous estimate returned.
    pub fn update(&mut self, positions: WheelPositions, heading: Option<f64>, now: f64) -> Pose {
        if !now.is_finite() {
            warn!(now, "non-finite control timestamp, skipping cycle");
            return self.estimate;
        }
        if let Some(last) = self.last_timestamp.filter(|last| now < *last) {
            warn!(now, last, "control timestamp went backwards, skipping cycle");
            return self.estimate;
        }
        if let Err(e) = self.odometry.update(positions, heading) {
            warn!(error = %e, "odometry input rejected, skipping cycle");
            return self.estimate;
        }

        let odometry_pose = self.odometry.pose();
        self.history.record(OdometryHistoryEntry {
            timestamp: now,
            wheel_positions: positions,
            heading: odometry_pose.theta,
            pose: odometry_pose,
        });
        self.history.prune(now);
        self.last_timestamp = Some(now);

        self.fuse_pending();
        self.fuser.prune(&self.history);
        self.estimate = self.fuser.estimate(odometry_pose);
        self.publish(now);
        self.estimate
    }

    /// Fuses one measurement immediately against the current history.
    pub fn add_vision_measurement(&mut self, measurement: VisionMeasurement) -> FusionOutcome {
        let outcome = self.fuser.fuse(measurement, &self.history);
        if outcome.is_applied() {
            self.estimate = self.fuser.estimate(self.odometry.pose());
            self.publish(self.last_timestamp.unwrap_or_default());
        }
        outcome
    }

    /// Fuses everything queued through [`VisionSender`]s, oldest first.
    /// Returns how many were applied.
    pub fn fuse_pending(&mut self) -> usize {
        let batch = self.queue.drain();
        if batch.is_empty() {
            return 0;
        }
        let mut applied = 0;
        for measurement in batch {
            if self.fuser.fuse(measurement, &self.history).is_applied() {
                applied += 1;
            }
        }
        debug!(applied, "fused queued vision measurements");
        self.estimate = self.fuser.estimate(self.odometry.pose());
        applied
    }

    /// A handle for feeding vision from another thread or task.
    pub fn vision_sender(&self) -> VisionSender {
        self.queue.sender()
    }

    /// Latest fused pose.
    pub fn estimated_position(&self) -> Pose {
        self.estimate
    }

    /// Dead-reckoned pose without vision.
    pub fn odometry_pose(&self) -> Pose {
        self.odometry.pose()
    }

    /// Vision fusion counters since start-up.
    pub fn stats(&self) -> FusionStats {
        self.fuser.stats()
    }

    /// Odometry samples retained for latency compensation.
    pub fn history(&self) -> &PoseHistory {
        &self.history
    }

    /// A read handle that follows every published update.
    pub fn pose_reader(&self) -> PoseReader {
        PoseReader {
            inner: Arc::clone(&self.published),
        }
    }

    fn publish(&self, timestamp: f64) {
        *self.published.write() = PoseSnapshot {
            pose: self.estimate,
            odometry_pose: self.odometry.pose(),
            timestamp,
            stats: self.fuser.stats(),
        };
    }
}
