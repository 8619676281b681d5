//! Latency-compensated blending of vision poses into dead reckoning.
//!
//! Every accepted measurement becomes a correction anchored at its capture
//! time: the odometry pose at that instant paired with the corrected pose.
//! The current estimate is the newest correction carried forward by the
//! odometry motion since its anchor, so motion after the camera fired is
//! never thrown away. A measurement older than corrections already held is
//! inserted in fusion order and the later ones are recomputed on top of
//! it, which makes the result independent of arrival order.

use std::cmp::Ordering;

use strafe_kinematics::Pose;
use tracing::{debug, warn};

use crate::history::{OdometryHistoryEntry, PoseHistory};
use crate::vision::{FusionOutcome, FusionStats, RejectReason, VisionMeasurement, VisionTrust};

#[derive(Debug, Clone, Copy)]
struct Correction {
    measurement: VisionMeasurement,
    /// Dead-reckoned pose at the measurement timestamp.
    odometry_pose: Pose,
    /// Best estimate at the measurement timestamp after blending.
    corrected_pose: Pose,
}

/// Applies vision measurements against a [`PoseHistory`].
#[derive(Debug, Clone)]
pub struct VisionFuser {
    default_trust: VisionTrust,
    /// Sorted by measurement timestamp.
    corrections: Vec<Correction>,
    stats: FusionStats,
}

impl VisionFuser {
    pub fn new(default_trust: VisionTrust) -> Self {
        VisionFuser {
            default_trust,
            corrections: Vec::new(),
            stats: FusionStats::default(),
        }
    }

    pub fn stats(&self) -> FusionStats {
        self.stats
    }

    /// Number of corrections retained for replay.
    pub fn corrections(&self) -> usize {
        self.corrections.len()
    }

    /// Best estimate given the dead-reckoned pose `odometry_pose`.
    ///
    /// Uses the newest correction: its corrected pose composed with the
    /// odometry motion from its anchor to `odometry_pose`. With no
    /// corrections the odometry pose is returned unchanged.
    pub fn estimate(&self, odometry_pose: Pose) -> Pose {
        match self.corrections.last() {
            Some(latest) => latest
                .corrected_pose
                .transform_by(&odometry_pose.relative_to(&latest.odometry_pose)),
            None => odometry_pose,
        }
    }

    /// Validates and folds in one measurement.
    pub fn fuse(&mut self, measurement: VisionMeasurement, history: &PoseHistory) -> FusionOutcome {
        let anchor = match self.check(&measurement, history) {
            Ok(anchor) => anchor,
            Err(reason) => {
                self.stats.record_rejection(reason);
                match reason {
                    RejectReason::Future | RejectReason::Invalid => warn!(
                        timestamp = measurement.timestamp,
                        latest = history.latest().map(|e| e.timestamp),
                        %reason,
                        "vision measurement rejected"
                    ),
                    RejectReason::Stale | RejectReason::NoHistory => debug!(
                        timestamp = measurement.timestamp,
                        %reason,
                        "vision measurement rejected"
                    ),
                }
                return FusionOutcome::Rejected(reason);
            }
        };

        let split = self
            .corrections
            .partition_point(|c| c.measurement.fusion_order(&measurement) != Ordering::Greater);
        let later = self.corrections.split_off(split);
        let corrected = self.push_correction(measurement, anchor.pose);

        if !later.is_empty() {
            debug!(
                timestamp = measurement.timestamp,
                replayed = later.len(),
                "late vision measurement, replaying newer corrections"
            );
        }
        for correction in later {
            let timestamp = correction.measurement.timestamp;
            match history.sample(timestamp) {
                Some(entry) => {
                    self.push_correction(correction.measurement, entry.pose);
                }
                None => debug!(timestamp, "correction fell out of history during replay"),
            }
        }

        self.stats.applied += 1;
        debug!(
            timestamp = measurement.timestamp,
            x = corrected.x,
            y = corrected.y,
            theta = corrected.theta,
            "vision measurement applied"
        );
        FusionOutcome::Applied(corrected)
    }

    /// Drops corrections that can no longer serve as a replay baseline: keeps
    /// the newest one at or before the oldest history sample and everything
    /// after it.
    pub fn prune(&mut self, history: &PoseHistory) {
        let Some(oldest) = history.oldest() else {
            return;
        };
        let anchored = self
            .corrections
            .partition_point(|c| c.measurement.timestamp <= oldest.timestamp);
        if anchored > 1 {
            self.corrections.drain(..anchored - 1);
        }
    }

    /// Forgets every correction. Counters are kept.
    pub fn clear(&mut self) {
        self.corrections.clear();
    }

    fn trust_for(&self, measurement: &VisionMeasurement) -> VisionTrust {
        measurement.trust.unwrap_or(self.default_trust)
    }

    fn check(
        &self,
        measurement: &VisionMeasurement,
        history: &PoseHistory,
    ) -> Result<OdometryHistoryEntry, RejectReason> {
        if !measurement.pose.is_finite()
            || !measurement.timestamp.is_finite()
            || !self.trust_for(measurement).is_valid()
        {
            return Err(RejectReason::Invalid);
        }
        let (Some(oldest), Some(latest)) = (history.oldest(), history.latest()) else {
            return Err(RejectReason::NoHistory);
        };
        if measurement.timestamp > latest.timestamp {
            return Err(RejectReason::Future);
        }
        if measurement.timestamp < oldest.timestamp
            || latest.timestamp - measurement.timestamp > history.window()
        {
            return Err(RejectReason::Stale);
        }
        history.sample(measurement.timestamp).ok_or(RejectReason::Stale)
    }

    /// Blends `measurement` into the estimate at its timestamp and appends the
    /// resulting correction. Every retained correction must be no newer than
    /// `measurement`.
    fn push_correction(&mut self, measurement: VisionMeasurement, odometry_pose: Pose) -> Pose {
        let baseline = self.estimate(odometry_pose);
        let trust = self.trust_for(&measurement);
        let corrected = baseline.exp(trust.apply(baseline.log(&measurement.pose)));
        self.corrections.push(Correction {
            measurement,
            odometry_pose,
            corrected_pose: corrected,
        });
        corrected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strafe_kinematics::WheelPositions;
    const EPSILON: f64 = 1e-9;

    /// Straight-line odometry along x at 1 m/s sampled every 0.1 s.
    fn history(window: f64, until: f64) -> PoseHistory {
        let mut history = PoseHistory::new(window);
        let steps = (until / 0.1).round() as usize;
        for i in 0..=steps {
            let t = i as f64 * 0.1;
            history.record(OdometryHistoryEntry {
                timestamp: t,
                wheel_positions: WheelPositions::new(t, t, t, t),
                heading: 0.0,
                pose: Pose::new(t, 0.0, 0.0),
            });
        }
        history
    }

    #[test]
    fn test_no_corrections_passes_odometry_through() {
        let fuser = VisionFuser::new(VisionTrust::FULL);
        let pose = Pose::new(1.0, 2.0, 0.3);
        assert_eq!(fuser.estimate(pose), pose);
    }

    #[test]
    fn test_correction_carries_forward() {
        let history = history(2.0, 1.0);
        let mut fuser = VisionFuser::new(VisionTrust::FULL);
        let outcome = fuser.fuse(VisionMeasurement::new(Pose::new(0.5, 1.0, 0.0), 0.5), &history);
        assert!(outcome.is_applied());

        // Odometry moved another 0.5 m after the frame.
        let estimate = fuser.estimate(Pose::new(1.0, 0.0, 0.0));
        assert!((estimate.x - 1.0).abs() < EPSILON);
        assert!((estimate.y - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_partial_trust_blends() {
        let history = history(2.0, 1.0);
        let mut fuser = VisionFuser::new(VisionTrust::uniform(0.5));
        fuser.fuse(VisionMeasurement::new(Pose::new(1.0, 1.0, 0.0), 1.0), &history);
        let estimate = fuser.estimate(Pose::new(1.0, 0.0, 0.0));
        assert!((estimate.x - 1.0).abs() < EPSILON);
        assert!((estimate.y - 0.5).abs() < EPSILON);

        // A per-measurement trust of zero leaves the estimate alone.
        fuser.fuse(
            VisionMeasurement::new(Pose::new(1.0, 5.0, 0.0), 1.0).with_trust(VisionTrust::uniform(0.0)),
            &history,
        );
        let estimate = fuser.estimate(Pose::new(1.0, 0.0, 0.0));
        assert!((estimate.y - 0.5).abs() < EPSILON);
    }

    #[test]
    fn test_rejections_are_counted() {
        let mut fuser = VisionFuser::new(VisionTrust::FULL);
        let empty = PoseHistory::new(1.0);
        assert_eq!(
            fuser.fuse(VisionMeasurement::new(Pose::default(), 0.0), &empty),
            FusionOutcome::Rejected(RejectReason::NoHistory)
        );

        let history = history(0.5, 1.0);
        let cases = [
            (VisionMeasurement::new(Pose::default(), 1.5), RejectReason::Future),
            (VisionMeasurement::new(Pose::default(), 0.2), RejectReason::Stale),
            (VisionMeasurement::new(Pose::new(f64::NAN, 0.0, 0.0), 0.9), RejectReason::Invalid),
            (VisionMeasurement::new(Pose::default(), f64::NAN), RejectReason::Invalid),
            (
                VisionMeasurement::new(Pose::default(), 0.9).with_trust(VisionTrust::uniform(-1.0)),
                RejectReason::Invalid,
            ),
        ];
        for (measurement, reason) in cases {
            assert_eq!(fuser.fuse(measurement, &history), FusionOutcome::Rejected(reason));
        }

        let stats = fuser.stats();
        assert_eq!(stats.no_history, 1);
        assert_eq!(stats.future, 1);
        assert_eq!(stats.stale, 1);
        assert_eq!(stats.invalid, 3);
        assert_eq!(stats.applied, 0);
        assert_eq!(fuser.corrections(), 0);
    }

    #[test]
    fn test_late_measurement_replays_newer_ones() {
        let history = history(2.0, 1.0);
        let early = VisionMeasurement::new(Pose::new(0.1, 0.4, 0.0), 0.1);
        let late = VisionMeasurement::new(Pose::new(0.3, 0.2, 0.1), 0.3);

        let mut in_order = VisionFuser::new(VisionTrust::uniform(0.5));
        in_order.fuse(early, &history);
        in_order.fuse(late, &history);

        let mut reversed = VisionFuser::new(VisionTrust::uniform(0.5));
        reversed.fuse(late, &history);
        reversed.fuse(early, &history);

        let now = Pose::new(1.0, 0.0, 0.0);
        let a = in_order.estimate(now);
        let b = reversed.estimate(now);
        assert!((a.x - b.x).abs() < EPSILON);
        assert!((a.y - b.y).abs() < EPSILON);
        assert!((a.theta - b.theta).abs() < EPSILON);
        assert_eq!(reversed.stats().applied, 2);
    }

    #[test]
    fn test_prune_keeps_one_baseline() {
        let mut history = history(2.0, 1.0);
        let mut fuser = VisionFuser::new(VisionTrust::FULL);
        for t in [0.1, 0.2, 0.3, 0.8] {
            fuser.fuse(VisionMeasurement::new(Pose::new(t, 0.0, 0.0), t), &history);
        }
        assert_eq!(fuser.corrections(), 4);

        // Oldest sample is now 0.5; 0.3 stays as the baseline for it.
        history.prune(2.5);
        fuser.prune(&history);
        assert_eq!(fuser.corrections(), 2);
        let estimate = fuser.estimate(Pose::new(1.0, 0.0, 0.0));
        assert!((estimate.x - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_equal_timestamps_fuse_independent_of_arrival() {
        let history = history(2.0, 1.0);
        let up = VisionMeasurement::new(Pose::new(0.2, 1.0, 0.0), 0.2);
        let down = VisionMeasurement::new(Pose::new(0.2, -1.0, 0.0), 0.2);

        let mut up_first = VisionFuser::new(VisionTrust::uniform(0.5));
        assert!(up_first.fuse(up, &history).is_applied());
        assert!(up_first.fuse(down, &history).is_applied());

        let mut down_first = VisionFuser::new(VisionTrust::uniform(0.5));
        assert!(down_first.fuse(down, &history).is_applied());
        assert!(down_first.fuse(up, &history).is_applied());

        let odometry = Pose::new(1.0, 0.0, 0.0);
        let a = up_first.estimate(odometry);
        let b = down_first.estimate(odometry);
        assert!((a.x - b.x).abs() < EPSILON);
        assert!((a.y - b.y).abs() < EPSILON);
        assert!((a.theta - b.theta).abs() < EPSILON);
        // Lower y fuses first, so the +1.0 frame has the last word.
        assert!((a.y - 0.25).abs() < EPSILON);
    }
}
