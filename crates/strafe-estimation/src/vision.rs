//! Vision measurement types and the hand-off queue between the vision
//! producer and the control loop.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use strafe_kinematics::{Pose, Twist};

/// How far a vision measurement may pull the estimate, per axis.
///
/// Each weight lies in `[0, 1]`: 0 ignores vision on that axis, 1 snaps to
/// the measured value at the measurement instant.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisionTrust {
    /// Weight on the forward component of the correction.
    pub x: f64,
    /// Weight on the sideways component of the correction.
    pub y: f64,
    /// Weight on the heading component of the correction.
    pub theta: f64,
}

impl VisionTrust {
    /// Trust vision completely.
    pub const FULL: VisionTrust = VisionTrust::uniform(1.0);

    /// Same weight on every axis.
    pub const fn uniform(weight: f64) -> Self {
        VisionTrust {
            x: weight,
            y: weight,
            theta: weight,
        }
    }

    /// Derives per-axis weights from standard deviations, as a steady-state
    /// Kalman gain would: `k = q / (q + sqrt(q * r))` with `q` the state
    /// variance and `r` the vision variance.
    ///
    /// # Arguments
    ///
    /// * `state_std_devs`: Odometry uncertainty `[x (m), y (m), theta (rad)]`.
    /// * `vision_std_devs`: Vision uncertainty in the same units.
    pub fn from_std_devs(state_std_devs: [f64; 3], vision_std_devs: [f64; 3]) -> Self {
        let gain = |state: f64, vision: f64| {
            let q = state * state;
            let r = vision * vision;
            if q == 0.0 { 0.0 } else { q / (q + (q * r).sqrt()) }
        };
        VisionTrust {
            x: gain(state_std_devs[0], vision_std_devs[0]),
            y: gain(state_std_devs[1], vision_std_devs[1]),
            theta: gain(state_std_devs[2], vision_std_devs[2]),
        }
    }

    /// Returns `true` when every weight is finite and within `[0, 1]`.
    pub fn is_valid(&self) -> bool {
        [self.x, self.y, self.theta]
            .iter()
            .all(|w| w.is_finite() && (0.0..=1.0).contains(w))
    }

    /// Scales a correction twist axis by axis.
    pub fn apply(&self, correction: Twist) -> Twist {
        Twist::new(
            correction.dx * self.x,
            correction.dy * self.y,
            correction.dtheta * self.theta,
        )
    }
}

impl Default for VisionTrust {
    fn default() -> Self {
        VisionTrust::FULL
    }
}

/// A field-relative pose observed by the vision system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisionMeasurement {
    /// Observed robot pose.
    pub pose: Pose,
    /// Capture time, in the control loop's clock (s).
    pub timestamp: f64,
    /// Per-measurement trust. `None` uses the estimator's default.
    pub trust: Option<VisionTrust>,
}

impl VisionMeasurement {
    /// A measurement using the estimator's default trust.
    pub fn new(pose: Pose, timestamp: f64) -> Self {
        VisionMeasurement {
            pose,
            timestamp,
            trust: None,
        }
    }

    /// Overrides the trust for this measurement only.
    pub fn with_trust(mut self, trust: VisionTrust) -> Self {
        self.trust = Some(trust);
        self
    }

    /// Order in which measurements are fused: capture time first, then the
    /// measured pose, so frames sharing a timestamp fuse the same way
    /// whatever order they arrived in.
    pub fn fusion_order(&self, other: &Self) -> Ordering {
        self.timestamp
            .total_cmp(&other.timestamp)
            .then_with(|| self.pose.x.total_cmp(&other.pose.x))
            .then_with(|| self.pose.y.total_cmp(&other.pose.y))
            .then_with(|| self.pose.theta.total_cmp(&other.pose.theta))
    }
}

/// Why a vision measurement was discarded.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    /// Older than the retained odometry history.
    Stale,
    /// Timestamped after the latest odometry sample.
    Future,
    /// Non-finite pose or timestamp, or a trust weight outside `[0, 1]`.
    Invalid,
    /// No odometry has been recorded yet.
    NoHistory,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            RejectReason::Stale => "stale",
            RejectReason::Future => "future timestamp",
            RejectReason::Invalid => "invalid",
            RejectReason::NoHistory => "no odometry history",
        };
        f.write_str(reason)
    }
}

/// Result of offering one measurement to the fuser.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FusionOutcome {
    /// Folded in; carries the corrected pose at the measurement's timestamp.
    Applied(Pose),
    /// Discarded.
    Rejected(RejectReason),
}

impl FusionOutcome {
    /// Returns `true` for [`FusionOutcome::Applied`].
    pub fn is_applied(&self) -> bool {
        matches!(self, FusionOutcome::Applied(_))
    }
}

/// Running counts of fusion outcomes since start-up.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FusionStats {
    /// Measurements folded into the estimate.
    pub applied: u64,
    /// Older than the retained history.
    pub stale: u64,
    /// Newer than the latest odometry sample.
    pub future: u64,
    /// Non-finite values or out-of-range trust.
    pub invalid: u64,
    /// Arrived before any odometry was recorded.
    pub no_history: u64,
}

impl FusionStats {
    /// Total measurements discarded for any reason.
    pub fn rejected(&self) -> u64 {
        self.stale + self.future + self.invalid + self.no_history
    }

    pub(crate) fn record_rejection(&mut self, reason: RejectReason) {
        match reason {
            RejectReason::Stale => self.stale += 1,
            RejectReason::Future => self.future += 1,
            RejectReason::Invalid => self.invalid += 1,
            RejectReason::NoHistory => self.no_history += 1,
        }
    }
}

impl fmt::Display for FusionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "applied {}, stale {}, future {}, invalid {}, no history {}",
            self.applied, self.stale, self.future, self.invalid, self.no_history
        )
    }
}

type Pending = Arc<Mutex<Vec<VisionMeasurement>>>;

/// Consumer side of the vision hand-off, owned by the estimator.
#[derive(Debug, Default)]
pub struct VisionQueue {
    pending: Pending,
}

impl VisionQueue {
    /// An empty queue with no producers yet.
    pub fn new() -> Self {
        VisionQueue::default()
    }

    /// A producer handle that can be moved to another thread or task.
    pub fn sender(&self) -> VisionSender {
        VisionSender {
            pending: Arc::clone(&self.pending),
        }
    }

    /// Takes everything queued so far in fusion order, oldest capture time first.
    pub fn drain(&self) -> Vec<VisionMeasurement> {
        let mut batch = std::mem::take(&mut *self.pending.lock());
        batch.sort_by(VisionMeasurement::fusion_order);
        batch
    }

    /// Number of measurements waiting to be fused.
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    /// True when nothing is waiting to be fused.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Producer side of the vision hand-off.
///
/// Sending holds the lock only long enough to push, so a vision task never
/// stalls the control loop and vice versa.
#[derive(Debug, Clone)]
pub struct VisionSender {
    pending: Pending,
}

impl VisionSender {
    /// Queues a measurement for the next estimator update.
    pub fn send(&self, measurement: VisionMeasurement) {
        self.pending.lock().push(measurement);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_trust_validity() {
        assert!(VisionTrust::FULL.is_valid());
        assert!(VisionTrust::uniform(0.0).is_valid());
        assert!(!VisionTrust::uniform(1.5).is_valid());
        assert!(!VisionTrust::uniform(f64::NAN).is_valid());
        assert!(
            !VisionTrust {
                x: 0.5,
                y: -0.1,
                theta: 0.5
            }
            .is_valid()
        );
    }

    #[test]
    fn test_trust_from_std_devs() {
        // Equal uncertainty splits the difference.
        let even = VisionTrust::from_std_devs([0.5, 0.5, 0.5], [0.5, 0.5, 0.5]);
        assert!((even.x - 0.5).abs() < EPSILON);

        // Perfect odometry ignores vision; perfect vision is trusted fully.
        let trust = VisionTrust::from_std_devs([0.0, 0.1, 0.1], [0.9, 0.0, 0.3]);
        assert!(trust.x.abs() < EPSILON);
        assert!((trust.y - 1.0).abs() < EPSILON);
        assert!((trust.theta - 0.25).abs() < EPSILON);
        assert!(trust.is_valid());
    }

    #[test]
    fn test_trust_scales_each_axis() {
        let trust = VisionTrust {
            x: 1.0,
            y: 0.5,
            theta: 0.0,
        };
        let scaled = trust.apply(Twist::new(2.0, 2.0, 2.0));
        assert_eq!(scaled, Twist::new(2.0, 1.0, 0.0));
    }

    #[test]
    fn test_queue_drains_in_timestamp_order() {
        let queue = VisionQueue::new();
        let sender = queue.sender();
        let other = sender.clone();
        sender.send(VisionMeasurement::new(Pose::default(), 0.3));
        other.send(VisionMeasurement::new(Pose::default(), 0.1));
        sender.send(VisionMeasurement::new(Pose::default(), 0.2));
        assert_eq!(queue.len(), 3);

        let batch = queue.drain();
        let times: Vec<f64> = batch.iter().map(|m| m.timestamp).collect();
        assert_eq!(times, vec![0.1, 0.2, 0.3]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_queue_breaks_timestamp_ties_by_pose() {
        let queue = VisionQueue::new();
        let sender = queue.sender();
        sender.send(VisionMeasurement::new(Pose::new(0.2, 1.0, 0.0), 0.2));
        sender.send(VisionMeasurement::new(Pose::new(0.2, -1.0, 0.0), 0.2));
        sender.send(VisionMeasurement::new(Pose::new(0.1, 5.0, 0.0), 0.2));

        let ys: Vec<f64> = queue.drain().iter().map(|m| m.pose.y).collect();
        assert_eq!(ys, vec![5.0, -1.0, 1.0]);

        let a = VisionMeasurement::new(Pose::new(0.0, 0.0, 0.1), 0.2);
        let b = VisionMeasurement::new(Pose::new(0.0, 0.0, -0.1), 0.2);
        assert_eq!(a.fusion_order(&b), Ordering::Greater);
        assert_eq!(a.fusion_order(&a), Ordering::Equal);
    }

    #[test]
    fn test_sender_works_across_threads() {
        let queue = VisionQueue::new();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let sender = queue.sender();
                std::thread::spawn(move || {
                    sender.send(VisionMeasurement::new(Pose::default(), i as f64));
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(queue.drain().len(), 4);
    }

    #[test]
    fn test_stats_count_rejections() {
        let mut stats = FusionStats::default();
        stats.record_rejection(RejectReason::Stale);
        stats.record_rejection(RejectReason::Stale);
        stats.record_rejection(RejectReason::Future);
        assert_eq!(stats.stale, 2);
        assert_eq!(stats.rejected(), 3);
        assert_eq!(stats.applied, 0);
    }
}
