//! Bounded-duration record of dead-reckoned poses.
//!
//! Vision frames describe where the robot was when the camera fired, which
//! can be several hundred milliseconds before they reach the estimator. The
//! history keeps enough recent odometry to answer "where did odometry think
//! we were at time t" for any t inside the retention window.

use std::collections::VecDeque;

use strafe_kinematics::{Pose, WheelPositions};

/// One control-cycle sample of the odometry state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OdometryHistoryEntry {
    /// Control-loop time of the sample (s).
    pub timestamp: f64,
    /// Wheel distances read during the cycle.
    pub wheel_positions: WheelPositions,
    /// Field heading used for the cycle (rad).
    pub heading: f64,
    /// Dead-reckoned pose at `timestamp`.
    pub pose: Pose,
}

impl OdometryHistoryEntry {
    fn interpolate(&self, end: &OdometryHistoryEntry, timestamp: f64) -> OdometryHistoryEntry {
        let span = end.timestamp - self.timestamp;
        let t = if span > 0.0 {
            (timestamp - self.timestamp) / span
        } else {
            0.0
        };
        let heading_change = Pose::normalize_angle(end.heading - self.heading);
        OdometryHistoryEntry {
            timestamp,
            wheel_positions: self.wheel_positions.interpolate(&end.wheel_positions, t),
            heading: Pose::normalize_angle(self.heading + heading_change * t),
            pose: self.pose.interpolate(&end.pose, t),
        }
    }
}

/// Timestamp-ordered odometry samples covering at most `window` seconds.
#[derive(Debug, Clone)]
pub struct PoseHistory {
    window: f64,
    entries: VecDeque<OdometryHistoryEntry>,
}

impl PoseHistory {
    /// Creates an empty history retaining `window` seconds of samples.
    pub fn new(window: f64) -> Self {
        PoseHistory {
            window,
            entries: VecDeque::new(),
        }
    }

    /// Retention window in seconds.
    pub fn window(&self) -> f64 {
        self.window
    }

    /// Number of retained samples.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when nothing has been recorded since the last clear.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Oldest retained sample.
    pub fn oldest(&self) -> Option<&OdometryHistoryEntry> {
        self.entries.front()
    }

    /// Most recent sample.
    pub fn latest(&self) -> Option<&OdometryHistoryEntry> {
        self.entries.back()
    }

    /// Appends a sample.
    ///
    /// Timestamps must increase. A sample with the same timestamp as the
    /// latest one replaces it; an older sample is refused and `false` is
    /// returned.
    pub fn record(&mut self, entry: OdometryHistoryEntry) -> bool {
        match self.entries.back_mut() {
            Some(last) if entry.timestamp < last.timestamp => false,
            Some(last) if entry.timestamp == last.timestamp => {
                *last = entry;
                true
            }
            _ => {
                self.entries.push_back(entry);
                true
            }
        }
    }

    /// Drops samples older than `now - window`.
    pub fn prune(&mut self, now: f64) {
        let cutoff = now - self.window;
        while self
            .entries
            .front()
            .is_some_and(|entry| entry.timestamp < cutoff)
        {
            self.entries.pop_front();
        }
    }

    /// Odometry state at `timestamp`, interpolated between the two samples
    /// that bracket it. `None` when `timestamp` is not finite or falls outside
    /// the retained range.
    pub fn sample(&self, timestamp: f64) -> Option<OdometryHistoryEntry> {
        if !timestamp.is_finite() {
            return None;
        }
        let oldest = self.entries.front()?;
        let latest = self.entries.back()?;
        if timestamp < oldest.timestamp || timestamp > latest.timestamp {
            return None;
        }

        let upper = self
            .entries
            .partition_point(|entry| entry.timestamp < timestamp);
        let upper_entry = &self.entries[upper];
        if upper == 0 || upper_entry.timestamp == timestamp {
            return Some(OdometryHistoryEntry {
                timestamp,
                ..*upper_entry
            });
        }
        let lower_entry = &self.entries[upper - 1];
        Some(lower_entry.interpolate(upper_entry, timestamp))
    }

    /// Forgets every sample.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    const EPSILON: f64 = 1e-9;

    fn entry(timestamp: f64, x: f64, heading: f64) -> OdometryHistoryEntry {
        OdometryHistoryEntry {
            timestamp,
            wheel_positions: WheelPositions::new(x, x, x, x),
            heading,
            pose: Pose::new(x, 0.0, heading),
        }
    }

    #[test]
    fn test_record_refuses_older_samples() {
        let mut history = PoseHistory::new(1.0);
        assert!(history.record(entry(0.0, 0.0, 0.0)));
        assert!(history.record(entry(0.1, 0.1, 0.0)));
        assert!(!history.record(entry(0.05, 0.2, 0.0)));
        assert_eq!(history.len(), 2);

        // Same timestamp replaces the latest sample.
        assert!(history.record(entry(0.1, 0.3, 0.0)));
        assert_eq!(history.len(), 2);
        assert!((history.latest().unwrap().pose.x - 0.3).abs() < EPSILON);
    }

    #[test]
    fn test_prune_keeps_window() {
        let mut history = PoseHistory::new(0.5);
        for i in 0..=10 {
            history.record(entry(i as f64 * 0.1, 0.0, 0.0));
        }
        history.prune(1.0);
        assert!((history.oldest().unwrap().timestamp - 0.5).abs() < EPSILON);
        assert!((history.latest().unwrap().timestamp - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_sample_interpolates_between_brackets() {
        let mut history = PoseHistory::new(2.0);
        history.record(entry(0.0, 0.0, 0.0));
        history.record(entry(1.0, 2.0, 0.0));

        let mid = history.sample(0.25).unwrap();
        assert!((mid.pose.x - 0.5).abs() < EPSILON);
        assert!((mid.wheel_positions.front_left - 0.5).abs() < EPSILON);
        assert!((mid.timestamp - 0.25).abs() < EPSILON);

        let exact = history.sample(1.0).unwrap();
        assert!((exact.pose.x - 2.0).abs() < EPSILON);
    }

    #[test]
    fn test_sample_heading_takes_short_way_round() {
        let mut history = PoseHistory::new(2.0);
        history.record(entry(0.0, 0.0, 3.0));
        history.record(entry(1.0, 0.0, -3.0));
        // 3.0 -> -3.0 crosses PI, a change of about +0.283 rad.
        let mid = history.sample(0.5).unwrap();
        assert!(mid.heading.abs() > 3.0);
    }

    #[test]
    fn test_sample_outside_range() {
        let mut history = PoseHistory::new(2.0);
        assert!(history.sample(0.0).is_none());
        history.record(entry(1.0, 0.0, 0.0));
        history.record(entry(2.0, 0.0, 0.0));
        assert!(history.sample(0.5).is_none());
        assert!(history.sample(2.5).is_none());
        assert!(history.sample(1.0).is_some());
    }

    #[test]
    fn test_sample_rejects_non_finite_timestamp() {
        let mut history = PoseHistory::new(2.0);
        history.record(entry(0.0, 0.0, 0.0));
        history.record(entry(1.0, 1.0, 0.0));
        assert!(history.sample(f64::NAN).is_none());
        assert!(history.sample(f64::INFINITY).is_none());
        assert!(history.sample(f64::NEG_INFINITY).is_none());
        assert!(history.sample(0.5).is_some());
    }
}
