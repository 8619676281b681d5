use parking_lot::RwLock;
use std::{sync::Arc, time::Instant};
use strafe_estimation::FusionStats;
use strafe_kinematics::Pose;

/// Shared robot status, written by the control thread and the watchdog.
#[derive(Debug, Clone)]
pub struct State {
    pub pose: Pose,
    pub odometry_pose: Pose,
    pub fusion: FusionStats,
    pub cycles: u64,
    pub last_cycle_ts: Instant,
    pub faults: Vec<String>,
}

impl Default for State {
    fn default() -> Self {
        State {
            pose: Pose::default(),
            odometry_pose: Pose::default(),
            fusion: FusionStats::default(),
            cycles: 0,
            last_cycle_ts: Instant::now(),
            faults: Vec::new(),
        }
    }
}

pub type Blackboard = Arc<RwLock<State>>;

pub fn snapshot(bb: &Blackboard) -> State {
    (*bb.read()).clone()
}

/// Records a finished control cycle.
pub fn record_cycle(bb: &Blackboard, pose: Pose, odometry_pose: Pose, fusion: FusionStats) {
    let mut g = bb.write();
    g.pose = pose;
    g.odometry_pose = odometry_pose;
    g.fusion = fusion;
    g.cycles += 1;
    g.last_cycle_ts = Instant::now();
}

pub fn raise_fault(bb: &Blackboard, msg: &str) {
    let mut g = bb.write();
    if !g.faults.iter().any(|s| s == msg) {
        g.faults.push(msg.to_string());
    }
}

pub fn has_faults(bb: &Blackboard) -> bool {
    !bb.read().faults.is_empty()
}
