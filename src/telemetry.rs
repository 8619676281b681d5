use std::sync::Arc;
use std::time::{Duration, Instant};

use strafe_estimation::PoseSnapshot;
use strafe_kinematics::Pose;
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};

use crate::blackboard::{Blackboard, raise_fault, snapshot};
use crate::config::TelemetryConfig;

pub const WATCHDOG_FAULT: &str = "control loop stalled";

/// Published by the control thread after every cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseUpdate {
    pub snapshot: PoseSnapshot,
    /// Simulated ground truth, for judging the estimate.
    pub truth: Pose,
}

impl PoseUpdate {
    /// Straight-line distance between the fused estimate and the truth (m).
    pub fn position_error(&self) -> f64 {
        (self.snapshot.pose.x - self.truth.x).hypot(self.snapshot.pose.y - self.truth.y)
    }

    /// Same as [`PoseUpdate::position_error`] for dead reckoning alone.
    pub fn odometry_error(&self) -> f64 {
        (self.snapshot.odometry_pose.x - self.truth.x).hypot(self.snapshot.odometry_pose.y - self.truth.y)
    }
}

/// Logs the most recent pose every `period`.
pub async fn telemetry_task(
    config: TelemetryConfig,
    mut pose_rx: broadcast::Receiver<Arc<PoseUpdate>>,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    info!("Telemetry task started.");
    let mut tick = tokio::time::interval(Duration::from_secs_f64(config.period));
    let mut latest: Option<Arc<PoseUpdate>> = None;
    loop {
        tokio::select! {
            _ = tick.tick() => {}
            _ = shutdown.changed() => break,
        }

        loop {
            match pose_rx.try_recv() {
                Ok(update) => latest = Some(update),
                Err(broadcast::error::TryRecvError::Empty) => break,
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(broadcast::error::TryRecvError::Closed) => {
                    info!("Pose topic closed, telemetry stopping.");
                    return Ok(());
                }
            }
        }

        if let Some(update) = &latest {
            let s = &update.snapshot;
            info!(
                t = s.timestamp,
                x = s.pose.x,
                y = s.pose.y,
                theta = s.pose.theta,
                error = update.position_error(),
                odometry_error = update.odometry_error(),
                applied = s.stats.applied,
                rejected = s.stats.rejected(),
                "pose"
            );
        }
    }

    if let Some(update) = latest {
        info!(
            fused = %update.snapshot.pose,
            odometry = %update.snapshot.odometry_pose,
            truth = %update.truth,
            stats = %update.snapshot.stats,
            "Final estimate."
        );
    }
    Ok(())
}

/// Raises a blackboard fault when control cycles stop arriving. The control
/// loop stops driving while any fault is raised.
pub async fn watchdog(
    bb: Blackboard,
    config: TelemetryConfig,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    info!("Watchdog task started.");
    let timeout = Duration::from_secs_f64(config.watchdog_timeout);
    let mut tick = tokio::time::interval(Duration::from_millis(25));
    loop {
        tokio::select! {
            _ = tick.tick() => {}
            _ = shutdown.changed() => break,
        }

        let state = snapshot(&bb);
        if state.cycles == 0 {
            continue;
        }
        let age = Instant::now() - state.last_cycle_ts;
        if age > timeout && !state.faults.iter().any(|f| f == WATCHDOG_FAULT) {
            warn!(?age, cycles = state.cycles, "Control cycle timeout! Disabling drive.");
            raise_fault(&bb, WATCHDOG_FAULT);
        }
    }
    Ok(())
}
