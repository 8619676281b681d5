use std::time::{Duration, Instant};

use strafe_estimation::{VisionMeasurement, VisionSender};
use strafe_kinematics::Pose;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::config::VisionConfig;
use crate::sim::SharedWorld;

/// What the camera reports for frame `frame` of a robot at `truth`. The error
/// is a deterministic wobble of amplitude `noise` so runs are repeatable.
pub fn observe(truth: Pose, frame: u64, noise: f64) -> Pose {
    let k = frame as f64;
    Pose::new(
        truth.x + noise * (1.7 * k).sin(),
        truth.y + noise * (2.3 * k).cos(),
        truth.theta + 0.5 * noise * (0.9 * k).sin(),
    )
}

/// Simulated camera pipeline. Every `period` a frame is captured from the
/// true pose and stamped with the control clock; it is delivered to the
/// estimator `latency` later, so measurements always arrive in the past.
pub async fn vision_task(
    config: VisionConfig,
    world: SharedWorld,
    clock: Instant,
    sender: VisionSender,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    if !config.enabled {
        info!("Vision disabled, running on odometry alone.");
        return Ok(());
    }
    info!(camera = %config.camera_name, latency = config.latency, "Vision task started.");

    let latency = Duration::from_secs_f64(config.latency.max(0.0));
    let mut tick = tokio::time::interval(Duration::from_secs_f64(config.period));
    let mut frame: u64 = 0;
    loop {
        tokio::select! {
            _ = tick.tick() => {}
            _ = shutdown.changed() => break,
        }

        let truth = world.lock().truth();
        let captured_at = clock.elapsed().as_secs_f64();
        let measurement = VisionMeasurement::new(observe(truth, frame, config.noise), captured_at);
        frame += 1;

        let sender = sender.clone();
        tokio::spawn(async move {
            tokio::time::sleep(latency).await;
            debug!(timestamp = measurement.timestamp, pose = %measurement.pose, "vision frame delivered");
            sender.send(measurement);
        });
    }

    info!(frames = frame, "Vision task stopped.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimWorld;
    use crate::sim::tests::test_config;
    use strafe_estimation::VisionQueue;

    #[test]
    fn test_observation_error_is_bounded() {
        let truth = Pose::new(1.0, -2.0, 0.5);
        for frame in 0..100 {
            let seen = observe(truth, frame, 0.05);
            assert!((seen.x - truth.x).abs() <= 0.05 + 1e-12);
            assert!((seen.y - truth.y).abs() <= 0.05 + 1e-12);
            assert!((seen.theta - truth.theta).abs() <= 0.025 + 1e-12);
        }
        assert_eq!(observe(truth, 3, 0.0), truth);
    }

    #[tokio::test]
    async fn test_frames_arrive_stamped_in_the_past() {
        let config = test_config();
        let kinematics = config.chassis.kinematics().unwrap();
        let world = SimWorld::new(&config, kinematics).shared();
        let queue = VisionQueue::new();
        let (stop_tx, stop_rx) = watch::channel(false);
        let clock = Instant::now();

        let vision = VisionConfig {
            period: 0.01,
            latency: 0.02,
            ..VisionConfig::default()
        };
        let task = tokio::spawn(vision_task(vision, world, clock, queue.sender(), stop_rx));
        tokio::time::sleep(Duration::from_millis(150)).await;
        stop_tx.send(true).unwrap();
        task.await.unwrap().unwrap();

        let received_at = clock.elapsed().as_secs_f64();
        let frames = queue.drain();
        assert!(!frames.is_empty());
        assert!(frames.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert!(frames.iter().all(|m| m.timestamp + 0.02 <= received_at));
    }

    #[tokio::test]
    async fn test_disabled_vision_returns_immediately() {
        let config = test_config();
        let kinematics = config.chassis.kinematics().unwrap();
        let world = SimWorld::new(&config, kinematics).shared();
        let queue = VisionQueue::new();
        let (_stop_tx, stop_rx) = watch::channel(false);
        let vision = VisionConfig {
            enabled: false,
            ..VisionConfig::default()
        };
        vision_task(vision, world, Instant::now(), queue.sender(), stop_rx)
            .await
            .unwrap();
        assert!(queue.is_empty());
    }
}
