use strafe_estimation::*;
use strafe_kinematics::*;

/// Drives a slow arc for two seconds while a camera with 150 ms latency
/// reports the true pose, starting from a wrong initial guess. Prints the
/// dead-reckoned and fused poses so the correction can be seen settling.
fn main() {
    let kinematics = match MecanumDrive::new(0.55, 0.5) {
        Ok(k) => k,
        Err(e) => {
            eprintln!("Error creating kinematics: {}", e);
            return;
        }
    };
    let mut estimator = match PoseEstimator::new(kinematics, EstimatorConfig::default()) {
        Ok(estimator) => estimator,
        Err(e) => {
            eprintln!("Error creating estimator: {}", e);
            return;
        }
    };

    // Odometry believes it starts at the origin; the robot is really 0.3 m to the left.
    let mut truth = Pose::new(0.0, 0.3, 0.0);
    let speeds = ChassisSpeeds::new(0.8, 0.0, 0.4);
    let wheel_speeds = kinematics.to_wheel_speeds(speeds);
    let mut distances = WheelPositions::default();

    let dt = 0.02;
    let latency = 0.15;
    let mut pending: Vec<VisionMeasurement> = Vec::new();
    let sender = estimator.vision_sender();

    for step in 0..=100 {
        let now = step as f64 * dt;
        if step > 0 {
            truth = match kinematics.update_pose(truth, speeds, dt) {
                Ok(pose) => pose,
                Err(e) => {
                    eprintln!("Error updating pose: {}", e);
                    return;
                }
            };
            let mut wheels = distances.as_array();
            for (wheel, speed) in wheels.iter_mut().zip(wheel_speeds.as_array()) {
                *wheel += speed * dt;
            }
            distances = WheelPositions::from_array(wheels);
        }

        // A frame every 100 ms, delivered `latency` seconds later.
        if step % 5 == 0 {
            pending.push(VisionMeasurement::new(truth, now));
        }
        pending.retain(|m| {
            if now - m.timestamp >= latency {
                sender.send(*m);
                false
            } else {
                true
            }
        });

        let fused = estimator.update(distances, Some(truth.theta), now);
        if step % 10 == 0 {
            println!(
                "t = {:.2} s  truth {}  odometry {}  fused {}",
                now,
                truth,
                estimator.odometry_pose(),
                fused
            );
        }
    }
    println!("\n{}", estimator.stats());
}
