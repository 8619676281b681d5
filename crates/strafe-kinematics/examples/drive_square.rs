use strafe_kinematics::*;

fn main() {
    let track_width = 0.55;
    let wheelbase = 0.5;
    let kinematics_result = MecanumDrive::new(track_width, wheelbase);

    let mut current_pose = Pose::new(0.0, 0.0, 0.0);
    // One side of the square per leg, strafing without turning.
    let legs = [
        ChassisSpeeds::new(1.0, 0.0, 0.0),
        ChassisSpeeds::new(0.0, 1.0, 0.0),
        ChassisSpeeds::new(-1.0, 0.0, 0.0),
        ChassisSpeeds::new(0.0, -1.0, 0.0),
    ];
    let dt = 0.1; // Time step in seconds
    let steps_per_leg = 10;

    match kinematics_result {
        Ok(kinematics) => {
            println!("Initializing simulation...");
            println!("  {}", kinematics);
            println!("  Initial Pose: {}", current_pose);

            for (leg, speeds) in legs.iter().enumerate() {
                let wheels = kinematics.to_wheel_speeds(*speeds);
                println!("\nLeg {}: chassis {} -> wheels {}", leg + 1, speeds, wheels);

                for step in 0..steps_per_leg {
                    match kinematics.update_pose_from_wheel_speeds(current_pose, wheels, dt) {
                        Ok(new_pose) => {
                            current_pose = new_pose;
                            println!("  Step {:>2}: Pose: {}", step + 1, current_pose);
                        }
                        Err(e) => {
                            eprintln!("Error during simulation step {}: {}", step + 1, e);
                            return;
                        }
                    }
                }
            }

            println!("\nSimulation complete.");
            println!("Final Pose: {:?}", current_pose);
        }
        Err(e) => {
            eprintln!("Failed to initialize kinematics: {}", e);
            eprintln!(
                "Please ensure track_width ({}) and wheelbase ({}) are positive.",
                track_width, wheelbase
            );
        }
    }
}
