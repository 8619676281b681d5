use std::convert::Infallible;

use strafe_drive::*;
use strafe_kinematics::MecanumDrive;

/// Prints what each wheel is told to do as a stick is pushed fully
/// forward-left while twisting.
struct PrintMotor(&'static str);

impl SpeedActuator for PrintMotor {
    type Error = Infallible;

    fn set_speed(&mut self, speed: f64) -> Result<(), Infallible> {
        print!("{}: {:+.3}  ", self.0, speed);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Infallible> {
        self.set_speed(0.0)
    }
}

struct StillEncoder;

impl PositionSensor for StillEncoder {
    type Error = Infallible;

    fn position(&mut self) -> Result<f64, Infallible> {
        Ok(0.0)
    }

    fn reset(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}

fn main() {
    let config = DriveConfig::default();
    let kinematics = match MecanumDrive::new(0.55, 0.5) {
        Ok(k) => k,
        Err(e) => {
            eprintln!("Error creating kinematics: {}", e);
            return;
        }
    };
    let motors = [
        PrintMotor("FL"),
        PrintMotor("FR"),
        PrintMotor("RL"),
        PrintMotor("RR"),
    ];
    let encoders = [StillEncoder, StillEncoder, StillEncoder, StillEncoder];
    let mut drivetrain = match MecanumDrivetrain::new(
        motors,
        encoders,
        kinematics,
        meters_per_rotation(0.1524, 8.45),
    ) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error creating drivetrain: {}", e);
            return;
        }
    };
    let mut mapper = DriveCommandMapper::new(config);

    for cycle in 0..=50 {
        let command = mapper.map(1.0, 1.0, -0.5, config.loop_period);
        if cycle % 10 == 0 {
            print!("t = {:.2} s  ", cycle as f64 * config.loop_period);
            if let Err(e) = drivetrain.drive_cartesian(command) {
                eprintln!("Error driving: {}", e);
                return;
            }
            println!();
        }
    }
    if let Err(e) = drivetrain.stop() {
        eprintln!("Error stopping: {}", e);
    }
    println!();
}
