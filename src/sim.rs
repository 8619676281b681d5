//! Simulated motors, encoders and gyro sharing one physical world.
//!
//! Each motor drives an axis whose position its encoder reads back. The four
//! wheel axes also move the chassis, with a configurable amount of slip so
//! that dead reckoning drifts the way it does on carpet.

use std::convert::Infallible;
use std::sync::Arc;

use parking_lot::Mutex;
use strafe_drive::{HeadingSensor, PositionSensor, SpeedActuator};
use strafe_kinematics::{MecanumDrive, Pose, WheelSpeeds};
use tracing::warn;

use crate::config::RobotConfig;

/// A motorised axis in the simulated world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    FrontLeft,
    FrontRight,
    RearLeft,
    RearRight,
    Hood,
    Shooter,
    Turret,
}

impl Axis {
    pub const WHEELS: [Axis; 4] = [Axis::FrontLeft, Axis::FrontRight, Axis::RearLeft, Axis::RearRight];

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct AxisState {
    output: f64,
    rotations: f64,
    max_rps: f64,
}

impl AxisState {
    /// Advances by `dt` and returns the speed in rotations per second.
    fn step(&mut self, dt: f64) -> f64 {
        let rps = self.output.clamp(-1.0, 1.0) * self.max_rps;
        self.rotations += rps * dt;
        rps
    }
}

#[derive(Debug)]
pub struct SimWorld {
    axes: [AxisState; 7],
    truth: Pose,
    gyro_zero: f64,
    kinematics: MecanumDrive,
    meters_per_rotation: f64,
    slip: f64,
}

pub type SharedWorld = Arc<Mutex<SimWorld>>;

impl SimWorld {
    pub fn new(config: &RobotConfig, kinematics: MecanumDrive) -> Self {
        let meters_per_rotation = config.chassis.meters_per_rotation();
        let mut axes = [AxisState::default(); 7];
        for wheel in Axis::WHEELS {
            axes[wheel.index()].max_rps = config.chassis.max_linear_speed / meters_per_rotation;
        }
        axes[Axis::Hood.index()].max_rps = config.sim.hood_max_rps;
        axes[Axis::Shooter.index()].max_rps = 90.0;
        axes[Axis::Turret.index()].max_rps = config.sim.turret_max_rps;

        SimWorld {
            axes,
            truth: config.sim.start,
            gyro_zero: 0.0,
            kinematics,
            meters_per_rotation,
            slip: config.sim.slip.clamp(0.0, 1.0),
        }
    }

    pub fn shared(self) -> SharedWorld {
        Arc::new(Mutex::new(self))
    }

    /// Where the robot really is.
    pub fn truth(&self) -> Pose {
        self.truth
    }

    /// Advances every axis and moves the chassis by what the wheels did.
    pub fn step(&mut self, dt: f64) {
        if dt <= 0.0 {
            return;
        }
        let mut wheel_speeds = [0.0; 4];
        for (speed, wheel) in wheel_speeds.iter_mut().zip(Axis::WHEELS) {
            *speed = self.axes[wheel.index()].step(dt) * self.meters_per_rotation * (1.0 - self.slip);
        }
        for axis in [Axis::Hood, Axis::Shooter, Axis::Turret] {
            self.axes[axis.index()].step(dt);
        }

        match self
            .kinematics
            .update_pose_from_wheel_speeds(self.truth, WheelSpeeds::from_array(wheel_speeds), dt)
        {
            Ok(pose) => self.truth = pose,
            Err(e) => warn!(error = %e, "sim chassis step failed"),
        }
    }

    fn axis(&mut self, axis: Axis) -> &mut AxisState {
        &mut self.axes[axis.index()]
    }
}

/// A motor controller driving one simulated axis.
#[derive(Debug, Clone)]
pub struct SimMotor {
    world: SharedWorld,
    axis: Axis,
}

impl SimMotor {
    pub fn new(world: &SharedWorld, axis: Axis) -> Self {
        SimMotor {
            world: Arc::clone(world),
            axis,
        }
    }
}

impl SpeedActuator for SimMotor {
    type Error = Infallible;

    fn set_speed(&mut self, speed: f64) -> Result<(), Infallible> {
        self.world.lock().axis(self.axis).output = speed;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Infallible> {
        self.set_speed(0.0)
    }
}

/// The built-in encoder of a simulated motor, in rotations.
#[derive(Debug, Clone)]
pub struct SimEncoder {
    world: SharedWorld,
    axis: Axis,
    zero: f64,
}

impl SimEncoder {
    pub fn new(world: &SharedWorld, axis: Axis) -> Self {
        SimEncoder {
            world: Arc::clone(world),
            axis,
            zero: 0.0,
        }
    }
}

impl PositionSensor for SimEncoder {
    type Error = Infallible;

    fn position(&mut self) -> Result<f64, Infallible> {
        Ok(self.world.lock().axis(self.axis).rotations - self.zero)
    }

    fn reset(&mut self) -> Result<(), Infallible> {
        self.zero = self.world.lock().axis(self.axis).rotations;
        Ok(())
    }
}

/// Gyro reading the true chassis heading.
#[derive(Debug, Clone)]
pub struct SimGyro {
    world: SharedWorld,
}

impl SimGyro {
    pub fn new(world: &SharedWorld) -> Self {
        SimGyro {
            world: Arc::clone(world),
        }
    }
}

impl HeadingSensor for SimGyro {
    type Error = Infallible;

    fn heading(&mut self) -> Result<f64, Infallible> {
        let world = self.world.lock();
        Ok(Pose::normalize_angle(world.truth.theta - world.gyro_zero))
    }

    fn reset(&mut self) -> Result<(), Infallible> {
        let mut world = self.world.lock();
        world.gyro_zero = world.truth.theta;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::{ChassisConfig, RobotConfig, SimConfig};

    pub(crate) fn test_config() -> RobotConfig {
        RobotConfig {
            chassis: ChassisConfig {
                track_width: 0.5,
                wheelbase: 0.5,
                wheel_diameter: 0.1,
                gear_ratio: 1.0,
                max_linear_speed: 2.0,
            },
            drive: Default::default(),
            estimator: Default::default(),
            vision: Default::default(),
            turret: Default::default(),
            hood: Default::default(),
            telemetry: Default::default(),
            sim: SimConfig {
                slip: 0.0,
                start: Pose::default(),
                ..SimConfig::default()
            },
        }
    }

    fn world() -> SharedWorld {
        let config = test_config();
        let kinematics = config.chassis.kinematics().unwrap();
        SimWorld::new(&config, kinematics).shared()
    }

    #[test]
    fn test_wheels_move_chassis_and_encoders() {
        let world = world();
        let mut motors: Vec<SimMotor> = Axis::WHEELS.iter().map(|a| SimMotor::new(&world, *a)).collect();
        let mut encoder = SimEncoder::new(&world, Axis::FrontLeft);
        for motor in &mut motors {
            motor.set_speed(0.5).unwrap();
        }
        world.lock().step(1.0);

        // Half of 2 m/s for one second.
        let truth = world.lock().truth();
        assert!((truth.x - 1.0).abs() < 1e-9);
        assert!(truth.y.abs() < 1e-9);
        let meters = encoder.position().unwrap() * 0.1 * std::f64::consts::PI;
        assert!((meters - 1.0).abs() < 1e-9);

        encoder.reset().unwrap();
        assert_eq!(encoder.position().unwrap(), 0.0);
    }

    #[test]
    fn test_gyro_follows_rotation() {
        let world = world();
        let mut gyro = SimGyro::new(&world);
        let outputs = [-0.5, 0.5, -0.5, 0.5];
        for (axis, output) in Axis::WHEELS.iter().zip(outputs) {
            SimMotor::new(&world, *axis).set_speed(output).unwrap();
        }
        world.lock().step(0.1);
        let heading = gyro.heading().unwrap();
        // 1 m/s wheel speed over a 0.5 m lever arm.
        assert!((heading - 0.2).abs() < 1e-9);

        gyro.reset().unwrap();
        assert!(gyro.heading().unwrap().abs() < 1e-12);
    }

    #[test]
    fn test_slip_loses_travel() {
        let mut config = test_config();
        config.sim.slip = 0.1;
        let kinematics = config.chassis.kinematics().unwrap();
        let world = SimWorld::new(&config, kinematics).shared();
        for axis in Axis::WHEELS {
            SimMotor::new(&world, axis).set_speed(1.0).unwrap();
        }
        world.lock().step(1.0);
        assert!((world.lock().truth().x - 1.8).abs() < 1e-9);
    }
}
