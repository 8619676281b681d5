use std::collections::VecDeque;

use strafe_drive::{
    DriveCommandMapper, DriveError, HeadingSensor, Hood, MecanumDrivetrain, PositionSensor,
    SpeedActuator, Turret,
};
use strafe_estimation::{FusionStats, PoseEstimator, PoseReader, VisionSender};
use strafe_kinematics::Pose;
use tracing::{debug, info, warn};

use crate::config::RobotConfig;

/// Raw gamepad axes. Pushing a stick up or left reads negative.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Sticks {
    pub left_x: f64,
    pub left_y: f64,
    pub right_x: f64,
}

impl Sticks {
    pub const fn new(left_x: f64, left_y: f64, right_x: f64) -> Self {
        Sticks {
            left_x,
            left_y,
            right_x,
        }
    }

    /// Forward, left and counter-clockwise requests in drive convention.
    pub fn to_drive_axes(self) -> (f64, f64, f64) {
        (-self.left_y, -self.left_x, -self.right_x)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MechanismEvent {
    HoodSetpoint(f64),
    OpenHood,
    CloseHood,
    StopHood,
    Shoot,
    StopShooter,
    TurretAngle(f64),
    StopTurret,
}

/// Timed stick inputs and button presses standing in for a driver.
#[derive(Debug, Clone, Default)]
pub struct DriverScript {
    /// `(until, sticks)`, ordered by `until`.
    phases: Vec<(f64, Sticks)>,
    events: VecDeque<(f64, MechanismEvent)>,
}

impl DriverScript {
    pub fn new(mut phases: Vec<(f64, Sticks)>, mut events: Vec<(f64, MechanismEvent)>) -> Self {
        phases.sort_by(|a, b| a.0.total_cmp(&b.0));
        events.sort_by(|a, b| a.0.total_cmp(&b.0));
        DriverScript {
            phases,
            events: events.into(),
        }
    }

    /// A short routine that drives every axis and exercises both mechanisms.
    pub fn demo() -> Self {
        DriverScript::new(
            vec![
                (0.5, Sticks::default()),
                (2.5, Sticks::new(0.0, -0.6, 0.0)),
                (4.5, Sticks::new(-0.6, 0.0, 0.0)),
                (6.0, Sticks::new(0.0, 0.0, -0.7)),
                (8.5, Sticks::new(0.4, 0.4, 0.0)),
                (10.0, Sticks::new(0.0, -0.5, 0.3)),
            ],
            vec![
                (1.0, MechanismEvent::HoodSetpoint(1.5)),
                (2.0, MechanismEvent::TurretAngle(90.0)),
                (3.0, MechanismEvent::Shoot),
                (5.0, MechanismEvent::StopShooter),
                (6.0, MechanismEvent::TurretAngle(-170.0)),
                (7.0, MechanismEvent::HoodSetpoint(0.0)),
                (9.5, MechanismEvent::StopTurret),
            ],
        )
    }

    /// Sticks held at `now`; centred once the script has run out.
    pub fn sticks(&self, now: f64) -> Sticks {
        self.phases
            .iter()
            .find(|(until, _)| now < *until)
            .map(|(_, sticks)| *sticks)
            .unwrap_or_default()
    }

    /// Removes and returns every event due at or before `now`.
    pub fn due_events(&mut self, now: f64) -> Vec<MechanismEvent> {
        let mut due = Vec::new();
        while let Some((at, event)) = self.events.front().copied() {
            if at > now {
                break;
            }
            self.events.pop_front();
            due.push(event);
        }
        due
    }
}

/// Everything the control thread owns: the drivetrain, the estimator and the
/// mechanisms.
pub struct Robot<A, S, G> {
    drivetrain: MecanumDrivetrain<A, S>,
    mapper: DriveCommandMapper,
    estimator: PoseEstimator,
    hood: Hood<A, S>,
    turret: Turret<A, S>,
    gyro: G,
    script: DriverScript,
    enabled: bool,
}

impl<A, S, G> Robot<A, S, G>
where
    A: SpeedActuator,
    S: PositionSensor,
    G: HeadingSensor,
{
    pub fn new(
        config: &RobotConfig,
        mut drivetrain: MecanumDrivetrain<A, S>,
        hood: Hood<A, S>,
        turret: Turret<A, S>,
        mut gyro: G,
        script: DriverScript,
    ) -> anyhow::Result<Self> {
        let mut estimator = PoseEstimator::new(*drivetrain.kinematics(), config.estimator)?;

        drivetrain.reset_encoders()?;
        gyro.reset().map_err(|e| anyhow::anyhow!("gyro reset failed: {e}"))?;
        let heading = gyro.heading().ok();
        let positions = drivetrain.wheel_positions()?;
        estimator.reset_pose(Pose::default(), heading, Some(positions));
        info!(kinematics = %drivetrain.kinematics(), "robot initialised at the origin");

        Ok(Robot {
            drivetrain,
            mapper: DriveCommandMapper::new(config.drive),
            estimator,
            hood,
            turret,
            gyro,
            script,
            enabled: true,
        })
    }

    pub fn vision_sender(&self) -> VisionSender {
        self.estimator.vision_sender()
    }

    pub fn pose_reader(&self) -> PoseReader {
        self.estimator.pose_reader()
    }

    pub fn stats(&self) -> FusionStats {
        self.estimator.stats()
    }

    /// Runs one control cycle at control-loop time `now`. A disabled robot
    /// stops every actuator but keeps estimating.
    pub fn cycle(&mut self, now: f64, dt: f64, enabled: bool) -> Pose {
        if enabled {
            self.drive(now, dt);
            for event in self.script.due_events(now) {
                if let Err(e) = self.apply(event) {
                    warn!(error = %e, ?event, "mechanism command failed");
                }
            }
        } else if self.enabled {
            warn!("robot disabled, stopping all actuators");
            self.disable();
        }
        self.enabled = enabled;

        let pose = self.estimate(now);

        if enabled {
            if let Err(e) = self.hood.periodic(dt) {
                warn!(error = %e, "hood periodic failed");
            }
            if let Err(e) = self.turret.periodic(dt) {
                warn!(error = %e, "turret periodic failed");
            }
        }
        pose
    }

    fn drive(&mut self, now: f64, dt: f64) {
        let (forward, sideways, rotate) = self.script.sticks(now).to_drive_axes();
        let command = self.mapper.map(forward, sideways, rotate, dt);
        if let Err(e) = self.drivetrain.drive_cartesian(command) {
            warn!(error = %e, "drive command failed, stopping drivetrain");
            if let Err(e) = self.drivetrain.stop() {
                warn!(error = %e, "drivetrain stop failed");
            }
        }
    }

    fn estimate(&mut self, now: f64) -> Pose {
        let positions = match self.drivetrain.wheel_positions() {
            Ok(positions) => positions,
            Err(e) => {
                warn!(error = %e, "wheel positions unavailable, skipping estimator update");
                return self.estimator.estimated_position();
            }
        };
        let heading = match self.gyro.heading() {
            Ok(heading) => Some(heading),
            Err(e) => {
                debug!(error = %e, "gyro unavailable, integrating wheel rotation");
                None
            }
        };
        self.estimator.update(positions, heading, now)
    }

    /// Stops every actuator and drops any drive ramp in progress.
    pub fn disable(&mut self) {
        self.mapper.reset();
        let results = [self.drivetrain.stop(), self.hood.stop(), self.hood.stop_shooter(), self.turret.stop()];
        for e in results.into_iter().filter_map(Result::err) {
            warn!(error = %e, "stop failed");
        }
    }

    fn apply(&mut self, event: MechanismEvent) -> Result<(), DriveError> {
        debug!(?event, "mechanism event");
        match event {
            MechanismEvent::HoodSetpoint(setpoint) => {
                self.hood.set_setpoint(setpoint);
                Ok(())
            }
            MechanismEvent::OpenHood => self.hood.open(),
            MechanismEvent::CloseHood => self.hood.close(),
            MechanismEvent::StopHood => self.hood.stop(),
            MechanismEvent::Shoot => self.hood.shoot(),
            MechanismEvent::StopShooter => self.hood.stop_shooter(),
            MechanismEvent::TurretAngle(angle) => {
                self.turret.set_position(angle);
                Ok(())
            }
            MechanismEvent::StopTurret => self.turret.stop(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{Axis, SimEncoder, SimGyro, SimMotor, SimWorld, SharedWorld};
    use crate::sim::tests::test_config;
    use strafe_drive::meters_per_rotation;

    const EPSILON: f64 = 1e-6;

    fn build(script: DriverScript) -> (SharedWorld, Robot<SimMotor, SimEncoder, SimGyro>) {
        let config = test_config();
        let kinematics = config.chassis.kinematics().unwrap();
        let world = SimWorld::new(&config, kinematics).shared();
        let drivetrain = MecanumDrivetrain::new(
            Axis::WHEELS.map(|a| SimMotor::new(&world, a)),
            Axis::WHEELS.map(|a| SimEncoder::new(&world, a)),
            kinematics,
            meters_per_rotation(config.chassis.wheel_diameter, config.chassis.gear_ratio),
        )
        .unwrap();
        let hood = Hood::new(
            SimMotor::new(&world, Axis::Hood),
            SimEncoder::new(&world, Axis::Hood),
            SimMotor::new(&world, Axis::Shooter),
            config.hood,
        );
        let turret = Turret::new(
            SimMotor::new(&world, Axis::Turret),
            SimEncoder::new(&world, Axis::Turret),
            config.turret,
        )
        .unwrap();
        let robot = Robot::new(&config, drivetrain, hood, turret, SimGyro::new(&world), script).unwrap();
        (world, robot)
    }

    fn run(world: &SharedWorld, robot: &mut Robot<SimMotor, SimEncoder, SimGyro>, seconds: f64, enabled: bool) {
        let dt = 0.02;
        let steps = (seconds / dt).round() as usize;
        let start = robot.estimator.history().latest().map_or(0.0, |e| e.timestamp);
        for i in 1..=steps {
            world.lock().step(dt);
            robot.cycle(start + i as f64 * dt, dt, enabled);
        }
    }

    #[test]
    fn test_stick_axes_follow_drive_convention() {
        let (forward, sideways, rotate) = Sticks::new(-0.2, -0.5, 0.3).to_drive_axes();
        assert_eq!((forward, sideways, rotate), (0.5, 0.2, -0.3));
    }

    #[test]
    fn test_script_phases_and_events() {
        let mut script = DriverScript::new(
            vec![(2.0, Sticks::new(0.0, -1.0, 0.0)), (1.0, Sticks::default())],
            vec![(1.5, MechanismEvent::Shoot), (0.5, MechanismEvent::OpenHood)],
        );
        assert_eq!(script.sticks(0.5), Sticks::default());
        assert_eq!(script.sticks(1.5), Sticks::new(0.0, -1.0, 0.0));
        assert_eq!(script.sticks(5.0), Sticks::default());

        assert!(script.due_events(0.2).is_empty());
        assert_eq!(script.due_events(2.0), vec![MechanismEvent::OpenHood, MechanismEvent::Shoot]);
        assert!(script.due_events(3.0).is_empty());
    }

    #[test]
    fn test_odometry_tracks_truth_without_slip() {
        let script = DriverScript::new(
            vec![(1.0, Sticks::new(-0.3, -0.8, -0.4))],
            Vec::new(),
        );
        let (world, mut robot) = build(script);
        run(&world, &mut robot, 2.0, true);

        let truth = world.lock().truth();
        let estimate = robot.estimator.estimated_position();
        assert!(truth.x > 0.1);
        assert!((estimate.x - truth.x).abs() < EPSILON);
        assert!((estimate.y - truth.y).abs() < EPSILON);
        assert!((estimate.theta - truth.theta).abs() < EPSILON);
    }

    #[test]
    fn test_disabled_robot_stops_wheels() {
        let script = DriverScript::new(vec![(10.0, Sticks::new(0.0, -1.0, 0.0))], Vec::new());
        let (world, mut robot) = build(script);
        run(&world, &mut robot, 0.5, true);
        assert!(robot.drivetrain.last_output().front_left > 0.0);

        run(&world, &mut robot, 0.1, false);
        let stopped = world.lock().truth();
        assert_eq!(robot.drivetrain.last_output().front_left, 0.0);
        run(&world, &mut robot, 0.5, false);
        assert_eq!(world.lock().truth(), stopped);
    }

    #[test]
    fn test_turret_reaches_scripted_angle() {
        let script = DriverScript::new(Vec::new(), vec![(0.0, MechanismEvent::TurretAngle(45.0))]);
        let (world, mut robot) = build(script);
        run(&world, &mut robot, 3.0, true);
        let angle = robot.turret.position().unwrap();
        assert!((angle - 45.0).abs() < 2.0, "turret at {angle}");
    }
}
