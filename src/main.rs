mod blackboard;
mod bus;
mod config;
#[cfg(feature = "field-display")]
mod graphics;
mod robot;
mod sim;
mod telemetry;
mod vision;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::Context;
use blackboard::{Blackboard, has_faults, record_cycle};
use bus::Topic;
use robot::{DriverScript, Robot};
use sim::{Axis, SharedWorld, SimEncoder, SimGyro, SimMotor, SimWorld};
use spin_sleep::SpinSleeper;
use strafe_drive::{Hood, MecanumDrivetrain, Turret};
use telemetry::{PoseUpdate, telemetry_task, watchdog};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{DEFAULT_CONFIG_PATH, RobotConfig, load_config};

type SimRobot = Robot<SimMotor, SimEncoder, SimGyro>;

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();
}

fn config_path() -> String {
    std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
}

#[cfg(not(feature = "field-display"))]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    info!("Strafe robot started.");

    let config = load_config(&config_path())?;
    let pose_topic: Topic<PoseUpdate> = Topic::new(16);
    run(config, pose_topic).await
}

#[cfg(feature = "field-display")]
#[macroquad::main(graphics::window_conf)]
async fn main() {
    init_tracing();
    info!("Strafe robot started with field display.");

    let config = match load_config(&config_path()) {
        Ok(config) => config,
        Err(e) => {
            error!("Cannot start: {:#}", e);
            return;
        }
    };
    let tokio_rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to start the async runtime: {}", e);
            return;
        }
    };

    let pose_topic: Topic<PoseUpdate> = Topic::new(16);
    let pose_rx_for_vis = pose_topic.subscribe();
    tokio_rt.spawn(async move {
        if let Err(e) = run(config, pose_topic).await {
            error!("Robot program failed: {:#}", e);
        }
    });

    graphics::run_visualization_loop(pose_rx_for_vis).await;
}

async fn run(config: RobotConfig, pose_topic: Topic<PoseUpdate>) -> anyhow::Result<()> {
    let kinematics = config.chassis.kinematics()?;
    let world = SimWorld::new(&config, kinematics).shared();
    let robot = build_robot(&config, &world)?;

    let bb: Blackboard = Arc::default();
    let clock = Instant::now();
    let running = Arc::new(AtomicBool::new(true));
    let (stop_tx, stop_rx) = watch::channel(false);

    let vision = tokio::spawn(vision::vision_task(
        config.vision.clone(),
        Arc::clone(&world),
        clock,
        robot.vision_sender(),
        stop_rx.clone(),
    ));
    let telemetry = tokio::spawn(telemetry_task(
        config.telemetry,
        pose_topic.subscribe(),
        stop_rx.clone(),
    ));
    let watchdog_task = tokio::spawn(watchdog(Arc::clone(&bb), config.telemetry, stop_rx));

    info!("Spawning control thread...");
    let control = spawn_control_thread(
        robot,
        world,
        bb,
        pose_topic,
        clock,
        Duration::from_secs_f64(config.drive.loop_period),
        Arc::clone(&running),
    )?;

    wait_for_shutdown(config.sim.duration).await;

    info!("Shutting down.");
    running.store(false, Ordering::Relaxed);
    let _ = stop_tx.send(true);
    tokio::task::spawn_blocking(move || control.join())
        .await?
        .map_err(|_| anyhow::anyhow!("control thread panicked"))?;
    vision.await??;
    telemetry.await??;
    watchdog_task.await??;
    info!("Strafe robot stopped.");
    Ok(())
}

fn build_robot(config: &RobotConfig, world: &SharedWorld) -> anyhow::Result<SimRobot> {
    let kinematics = config.chassis.kinematics()?;
    let drivetrain = MecanumDrivetrain::new(
        Axis::WHEELS.map(|axis| SimMotor::new(world, axis)),
        Axis::WHEELS.map(|axis| SimEncoder::new(world, axis)),
        kinematics,
        config.chassis.meters_per_rotation(),
    )?;
    let hood = Hood::new(
        SimMotor::new(world, Axis::Hood),
        SimEncoder::new(world, Axis::Hood),
        SimMotor::new(world, Axis::Shooter),
        config.hood,
    );
    let turret = Turret::new(
        SimMotor::new(world, Axis::Turret),
        SimEncoder::new(world, Axis::Turret),
        config.turret,
    )?;
    Robot::new(config, drivetrain, hood, turret, SimGyro::new(world), DriverScript::demo())
}

/// Runs the control loop on its own thread at `period`, stepping the
/// simulated world before each robot cycle.
fn spawn_control_thread(
    mut robot: SimRobot,
    world: SharedWorld,
    bb: Blackboard,
    pose_topic: Topic<PoseUpdate>,
    clock: Instant,
    period: Duration,
    running: Arc<AtomicBool>,
) -> anyhow::Result<JoinHandle<()>> {
    let reader = robot.pose_reader();
    let handle = std::thread::Builder::new()
        .name("control".into())
        .spawn(move || {
            info!(period = ?period, "Control thread started.");
            let sleeper = SpinSleeper::new(1_000);
            let mut last = clock.elapsed().as_secs_f64();
            let mut next_cycle = Instant::now();
            while running.load(Ordering::Relaxed) {
                next_cycle += period;
                let now = clock.elapsed().as_secs_f64();
                let dt = now - last;
                last = now;

                world.lock().step(dt);
                robot.cycle(now, dt, !has_faults(&bb));

                let snapshot = reader.snapshot();
                record_cycle(&bb, snapshot.pose, snapshot.odometry_pose, snapshot.stats);
                pose_topic.publish(PoseUpdate {
                    snapshot,
                    truth: world.lock().truth(),
                });

                let now = Instant::now();
                if next_cycle > now {
                    sleeper.sleep(next_cycle - now);
                } else {
                    warn!(overrun = ?(now - next_cycle), "control cycle overran");
                    next_cycle = now;
                }
            }
            robot.disable();
            info!(stats = %robot.stats(), "Control thread stopped.");
        })
        .context("spawning control thread")?;
    Ok(handle)
}

/// Resolves on Ctrl-C, or once `duration` seconds have passed if positive.
async fn wait_for_shutdown(duration: f64) {
    let timer = async {
        if duration > 0.0 {
            tokio::time::sleep(Duration::from_secs_f64(duration)).await;
        } else {
            std::future::pending::<()>().await;
        }
    };
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for Ctrl-C: {}", e);
            }
        }
        _ = timer => info!(duration, "Run time elapsed."),
    }
}
