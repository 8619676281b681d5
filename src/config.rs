use anyhow::Context;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use strafe_drive::{DriveConfig, HoodConfig, TurretConfig, meters_per_rotation};
use strafe_estimation::EstimatorConfig;
use strafe_kinematics::{MecanumDrive, MecanumGeometry, Pose};
use tracing::{error, info};

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Chassis geometry and drive limits.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ChassisConfig {
    /// Left-to-right wheel spacing (m).
    pub track_width: f64,
    /// Front-to-rear wheel spacing (m).
    pub wheelbase: f64,
    /// Wheel diameter (m).
    pub wheel_diameter: f64,
    /// Motor rotations per wheel rotation.
    pub gear_ratio: f64,
    /// Wheel surface speed at full output (m/s).
    pub max_linear_speed: f64,
}

impl ChassisConfig {
    pub fn kinematics(&self) -> anyhow::Result<MecanumDrive> {
        MecanumGeometry {
            track_width: self.track_width,
            wheelbase: self.wheelbase,
        }
        .build()
        .map_err(|e| anyhow::anyhow!("chassis geometry: {e}"))
    }

    pub fn meters_per_rotation(&self) -> f64 {
        meters_per_rotation(self.wheel_diameter, self.gear_ratio)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    pub enabled: bool,
    pub camera_name: String,
    /// Capture-to-delivery delay of simulated frames (s).
    pub latency: f64,
    /// Time between simulated frames (s).
    pub period: f64,
    /// Amplitude of the deterministic error added to simulated frames (m).
    pub noise: f64,
}

impl Default for VisionConfig {
    fn default() -> Self {
        VisionConfig {
            enabled: true,
            camera_name: "front".to_string(),
            latency: 0.15,
            period: 0.1,
            noise: 0.02,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Time between telemetry log lines (s).
    pub period: f64,
    /// Control cycles older than this trip the watchdog (s).
    pub watchdog_timeout: f64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        TelemetryConfig {
            period: 0.5,
            watchdog_timeout: 0.1,
        }
    }
}

/// Simulated world in place of real hardware.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Stop after this many seconds; zero runs until interrupted.
    pub duration: f64,
    /// Fraction of wheel travel lost to slip, so odometry drifts.
    pub slip: f64,
    /// Where the robot really starts. The estimator always starts at the origin.
    pub start: Pose,
    /// Hood travel at full output (motor rotations per second).
    pub hood_max_rps: f64,
    /// Turret travel at full output (motor rotations per second).
    pub turret_max_rps: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            duration: 12.0,
            slip: 0.03,
            start: Pose::new(0.3, -0.2, 0.0),
            hood_max_rps: 2.0,
            turret_max_rps: 50.0,
        }
    }
}

/// Everything the robot program reads at start-up.
#[derive(Debug, Clone, Deserialize)]
pub struct RobotConfig {
    pub chassis: ChassisConfig,
    #[serde(default)]
    pub drive: DriveConfig,
    #[serde(default)]
    pub estimator: EstimatorConfig,
    #[serde(default)]
    pub vision: VisionConfig,
    #[serde(default)]
    pub turret: TurretConfig,
    #[serde(default)]
    pub hood: HoodConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub sim: SimConfig,
}

/// Loads `path` (TOML, required) with `STRAFE_`-prefixed environment
/// overrides, e.g. `STRAFE_DRIVE__SLEW_RATE=2.0`.
pub fn load_config(path: &str) -> anyhow::Result<RobotConfig> {
    info!("Attempting to load configuration from {}", path);

    let settings = Config::builder()
        .add_source(File::new(path, FileFormat::Toml).required(true))
        .add_source(
            Environment::with_prefix("STRAFE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .and_then(|settings| settings.try_deserialize::<RobotConfig>());

    match settings {
        Ok(config) => {
            info!(?config, "Successfully loaded configuration");
            validate(&config)?;
            Ok(config)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            Err(e).with_context(|| format!("loading {path}"))
        }
    }
}

fn validate(config: &RobotConfig) -> anyhow::Result<()> {
    config.chassis.kinematics()?;
    anyhow::ensure!(
        config.chassis.meters_per_rotation().is_finite() && config.chassis.meters_per_rotation() > 0.0,
        "wheel diameter and gear ratio must be positive"
    );
    anyhow::ensure!(config.chassis.max_linear_speed > 0.0, "max linear speed must be positive");
    ensure_seconds("drive loop period", config.drive.loop_period)?;
    ensure_seconds("vision period", config.vision.period)?;
    ensure_seconds("telemetry period", config.telemetry.period)?;
    ensure_seconds("watchdog timeout", config.telemetry.watchdog_timeout)?;
    anyhow::ensure!(
        config.vision.latency.is_finite() && config.vision.latency >= 0.0,
        "vision latency must be finite and non-negative"
    );
    anyhow::ensure!(config.sim.duration.is_finite(), "sim duration must be finite");
    anyhow::ensure!(
        config.vision.latency < config.estimator.history_window,
        "vision latency {} s exceeds the {} s history window",
        config.vision.latency,
        config.estimator.history_window
    );
    config.estimator.validate()?;
    Ok(())
}

/// Durations feed `Duration::from_secs_f64`, which panics on NaN or infinity.
fn ensure_seconds(name: &str, seconds: f64) -> anyhow::Result<()> {
    anyhow::ensure!(
        seconds.is_finite() && seconds > 0.0,
        "{name} must be a finite positive number of seconds, got {seconds}"
    );
    Ok(())
}
