// ==============================================================================
// config.rs — VEHICLE + SERVER CONFIGURATION
// ------------------------------------------------------------------------------
// VehicleConfig is plain data supplied at spawn time:
// - chassis (mass, box, center of gravity), engine, transmission, brakes,
//   pedals, steering rack, tires, aero, wheel layout
// - presets: sedan() (front-drive reference car), rear_drive()
// - TOML loading with #[serde(default)], so a file only overrides what it names
// - validate() rejects anything that would divide by zero inside the step loop
//
// ServerConfig comes from the environment (VEHICLE_SERVER_*), with defaults.
// ==============================================================================

use std::path::{Path, PathBuf};

use log::{info, warn};
use rapier3d::prelude::Real;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::tire::curve::{default_grip_points, default_torque_points, Curve, CurvePoint};

/// How per-step forces reach the rigid body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForceMode {
    /// F·dt as an impulse, velocity changes immediately.
    #[default]
    Impulse,
    /// Accumulated force, integrated by the engine and cleared every step.
    Force,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChassisConfig {
    pub mass: Real,                     // kg
    pub half_extents: [Real; 3],        // m
    pub center_of_gravity: [Real; 3],   // m, collider offset from the center of mass
    pub angular_damping: Real,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub peak_torque: Real,             // N·m at the top of the torque curve
    pub min_rpm: Real,
    pub max_rpm: Real,
    pub torque_curve: Vec<CurvePoint>, // normalised torque vs rpm / max_rpm
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransmissionConfig {
    pub gears: Vec<Real>,    // index 0 = reverse
    pub initial_gear: usize,
    pub final_drive: Real,
    pub efficiency: Real,    // 0..1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrakeConfig {
    pub torque: Real, // N·m per braked wheel at full pedal
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PedalConfig {
    pub press_rate: Real,   // 1/s toward 1.0
    pub release_rate: Real, // 1/s toward 0.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SteeringConfig {
    pub max_angle_deg: Real,
    pub step_deg: Real, // per simulation step
}

impl SteeringConfig {
    pub fn max_angle(&self) -> Real {
        self.max_angle_deg.to_radians()
    }

    pub fn step(&self) -> Real {
        self.step_deg.to_radians()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TireConfig {
    pub wheel_mass: Real,          // kg
    pub rolling_resistance: Real,  // fraction of the wheel's traction budget
    pub max_slip_angle_deg: Real,  // slip angle mapped to x = 1 on the grip curve
    pub grip_curve: Vec<CurvePoint>,
}

impl TireConfig {
    pub fn max_slip_angle(&self) -> Real {
        self.max_slip_angle_deg.to_radians()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AeroConfig {
    pub drag_coefficient: Real, // kg/m, F = -c v|v|
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WheelConfig {
    pub offset: [Real; 3], // m, from the geometric center of the chassis
    pub radius: Real,
    pub stiffness: Real,   // N/m
    pub damping: Real,     // N·s/m
    #[serde(default)]
    pub powered: bool,
    #[serde(default)]
    pub steerable: bool,
    #[serde(default = "default_true")]
    pub brakes: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleConfig {
    pub gravity: Real,
    pub force_mode: ForceMode,
    pub chassis: ChassisConfig,
    pub engine: EngineConfig,
    pub transmission: TransmissionConfig,
    pub brakes: BrakeConfig,
    pub pedals: PedalConfig,
    pub steering: SteeringConfig,
    pub tires: TireConfig,
    pub aero: AeroConfig,
    pub wheels: Vec<WheelConfig>,
}

// ==============================================================================
// Presets
// ==============================================================================

impl Default for ChassisConfig {
    fn default() -> Self {
        Self {
            mass: 1400.0,
            half_extents: [0.825, 0.615, 2.05], // 1.65 x 1.23 x 4.1 m box
            center_of_gravity: [0.0, 0.55, 0.0],
            angular_damping: 0.5,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            peak_torque: 400.0,
            min_rpm: 1000.0,
            max_rpm: 7000.0,
            torque_curve: default_torque_points(),
        }
    }
}

impl Default for TransmissionConfig {
    fn default() -> Self {
        Self {
            gears: vec![-6.0, 5.5, 3.8, 2.5, 1.7, 1.0, 0.6],
            initial_gear: 1,
            final_drive: 3.42,
            efficiency: 0.7,
        }
    }
}

impl Default for BrakeConfig {
    fn default() -> Self {
        Self { torque: 4000.0 }
    }
}

impl Default for PedalConfig {
    fn default() -> Self {
        Self {
            press_rate: 2.0,
            release_rate: 4.0,
        }
    }
}

impl Default for SteeringConfig {
    fn default() -> Self {
        Self {
            max_angle_deg: 35.0,
            step_deg: 1.2,
        }
    }
}

impl Default for TireConfig {
    fn default() -> Self {
        Self {
            wheel_mass: 25.0,
            rolling_resistance: 0.012,
            max_slip_angle_deg: 20.0,
            grip_curve: default_grip_points(),
        }
    }
}

impl Default for AeroConfig {
    fn default() -> Self {
        Self { drag_coefficient: 0.4 }
    }
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self::sedan()
    }
}

impl VehicleConfig {
    /// 1400 kg front-drive car: front wheels powered and steered, all braked.
    pub fn sedan() -> Self {
        let chassis = ChassisConfig::default();
        let wheels = four_wheel_layout(&chassis, true, false);
        Self {
            gravity: 9.81,
            force_mode: ForceMode::Impulse,
            chassis,
            engine: EngineConfig::default(),
            transmission: TransmissionConfig::default(),
            brakes: BrakeConfig::default(),
            pedals: PedalConfig::default(),
            steering: SteeringConfig::default(),
            tires: TireConfig::default(),
            aero: AeroConfig::default(),
            wheels,
        }
    }

    /// Same car with the engine driving the rear axle.
    pub fn rear_drive() -> Self {
        let mut config = Self::sedan();
        config.wheels = four_wheel_layout(&config.chassis, false, true);
        config
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        info!(
            "loaded vehicle config from {} ({} kg, {} wheels)",
            path.display(),
            config.chassis.mass,
            config.wheels.len()
        );
        Ok(config)
    }

    pub fn torque_curve(&self) -> Curve {
        Curve::new(self.engine.torque_curve.iter().copied())
    }

    /// Grip vs signed slip ratio on [-1, 1].
    pub fn slip_ratio_curve(&self) -> Curve {
        Curve::symmetric(self.tires.grip_curve.iter().copied())
    }

    /// Grip vs normalised slip angle on [0, 1].
    pub fn slip_angle_curve(&self) -> Curve {
        Curve::new(self.tires.grip_curve.iter().copied())
    }

    pub fn powered_wheel_count(&self) -> usize {
        self.wheels.iter().filter(|w| w.powered).count()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let chassis = &self.chassis;
        if !(chassis.mass > 0.0 && chassis.mass.is_finite()) {
            return Err(ConfigError::InvalidMass(chassis.mass));
        }
        for (i, he) in chassis.half_extents.iter().enumerate() {
            positive(["chassis.half_extents.x", "chassis.half_extents.y", "chassis.half_extents.z"][i], *he)?;
        }
        for c in chassis.center_of_gravity {
            if !c.is_finite() {
                return Err(ConfigError::NonFinite { field: "chassis.center_of_gravity", value: c });
            }
        }
        non_negative("chassis.angular_damping", chassis.angular_damping)?;
        positive("gravity", self.gravity)?;

        // engine
        let engine = &self.engine;
        non_negative("engine.peak_torque", engine.peak_torque)?;
        let rpm_ok = engine.min_rpm.is_finite()
            && engine.max_rpm.is_finite()
            && engine.min_rpm >= 0.0
            && engine.min_rpm < engine.max_rpm;
        if !rpm_ok {
            return Err(ConfigError::InvalidRpmRange { min: engine.min_rpm, max: engine.max_rpm });
        }
        if engine.torque_curve.is_empty() {
            return Err(ConfigError::EmptyCurve("engine torque"));
        }

        // transmission
        let tr = &self.transmission;
        if tr.gears.is_empty() {
            return Err(ConfigError::NoGears);
        }
        if let Some(index) = tr.gears.iter().position(|g| *g == 0.0 || !g.is_finite()) {
            return Err(ConfigError::ZeroGearRatio { index });
        }
        if tr.initial_gear >= tr.gears.len() {
            return Err(ConfigError::InitialGearOutOfRange { gear: tr.initial_gear, len: tr.gears.len() });
        }
        positive("transmission.final_drive", tr.final_drive)?;
        positive("transmission.efficiency", tr.efficiency)?;

        non_negative("brakes.torque", self.brakes.torque)?;
        positive("pedals.press_rate", self.pedals.press_rate)?;
        positive("pedals.release_rate", self.pedals.release_rate)?;
        non_negative("steering.max_angle_deg", self.steering.max_angle_deg)?;
        positive("steering.step_deg", self.steering.step_deg)?;

        // tires
        positive("tires.wheel_mass", self.tires.wheel_mass)?;
        non_negative("tires.rolling_resistance", self.tires.rolling_resistance)?;
        positive("tires.max_slip_angle_deg", self.tires.max_slip_angle_deg)?;
        if self.tires.grip_curve.is_empty() {
            return Err(ConfigError::EmptyCurve("tire grip"));
        }

        non_negative("aero.drag_coefficient", self.aero.drag_coefficient)?;

        // wheels
        if self.wheels.is_empty() {
            return Err(ConfigError::NoWheels);
        }
        for (index, w) in self.wheels.iter().enumerate() {
            if !(w.radius > 0.0 && w.radius.is_finite()) {
                return Err(ConfigError::InvalidWheelRadius { index, radius: w.radius });
            }
            for (field, value) in [("stiffness", w.stiffness), ("damping", w.damping)] {
                if !(value >= 0.0 && value.is_finite()) {
                    return Err(ConfigError::InvalidWheelCoefficient { index, field, value });
                }
            }
            if let Some(value) = w.offset.iter().copied().find(|c| !c.is_finite()) {
                return Err(ConfigError::NonFinite { field: "wheel offset", value });
            }
        }

        Ok(())
    }
}

fn positive(field: &'static str, value: Real) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { field, value })
    }
}

fn non_negative(field: &'static str, value: Real) -> Result<(), ConfigError> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::Negative { field, value })
    }
}

/// Four corners at (±x/2, -y/1.3, ±z/3) of the full chassis size; front is +Z.
fn four_wheel_layout(chassis: &ChassisConfig, front_drive: bool, rear_drive: bool) -> Vec<WheelConfig> {
    let [hx, hy, hz] = chassis.half_extents;
    let x = hx;
    let y = -(2.0 * hy) / 1.3;
    let z = (2.0 * hz) / 3.0;

    let wheel = |offset: [Real; 3], front: bool| WheelConfig {
        offset,
        radius: 0.33,
        stiffness: 24_000.0,
        damping: 1_800.0,
        powered: if front { front_drive } else { rear_drive },
        steerable: front,
        brakes: true,
    };

    vec![
        wheel([x, y, z], true),   // front, +X side
        wheel([-x, y, z], true),  // front, -X side
        wheel([x, y, -z], false), // rear, +X side
        wheel([-x, y, -z], false),
    ]
}

// ==============================================================================
// Server
// ==============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub tick_hz: u32,
    pub substeps: usize,
    pub vehicle_config: Option<PathBuf>,
    pub spawn_spacing: Real,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:9001".to_string(),
            tick_hz: 120,
            substeps: 1,
            vehicle_config: None,
            spawn_spacing: 6.0,
        }
    }
}

impl ServerConfig {
    pub const BIND_ENV: &'static str = "VEHICLE_SERVER_BIND";
    pub const TICK_ENV: &'static str = "VEHICLE_SERVER_TICK_HZ";
    pub const SUBSTEPS_ENV: &'static str = "VEHICLE_SERVER_SUBSTEPS";
    pub const CONFIG_ENV: &'static str = "VEHICLE_SERVER_CONFIG";

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; unparsable values keep the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(bind) = lookup(Self::BIND_ENV) {
            config.bind_addr = bind;
        }
        if let Some(raw) = lookup(Self::TICK_ENV) {
            match raw.parse::<u32>() {
                Ok(hz) if hz > 0 => config.tick_hz = hz,
                _ => warn!("ignoring {}={raw:?}, using {} Hz", Self::TICK_ENV, config.tick_hz),
            }
        }
        if let Some(raw) = lookup(Self::SUBSTEPS_ENV) {
            match raw.parse::<usize>() {
                Ok(n) if n > 0 => config.substeps = n,
                _ => warn!("ignoring {}={raw:?}, using {} substeps", Self::SUBSTEPS_ENV, config.substeps),
            }
        }
        if let Some(path) = lookup(Self::CONFIG_ENV) {
            config.vehicle_config = Some(PathBuf::from(path));
        }

        config
    }

    pub fn dt(&self) -> Real {
        1.0 / self.tick_hz.max(1) as Real
    }

    /// Vehicle config from the configured TOML file, or the sedan preset.
    pub fn load_vehicle_config(&self) -> Result<VehicleConfig, ConfigError> {
        match &self.vehicle_config {
            Some(path) => VehicleConfig::load(path),
            None => {
                info!("no vehicle config file set, using the sedan preset");
                Ok(VehicleConfig::sedan())
            }
        }
    }
}
