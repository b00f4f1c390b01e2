// ==============================================================================
// error.rs — SETUP-TIME FAILURES
// ------------------------------------------------------------------------------
// The per-step numerical core never fails: degenerate curves, empty drivetrains
// and airborne vehicles are absorbed by guards. What can fail is setup:
// - a vehicle configuration that would divide by zero later (ConfigError)
// - the physics engine refusing or losing a chassis body (VehicleError)
// ==============================================================================

use rapier3d::prelude::RigidBodyHandle;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("chassis mass must be positive and finite (got {0})")]
    InvalidMass(f32),

    #[error("vehicle has no wheels")]
    NoWheels,

    #[error("wheel {index}: radius must be positive and finite (got {radius})")]
    InvalidWheelRadius { index: usize, radius: f32 },

    #[error("wheel {index}: {field} must be non-negative and finite (got {value})")]
    InvalidWheelCoefficient {
        index: usize,
        field: &'static str,
        value: f32,
    },

    #[error("gear table is empty")]
    NoGears,

    #[error("gear {index} has a zero ratio")]
    ZeroGearRatio { index: usize },

    #[error("initial gear {gear} is outside the gear table (len {len})")]
    InitialGearOutOfRange { gear: usize, len: usize },

    #[error("engine rpm range is invalid (min {min}, max {max})")]
    InvalidRpmRange { min: f32, max: f32 },

    #[error("{0} curve has no control points")]
    EmptyCurve(&'static str),

    #[error("{field} must be positive and finite (got {value})")]
    NonPositive { field: &'static str, value: f32 },

    #[error("{field} must be finite (got {value})")]
    NonFinite { field: &'static str, value: f32 },

    #[error("{field} must be non-negative and finite (got {value})")]
    Negative { field: &'static str, value: f32 },

    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Error)]
pub enum VehicleError {
    #[error("invalid vehicle configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("physics engine could not create the chassis body: {0}")]
    BodyCreation(String),

    #[error("chassis body {0:?} no longer exists in the physics world")]
    MissingBody(RigidBodyHandle),
}
