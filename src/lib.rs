//! Raycast-suspension vehicle dynamics on top of rapier3d, plus a small
//! websocket server that drives one vehicle per connected client.

pub mod config;
pub mod debug_builders;
pub mod drivetrain;
pub mod error;
pub mod input;
pub mod net;
pub mod physics;
pub mod spawn;
pub mod state;
pub mod suspension_contact;
pub mod tire;
pub mod vehicle;

pub use config::{ForceMode, ServerConfig, VehicleConfig, WheelConfig};
pub use error::{ConfigError, VehicleError};
pub use input::InputState;
pub use physics::{PhysicsBackend, PhysicsWorld, RayCaster};
pub use vehicle::{StepReport, Vehicle, VehicleSnapshot, Wheel};
