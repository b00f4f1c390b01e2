//! tire - engine-agnostic wheel and tire helpers (pure functions + small records)

pub mod curve;
pub mod kinematics;
pub mod lateral;
pub mod longitudinal;
pub mod solve;
pub mod state;
pub mod steering;
pub mod weight_transfer;

pub use curve::{Curve, CurvePoint};
pub use kinematics::GroundBasis;
pub use solve::{TireForces, traction_circle};
pub use state::TireState;
pub use weight_transfer::LoadShare;
