// Tire state for HUD / audio: what the contact patch is doing right now.

use rapier3d::prelude::Real;
use serde::{Deserialize, Serialize};

/// Slip ratio magnitude past which a wheel counts as spinning or locked.
pub const SLIP_RATIO_LIMIT: Real = 0.5;

/// Fraction of the max slip angle past which a wheel counts as sliding.
pub const SLIP_ANGLE_LIMIT: Real = 0.5;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TireState {
    #[default]
    Grip,
    Spin,
    Lock,
    Slide,
    Airborne,
}

pub fn classify(grounded: bool, slip_ratio: Real, slip_angle: Real, max_slip_angle: Real) -> TireState {
    if !grounded {
        return TireState::Airborne;
    }
    // longitudinal dominates: a locked wheel also slides, report the lock
    if slip_ratio <= -SLIP_RATIO_LIMIT {
        return TireState::Lock;
    }
    if slip_ratio >= SLIP_RATIO_LIMIT {
        return TireState::Spin;
    }
    if slip_angle >= SLIP_ANGLE_LIMIT * max_slip_angle {
        return TireState::Slide;
    }
    TireState::Grip
}
