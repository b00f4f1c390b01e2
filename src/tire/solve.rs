// ==============================================================================
// solve.rs — TRACTION CIRCLE (COMBINED LONGITUDINAL + LATERAL DEMAND)
// ==============================================================================
// The contact patch can deliver at most max_drive_force in total:
//
//     |F_long| + |F_lat| <= max_drive_force
//
// When the summed demand exceeds the budget both components are scaled by the
// same factor, so braking or accelerating hard eats into cornering grip and
// vice versa. A zero (or negative) budget yields zero force.
//
// combine(...) turns the clamped scalars into world-space force vectors along
// the wheel's ground basis.
// ==============================================================================

use rapier3d::prelude::{Real, Vector};

use crate::tire::kinematics::GroundBasis;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TireForces {
    pub longitudinal: Real,
    pub lateral: Real,
    pub longitudinal_vec: Vector<Real>,
    pub lateral_vec: Vector<Real>,
}

impl TireForces {
    pub fn zero() -> Self {
        Self {
            longitudinal: 0.0,
            lateral: 0.0,
            longitudinal_vec: Vector::zeros(),
            lateral_vec: Vector::zeros(),
        }
    }

    #[inline]
    pub fn total(&self) -> Vector<Real> {
        self.longitudinal_vec + self.lateral_vec
    }
}

/// Scales (long, lat) so |long| + |lat| stays inside the budget.
pub fn traction_circle(longitudinal: Real, lateral: Real, budget: Real) -> (Real, Real) {
    if !(budget > 0.0) {
        return (0.0, 0.0);
    }

    let demand = longitudinal.abs() + lateral.abs();
    if demand <= budget {
        return (longitudinal, lateral);
    }

    let scale = budget / demand;
    (longitudinal * scale, lateral * scale)
}

pub fn combine(basis: &GroundBasis, longitudinal: Real, lateral: Real, budget: Real) -> TireForces {
    if !(budget > 0.0) {
        return TireForces::zero();
    }
    let (long, lat) = traction_circle(longitudinal, lateral, budget);
    TireForces {
        longitudinal: long,
        lateral: lat,
        longitudinal_vec: basis.forward * long,
        lateral_vec: basis.side * lat,
    }
}
