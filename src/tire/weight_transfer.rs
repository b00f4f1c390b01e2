// ==============================================================================
// weight_transfer.rs — NORMAL LOAD → PER-WHEEL TRACTION BUDGET
// ------------------------------------------------------------------------------
// Each wheel's share of the vehicle weight follows its share of this step's
// suspension force:
//
//     max_drive_force_i = mass * g * F_i / ΣF
//     normal_load_i     = F_i                (Σ normal_load = ΣF)
//
// Budgets always sum to mass * g; the split moves toward compressed wheels
// under braking, acceleration and cornering. With ΣF == 0 (airborne) the
// previous shares are kept.
// ==============================================================================

use rapier3d::prelude::Real;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadShare {
    pub max_drive_force: Real, // N
    pub normal_load: Real,     // N
}

impl LoadShare {
    /// Even split used before the first grounded step.
    pub fn even(mass: Real, gravity: Real, wheel_count: usize) -> Self {
        let n = wheel_count.max(1) as Real;
        let weight = mass * gravity / n;
        Self {
            max_drive_force: weight,
            normal_load: weight,
        }
    }
}

/// Redistributes `shares` from `suspension_forces` (same order, one per
/// wheel). Returns false, leaving `shares` unchanged, when there is no load.
pub fn transfer_weight(
    suspension_forces: &[Real],
    mass: Real,
    gravity: Real,
    shares: &mut [LoadShare],
) -> bool {
    let total: Real = suspension_forces
        .iter()
        .map(|f| if f.is_finite() { f.max(0.0) } else { 0.0 })
        .sum();

    if !(total > 0.0) {
        return false;
    }

    let weight = mass * gravity;
    for (share, force) in shares.iter_mut().zip(suspension_forces) {
        let f = if force.is_finite() { force.max(0.0) } else { 0.0 };
        let fraction = f / total;
        share.max_drive_force = weight * fraction;
        share.normal_load = f;
    }
    true
}
