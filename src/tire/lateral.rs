// ==============================================================================
// lateral.rs — SLIP ANGLE + LATERAL TIRE FORCE
// ------------------------------------------------------------------------------
// Inputs are the contact-point velocity split into (v_fwd, v_lat) along the
// wheel's ground basis.
//
//   α     = atan2(|v_lat|, |v_fwd|)              (0 below MIN_PLANAR_SPEED)
//   grip  = curve(α / max_slip_angle)            (unit-domain curve, clamped)
//   F_lat = -sign(v_lat) * grip * max_drive_force
//
// The demand is bounded by the force that would cancel the wheel's lateral
// slip in one step, using the wheel's mass share max_drive_force / g, so a
// nearly-stopped car does not jitter sideways.
// ==============================================================================

use rapier3d::prelude::Real;

use crate::tire::curve::Curve;

/// Planar speed under which slip angle is treated as zero (m/s).
pub const MIN_PLANAR_SPEED: Real = 1e-3;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LateralResult {
    pub slip_angle: Real, // rad, unsigned
    pub grip: Real,
    pub force: Real,      // N along wheel side
}

#[inline]
pub fn slip_angle(v_fwd: Real, v_lat: Real) -> Real {
    let planar = (v_fwd * v_fwd + v_lat * v_lat).sqrt();
    if !(planar >= MIN_PLANAR_SPEED) {
        return 0.0;
    }
    v_lat.abs().atan2(v_fwd.abs())
}

pub fn solve_lateral(
    v_fwd: Real,
    v_lat: Real,
    max_slip_angle: Real,
    max_drive_force: Real,
    gravity: Real,
    dt: Real,
    grip_curve: &Curve,
) -> LateralResult {
    let alpha = slip_angle(v_fwd, v_lat);
    if alpha == 0.0 {
        return LateralResult::default();
    }

    let normalised = alpha / max_slip_angle.max(1e-4);
    let grip = grip_curve.evaluate(normalised);

    let budget = max_drive_force.max(0.0);
    let demand = -v_lat.signum() * grip * budget;

    let share_mass = budget / gravity.max(1e-3);
    let cancel = v_lat.abs() * share_mass / dt.max(1e-6);
    let force = demand.clamp(-cancel, cancel);

    LateralResult {
        slip_angle: alpha,
        grip,
        force,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tire::curve::default_grip_points;

    const MAX_SLIP: Real = 20.0 * std::f32::consts::PI / 180.0;

    fn curve() -> Curve {
        Curve::new(default_grip_points())
    }

    #[test]
    fn stationary_wheel_has_no_lateral_force() {
        let out = solve_lateral(0.0, 0.0, MAX_SLIP, 3400.0, 9.81, 1.0 / 120.0, &curve());
        assert_eq!(out, LateralResult::default());
    }

    #[test]
    fn force_opposes_lateral_velocity() {
        let right = solve_lateral(15.0, 1.5, MAX_SLIP, 3400.0, 9.81, 1.0 / 120.0, &curve());
        let left = solve_lateral(15.0, -1.5, MAX_SLIP, 3400.0, 9.81, 1.0 / 120.0, &curve());
        assert!(right.force < 0.0);
        assert!(left.force > 0.0);
        assert!((right.force + left.force).abs() < 1e-3);
    }

    #[test]
    fn force_never_exceeds_budget() {
        for v_lat in [0.01_f32, 0.5, 3.0, 30.0] {
            let out = solve_lateral(5.0, v_lat, MAX_SLIP, 2000.0, 9.81, 1.0 / 120.0, &curve());
            assert!(out.force.abs() <= 2000.0 + 1e-3);
        }
    }

    #[test]
    fn tiny_slip_is_capped_by_one_step_cancel() {
        let out = solve_lateral(0.0, 0.001, MAX_SLIP, 3400.0, 9.81, 1.0 / 120.0, &curve());
        let cancel = 0.001 * (3400.0 / 9.81) * 120.0;
        assert!(out.force.abs() <= cancel + 1e-3);
    }

    #[test]
    fn slip_angle_is_unsigned_and_bounded() {
        assert_eq!(slip_angle(0.0, 0.0), 0.0);
        let a = slip_angle(-10.0, -10.0);
        assert!((a - std::f32::consts::FRAC_PI_4).abs() < 1e-5);
        assert!(slip_angle(0.0, 4.0) <= std::f32::consts::FRAC_PI_2 + 1e-6);
    }
}
