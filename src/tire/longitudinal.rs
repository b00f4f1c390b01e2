// ==============================================================================
// longitudinal.rs — WHEEL SPIN STATE + LONGITUDINAL TIRE FORCE
// ==============================================================================
// Each wheel carries an angular velocity ω (rad/s). Per step:
//
// 1) Grounded wheels re-synchronise ω to the last measured ground speed / r, so
//    free-rolling wheels never drift away from the road.
// 2) Torques at the hub (N·m):
//      T_drive  engine share (powered wheels only, zero at the gear limit)
//      T_brake  opposes ω, never enough to reverse the wheel this step,
//               snaps ω to zero below BRAKE_SNAP_SPEED
//      T_roll   rolling resistance, scaled by the wheel's traction budget
// 3) Slip ratio from the pending surface speed vs ground speed, clamped to
//    [-1, 1]; airborne wheels use full slip (-1 braking, +1 otherwise).
// 4) Tire force  F = clamp((T_drive + T_brake) / r * grip, ±max_drive_force)
// 5) Integrate ω with α = (T_drive + T_brake + T_roll - F r) / I, then clamp
//    powered wheels to the gear-limited maximum.
//
// Output:
// - LongitudinalResult { angular_velocity, slip_ratio, grip, drive_force, ... }
// drive_force is the tractive force (N, along wheel forward) handed to the
// traction circle in solve.rs together with rolling_force.
// ==============================================================================

use rapier3d::prelude::Real;

use crate::tire::curve::Curve;

/// |ω| below which an engaged brake stops the wheel outright (rad/s).
pub const BRAKE_SNAP_SPEED: Real = 0.1;

/// Ground speed over which rolling resistance fades in (m/s).
const ROLLING_FADE_SPEED: Real = 0.5;

/// Slip-ratio denominator floor (m/s).
const SLIP_SPEED_FLOOR: Real = 0.1;

#[inline]
pub fn wheel_inertia(mass: Real, radius: Real) -> Real {
    0.5 * mass * radius * radius
}

/// Highest wheel speed the engine can reach in the current gear (rad/s).
/// `None` when the overall ratio is zero.
#[inline]
pub fn gear_limited_angular_velocity(max_rpm: Real, overall_ratio: Real) -> Option<Real> {
    let ratio = overall_ratio.abs();
    if ratio <= Real::EPSILON {
        return None;
    }
    Some(max_rpm * std::f32::consts::TAU / 60.0 / ratio)
}

#[derive(Debug, Clone, Copy)]
pub struct LongitudinalInput {
    pub dt: Real,                 // s
    pub radius: Real,             // m
    pub wheel_mass: Real,         // kg
    pub grounded: bool,

    pub prev_forward_speed: Real, // m/s, signed, measured last step
    pub forward_speed: Real,      // m/s, signed, measured this step

    pub drive_torque: Real,       // N·m, signed (reverse gear is negative)
    pub brake_torque: Real,       // N·m, magnitude
    pub max_angular_velocity: Option<Real>, // rad/s, powered wheels only

    pub max_drive_force: Real,    // N, traction budget from weight transfer
    pub rolling_resistance: Real, // fraction of max_drive_force
    pub gravity: Real,            // m/s²
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LongitudinalResult {
    pub angular_velocity: Real,
    pub angular_acceleration: Real,
    pub slip_ratio: Real,
    pub grip: Real,
    pub drive_force: Real,   // N along wheel forward, before the traction circle
    pub rolling_force: Real, // N along wheel forward
}

pub fn solve_longitudinal(
    angular_velocity: Real,
    input: &LongitudinalInput,
    grip_curve: &Curve,
) -> LongitudinalResult {
    let dt = input.dt.max(1e-6);
    let r = input.radius.max(1e-4);
    let inertia = wheel_inertia(input.wheel_mass, r).max(1e-6);

    // -------------------------
    // 1) resync to the road
    // -------------------------
    let mut omega = if input.grounded {
        input.prev_forward_speed / r
    } else {
        angular_velocity
    };

    // -------------------------
    // 2) hub torques
    // -------------------------
    let mut drive_torque = input.drive_torque;
    if let Some(limit) = input.max_angular_velocity {
        let pushing_past = omega.abs() >= limit && omega.signum() == drive_torque.signum();
        if pushing_past {
            drive_torque = 0.0;
        }
    }

    let mut brake_torque = 0.0;
    if input.brake_torque > 0.0 {
        if omega.abs() < BRAKE_SNAP_SPEED {
            omega = 0.0;
        } else {
            let stop_torque = omega.abs() * inertia / dt;
            brake_torque = -omega.signum() * input.brake_torque.min(stop_torque);
        }
    }

    let rolling_force = -input.rolling_resistance
        * input.max_drive_force
        * (input.forward_speed / ROLLING_FADE_SPEED).clamp(-1.0, 1.0);
    let rolling_torque = rolling_force * r;

    let hub_torque = drive_torque + brake_torque;

    // -------------------------
    // 3) slip ratio + grip
    // -------------------------
    let braking = input.brake_torque > 0.0;
    let slip_ratio = if input.grounded {
        let pending = omega + hub_torque / inertia * dt;
        let surface = pending * r;
        let v = input.forward_speed;
        let denom = surface.abs().max(v.abs()).max(SLIP_SPEED_FLOOR);
        ((surface - v) / denom).clamp(-1.0, 1.0)
    } else if braking {
        -1.0
    } else {
        1.0
    };
    let grip = grip_curve.evaluate(slip_ratio);

    // -------------------------
    // 4) tire force
    // -------------------------
    let budget = input.max_drive_force.max(0.0);
    let mut drive_force = if input.grounded {
        (hub_torque / r * grip).clamp(-budget, budget)
    } else {
        0.0
    };

    // brake-only: never more than what stops this wheel's share of mass
    if drive_torque == 0.0 && brake_torque != 0.0 {
        let share_mass = budget / input.gravity.max(1e-3);
        let stop = input.forward_speed.abs() * share_mass / dt;
        drive_force = drive_force.clamp(-stop, stop);
    }

    // -------------------------
    // 5) integrate ω
    // -------------------------
    let reaction = if input.grounded { drive_force * r } else { 0.0 };
    let alpha = (hub_torque + rolling_torque - reaction) / inertia;

    let mut next = omega + alpha * dt;

    // a brake alone never reverses the wheel
    if drive_torque == 0.0 && brake_torque != 0.0 && next.signum() != omega.signum() {
        next = 0.0;
    }

    if let Some(limit) = input.max_angular_velocity {
        next = next.clamp(-limit, limit);
    }

    LongitudinalResult {
        angular_velocity: next,
        angular_acceleration: alpha,
        slip_ratio,
        grip,
        drive_force,
        rolling_force: if input.grounded { rolling_force } else { 0.0 },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tire::curve::{default_grip_points, Curve};

    fn grip() -> Curve {
        Curve::symmetric(default_grip_points())
    }

    fn input() -> LongitudinalInput {
        LongitudinalInput {
            dt: 1.0 / 120.0,
            radius: 0.33,
            wheel_mass: 25.0,
            grounded: true,
            prev_forward_speed: 0.0,
            forward_speed: 0.0,
            drive_torque: 0.0,
            brake_torque: 0.0,
            max_angular_velocity: None,
            max_drive_force: 3433.5,
            rolling_resistance: 0.012,
            gravity: 9.81,
        }
    }

    #[test]
    fn inertia_is_half_m_r_squared() {
        assert!((wheel_inertia(25.0, 0.33) - 1.36125).abs() < 1e-5);
    }

    #[test]
    fn zero_inputs_produce_zero_drive_force() {
        let mut i = input();
        i.prev_forward_speed = 8.0;
        i.forward_speed = 8.0;
        let out = solve_longitudinal(0.0, &i, &grip());
        assert_eq!(out.drive_force, 0.0);
        assert!(out.rolling_force < 0.0);
    }

    #[test]
    fn drive_torque_pushes_forward_within_budget() {
        let mut i = input();
        i.drive_torque = 5000.0;
        let out = solve_longitudinal(0.0, &i, &grip());
        assert!(out.drive_force > 0.0);
        assert!(out.drive_force <= i.max_drive_force + 1e-3);
        assert!(out.slip_ratio > 0.0 && out.slip_ratio <= 1.0);
        assert!(out.angular_velocity > 0.0);
    }

    #[test]
    fn gear_limit_caps_wheel_speed() {
        let mut i = input();
        i.drive_torque = 10_000.0;
        i.max_drive_force = 0.0;
        i.grounded = false;
        let limit = gear_limited_angular_velocity(7000.0, 5.5 * 3.42).unwrap();
        i.max_angular_velocity = Some(limit);

        let mut omega = 0.0;
        for _ in 0..600 {
            omega = solve_longitudinal(omega, &i, &grip()).angular_velocity;
            assert!(omega <= limit + 1e-4);
        }
        assert!((omega - limit).abs() < 1e-3);
    }

    #[test]
    fn brake_opposes_rolling_direction() {
        let mut i = input();
        i.prev_forward_speed = 10.0;
        i.forward_speed = 10.0;
        i.brake_torque = 4000.0;
        let out = solve_longitudinal(0.0, &i, &grip());
        assert!(out.drive_force < 0.0);
        assert!(out.slip_ratio < 0.0);
        assert!(out.angular_velocity >= 0.0);
    }

    #[test]
    fn brake_snaps_slow_wheel_to_zero() {
        let mut i = input();
        i.grounded = false;
        i.brake_torque = 4000.0;
        let out = solve_longitudinal(0.05, &i, &grip());
        assert_eq!(out.angular_velocity, 0.0);
        assert_eq!(out.slip_ratio, -1.0);
    }

    #[test]
    fn braking_never_reverses_the_wheel() {
        let mut i = input();
        i.grounded = false;
        i.brake_torque = 1.0e6;
        for start in [0.5_f32, 3.0, 40.0, -0.5, -12.0] {
            let out = solve_longitudinal(start, &i, &grip());
            assert!(out.angular_velocity * start >= 0.0, "{start} -> {}", out.angular_velocity);
        }
    }

    #[test]
    fn airborne_wheel_uses_full_slip_and_no_force() {
        let mut i = input();
        i.grounded = false;
        i.drive_torque = 800.0;
        let out = solve_longitudinal(2.0, &i, &grip());
        assert_eq!(out.slip_ratio, 1.0);
        assert_eq!(out.drive_force, 0.0);
        assert!(out.angular_velocity > 2.0);
    }

    #[test]
    fn zero_ratio_has_no_gear_limit() {
        assert!(gear_limited_angular_velocity(7000.0, 0.0).is_none());
    }
}
