// ==============================================================================
// steering.rs — RATE-LIMITED STEERING RACK
// ==============================================================================
// Driver intent is digital (left / right). Each steerable wheel carries a yaw
// angle relative to the chassis that moves toward a target by at most a fixed
// step per tick, so the rack takes several ticks to reach full lock and several
// ticks to centre again.
//
//   target = +max_angle  (left only)
//            -max_angle  (right only)
//             0          (neither, or both)
//
// Positive yaw turns the wheel's forward toward chassis +X (see kinematics.rs).
// ==============================================================================

use rapier3d::prelude::Real;

#[inline]
pub fn steer_target(left: bool, right: bool, max_angle: Real) -> Real {
    match (left, right) {
        (true, false) => max_angle,
        (false, true) => -max_angle,
        _ => 0.0,
    }
}

/// Moves `current` toward `target` by no more than `max_step` (radians).
#[inline]
pub fn approach_yaw(current: Real, target: Real, max_step: Real) -> Real {
    let step = max_step.abs();
    let delta = target - current;
    if delta.abs() <= step {
        target
    } else {
        current + step * delta.signum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: Real = 35.0 * std::f32::consts::PI / 180.0;
    const STEP: Real = 1.2 * std::f32::consts::PI / 180.0;

    #[test]
    fn targets_follow_intent() {
        assert_eq!(steer_target(true, false, MAX), MAX);
        assert_eq!(steer_target(false, true, MAX), -MAX);
        assert_eq!(steer_target(true, true, MAX), 0.0);
        assert_eq!(steer_target(false, false, MAX), 0.0);
    }

    #[test]
    fn yaw_converges_over_several_steps() {
        let mut yaw = 0.0;
        let mut steps = 0;
        while yaw != MAX {
            let next = approach_yaw(yaw, MAX, STEP);
            assert!(next - yaw <= STEP + 1e-6);
            yaw = next;
            steps += 1;
            assert!(steps < 100);
        }
        // 35° at 1.2° per step
        assert_eq!(steps, 30);
    }

    #[test]
    fn release_recentres_without_overshoot() {
        let mut yaw = -MAX;
        for _ in 0..40 {
            yaw = approach_yaw(yaw, 0.0, STEP);
            assert!(yaw <= 0.0);
        }
        assert_eq!(yaw, 0.0);
    }
}
