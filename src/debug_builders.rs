// ==============================================================================
// debug_builders.rs — DEBUG OVERLAY SEGMENTS (SERVER -> CLIENT)
// ------------------------------------------------------------------------------
// Pure builders: take numbers the step already computed and return line
// segments for the renderer. Nothing here reads or writes physics state, and
// the vehicle only calls in when debug visualisation is switched on.
//
// Per wheel:
// - probe   ray origin → origin + dir * length      (green grounded, grey not)
// - spring  target → target + J_susp / m            (green)
// - accel   target → target + J_long * 100 / m      (blue)
// - slip    target → target + J_lat  * 100 / m      (red)
// where J = F * dt is the impulse applied this step and m the chassis mass.
// ==============================================================================

use rapier3d::prelude::{Point, Real, Vector};
use serde::Serialize;

use crate::suspension_contact::ContactProbe;

/// Scale applied to tire impulses so they are visible next to the spring.
const TIRE_LINE_SCALE: Real = 100.0;

const GREEN: [f32; 3] = [0.0, 1.0, 0.0];
const GREY: [f32; 3] = [0.5, 0.5, 0.5];
const BLUE: [f32; 3] = [0.0, 0.0, 1.0];
const RED: [f32; 3] = [1.0, 0.0, 0.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Probe,
    Spring,
    Acceleration,
    Slip,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebugSegment {
    pub kind: SegmentKind,
    pub wheel: usize,
    pub start: [f32; 3],
    pub end: [f32; 3],
    pub color: [f32; 3],
}

/// Forces one wheel applied this step (N, world).
#[derive(Debug, Clone, Copy)]
pub struct WheelForces {
    pub suspension: Vector<Real>,
    pub longitudinal: Vector<Real>,
    pub lateral: Vector<Real>,
}

#[inline]
fn p3(p: Point<Real>) -> [f32; 3] {
    [p.x, p.y, p.z]
}

pub fn probe_segment(wheel: usize, probe: &ContactProbe) -> DebugSegment {
    let end = probe.origin + probe.direction * probe.length;
    DebugSegment {
        kind: SegmentKind::Probe,
        wheel,
        start: p3(probe.origin),
        end: p3(end),
        color: if probe.grounded { GREEN } else { GREY },
    }
}

fn impulse_segment(
    kind: SegmentKind,
    wheel: usize,
    from: Point<Real>,
    impulse: Vector<Real>,
    scale: Real,
    color: [f32; 3],
) -> DebugSegment {
    DebugSegment {
        kind,
        wheel,
        start: p3(from),
        end: p3(from + impulse * scale),
        color,
    }
}

/// Spring, acceleration and slip lines from the wheel target. Airborne wheels
/// only get their probe ray.
pub fn wheel_segments(
    wheel: usize,
    probe: &ContactProbe,
    forces: &WheelForces,
    chassis_mass: Real,
    dt: Real,
) -> Vec<DebugSegment> {
    let mut out = vec![probe_segment(wheel, probe)];
    if !probe.grounded {
        return out;
    }

    let inv_mass = if chassis_mass > 0.0 { 1.0 / chassis_mass } else { 0.0 };
    let from = probe.target;

    out.push(impulse_segment(SegmentKind::Spring, wheel, from, forces.suspension * dt, inv_mass, GREEN));
    out.push(impulse_segment(
        SegmentKind::Acceleration,
        wheel,
        from,
        forces.longitudinal * dt,
        TIRE_LINE_SCALE * inv_mass,
        BLUE,
    ));
    out.push(impulse_segment(
        SegmentKind::Slip,
        wheel,
        from,
        forces.lateral * dt,
        TIRE_LINE_SCALE * inv_mass,
        RED,
    ));
    out
}
