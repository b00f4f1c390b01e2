// ==============================================================================
// kinematics.rs — CONTACT-POINT VELOCITY + GROUND-PLANE WHEEL BASIS
// ------------------------------------------------------------------------------
// point_velocity(...):
// - velocity of the chassis material point coincident with a world point
//     v(p) = v_com + ω × (p - com)
//
// ground_basis(...):
// - wheel forward = chassis rotation * steer yaw * local +Z
// - projected onto the plane of the contact normal (world up when airborne)
// - side = normal × forward (local +X when level and unsteered)
//
// slip_components(...):
// - (v_fwd, v_lat) = (v · forward, v · side)
// ==============================================================================

use rapier3d::na::UnitQuaternion;
use rapier3d::prelude::{Point, Real, Vector};

#[inline]
pub fn world_up() -> Vector<Real> {
    Vector::new(0.0, 1.0, 0.0)
}

/// World-space velocity of a point rigidly attached to the body.
#[inline]
pub fn point_velocity(
    linvel: Vector<Real>,
    angvel: Vector<Real>,
    com: Point<Real>,
    p: Point<Real>,
) -> Vector<Real> {
    let lever = p.coords - com.coords;
    linvel + angvel.cross(&lever)
}

/// Unit forward/side directions of a wheel, tangent to the ground.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundBasis {
    pub forward: Vector<Real>,
    pub side: Vector<Real>,
    pub normal: Vector<Real>,
}

impl GroundBasis {
    /// Splits a velocity into (forward, lateral) speeds.
    #[inline]
    pub fn slip_components(&self, v: Vector<Real>) -> (Real, Real) {
        (v.dot(&self.forward), v.dot(&self.side))
    }
}

/// Orientation of a wheel in world space: chassis rotation followed by the
/// wheel's own yaw about the chassis up axis.
#[inline]
pub fn wheel_rotation(chassis: &UnitQuaternion<Real>, steer_yaw: Real) -> UnitQuaternion<Real> {
    chassis * UnitQuaternion::from_axis_angle(&Vector::y_axis(), steer_yaw)
}

pub fn ground_basis(
    chassis: &UnitQuaternion<Real>,
    steer_yaw: Real,
    contact_normal: Vector<Real>,
) -> GroundBasis {
    let normal = safe_normalize(contact_normal, world_up());

    let raw_forward = wheel_rotation(chassis, steer_yaw) * Vector::new(0.0, 0.0, 1.0);

    // remove the component along the normal so forward hugs the surface
    let projected = raw_forward - normal * raw_forward.dot(&normal);

    // chassis pointing straight along the normal: fall back to its own up-facing axis
    let fallback = chassis * Vector::new(0.0, 1.0, 0.0);
    let forward = safe_normalize(projected, fallback);
    let side = safe_normalize(normal.cross(&forward), chassis * Vector::new(1.0, 0.0, 0.0));

    GroundBasis { forward, side, normal }
}

#[inline]
fn safe_normalize(v: Vector<Real>, fallback: Vector<Real>) -> Vector<Real> {
    let n = v.norm();
    if n > 1e-6 && n.is_finite() { v / n } else { fallback }
}
