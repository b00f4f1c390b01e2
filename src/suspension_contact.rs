// ==============================================================================
// suspension_contact.rs — RAYCAST GROUND PROBE + SPRING/DAMPER SUSPENSION
// ------------------------------------------------------------------------------
// probe_ground(...):
//   down   = chassis rotation * (0, -1, 0)
//   origin = mount - down * r         (one radius above the wheel mount)
//   ray    = origin + t * down,  t in [0, 2r], solid
//   hit  → grounded, target = hit - down * r (wheel center resting on the
//          surface), normal = surface normal
//   miss → airborne, target = mount (full extension), normal = 0
//   Only reads the world; never mutates physics state.
//
// suspension_force(...):
//   offset  = target - mount                       (compression vector)
//   spring  = offset * k
//   damper  = -(v_point · down) * down * c,  v_point at target (linvel + ω×lever)
//   the sum is kept along the suspension axis and clamped so a wheel can
//   only push the chassis away from the ground. Airborne wheels → zero.
// ==============================================================================

use rapier3d::prelude::{Isometry, Point, Real, RigidBodyHandle, Vector};

use crate::physics::{BodyState, RayCaster};
use crate::tire::kinematics::point_velocity;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactProbe {
    pub grounded: bool,
    pub mount: Point<Real>,     // wheel attachment, world
    pub origin: Point<Real>,    // ray start, world
    pub direction: Vector<Real>,// unit, chassis down
    pub length: Real,           // 2r
    pub hit: Option<Point<Real>>,
    pub target: Point<Real>,    // wheel center, world
    pub normal: Vector<Real>,   // zero when airborne
}

impl ContactProbe {
    /// Distance of the target from the ray origin along the probe axis.
    #[inline]
    pub fn target_depth(&self) -> Real {
        (self.target - self.origin).dot(&self.direction)
    }
}

pub fn probe_ground<R: RayCaster + ?Sized>(
    caster: &R,
    chassis: &Isometry<Real>,
    local_mount: Point<Real>,
    radius: Real,
    exclude: Option<RigidBodyHandle>,
) -> ContactProbe {
    let down = chassis.rotation * Vector::new(0.0, -1.0, 0.0);
    let mount = chassis * local_mount;
    let origin = mount - down * radius;
    let length = 2.0 * radius;

    match caster.cast_ray(origin, down, length, exclude) {
        Some(hit) if hit.distance <= length => ContactProbe {
            grounded: true,
            mount,
            origin,
            direction: down,
            length,
            hit: Some(hit.point),
            target: hit.point - down * radius,
            normal: hit.normal,
        },
        _ => ContactProbe {
            grounded: false,
            mount,
            origin,
            direction: down,
            length,
            hit: None,
            target: mount,
            normal: Vector::zeros(),
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SuspensionForce {
    pub force: Vector<Real>, // N, world
    pub magnitude: Real,     // N, >= 0
    pub point: Point<Real>,  // application point (the contact target)
}

impl SuspensionForce {
    pub fn none(point: Point<Real>) -> Self {
        Self {
            force: Vector::zeros(),
            magnitude: 0.0,
            point,
        }
    }
}

pub fn suspension_force(
    probe: &ContactProbe,
    body: &BodyState,
    stiffness: Real,
    damping: Real,
) -> SuspensionForce {
    if !probe.grounded {
        return SuspensionForce::none(probe.target);
    }

    let down = probe.direction;
    let up = -down;

    let offset = probe.target - probe.mount;
    let spring = offset * stiffness;

    let v_point = point_velocity(body.linvel, body.angvel, body.com, probe.target);
    let damper = -down * (v_point.dot(&down) * damping);

    // along-axis magnitude; negative would pull the chassis into the ground
    let magnitude = (spring + damper).dot(&up).max(0.0);

    SuspensionForce {
        force: up * magnitude,
        magnitude,
        point: probe.target,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::RayHit;
    use rapier3d::na::UnitQuaternion;

    /// Infinite horizontal plane at y = height.
    struct Plane {
        height: Real,
    }

    impl RayCaster for Plane {
        fn cast_ray(
            &self,
            origin: Point<Real>,
            direction: Vector<Real>,
            max_distance: Real,
            _exclude: Option<RigidBodyHandle>,
        ) -> Option<RayHit> {
            if direction.y >= 0.0 {
                return None;
            }
            let t = (self.height - origin.y) / direction.y;
            if t < 0.0 || t > max_distance {
                return None;
            }
            Some(RayHit {
                point: origin + direction * t,
                normal: Vector::new(0.0, 1.0, 0.0),
                distance: t,
            })
        }
    }

    fn body_at(y: Real) -> BodyState {
        BodyState {
            position: Isometry::translation(0.0, y, 0.0),
            linvel: Vector::zeros(),
            angvel: Vector::zeros(),
            com: Point::new(0.0, y, 0.0),
        }
    }

    const R: Real = 0.33;

    #[test]
    fn grounded_wheel_rests_one_radius_above_the_hit() {
        let chassis = Isometry::translation(0.0, 1.0, 0.0);
        let p = probe_ground(&Plane { height: 0.5 }, &chassis, Point::new(0.0, -0.3, 0.0), R, None);
        assert!(p.grounded);
        assert!((p.target.y - (0.5 + R)).abs() < 1e-5);
        assert_eq!(p.normal, Vector::new(0.0, 1.0, 0.0));
        assert!(p.target_depth() <= 2.0 * R + 1e-5);
    }

    #[test]
    fn missing_ground_leaves_wheel_at_full_extension() {
        let chassis = Isometry::translation(0.0, 5.0, 0.0);
        let p = probe_ground(&Plane { height: 0.0 }, &chassis, Point::new(0.4, -0.3, 1.2), R, None);
        assert!(!p.grounded);
        assert_eq!(p.target, p.mount);
        assert_eq!(p.normal, Vector::zeros());
        assert!((p.target_depth() - R).abs() < 1e-5);
    }

    #[test]
    fn probe_follows_chassis_roll() {
        let rot = UnitQuaternion::from_axis_angle(&Vector::z_axis(), 0.2);
        let chassis = Isometry::from_parts(Vector::new(0.0, 1.0, 0.0).into(), rot);
        let p = probe_ground(&Plane { height: 0.8 }, &chassis, Point::origin(), R, None);
        assert!((p.direction - rot * Vector::new(0.0, -1.0, 0.0)).norm() < 1e-6);
        assert!(p.grounded);
    }

    #[test]
    fn compressed_spring_pushes_up() {
        let chassis = Isometry::translation(0.0, 0.6, 0.0);
        let body = body_at(0.6);
        let p = probe_ground(&Plane { height: 0.0 }, &chassis, Point::new(0.0, -0.4, 0.0), R, None);
        // mount at 0.2, target at 0.33: 0.13 m compression
        let f = suspension_force(&p, &body, 24_000.0, 1_800.0);
        assert!((f.magnitude - 0.13 * 24_000.0).abs() < 1.0);
        assert!(f.force.y > 0.0);
        assert_eq!(f.point, p.target);
    }

    #[test]
    fn damper_resists_compression_speed() {
        let chassis = Isometry::translation(0.0, 0.6, 0.0);
        let p = probe_ground(&Plane { height: 0.0 }, &chassis, Point::new(0.0, -0.4, 0.0), R, None);

        let mut falling = body_at(0.6);
        falling.linvel = Vector::new(0.0, -1.0, 0.0);
        let mut rising = body_at(0.6);
        rising.linvel = Vector::new(0.0, 1.0, 0.0);

        let still = suspension_force(&p, &body_at(0.6), 24_000.0, 1_800.0).magnitude;
        let f_fall = suspension_force(&p, &falling, 24_000.0, 1_800.0).magnitude;
        let f_rise = suspension_force(&p, &rising, 24_000.0, 1_800.0).magnitude;
        assert!((f_fall - still - 1_800.0).abs() < 1.0);
        assert!(f_rise < still);
    }

    #[test]
    fn fast_rebound_never_pulls_down() {
        let chassis = Isometry::translation(0.0, 0.6, 0.0);
        let p = probe_ground(&Plane { height: 0.0 }, &chassis, Point::new(0.0, -0.4, 0.0), R, None);
        let mut body = body_at(0.6);
        body.linvel = Vector::new(0.0, 20.0, 0.0);
        let f = suspension_force(&p, &body, 24_000.0, 1_800.0);
        assert_eq!(f.magnitude, 0.0);
        assert_eq!(f.force, Vector::zeros());
    }

    #[test]
    fn airborne_wheel_applies_nothing() {
        let chassis = Isometry::translation(0.0, 9.0, 0.0);
        let p = probe_ground(&Plane { height: 0.0 }, &chassis, Point::origin(), R, None);
        let f = suspension_force(&p, &body_at(9.0), 24_000.0, 1_800.0);
        assert_eq!(f.magnitude, 0.0);
    }
}
