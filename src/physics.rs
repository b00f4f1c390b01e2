// ==============================================================================
// physics.rs — RIGID-BODY ENGINE SEAM + RAPIER3D WORLD
// ------------------------------------------------------------------------------
// The vehicle core never talks to rapier directly. It sees two traits:
//
// RayCaster       cast_ray(origin, dir, max, exclude) -> Option<RayHit>
// PhysicsBackend  create/remove chassis, read body state, apply force or
//                 impulse at a world point, clear forces, step the world
//
// PhysicsWorld implements both on top of rapier3d:
// - chassis: dynamic body whose origin IS the center of mass; the box
//   collider is massless and shifted by the center-of-gravity offset
// - ground: fixed box colliders in GROUP_GROUND; wheel probes only see
//   GROUP_GROUND so they never hit a chassis
// - step(dt, substeps): pipeline.step() substeps times, then resets any
//   body that left the world or went non-finite
// ==============================================================================

use log::{info, warn};
use rapier3d::prelude::*;

use crate::error::VehicleError;

const GROUP_GROUND: Group = Group::GROUP_1;
const GROUP_CHASSIS: Group = Group::GROUP_2;

/// Positions beyond this (m) on any axis count as exploded.
const WORLD_LIMIT: Real = 1_000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub point: Point<Real>,
    pub normal: Vector<Real>,
    pub distance: Real,
}

pub trait RayCaster {
    /// First hit against world geometry along a unit `direction`, ignoring
    /// the colliders of `exclude`.
    fn cast_ray(
        &self,
        origin: Point<Real>,
        direction: Vector<Real>,
        max_distance: Real,
        exclude: Option<RigidBodyHandle>,
    ) -> Option<RayHit>;
}

/// Everything needed to create a chassis body.
#[derive(Debug, Clone, Copy)]
pub struct ChassisDesc {
    pub mass: Real,
    pub half_extents: Vector<Real>,
    pub center_of_gravity: Vector<Real>, // collider offset from the body origin
    pub position: Isometry<Real>,        // body origin (center of mass) in world space
    pub angular_damping: Real,
}

/// Read-only body state sampled at the start of a vehicle step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyState {
    pub position: Isometry<Real>,
    pub linvel: Vector<Real>,
    pub angvel: Vector<Real>,
    pub com: Point<Real>,
}

pub trait PhysicsBackend: RayCaster {
    fn create_rigid_body(&mut self, desc: &ChassisDesc) -> Result<RigidBodyHandle, VehicleError>;
    fn remove_rigid_body(&mut self, handle: RigidBodyHandle) -> bool;
    fn body_state(&self, handle: RigidBodyHandle) -> Option<BodyState>;
    fn apply_force(&mut self, handle: RigidBodyHandle, force: Vector<Real>, point: Point<Real>);
    fn apply_impulse(&mut self, handle: RigidBodyHandle, impulse: Vector<Real>, point: Point<Real>);
    fn clear_forces(&mut self, handle: RigidBodyHandle);
    fn step(&mut self, dt: Real, substeps: usize);
}

pub struct PhysicsWorld {
    pub gravity: Vector<Real>,              // gravity vector
    pub pipeline: PhysicsPipeline,          // physics pipeline
    pub island_manager: IslandManager,      // manages islands of bodies
    pub broad_phase: DefaultBroadPhase,     // broad-phase collision detection
    pub narrow_phase: NarrowPhase,          // collision detection
    pub bodies: RigidBodySet,               // for rigid bodies
    pub colliders: ColliderSet,             // for collision shapes
    pub joints: ImpulseJointSet,            // for constraints
    pub multibody_joints: MultibodyJointSet,// for articulated bodies
    pub ccd: CCDSolver,                     // continuous collision detection
    pub query_pipeline: QueryPipeline,      // for raycasting
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new(vector![0.0, -9.81, 0.0])
    }
}

impl PhysicsWorld {
    pub fn new(gravity: Vector<Real>) -> Self {
        Self {
            gravity,
            pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
        }
    }

    /// World with a 1000 x 1000 m flat ground whose top surface is y = 0.
    pub fn with_flat_ground(gravity: Vector<Real>) -> Self {
        let mut world = Self::new(gravity);
        world.insert_ground_box(vector![500.0, 0.5, 500.0], Isometry::translation(0.0, -0.5, 0.0));
        world
    }

    /// Static box the wheels can stand on.
    pub fn insert_ground_box(&mut self, half_extents: Vector<Real>, position: Isometry<Real>) -> RigidBodyHandle {
        let body = RigidBodyBuilder::fixed().position(position).build();
        let handle = self.bodies.insert(body);

        let collider = ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z)
            .collision_groups(InteractionGroups::new(GROUP_GROUND, GROUP_CHASSIS))
            .friction(1.0)
            .restitution(0.0)
            .build();
        self.colliders.insert_with_parent(collider, handle, &mut self.bodies);
        self.query_pipeline.update(&self.colliders);

        info!(
            "ground inserted at {:?}. Bodies = {}, Colliders = {}",
            position.translation.vector,
            self.bodies.len(),
            self.colliders.len()
        );
        handle
    }

    /// Resets bodies that left the world; returns how many were reset.
    fn reset_exploding_bodies(&mut self) -> usize {
        let mut reset = 0;
        for (handle, body) in self.bodies.iter_mut() {
            if !body.is_dynamic() {
                continue;
            }
            let pos = *body.translation();
            let bad = !pos.iter().all(|c| c.is_finite()) || pos.iter().any(|c| c.abs() > WORLD_LIMIT);
            if bad {
                let safe = vector![0.0, 1.0, 0.0];
                body.set_position(Isometry::translation(safe.x, safe.y, safe.z), true);
                body.set_linvel(Vector::zeros(), true);
                body.set_angvel(Vector::zeros(), true);
                body.reset_forces(true);
                warn!("reset exploding body {:?} back to {:?}", handle, safe);
                reset += 1;
            }
        }
        reset
    }
}

impl RayCaster for PhysicsWorld {
    fn cast_ray(
        &self,
        origin: Point<Real>,
        direction: Vector<Real>,
        max_distance: Real,
        exclude: Option<RigidBodyHandle>,
    ) -> Option<RayHit> {
        let ray = Ray::new(origin, direction);
        let mut filter = QueryFilter::default().groups(InteractionGroups::new(Group::ALL, GROUP_GROUND));
        if let Some(handle) = exclude {
            filter = filter.exclude_rigid_body(handle);
        }

        let (_collider, hit) = self.query_pipeline.cast_ray_and_get_normal(
            &self.bodies,
            &self.colliders,
            &ray,
            max_distance,
            true,
            filter,
        )?;

        Some(RayHit {
            point: ray.point_at(hit.time_of_impact),
            normal: hit.normal,
            distance: hit.time_of_impact,
        })
    }
}

impl PhysicsBackend for PhysicsWorld {
    fn create_rigid_body(&mut self, desc: &ChassisDesc) -> Result<RigidBodyHandle, VehicleError> {
        let he = desc.half_extents;
        if !(desc.mass > 0.0) || he.iter().any(|c| !(*c > 0.0)) {
            return Err(VehicleError::BodyCreation(format!(
                "mass {} / half extents {:?} cannot make a solid box",
                desc.mass, he
            )));
        }

        // solid box inertia about its own center, placed at the body origin
        let (sx, sy, sz) = (2.0 * he.x, 2.0 * he.y, 2.0 * he.z);
        let k = desc.mass / 12.0;
        let inertia = vector![k * (sy * sy + sz * sz), k * (sx * sx + sz * sz), k * (sx * sx + sy * sy)];
        let mass_props = MassProperties::new(Point::origin(), desc.mass, inertia);

        let rb = RigidBodyBuilder::dynamic()
            .position(desc.position)
            .additional_mass_properties(mass_props)
            .angular_damping(desc.angular_damping)
            .can_sleep(false)
            .build();

        let collider = ColliderBuilder::cuboid(he.x, he.y, he.z)
            .translation(desc.center_of_gravity)
            .density(0.0)
            .collision_groups(InteractionGroups::new(GROUP_CHASSIS, GROUP_GROUND))
            .friction(0.0)
            .restitution(0.0)
            .build();

        let handle = self.bodies.insert(rb);
        self.colliders.insert_with_parent(collider, handle, &mut self.bodies);

        // mass and world COM must be valid before the first step reads them
        let body = self
            .bodies
            .get_mut(handle)
            .ok_or_else(|| VehicleError::BodyCreation("body vanished on insert".to_string()))?;
        body.recompute_mass_properties_from_colliders(&self.colliders);

        self.query_pipeline.update(&self.colliders);
        Ok(handle)
    }

    fn remove_rigid_body(&mut self, handle: RigidBodyHandle) -> bool {
        self.bodies
            .remove(
                handle,
                &mut self.island_manager,
                &mut self.colliders,
                &mut self.joints,
                &mut self.multibody_joints,
                true,
            )
            .is_some()
    }

    fn body_state(&self, handle: RigidBodyHandle) -> Option<BodyState> {
        let body = self.bodies.get(handle)?;
        Some(BodyState {
            position: *body.position(),
            linvel: *body.linvel(),
            angvel: *body.angvel(),
            com: *body.center_of_mass(),
        })
    }

    fn apply_force(&mut self, handle: RigidBodyHandle, force: Vector<Real>, point: Point<Real>) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.add_force_at_point(force, point, true);
        }
    }

    fn apply_impulse(&mut self, handle: RigidBodyHandle, impulse: Vector<Real>, point: Point<Real>) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.apply_impulse_at_point(impulse, point, true);
        }
    }

    fn clear_forces(&mut self, handle: RigidBodyHandle) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.reset_forces(true);
        }
    }

    fn step(&mut self, dt: Real, substeps: usize) {
        let substeps = substeps.max(1);
        let params = IntegrationParameters {
            dt: dt / substeps as Real,
            ..IntegrationParameters::default()
        };

        for _ in 0..substeps {
            self.pipeline.step(
                &self.gravity,
                &params,
                &mut self.island_manager,
                &mut self.broad_phase,
                &mut self.narrow_phase,
                &mut self.bodies,
                &mut self.colliders,
                &mut self.joints,
                &mut self.multibody_joints,
                &mut self.ccd,
                Some(&mut self.query_pipeline),
                &(),
                &(),
            );
        }

        if self.reset_exploding_bodies() > 0 {
            self.query_pipeline.update(&self.colliders);
        }
    }
}
