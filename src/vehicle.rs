// ==============================================================================
// vehicle.rs — RAYCAST VEHICLE: WHEEL RECORDS + FIXED-STEP INTEGRATOR
// ------------------------------------------------------------------------------
// A Vehicle owns one chassis body handle and an array of Wheel records. All
// behaviour lives in Vehicle::step(), which runs the same passes every tick,
// each pass finishing for every wheel before the next one starts:
//
//   1) drivetrain    pedals, shift flags, rpm from powered wheels, torque
//   2) probe + spin  raycast each wheel, re-sync/integrate ω, slip ratio,
//                    longitudinal demand
//   3) suspension    spring + damper at each grounded target
//   4) weight        this step's suspension forces → per-wheel traction budget
//   5) tires         steering rack, slip angle, lateral demand, traction
//                    circle, apply at the target (grounded wheels only)
//   6) drag          -c v|v| at the center of mass
//   7) visuals       wheel spin angle, tire state, optional debug segments
//
// Body state is sampled once at the start of the step. Every force goes
// through apply() under the vehicle's ForceMode (impulse F·dt by default).
// The physics world is stepped by the caller, once, after all vehicles.
// ==============================================================================

use std::f32::consts::TAU;

use log::{info, trace};
use rapier3d::prelude::{Isometry, Point, Real, RigidBodyHandle, Vector};
use serde::Serialize;

use crate::config::{ForceMode, VehicleConfig, WheelConfig};
use crate::debug_builders::{wheel_segments, DebugSegment, WheelForces};
use crate::drivetrain::Drivetrain;
use crate::error::VehicleError;
use crate::input::InputState;
use crate::physics::{BodyState, ChassisDesc, PhysicsBackend};
use crate::suspension_contact::{probe_ground, suspension_force, ContactProbe};
use crate::tire::curve::Curve;
use crate::tire::kinematics::{ground_basis, point_velocity, wheel_rotation, world_up, GroundBasis};
use crate::tire::lateral::solve_lateral;
use crate::tire::longitudinal::{solve_longitudinal, LongitudinalInput, LongitudinalResult};
use crate::tire::solve::combine;
use crate::tire::state::{classify, TireState};
use crate::tire::steering::{approach_yaw, steer_target};
use crate::tire::weight_transfer::{transfer_weight, LoadShare};

#[derive(Debug, Clone)]
pub struct Wheel {
    pub index: usize,
    pub local_mount: Point<Real>, // chassis body frame (offset + center of gravity)
    pub radius: Real,
    pub stiffness: Real,
    pub damping: Real,
    pub powered: bool,
    pub steerable: bool,
    pub brakes: bool,

    pub grounded: bool,
    pub target: Point<Real>,      // wheel center, world
    pub normal: Vector<Real>,     // contact normal, zero when airborne
    pub forward: Vector<Real>,    // rolling direction on the ground plane
    pub steer_angle: Real,        // rad, yaw relative to the chassis
    pub spin_angle: Real,         // rad, visual rotation
    pub angular_velocity: Real,   // rad/s
    pub angular_acceleration: Real,
    pub slip_ratio: Real,         // [-1, 1]
    pub traction: Real,           // grip from slip ratio
    pub slip_angle: Real,         // rad
    pub grip: Real,               // grip from slip angle
    pub suspension_force: Real,   // N, this step
    pub load: LoadShare,          // traction budget + normal load
    pub drive_force: Real,        // N along forward (drive + rolling), after the traction circle
    pub lateral_force: Real,      // N along side, after the traction circle
    pub prev_forward_velocity: Vector<Real>,
    pub tire_state: TireState,
}

impl Wheel {
    fn from_config(index: usize, config: &WheelConfig, center_of_gravity: Vector<Real>, load: LoadShare) -> Self {
        let [x, y, z] = config.offset;
        Self {
            index,
            local_mount: Point::new(x, y, z) + center_of_gravity,
            radius: config.radius,
            stiffness: config.stiffness,
            damping: config.damping,
            powered: config.powered,
            steerable: config.steerable,
            brakes: config.brakes,

            grounded: false,
            target: Point::origin(),
            normal: Vector::zeros(),
            forward: Vector::new(0.0, 0.0, 1.0),
            steer_angle: 0.0,
            spin_angle: 0.0,
            angular_velocity: 0.0,
            angular_acceleration: 0.0,
            slip_ratio: 0.0,
            traction: 0.0,
            slip_angle: 0.0,
            grip: 0.0,
            suspension_force: 0.0,
            load,
            drive_force: 0.0,
            lateral_force: 0.0,
            prev_forward_velocity: Vector::zeros(),
            tire_state: TireState::Airborne,
        }
    }
}

/// What one step did, for HUD and tests.
#[derive(Debug, Clone, Default)]
pub struct StepReport {
    pub rpm: Real,
    pub gear: usize,
    pub applied_torque: Real,
    pub grounded_wheels: usize,
    pub total_suspension_force: Real,
    pub debug_segments: Vec<DebugSegment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WheelSnapshot {
    pub index: usize,
    pub grounded: bool,
    pub target: [f32; 3],
    pub normal: [f32; 3],
    pub rotation: [f32; 4], // chassis rotation · steering yaw (x, y, z, w)
    pub steer_angle: f32,
    pub spin_angle: f32,
    pub angular_velocity: f32,
    pub slip_ratio: f32,
    pub slip_angle: f32,
    pub grip: f32,
    pub suspension_force: f32,
    pub max_drive_force: f32,
    pub tire_state: TireState,
    pub visible: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct VehicleSnapshot {
    pub position: [f32; 3],
    pub rotation: [f32; 4], // quaternion (x, y, z, w)
    pub speed_kmh: f32,
    pub rpm: f32,
    pub gear: usize,
    pub gear_label: String,
    pub throttle: f32,
    pub brake: f32,
    pub applied_torque: f32,
    pub wheels: Vec<WheelSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<Vec<DebugSegment>>,
}

pub struct Vehicle {
    pub body: RigidBodyHandle,  // the chassis body
    pub config: VehicleConfig,  // vehicle parameters
    pub drivetrain: Drivetrain, // pedals, gearbox, engine
    pub wheels: Vec<Wheel>,
    pub debug_enabled: bool,
    pub wheels_visible: bool,

    slip_ratio_curve: Curve,
    slip_angle_curve: Curve,
    debug_segments: Vec<DebugSegment>,
}

/// Per-wheel scratch carried between the passes of one step.
struct WheelPass {
    probe: ContactProbe,
    point_velocity: Vector<Real>,
    longitudinal: LongitudinalResult,
    forces: WheelForces,
}

impl Vehicle {
    /// Validates `config`, creates the chassis body with its center of mass
    /// at `position`, and builds the wheel array.
    pub fn spawn<B: PhysicsBackend + ?Sized>(
        physics: &mut B,
        config: VehicleConfig,
        position: Isometry<Real>,
    ) -> Result<Self, VehicleError> {
        config.validate()?;

        let [hx, hy, hz] = config.chassis.half_extents;
        let [cx, cy, cz] = config.chassis.center_of_gravity;
        let desc = ChassisDesc {
            mass: config.chassis.mass,
            half_extents: Vector::new(hx, hy, hz),
            center_of_gravity: Vector::new(cx, cy, cz),
            position,
            angular_damping: config.chassis.angular_damping,
        };
        let body = physics.create_rigid_body(&desc)?;

        info!(
            "spawned vehicle body {:?} at {:?} ({} kg, {} wheels, {} powered)",
            body,
            position.translation.vector,
            config.chassis.mass,
            config.wheels.len(),
            config.powered_wheel_count()
        );
        Ok(Self::attach(body, config))
    }

    /// Wraps an existing chassis body. `config` must already be validated.
    pub fn attach(body: RigidBodyHandle, config: VehicleConfig) -> Self {
        let [cx, cy, cz] = config.chassis.center_of_gravity;
        let cog = Vector::new(cx, cy, cz);
        let load = LoadShare::even(config.chassis.mass, config.gravity, config.wheels.len());

        let wheels = config
            .wheels
            .iter()
            .enumerate()
            .map(|(i, w)| Wheel::from_config(i, w, cog, load))
            .collect();

        Self {
            body,
            drivetrain: Drivetrain::new(&config),
            slip_ratio_curve: config.slip_ratio_curve(),
            slip_angle_curve: config.slip_angle_curve(),
            wheels,
            debug_enabled: false,
            wheels_visible: true,
            debug_segments: Vec::new(),
            config,
        }
    }

    /// Releases the chassis body.
    pub fn despawn<B: PhysicsBackend + ?Sized>(self, physics: &mut B) -> bool {
        let removed = physics.remove_rigid_body(self.body);
        info!("despawned vehicle body {:?} (removed = {removed})", self.body);
        removed
    }

    pub fn toggle_debug_visualization(&mut self) -> bool {
        self.debug_enabled = !self.debug_enabled;
        if !self.debug_enabled {
            self.debug_segments.clear();
        }
        self.debug_enabled
    }

    pub fn toggle_wheel_visibility(&mut self) -> bool {
        self.wheels_visible = !self.wheels_visible;
        self.wheels_visible
    }

    pub fn debug_segments(&self) -> &[DebugSegment] {
        &self.debug_segments
    }

    pub fn powered_wheel_count(&self) -> usize {
        self.wheels.iter().filter(|w| w.powered).count()
    }

    // ==========================================================================
    // Fixed step
    // ==========================================================================

    pub fn step<B: PhysicsBackend + ?Sized>(
        &mut self,
        physics: &mut B,
        input: &mut InputState,
        dt: Real,
    ) -> Result<StepReport, VehicleError> {
        let state = physics
            .body_state(self.body)
            .ok_or(VehicleError::MissingBody(self.body))?;

        if !(dt > 0.0 && dt.is_finite()) {
            return Ok(self.report());
        }

        let mode = self.config.force_mode;
        if mode == ForceMode::Force {
            physics.clear_forces(self.body);
        }

        let gravity = self.config.gravity;
        let mass = self.config.chassis.mass;

        // --------------------------------------------------
        // 1) drivetrain
        // --------------------------------------------------
        self.drivetrain.update(
            input,
            self.wheels.iter().filter(|w| w.powered).map(|w| w.angular_velocity),
            dt,
        );
        let drive_torque = self.drivetrain.wheel_drive_torque();
        let brake_torque = self.drivetrain.wheel_brake_torque();
        let max_omega = self.drivetrain.max_wheel_angular_velocity();

        // --------------------------------------------------
        // 2) probe + wheel angular dynamics
        // --------------------------------------------------
        let mut passes: Vec<WheelPass> = Vec::with_capacity(self.wheels.len());
        for wheel in &mut self.wheels {
            let probe = probe_ground(&*physics, &state.position, wheel.local_mount, wheel.radius, Some(self.body));
            wheel.grounded = probe.grounded;
            wheel.target = probe.target;
            wheel.normal = probe.normal;

            let basis = wheel_basis(&state, wheel.steer_angle, &probe);
            let v = point_velocity(state.linvel, state.angvel, state.com, probe.target);
            let (v_fwd, _) = basis.slip_components(v);

            let long_input = LongitudinalInput {
                dt,
                radius: wheel.radius,
                wheel_mass: self.config.tires.wheel_mass,
                grounded: probe.grounded,
                prev_forward_speed: wheel.prev_forward_velocity.dot(&basis.forward),
                forward_speed: v_fwd,
                drive_torque: if wheel.powered { drive_torque } else { 0.0 },
                brake_torque: if wheel.brakes { brake_torque } else { 0.0 },
                max_angular_velocity: if wheel.powered { max_omega } else { None },
                max_drive_force: wheel.load.max_drive_force,
                rolling_resistance: self.config.tires.rolling_resistance,
                gravity,
            };
            let long = solve_longitudinal(wheel.angular_velocity, &long_input, &self.slip_ratio_curve);

            wheel.angular_velocity = long.angular_velocity;
            wheel.angular_acceleration = long.angular_acceleration;
            wheel.slip_ratio = long.slip_ratio;
            wheel.traction = long.grip;

            passes.push(WheelPass {
                probe,
                point_velocity: v,
                longitudinal: long,
                forces: WheelForces {
                    suspension: Vector::zeros(),
                    longitudinal: Vector::zeros(),
                    lateral: Vector::zeros(),
                },
            });
        }

        // --------------------------------------------------
        // 3) suspension
        // --------------------------------------------------
        for (wheel, pass) in self.wheels.iter_mut().zip(passes.iter_mut()) {
            let spring = suspension_force(&pass.probe, &state, wheel.stiffness, wheel.damping);
            wheel.suspension_force = spring.magnitude;
            pass.forces.suspension = spring.force;
            apply(physics, self.body, mode, spring.force, spring.point, dt);
        }

        // --------------------------------------------------
        // 4) weight transfer
        // --------------------------------------------------
        let suspension: Vec<Real> = self.wheels.iter().map(|w| w.suspension_force).collect();
        let mut loads: Vec<LoadShare> = self.wheels.iter().map(|w| w.load).collect();
        if transfer_weight(&suspension, mass, gravity, &mut loads) {
            for (wheel, load) in self.wheels.iter_mut().zip(loads) {
                wheel.load = load;
            }
        }

        // --------------------------------------------------
        // 5) steering + lateral + traction circle
        // --------------------------------------------------
        let yaw_target = steer_target(input.left, input.right, self.config.steering.max_angle());
        let yaw_step = self.config.steering.step();
        let max_slip_angle = self.config.tires.max_slip_angle();

        for (wheel, pass) in self.wheels.iter_mut().zip(passes.iter_mut()) {
            if wheel.steerable {
                wheel.steer_angle = approach_yaw(wheel.steer_angle, yaw_target, yaw_step);
            }

            let basis = wheel_basis(&state, wheel.steer_angle, &pass.probe);
            wheel.forward = basis.forward;
            let (v_fwd, v_lat) = basis.slip_components(pass.point_velocity);

            let budget = wheel.load.max_drive_force;
            let lat = solve_lateral(v_fwd, v_lat, max_slip_angle, budget, gravity, dt, &self.slip_angle_curve);
            wheel.slip_angle = lat.slip_angle;
            wheel.grip = lat.grip;

            if wheel.grounded {
                // rolling resistance shares the contact patch budget
                let longitudinal = pass.longitudinal.drive_force + pass.longitudinal.rolling_force;
                let tire = combine(&basis, longitudinal, lat.force, budget);
                wheel.drive_force = tire.longitudinal;
                wheel.lateral_force = tire.lateral;
                pass.forces.longitudinal = tire.longitudinal_vec;
                pass.forces.lateral = tire.lateral_vec;

                apply(physics, self.body, mode, tire.total(), wheel.target, dt);
            } else {
                wheel.drive_force = 0.0;
                wheel.lateral_force = 0.0;
            }

            wheel.prev_forward_velocity = basis.forward * v_fwd;
            wheel.tire_state = classify(wheel.grounded, wheel.slip_ratio, wheel.slip_angle, max_slip_angle);
        }

        // --------------------------------------------------
        // 6) aerodynamic drag
        // --------------------------------------------------
        let drag = -state.linvel * (state.linvel.norm() * self.config.aero.drag_coefficient);
        apply(physics, self.body, mode, drag, state.com, dt);

        // --------------------------------------------------
        // 7) visuals
        // --------------------------------------------------
        for wheel in &mut self.wheels {
            // a locked wheel does not turn
            if wheel.slip_ratio != -1.0 {
                wheel.spin_angle = (wheel.spin_angle + wheel.angular_velocity * dt).rem_euclid(TAU);
            }
        }

        self.debug_segments.clear();
        if self.debug_enabled {
            for (wheel, pass) in self.wheels.iter().zip(&passes) {
                self.debug_segments
                    .extend(wheel_segments(wheel.index, &pass.probe, &pass.forces, mass, dt));
            }
        }

        let report = self.report();
        trace!(
            "vehicle {:?}: rpm {:.0} gear {} torque {:.1} grounded {}/{} load {:.0}",
            self.body,
            report.rpm,
            report.gear,
            report.applied_torque,
            report.grounded_wheels,
            self.wheels.len(),
            report.total_suspension_force
        );
        Ok(report)
    }

    fn report(&self) -> StepReport {
        StepReport {
            rpm: self.drivetrain.rpm,
            gear: self.drivetrain.gear,
            applied_torque: self.drivetrain.applied_torque,
            grounded_wheels: self.wheels.iter().filter(|w| w.grounded).count(),
            total_suspension_force: self.wheels.iter().map(|w| w.suspension_force).sum(),
            debug_segments: self.debug_segments.clone(),
        }
    }

    // ==========================================================================
    // Telemetry
    // ==========================================================================

    pub fn snapshot<B: PhysicsBackend + ?Sized>(&self, physics: &B) -> Result<VehicleSnapshot, VehicleError> {
        let state = physics
            .body_state(self.body)
            .ok_or(VehicleError::MissingBody(self.body))?;

        let t = state.position.translation.vector;
        let q = state.position.rotation;

        let wheels = self
            .wheels
            .iter()
            .map(|w| {
                let r = wheel_rotation(&q, w.steer_angle);
                WheelSnapshot {
                    index: w.index,
                    grounded: w.grounded,
                    target: [w.target.x, w.target.y, w.target.z],
                    normal: [w.normal.x, w.normal.y, w.normal.z],
                    rotation: [r.i, r.j, r.k, r.w],
                    steer_angle: w.steer_angle,
                    spin_angle: w.spin_angle,
                    angular_velocity: w.angular_velocity,
                    slip_ratio: w.slip_ratio,
                    slip_angle: w.slip_angle,
                    grip: w.grip,
                    suspension_force: w.suspension_force,
                    max_drive_force: w.load.max_drive_force,
                    tire_state: w.tire_state,
                    visible: self.wheels_visible,
                }
            })
            .collect();

        Ok(VehicleSnapshot {
            position: [t.x, t.y, t.z],
            rotation: [q.i, q.j, q.k, q.w],
            speed_kmh: state.linvel.norm() * 3.6,
            rpm: self.drivetrain.rpm,
            gear: self.drivetrain.gear,
            gear_label: self.drivetrain.gear_label(),
            throttle: self.drivetrain.throttle,
            brake: self.drivetrain.brake,
            applied_torque: self.drivetrain.applied_torque,
            wheels,
            debug: self.debug_enabled.then(|| self.debug_segments.clone()),
        })
    }
}

#[inline]
fn wheel_basis(state: &BodyState, steer_angle: Real, probe: &ContactProbe) -> GroundBasis {
    let normal = if probe.grounded { probe.normal } else { world_up() };
    ground_basis(&state.position.rotation, steer_angle, normal)
}

/// Applies `force` (N) under the vehicle's force convention.
#[inline]
fn apply<B: PhysicsBackend + ?Sized>(
    physics: &mut B,
    body: RigidBodyHandle,
    mode: ForceMode,
    force: Vector<Real>,
    point: Point<Real>,
    dt: Real,
) {
    if force.norm_squared() == 0.0 || !force.iter().all(|c| c.is_finite()) {
        return;
    }
    match mode {
        ForceMode::Impulse => physics.apply_impulse(body, force * dt, point),
        ForceMode::Force => physics.apply_force(body, force, point),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::PhysicsWorld;

    fn spawn_sedan(world: &mut PhysicsWorld, height: Real) -> Vehicle {
        Vehicle::spawn(world, VehicleConfig::sedan(), Isometry::translation(0.0, height, 0.0)).unwrap()
    }

    #[test]
    fn invalid_config_fails_before_touching_the_world() {
        let mut world = PhysicsWorld::with_flat_ground(Vector::new(0.0, -9.81, 0.0));
        let bodies_before = world.bodies.len();
        let mut config = VehicleConfig::sedan();
        config.wheels.clear();
        let err = Vehicle::spawn(&mut world, config, Isometry::identity()).err();
        assert!(matches!(err, Some(VehicleError::Config(_))));
        assert_eq!(world.bodies.len(), bodies_before);
    }

    #[test]
    fn wheel_mounts_include_center_of_gravity() {
        let mut world = PhysicsWorld::with_flat_ground(Vector::new(0.0, -9.81, 0.0));
        let v = spawn_sedan(&mut world, 1.0);
        let expected_y = -1.23 / 1.3 + 0.55;
        assert!((v.wheels[0].local_mount.y - expected_y).abs() < 1e-4);
        assert!((v.wheels[0].load.max_drive_force - 1400.0 * 9.81 / 4.0).abs() < 1e-2);
    }

    #[test]
    fn removed_body_surfaces_missing_body() {
        let mut world = PhysicsWorld::with_flat_ground(Vector::new(0.0, -9.81, 0.0));
        let mut v = spawn_sedan(&mut world, 1.0);
        world.remove_rigid_body(v.body);
        let mut input = InputState::default();
        assert!(matches!(
            v.step(&mut world, &mut input, 1.0 / 120.0),
            Err(VehicleError::MissingBody(_))
        ));
    }

    #[test]
    fn airborne_vehicle_keeps_even_budgets() {
        let mut world = PhysicsWorld::with_flat_ground(Vector::new(0.0, -9.81, 0.0));
        let mut v = spawn_sedan(&mut world, 20.0);
        let mut input = InputState::default();
        let report = v.step(&mut world, &mut input, 1.0 / 120.0).unwrap();
        assert_eq!(report.grounded_wheels, 0);
        assert_eq!(report.total_suspension_force, 0.0);
        for w in &v.wheels {
            assert!(!w.grounded);
            assert_eq!(w.target, w.probe_free_target(&world, v.body));
            assert!((w.load.max_drive_force - 1400.0 * 9.81 / 4.0).abs() < 1e-2);
            assert_eq!(w.tire_state, TireState::Airborne);
        }
    }

    #[test]
    fn debug_segments_follow_the_toggle() {
        let mut world = PhysicsWorld::with_flat_ground(Vector::new(0.0, -9.81, 0.0));
        let mut v = spawn_sedan(&mut world, 0.6);
        let mut input = InputState::default();

        let report = v.step(&mut world, &mut input, 1.0 / 120.0).unwrap();
        assert!(report.debug_segments.is_empty());

        assert!(v.toggle_debug_visualization());
        let report = v.step(&mut world, &mut input, 1.0 / 120.0).unwrap();
        assert!(report.debug_segments.len() >= v.wheels.len());
        assert!(v.snapshot(&world).unwrap().debug.is_some());

        assert!(!v.toggle_debug_visualization());
        assert!(v.debug_segments().is_empty());
    }

    #[test]
    fn wheel_visibility_toggle_reaches_snapshot() {
        let mut world = PhysicsWorld::with_flat_ground(Vector::new(0.0, -9.81, 0.0));
        let mut v = spawn_sedan(&mut world, 1.0);
        assert!(!v.toggle_wheel_visibility());
        let snap = v.snapshot(&world).unwrap();
        assert!(snap.wheels.iter().all(|w| !w.visible));
        assert_eq!(snap.gear_label, "1st");
    }

    #[test]
    fn steering_input_turns_only_steerable_wheels() {
        let mut world = PhysicsWorld::with_flat_ground(Vector::new(0.0, -9.81, 0.0));
        let mut v = spawn_sedan(&mut world, 0.6);
        let mut input = InputState { left: true, ..Default::default() };
        for _ in 0..5 {
            v.step(&mut world, &mut input, 1.0 / 120.0).unwrap();
            world.step(1.0 / 120.0, 1);
        }
        let step = 1.2_f32.to_radians();
        for w in &v.wheels {
            if w.steerable {
                assert!((w.steer_angle - 5.0 * step).abs() < 1e-4);
            } else {
                assert_eq!(w.steer_angle, 0.0);
            }
        }
    }

    impl Wheel {
        /// Where an airborne probe leaves this wheel: its mount in world space.
        fn probe_free_target(&self, world: &PhysicsWorld, body: RigidBodyHandle) -> Point<Real> {
            world.body_state(body).unwrap().position * self.local_mount
        }
    }
}
