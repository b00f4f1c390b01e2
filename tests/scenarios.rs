// End-to-end driving scenarios against the rapier3d-backed world.

use rapier3d::prelude::{Isometry, Real, Vector};

use vehicle_server::config::{ForceMode, VehicleConfig};
use vehicle_server::input::InputState;
use vehicle_server::physics::{PhysicsBackend, PhysicsWorld};
use vehicle_server::suspension_contact::probe_ground;
use vehicle_server::vehicle::{StepReport, Vehicle};

const DT: Real = 1.0 / 120.0;
const EQUILIBRIUM_COM_HEIGHT: Real = 0.583;

struct Rig {
    world: PhysicsWorld,
    vehicle: Vehicle,
    input: InputState,
}

impl Rig {
    fn new(config: VehicleConfig, height: Real) -> Self {
        let mut world = PhysicsWorld::with_flat_ground(Vector::new(0.0, -config.gravity, 0.0));
        let vehicle = Vehicle::spawn(&mut world, config, Isometry::translation(0.0, height, 0.0)).unwrap();
        Self {
            world,
            vehicle,
            input: InputState::default(),
        }
    }

    fn sedan() -> Self {
        Self::new(VehicleConfig::sedan(), 0.6)
    }

    fn tick(&mut self) -> StepReport {
        let report = self.vehicle.step(&mut self.world, &mut self.input, DT).unwrap();
        self.world.step(DT, 1);
        report
    }

    fn run(&mut self, seconds: Real) {
        for _ in 0..(seconds / DT).round() as usize {
            self.tick();
        }
    }

    fn forward_speed(&self) -> Real {
        let state = self.world.body_state(self.vehicle.body).unwrap();
        let forward = state.position.rotation * Vector::z();
        state.linvel.dot(&forward)
    }

    fn com_height(&self) -> Real {
        self.world.body_state(self.vehicle.body).unwrap().com.y
    }

    /// Peak-to-peak center-of-mass height over the next `seconds`.
    fn bounce(&mut self, seconds: Real) -> Real {
        let (mut lo, mut hi) = (Real::MAX, Real::MIN);
        for _ in 0..(seconds / DT).round() as usize {
            self.tick();
            let h = self.com_height();
            lo = lo.min(h);
            hi = hi.max(h);
        }
        hi - lo
    }
}

#[test]
fn settles_at_spring_equilibrium() {
    let mut rig = Rig::new(VehicleConfig::sedan(), EQUILIBRIUM_COM_HEIGHT + 0.3);
    let early = rig.bounce(1.0);
    rig.run(3.5);
    let late = rig.bounce(0.5);

    assert!(late < 1e-3, "still bouncing by {late} m");
    assert!(late < early);
    assert!((rig.com_height() - EQUILIBRIUM_COM_HEIGHT).abs() < 0.03, "h = {}", rig.com_height());
    assert!(rig.vehicle.wheels.iter().all(|w| w.grounded));
}

#[test]
fn settles_in_force_mode_too() {
    let mut config = VehicleConfig::sedan();
    config.force_mode = ForceMode::Force;
    let mut rig = Rig::new(config, EQUILIBRIUM_COM_HEIGHT + 0.3);
    rig.run(4.5);

    let late = rig.bounce(0.5);
    assert!(late < 1e-3, "still bouncing by {late} m");
    assert!((rig.com_height() - EQUILIBRIUM_COM_HEIGHT).abs() < 0.03, "h = {}", rig.com_height());
}

#[test]
fn suspension_carries_the_car_weight_at_rest() {
    let mut rig = Rig::sedan();
    rig.run(3.0);
    let report = rig.tick();
    let weight = 1400.0 * 9.81;
    assert_eq!(report.grounded_wheels, 4);
    assert!((report.total_suspension_force - weight).abs() < 0.05 * weight);

    let budget: Real = rig.vehicle.wheels.iter().map(|w| w.load.max_drive_force).sum();
    assert!((budget - weight).abs() < 1.0);
}

#[test]
fn zero_input_applies_no_drive() {
    let mut rig = Rig::sedan();
    rig.run(3.0);
    for _ in 0..60 {
        let report = rig.tick();
        assert_eq!(report.applied_torque, 0.0);
        assert_eq!(report.rpm, 1000.0);
        // only rolling resistance is left at the contact patch
        for w in &rig.vehicle.wheels {
            let rolling_cap = rig.vehicle.config.tires.rolling_resistance * w.load.max_drive_force;
            assert!(w.drive_force.abs() <= rolling_cap + 1e-3, "{} > {}", w.drive_force, rolling_cap);
        }
    }
    assert!(rig.forward_speed().abs() < 0.05);
}

#[test]
fn straight_line_acceleration() {
    let mut rig = Rig::sedan();
    rig.run(3.0);

    rig.input.accelerate = true;
    let mut speeds = vec![rig.forward_speed()];
    let mut rpms = Vec::new();
    for _ in 0..240 {
        let report = rig.tick();
        speeds.push(rig.forward_speed());
        rpms.push(report.rpm);
    }

    for pair in speeds.windows(2) {
        assert!(pair[1] > pair[0], "{} -> {}", pair[0], pair[1]);
    }
    assert!(*speeds.last().unwrap() > 3.0, "v = {}", speeds.last().unwrap());

    // rises until the limiter
    for pair in rpms.windows(2) {
        if pair[0] >= 7000.0 {
            break;
        }
        assert!(pair[1] >= pair[0], "rpm {} -> {}", pair[0], pair[1]);
    }
    assert!(*rpms.last().unwrap() > 1000.0);

    // the car stays on its line
    let x = rig.world.body_state(rig.vehicle.body).unwrap().position.translation.x;
    assert!(x.abs() < 0.2, "drifted sideways to {x}");
}

#[test]
fn braking_stops_without_reversing() {
    let mut rig = Rig::sedan();
    rig.run(2.0);
    rig.input.accelerate = true;
    rig.run(2.0);
    assert!(rig.forward_speed() > 2.0);

    rig.input.accelerate = false;
    rig.input.brake = true;
    let mut slowest = Real::MAX;
    for _ in 0..480 {
        rig.tick();
        slowest = slowest.min(rig.forward_speed());
    }
    assert!(slowest > -0.1, "rolled backwards at {slowest}");
    assert!(rig.forward_speed().abs() < 0.1);
}

#[test]
fn left_steer_turns_toward_positive_x() {
    let mut rig = Rig::sedan();
    rig.run(2.0);
    rig.input.accelerate = true;
    rig.run(1.0);
    rig.input.left = true;
    rig.run(2.0);

    let state = rig.world.body_state(rig.vehicle.body).unwrap();
    assert!(state.position.translation.x > 0.1, "x = {}", state.position.translation.x);
    assert!(state.angvel.y > 0.0);
    let max = 35.0_f32.to_radians();
    assert!((rig.vehicle.wheels[0].steer_angle - max).abs() < 1e-4);
}

#[test]
fn gearbox_clamps_through_the_vehicle() {
    let mut rig = Rig::sedan();
    for _ in 0..20 {
        rig.input.shift_up = true;
        rig.tick();
        assert!(!rig.input.shift_up);
    }
    assert_eq!(rig.vehicle.drivetrain.gear, rig.vehicle.drivetrain.gear_count() - 1);

    for _ in 0..20 {
        rig.input.shift_down = true;
        rig.tick();
    }
    assert_eq!(rig.vehicle.drivetrain.gear, 0);
    assert_eq!(rig.vehicle.drivetrain.gear_label(), "Reverse");
}

#[test]
fn wheel_targets_stay_within_travel() {
    let mut rig = Rig::new(VehicleConfig::sedan(), 1.5);
    let mut saw_airborne = false;
    let mut saw_grounded = false;

    for _ in 0..360 {
        // the vehicle casts against the world as it stands before the step
        let before = rig.world.body_state(rig.vehicle.body).unwrap();
        let contacts: Vec<_> = rig
            .vehicle
            .wheels
            .iter()
            .map(|w| probe_ground(&rig.world, &before.position, w.local_mount, w.radius, Some(rig.vehicle.body)))
            .collect();
        rig.tick();

        for (w, contact) in rig.vehicle.wheels.iter().zip(&contacts) {
            let mount = before.position * w.local_mount;
            assert_eq!(contact.grounded, w.grounded);
            if w.grounded {
                saw_grounded = true;
                // target sits one radius short of the hit, and the hit is within 2r
                let depth = contact.target_depth();
                assert!(depth >= -w.radius - 1e-4 && depth <= w.radius + 1e-4, "depth {depth}");
                assert!((contact.target - w.target).norm() < 1e-5);
            } else {
                saw_airborne = true;
                assert!((w.target - mount).norm() < 1e-5);
                assert_eq!(w.suspension_force, 0.0);
            }
        }
    }
    assert!(saw_airborne && saw_grounded);
}

#[test]
fn braking_through_a_turn_stays_inside_the_traction_budget() {
    let mut rig = Rig::sedan();
    rig.run(2.0);
    rig.input.accelerate = true;
    rig.run(3.0);
    assert!(rig.forward_speed() > 5.0);

    rig.input.accelerate = false;
    rig.input.brake = true;
    rig.input.left = true;
    let mut checked = 0;
    for _ in 0..240 {
        rig.tick();
        for w in rig.vehicle.wheels.iter().filter(|w| w.grounded) {
            let budget = w.load.max_drive_force;
            let used = w.drive_force.abs() + w.lateral_force.abs();
            assert!(used <= budget * (1.0 + 1e-4) + 1e-3, "wheel {}: {used} > {budget}", w.index);
            checked += 1;
        }
    }
    assert!(checked > 0);
}

#[test]
fn despawn_releases_the_body() {
    let mut rig = Rig::sedan();
    let handle = rig.vehicle.body;
    let Rig { mut world, vehicle, .. } = rig;
    assert!(vehicle.despawn(&mut world));
    assert!(world.body_state(handle).is_none());
}
