// ==============================================================================
// drivetrain.rs — PEDALS, GEARBOX, ENGINE RPM + TORQUE
// ------------------------------------------------------------------------------
// Per step (before any wheel is touched):
// 1) pedals ramp toward 0/1 at press/release rates, clamped to [0, 1]
// 2) one-shot shift flags move the gear index by one, clamped to the table;
//    the flag is cleared on the step that consumes it
// 3) rpm = avg(ω of powered wheels) · 60/2π · gear · final drive,
//    clamped to [min_rpm, max_rpm] (no powered wheels → average 0)
// 4) applied torque = torque_curve(rpm / max_rpm) · throttle · peak torque
//
// Wheel-side numbers (per powered wheel) are derived on demand:
//   drive torque = applied · gear · final · efficiency / powered count
//   ω limit      = max_rpm · 2π/60 / |gear · final|
// ==============================================================================

use log::debug;
use rapier3d::prelude::Real;

use crate::config::VehicleConfig;
use crate::input::InputState;
use crate::tire::curve::Curve;
use crate::tire::longitudinal::gear_limited_angular_velocity;

const RAD_PER_SEC_TO_RPM: Real = 60.0 / std::f32::consts::TAU;

#[derive(Debug, Clone)]
pub struct Drivetrain {
    pub throttle: Real,       // 0..1
    pub brake: Real,          // 0..1
    pub gear: usize,          // index into gears, 0 = reverse
    pub rpm: Real,
    pub applied_torque: Real, // N·m at the crank

    gears: Vec<Real>,
    final_drive: Real,
    efficiency: Real,
    min_rpm: Real,
    max_rpm: Real,
    peak_torque: Real,
    brake_torque: Real,
    press_rate: Real,
    release_rate: Real,
    torque_curve: Curve,
    powered_wheels: usize,
}

impl Drivetrain {
    /// Expects a validated config.
    pub fn new(config: &VehicleConfig) -> Self {
        let max_gear = config.transmission.gears.len().saturating_sub(1);
        Self {
            throttle: 0.0,
            brake: 0.0,
            gear: config.transmission.initial_gear.min(max_gear),
            rpm: config.engine.min_rpm,
            applied_torque: 0.0,

            gears: config.transmission.gears.clone(),
            final_drive: config.transmission.final_drive,
            efficiency: config.transmission.efficiency,
            min_rpm: config.engine.min_rpm,
            max_rpm: config.engine.max_rpm,
            peak_torque: config.engine.peak_torque,
            brake_torque: config.brakes.torque,
            press_rate: config.pedals.press_rate,
            release_rate: config.pedals.release_rate,
            torque_curve: config.torque_curve(),
            powered_wheels: config.powered_wheel_count(),
        }
    }

    /// Steps 1-4 above. `powered_angular_velocities` are last step's ω values.
    pub fn update(
        &mut self,
        input: &mut InputState,
        powered_angular_velocities: impl IntoIterator<Item = Real>,
        dt: Real,
    ) {
        self.update_pedals(input, dt);
        self.apply_shift(input);
        self.update_engine(powered_angular_velocities);
    }

    pub fn update_pedals(&mut self, input: &InputState, dt: Real) {
        self.throttle = ramp(self.throttle, input.accelerate, self.press_rate, self.release_rate, dt);
        self.brake = ramp(self.brake, input.brake, self.press_rate, self.release_rate, dt);
    }

    /// Consumes the shift flags. Returns the new gear when it changed.
    pub fn apply_shift(&mut self, input: &mut InputState) -> Option<usize> {
        let before = self.gear;
        if std::mem::take(&mut input.shift_up) {
            self.shift_up();
        }
        if std::mem::take(&mut input.shift_down) {
            self.shift_down();
        }
        (self.gear != before).then_some(self.gear)
    }

    pub fn shift_up(&mut self) {
        let top = self.gear_count().saturating_sub(1);
        if self.gear < top {
            self.gear += 1;
            debug!("shift up -> {}", self.gear_label());
        }
    }

    pub fn shift_down(&mut self) {
        if self.gear > 0 {
            self.gear -= 1;
            debug!("shift down -> {}", self.gear_label());
        }
    }

    pub fn update_engine(&mut self, powered_angular_velocities: impl IntoIterator<Item = Real>) {
        let (sum, count) = powered_angular_velocities
            .into_iter()
            .fold((0.0, 0usize), |(s, n), w| (s + w, n + 1));
        let avg = if count == 0 { 0.0 } else { sum / count as Real };

        let rpm = avg * RAD_PER_SEC_TO_RPM * self.overall_ratio();
        self.rpm = if rpm.is_finite() {
            rpm.clamp(self.min_rpm, self.max_rpm)
        } else {
            self.min_rpm
        };

        let normalised = self.torque_curve.evaluate(self.rpm / self.max_rpm);
        self.applied_torque = normalised * self.throttle * self.peak_torque;
    }

    #[inline]
    pub fn gear_ratio(&self) -> Real {
        self.gears.get(self.gear).copied().unwrap_or(0.0)
    }

    /// Gear ratio times final drive (signed, negative in reverse).
    #[inline]
    pub fn overall_ratio(&self) -> Real {
        self.gear_ratio() * self.final_drive
    }

    /// Engine torque delivered to each powered wheel (N·m, signed).
    pub fn wheel_drive_torque(&self) -> Real {
        if self.powered_wheels == 0 {
            return 0.0;
        }
        self.applied_torque * self.overall_ratio() * self.efficiency / self.powered_wheels as Real
    }

    /// Brake torque on each braked wheel (N·m, magnitude).
    #[inline]
    pub fn wheel_brake_torque(&self) -> Real {
        self.brake * self.brake_torque
    }

    pub fn max_wheel_angular_velocity(&self) -> Option<Real> {
        gear_limited_angular_velocity(self.max_rpm, self.overall_ratio())
    }

    pub fn gear_count(&self) -> usize {
        self.gears.len()
    }

    pub fn gear_label(&self) -> String {
        gear_label(self.gear)
    }
}

pub fn gear_label(gear: usize) -> String {
    match gear {
        0 => "Reverse".to_string(),
        1 => "1st".to_string(),
        2 => "2nd".to_string(),
        3 => "3rd".to_string(),
        n => format!("{n}th"),
    }
}

#[inline]
fn ramp(current: Real, pressed: bool, press_rate: Real, release_rate: Real, dt: Real) -> Real {
    let next = if pressed {
        current + press_rate * dt
    } else {
        current - release_rate * dt
    };
    next.clamp(0.0, 1.0)
}
