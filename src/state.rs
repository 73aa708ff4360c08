use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::aero::AlphaBand;
use crate::envelope::RateLimits;
use crate::params::{FlapsSetting, GroundSurface};
use crate::utils::unit_or_zero;

/// Speeds below this are treated as standstill.
pub const MIN_SPEED: f64 = 1e-5;

/// Ground plane under the aircraft: height of the contact plane, its unit
/// normal, and the surface class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroundContact {
    pub height: f64,
    pub normal: Vector3<f64>,
    pub surface: GroundSurface,
}

impl GroundContact {
    pub fn level(height: f64, surface: GroundSurface) -> Self {
        Self {
            height,
            normal: Vector3::z(),
            surface,
        }
    }
}

/// Pilot inputs over one integration step, as increments of the shaped
/// channels. Steering only acts on the ground.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ControlDelta {
    /// Angle-of-attack increment [rad].
    pub d_alpha: f64,
    /// Roll of the lift plane about the path tangent [rad].
    pub d_roll: f64,
    /// Throttle increment.
    pub d_throttle: f64,
    /// Airbrake deployment increment.
    pub d_airbrake: f64,
    /// Ground steering rate increment [rad/s].
    pub d_steer: f64,
}

/// Full kinematic and configuration state of one aircraft. The attitude is
/// carried as the lift-plane normal axis plus the bank angle; body axes are
/// reconstructed from the velocity and the normal axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicState {
    pub pos: Vector3<f64>,
    pub vel: Vector3<f64>,
    pub acc: Vector3<f64>,
    pub ang_vel: Vector3<f64>,
    pub ang_acc: Vector3<f64>,
    pub mass: f64,
    /// Lift-plane normal axis, unit.
    pub lift_axis: Vector3<f64>,
    /// Bank of the lift plane off the path binormal [rad].
    pub bank: f64,
    /// Throttle, 0..1 military, 1..2 afterburner.
    pub throttle: f64,
    /// Airbrake deployment, 0..1.
    pub airbrake: f64,
    pub flaps: FlapsSetting,
    pub gear_down: bool,
    pub wheel_brake: bool,
    pub on_ground: bool,
    /// Pitch alpha forced by the gear geometry when grounded [rad].
    pub ground_alpha: f64,
    /// Ground steering rate [rad/s].
    pub steer_rate: f64,
    /// Pitch of the body over the contact plane [rad].
    pub ground_pitch: f64,
    /// Roll of the body over the contact plane [rad].
    pub ground_roll: f64,
}

impl DynamicState {
    pub fn speed(&self) -> f64 {
        self.vel.norm()
    }

    /// Unit path tangent, zero at standstill.
    pub fn tangent(&self) -> Vector3<f64> {
        unit_or_zero(self.vel)
    }

    /// Unit lift-plane binormal, along tangent x lift axis.
    pub fn binormal(&self) -> Vector3<f64> {
        unit_or_zero(self.tangent().cross(&self.lift_axis))
    }

    /// Angle of attack off the path tangent [rad].
    pub fn alpha(&self) -> f64 {
        self.tangent().dot(&self.lift_axis).clamp(-1.0, 1.0).acos()
            - std::f64::consts::FRAC_PI_2
    }
}

/// Derived flight quantities refreshed by each integration step. Everything
/// a guidance law or an instrument needs without re-deriving the force
/// balance.
#[derive(Debug, Clone, PartialEq)]
pub struct StepAux {
    // Atmosphere at the current altitude.
    pub g: f64,
    pub density: f64,
    pub pressure: f64,
    pub speed_of_sound: f64,

    pub h: f64,
    pub v: f64,
    pub vias: f64,
    pub mach: f64,
    pub q: f64,

    // Path and attitude angles.
    pub climb_rate: f64,
    pub path_pitch: f64,
    pub heading: f64,
    pub pitch: f64,
    pub bank_angle: f64,

    // Force balance at the current alpha.
    pub band: AlphaBand,
    pub alpha: f64,
    pub lift_area: f64,
    pub lift: f64,
    pub drag_area: f64,
    pub drag: f64,
    pub sd0: f64,
    pub thrust: f64,
    pub tmax: f64,
    pub tmax_ab: f64,
    /// Thrust as a fraction of the military maximum.
    pub thrust_level: f64,
    pub sfc: f64,

    // Load and turning.
    pub load: f64,
    pub nmin: f64,
    pub nmax: f64,
    pub turn_radius: f64,
    pub turn_rate: f64,
    pub roll_rate: f64,

    // Alpha freezes: trim alphas at the load bounds and at one g, and the
    // thrust-sustained condition per tier.
    pub alpha_at_nmin: Option<f64>,
    pub alpha_at_nmax: Option<f64>,
    pub alpha_at_1g: Option<f64>,
    pub alpha_sust: Option<f64>,
    pub n_sust: Option<f64>,
    pub alpha_sust_ab: Option<f64>,
    pub n_sust_ab: Option<f64>,
    /// Load at the stall alpha, post-stall model.
    pub n_stall: f64,
    pub n_stall_ab: f64,

    // Input channel bounds and achieved rates.
    pub rates: RateLimits,
    pub throttle_rate_max: f64,
    pub throttle_accel_max: f64,
    pub airbrake_rate_max: f64,
    pub alpha_rate: f64,
    pub roll_input_rate: f64,
    pub throttle_rate: f64,
    /// Path tangent rotation rate in the lift plane [rad/s].
    pub tangent_rate: f64,

    // Frames.
    pub tangent: Vector3<f64>,
    pub binormal: Vector3<f64>,
    /// Path normal in the lift plane (alpha removed).
    pub path_normal: Vector3<f64>,
    /// Body forward axis.
    pub fwd: Vector3<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_alpha_from_axes() {
        let mut s = DynamicState {
            pos: Vector3::zeros(),
            vel: Vector3::new(0.0, 200.0, 0.0),
            acc: Vector3::zeros(),
            ang_vel: Vector3::zeros(),
            ang_acc: Vector3::zeros(),
            mass: 14000.0,
            lift_axis: Vector3::z(),
            bank: std::f64::consts::FRAC_PI_2,
            throttle: 0.5,
            airbrake: 0.0,
            flaps: FlapsSetting::Retracted,
            gear_down: false,
            wheel_brake: false,
            on_ground: false,
            ground_alpha: 0.0,
            steer_rate: 0.0,
            ground_pitch: 0.0,
            ground_roll: 0.0,
        };
        // Lift axis perpendicular to the velocity: zero alpha.
        assert_relative_eq!(s.alpha(), 0.0, epsilon = 1e-12);
        // Tilt the lift axis back by 0.1 rad: positive alpha.
        let a: f64 = 0.1;
        s.lift_axis = Vector3::new(0.0, -a.sin(), a.cos());
        assert_relative_eq!(s.alpha(), a, epsilon = 1e-12);
        // Binormal points along +x for this upright state.
        assert_relative_eq!(s.binormal().x, 1.0, epsilon = 1e-12);
    }
}
