//! Shared aircraft definition and fixture for the integration tests.

use std::sync::OnceLock;

use skydyn::{AircraftDynamics, StaticAircraftParams, Tuning};

pub const FIGHTER_YAML: &str = r#"
name: mig29
mass_min: 11000.0
mass_max: 20000.0
mass_ref: 14000.0
nmax_ref: 9.0
wing_area: 38.0
aspect_ratio: 3.5
oswald: 0.80
alpha0_deg: -2.0
alpha_stall_deg: 28.0
thrust_mil: 100000.0
thrust_ab: 160000.0
thrust_ab_alt_gain: 1.4
vmax_mil_sl: 320.0
vmax_ab_sl: 430.0
climb_max_sl: 280.0
v_opt_climb_sl: 300.0
vmax_mil_tropo: 310.0
vmax_ab_tropo: 650.0
pitch_rate_max_deg: 60.0
roll_rate_max_deg: 360.0
fuel_max: 3500.0
sfc_mil: 2.222e-5
sfc_ab: 5.556e-5
sfc_ab_mach_gain: 1.1
airbrake_drag_ratio: 2.0
flaps_landing:
  d_alpha0_deg: -10.0
  d_alpha_stall_deg: -5.0
  drag_ratio: 2.0
flaps_takeoff:
  d_alpha0_deg: -5.0
  d_alpha_stall_deg: -2.0
  drag_ratio: 0.5
gear:
  nose_y: 3.0
  nose_z: -1.7
  main_x: 1.5
  main_y: -0.5
  main_z: -1.7
gear_brake_friction_ratio: 20.0
gear_drag_ratio: 1.0
"#;

/// One uncached dynamics instance shared by the tests of a binary.
pub fn fighter() -> &'static AircraftDynamics {
    static DYN: OnceLock<AircraftDynamics> = OnceLock::new();
    DYN.get_or_init(|| {
        let params = StaticAircraftParams::from_yaml_str(FIGHTER_YAML).unwrap();
        AircraftDynamics::new(params, Tuning::default(), None).unwrap()
    })
}
