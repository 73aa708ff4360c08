use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::utils::DynamicsError;

/// Rolling and braking friction plus a roughness class for a ground surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroundSurface {
    Runway,
    Dirt,
    Grass,
    Ice,
    Water,
}

impl GroundSurface {
    /// (rolling friction, braking friction, roughness height [m]).
    pub fn friction(self) -> (f64, f64, f64) {
        match self {
            GroundSurface::Runway => (0.030, 0.400, 1.0),
            GroundSurface::Dirt => (0.050, 0.300, 4.0),
            GroundSurface::Grass => (0.060, 0.200, 4.0),
            GroundSurface::Ice => (0.030, 0.100, 2.0),
            GroundSurface::Water => (0.0, 0.0, 0.0),
        }
    }
}

/// Flap detent positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FlapsSetting {
    #[default]
    Retracted,
    Landing,
    Takeoff,
}

/// Shift of the alpha band and added drag for one flap detent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlapDetent {
    /// Shift of the zero-lift angle [rad], negative for lift-increasing flaps.
    pub d_alpha0: f64,
    /// Shift of the stall and knee angles [rad].
    pub d_alpha_stall: f64,
    /// Added zero-lift drag area as a ratio of the cruise drag area.
    pub drag_ratio: f64,
}

/// Landing gear contact points in the body frame, x right, y forward, z up.
/// The main gear pair is symmetric over the yz-plane; only the right point
/// is given.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GearGeometry {
    /// Nose gear contact, y-coordinate [m].
    pub nose_y: f64,
    /// Nose gear contact, z-coordinate [m].
    pub nose_z: f64,
    /// Right main gear contact, x-coordinate [m], positive.
    pub main_x: f64,
    /// Right main gear contact, y-coordinate [m].
    pub main_y: f64,
    /// Right main gear contact, z-coordinate [m].
    pub main_z: f64,
}

/// Atmosphere constants. Exponential density and pressure profiles with a
/// linear speed-of-sound drop to the tropopause.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AtmosphereParams {
    /// Gravitational acceleration [m/s^2].
    pub g0: f64,
    /// Tropopause height [m].
    pub h_tropo: f64,
    /// Stratopause height [m].
    pub h_strato: f64,
    /// Ratio of specific heats.
    pub gamma: f64,
    /// Sea-level density [kg/m^3].
    pub rho0: f64,
    /// Density exponential factor [1/m].
    pub rho_exp: f64,
    /// Sea-level pressure [Pa].
    pub p0: f64,
    /// Pressure exponential factor [1/m].
    pub p_exp: f64,
    /// Sea-level speed of sound [m/s].
    pub sound0: f64,
    /// Ratio of the tropopause speed of sound to the sea-level value.
    pub sound_tropo_ratio: f64,
}

impl Default for AtmosphereParams {
    fn default() -> Self {
        Self {
            g0: 9.81,
            h_tropo: 11000.0,
            h_strato: 20000.0,
            gamma: 1.4,
            rho0: 1.225,
            rho_exp: -1.10e-4,
            p0: 1.013e5,
            p_exp: -1.35e-4,
            sound0: 340.0,
            sound_tropo_ratio: 0.868,
        }
    }
}

/// Static description of one aircraft type. All angles in radians, all other
/// quantities SI. Performance figures are given at two reference altitudes,
/// sea level (`_sl`) and the tropopause (`_tropo`); everything in between is
/// derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticAircraftParams {
    pub name: String,

    #[serde(default)]
    pub atmosphere: AtmosphereParams,

    /// Empty mass [kg].
    pub mass_min: f64,
    /// Maximum takeoff mass [kg].
    pub mass_max: f64,
    /// Reference mass for load and rate limits [kg].
    pub mass_ref: f64,
    /// Maximum load factor at reference mass.
    pub nmax_ref: f64,

    /// Wing area [m^2].
    pub wing_area: f64,
    /// Wing aspect ratio.
    pub aspect_ratio: f64,
    /// Oswald span efficiency.
    pub oswald: f64,
    /// Zero-lift angle of attack [rad].
    pub alpha0: f64,
    /// Stall angle of attack [rad].
    pub alpha_stall: f64,

    /// Maximum military thrust at sea level [N].
    pub thrust_mil: f64,
    /// Maximum afterburner thrust at sea level [N].
    pub thrust_ab: f64,
    /// Afterburner thrust gain factor with altitude.
    pub thrust_ab_alt_gain: f64,

    /// Maximum level speed at sea level, military thrust [m/s].
    pub vmax_mil_sl: f64,
    /// Maximum level speed at sea level, full afterburner [m/s].
    pub vmax_ab_sl: f64,
    /// Maximum climb rate at sea level [m/s].
    pub climb_max_sl: f64,
    /// Best climb speed at sea level [m/s].
    pub v_opt_climb_sl: f64,
    /// Maximum level speed at the tropopause, military thrust [m/s].
    pub vmax_mil_tropo: f64,
    /// Maximum level speed at the tropopause, full afterburner [m/s].
    pub vmax_ab_tropo: f64,

    /// Maximum pitch rate at sea level [rad/s].
    pub pitch_rate_max: f64,
    /// Maximum roll rate at sea level [rad/s].
    pub roll_rate_max: f64,

    /// Maximum fuel mass [kg].
    pub fuel_max: f64,
    /// Military specific fuel consumption at sea level [kg/N/s].
    pub sfc_mil: f64,
    /// Afterburner specific fuel consumption at sea level [kg/N/s].
    pub sfc_ab: f64,
    /// Afterburner SFC gain factor with Mach.
    pub sfc_ab_mach_gain: f64,

    /// Airbrake drag area as a ratio of the cruise drag area.
    pub airbrake_drag_ratio: f64,

    /// Landing flap detent.
    pub flaps_landing: FlapDetent,
    /// Takeoff flap detent.
    pub flaps_takeoff: FlapDetent,

    pub gear: GearGeometry,
    /// Wheel braking drag as a ratio of braking friction.
    pub gear_brake_friction_ratio: f64,
    /// Extended gear drag area as a ratio of the cruise drag area.
    pub gear_drag_ratio: f64,

    /// False when the type has no afterburner; the afterburner fields then
    /// mirror the military ones and throttle is capped at 1.
    pub has_afterburner: bool,
}

/// On-file form of the parameters. Angles in degrees, afterburner section
/// optional.
#[derive(Debug, Deserialize)]
struct RawAircraftParams {
    name: String,
    #[serde(default)]
    atmosphere: AtmosphereParams,
    mass_min: f64,
    mass_max: f64,
    mass_ref: f64,
    nmax_ref: f64,
    wing_area: f64,
    aspect_ratio: f64,
    oswald: f64,
    alpha0_deg: f64,
    alpha_stall_deg: f64,
    thrust_mil: f64,
    thrust_ab: Option<f64>,
    thrust_ab_alt_gain: Option<f64>,
    vmax_mil_sl: f64,
    vmax_ab_sl: Option<f64>,
    climb_max_sl: f64,
    v_opt_climb_sl: f64,
    vmax_mil_tropo: f64,
    vmax_ab_tropo: Option<f64>,
    pitch_rate_max_deg: f64,
    roll_rate_max_deg: f64,
    fuel_max: f64,
    sfc_mil: f64,
    sfc_ab: Option<f64>,
    sfc_ab_mach_gain: Option<f64>,
    airbrake_drag_ratio: f64,
    flaps_landing: RawFlapDetent,
    flaps_takeoff: RawFlapDetent,
    gear: GearGeometry,
    gear_brake_friction_ratio: f64,
    gear_drag_ratio: f64,
}

#[derive(Debug, Deserialize)]
struct RawFlapDetent {
    d_alpha0_deg: f64,
    d_alpha_stall_deg: f64,
    drag_ratio: f64,
}

impl RawFlapDetent {
    fn to_radians(&self) -> FlapDetent {
        FlapDetent {
            d_alpha0: self.d_alpha0_deg.to_radians(),
            d_alpha_stall: self.d_alpha_stall_deg.to_radians(),
            drag_ratio: self.drag_ratio,
        }
    }
}

impl StaticAircraftParams {
    /// Loads parameters from a YAML aircraft definition file.
    pub fn from_yaml_file(path: &Path) -> Result<Self, DynamicsError> {
        let text = fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, DynamicsError> {
        let raw: RawAircraftParams = serde_yaml::from_str(text)?;
        let params = Self::from_raw(raw);
        params.validate()?;
        Ok(params)
    }

    fn from_raw(raw: RawAircraftParams) -> Self {
        let has_afterburner = raw.thrust_ab.is_some();
        Self {
            name: raw.name,
            atmosphere: raw.atmosphere,
            mass_min: raw.mass_min,
            mass_max: raw.mass_max,
            mass_ref: raw.mass_ref,
            nmax_ref: raw.nmax_ref,
            wing_area: raw.wing_area,
            aspect_ratio: raw.aspect_ratio,
            oswald: raw.oswald,
            alpha0: raw.alpha0_deg.to_radians(),
            alpha_stall: raw.alpha_stall_deg.to_radians(),
            thrust_mil: raw.thrust_mil,
            thrust_ab: raw.thrust_ab.unwrap_or(raw.thrust_mil),
            thrust_ab_alt_gain: raw.thrust_ab_alt_gain.unwrap_or(1.0),
            vmax_mil_sl: raw.vmax_mil_sl,
            vmax_ab_sl: raw.vmax_ab_sl.unwrap_or(raw.vmax_mil_sl),
            climb_max_sl: raw.climb_max_sl,
            v_opt_climb_sl: raw.v_opt_climb_sl,
            vmax_mil_tropo: raw.vmax_mil_tropo,
            vmax_ab_tropo: raw.vmax_ab_tropo.unwrap_or(raw.vmax_mil_tropo),
            pitch_rate_max: raw.pitch_rate_max_deg.to_radians(),
            roll_rate_max: raw.roll_rate_max_deg.to_radians(),
            fuel_max: raw.fuel_max,
            sfc_mil: raw.sfc_mil,
            sfc_ab: raw.sfc_ab.unwrap_or(raw.sfc_mil),
            sfc_ab_mach_gain: raw.sfc_ab_mach_gain.unwrap_or(1.0),
            airbrake_drag_ratio: raw.airbrake_drag_ratio,
            flaps_landing: raw.flaps_landing.to_radians(),
            flaps_takeoff: raw.flaps_takeoff.to_radians(),
            gear: raw.gear,
            gear_brake_friction_ratio: raw.gear_brake_friction_ratio,
            gear_drag_ratio: raw.gear_drag_ratio,
            has_afterburner,
        }
    }

    /// Structural checks before any derivation runs. Physical consistency
    /// (e.g. achievable climb figures) is checked by the deriver itself.
    pub fn validate(&self) -> Result<(), DynamicsError> {
        let fail = |msg: String| Err(DynamicsError::InvalidConfig(msg));
        if !(self.mass_min > 0.0 && self.mass_min < self.mass_max) {
            return fail(format!(
                "mass range must satisfy 0 < mass_min < mass_max \
                 (got {} .. {})",
                self.mass_min, self.mass_max
            ));
        }
        if !(self.mass_min <= self.mass_ref && self.mass_ref <= self.mass_max) {
            return fail(format!(
                "mass_ref {} outside mass range {} .. {}",
                self.mass_ref, self.mass_min, self.mass_max
            ));
        }
        if !(self.wing_area > 0.0 && self.aspect_ratio > 0.0) {
            return fail("wing_area and aspect_ratio must be positive".into());
        }
        if !(0.0 < self.oswald && self.oswald <= 1.0) {
            return fail(format!("oswald factor {} outside (0, 1]", self.oswald));
        }
        if !(self.alpha0 < self.alpha_stall) {
            return fail("alpha0 must be below alpha_stall".into());
        }
        if !(self.thrust_mil > 0.0 && self.thrust_ab >= self.thrust_mil) {
            return fail("thrust_ab must be at least thrust_mil".into());
        }
        if !(self.vmax_mil_sl > 0.0 && self.vmax_ab_sl >= self.vmax_mil_sl) {
            return fail("vmax_ab_sl must be at least vmax_mil_sl".into());
        }
        if !(self.vmax_ab_tropo >= self.vmax_mil_tropo) {
            return fail("vmax_ab_tropo must be at least vmax_mil_tropo".into());
        }
        if !(self.v_opt_climb_sl < self.vmax_mil_sl) {
            return fail("v_opt_climb_sl must be below vmax_mil_sl".into());
        }
        if !(self.sfc_mil > 0.0 && self.sfc_ab >= self.sfc_mil) {
            return fail("sfc_ab must be at least sfc_mil".into());
        }
        if !(self.fuel_max > 0.0 && self.fuel_max < self.mass_max - self.mass_min) {
            return fail("fuel_max must fit between mass_min and mass_max".into());
        }
        if !(self.gear.main_x > 0.0) {
            return fail("right main gear contact must have positive x".into());
        }
        if !(self.gear.nose_y > self.gear.main_y) {
            return fail("nose gear contact must be forward of the main gear".into());
        }
        Ok(())
    }

    /// Flap band shift and drag ratio for a detent.
    pub fn flap_detent(&self, flaps: FlapsSetting) -> FlapDetent {
        match flaps {
            FlapsSetting::Retracted => FlapDetent {
                d_alpha0: 0.0,
                d_alpha_stall: 0.0,
                drag_ratio: 0.0,
            },
            FlapsSetting::Landing => self.flaps_landing,
            FlapsSetting::Takeoff => self.flaps_takeoff,
        }
    }

    /// Upper throttle bound, 2 with afterburner, 1 without.
    pub fn throttle_max(&self) -> f64 {
        if self.has_afterburner {
            2.0
        } else {
            1.0
        }
    }
}

/// Tuning constants threaded through derivation. Part of the cache key, so
/// any change forces a recompute.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tuning {
    /// Correction on the afterburner SFC base at altitude.
    pub sfc_ab_alt_factor: f64,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            sfc_ab_alt_factor: 0.5,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const TEST_YAML: &str = r#"
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

    #[test]
    fn test_load_full_definition() {
        let params = StaticAircraftParams::from_yaml_str(TEST_YAML).unwrap();
        assert!(params.has_afterburner);
        assert_eq!(params.throttle_max(), 2.0);
        assert!((params.alpha_stall - 28.0_f64.to_radians()).abs() < 1e-12);
        assert_eq!(params.atmosphere.h_tropo, 11000.0);
    }

    #[test]
    fn test_afterburner_folding() {
        let trimmed = TEST_YAML
            .lines()
            .filter(|l| {
                !l.starts_with("thrust_ab")
                    && !l.starts_with("vmax_ab")
                    && !l.starts_with("sfc_ab")
            })
            .collect::<Vec<_>>()
            .join("\n");
        let params = StaticAircraftParams::from_yaml_str(&trimmed).unwrap();
        assert!(!params.has_afterburner);
        assert_eq!(params.thrust_ab, params.thrust_mil);
        assert_eq!(params.vmax_ab_tropo, params.vmax_mil_tropo);
        assert_eq!(params.sfc_ab, params.sfc_mil);
        assert_eq!(params.throttle_max(), 1.0);
    }

    #[test]
    fn test_invalid_mass_range_rejected() {
        let bad = TEST_YAML.replace("mass_max: 20000.0", "mass_max: 9000.0");
        let err = StaticAircraftParams::from_yaml_str(&bad).unwrap_err();
        assert!(matches!(err, DynamicsError::InvalidConfig(_)));
    }
}
