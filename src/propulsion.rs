use serde::{Deserialize, Serialize};

use crate::atmosphere::AirSample;
use crate::params::{AtmosphereParams, StaticAircraftParams, Tuning};
use crate::utils::lerp_clamped;

/// Thrust reaching `throttle`, which runs 0..1 through the military range
/// and 1..2 through the afterburner range. `None` outside 0..2.
pub fn thrust_from_throttle(tl: f64, tmax: f64, tmax_ab: f64) -> Option<f64> {
    if tl < 0.0 {
        None
    } else if tl <= 1.0 {
        Some(tmax * tl)
    } else if tl <= 2.0 {
        Some(tmax + (tmax_ab - tmax) * (tl - 1.0))
    } else {
        None
    }
}

/// Throttle reaching `thrust`, inverse of [`thrust_from_throttle`].
pub fn throttle_from_thrust(t: f64, tmax: f64, tmax_ab: f64) -> Option<f64> {
    if t < 0.0 {
        None
    } else if t <= tmax {
        Some(t / tmax)
    } else if t <= tmax_ab {
        Some(1.0 + (t - tmax) / (tmax_ab - tmax))
    } else {
        None
    }
}

/// Engine model. Static thrust scales with the density ratio; the ram
/// recovery above Mach 0.7 is tuned so the type's stated maximum speeds
/// come out of the drag balance. Fuel consumption follows altitude, Mach
/// and throttle factors off the sea-level figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropulsionModel {
    atmo: AtmosphereParams,
    thrust_mil: f64,
    thrust_ab: f64,
    /// Afterburner ram-gain factor at the tropopause.
    ab_alt_gain: f64,
    sfc_mil: f64,
    sfc_ab: f64,
    /// Afterburner SFC multiplier at maximum Mach.
    sfc_ab_mach_gain: f64,
    /// Correction on the afterburner SFC base.
    sfc_ab_factor: f64,
    has_afterburner: bool,
}

/// Available thrust at one operating point, military and afterburner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaxThrust {
    pub mil: f64,
    pub ab: f64,
}

impl PropulsionModel {
    pub fn new(params: &StaticAircraftParams, tuning: &Tuning) -> Self {
        let sfc_ab_factor = if params.has_afterburner {
            tuning.sfc_ab_alt_factor
        } else {
            1.0
        };
        Self {
            atmo: params.atmosphere,
            thrust_mil: params.thrust_mil,
            thrust_ab: params.thrust_ab,
            ab_alt_gain: params.thrust_ab_alt_gain,
            sfc_mil: params.sfc_mil,
            sfc_ab: params.sfc_ab,
            sfc_ab_mach_gain: params.sfc_ab_mach_gain,
            sfc_ab_factor,
            has_afterburner: params.has_afterburner,
        }
    }

    pub fn sfc_static(&self) -> f64 {
        self.sfc_mil
    }

    /// Static thrust at altitude, scaled by the density ratio.
    pub fn max_thrust_static(&self, air: &AirSample) -> MaxThrust {
        MaxThrust {
            mil: self.thrust_mil * air.density_ratio,
            ab: self.thrust_ab * air.density_ratio,
        }
    }

    /// Available thrust with the ram-recovery gain over Mach, anchored so
    /// the gain peaks at the reference maximum speed for each tier.
    /// Increases slower than v^2 so the drag balance stays bounded.
    pub fn max_thrust(
        &self,
        h: f64,
        air: &AirSample,
        vmax_ref: f64,
        vmax_ab_ref: f64,
        v: f64,
    ) -> MaxThrust {
        let stat = self.max_thrust_static(air);
        let rh = h / self.atmo.h_tropo;
        let rhs = self.atmo.h_strato / self.atmo.h_tropo;
        let ma = v / air.speed_of_sound;
        let ma1 = 0.7;

        let ma_max = (vmax_ref / air.speed_of_sound).max(1.2);
        let gain = lerp_clamped(rh, 1.0, rhs, 1.2, 0.9);
        let mil_top = stat.mil * (1.0 + gain * (ma_max - ma1));
        let mil = lerp_clamped(ma, ma1, ma_max, stat.mil, mil_top);

        let ma_max_ab = (vmax_ab_ref / air.speed_of_sound).max(2.0);
        let gain_ab = lerp_clamped(rh, 1.0, rhs, self.ab_alt_gain, 1.2);
        let ab_top = stat.ab * (1.0 + gain_ab * (ma_max_ab - ma1));
        let ab = lerp_clamped(ma, ma1, ma_max_ab, stat.ab, ab_top);

        MaxThrust { mil, ab }
    }

    /// Specific fuel consumption at an operating point and throttle, and
    /// its ratio to the sea-level military figure. SFC dips toward the
    /// tropopause, grows with Mach, and blends to the afterburner figure
    /// over throttle 1..2.
    pub fn sfc(
        &self,
        h: f64,
        air: &AirSample,
        vmax_ref: f64,
        vmax_ab_ref: f64,
        v: f64,
        tl: f64,
    ) -> (f64, f64) {
        let rh = h / self.atmo.h_tropo;
        let rhs = self.atmo.h_strato / self.atmo.h_tropo;
        let ma = v / air.speed_of_sound;
        let ma_max = (vmax_ref / air.speed_of_sound).max(1.2);
        let ma_max_ab = (vmax_ab_ref / air.speed_of_sound).max(2.0);

        let f_alt = if rh < 1.0 {
            lerp_clamped(rh, 0.0, 1.0, 1.0, 0.85)
        } else {
            lerp_clamped(rh, 1.0, rhs, 0.85, 1.0)
        };
        let f_mach = lerp_clamped(ma, 0.0, ma_max, 1.0, 1.6);

        let f_alt_ab = if rh < 1.0 {
            1.0
        } else {
            lerp_clamped(rh, 1.0, rhs, 1.0, 1.05)
        };
        let f_mach_ab = lerp_clamped(ma, 0.0, ma_max_ab, 1.0, self.sfc_ab_mach_gain);

        let sfc_mil = self.sfc_mil * f_alt * f_mach;
        let sfc_ab = self.sfc_ab * f_alt_ab * f_mach_ab * self.sfc_ab_factor;

        let sfc = lerp_clamped(tl, 1.0, 2.0, sfc_mil, sfc_ab);
        (sfc, sfc / self.sfc_mil)
    }

    /// Longitudinal acceleration headroom at thrust `t` against the
    /// available `tmax`, along the path at alpha `a`.
    pub fn max_accel(&self, tmax: f64, mass: f64, a: f64, t: f64) -> f64 {
        ((tmax - t) / mass) * a.cos()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atmosphere::AtmosphereModel;
    use crate::params::StaticAircraftParams;
    use approx::assert_relative_eq;

    fn setup() -> (StaticAircraftParams, AtmosphereModel, PropulsionModel) {
        let params =
            StaticAircraftParams::from_yaml_str(crate::params::tests::TEST_YAML).unwrap();
        let atmo = AtmosphereModel::new(params.atmosphere);
        let prop = PropulsionModel::new(&params, &Tuning::default());
        (params, atmo, prop)
    }

    #[test]
    fn test_throttle_thrust_round_trip() {
        let (tmax, tmax_ab) = (100e3, 160e3);
        for tl in [0.0, 0.3, 1.0, 1.5, 2.0] {
            let t = thrust_from_throttle(tl, tmax, tmax_ab).unwrap();
            assert_relative_eq!(
                throttle_from_thrust(t, tmax, tmax_ab).unwrap(),
                tl,
                epsilon = 1e-12
            );
        }
        assert!(thrust_from_throttle(-0.1, tmax, tmax_ab).is_none());
        assert!(thrust_from_throttle(2.1, tmax, tmax_ab).is_none());
        assert!(throttle_from_thrust(170e3, tmax, tmax_ab).is_none());
    }

    #[test]
    fn test_static_thrust_scales_with_density() {
        let (params, atmo, prop) = setup();
        let sl = prop.max_thrust_static(&atmo.sample(0.0));
        assert_relative_eq!(sl.mil, params.thrust_mil);
        assert_relative_eq!(sl.ab, params.thrust_ab);
        let hi = prop.max_thrust_static(&atmo.sample(11000.0));
        assert!(hi.mil < sl.mil);
        assert_relative_eq!(hi.mil / sl.mil, atmo.sample(11000.0).density_ratio);
    }

    #[test]
    fn test_ram_gain_monotonic_below_vmax() {
        let (params, atmo, prop) = setup();
        let air = atmo.sample(0.0);
        let mut prev = 0.0;
        for v in (1..=8).map(|i| i as f64 * 50.0) {
            let t = prop.max_thrust(0.0, &air, params.vmax_mil_sl, params.vmax_ab_sl, v);
            assert!(t.ab >= t.mil);
            assert!(t.ab >= prev);
            prev = t.ab;
        }
        // Flat at and above the tier's maximum Mach.
        let ma_max_ab = (params.vmax_ab_sl / air.speed_of_sound).max(2.0);
        let at = prop.max_thrust(
            0.0,
            &air,
            params.vmax_mil_sl,
            params.vmax_ab_sl,
            ma_max_ab * air.speed_of_sound,
        );
        let past = prop.max_thrust(
            0.0,
            &air,
            params.vmax_mil_sl,
            params.vmax_ab_sl,
            (ma_max_ab + 0.4) * air.speed_of_sound,
        );
        assert_relative_eq!(at.ab, past.ab);
    }

    #[test]
    fn test_sfc_blends_over_throttle() {
        let (params, atmo, prop) = setup();
        let air = atmo.sample(0.0);
        let (sfc_mil, f_mil) =
            prop.sfc(0.0, &air, params.vmax_mil_sl, params.vmax_ab_sl, 0.0, 1.0);
        assert_relative_eq!(sfc_mil, params.sfc_mil);
        assert_relative_eq!(f_mil, 1.0);
        let (sfc_ab, _) = prop.sfc(0.0, &air, params.vmax_mil_sl, params.vmax_ab_sl, 0.0, 2.0);
        assert_relative_eq!(
            sfc_ab,
            params.sfc_ab * Tuning::default().sfc_ab_alt_factor
        );
        let (sfc_mid, _) =
            prop.sfc(0.0, &air, params.vmax_mil_sl, params.vmax_ab_sl, 0.0, 1.5);
        assert_relative_eq!(sfc_mid, 0.5 * (sfc_mil + sfc_ab));
    }

    #[test]
    fn test_sfc_dips_at_tropopause() {
        let (params, atmo, prop) = setup();
        let h = params.atmosphere.h_tropo;
        let air = atmo.sample(h);
        let (sfc_t, _) = prop.sfc(h, &air, params.vmax_mil_tropo, params.vmax_ab_tropo, 0.0, 1.0);
        assert_relative_eq!(sfc_t, params.sfc_mil * 0.85);
    }
}
