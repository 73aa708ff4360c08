use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dynamics::ModelSet;
use crate::envelope::grid;
use crate::params::{FlapDetent, FlapsSetting, StaticAircraftParams};
use crate::utils::{hyper_falloff, lerp_clamped, DynamicsError};

/// Reference performance figures resolved at one anchor altitude. Speeds
/// and zero-lift drag areas between the anchors come from linear blends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AltAnchors {
    pub h: f64,
    /// Zero-lift drag area in the cruise regime [m^2].
    pub sd0_cruise: f64,
    /// Zero-lift drag area at the military top speed [m^2].
    pub sd0_top: f64,
    /// Zero-lift drag area at the afterburner top speed [m^2].
    pub sd0_top_ab: f64,
    /// Thrust-limited minimum level speed, military [m/s].
    pub vmin: f64,
    /// Thrust-limited minimum level speed, afterburner [m/s].
    pub vmin_ab: f64,
    pub vmax: f64,
    pub vmax_ab: f64,
    pub v_opt_climb: f64,
    /// Minimum speeds with flaps, `None` when flap drag exceeds the
    /// available thrust at that detent.
    pub vmin_flaps_landing: Option<f64>,
    pub vmin_flaps_landing_ab: Option<f64>,
    pub vmin_flaps_takeoff: Option<f64>,
    pub vmin_flaps_takeoff_ab: Option<f64>,
}

/// Speed thresholds and derating factors for the attitude rate limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RollEnvelope {
    pub v_zero_sl: f64,
    pub v_lin_sl: f64,
    pub v_max_sl: f64,
    pub v_zero_tropo: f64,
    pub v_lin_tropo: f64,
    pub v_max_tropo: f64,
    /// Rate retained at the stall end of the alpha range.
    pub derate_alpha: f64,
    /// Rate retained at maximum mass.
    pub derate_mass: f64,
    /// Maximum pitch angular acceleration at sea level [rad/s^2].
    pub pitch_accel_max: f64,
    /// Maximum roll angular acceleration at sea level [rad/s^2].
    pub roll_accel_max: f64,
}

/// Best cruise range on internal fuel and the altitude it occurs at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeFigure {
    pub distance: f64,
    pub altitude: f64,
}

/// Gear contact geometry reduced for ground handling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GearDerived {
    /// Height of the body origin over the wheel contact plane [m].
    pub wheel_height: f64,
    /// Tangential offset of the vertical-axis point from the contact-plane
    /// foot [m], positive toward the nose gear.
    pub pivot_offset: f64,
}

/// Everything derived from the static parameters ahead of simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedData {
    pub sl: AltAnchors,
    pub tropo: AltAnchors,
    pub roll: RollEnvelope,
    pub range: RangeFigure,
    pub gear: GearDerived,
}

/// Zero-lift drag model at one altitude, blended between the anchors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragSchedule {
    pub v_cruise: f64,
    pub vmax: f64,
    pub vmax_ab: f64,
    pub sd0_cruise: f64,
    pub sd0_top: f64,
    pub sd0_top_ab: f64,
    /// Added drag area at full airbrake [m^2].
    pub d_airbrake: f64,
    /// Added drag area with the gear extended [m^2].
    pub d_gear: f64,
}

impl DragSchedule {
    /// Clean zero-lift drag area at speed `v`: cruise value up to the best
    /// climb speed, a linear rise to the top-speed value, a transonic
    /// plateau, then a square-root rise to the afterburner value.
    pub fn zero_lift_area(&self, v: f64, sound: f64) -> f64 {
        let ma = v / sound;
        let ma2 = (self.vmax / sound + 0.05).max(1.05);
        if v < self.v_cruise {
            self.sd0_cruise
        } else if v < self.vmax {
            self.sd0_cruise
                + (self.sd0_top - self.sd0_cruise) * (v - self.v_cruise)
                    / (self.vmax - self.v_cruise)
        } else if ma < ma2 {
            self.sd0_top
        } else if v < self.vmax_ab {
            let v2 = ma2 * sound;
            let vfac = (v - v2) / (self.vmax_ab - v2);
            self.sd0_top + (self.sd0_top_ab - self.sd0_top) * vfac.sqrt()
        } else {
            self.sd0_top_ab
        }
    }

    /// Added drag area for a flap detent.
    pub fn flap_drag(&self, detent: FlapDetent) -> f64 {
        self.sd0_cruise * detent.drag_ratio
    }
}

/// Attitude rate and angular acceleration bounds at an operating point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimits {
    pub pitch_rate: f64,
    pub roll_rate: f64,
    pub pitch_accel: f64,
    pub roll_accel: f64,
}

/// Drag references at altitude, linear between the sea-level and tropopause
/// anchors, constant above.
pub(crate) fn drag_schedule_at(
    params: &StaticAircraftParams,
    sl: &AltAnchors,
    tropo: &AltAnchors,
    h: f64,
) -> DragSchedule {
    let rh = h / params.atmosphere.h_tropo;
    let ifac = if rh <= 1.0 { 1.0 - rh } else { 0.0 };
    let up = |hv: f64, zv: f64| hv + (zv - hv) * ifac;
    let sd0_cruise = up(tropo.sd0_cruise, sl.sd0_cruise);
    DragSchedule {
        v_cruise: up(tropo.v_opt_climb, sl.v_opt_climb),
        vmax: up(tropo.vmax, sl.vmax),
        vmax_ab: up(tropo.vmax_ab, sl.vmax_ab),
        sd0_cruise,
        sd0_top: up(tropo.sd0_top, sl.sd0_top),
        sd0_top_ab: up(tropo.sd0_top_ab, sl.sd0_top_ab),
        d_airbrake: sd0_cruise * params.airbrake_drag_ratio,
        d_gear: sd0_cruise * params.gear_drag_ratio,
    }
}

impl DerivedData {
    /// Drag references at altitude.
    pub fn drag_schedule(&self, params: &StaticAircraftParams, h: f64) -> DragSchedule {
        drag_schedule_at(params, &self.sl, &self.tropo, h)
    }

    /// Load factor bounds at mass `m`, scaled off the reference mass.
    pub fn load_limits(params: &StaticAircraftParams, m: f64) -> (f64, f64) {
        let nmax = params.nmax_ref * (params.mass_ref / m).sqrt();
        (-0.5 * nmax, nmax)
    }

    /// Minimum level speed with landing flaps and afterburner, used to
    /// schedule the rotation speed on the ground roll. Falls back to the
    /// clean sea-level figure where the flap derivation found no solution.
    pub fn vmin_flapped_ab(&self, params: &StaticAircraftParams, h: f64) -> f64 {
        let ht = params.atmosphere.h_tropo;
        match (
            self.sl.vmin_flaps_landing_ab,
            self.tropo.vmin_flaps_landing_ab,
        ) {
            (Some(vz), Some(vh)) => lerp_clamped(h, 0.0, ht, vz, vh),
            (Some(vz), None) => vz,
            _ => self.sl.vmin,
        }
    }

    /// Attitude rate bounds at an operating point. Rates fall away at low
    /// speed, high mass and high alpha; angular accelerations scale with
    /// density and the same derates. Never zero, so input planning stays
    /// well posed.
    #[allow(clippy::too_many_arguments)]
    pub fn rate_limits(
        &self,
        params: &StaticAircraftParams,
        h: f64,
        density_ratio: f64,
        v: f64,
        m: f64,
        alpha0: f64,
        alpha_min: f64,
        alpha_max: f64,
        a: f64,
    ) -> RateLimits {
        let r = &self.roll;
        let hfac = h / params.atmosphere.h_tropo;
        let v_zero = r.v_zero_sl + (r.v_zero_tropo - r.v_zero_sl) * hfac;
        let v_lin = r.v_lin_sl + (r.v_lin_tropo - r.v_lin_sl) * hfac;
        let v_max = r.v_max_sl + (r.v_max_tropo - r.v_max_sl) * hfac;

        let (mut po, mut ro, mut ps, mut rs);
        if v > v_lin {
            let vfac = v / v_max;
            po = (params.pitch_rate_max * vfac).clamp(0.0, params.pitch_rate_max);
            ro = (params.roll_rate_max * vfac).clamp(0.0, params.roll_rate_max);
            ps = r.pitch_accel_max * density_ratio;
            rs = r.roll_accel_max * density_ratio;
        } else if v > v_zero {
            let lin_fac = v_lin / v_max;
            let vfac = (v - v_zero) / (v_lin - v_zero);
            po = params.pitch_rate_max * lin_fac * vfac;
            ro = params.roll_rate_max * lin_fac * vfac;
            ps = r.pitch_accel_max * density_ratio * vfac.sqrt();
            rs = r.roll_accel_max * density_ratio * vfac.sqrt();
        } else {
            let floor = 1.0_f64.to_radians();
            po = floor;
            ro = floor;
            ps = floor;
            rs = floor;
        }

        let mfac = if m > params.mass_ref {
            hyper_falloff(
                r.derate_mass,
                (m - params.mass_ref) / (params.mass_max - params.mass_ref),
            )
        } else {
            1.0
        };
        let afac = if a > alpha0 {
            hyper_falloff(r.derate_alpha, (a - alpha0) / (alpha_max - alpha0))
        } else {
            hyper_falloff(r.derate_alpha, (a - alpha0) / (alpha_min - alpha0))
        };
        let fac = mfac * afac;
        po *= fac;
        ro *= fac;
        ps *= fac;
        rs *= fac;

        RateLimits {
            pitch_rate: po,
            roll_rate: ro,
            pitch_accel: ps,
            roll_accel: rs,
        }
    }
}

enum ClimbSpec {
    /// Stated climb figures at this altitude.
    Direct { climb_max: f64, v_opt: f64 },
    /// Ratios carried over from the other anchor.
    Ratios { r_v_opt: f64, r_sd0: f64 },
}

const MAX_FIXED_POINT_ITERS: usize = 200;

fn fixed_point_overrun(what: &str, h: f64) -> DynamicsError {
    DynamicsError::InvalidConfig(format!(
        "{} derivation did not converge at h={:.0} m",
        what, h
    ))
}

/// Resolves the drag anchors and minimum speeds at one altitude from the
/// stated top speeds and climb figures.
fn derive_at_alt(
    models: &ModelSet,
    h: f64,
    vmax: f64,
    vmax_ab: f64,
    climb: ClimbSpec,
) -> Result<AltAnchors, DynamicsError> {
    let p = &models.params;
    let aero = &models.aero;
    let prop = &models.propulsion;
    let air = models.atmosphere.sample(h);
    let ks = aero.induced_factor();
    let w = p.mass_ref * air.g;
    let clean = p.flap_detent(FlapsSetting::Retracted);

    // Zero-lift drag area pinned by the level top speed of one tier.
    let derive_at_vmax = |with_ab: bool| -> Result<f64, DynamicsError> {
        let v = if with_ab { vmax_ab } else { vmax };
        let q = 0.5 * air.density * v * v;
        let band = aero.band(v / air.speed_of_sound, clean);
        let thrust = prop.max_thrust(h, &air, vmax, vmax_ab, v);
        let t = if with_ab { thrust.ab } else { thrust.mil };
        let (a, sl) = band.alpha_for_lift(q, t, w, false).ok_or_else(|| {
            DynamicsError::InvalidConfig(format!(
                "no level trim at the stated top speed {:.0} m/s, h={:.0} m",
                v, h
            ))
        })?;
        let ca = 1.0 - 0.5 * a * a;
        let sd0 = (t * ca) / q - ks * sl * sl;
        debug!(
            h,
            v,
            with_ab,
            alpha_deg = a.to_degrees(),
            cd0 = sd0 / aero.wing_area(),
            "top-speed drag anchor"
        );
        Ok(sd0)
    };
    let sd0_top = derive_at_vmax(false)?;
    let sd0_top_ab = derive_at_vmax(true)?;

    // Cruise drag area pinned by the best-climb point, or carried over as
    // a ratio of the top-speed value.
    let sd0_cruise = match climb {
        ClimbSpec::Direct { climb_max, v_opt } => {
            if !(climb_max < v_opt) {
                return Err(DynamicsError::InvalidConfig(format!(
                    "climb rate {:.0} m/s not below climb speed {:.0} m/s",
                    climb_max, v_opt
                )));
            }
            let v = v_opt;
            let q = 0.5 * air.density * v * v;
            let tht = (climb_max / v).asin();
            let band = aero.band(v / air.speed_of_sound, clean);
            let t = prop.max_thrust(h, &air, vmax, vmax_ab, v).ab;
            let (a, sl) =
                band.alpha_for_lift(q, t, w * tht.cos(), false).ok_or_else(|| {
                    DynamicsError::InvalidConfig(format!(
                        "no climb trim at the stated best-climb point, h={:.0} m",
                        h
                    ))
                })?;
            let ca = 1.0 - 0.5 * a * a;
            (t * ca - w * tht.sin()) / q - ks * sl * sl
        }
        ClimbSpec::Ratios { r_sd0, .. } => sd0_top * r_sd0,
    };

    if !(sd0_cruise < sd0_top) {
        return Err(DynamicsError::InvalidConfig(format!(
            "cruise drag area {:.4} not below top-speed drag area {:.4} \
             (climb figures too optimistic for the thrust)",
            sd0_cruise / aero.wing_area(),
            sd0_top / aero.wing_area()
        )));
    }

    // Thrust-limited minimum level speed at one tier and flap setting.
    // A stall-limited speed is found first at the stall-margin alpha, then
    // pushed up while the required thrust exceeds the available thrust.
    // With flaps the push-up may diverge (flap drag beyond the thrust), in
    // which case there is no figure for that detent.
    let derive_at_vmin = |with_ab: bool,
                          flaps: FlapsSetting|
     -> Result<Option<f64>, DynamicsError> {
        let flapped = flaps != FlapsSetting::Retracted;
        let detent = p.flap_detent(flaps);
        let sd0_fl = sd0_cruise + sd0_cruise * detent.drag_ratio;
        let margin = 0.01 * aero.wing_area();

        let mut v: f64 = 0.0;
        let mut a = 0.0;
        let mut q = 0.0;
        let mut sd = 0.0;
        for it in 0.. {
            if it > MAX_FIXED_POINT_ITERS {
                return Err(fixed_point_overrun("minimum speed", h));
            }
            let vp = v;
            let band = aero.band(v / air.speed_of_sound, detent);
            a = band.alpha_max - margin / band.slope_post;
            q = 0.5 * air.density * v * v;
            let sl = match band.lift_area(a) {
                Some(sl) => sl,
                None => return Err(fixed_point_overrun("minimum speed", h)),
            };
            sd = sd0_fl + ks * sl * sl;
            let ta = a / (1.0 - 0.5 * a * a);
            v = (w / (0.5 * air.density * (sl + ta * sd))).sqrt();
            if (v - vp).abs() < 0.001 * vp {
                v = vp;
                break;
            }
        }

        let tier = |t: crate::propulsion::MaxThrust| if with_ab { t.ab } else { t.mil };
        let mut tmax_ref = tier(prop.max_thrust(h, &air, vmax, vmax_ab, v)) * 0.99;
        let ca = 1.0 - 0.5 * a * a;
        let mut t = (q * sd) / ca;
        if t > tmax_ref {
            let mut tp = t;
            for it in 0.. {
                if it > MAX_FIXED_POINT_ITERS {
                    return Err(fixed_point_overrun("minimum speed", h));
                }
                let vp = v;
                v *= (t / tmax_ref).sqrt();
                if t > tp && v > vp {
                    if flapped {
                        debug!(h, with_ab, ?flaps, "no flapped minimum speed");
                        return Ok(None);
                    }
                    return Err(DynamicsError::InvalidConfig(format!(
                        "no thrust-limited minimum speed at h={:.0} m, \
                         with_ab={}",
                        h, with_ab
                    )));
                }
                let band = aero.band(v / air.speed_of_sound, detent);
                q = 0.5 * air.density * v * v;
                tmax_ref = tier(prop.max_thrust(h, &air, vmax, vmax_ab, v)) * 0.99;
                let trim = band.alpha_for_lift(q, tmax_ref, w, false);
                let (an, sl) = match trim {
                    Some(r) => r,
                    None if flapped => return Ok(None),
                    None => {
                        return Err(fixed_point_overrun("minimum speed", h));
                    }
                };
                a = an;
                sd = sd0_fl + ks * sl * sl;
                let ca = 1.0 - 0.5 * a * a;
                tp = t;
                t = (q * sd) / ca;
                if (t - tmax_ref).abs() < 0.001 * tmax_ref {
                    break;
                }
            }
        }
        debug!(
            h,
            with_ab,
            ?flaps,
            v,
            alpha_deg = a.to_degrees(),
            "minimum speed"
        );
        Ok(Some(v))
    };

    let require = |v: Option<f64>| {
        v.ok_or_else(|| fixed_point_overrun("minimum speed", h))
    };
    let vmin = require(derive_at_vmin(false, FlapsSetting::Retracted)?)?;
    let vmin_ab = require(derive_at_vmin(true, FlapsSetting::Retracted)?)?;
    let vmin_flaps_landing = derive_at_vmin(false, FlapsSetting::Landing)?;
    let vmin_flaps_landing_ab = derive_at_vmin(true, FlapsSetting::Landing)?;
    let vmin_flaps_takeoff = derive_at_vmin(false, FlapsSetting::Takeoff)?;
    let vmin_flaps_takeoff_ab = derive_at_vmin(true, FlapsSetting::Takeoff)?;

    let v_opt_climb = match climb {
        ClimbSpec::Direct { v_opt, .. } => v_opt,
        ClimbSpec::Ratios { r_v_opt, .. } => vmin + r_v_opt * (vmax - vmin),
    };

    Ok(AltAnchors {
        h,
        sd0_cruise,
        sd0_top,
        sd0_top_ab,
        vmin,
        vmin_ab,
        vmax,
        vmax_ab,
        v_opt_climb,
        vmin_flaps_landing,
        vmin_flaps_landing_ab,
        vmin_flaps_takeoff,
        vmin_flaps_takeoff_ab,
    })
}

/// Best cruise range on internal fuel, scanned over altitude. Fuel burn is
/// split into five segments by mass, each flown at its best range factor;
/// the scan stops at the first altitude where level flight fails.
fn derive_at_range(
    models: &ModelSet,
    sl: &AltAnchors,
    tropo: &AltAnchors,
) -> Result<RangeFigure, DynamicsError> {
    let p = &models.params;
    let g = models.atmosphere.params().g0;
    let m_base = p.mass_min + (p.mass_max - p.mass_min) * 0.05;
    let m1 = m_base + p.fuel_max;
    let m2 = m_base + p.fuel_max * 0.05;
    let ndm = 5;
    let dm = (m2 - m1) / ndm as f64;

    let mut r_max = 0.0;
    let mut h_r_max = 0.0;
    let mut h = 0.0;
    'alts: loop {
        let mut r_alt = 0.0;
        for im in 0..ndm {
            let m1i = m1 + im as f64 * dm;
            let m2i = m1 + (im + 1) as f64 * dm;
            let mri = 0.5 * (m1i + m2i);
            let col = grid::sweep_envelope(models, sl, tropo, mri, h, 2.0, 5.0);
            let summary = match col.summary {
                Some(s) => s,
                None => break 'alts,
            };
            r_alt += (summary.range_factor_max * (m1i / m2i).ln()) / (p.sfc_mil * g);
        }
        if r_alt > r_max {
            r_max = r_alt;
            h_r_max = h;
        }
        h += 500.0;
    }
    debug!(
        range_km = r_max * 1e-3,
        altitude = h_r_max,
        "best cruise range"
    );
    Ok(RangeFigure {
        distance: r_max,
        altitude: h_r_max,
    })
}

/// Speed thresholds and derates for the attitude rate limits, anchored on
/// the reference-mass envelope at sea level and the tropopause.
fn derive_for_roll(
    models: &ModelSet,
    sl: &AltAnchors,
    tropo: &AltAnchors,
) -> Result<RollEnvelope, DynamicsError> {
    let p = &models.params;
    let ht = p.atmosphere.h_tropo;
    let need = |h: f64| -> Result<(f64, f64), DynamicsError> {
        let col = grid::sweep_envelope(models, sl, tropo, p.mass_ref, h, 2.0, 1.0);
        let s = col.summary.ok_or_else(|| {
            DynamicsError::InvalidConfig(format!(
                "no level-flight envelope at reference mass, h={:.0} m",
                h
            ))
        })?;
        Ok((s.vmin, s.v_opt_turn_sust))
    };
    let (vmin_sl, v_turn_sl) = need(0.0)?;
    let (vmin_tropo, v_turn_tropo) = need(ht)?;

    let alpha_span0 = 15.0_f64.to_radians();
    let alpha_span = p.alpha_stall - p.alpha0;
    let v_zero_fac = hyper_falloff(0.5, alpha_span / alpha_span0);

    let ar_fac = p.aspect_ratio / 5.0;
    let pitch_accel_max = (p.pitch_rate_max / 0.2) / ar_fac;
    let roll_accel_max = (p.roll_rate_max / 0.4) / ar_fac;

    let derate_alpha = hyper_falloff(0.5, alpha_span / alpha_span0);
    let derate_mass = hyper_falloff(0.7, ar_fac);

    Ok(RollEnvelope {
        v_zero_sl: vmin_sl * v_zero_fac,
        v_lin_sl: vmin_sl,
        v_max_sl: v_turn_sl,
        v_zero_tropo: vmin_tropo * v_zero_fac,
        v_lin_tropo: vmin_tropo,
        v_max_tropo: v_turn_tropo,
        derate_alpha,
        derate_mass,
        pitch_accel_max,
        roll_accel_max,
    })
}

/// Gear contact geometry in the symmetry plane. The wheel height is the
/// Heron altitude of the origin over the nose-main contact line; the pivot
/// offset locates the vertical axis point along that line.
fn derive_gear(params: &StaticAircraftParams) -> GearDerived {
    let g = &params.gear;
    let p_n = Vector3::new(0.0, g.nose_y, g.nose_z);
    let p_m = Vector3::new(0.0, g.main_y, g.main_z);
    let l_cn = p_n.norm();
    let l_cm = p_m.norm();
    let l_mn = (p_m - p_n).norm();
    let l_s = (l_cn + l_cm + l_mn) / 2.0;
    let area = (l_s * (l_s - l_cn) * (l_s - l_cm) * (l_s - l_mn)).sqrt();
    let h_mn = 2.0 * area / l_mn;

    let ud_mn = (p_n - p_m).normalize();
    // Contact-line direction rotated a quarter turn about the body x-axis
    // points from the contact line down through the origin.
    let ud_h = Vector3::new(0.0, -ud_mn.z, ud_mn.y);
    let p_h = ud_h * h_mn;
    let z_v = lerp_clamped(0.0, g.nose_y, g.main_y, g.nose_z, g.main_z);
    let p_v = Vector3::new(0.0, 0.0, z_v);
    let pivot_offset = (p_v - p_h).dot(&ud_mn);

    GearDerived {
        wheel_height: h_mn,
        pivot_offset,
    }
}

/// Runs the full derivation off the static parameters.
pub(crate) fn derive(models: &ModelSet) -> Result<DerivedData, DynamicsError> {
    let p = &models.params;
    let sl = derive_at_alt(
        models,
        0.0,
        p.vmax_mil_sl,
        p.vmax_ab_sl,
        ClimbSpec::Direct {
            climb_max: p.climb_max_sl,
            v_opt: p.v_opt_climb_sl,
        },
    )?;
    let r_v_opt = (sl.v_opt_climb - sl.vmin) / (sl.vmax - sl.vmin);
    let r_sd0 = sl.sd0_cruise / sl.sd0_top;
    let tropo = derive_at_alt(
        models,
        p.atmosphere.h_tropo,
        p.vmax_mil_tropo,
        p.vmax_ab_tropo,
        ClimbSpec::Ratios { r_v_opt, r_sd0 },
    )?;

    let range = derive_at_range(models, &sl, &tropo)?;
    let roll = derive_for_roll(models, &sl, &tropo)?;
    let gear = derive_gear(p);

    Ok(DerivedData {
        sl,
        tropo,
        roll,
        range,
        gear,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::GearGeometry;
    use approx::assert_relative_eq;

    #[test]
    fn test_gear_geometry_symmetric_heights() {
        // Contacts at equal depth: wheel height is that depth, pivot point
        // between them.
        let params = GearGeometry {
            nose_y: 3.0,
            nose_z: -1.7,
            main_x: 1.5,
            main_y: -0.5,
            main_z: -1.7,
        };
        let p = StaticAircraftParams {
            gear: params,
            ..crate::params::StaticAircraftParams::from_yaml_str(
                crate::params::tests::TEST_YAML,
            )
            .unwrap()
        };
        let gd = derive_gear(&p);
        assert_relative_eq!(gd.wheel_height, 1.7, epsilon = 1e-9);
        // The vertical-axis point lies between nose and main contacts.
        assert!(gd.pivot_offset.abs() < 3.0);
    }

    #[test]
    fn test_drag_schedule_shape() {
        let sched = DragSchedule {
            v_cruise: 300.0,
            vmax: 320.0,
            vmax_ab: 430.0,
            sd0_cruise: 0.6,
            sd0_top: 1.0,
            sd0_top_ab: 1.6,
            d_airbrake: 1.2,
            d_gear: 0.6,
        };
        let sound = 340.0;
        assert_relative_eq!(sched.zero_lift_area(100.0, sound), 0.6);
        assert_relative_eq!(sched.zero_lift_area(310.0, sound), 0.8);
        // Transonic plateau holds the top value.
        assert_relative_eq!(sched.zero_lift_area(350.0, sound), 1.0);
        assert_relative_eq!(sched.zero_lift_area(430.0, sound), 1.6);
        assert_relative_eq!(sched.zero_lift_area(600.0, sound), 1.6);
        // Monotonic overall.
        let mut prev = 0.0;
        for v in (0..60).map(|i| i as f64 * 10.0) {
            let sd0 = sched.zero_lift_area(v, sound);
            assert!(sd0 >= prev - 1e-12);
            prev = sd0;
        }
    }
}
