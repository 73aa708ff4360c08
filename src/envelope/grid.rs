use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aero::{AeroModel, AlphaBand, Bleed, ThrustLimits};
use crate::dynamics::ModelSet;
use crate::envelope::derive::{drag_schedule_at, AltAnchors, DerivedData};
use crate::envelope::table::{Table1, Table2, Table3};
use crate::propulsion::thrust_from_throttle;
use crate::utils::DynamicsError;

/// Envelope summary over the feasible speed range at one mass and altitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvPoint {
    pub vmin: f64,
    pub vmax: f64,
    pub climb_max: f64,
    pub v_opt_climb: f64,
    pub turn_inst_max: f64,
    pub turn_sust_max: f64,
    pub v_opt_turn_inst: f64,
    pub v_opt_turn_sust: f64,
    pub range_factor_max: f64,
    pub v_opt_range: f64,
    pub throttle_opt_range: f64,
}

impl EnvPoint {
    pub(crate) fn to_vec(self) -> Vec<f64> {
        vec![
            self.vmin,
            self.vmax,
            self.climb_max,
            self.v_opt_climb,
            self.turn_inst_max,
            self.turn_sust_max,
            self.v_opt_turn_inst,
            self.v_opt_turn_sust,
            self.range_factor_max,
            self.v_opt_range,
            self.throttle_opt_range,
        ]
    }

    pub(crate) fn from_slice(v: &[f64]) -> Self {
        Self {
            vmin: v[0],
            vmax: v[1],
            climb_max: v[2],
            v_opt_climb: v[3],
            turn_inst_max: v[4],
            turn_sust_max: v[5],
            v_opt_turn_inst: v[6],
            v_opt_turn_sust: v[7],
            range_factor_max: v[8],
            v_opt_range: v[9],
            throttle_opt_range: v[10],
        }
    }
}

/// Envelope figures at one feasible level-flight speed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvSpeedPoint {
    pub climb_rate: f64,
    pub turn_inst: f64,
    pub turn_sust: f64,
    pub range_factor: f64,
    /// Level acceleration headroom [m/s^2].
    pub accel_max: f64,
    /// Thrust bound at the tier's throttle cap [N].
    pub thrust_ref: f64,
    /// Thrust holding level flight [N].
    pub thrust_level: f64,
    /// SFC at the tier's throttle cap [kg/N/s].
    pub sfc_full: f64,
    pub vias: f64,
}

impl EnvSpeedPoint {
    pub(crate) fn to_vec(self) -> Vec<f64> {
        vec![
            self.climb_rate,
            self.turn_inst,
            self.turn_sust,
            self.range_factor,
            self.accel_max,
            self.thrust_ref,
            self.thrust_level,
            self.sfc_full,
            self.vias,
        ]
    }

    pub(crate) fn from_slice(v: &[f64]) -> Self {
        Self {
            climb_rate: v[0],
            turn_inst: v[1],
            turn_sust: v[2],
            range_factor: v[3],
            accel_max: v[4],
            thrust_ref: v[5],
            thrust_level: v[6],
            sfc_full: v[7],
            vias: v[8],
        }
    }
}

/// One swept column of the envelope at fixed mass and altitude.
pub struct EnvColumn {
    /// `None` when no speed holds level flight (above the ceiling).
    pub summary: Option<EnvPoint>,
    pub speeds: Vec<f64>,
    pub points: Vec<EnvSpeedPoint>,
}

/// Stationary climb at fixed speed and full reference thrust, with the
/// bank freed so the climb and lift stay consistent. Fixed point over
/// alpha; climb clamps at the vertical with thrust backed off to match.
pub(crate) fn solve_climb_turn(
    aero: &AeroModel,
    band: &AlphaBand,
    sd0: f64,
    v: f64,
    q: f64,
    w: f64,
    t_ref: f64,
    a_init: Option<f64>,
) -> Option<(f64, f64)> {
    let ks = aero.induced_factor();
    let eps = 0.001_f64.to_radians();
    let mut a = match a_init {
        Some(ai) => ai.clamp(band.alpha_min, band.alpha_max),
        None => band.alpha0,
    };
    let mut t = t_ref;
    let mut cr = 0.0;
    for it in 0.. {
        if it > 100 {
            return None;
        }
        let ap = a;
        let sl = band.lift_area(a)?;
        let sd = sd0 + ks * sl * sl;
        cr = v * (t * (1.0 - 0.5 * a * a) - q * sd) / w;
        if !(-v..=v).contains(&cr) {
            // Past the vertical; back thrust off to the vertical climb.
            cr = cr.clamp(-v, v);
            t = (cr / v) * w + q * sd;
        }
        let ctht = (1.0 - (cr / v).powi(2)).sqrt();
        let (an, _) = band.alpha_for_lift(q, t, w * ctht, false)?;
        a = an;
        if (a - ap).abs() < eps {
            break;
        }
    }
    Some((cr, a))
}

/// Instantaneous and sustained maximum turn rates [rad/s] at one operating
/// point. Instantaneous pulls to the load or stall limit; sustained holds
/// the tangential drag balance at full reference thrust, and never exceeds
/// the instantaneous figure.
#[allow(clippy::too_many_arguments)]
pub(crate) fn max_turn_rates(
    aero: &AeroModel,
    band: &AlphaBand,
    sd0: f64,
    q: f64,
    mv: f64,
    w: f64,
    ws: f64,
    t_ref: f64,
    nmax: f64,
) -> (f64, f64) {
    let ks = aero.induced_factor();

    let (a, sl, l) = match band.alpha_for_lift(q, t_ref, w * nmax, false) {
        Some((a, sl)) => (a, sl, sl * q),
        None => {
            let a = band.alpha_max;
            let sl = band.lift_area(a).unwrap_or(0.0);
            (a, sl, sl * q)
        }
    };
    let sd = sd0 + ks * sl * sl;
    let t_sust = (q * sd) / (1.0 - 0.5 * a * a);
    let t = t_sust.min(t_ref);
    let tri = (((l + t * a).powi(2) - w * w).max(0.0)).sqrt() / mv;

    let trs = match aero.alpha_for_drag_balance(band, sd0, q, t_ref, -ws, 0.0, false) {
        Some(b) => {
            let cnsq = ((b.lift + t_ref * b.alpha).powi(2) - w * w).max(0.0);
            cnsq.sqrt() / mv
        }
        None => tri,
    };
    (tri, trs.min(tri))
}

/// Sweeps level-flight feasibility and performance over speed at one mass,
/// altitude and throttle cap.
pub(crate) fn sweep_envelope(
    models: &ModelSet,
    sl_anchor: &AltAnchors,
    tropo_anchor: &AltAnchors,
    m: f64,
    h: f64,
    throttle_cap: f64,
    dv: f64,
) -> EnvColumn {
    let p = &models.params;
    let aero = &models.aero;
    let air = models.atmosphere.sample(h);
    let sched = drag_schedule_at(p, sl_anchor, tropo_anchor, h);
    let clean = p.flap_detent(crate::params::FlapsSetting::Retracted);
    let (_nmin, nmax) = DerivedData::load_limits(p, m);
    let w = m * air.g;

    let v_start = sl_anchor.vmin_ab.min(tropo_anchor.vmin_ab);
    let v_end = sl_anchor.vmax_ab.max(tropo_anchor.vmax_ab);
    let mut v = (v_start / dv).floor() * dv;

    let mut speeds = Vec::new();
    let mut points = Vec::new();
    let mut vmin: Option<f64> = None;
    let mut vmax: Option<f64> = None;
    let mut climb_max: Option<(f64, f64)> = None;
    let mut turn_inst_max: Option<(f64, f64)> = None;
    let mut turn_sust_max: Option<(f64, f64)> = None;
    let mut turn_sust_fixed = false;
    let mut range_max: Option<(f64, f64, f64)> = None;

    while v <= v_end {
        let ma = v / air.speed_of_sound;
        let q = 0.5 * air.density * v * v;
        let band = aero.band(ma, clean);
        let sd0 = sched.zero_lift_area(v, air.speed_of_sound);
        let thrust = models
            .propulsion
            .max_thrust(h, &air, sched.vmax, sched.vmax_ab, v);
        let t_ref = match thrust_from_throttle(throttle_cap, thrust.mil, thrust.ab) {
            Some(t) => t,
            None => break,
        };
        let limits = ThrustLimits {
            tmax: thrust.mil,
            tmax_ab: thrust.ab,
            tmax_ref: None,
        };

        // Level balance, upright first, inverted as fallback.
        let mut accepted = None;
        for invert in [false, true] {
            if let Some(bal) = aero.solve_path_balance(
                &band,
                sd0,
                q,
                0.0,
                0.0,
                w,
                0.0,
                0.0,
                &limits,
                invert,
                Bleed::default(),
            ) {
                if bal.lift + bal.thrust * bal.alpha > 0.0 && bal.thrust <= t_ref {
                    accepted = Some(bal);
                    break;
                }
            }
        }

        if let Some(bal) = accepted {
            vmin = Some(vmin.map_or(v, |x: f64| x.min(v)));
            vmax = Some(vmax.map_or(v, |x: f64| x.max(v)));

            let vias = models.atmosphere.indicated_airspeed(v, &air);
            let (sfc_full, _) = models.propulsion.sfc(
                h,
                &air,
                sched.vmax,
                sched.vmax_ab,
                v,
                throttle_cap,
            );
            let accel_max = models
                .propulsion
                .max_accel(t_ref, m, bal.alpha, bal.thrust);
            let tl = bal.throttle.unwrap_or(throttle_cap);
            let (_, sfc_fac) =
                models
                    .propulsion
                    .sfc(h, &air, sched.vmax, sched.vmax_ab, v, tl);
            let rf = (v * (bal.lift_area / bal.drag_area)) / sfc_fac;
            match range_max {
                Some((best, _, _)) if best >= rf => {}
                _ => range_max = Some((rf, v, tl)),
            }

            let climb = solve_climb_turn(aero, &band, sd0, v, q, w, t_ref, Some(band.alpha0));
            let cr = climb.map(|(cr, _)| cr);
            if let Some(cr) = cr {
                match climb_max {
                    Some((best, _)) if best >= cr => {}
                    _ => climb_max = Some((cr, v)),
                }
            }

            let (tri, trs) =
                max_turn_rates(aero, &band, sd0, q, m * v, w, 0.0, t_ref, nmax);
            match turn_inst_max {
                Some((best, _)) if best >= tri => {}
                _ => turn_inst_max = Some((tri, v)),
            }
            // The sustained optimum is pinned where it departs from the
            // instantaneous curve; past that the engine model can push it
            // too far out.
            if !turn_sust_fixed {
                match turn_sust_max {
                    Some((best, _)) if best >= trs => {}
                    _ => turn_sust_max = Some((trs, v)),
                }
                if tri > trs + 0.1_f64.to_radians() {
                    turn_sust_fixed = true;
                }
            }

            speeds.push(v);
            points.push(EnvSpeedPoint {
                climb_rate: cr.unwrap_or(0.0),
                turn_inst: tri,
                turn_sust: trs,
                range_factor: rf,
                accel_max,
                thrust_ref: t_ref,
                thrust_level: bal.thrust,
                sfc_full,
                vias,
            });
        }
        v += dv;
    }

    let summary = match (vmin, vmax) {
        (Some(vmin), Some(vmax)) => {
            let (range_factor_max, v_opt_range, throttle_opt_range) =
                range_max.unwrap_or((0.0, vmin, throttle_cap));
            let (climb, v_opt_climb) = climb_max.unwrap_or((0.0, vmin));
            let (tri, v_ti) = turn_inst_max.unwrap_or((0.0, vmin));
            let (trs, v_ts) = turn_sust_max.unwrap_or((0.0, vmin));
            Some(EnvPoint {
                vmin,
                vmax,
                climb_max: climb,
                v_opt_climb,
                turn_inst_max: tri,
                turn_sust_max: trs,
                v_opt_turn_inst: v_ti,
                v_opt_turn_sust: v_ts,
                range_factor_max,
                v_opt_range,
                throttle_opt_range,
            })
        }
        _ => None,
    };

    EnvColumn {
        summary,
        speeds,
        points,
    }
}

/// Performance tables for one throttle tier, mass by altitude for the
/// summary figures and mass by altitude by speed for the per-speed ones.
/// Altitude columns are truncated at the ceiling, so the outer grids are
/// ragged toward high mass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeTier {
    pub throttle_cap: f64,
    pub summary: Table2,
    pub by_speed: Table3,
}

impl EnvelopeTier {
    pub fn envelope(&self, m: f64, h: f64) -> EnvPoint {
        EnvPoint::from_slice(&self.summary.get(m, h))
    }

    pub fn envelope_at_speed(&self, m: f64, h: f64, v: f64) -> EnvSpeedPoint {
        EnvSpeedPoint::from_slice(&self.by_speed.get(m, h, v))
    }

    /// Ceiling for a mass, the lower of the two bracketing columns' last
    /// altitude nodes.
    pub fn ceiling(&self, m: f64) -> f64 {
        let ms = self.summary.points();
        if ms.len() == 1 {
            return self.summary.rows()[0].last_point();
        }
        let ir = ms.partition_point(|&p| p < m).clamp(1, ms.len() - 1);
        let rows = self.summary.rows();
        rows[ir - 1].last_point().min(rows[ir].last_point())
    }
}

/// Envelope tables over all throttle tiers, military always, afterburner
/// when the type has one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeTableSet {
    pub tiers: Vec<EnvelopeTier>,
}

impl EnvelopeTableSet {
    /// Tier lookup; the afterburner tier falls back to military when the
    /// type has none.
    pub fn tier(&self, with_ab: bool) -> &EnvelopeTier {
        if with_ab && self.tiers.len() > 1 {
            &self.tiers[1]
        } else {
            &self.tiers[0]
        }
    }

    pub(crate) fn build(
        models: &ModelSet,
        derived: &DerivedData,
    ) -> Result<Self, DynamicsError> {
        let p = &models.params;

        let n_m = 5;
        let dm = (p.mass_max - p.mass_min) / n_m as f64;
        let mut masses: Vec<f64> =
            (0..n_m).map(|i| p.mass_min + i as f64 * dm).collect();
        masses.push(p.mass_max);

        let mut alts: Vec<f64> = (0..5).map(|i| i as f64 * 2000.0).collect();
        alts.extend((0..20).map(|i| 10000.0 + i as f64 * 1000.0));
        alts.push(30000.0);

        let mut caps = vec![1.0];
        if p.thrust_ab > p.thrust_mil {
            caps.push(2.0);
        }

        let dv = 2.0;
        let mut tiers = Vec::new();
        for &cap in &caps {
            let mut sum_rows = Vec::new();
            let mut spd_rows = Vec::new();
            for &m in &masses {
                let mut hs = Vec::new();
                let mut sums = Vec::new();
                let mut spd_tables = Vec::new();
                for &h in &alts {
                    let col = sweep_envelope(
                        models,
                        &derived.sl,
                        &derived.tropo,
                        m,
                        h,
                        cap,
                        dv,
                    );
                    let summary = match col.summary {
                        Some(s) => s,
                        None => break,
                    };
                    hs.push(h);
                    sums.push(summary.to_vec());
                    let vals = col.points.iter().map(|pt| pt.to_vec()).collect();
                    spd_tables.push(Table1::new(col.speeds, vals));
                }
                if hs.is_empty() {
                    return Err(DynamicsError::InvalidConfig(format!(
                        "no level-flight envelope at sea level for mass {:.0} kg",
                        m
                    )));
                }
                debug!(cap, m, ceiling = hs[hs.len() - 1], "envelope column");
                sum_rows.push(Table1::new(hs.clone(), sums));
                spd_rows.push(Table2::new(hs, spd_tables));
            }
            tiers.push(EnvelopeTier {
                throttle_cap: cap,
                summary: Table2::new(masses.clone(), sum_rows),
                by_speed: Table3::new(masses.clone(), spd_rows),
            });
        }
        Ok(Self { tiers })
    }
}
