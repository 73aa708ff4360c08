//! Guidance laws steering an aircraft at a tracked body, on top of the
//! path solvers. A controller runs one law; the law recomputes control
//! targets at its own update interval and hands them to the input-program
//! shaper, which doles them out tick by tick in between.

pub mod geometry;
pub mod program;

use std::f64::consts::PI;

use nalgebra::Vector3;

use crate::aero::Bleed;
use crate::dynamics::AircraftDynamics;
use crate::envelope::{EnvPoint, EnvSpeedPoint};
use crate::path::{PathOptions, PathTarget};
use crate::state::{ControlDelta, DynamicState, StepAux};
use crate::utils::{
    cos_blend_clamped, intercept_time, lerp_clamped, norm_ang_delta, rotate_about,
    signed_angle, unit_or_zero,
};

use geometry::{correct_turn_climb, ArcedHelix};
use program::{plan_min_time, ChannelRequest, InputProgram};

/// Cosine ramp from 1 at `x0` down to 0 at `x1`.
fn cos_ramp_down(x: f64, x0: f64, x1: f64) -> f64 {
    cos_blend_clamped(x, x0, x1, 1.0, 0.0)
}

/// Cosine ramp from 0 to 1 over the unit interval.
fn cos_ramp_up01(x: f64) -> f64 {
    cos_blend_clamped(x, 0.0, 1.0, 0.0, 1.0)
}

fn sign_or(x: f64, fallback: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        fallback
    }
}

/// Guidance law selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuidanceMode {
    /// Close on the target and align the gun line with the intercept
    /// direction.
    Pursuit,
    /// Turn and climb toward the target position, without terminal
    /// alignment.
    TurnTo,
    /// Break away from a threat closing from behind.
    Evade,
}

/// Ballistics of the projectile fired at the target, split into the
/// component carried over from the shooter and the component along the
/// (free) firing direction.
#[derive(Debug, Clone, Copy)]
pub struct ProjectileModel {
    /// Velocity carried over from the shooter [m/s].
    pub carried_vel: Vector3<f64>,
    /// Muzzle speed along the firing direction [m/s].
    pub muzzle_speed: f64,
    /// Fixed acceleration, gravity and mean drag [m/s^2].
    pub fixed_acc: Vector3<f64>,
    /// Deceleration along the firing direction [m/s^2].
    pub dir_acc: f64,
    /// Refine the intercept time below this horizon [s].
    pub fine_time: f64,
}

/// The tracked body and the engagement figures around it. For [`Evade`]
/// the position and velocity are the threat's.
///
/// [`Evade`]: GuidanceMode::Evade
#[derive(Debug, Clone, Copy)]
pub struct GuidanceTarget {
    pub pos: Vector3<f64>,
    pub vel: Vector3<f64>,
    pub acc: Vector3<f64>,
    /// Own body size [m].
    pub own_size: f64,
    /// Target body size [m].
    pub size: f64,
    /// Nominal firing distance [m].
    pub fire_dist: f64,
    pub projectile: ProjectileModel,
    /// Afterburner free for use regardless of distance.
    pub free_ab: bool,
    /// Terrain height under the own position [m].
    pub ground_height: f64,
}

/// Controls for one tick, plus the engagement flags valid until the next
/// law update.
#[derive(Debug, Clone, Copy)]
pub struct GuidanceOutput {
    pub delta: ControlDelta,
    /// Weapon release criterion met.
    pub release: bool,
    /// The path solve behind the current program closed.
    pub feasible: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EvadePhase {
    /// Turning onto the threat's beam while outside its reaction envelope.
    Beam,
    /// Inside the envelope, breaking hard about the latched axis.
    Break,
}

/// Owned state of a guidance law between updates. Re-initialized whenever
/// the commanded mode changes.
#[derive(Debug, Clone)]
pub struct GuidanceContext {
    mode: Option<GuidanceMode>,
    program: InputProgram,
    /// Time left to the next law update [s].
    clock: f64,
    /// Intercept-geometry latch of the pursuit law.
    intercepting: bool,
    /// Pitch deltas commanded per roll branch at the previous update.
    pitch_memory: [f64; 2],
    evade_phase: EvadePhase,
    /// Turn axis latched when the evade law enters its break phase.
    evade_axis: Vector3<f64>,
    release: bool,
    feasible: bool,
}

impl Default for GuidanceContext {
    fn default() -> Self {
        Self {
            mode: None,
            program: InputProgram::idle(),
            clock: 0.0,
            intercepting: false,
            pitch_memory: [0.0, 0.0],
            evade_phase: EvadePhase::Beam,
            evade_axis: Vector3::z(),
            release: false,
            feasible: true,
        }
    }
}

impl GuidanceContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn reinit(&mut self, mode: GuidanceMode, aux: &StepAux) {
        *self = Self::default();
        self.mode = Some(mode);
        self.program
            .seed_rates(aux.alpha_rate, aux.roll_input_rate, aux.throttle_rate);
    }
}

/// Control targets one law update hands to the shaper.
struct ModeCmd {
    d_alpha: f64,
    d_roll: f64,
    d_throttle: f64,
    d_airbrake: f64,
    update_min: f64,
    update_max: f64,
    relax: f64,
    release: bool,
    feasible: bool,
}

impl ModeCmd {
    fn hold(update_min: f64, update_max: f64, relax: f64) -> Self {
        Self {
            d_alpha: 0.0,
            d_roll: 0.0,
            d_throttle: 0.0,
            d_airbrake: 0.0,
            update_min,
            update_max,
            relax,
            release: false,
            feasible: false,
        }
    }
}

/// One guidance law bound to an aircraft. The controller itself is
/// stateless; the per-engagement state lives in the [`GuidanceContext`]
/// so one controller can serve many aircraft of the same type.
#[derive(Debug, Clone, Copy)]
pub struct GuidanceController {
    pub mode: GuidanceMode,
}

impl GuidanceController {
    pub fn new(mode: GuidanceMode) -> Self {
        Self { mode }
    }

    /// Advances the guidance by one tick. Re-runs the law and re-plans
    /// the input programs when the update interval has lapsed, then steps
    /// the programs.
    pub fn update(
        &self,
        dynamics: &AircraftDynamics,
        ctx: &mut GuidanceContext,
        state: &DynamicState,
        aux: &StepAux,
        target: &GuidanceTarget,
        dt: f64,
    ) -> GuidanceOutput {
        if ctx.mode != Some(self.mode) {
            ctx.reinit(self.mode, aux);
        }
        ctx.clock -= dt;
        if ctx.clock <= 0.0 {
            let cmd = match self.mode {
                GuidanceMode::Pursuit => self.pursuit(dynamics, ctx, state, aux, target, dt),
                GuidanceMode::TurnTo => self.turn_to(dynamics, state, aux, target),
                GuidanceMode::Evade => self.evade(dynamics, ctx, state, aux, target),
            };
            let alpha = ChannelRequest::new(
                cmd.d_alpha,
                0.0,
                aux.rates.pitch_rate,
                aux.rates.pitch_accel,
            );
            let roll = ChannelRequest::new(
                cmd.d_roll,
                0.0,
                aux.rates.roll_rate,
                aux.rates.roll_accel,
            );
            let throttle = ChannelRequest::new(
                cmd.d_throttle,
                0.0,
                aux.throttle_rate_max,
                aux.throttle_accel_max,
            );
            ctx.program.replan(
                &alpha,
                &roll,
                &throttle,
                cmd.d_airbrake,
                aux.airbrake_rate_max,
                cmd.update_min,
                cmd.update_max,
                cmd.relax,
                dt * 1e-2,
            );
            ctx.clock = ctx.program.update_time().max(dt);
            ctx.release = cmd.release;
            ctx.feasible = cmd.feasible;
        }
        GuidanceOutput {
            delta: ctx.program.step(dt),
            release: ctx.release,
            feasible: ctx.feasible,
        }
    }

    /// Gun pursuit. Far out or at high bearing offset this is the turn
    /// capture; once the target sits inside the bearing band the law
    /// latches onto intercept control, aligning the gun line with the
    /// projectile intercept direction. The latch opens again only past a
    /// wider bearing offset, so the law cannot chatter on the boundary.
    fn pursuit(
        &self,
        dynamics: &AircraftDynamics,
        ctx: &mut GuidanceContext,
        state: &DynamicState,
        aux: &StepAux,
        target: &GuidanceTarget,
        dt: f64,
    ) -> ModeCmd {
        let ez = Vector3::z();
        let m = state.mass;
        let h = aux.h;
        let v = aux.v;
        let a = aux.alpha;
        let xit = aux.tangent;
        let ab = aux.binormal;
        let at = aux.fwd;
        let ant = aux.path_normal;
        let an = state.lift_axis;

        // Firing distance graded by target size and aspect.
        let mut shd = target.fire_dist * lerp_clamped(target.size / 15.0, 0.5, 2.0, 0.8, 1.1);
        let txit = unit_or_zero(target.vel);
        let sig_av = txit.dot(&xit).clamp(-1.0, 1.0).acos();
        shd *= lerp_clamped(sig_av, 170f64.to_radians(), PI, 1.0, 3.0);

        let dp = target.pos - state.pos;
        let ad = unit_or_zero(dp);
        let td = dp.norm();

        let useab = (target.free_ab || td < 5000.0) && dynamics.params().has_afterburner;
        let env = dynamics.envelope(useab, m, h);
        let envv = dynamics.envelope_at_speed(useab, m, h, v);
        let tmaxref = if useab { aux.tmax_ab } else { aux.tmax };

        // Bearing offset of the gun line to the target direction.
        let batad = unit_or_zero(at.cross(&ad));
        let sig_ad = if batad.norm_squared() > 0.5 {
            signed_angle(&at, &ad, &batad)
        } else {
            0.0
        };

        // Intercept latch with hysteresis.
        if ctx.intercepting {
            if sig_ad.abs() > 60f64.to_radians() {
                ctx.intercepting = false;
            }
        } else if sig_ad.abs() < 30f64.to_radians()
            && (sig_av.abs() < 90f64.to_radians() || sig_av.abs() > PI - 10f64.to_radians())
        {
            ctx.intercepting = true;
        }

        if !ctx.intercepting {
            return self.turn_capture(
                dynamics, state, aux, target, &env, &envv, shd, sig_av, tmaxref,
            );
        }

        let update_max = 2.0;
        let update_min = cos_blend_clamped(td, shd * 1.1, shd * 10.0, 0.2, update_max);

        // Intercept direction, graded by time to intercept.
        let rv = (target.vel - state.vel).dot(&ad);
        let mut near = false;
        let (dpi, ati) = if td + rv < 0.0 && sig_av.abs() > 170f64.to_radians() {
            // Closing too fast head-on to aim: offset to pass beside.
            let mut evd = unit_or_zero(ad.cross(&ez));
            if evd.norm() < 1e-5 {
                evd = an;
            }
            let dpi = dp + evd * (0.5 * shd);
            (dpi, unit_or_zero(dpi))
        } else {
            let pr = &target.projectile;
            match intercept_time(
                dp,
                target.vel,
                target.acc,
                Vector3::zeros(),
                pr.carried_vel,
                pr.muzzle_speed,
                pr.fixed_acc,
                pr.dir_acc,
                pr.fine_time,
                dt,
                5,
            ) {
                Some(sol) => {
                    if sol.time < 2.0 {
                        near = true;
                        (sol.point, sol.dir)
                    } else {
                        let dpib = dp + target.vel * 2.0;
                        let rdt = lerp_clamped(sol.time, 2.0, 4.0, 0.0, 1.0);
                        let dpi = if rdt < 1.0 {
                            sol.point + (dpib - sol.point) * rdt
                        } else {
                            dpib
                        };
                        (dpi, unit_or_zero(dpi))
                    }
                }
                None => (dp, unit_or_zero(dp)),
            }
        };

        // Speed away from firing distance.
        let v_a = cos_blend_clamped(td, shd, shd * 2.0, target.vel.dot(&xit), target.vel.norm());
        let vmin_i = (0.6 * v_a).max(0.9 * env.v_opt_turn_sust).max(env.vmin);
        let mut vmax_i = (1.4 * v_a)
            .min((1.2 * v_a).max(1.2 * env.v_opt_turn_inst))
            .min(env.vmax);
        if vmin_i > vmax_i {
            vmax_i = vmin_i;
        }
        let v_i = (v_a + 0.1 * (td - shd * 0.8)).clamp(vmin_i, vmax_i);
        let ct_i = (v_i - v) / 2.0;

        let w = m * aux.g;
        let wt = -ez.dot(&xit) * w;
        let q = aux.q;
        let ft_i = m * ct_i;

        // Alignment offset of the gun line to the intercept direction.
        let batati = unit_or_zero(at.cross(&ati));
        let sig_ati = if batati.norm_squared() > 0.5 {
            signed_angle(&at, &ati, &batati)
        } else {
            0.0
        };
        let ati_n = unit_or_zero(ati - an * ati.dot(&an));
        let sig_atin = signed_angle(&at, &ati_n, &an);
        let thszref = 0.5 * (0.6 * target.size);
        let sigmax_ati = (thszref / td).atan()
            * lerp_clamped(sig_av, 45f64.to_radians(), 120f64.to_radians(), 1.0, 3.0);
        let romax_ati = 360f64.to_radians();
        let cro = ctx.program.roll_rate();
        let release =
            near && td < shd && sig_ati.abs() < sigmax_ati && cro.abs() < romax_ati;

        // Acceptable alpha range at the current distance, from the load
        // freezes, relaxed toward the aerodynamic band when far out or at
        // high off-bore angle. The thrust-sustained freeze caps only the
        // positive side.
        let band = &aux.band;
        let nmin_i = aux.nmin.max(-2.0);
        let amin_i = match aux.alpha_at_nmin {
            Some(an_min) => band.alpha_min.max(an_min),
            None => band.alpha_min,
        };
        let amax_in = match aux.alpha_at_nmax {
            Some(an_max) => band.alpha_max.min(an_max),
            None => band.alpha_max,
        };
        let alpha_sust = if useab {
            aux.alpha_sust_ab
        } else {
            aux.alpha_sust
        };
        let amax_it = match alpha_sust {
            Some(a_sust) => amax_in.min(a_sust),
            None => amax_in,
        };
        let ifac_atl = cos_ramp_down(td, shd * 4.0, shd * 8.0)
            * cos_ramp_down(
                sig_atin.abs(),
                120f64.to_radians(),
                180f64.to_radians(),
            );
        let amax_i = amax_it + (amax_in - amax_it) * ifac_atl;

        // Control for the two possible rolls, current and inverted,
        // preferring the faster roll unless it drives the load too
        // negative.
        let ks = dynamics.models.aero.induced_factor();
        let sd0 = aux.sd0;
        let dac = ctx.program.alpha_moved();
        let pitch_memory_p = ctx.pitch_memory;
        struct RollBranch {
            d_alpha: f64,
            d_roll: f64,
            d_throttle: f64,
            d_airbrake: f64,
            switch_time: f64,
        }
        let mut best: Option<RollBranch> = None;
        for (i_sg, sg) in [1.0f64, -1.0].into_iter().enumerate() {
            // Roll delta taking this branch onto the intercept direction.
            let ant_sg = ant * sg;
            let ant_sgxit = unit_or_zero(ant_sg - xit * ant_sg.dot(&xit));
            let dr_sg = signed_angle(&ant, &ant_sgxit, &xit);
            let ati_xit = unit_or_zero(ati - xit * ati.dot(&xit));
            let dr_ib = if ati_xit.norm_squared() > 0.5 {
                signed_angle(&ant_sgxit, &ati_xit, &xit)
            } else {
                dr_sg
            };

            // Dampen roll when the target is very near.
            let dr_iblim = cos_blend_clamped(
                td,
                shd,
                shd * 2.0,
                5f64.to_radians(),
                0.1f64.to_radians(),
            );
            let dpi_ati_xit = dpi.dot(&ati_xit);
            let roff =
                thszref * cos_ramp_up01(dr_ib.abs() / dr_iblim) * dr_ib.signum();
            let dr_i = if dpi_ati_xit.abs() > roff.abs() {
                let dr_sig = (roff / dpi_ati_xit).asin();
                if dr_sig.abs() < dr_ib.abs() {
                    dr_ib - dr_sig
                } else {
                    0.0
                }
            } else {
                0.0
            };

            // Pitch delta to the intercept direction, after the roll.
            let at_i = unit_or_zero(rotate_about(&at, &xit, dr_i));
            let ab_i = unit_or_zero(rotate_about(&ab, &xit, dr_i));
            let ati_ab = unit_or_zero(ati - ab_i * ati.dot(&ab_i));
            let da_ib = if ati_ab.norm_squared() > 0.5 {
                signed_angle(&at_i, &ati_ab, &ab_i)
            } else {
                0.0
            };

            // Near release, correct the pitch delta by the achieved
            // control during the previous cycle.
            ctx.pitch_memory[i_sg] = da_ib;
            let da_sgb = da_ib - pitch_memory_p[i_sg] + dac;
            let ifac_sgb = cos_ramp_down(td, shd * 0.8, shd * 1.1)
                * cos_ramp_down(
                    sig_atin.abs(),
                    1f64.to_radians(),
                    5f64.to_radians(),
                );
            let da_is = da_ib + da_sgb * ifac_sgb;

            // Limit alpha and derive throttle from the force balance at
            // the limited alpha.
            let a_i = (a + da_is)
                .clamp(amin_i + 0.5f64.to_radians(), amax_i - 0.5f64.to_radians());
            let da_i = a_i - a;
            let (sl_i, sl_ind_i) = band.lift_area_post_stall(a_i);
            let l_i = q * sl_i;
            let d_i = q * (sd0 + ks * sl_ind_i * sl_ind_i);
            let t_i = ((ft_i + d_i - wt) / (1.0 - 0.5 * a_i * a_i)).clamp(0.0, tmaxref);
            let n_i = (l_i + t_i * a_i) / w;
            let tl_i = crate::propulsion::throttle_from_thrust(t_i, aux.tmax, aux.tmax_ab)
                .unwrap_or(0.0);

            let switch_time = plan_min_time(
                dr_i,
                cro,
                0.0,
                aux.rates.roll_rate,
                aux.rates.roll_accel,
                dt * 1e-2,
            )
            .map_or(f64::INFINITY, |p| p.total_time);

            // Allow a more negative load when near release.
            let ifac_nmr = cos_ramp_down(td, shd, 2.0 * shd)
                * cos_ramp_down(dr_i.abs() / 10f64.to_radians(), 0.0, 1.0);
            let nmin_i_rc = (nmin_i + (aux.nmin - nmin_i) * ifac_nmr).max(-4.0);

            let take = match &best {
                None => true,
                Some(b) => n_i > nmin_i_rc && switch_time < b.switch_time,
            };
            if take {
                best = Some(RollBranch {
                    d_alpha: da_i,
                    d_roll: dr_i,
                    d_throttle: tl_i - state.throttle,
                    d_airbrake: -state.airbrake,
                    switch_time,
                });
            }
        }
        let sel = match best {
            Some(sel) => sel,
            None => return ModeCmd::hold(update_min, update_max, 0.9),
        };

        ModeCmd {
            d_alpha: sel.d_alpha,
            d_roll: sel.d_roll,
            d_throttle: sel.d_throttle,
            d_airbrake: sel.d_airbrake,
            update_min,
            update_max,
            relax: cos_blend_clamped(sig_ati.abs(), 0.0, 30f64.to_radians(), 0.5, 0.9),
            release,
            feasible: true,
        }
    }

    /// Turn capture toward the target position: heading and altitude
    /// errors become coupled turn and climb rates, shared by
    /// [`correct_turn_climb`], synthesized into an arced-helix path and
    /// solved with full bleed.
    #[allow(clippy::too_many_arguments)]
    fn turn_capture(
        &self,
        dynamics: &AircraftDynamics,
        state: &DynamicState,
        aux: &StepAux,
        target: &GuidanceTarget,
        env: &EnvPoint,
        envv: &EnvSpeedPoint,
        shd: f64,
        sig_av: f64,
        tmaxref: f64,
    ) -> ModeCmd {
        let update_min = 1.0;
        let update_max = 2.0;
        let v = aux.v;
        let h = aux.h;
        let xit = aux.tangent;

        let dp = target.pos - state.pos;
        let ad = unit_or_zero(dp);
        let td = dp.norm();

        let nmax_hc = aux.nmax.min(9.0);
        let nmin_hc = aux.nmin.max(-2.5);

        // Heading error, blended toward the lead heading when large.
        let hdg = aux.heading;
        let thdg = (-ad.x).atan2(ad.y);
        let mut dhdg = norm_ang_delta(hdg, thdg);
        let dp_ti = dp + target.vel * update_max + target.acc * (0.5 * update_max * update_max);
        let ad_ti = unit_or_zero(dp_ti);
        let thdg_ti = (-ad_ti.x).atan2(ad_ti.y);
        let dhdg_ti = norm_ang_delta(hdg, thdg_ti);
        dhdg = lerp_clamped(
            dhdg.abs(),
            60f64.to_radians(),
            120f64.to_radians(),
            dhdg,
            dhdg_ti,
        );

        // Turn rate to null the heading error over the update interval,
        // capped by the table and g limits.
        let trimax_hcn = aux.g * (nmax_hc * nmax_hc - 1.0).sqrt() / v;
        let trimax_hc = envv.turn_inst.min(trimax_hcn);
        let horizon = update_max;
        let tr_hc = (dhdg / horizon).clamp(-trimax_hc, trimax_hc);

        // Speed schedule: optimal turn speed nearby, intercept speed far
        // out, banded by the envelope.
        let v_tr = lerp_clamped(
            td,
            1.5 * shd,
            3.0 * shd,
            env.v_opt_turn_sust,
            env.v_opt_turn_inst,
        );
        let vmin_ci = (0.8 * env.v_opt_turn_sust).max(env.vmin);
        let v_ci0 =
            cos_blend_clamped(td, 0.5 * shd, 2.0 * shd, target.vel.dot(&xit), target.vel.norm());
        let v_ci = (v_ci0 + 0.1 * (td - shd)).clamp(vmin_ci, env.vmax);
        let v_hc = lerp_clamped(sig_av, 60f64.to_radians(), 90f64.to_radians(), v_ci, v_tr);
        let ct_hc = (v_hc - v) / 2.0;

        // Climb rate toward the capture height, floored over terrain.
        let h_hc = target.pos.z.max(target.ground_height + 500.0);
        let tht_hc = (h_hc - h).atan2(td);
        let cr_hc = v_hc * tht_hc.sin();

        let (cr_hc, tr_hc) =
            correct_turn_climb(cr_hc, tr_hc, envv.climb_rate, env.turn_inst_max, 0.5);

        // Pitch arc radius from the load headroom toward the corrected
        // path pitch.
        let tht_hc = (cr_hc / v_hc).clamp(-0.99, 0.99).asin();
        let dtht = tht_hc - aux.path_pitch;
        let n_hcp = if dtht > 0.0 { nmax_hc } else { nmin_hc };
        let mut r_hcp = (v * v / ((n_hcp - 1.0) * aux.g)).abs();
        let dtht_nz = if dtht != 0.0 { dtht } else { 1e-10 };
        r_hcp = r_hcp.max((v * horizon / dtht_nz).abs());
        r_hcp *= sign_or(dtht, 1.0);

        // Turn arc radius.
        let mut r_hct = if tr_hc.abs() > 1e-5 {
            (v / tr_hc).abs()
        } else {
            geometry::INF_RADIUS
        };
        let dhdg_nz = if dhdg != 0.0 { dhdg } else { 1e-10 };
        r_hct = r_hct.max((v * horizon / dhdg_nz).abs());

        let path = ArcedHelix::new(r_hct, dhdg, r_hcp, Vector3::zeros(), xit);
        let pt = PathTarget {
            tangent: path.tangent(0.0),
            normal: path.normal(0.0),
            turn_radius: path.radius(0.0),
            speed: v_hc,
            accel: ct_hc,
        };
        let opts = PathOptions {
            tmax_ref: Some(tmaxref),
            nmin_inverted: Some(nmin_hc),
            face_up: true,
            bleed: Bleed::BOTH,
        };
        match dynamics.solve_path(state, &pt, &opts) {
            Some(pd) => ModeCmd {
                d_alpha: pd.delta.d_alpha,
                d_roll: pd.delta.d_roll,
                d_throttle: pd.delta.d_throttle,
                d_airbrake: pd.delta.d_airbrake,
                update_min,
                update_max,
                relax: 1.0,
                release: false,
                feasible: true,
            },
            None => ModeCmd::hold(update_min, update_max, 1.0),
        }
    }

    /// Turn toward the target position without terminal alignment.
    fn turn_to(
        &self,
        dynamics: &AircraftDynamics,
        state: &DynamicState,
        aux: &StepAux,
        target: &GuidanceTarget,
    ) -> ModeCmd {
        let m = state.mass;
        let td = (target.pos - state.pos).norm();
        let useab = (target.free_ab || td < 5000.0) && dynamics.params().has_afterburner;
        let env = dynamics.envelope(useab, m, aux.h);
        let envv = dynamics.envelope_at_speed(useab, m, aux.h, aux.v);
        let tmaxref = if useab { aux.tmax_ab } else { aux.tmax };
        let txit = unit_or_zero(target.vel);
        let sig_av = txit.dot(&aux.tangent).clamp(-1.0, 1.0).acos();
        let shd =
            target.fire_dist * lerp_clamped(target.size / 15.0, 0.5, 2.0, 0.8, 1.1);
        self.turn_capture(
            dynamics, state, aux, target, &env, &envv, shd, sig_av, tmaxref,
        )
    }

    /// Break away from a threat. While outside the threat's reaction
    /// envelope, turn at a sustainable rate onto its beam; once inside,
    /// latch a turn axis and break hard onto the beam at the maximum
    /// instantaneous rate.
    fn evade(
        &self,
        dynamics: &AircraftDynamics,
        ctx: &mut GuidanceContext,
        state: &DynamicState,
        aux: &StepAux,
        target: &GuidanceTarget,
    ) -> ModeCmd {
        let update_min = 0.5;
        let update_max = 1.0;
        let ez = Vector3::z();
        let v = aux.v;
        let xit = aux.tangent;

        let useab = target.free_ab && dynamics.params().has_afterburner;
        let env = dynamics.envelope(useab, state.mass, aux.h);
        let envv = dynamics.envelope_at_speed(useab, state.mass, aux.h, v);
        let trimax = envv.turn_inst;
        let trsmax = envv.turn_sust;

        let md = (state.pos - target.pos).norm();
        let ad = unit_or_zero(target.vel);
        let adh = unit_or_zero(ad - ez * ad.dot(&ez));

        let mut cmd = None;
        if ctx.evade_phase == EvadePhase::Beam {
            let mv = target.vel.norm();
            let aot1 = 90f64.to_radians();
            let xith = unit_or_zero(xit - ez * xit.dot(&ez));
            let aot = adh.dot(&xith).clamp(-1.0, 1.0).acos();
            let r = v / (trimax * 0.9);
            let daot1 = aot1 - aot;
            let sgaot = sign_or(daot1, 1.0);
            let rmd = ((mv * daot1 - v) / trimax) * sgaot;
            let mut limmd =
                (r * r + rmd * rmd - 2.0 * r * rmd * (daot1 * sgaot).cos()).sqrt();
            limmd += update_max * (target.vel - state.vel).norm();
            if md > limmd {
                let xib1 = -unit_or_zero(xith.cross(&adh)) * sgaot;
                let xit1 = unit_or_zero(rotate_about(&xith, &xib1, daot1));
                let xin1 = unit_or_zero(xib1.cross(&xit1));
                let tr = trsmax * ((daot1.abs() / trsmax).clamp(0.0, 1.0));
                cmd = Some((xit1, xin1, v / tr, env.v_opt_turn_inst, 0.0));
            } else {
                let xib1t = unit_or_zero(ad.cross(&xit));
                let mut xib1 = ez * sign_or(ez.dot(&xib1t), 1.0);
                if ad.dot(&xit) < 0.0 {
                    xib1 = -xib1;
                }
                ctx.evade_axis = xib1;
                ctx.evade_phase = EvadePhase::Break;
            }
        }
        let (xit1, xin1, rd1, v1, ct1) = match cmd {
            Some(c) => c,
            None => {
                let xib1 = ctx.evade_axis;
                let xin1 = -adh;
                let xit1 = unit_or_zero(xin1.cross(&xib1));
                (xit1, xin1, v / trimax, v, 0.0)
            }
        };

        let pt = PathTarget {
            tangent: xit1,
            normal: xin1,
            turn_radius: rd1,
            speed: v1,
            accel: ct1,
        };
        let opts = PathOptions {
            tmax_ref: Some(aux.tmax_ab),
            nmin_inverted: Some(aux.nmin.max(-4.0)),
            face_up: true,
            bleed: Bleed::BOTH,
        };
        match dynamics.solve_path(state, &pt, &opts) {
            Some(pd) => ModeCmd {
                d_alpha: pd.delta.d_alpha,
                d_roll: pd.delta.d_roll,
                d_throttle: pd.delta.d_throttle,
                d_airbrake: pd.delta.d_airbrake,
                update_min,
                update_max,
                relax: 0.9,
                release: false,
                feasible: true,
            },
            None => ModeCmd::hold(update_min, update_max, 0.9),
        }
    }
}
