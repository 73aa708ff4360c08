//! State trimming and the integration step, in the air and on the ground.

use std::f64::consts::FRAC_PI_2;

use nalgebra::Vector3;

use crate::dynamics::AircraftDynamics;
use crate::envelope::GearDerived;
use crate::params::FlapsSetting;
use crate::propulsion::{thrust_from_throttle, throttle_from_thrust};
use crate::state::{ControlDelta, DynamicState, GroundContact, StepAux, MIN_SPEED};
use crate::utils::{
    lerp_clamped, rotate_about, signed_angle, unit_or_zero, DynamicsError,
};

const MAX_TRIM_ITERS: usize = 100;

/// Kinematics projected onto the ground contact plane. The tangent frame is
/// flattened into the plane, the position is lifted to gear height, and the
/// lift axis is re-derived from the deck angle forced by the gear geometry.
struct GroundFrame {
    pos: Vector3<f64>,
    vel: Vector3<f64>,
    acc: Vector3<f64>,
    tangent: Vector3<f64>,
    normal: Vector3<f64>,
    /// Into the ground, opposite the contact normal.
    binormal_down: Vector3<f64>,
    lift_axis: Vector3<f64>,
    lift_binormal: Vector3<f64>,
    ground_alpha: f64,
    bank: f64,
}

fn project_to_ground(
    gear: &GearDerived,
    pos: Vector3<f64>,
    vel: Vector3<f64>,
    acc: Vector3<f64>,
    alpha: f64,
    ground: &GroundContact,
) -> GroundFrame {
    let ez = Vector3::z();
    let p_g = Vector3::new(pos.x, pos.y, ground.height);
    let xit_b = unit_or_zero(vel);
    let xib = -ground.normal;
    let xit = unit_or_zero(xit_b - xib * xit_b.dot(&xib));
    let xin = unit_or_zero(xib.cross(&xit));
    let k_pz = gear.wheel_height
        / (1.0 - ez.dot(&xit).powi(2) - ez.dot(&xin).powi(2)).sqrt();
    let p = p_g + ez * k_pz;
    let u = xit * vel.norm();
    let b = acc - xib * acc.dot(&xib);
    let k_ht = k_pz * ez.dot(&xit);
    let k_hn = k_pz * ez.dot(&xin);
    let an_g = unit_or_zero(
        ez * k_pz - (xit * (k_ht + gear.pivot_offset) + xin * k_hn),
    );
    let a_g = xit.dot(&an_g).clamp(-1.0, 1.0).acos() - FRAC_PI_2;
    let ab = unit_or_zero(xit.cross(&an_g));
    let an = rotate_about(&an_g, &ab, alpha - a_g);
    let phi = signed_angle(&xin, &ab, &xit);
    debug_assert!(phi.abs() < 1e-5);

    GroundFrame {
        pos: p,
        vel: u,
        acc: b,
        tangent: xit,
        normal: xin,
        binormal_down: xib,
        lift_axis: an,
        lift_binormal: ab,
        ground_alpha: a_g,
        bank: 0.0,
    }
}

/// Pitch and roll of the body frame over the contact plane.
fn ground_attitude(
    normal: &Vector3<f64>,
    at: &Vector3<f64>,
    an: &Vector3<f64>,
    ab: &Vector3<f64>,
) -> (f64, f64) {
    let ngb = unit_or_zero(normal - ab * normal.dot(ab));
    let gsp = signed_angle(&ngb, an, ab);
    let ngt = unit_or_zero(normal - at * normal.dot(at));
    let gsr = signed_angle(&ngt, an, at);
    (gsp, gsr)
}

impl AircraftDynamics {
    /// Steady state at the given mass, position and velocity. With a ground
    /// contact the state is trimmed on the ground roll, takeoff flaps and
    /// gear down; otherwise in clean level-path flight along the velocity.
    pub fn trim_state(
        &self,
        mass: f64,
        pos: Vector3<f64>,
        vel: Vector3<f64>,
        ground: Option<&GroundContact>,
    ) -> Result<DynamicState, DynamicsError> {
        if vel.norm() < MIN_SPEED {
            return Err(DynamicsError::InvalidConfig(format!(
                "cannot trim below the minimum speed {:.0e} m/s",
                MIN_SPEED
            )));
        }
        match ground {
            Some(gc) => self.trim_state_ground(mass, pos, vel, gc),
            None => self.trim_state_air(mass, pos, vel),
        }
    }

    fn trim_state_air(
        &self,
        mass: f64,
        pos: Vector3<f64>,
        vel: Vector3<f64>,
    ) -> Result<DynamicState, DynamicsError> {
        let m = mass;
        let h = pos.z;
        let v = vel.norm();
        let op = self.op_point(h, v, FlapsSetting::Retracted, 0.0, false);
        let band = &op.band;
        let ks = self.models.aero.induced_factor();
        let w = m * op.air.g;
        let q = op.q;
        let ez = Vector3::z();

        let xit = unit_or_zero(vel);
        let tht = FRAC_PI_2 - xit.dot(&ez).clamp(-1.0, 1.0).acos();
        let (stht, ctht) = tht.sin_cos();

        // Fixed point over alpha: drag at the current alpha sets the thrust,
        // the thrust re-sets the alpha carrying the weight. When the weight
        // cannot be carried, alpha is pushed toward stall and retried.
        let tmax_ref = op.thrust.ab;
        let mut a = band.alpha0;
        let mut d = 0.0;
        let mut t = 0.0;
        let mut converged = false;
        for _ in 0..MAX_TRIM_ITERS {
            let ap = a;
            let sl = band.lift_area(a).ok_or_else(|| {
                DynamicsError::NoSolution(format!(
                    "trim alpha left the lift band at v={:.1} m/s, h={:.0} m",
                    v, h
                ))
            })?;
            d = (op.sd0 + ks * sl * sl) * q;
            t = ((d + w * stht) / (1.0 - 0.5 * a * a)).min(tmax_ref);
            match band.alpha_for_lift(q, t, w * ctht, false) {
                Some((an, _)) => a = an,
                None => a = 0.5 * (ap + band.alpha_max),
            }
            if (a - ap).abs() < 0.01_f64.to_radians() {
                a = ap;
                converged = true;
                break;
            }
        }
        if !converged {
            return Err(DynamicsError::NoSolution(format!(
                "level trim did not converge at v={:.1} m/s, h={:.0} m",
                v, h
            )));
        }

        let tl = throttle_from_thrust(t, op.thrust.mil, op.thrust.ab).unwrap_or(0.0);
        let ca = 1.0 - 0.5 * a * a;
        let c = (t * ca - d - w * stht) / m;
        let acc = xit * c;

        let ab = if xit.dot(&ez).abs() < 1.0 - 1e-5 {
            unit_or_zero(xit.cross(&ez))
        } else {
            Vector3::x()
        };
        let ant = unit_or_zero(ab.cross(&xit));
        let an = unit_or_zero(rotate_about(&ant, &ab, a));

        Ok(DynamicState {
            pos,
            vel,
            acc,
            ang_vel: Vector3::zeros(),
            ang_acc: Vector3::zeros(),
            mass: m,
            lift_axis: an,
            bank: FRAC_PI_2,
            throttle: tl,
            airbrake: 0.0,
            flaps: FlapsSetting::Retracted,
            gear_down: false,
            wheel_brake: false,
            on_ground: false,
            ground_alpha: 0.0,
            steer_rate: 0.0,
            ground_pitch: 0.0,
            ground_roll: 0.0,
        })
    }

    fn trim_state_ground(
        &self,
        mass: f64,
        pos: Vector3<f64>,
        vel: Vector3<f64>,
        ground: &GroundContact,
    ) -> Result<DynamicState, DynamicsError> {
        let m = mass;
        let a = 0.0;
        let gf = project_to_ground(
            &self.derived.gear,
            pos,
            vel,
            Vector3::zeros(),
            a,
            ground,
        );

        let h = gf.pos.z;
        let v = gf.vel.norm();
        let op = self.op_point(h, v, FlapsSetting::Takeoff, 0.0, false);
        let band = &op.band;
        let ks = self.models.aero.induced_factor();
        let (mu_roll, _, _) = ground.surface.friction();
        let w = m * op.air.g;
        let q = op.q;
        let w_vec = Vector3::new(0.0, 0.0, -w);
        let wt = w_vec.dot(&gf.tangent);
        let wb = w_vec.dot(&gf.binormal_down);

        let sl = band.lift_area(a).unwrap_or(0.0);
        let l = sl * q;
        let sina = a;
        let cosa = 1.0 - 0.5 * a * a;
        let tana = sina / cosa;
        let d = (op.sd0 + ks * sl * sl) * q;
        let mu = mu_roll;
        let rb = (wb - (l + (d - wt) * tana)) / (1.0 + mu * tana);
        if rb < 0.0 {
            return Err(DynamicsError::NoSolution(format!(
                "no ground reaction at v={:.1} m/s (lift exceeds weight)",
                v
            )));
        }
        let tmax_ref = op.thrust.ab;
        let t = ((d - wt + rb * mu) / cosa).min(tmax_ref);
        let tl = throttle_from_thrust(t, op.thrust.mil, op.thrust.ab).unwrap_or(0.0);
        let c = (t * cosa - d + wt - rb * mu) / m;
        let acc = gf.tangent * c;

        Ok(DynamicState {
            pos: gf.pos,
            vel: gf.vel,
            acc,
            ang_vel: Vector3::zeros(),
            ang_acc: Vector3::zeros(),
            mass: m,
            lift_axis: gf.lift_axis,
            bank: gf.bank,
            throttle: tl,
            airbrake: 0.0,
            flaps: FlapsSetting::Takeoff,
            gear_down: true,
            wheel_brake: false,
            on_ground: true,
            ground_alpha: gf.ground_alpha,
            steer_rate: 0.0,
            ground_pitch: 0.0,
            ground_roll: 0.0,
        })
    }

    /// Advances the state over `dt` under the given control increments.
    ///
    /// In the air the accelerations are trapezoidal over the step, with the
    /// tangent frame iterated to consistency against the new velocity. On
    /// the ground the motion stays in the contact plane, with the ground
    /// reaction balancing the normal forces; the step switches between the
    /// regimes at most once, on liftoff (reaction gone negative) or
    /// touchdown (descent through gear height).
    pub fn step(
        &self,
        state: &DynamicState,
        delta: &ControlDelta,
        dt: f64,
        ground: Option<&GroundContact>,
    ) -> Result<(DynamicState, StepAux), DynamicsError> {
        let p_const = &self.models.params;
        let eps = 0.001_f64.to_radians();
        let max_it = 5;
        let veps = MIN_SPEED;
        let ez = Vector3::z();

        let (p, u, b) = (state.pos, state.vel, state.acc);
        let o = state.ang_vel;
        let gc = state.on_ground;
        let m = state.mass;
        let an = state.lift_axis;
        let phi = state.bank;
        let tl = state.throttle;
        let brd = state.airbrake;
        let gso = state.steer_rate;
        let ag = state.ground_alpha;

        let mut da = delta.d_alpha;
        let dr = delta.d_roll;
        let dtl = delta.d_throttle;
        let dbrd = delta.d_airbrake;
        let dgso = delta.d_steer;

        let h = p.z;
        let v = u.norm();
        let op = self.op_point(h, v, state.flaps, brd, state.gear_down);
        let band = op.band;
        let ks = self.models.aero.induced_factor();
        let g = op.air.g;
        let rho = op.air.density;
        let mut mu = 0.0;
        if let Some(gc) = ground {
            let (mu_roll, mu_brake, _) = gc.surface.friction();
            mu = if state.wheel_brake { mu_brake } else { mu_roll };
        }
        let w = m * g;

        let tl_n = (tl + dtl).clamp(0.0, p_const.throttle_max());
        let t_n = thrust_from_throttle(tl_n, op.thrust.mil, op.thrust.ab)
            .ok_or_else(|| {
                DynamicsError::NoSolution(format!("throttle {:.2} out of range", tl_n))
            })?;
        let sfc_n = self
            .models
            .propulsion
            .sfc(h, &op.air, op.sched.vmax, op.sched.vmax_ab, v, tl_n)
            .0;
        let brd_n = (brd + dbrd).clamp(0.0, 1.0);

        let xit = unit_or_zero(u);
        let ab = unit_or_zero(xit.cross(&an));
        let a = xit.dot(&an).clamp(-1.0, 1.0).acos() - FRAC_PI_2;

        let mut gc_n = gc;
        let mut a_n = a;
        let mut u_n = u;
        let mut v_n = v;
        let mut xit_n = xit;
        let mut xin_n = Vector3::zeros();
        let mut xib_n = Vector3::zeros();
        let mut ab_n = ab;
        let mut phi_n = phi;
        let mut ag_n = ag;
        let mut m_n = m;
        let mut q_n = 0.0;
        let mut sl_n = 0.0;
        let mut l_n = 0.0;
        let mut sd_n = op.sd0;
        let mut d_n = 0.0;
        let mut fn_n = 0.0;
        let mut b_n = b;
        let mut p_n = p;
        let mut drxit_n = 0.0;
        let mut gso_n = 0.0;
        let mut gsp_n = 0.0;
        let mut gsr_n = 0.0;

        if gc {
            let xin = unit_or_zero(rotate_about(&ab, &xit, -phi));
            let xib = unit_or_zero(xit.cross(&xin));
            xin_n = xin;
            xib_n = xib;
        }

        let mut i_gc = 0;
        loop {
            let gc_prev = gc_n;

            if !gc_n {
                // Air regime. The tangent frame at the end of the step is
                // found by a short fixed point: accelerate along the current
                // guess, re-derive the tangent from the new velocity, re-aim
                // the bank at the residual normal forces.
                a_n = a + da;
                u_n = u;
                xit_n = xit;
                drxit_n = 0.5 * da;
                phi_n = phi;
                let mut it = 0;
                let mut last = false;
                loop {
                    it += 1;

                    ab_n = unit_or_zero(rotate_about(&ab, &xit, dr));
                    xin_n = unit_or_zero(rotate_about(&ab_n, &xit, -phi_n));
                    xib_n = unit_or_zero(xit_n.cross(&xin_n));

                    m_n = m - t_n * sfc_n * dt;
                    let w_n = m_n * g;
                    let wez_n = -ez * w_n;
                    let wt_n = wez_n.dot(&xit_n);
                    let wn_n = wez_n.dot(&xin_n);
                    let wb_n = wez_n.dot(&xib_n);
                    v_n = u_n.norm();
                    q_n = 0.5 * rho * v_n * v_n;
                    let (sl, sl_ext) = band.lift_area_post_stall(a_n);
                    sl_n = sl;
                    l_n = sl * q_n;
                    sd_n = op.sd0 + ks * sl_ext * sl_ext;
                    d_n = q_n * sd_n;
                    let sina_n = a_n;
                    let cosa_n = 1.0 - 0.5 * a_n * a_n;
                    let ft_n = t_n * cosa_n - d_n + wt_n;
                    let lpt_n = l_n + t_n * sina_n;
                    fn_n = lpt_n * phi_n.sin() + wn_n;
                    // On a straight path phi is arbitrary, so the binormal
                    // force need not vanish.
                    let fb_n = -lpt_n * phi_n.cos() + wb_n;
                    b_n = xit_n * (ft_n / m_n)
                        + xin_n * (fn_n / m_n)
                        + xib_n * (fb_n / m_n);

                    u_n = u + (b + b_n) * (0.5 * dt);
                    if u_n.dot(&xit_n) < veps {
                        u_n = xit * veps;
                    }

                    if last {
                        break;
                    }

                    xit_n = unit_or_zero(u_n);
                    let drxit_np = drxit_n;
                    drxit_n = signed_angle(&xit, &xit_n, &ab);

                    let sg = lpt_n.signum();
                    phi_n = ((fn_n - wn_n) * sg).atan2((fb_n - wb_n) * -sg);

                    let dqce = (drxit_n - drxit_np).abs();
                    if dqce < eps || it >= max_it {
                        last = true;
                    }
                }

                p_n = p + u * dt + (b * 2.0 + b_n) * (dt * dt / 6.0);

                gso_n = 0.0;
                gsp_n = 0.0;
                gsr_n = 0.0;

                if i_gc == 0 {
                    if let Some(gc) = ground {
                        if p_n.z - gc.height < self.derived.gear.wheel_height {
                            gc_n = true;
                        }
                    }
                }
            } else {
                debug_assert!(phi_n.abs() < 1e-5);
                gso_n = gso + dgso;

                // Rotation speed scheduling: pitch-up inputs fade in between
                // 80% and 100% of the flapped minimum speed.
                let vmin = self.derived.vmin_flapped_ab(p_const, h);
                let vrot = vmin * 0.8;
                if da > 0.0 {
                    da = lerp_clamped(v_n, vrot, vmin, 0.0, da);
                }
                a_n = a + da;
                a_n = a_n.max(ag_n);
                let sina_n = a_n;
                let cosa_n = 1.0 - 0.5 * a_n * a_n;
                let tana_n = sina_n / cosa_n;

                m_n = m - t_n * sfc_n * dt;
                let w_n = m_n * g;
                let wez_n = -ez * w_n;
                let wt_n = wez_n.dot(&xit_n);
                let wb_n = wez_n.dot(&xib_n);
                v_n = u_n.norm();
                q_n = 0.5 * rho * v_n * v_n;
                let (sl, sl_ext) = band.lift_area_post_stall(a_n);
                sl_n = sl;
                l_n = sl * q_n;
                sd_n = op.sd0 + ks * sl_ext * sl_ext;
                d_n = q_n * sd_n;
                if (v_n - veps).abs() < veps * 1e-3 {
                    mu = 0.0;
                }
                let rb_n =
                    (wb_n - (l_n + (d_n - wt_n) * tana_n)) / (1.0 + mu * tana_n);
                if rb_n > 0.0 {
                    let rt_n = rb_n * mu;
                    let ft_n = t_n * cosa_n - d_n + wt_n - rt_n;
                    fn_n = m_n * v_n * gso_n;
                    b_n = xit_n * (ft_n / m_n) + xin_n * (fn_n / m_n);
                    u_n = u + (b + b_n) * (0.5 * dt);
                    if u_n.dot(&xit_n) > veps {
                        p_n = p + u * dt + (b * 2.0 + b_n) * (dt * dt / 6.0);
                    } else {
                        b_n = Vector3::zeros();
                        u_n = xit * veps;
                        p_n = p;
                    }
                    drxit_n = 0.0;
                } else if i_gc == 0 {
                    // Lift has beaten the ground reaction: liftoff.
                    gc_n = false;
                }
            }

            if gc_n {
                let gc = match ground {
                    Some(gc) => gc,
                    None => {
                        return Err(DynamicsError::InvalidConfig(
                            "grounded state stepped without a contact plane".into(),
                        ))
                    }
                };
                let gf = project_to_ground(
                    &self.derived.gear,
                    p_n,
                    u_n,
                    b_n,
                    a_n,
                    gc,
                );
                p_n = gf.pos;
                u_n = gf.vel;
                b_n = gf.acc;
                xit_n = gf.tangent;
                xin_n = gf.normal;
                xib_n = gf.binormal_down;
                ab_n = gf.lift_binormal;
                ag_n = gf.ground_alpha;
                phi_n = gf.bank;
            } else {
                ag_n = 0.0;
            }

            i_gc += 1;
            if gc_n == gc_prev || i_gc == 2 {
                break;
            }
        }

        let at_n = unit_or_zero(rotate_about(&xit_n, &ab_n, a_n));
        let ant_n = unit_or_zero(ab_n.cross(&xit_n));
        let an_n = unit_or_zero(rotate_about(&ant_n, &ab_n, a_n));
        if let Some(gc) = ground {
            let (gsp, gsr) = ground_attitude(&gc.normal, &at_n, &an_n, &ab_n);
            gsp_n = gsp;
            gsr_n = gsr;
        }

        let (o_n, s_n) = if dt > 0.0 {
            let o_n = ab_n * ((da + drxit_n) / dt) + xit_n * (dr / dt);
            (o_n, (o_n - o) / dt)
        } else {
            (Vector3::zeros(), Vector3::zeros())
        };

        let next = DynamicState {
            pos: p_n,
            vel: u_n,
            acc: b_n,
            ang_vel: o_n,
            ang_acc: s_n,
            mass: m_n,
            lift_axis: an_n,
            bank: phi_n,
            throttle: tl_n,
            airbrake: brd_n,
            flaps: state.flaps,
            gear_down: state.gear_down,
            wheel_brake: state.wheel_brake,
            on_ground: gc_n,
            ground_alpha: ag_n,
            steer_rate: gso_n,
            ground_pitch: gsp_n,
            ground_roll: gsr_n,
        };

        // Achieved increments over the step, for the rate figures.
        let da_ach = a_n - a;
        let dr_ach = signed_angle(&ab, &ab_n, &xit_n);
        let dtl_ach = tl_n - tl;

        let mut tr = 0.0;
        let mut rr = 0.0;
        if dt > 0.0 {
            let xitz = xit.dot(&ez);
            let xitz_n = xit_n.dot(&ez);
            if xitz.abs() < 1.0 - 1e-10 && xitz_n.abs() < 1.0 - 1e-10 {
                let xith = unit_or_zero(xit - ez * xitz);
                let xith_n = unit_or_zero(xit_n - ez * xitz_n);
                tr = signed_angle(&xith, &xith_n, &ez) / dt;
            }
            rr = dr_ach / dt;
        }

        let (hdg, bnk) = if xit_n.dot(&ez).abs() < 1.0 - 1e-5 {
            let nxy = unit_or_zero(ez.cross(&xit_n).cross(&ez));
            let hdg = signed_angle(&Vector3::y(), &nxy, &ez);
            let nz = unit_or_zero(xit_n.cross(&ez).cross(&xit_n));
            let bnk = signed_angle(&nz, &ant_n, &xit_n);
            (hdg, bnk)
        } else {
            (0.0, 0.0)
        };
        let pch = at_n.dot(&ez).atan2(at_n.xy().norm());

        let h_n = p_n.z;
        let mach = v_n / op.air.speed_of_sound;
        let cr = u_n.z;
        let tht = (cr / v_n).clamp(-1.0, 1.0).asin();

        let load = (l_n + t_n * a_n) / w;
        let (nmin, nmax) = self.max_load_factor(m_n);
        let turn_radius = if fn_n.abs() > 1e-10 {
            (m_n * v_n * v_n) / fn_n
        } else {
            1e10
        };
        let thrust_level = t_n / op.thrust.mil;

        let alpha_at_nmin = band.alpha_for_lift(q_n, t_n, w * nmin, false).map(|r| r.0);
        let alpha_at_nmax = band.alpha_for_lift(q_n, t_n, w * nmax, false).map(|r| r.0);
        let alpha_at_1g = band.alpha_for_lift(q_n, t_n, w, false).map(|r| r.0);

        let wt = w * -tht.sin();
        let sustained = |t_ref: f64| -> (Option<f64>, Option<f64>) {
            match self.models.aero.alpha_for_drag_balance(
                &band, op.sd0, q_n, t_ref, wt, 0.0, false,
            ) {
                Some(r) => {
                    let n = (r.lift + t_ref * r.alpha) / w;
                    (Some(r.alpha), Some(n))
                }
                None => (None, None),
            }
        };
        let (alpha_sust, n_sust) = sustained(op.thrust.mil);
        let (alpha_sust_ab, n_sust_ab) = sustained(op.thrust.ab);

        let stall_load = |t_ref: f64| -> f64 {
            let (sl, _) = band.lift_area_post_stall(band.alpha_max);
            (sl * q_n + t_ref * band.alpha_max) / w
        };
        let n_stall = stall_load(op.thrust.mil);
        let n_stall_ab = stall_load(op.thrust.ab);

        let rates = self.derived.rate_limits(
            p_const,
            h_n,
            op.air.density_ratio,
            v_n,
            m_n,
            band.alpha0,
            band.alpha_min,
            band.alpha_max,
            a_n,
        );

        let (alpha_rate, roll_input_rate, throttle_rate, tangent_rate) = if dt > 0.0 {
            (da_ach / dt, dr_ach / dt, dtl_ach / dt, drxit_n / dt)
        } else {
            (0.0, 0.0, 0.0, 0.0)
        };

        let aux = StepAux {
            g,
            density: rho,
            pressure: op.air.pressure,
            speed_of_sound: op.air.speed_of_sound,
            h: h_n,
            v: v_n,
            vias: self.indicated_airspeed(h_n, v_n),
            mach,
            q: q_n,
            climb_rate: cr,
            path_pitch: tht,
            heading: hdg,
            pitch: pch,
            bank_angle: bnk,
            band,
            alpha: a_n,
            lift_area: sl_n,
            lift: l_n,
            drag_area: sd_n,
            drag: d_n,
            sd0: op.sd0,
            thrust: t_n,
            tmax: op.thrust.mil,
            tmax_ab: op.thrust.ab,
            thrust_level,
            sfc: sfc_n,
            load,
            nmin,
            nmax,
            turn_radius,
            turn_rate: tr,
            roll_rate: rr,
            alpha_at_nmin,
            alpha_at_nmax,
            alpha_at_1g,
            alpha_sust,
            n_sust,
            alpha_sust_ab,
            n_sust_ab,
            n_stall,
            n_stall_ab,
            rates,
            throttle_rate_max: 1.0,
            throttle_accel_max: 10.0,
            airbrake_rate_max: 0.5,
            alpha_rate,
            roll_input_rate,
            throttle_rate,
            tangent_rate,
            tangent: xit_n,
            binormal: ab_n,
            path_normal: ant_n,
            fwd: at_n,
        };

        Ok((next, aux))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{GroundSurface, StaticAircraftParams, Tuning};
    use approx::assert_relative_eq;
    use std::sync::OnceLock;

    fn fixture() -> &'static AircraftDynamics {
        static DYN: OnceLock<AircraftDynamics> = OnceLock::new();
        DYN.get_or_init(|| {
            let params =
                StaticAircraftParams::from_yaml_str(crate::params::tests::TEST_YAML)
                    .unwrap();
            AircraftDynamics::new(params, Tuning::default(), None).unwrap()
        })
    }

    #[test]
    fn test_trim_level_flight_converges() {
        let dynamics = fixture();
        let s = dynamics
            .trim_state(
                14000.0,
                Vector3::new(0.0, 0.0, 2000.0),
                Vector3::new(0.0, 220.0, 0.0),
                None,
            )
            .unwrap();
        let band = dynamics.alpha_bounds(2000.0, 220.0, FlapsSetting::Retracted);
        assert!(band.contains(s.alpha()));
        // Mid-envelope cruise rides on military power, never afterburner.
        assert!(s.throttle > 0.0 && s.throttle < 1.0);
        // The trimmed alpha sits on the lift-for-weight solution; the
        // thrust tilt only shifts it by a fraction of a degree.
        let air = dynamics.atmosphere().sample(2000.0);
        let q = 0.5 * air.density * 220.0 * 220.0;
        let (a_level, _) = band
            .alpha_for_lift(q, 0.0, 14000.0 * air.g, false)
            .unwrap();
        assert!((s.alpha() - a_level).abs() < 1.0_f64.to_radians());
        assert!(!s.on_ground);
        // Level trim at a mid-envelope speed has no residual acceleration.
        assert!(s.acc.norm() < 0.5);
        // Lift axis mostly vertical, alpha off the tangent.
        assert!(s.lift_axis.z > 0.9);
    }

    #[test]
    fn test_trim_rejects_standstill() {
        let dynamics = fixture();
        let err = dynamics
            .trim_state(
                14000.0,
                Vector3::zeros(),
                Vector3::new(0.0, 1e-7, 0.0),
                None,
            )
            .unwrap_err();
        assert!(matches!(err, DynamicsError::InvalidConfig(_)));
    }

    #[test]
    fn test_trim_ground_roll() {
        let dynamics = fixture();
        let gc = GroundContact::level(0.0, GroundSurface::Runway);
        let s = dynamics
            .trim_state(
                14000.0,
                Vector3::new(0.0, 0.0, 0.0),
                Vector3::new(0.0, 50.0, 0.0),
                Some(&gc),
            )
            .unwrap();
        assert!(s.on_ground);
        assert!(s.gear_down);
        assert_eq!(s.flaps, FlapsSetting::Takeoff);
        // Lifted onto the wheels over the contact plane.
        assert_relative_eq!(
            s.pos.z,
            dynamics.derived().gear.wheel_height,
            epsilon = 1e-9
        );
        // Symmetric test gear keeps the deck level.
        assert_relative_eq!(s.ground_alpha, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_step_holds_level_trim() {
        let dynamics = fixture();
        let trim = dynamics
            .trim_state(
                14000.0,
                Vector3::new(0.0, 0.0, 2000.0),
                Vector3::new(0.0, 220.0, 0.0),
                None,
            )
            .unwrap();
        let mut s = trim.clone();
        let dt = 0.05;
        for _ in 0..20 {
            let (sn, _aux) = dynamics
                .step(&s, &ControlDelta::default(), dt, None)
                .unwrap();
            s = sn;
        }
        // One second of zero-input flight from trim: small drift only.
        assert!((s.pos.z - trim.pos.z).abs() < 5.0);
        assert!((s.speed() - trim.speed()).abs() < 2.0);
        // Fuel burned.
        assert!(s.mass < trim.mass);
    }

    #[test]
    fn test_step_aux_level_figures() {
        let dynamics = fixture();
        let s = dynamics
            .trim_state(
                14000.0,
                Vector3::new(0.0, 0.0, 2000.0),
                Vector3::new(0.0, 220.0, 0.0),
                None,
            )
            .unwrap();
        let (_, aux) = dynamics
            .step(&s, &ControlDelta::default(), 0.05, None)
            .unwrap();
        // Level flight near one g, path pitch near zero.
        assert!((aux.load - 1.0).abs() < 0.15);
        assert!(aux.path_pitch.abs() < 0.05);
        assert!(aux.climb_rate.abs() < 5.0);
        assert_relative_eq!(aux.heading, 0.0, epsilon = 0.05);
        // The one-g trim alpha matches the flown alpha.
        let a1g = aux.alpha_at_1g.unwrap();
        assert!((a1g - aux.alpha).abs() < 0.05);
        assert!(aux.nmax > 1.0 && aux.nmin < 0.0);
    }

    #[test]
    fn test_step_below_flapped_stall_caps_lift() {
        let dynamics = fixture();
        let trim = dynamics
            .trim_state(
                14000.0,
                Vector3::new(0.0, 0.0, 500.0),
                Vector3::new(0.0, 120.0, 0.0),
                None,
            )
            .unwrap();
        // Landing configuration, slowed below the flapped stall speed.
        let mut s = trim.clone();
        s.flaps = FlapsSetting::Landing;
        s.gear_down = true;
        s.vel = Vector3::new(0.0, 50.0, 0.0);

        let band = dynamics.alpha_bounds(500.0, 50.0, FlapsSetting::Landing);
        let air = dynamics.atmosphere().sample(500.0);
        let q = 0.5 * air.density * 50.0 * 50.0;
        let w = s.mass * air.g;
        // No alpha in the landing band carries the weight at this speed.
        assert!(band.alpha_for_lift(q, 0.0, w, false).is_none());

        // Pulling past the flapped stall leaves the lift capped below the
        // weight; the aircraft sinks instead of flying an unachievable
        // alpha.
        let pull = ControlDelta {
            d_alpha: 25.0_f64.to_radians(),
            ..Default::default()
        };
        let (sn, aux) = dynamics.step(&s, &pull, 0.05, None).unwrap();
        assert!(aux.lift < w);
        assert!(aux.load < 1.0);
        assert!(sn.vel.z < s.vel.z);

        // Deeper into the stall the cap holds: more alpha buys no lift.
        let deep = ControlDelta {
            d_alpha: 40.0_f64.to_radians(),
            ..Default::default()
        };
        let (_, aux_deep) = dynamics.step(&s, &deep, 0.05, None).unwrap();
        assert!(aux_deep.lift <= aux.lift * 1.05);
    }

    #[test]
    fn test_step_ground_rotation_clamped_below_speed() {
        let dynamics = fixture();
        let gc = GroundContact::level(0.0, GroundSurface::Runway);
        let s = dynamics
            .trim_state(
                14000.0,
                Vector3::zeros(),
                Vector3::new(0.0, 20.0, 0.0),
                Some(&gc),
            )
            .unwrap();
        // Well below the rotation speed a pitch-up input is faded out
        // entirely; the nose stays on the deck angle.
        let delta = ControlDelta {
            d_alpha: 5.0_f64.to_radians(),
            ..Default::default()
        };
        let (sn, _) = dynamics.step(&s, &delta, 0.05, Some(&gc)).unwrap();
        assert!(sn.on_ground);
        assert!(sn.alpha().abs() < 1e-6);
    }

    #[test]
    fn test_step_ground_stays_on_plane() {
        let dynamics = fixture();
        let gc = GroundContact::level(0.0, GroundSurface::Runway);
        let mut s = dynamics
            .trim_state(
                14000.0,
                Vector3::zeros(),
                Vector3::new(0.0, 40.0, 0.0),
                Some(&gc),
            )
            .unwrap();
        for _ in 0..10 {
            let (sn, _) = dynamics
                .step(&s, &ControlDelta::default(), 0.05, Some(&gc))
                .unwrap();
            s = sn;
        }
        assert!(s.on_ground);
        assert_relative_eq!(
            s.pos.z,
            dynamics.derived().gear.wheel_height,
            epsilon = 1e-6
        );
        assert!(s.vel.z.abs() < 1e-9);
    }
}
