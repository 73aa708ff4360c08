use nalgebra::Vector3;

use crate::aero::{Bleed, PathBalance, ThrustLimits};
use crate::dynamics::AircraftDynamics;
use crate::params::FlapsSetting;
use crate::state::{ControlDelta, DynamicState};
use crate::utils::{rotate_about, signed_angle, unit_or_zero};

/// Target flight path expressed in path axes: where the tangent should
/// point, which way the path curves, and how fast and tightly.
#[derive(Debug, Clone, Copy)]
pub struct PathTarget {
    /// Unit target path tangent.
    pub tangent: Vector3<f64>,
    /// Unit target path normal, toward the turn center.
    pub normal: Vector3<f64>,
    /// Turn radius along the normal [m]; zero for a straight path.
    pub turn_radius: f64,
    /// Target speed [m/s].
    pub speed: f64,
    /// Target tangential acceleration [m/s^2].
    pub accel: f64,
}

/// Target attitude expressed in body axes, for solvers that pin the body
/// frame rather than the path.
#[derive(Debug, Clone, Copy)]
pub struct AttitudeTarget {
    /// Unit target body forward axis.
    pub fwd: Vector3<f64>,
    /// Unit target body normal axis.
    pub up: Vector3<f64>,
    pub turn_radius: f64,
    pub speed: f64,
    pub accel: f64,
}

/// Policy knobs for the path solvers.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathOptions {
    /// Tighter thrust bound than the afterburner maximum.
    pub tmax_ref: Option<f64>,
    /// Minimum load under which the inverted solution is considered; the
    /// inverted branch is skipped entirely when `None`.
    pub nmin_inverted: Option<f64>,
    /// Prefer the solution whose canopy faces up over the smaller roll.
    pub face_up: bool,
    pub bleed: Bleed,
}

/// Control increments steering the current state onto a target path.
#[derive(Debug, Clone, Copy)]
pub struct PathDeltas {
    pub delta: ControlDelta,
    /// Bank of the lift plane at the target [rad].
    pub bank: f64,
    /// Target reached inverted.
    pub inverted: bool,
    /// Flap setting assumed at the target.
    pub flaps: FlapsSetting,
}

struct PathTrim {
    bal: PathBalance,
    throttle: f64,
}

fn trim_throttle(bal: &PathBalance) -> f64 {
    match bal.throttle {
        Some(tl) => tl,
        None => 0.0,
    }
}

impl AircraftDynamics {
    /// Control increments from the current state onto a path target.
    ///
    /// The target trim is solved upright first; the inverted trim is tried
    /// as well when the caller admits it, and wins when it is above the
    /// inverted load floor and either rolls less or faces the canopy up.
    /// `None` when neither trim closes within the thrust and alpha bounds.
    pub fn solve_path(
        &self,
        state: &DynamicState,
        target: &PathTarget,
        opts: &PathOptions,
    ) -> Option<PathDeltas> {
        let m = state.mass;
        let h = state.pos.z;
        let v = state.speed();
        let op = self.op_point(h, v, FlapsSetting::Retracted, 0.0, false);
        let w = m * op.air.g;
        let w_vec = Vector3::new(0.0, 0.0, -w);

        let xit = state.tangent();
        let ab = state.binormal();
        let a = state.alpha();

        let xib_t = target.tangent.cross(&target.normal);
        let wt = w_vec.dot(&target.tangent);
        let wn = w_vec.dot(&target.normal);
        let wb = w_vec.dot(&xib_t);
        let ft = m * target.accel;
        let fnn = if target.turn_radius.abs() > 0.0 {
            m * target.speed * target.speed / target.turn_radius
        } else {
            0.0
        };
        let q_t = 0.5 * op.air.density * target.speed * target.speed;
        let limits = ThrustLimits {
            tmax: op.thrust.mil,
            tmax_ab: op.thrust.ab,
            tmax_ref: opts.tmax_ref,
        };

        let solve = |invert: bool| {
            self.models
                .aero
                .solve_path_balance(
                    &op.band, op.sd0, q_t, wt, wn, wb, ft, fnn, &limits, invert,
                    opts.bleed,
                )
                .map(|bal| PathTrim {
                    throttle: trim_throttle(&bal),
                    bal,
                })
        };

        let upright = solve(false);
        let mut nmin_inv = opts.nmin_inverted;
        let inverted = if nmin_inv.is_some() || upright.is_none() {
            let r = solve(true);
            if r.is_none() {
                nmin_inv = None;
            }
            r
        } else {
            None
        };
        let (main, main_inverted) = match (&upright, &inverted) {
            (Some(_), _) => (upright.as_ref()?, false),
            (None, Some(_)) => (inverted.as_ref()?, true),
            (None, None) => return None,
        };

        let ab_t = unit_or_zero(rotate_about(&target.normal, &target.tangent, main.bal.bank));
        let mut da = main.bal.alpha - a;
        let mut dr = signed_angle(&ab, &ab_t, &xit);
        let mut dtl = main.throttle - state.throttle;
        let mut bank = main.bal.bank;
        let mut inv = main_inverted;

        if let (Some(nmin_inv), Some(itrim), false) = (nmin_inv, &inverted, main_inverted) {
            let n_ti = (itrim.bal.lift + itrim.bal.thrust * itrim.bal.alpha) / w;
            if n_ti > nmin_inv {
                let ab_ti =
                    unit_or_zero(rotate_about(&target.normal, &target.tangent, itrim.bal.bank));
                let dr_i = signed_angle(&ab, &ab_ti, &xit);
                let take = if opts.face_up {
                    let ant_t = unit_or_zero(ab_t.cross(&target.tangent));
                    let ant_ti = unit_or_zero(ab_ti.cross(&target.tangent));
                    ant_ti.z > 0.0 && ant_ti.z > ant_t.z
                } else {
                    dr_i.abs() < dr.abs()
                };
                if take {
                    da = itrim.bal.alpha - a;
                    dr = dr_i;
                    dtl = itrim.throttle - state.throttle;
                    bank = itrim.bal.bank;
                    inv = true;
                }
            }
        }

        Some(PathDeltas {
            delta: ControlDelta {
                d_alpha: da,
                d_roll: dr,
                d_throttle: dtl,
                d_airbrake: -state.airbrake,
                d_steer: 0.0,
            },
            bank,
            inverted: inv,
            flaps: FlapsSetting::Retracted,
        })
    }

    /// Control increments from the current state onto an attitude target.
    /// The inverted trim negates the normal and binormal weight components
    /// instead of re-aiming the bank.
    pub fn solve_path_attitude(
        &self,
        state: &DynamicState,
        target: &AttitudeTarget,
        opts: &PathOptions,
    ) -> Option<PathDeltas> {
        let m = state.mass;
        let h = state.pos.z;
        let v = state.speed();
        let op = self.op_point(h, v, FlapsSetting::Retracted, 0.0, false);
        let w = m * op.air.g;
        let w_vec = Vector3::new(0.0, 0.0, -w);

        let xit = state.tangent();
        let ab = state.binormal();
        let a = state.alpha();

        let ab_t = target.fwd.cross(&target.up);
        let wta = w_vec.dot(&target.fwd);
        let wna = w_vec.dot(&target.up);
        let wba = w_vec.dot(&ab_t);
        let ft = m * target.accel;
        let fnn = if target.turn_radius.abs() > 0.0 {
            m * target.speed * target.speed / target.turn_radius
        } else {
            0.0
        };
        let q_t = 0.5 * op.air.density * target.speed * target.speed;
        let limits = ThrustLimits {
            tmax: op.thrust.mil,
            tmax_ab: op.thrust.ab,
            tmax_ref: opts.tmax_ref,
        };

        let solve = |wna: f64, wba: f64, invert: bool| {
            self.models
                .aero
                .solve_path_balance_along_axis(
                    &op.band, op.sd0, q_t, wta, wna, wba, ft, fnn, &limits, invert,
                    opts.bleed,
                )
                .map(|bal| PathTrim {
                    throttle: trim_throttle(&bal),
                    bal,
                })
        };

        let upright = solve(wna, wba, false);
        let mut nmin_inv = opts.nmin_inverted;
        let inverted = if nmin_inv.is_some() || upright.is_none() {
            let r = solve(-wna, -wba, true);
            if r.is_none() {
                nmin_inv = None;
            }
            r
        } else {
            None
        };
        let (main, main_inverted) = match (&upright, &inverted) {
            (Some(_), _) => (upright.as_ref()?, false),
            (None, Some(_)) => (inverted.as_ref()?, true),
            (None, None) => return None,
        };

        let mut da = main.bal.alpha - a;
        let mut dr = signed_angle(&ab, &unit_or_zero(ab_t), &xit);
        let mut dtl = main.throttle - state.throttle;
        let mut bank = main.bal.bank;
        let mut inv = main_inverted;

        if let (Some(nmin_inv), Some(itrim), false) = (nmin_inv, &inverted, main_inverted) {
            let n_ti = (itrim.bal.lift + itrim.bal.thrust * itrim.bal.alpha) / w;
            if n_ti > nmin_inv {
                let dr_i = signed_angle(&ab, &unit_or_zero(-ab_t), &xit);
                if dr_i.abs() < dr.abs() {
                    da = itrim.bal.alpha - a;
                    dr = dr_i;
                    dtl = itrim.throttle - state.throttle;
                    bank = itrim.bal.bank;
                    inv = true;
                }
            }
        }

        Some(PathDeltas {
            delta: ControlDelta {
                d_alpha: da,
                d_roll: dr,
                d_throttle: dtl,
                d_airbrake: -state.airbrake,
                d_steer: 0.0,
            },
            bank,
            inverted: inv,
            flaps: FlapsSetting::Retracted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{tests::TEST_YAML, StaticAircraftParams, Tuning};
    use std::sync::OnceLock;

    fn fixture() -> &'static AircraftDynamics {
        static DYN: OnceLock<AircraftDynamics> = OnceLock::new();
        DYN.get_or_init(|| {
            let params = StaticAircraftParams::from_yaml_str(TEST_YAML).unwrap();
            AircraftDynamics::new(params, Tuning::default(), None).unwrap()
        })
    }

    fn cruise_state() -> DynamicState {
        fixture()
            .trim_state(
                14000.0,
                Vector3::new(0.0, 0.0, 3000.0),
                Vector3::new(0.0, 250.0, 0.0),
                None,
            )
            .unwrap()
    }

    #[test]
    fn test_solve_path_level_cruise_is_near_trim() {
        let dynamics = fixture();
        let state = cruise_state();
        let target = PathTarget {
            tangent: Vector3::y(),
            normal: Vector3::z(),
            turn_radius: 0.0,
            speed: 250.0,
            accel: 0.0,
        };
        let out = dynamics
            .solve_path(&state, &target, &PathOptions::default())
            .unwrap();
        assert!(!out.inverted);
        assert!(out.bank.abs() < 0.05);
        assert!(out.delta.d_alpha.abs() < 5f64.to_radians());
        assert!(out.delta.d_roll.abs() < 5f64.to_radians());
        assert!(out.delta.d_throttle.abs() < 0.5);
    }

    #[test]
    fn test_solve_path_level_turn_banks_and_rolls() {
        let dynamics = fixture();
        let state = cruise_state();
        // Turn center to the right at 2 km, still flying +y.
        let target = PathTarget {
            tangent: Vector3::y(),
            normal: Vector3::x(),
            turn_radius: 2000.0,
            speed: 250.0,
            accel: 0.0,
        };
        let out = dynamics
            .solve_path(&state, &target, &PathOptions::default())
            .unwrap();
        assert!(out.bank.abs() > 0.15);
        assert!(out.delta.d_roll.abs() > 0.3);
    }

    #[test]
    fn test_solve_path_below_stall_infeasible_without_bleed() {
        let dynamics = fixture();
        let state = cruise_state();
        let target = PathTarget {
            tangent: Vector3::y(),
            normal: Vector3::z(),
            turn_radius: 0.0,
            speed: 40.0,
            accel: 0.0,
        };
        assert!(dynamics
            .solve_path(&state, &target, &PathOptions::default())
            .is_none());
        // With full bleed the solver clamps instead of failing.
        let opts = PathOptions {
            bleed: Bleed::BOTH,
            ..PathOptions::default()
        };
        let out = dynamics.solve_path(&state, &target, &opts).unwrap();
        assert!(out.delta.d_alpha.is_finite());
    }
}
