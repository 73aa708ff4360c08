use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::params::{FlapDetent, StaticAircraftParams};
use crate::propulsion::throttle_from_thrust;

/// Alpha band and lift slopes at one Mach number and flap setting. All
/// lift and drag quantities are areas, coefficient times wing area.
///
/// The lift curve is piecewise linear: slope `slope` between the negative
/// and positive knee angles, `slope_post` from the knees out to the stall
/// angles. The negative knee and stall sit at half the positive span
/// below the zero-lift angle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlphaBand {
    /// Negative stall angle [rad].
    pub alpha_min: f64,
    /// Negative knee angle [rad].
    pub alpha_knee_neg: f64,
    /// Zero-lift angle [rad].
    pub alpha0: f64,
    /// Positive knee angle [rad].
    pub alpha_knee: f64,
    /// Positive stall angle [rad].
    pub alpha_max: f64,
    /// Lift-area slope on the linear segment [m^2/rad].
    pub slope: f64,
    /// Lift-area slope past the knees [m^2/rad].
    pub slope_post: f64,
}

impl AlphaBand {
    pub fn contains(&self, a: f64) -> bool {
        self.alpha_min <= a && a <= self.alpha_max
    }

    /// Lift area at alpha, `None` outside the stall bounds.
    pub fn lift_area(&self, a: f64) -> Option<f64> {
        let b = self;
        if b.alpha_knee_neg <= a && a <= b.alpha_knee {
            Some(b.slope * (a - b.alpha0))
        } else if a > b.alpha_knee && a <= b.alpha_max {
            Some(b.slope * (b.alpha_knee - b.alpha0) + b.slope_post * (a - b.alpha_knee))
        } else if a < b.alpha_knee_neg && a >= b.alpha_min {
            Some(b.slope * (b.alpha_knee_neg - b.alpha0) + b.slope_post * (a - b.alpha_knee_neg))
        } else {
            None
        }
    }

    /// Lift area at alpha with a post-stall roll-off to zero, and the
    /// linearly extended value used for induced drag. Defined for any
    /// alpha.
    pub fn lift_area_post_stall(&self, a: f64) -> (f64, f64) {
        let b = self;
        if b.alpha_min <= a && a <= b.alpha_max {
            let sl = match b.lift_area(a) {
                Some(sl) => sl,
                None => 0.0,
            };
            (sl, sl)
        } else if a > b.alpha_max {
            let sl_ext =
                b.slope * (b.alpha_knee - b.alpha0) + b.slope_post * (a - b.alpha_knee);
            // Lift falls linearly to zero at the mirrored zero-lift angle.
            let a0_stall = 2.0 * b.alpha_max - b.alpha0;
            let sl = if a < a0_stall {
                let sl_max = b.slope * (b.alpha_knee - b.alpha0)
                    + b.slope_post * (b.alpha_max - b.alpha_knee);
                sl_max * (1.0 - (a - b.alpha_max) / (a0_stall - b.alpha_max))
            } else {
                0.0
            };
            (sl, sl_ext)
        } else {
            let sl_ext = b.slope * (b.alpha_knee_neg - b.alpha0)
                + b.slope_post * (a - b.alpha_knee_neg);
            let a0m_stall = 2.0 * b.alpha_min - b.alpha0;
            let sl = if a > a0m_stall {
                let sl_min = b.slope * (b.alpha_knee_neg - b.alpha0)
                    + b.slope_post * (b.alpha_min - b.alpha_knee_neg);
                sl_min * (1.0 - (a - b.alpha_min) / (a0m_stall - b.alpha_min))
            } else {
                0.0
            };
            (sl, sl_ext)
        }
    }

    /// Alpha that balances `l(a) + t * sin(a) = w`, small-angle
    /// `sin(a) ~ a`. Closed form on each lift segment, with one re-solve
    /// when the linear-segment answer lands past a knee. `None` when the
    /// answer is past stall and `extend` is false; with `extend` the
    /// post-knee slopes continue outside the band.
    pub fn alpha_for_lift(&self, q: f64, t: f64, w: f64, extend: bool) -> Option<(f64, f64)> {
        let b = self;
        let a = (w + q * b.slope * b.alpha0) / (q * b.slope + t);
        if b.alpha_knee_neg <= a && a <= b.alpha_knee {
            Some((a, b.slope * (a - b.alpha0)))
        } else if a > b.alpha_knee {
            let a = (w - q * b.slope * (b.alpha_knee - b.alpha0)
                + q * b.slope_post * b.alpha_knee)
                / (q * b.slope_post + t);
            if a <= b.alpha_max || extend {
                Some((
                    a,
                    b.slope * (b.alpha_knee - b.alpha0) + b.slope_post * (a - b.alpha_knee),
                ))
            } else {
                None
            }
        } else {
            let a = (w - q * b.slope * (b.alpha_knee_neg - b.alpha0)
                + q * b.slope_post * b.alpha_knee_neg)
                / (q * b.slope_post + t);
            if a >= b.alpha_min || extend {
                Some((
                    a,
                    b.slope * (b.alpha_knee_neg - b.alpha0)
                        + b.slope_post * (a - b.alpha_knee_neg),
                ))
            } else {
                None
            }
        }
    }
}

/// Forces and angles balancing one path condition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathBalance {
    pub alpha: f64,
    pub lift_area: f64,
    pub lift: f64,
    pub drag_area: f64,
    pub drag: f64,
    /// Throttle setting reaching `thrust`, when within the thrust range.
    pub throttle: Option<f64>,
    pub thrust: f64,
    /// Bank angle of the lift plane off the path binormal [rad].
    pub bank: f64,
}

/// Result of the closed-form tangential drag balance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragBalance {
    pub alpha: f64,
    pub drag_area: f64,
    pub drag: f64,
    pub lift_area: f64,
    pub lift: f64,
}

/// Clamping policy for the path-balance fixed point. `thrust` clamps the
/// thrust into [0, t_ref] instead of failing; `alpha` clamps alpha into
/// the stall band.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bleed {
    pub thrust: bool,
    pub alpha: bool,
}

impl Bleed {
    pub const BOTH: Bleed = Bleed {
        thrust: true,
        alpha: true,
    };
}

/// Available thrust at the current operating point, military and
/// afterburner, plus an optional tighter reference bound.
#[derive(Debug, Clone, Copy)]
pub struct ThrustLimits {
    pub tmax: f64,
    pub tmax_ab: f64,
    pub tmax_ref: Option<f64>,
}

impl ThrustLimits {
    fn reference(&self) -> f64 {
        match self.tmax_ref {
            Some(tr) => tr.min(self.tmax_ab),
            None => self.tmax_ab,
        }
    }
}

/// Compressibility-corrected lift-curve model. Incompressible slopes come
/// from lifting-line theory off the aspect ratio; the Mach correction is
/// Prandtl-Glauert subsonic, a transonic plateau over M 0.85..1.05, and a
/// supersonic decay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AeroModel {
    wing_area: f64,
    alpha0_z: f64,
    alpha_knee_z: f64,
    alpha_stall_z: f64,
    slope_z: f64,
    slope_post_z: f64,
    induced_factor: f64,
}

impl AeroModel {
    pub fn new(params: &StaticAircraftParams) -> Self {
        let s = params.wing_area;
        let ar = params.aspect_ratio;
        let a0z = params.alpha0;
        let amaxz = params.alpha_stall;
        // Knee sits at 90% of the span for a reference aspect ratio of 8.
        let alpha_knee_z = a0z + 0.9 * (amaxz - a0z) * (ar / 8.0).sqrt();
        let cla_z = 2.0 * PI * (0.5 * ar / (1.0 + (1.0 + (0.5 * ar).powi(2)).sqrt()));
        let slope_z = cla_z * s;
        let slope_post_z = 0.25 * slope_z;
        let induced_factor = (1.0 / (PI * ar * params.oswald)) / s;
        Self {
            wing_area: s,
            alpha0_z: a0z,
            alpha_knee_z,
            alpha_stall_z: amaxz,
            slope_z,
            slope_post_z,
            induced_factor,
        }
    }

    pub fn wing_area(&self) -> f64 {
        self.wing_area
    }

    /// Induced drag factor; induced drag area is `k * sl^2`.
    pub fn induced_factor(&self) -> f64 {
        self.induced_factor
    }

    /// Incompressible zero-lift angle.
    pub fn alpha0(&self) -> f64 {
        self.alpha0_z
    }

    /// Incompressible stall angle.
    pub fn alpha_stall(&self) -> f64 {
        self.alpha_stall_z
    }

    /// Alpha band at a Mach number, with the flap detent shifting the
    /// incompressible band first.
    pub fn band(&self, mach: f64, flap: FlapDetent) -> AlphaBand {
        let a0z = self.alpha0_z + flap.d_alpha0;
        let a1z = self.alpha_knee_z + flap.d_alpha_stall;
        let amaxz = self.alpha_stall_z + flap.d_alpha_stall;

        let ma1 = 0.85;
        let ma2 = 1.05;
        let (k_slope, k_amax) = if mach < ma1 {
            let f = (1.0 - mach * mach).sqrt();
            (1.0 / f, f)
        } else if mach < ma2 {
            let f = (1.0 - ma1 * ma1).sqrt();
            (1.0 / f, f)
        } else {
            let f1 = (1.0 - ma1 * ma1).sqrt();
            let k_slope =
                (1.0 / f1) * (ma2 * ma2 - 1.0).sqrt() / (mach * mach - 1.0).sqrt();
            let k_amax =
                f1 * (ma2 * ma2 - 1.0).powf(0.1) / (mach * mach - 1.0).powf(0.1);
            (k_slope, k_amax)
        };

        let alpha0 = a0z;
        let alpha_knee = a0z + k_amax * (a1z - a0z);
        let alpha_max = a0z + k_amax * (amaxz - alpha0);
        let slope = self.slope_z * k_slope;
        let slope_post = self.slope_post_z * k_slope;
        let f_mirror = 0.5;
        let alpha_knee_neg = alpha0 - (alpha_knee - alpha0) * f_mirror;
        let alpha_min = alpha_knee_neg - (alpha_max - alpha_knee) * f_mirror;
        AlphaBand {
            alpha_min,
            alpha_knee_neg,
            alpha0,
            alpha_knee,
            alpha_max,
            slope,
            slope_post,
        }
    }

    /// Alpha balancing `t * cos(a) - d(a) + w_t = f_t`, quadratic in alpha
    /// with `cos(a) ~ 1 - a^2/2`, re-solved on the post-knee segments with
    /// their own drag polar. `None` when the discriminant is negative or
    /// alpha leaves the band (unless `extend`).
    pub fn alpha_for_drag_balance(
        &self,
        band: &AlphaBand,
        sd0: f64,
        q: f64,
        t: f64,
        wt: f64,
        ft: f64,
        extend: bool,
    ) -> Option<DragBalance> {
        let b = band;
        let ks = self.induced_factor;
        let (sla, sla1) = (b.slope, b.slope_post);
        let (a0, a1, a1m) = (b.alpha0, b.alpha_knee, b.alpha_knee_neg);

        let lower_root = |k2: f64, k1: f64, k0: f64| -> Option<f64> {
            let d = k1 * k1 - 4.0 * k2 * k0;
            if d >= 0.0 {
                Some((-k1 - d.sqrt()) / (2.0 * k2))
            } else {
                None
            }
        };

        let k2 = -0.5 * t - q * ks * sla * sla;
        let k1 = 2.0 * q * ks * sla * sla * a0;
        let k0 = t - q * sd0 - q * ks * sla * sla * a0 * a0 - (ft - wt);
        let mut a = lower_root(k2, k1, k0)?;
        let sl;
        if a1m <= a && a <= a1 {
            sl = sla * (a - a0);
        } else if a > a1 {
            let k2 = -0.5 * t - q * ks * sla1 * sla1;
            let k1 = -2.0 * q * ks * (sla * sla1 * (a1 - a0) - sla1 * sla1 * a1);
            let k0 = t
                - q * sd0
                - q * ks
                    * (sla * sla * (a1 - a0) * (a1 - a0)
                        - 2.0 * sla * sla1 * a1 * (a1 - a0)
                        + sla1 * sla1 * a1 * a1)
                - (ft - wt);
            a = lower_root(k2, k1, k0)?;
            if !(a <= b.alpha_max || extend) {
                return None;
            }
            sl = sla * (a1 - a0) + sla1 * (a - a1);
        } else {
            let k2 = -0.5 * t - q * ks * sla1 * sla1;
            let k1 = -2.0 * q * ks * (sla * sla1 * (a1m - a0) - sla1 * sla1 * a1m);
            let k0 = t
                - q * sd0
                - q * ks
                    * (sla * sla * (a1m - a0) * (a1m - a0)
                        - 2.0 * sla * sla1 * a1m * (a1m - a0)
                        + sla1 * sla1 * a1m * a1m)
                - (ft - wt);
            a = lower_root(k2, k1, k0)?;
            if !(a >= b.alpha_min || extend) {
                return None;
            }
            sl = sla * (a1m - a0) + sla1 * (a - a1m);
        }
        let sd = sd0 + ks * sl * sl;
        Some(DragBalance {
            alpha: a,
            drag_area: sd,
            drag: sd * q,
            lift_area: sl,
            lift: sl * q,
        })
    }

    /// Joint (alpha, thrust, bank) balancing a tangential force target and
    /// a banked normal force target:
    ///
    /// ```text
    ///   t cos(a) - d(a) + w_t = f_t
    ///   (l(a) + t sin(a)) sin(phi) + w_n = f_n
    ///   (l(a) + t sin(a)) cos(phi) + w_b = 0
    /// ```
    ///
    /// Bounded fixed point over alpha with a divergence detector; `None`
    /// when it departs, or the result leaves the alpha band or the thrust
    /// range and the corresponding bleed is off.
    #[allow(clippy::too_many_arguments)]
    pub fn solve_path_balance(
        &self,
        band: &AlphaBand,
        sd0: f64,
        q: f64,
        wt: f64,
        wn: f64,
        wb: f64,
        ft: f64,
        fnn: f64,
        thrust: &ThrustLimits,
        invert: bool,
        bleed: Bleed,
    ) -> Option<PathBalance> {
        let b = band;
        let ks = self.induced_factor;
        let eps = 0.001_f64.to_radians();
        let max_iter = 20;

        let sg = if invert { -1.0 } else { 1.0 };
        let phi = ((fnn - wn) * sg).atan2(wb * sg);
        let wr = if phi.sin().abs() > 0.5 {
            (fnn - wn) / phi.sin()
        } else {
            wb / phi.cos()
        };
        let tmax_ref = thrust.reference();
        let mut a = b.alpha0;
        let mut da: Option<f64> = None;
        let mut t = thrust.tmax;
        let mut sl = 0.0;
        let mut sd = sd0;
        let mut nit = 0;
        let mut found = false;
        loop {
            nit += 1;
            let ap = a;
            let dap = da;
            let (an, sln) = match b.alpha_for_lift(q, t, wr, true) {
                Some(r) => r,
                None => break,
            };
            a = an;
            sl = sln;
            sd = sd0 + ks * sl * sl;
            let d = q * sd;
            t = (ft - wt + d) / (1.0 - 0.5 * a * a);
            let dan = a - ap;
            if let Some(dap) = dap {
                if nit > 3 && dan.abs() > dap.abs() * 0.9 {
                    break;
                }
            }
            da = Some(dan);
            if dan.abs() < eps {
                found = true;
                break;
            }
            if nit >= max_iter {
                break;
            }
        }
        if bleed.thrust && !(0.0..=tmax_ref).contains(&t) {
            t = t.clamp(0.0, tmax_ref);
        }
        if bleed.alpha && !b.contains(a) {
            a = a.clamp(b.alpha_min, b.alpha_max);
            sl = match b.lift_area(a) {
                Some(sl) => sl,
                None => return None,
            };
            sd = sd0 + ks * sl * sl;
        }
        if !b.contains(a) || !(0.0..=tmax_ref).contains(&t) {
            found = false;
        }
        if !found {
            return None;
        }
        let throttle = throttle_from_thrust(t, thrust.tmax, thrust.tmax_ab);
        Some(PathBalance {
            alpha: a,
            lift_area: sl,
            lift: sl * q,
            drag_area: sd,
            drag: sd * q,
            throttle,
            thrust: t,
            bank: phi,
        })
    }

    /// The same force system expressed along a body-axis target frame, for
    /// callers that fix the attitude rather than the path. Bank is re-aimed
    /// from atan2 each iteration, with the quadrant forced by `invert`.
    #[allow(clippy::too_many_arguments)]
    pub fn solve_path_balance_along_axis(
        &self,
        band: &AlphaBand,
        sd0: f64,
        q: f64,
        wta: f64,
        wna: f64,
        wba: f64,
        ft: f64,
        fnn: f64,
        thrust: &ThrustLimits,
        invert: bool,
        bleed: Bleed,
    ) -> Option<PathBalance> {
        let b = band;
        let ks = self.induced_factor;
        let eps = 0.001_f64.to_radians();
        let max_iter = 20;

        let sg = if invert { -1.0 } else { 1.0 };
        let tmax_ref = thrust.reference();
        let mut a = b.alpha0;
        let mut t = thrust.tmax;
        let mut l = 0.0;
        let mut sl = 0.0;
        let mut sd = sd0;
        let mut d = sd0 * q;
        let mut phi = 0.0;
        let mut nit = 0;
        let mut found = false;
        loop {
            nit += 1;
            let ap = a;
            let sa = a;
            let ca = 1.0 - 0.5 * a * a;
            let ta = sa / ca;
            phi = (((ft + d) * ta + l + wna / ca) * sg).atan2(wba * sg);
            if !invert && phi < 0.0 {
                phi += PI;
            } else if invert && phi > 0.0 {
                phi -= PI;
            }
            let wr = fnn * phi.sin() - wta * sa - wna * ca;
            let (an, sln) = match b.alpha_for_lift(q, t, wr, true) {
                Some(r) => r,
                None => break,
            };
            a = an;
            sl = sln;
            sd = sd0 + ks * sl * sl;
            d = q * sd;
            l = sl * q;
            t = (ft + d) * ca + (fnn * phi.sin() - l) * sa - wta;
            if bleed.thrust {
                t = t.clamp(0.0, tmax_ref);
            }
            let ext_lo = b.alpha_min + (b.alpha_min - b.alpha_knee_neg);
            let ext_hi = b.alpha_max + (b.alpha_max - b.alpha_knee);
            if !((ext_lo < a && a < ext_hi) || bleed.alpha) {
                break;
            }
            if (a - ap).abs() < eps {
                found = true;
                break;
            }
            if nit >= max_iter {
                break;
            }
        }
        if bleed.alpha && !b.contains(a) {
            a = a.clamp(b.alpha_min, b.alpha_max);
            sl = match b.lift_area(a) {
                Some(sl) => sl,
                None => return None,
            };
            sd = sd0 + ks * sl * sl;
        }
        if !b.contains(a) || !(0.0..=tmax_ref).contains(&t) {
            found = false;
        }
        if !found {
            return None;
        }
        let throttle = throttle_from_thrust(t, thrust.tmax, thrust.tmax_ab);
        Some(PathBalance {
            alpha: a,
            lift_area: sl,
            lift: sl * q,
            drag_area: sd,
            drag: sd * q,
            throttle,
            thrust: t,
            bank: phi,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::StaticAircraftParams;
    use approx::assert_relative_eq;

    fn model() -> AeroModel {
        let params =
            StaticAircraftParams::from_yaml_str(crate::params::tests::TEST_YAML).unwrap();
        AeroModel::new(&params)
    }

    fn clean_band(mach: f64) -> AlphaBand {
        model().band(
            mach,
            FlapDetent {
                d_alpha0: 0.0,
                d_alpha_stall: 0.0,
                drag_ratio: 0.0,
            },
        )
    }

    #[test]
    fn test_band_ordering() {
        for mach in [0.2, 0.8, 0.9, 1.2, 1.8] {
            let b = clean_band(mach);
            assert!(b.alpha_min < b.alpha_knee_neg);
            assert!(b.alpha_knee_neg < b.alpha0);
            assert!(b.alpha0 < b.alpha_knee);
            assert!(b.alpha_knee < b.alpha_max);
            assert!(b.slope > 0.0 && b.slope_post > 0.0);
        }
    }

    #[test]
    fn test_band_transonic_plateau() {
        let b1 = clean_band(0.85);
        let b2 = clean_band(1.0);
        assert_relative_eq!(b1.slope, b2.slope);
        assert_relative_eq!(b1.alpha_max, b2.alpha_max);
        // Stall angle shrinks supersonic.
        let b3 = clean_band(1.6);
        assert!(b3.alpha_max < b2.alpha_max);
        assert!(b3.slope < b2.slope);
    }

    #[test]
    fn test_lift_linear_and_zero_at_alpha0() {
        let b = clean_band(0.4);
        assert_relative_eq!(b.lift_area(b.alpha0).unwrap(), 0.0, epsilon = 1e-12);
        let a_mid = 0.5 * (b.alpha0 + b.alpha_knee);
        assert_relative_eq!(
            b.lift_area(a_mid).unwrap(),
            b.slope * (a_mid - b.alpha0),
            epsilon = 1e-12
        );
        // Slope breaks at the knee.
        let da = 0.01;
        let up = b.lift_area(b.alpha_knee + da).unwrap() - b.lift_area(b.alpha_knee).unwrap();
        assert_relative_eq!(up, b.slope_post * da, epsilon = 1e-12);
        assert!(b.lift_area(b.alpha_max + 0.01).is_none());
        assert!(b.lift_area(b.alpha_min - 0.01).is_none());
    }

    #[test]
    fn test_post_stall_rolls_off_to_zero() {
        let b = clean_band(0.4);
        let (sl_at_stall, _) = b.lift_area_post_stall(b.alpha_max);
        assert!(sl_at_stall > 0.0);
        let a0_stall = 2.0 * b.alpha_max - b.alpha0;
        let (sl_far, sl_ext) = b.lift_area_post_stall(a0_stall + 0.1);
        assert_relative_eq!(sl_far, 0.0);
        assert!(sl_ext > sl_at_stall);
        // Continuous at the stall angle.
        let (sl_just_past, _) = b.lift_area_post_stall(b.alpha_max + 1e-9);
        assert_relative_eq!(sl_just_past, sl_at_stall, epsilon = 1e-6);
    }

    #[test]
    fn test_alpha_for_lift_inverts_lift_area() {
        let b = clean_band(0.5);
        let q = 0.5 * 1.225 * 200.0_f64.powi(2);
        let t = 60e3;
        for w in [8e4, 1.4e5, 2.0e5] {
            let (a, sl) = b.alpha_for_lift(q, t, w, false).unwrap();
            // The solved alpha reproduces the requested net vertical force.
            assert_relative_eq!(sl * q + t * a, w, epsilon = 1e-6 * w);
            assert_relative_eq!(b.lift_area(a).unwrap(), sl, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_alpha_for_lift_none_past_stall() {
        let b = clean_band(0.5);
        // Very low q forces alpha far past stall.
        let q = 0.5 * 1.225 * 30.0_f64.powi(2);
        let w = 14000.0 * 9.81;
        assert!(b.alpha_for_lift(q, 1e3, w, false).is_none());
        assert!(b.alpha_for_lift(q, 1e3, w, true).is_some());
    }

    #[test]
    fn test_drag_balance_level_consistency() {
        let m = model();
        let b = clean_band(0.5);
        let q = 0.5 * 1.225 * 170.0_f64.powi(2);
        let sd0 = 0.02 * m.wing_area();
        let t = 50e3;
        // Level flight: f_t = 0, w_t = 0 -> t cos a = d.
        let r = m
            .alpha_for_drag_balance(&b, sd0, q, t, 0.0, 0.0, false)
            .unwrap();
        let ca = 1.0 - 0.5 * r.alpha * r.alpha;
        assert_relative_eq!(t * ca, r.drag, epsilon = 1e-6 * t);
        assert!(b.contains(r.alpha));
    }

    #[test]
    fn test_path_balance_level_flight() {
        let m = model();
        let b = clean_band(0.6);
        let q = 0.5 * 1.225 * 200.0_f64.powi(2);
        let sd0 = 0.02 * m.wing_area();
        let w = 14000.0 * 9.81;
        let thrust = ThrustLimits {
            tmax: 100e3,
            tmax_ab: 160e3,
            tmax_ref: None,
        };
        // Straight and level: weight fully along the path binormal.
        let r = m
            .solve_path_balance(
                &b,
                sd0,
                q,
                0.0,
                0.0,
                w,
                0.0,
                0.0,
                &thrust,
                false,
                Bleed::default(),
            )
            .unwrap();
        assert!(b.contains(r.alpha));
        // Lift plus thrust component carries the weight.
        let lpt = r.lift + r.thrust * r.alpha;
        assert_relative_eq!(lpt * r.bank.sin().abs(), w, epsilon = 1e-2 * w);
        let tl = r.throttle.unwrap();
        assert!(tl > 0.0 && tl < 1.0);
    }

    #[test]
    fn test_path_balance_infeasible_without_bleed() {
        let m = model();
        let b = clean_band(0.3);
        // Hopeless: tiny q, huge normal force request.
        let q = 0.5 * 1.225 * 40.0_f64.powi(2);
        let sd0 = 0.02 * m.wing_area();
        let w = 18000.0 * 9.81;
        let thrust = ThrustLimits {
            tmax: 100e3,
            tmax_ab: 160e3,
            tmax_ref: None,
        };
        let r = m.solve_path_balance(
            &b,
            sd0,
            q,
            0.0,
            0.0,
            w,
            0.0,
            6.0 * w,
            &thrust,
            false,
            Bleed::default(),
        );
        assert!(r.is_none());
        // With both bleeds it clamps into the envelope instead.
        let r = m.solve_path_balance(
            &b,
            sd0,
            q,
            0.0,
            0.0,
            w,
            0.0,
            6.0 * w,
            &thrust,
            false,
            Bleed::BOTH,
        );
        if let Some(r) = r {
            assert!(b.contains(r.alpha));
            assert!(r.thrust <= 160e3);
        }
    }
}
