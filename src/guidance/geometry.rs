//! Path geometry for the guidance laws.

use nalgebra::Vector3;

/// Radius reported for a locally straight path.
pub const INF_RADIUS: f64 = 1e30;

/// Horizontal circular arc blended with a vertical pitch arc, parameterized
/// by arc length. The horizontal radius `radius`, the swept angle `sweep`
/// (signed, sign picks the turn direction) and the vertical radius
/// `pitch_radius` (signed, positive pitches up) shape the curve; it starts
/// at `p0` with tangent `t0`.
#[derive(Debug, Clone, Copy)]
pub struct ArcedHelix {
    r: f64,
    sweep: f64,
    ka: f64,
    rp: f64,
    a0: f64,
    pc: Vector3<f64>,
    b0: f64,
    sb0: f64,
    cb0: f64,
}

impl ArcedHelix {
    pub fn new(
        radius: f64,
        sweep: f64,
        pitch_radius: f64,
        p0: Vector3<f64>,
        t0: Vector3<f64>,
    ) -> Self {
        let ka = if sweep < 0.0 { -1.0 } else { 1.0 };
        let t0_h = (t0.x * t0.x + t0.y * t0.y).sqrt();
        let a0 = (-t0.x).atan2(t0.y * ka);
        let pc = p0 - Vector3::new(radius * a0.cos(), radius * a0.sin() * ka, 0.0);
        let b0 = t0.z.atan2(t0_h);
        Self {
            r: radius.abs(),
            sweep: sweep.abs(),
            ka,
            rp: pitch_radius,
            a0,
            pc,
            b0,
            sb0: b0.sin(),
            cb0: b0.cos(),
        }
    }

    /// Horizontal sweep angle at arc length `s`.
    fn param(&self, s: f64) -> f64 {
        (self.rp / self.r) * ((s / self.rp + self.b0).sin() - self.sb0)
    }

    fn deriv1(&self, a: f64) -> Vector3<f64> {
        let sb = (self.r / self.rp) * a + self.sb0;
        let ka = self.ka;
        Vector3::new(
            -self.r * ((self.a0 + a) * ka).sin() * ka,
            self.r * ((self.a0 + a) * ka).cos() * ka,
            self.r * sb / (1.0 - sb * sb).sqrt(),
        )
    }

    fn deriv2(&self, a: f64) -> Vector3<f64> {
        let sb = (self.r / self.rp) * a + self.sb0;
        let ka = self.ka;
        Vector3::new(
            -self.r * ((self.a0 + a) * ka).cos() * ka * ka,
            -self.r * ((self.a0 + a) * ka).sin() * ka * ka,
            (self.r * self.r / self.rp) / (1.0 - sb * sb).powf(1.5),
        )
    }

    pub fn point(&self, s: f64) -> Vector3<f64> {
        let a = self.param(s);
        let sb = (self.r / self.rp) * a + self.sb0;
        self.pc
            + Vector3::new(
                self.r * ((self.a0 + a) * self.ka).cos(),
                self.r * ((self.a0 + a) * self.ka).sin(),
                self.rp * (self.cb0 - (1.0 - sb * sb).sqrt()),
            )
    }

    /// Unit tangent at arc length `s`.
    pub fn tangent(&self, s: f64) -> Vector3<f64> {
        self.deriv1(self.param(s)).normalize()
    }

    /// Unit principal normal at arc length `s`, toward the turn center.
    pub fn normal(&self, s: f64) -> Vector3<f64> {
        let a = self.param(s);
        let d1 = self.deriv1(a);
        let d2 = self.deriv2(a);
        (d2 * d1.dot(&d1) - d1 * d1.dot(&d2)).normalize()
    }

    /// Curvature radius at arc length `s`, [`INF_RADIUS`] when straight.
    pub fn radius(&self, s: f64) -> f64 {
        let a = self.param(s);
        let d1 = self.deriv1(a);
        let d2 = self.deriv2(a);
        let k = d1.cross(&d2).norm() / d1.norm().powi(3);
        if k > 0.0 {
            1.0 / k
        } else {
            INF_RADIUS
        }
    }

    /// Arc length over the full sweep.
    pub fn length(&self) -> f64 {
        let sb = (self.r / self.rp) * self.sweep + self.sb0;
        (self.rp * (sb.asin() - self.b0)).abs()
    }
}

/// Shrinks a climb/turn rate pair so the two demands share the available
/// performance, each rate normalized by its maximum and weighted by
/// `wt_climb` (climb share, turn takes the rest). A rate already under its
/// share is left alone.
pub fn correct_turn_climb(
    climb: f64,
    turn: f64,
    climb_max: f64,
    turn_max: f64,
    wt_climb: f64,
) -> (f64, f64) {
    debug_assert!((0.0..=1.0).contains(&wt_climb));
    let wt_turn = 1.0 - wt_climb;
    let c1 = climb.abs() / climb_max;
    let t1 = turn.abs() / turn_max;
    let eps = 1e-6;
    let c2 = (c1 * wt_climb) / (c1 * wt_climb + t1 * wt_turn + eps);
    let t2 = (t1 * wt_turn) / (t1 * wt_turn + c1 * wt_climb + eps);
    let climb_c = if c2 < c1 {
        c2 * climb_max * climb.signum()
    } else {
        climb
    };
    let turn_c = if t2 < t1 {
        t2 * turn_max * turn.signum()
    } else {
        turn
    };
    (climb_c, turn_c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_arced_helix_flat_turn_frame() {
        // Quarter circle of 1 km radius, nearly no pitch arc.
        let hx = ArcedHelix::new(
            1000.0,
            FRAC_PI_2,
            1e9,
            Vector3::zeros(),
            Vector3::y(),
        );
        let t = hx.tangent(0.0);
        assert_relative_eq!(t.y, 1.0, epsilon = 1e-9);
        let n = hx.normal(0.0);
        assert_relative_eq!(n.x, -1.0, epsilon = 1e-6);
        assert_relative_eq!(hx.radius(0.0), 1000.0, max_relative = 1e-5);
    }

    #[test]
    fn test_arced_helix_pitch_up() {
        let hx = ArcedHelix::new(
            1000.0,
            FRAC_PI_2,
            2000.0,
            Vector3::zeros(),
            Vector3::y(),
        );
        assert!(hx.tangent(100.0).z > 0.0);
        assert!(hx.point(100.0).z > 0.0);
        assert!(hx.length() > 0.0);
    }

    #[test]
    fn test_correct_turn_climb_shares() {
        let (c, t) = correct_turn_climb(30.0, 0.3, 30.0, 0.3, 0.5);
        assert_relative_eq!(c, 15.0, max_relative = 1e-4);
        assert_relative_eq!(t, 0.15, max_relative = 1e-4);
        // One demand idle: the other keeps nearly all of its share.
        let (c, t) = correct_turn_climb(0.0, 0.3, 30.0, 0.3, 0.5);
        assert_relative_eq!(c, 0.0);
        assert_relative_eq!(t, 0.3, max_relative = 1e-4);
    }
}
