mod errors;

pub use errors::DynamicsError;

use std::f64::consts::PI;

use nalgebra::Vector3;

/// Linear blend of y0..y1 as x moves across x0..x1, clamped outside.
pub fn lerp_clamped(x: f64, x0: f64, x1: f64, y0: f64, y1: f64) -> f64 {
    let u = ((x - x0) / (x1 - x0)).clamp(0.0, 1.0);
    y0 + (y1 - y0) * u
}

/// Cosine-eased blend of y0..y1 as x moves across x0..x1, clamped outside.
/// Flat slope at both ends.
pub fn cos_blend_clamped(x: f64, x0: f64, x1: f64, y0: f64, y1: f64) -> f64 {
    let u = ((x - x0) / (x1 - x0)).clamp(0.0, 1.0);
    y0 + (y1 - y0) * 0.5 * (1.0 - (u * PI).cos())
}

/// Hyperbolic falloff with f(0) = 1, f(1) = r, f(inf) = 0, for 0 < r < 1.
pub fn hyper_falloff(r: f64, x: f64) -> f64 {
    1.0 / (1.0 + ((1.0 - r) / r) * x)
}

/// Real roots of a*x^2 + b*x + c = 0, smaller root first.
/// Degenerates to the linear root when a is zero.
pub fn solve_quad(a: f64, b: f64, c: f64) -> Option<(f64, f64)> {
    if a != 0.0 {
        let d = b * b - 4.0 * a * c;
        if d < 0.0 {
            return None;
        }
        let rd = d.sqrt();
        let x1 = (-b - rd) / (2.0 * a);
        let x2 = (-b + rd) / (2.0 * a);
        if x1 <= x2 {
            Some((x1, x2))
        } else {
            Some((x2, x1))
        }
    } else if b != 0.0 {
        let x = -c / b;
        Some((x, x))
    } else {
        None
    }
}

/// Smallest strictly positive root of a*x^2 + b*x + c = 0.
pub fn solve_quad_min_pos(a: f64, b: f64, c: f64) -> Option<f64> {
    let (x1, x2) = solve_quad(a, b, c)?;
    if x1 > 0.0 {
        Some(x1)
    } else if x2 > 0.0 {
        Some(x2)
    } else {
        None
    }
}

/// Angle reduced to (-pi, pi].
pub fn norm_ang(ang: f64) -> f64 {
    let mut a = ang;
    while a <= -PI {
        a += 2.0 * PI;
    }
    while a > PI {
        a -= 2.0 * PI;
    }
    a
}

/// Shortest signed angular difference from one angle to another.
pub fn norm_ang_delta(from_ang: f64, to_ang: f64) -> f64 {
    let mut d = norm_ang(to_ang) - norm_ang(from_ang);
    if d > PI {
        d -= 2.0 * PI;
    }
    if d < -PI {
        d += 2.0 * PI;
    }
    d
}

/// Signed angle from `a` to `b` about `axis`, all assumed unit and the
/// vectors perpendicular to the axis.
pub fn signed_angle(a: &Vector3<f64>, b: &Vector3<f64>, axis: &Vector3<f64>) -> f64 {
    a.cross(b).dot(axis).atan2(a.dot(b))
}

/// `v` rotated by `ang` about `axis` (unit).
pub fn rotate_about(v: &Vector3<f64>, axis: &Vector3<f64>, ang: f64) -> Vector3<f64> {
    // Rodrigues rotation.
    let (s, c) = ang.sin_cos();
    v * c + axis.cross(v) * s + axis * (axis.dot(v) * (1.0 - c))
}

/// Unit vector, or the zero vector unchanged.
pub fn unit_or_zero(v: Vector3<f64>) -> Vector3<f64> {
    let n = v.norm();
    if n != 0.0 {
        v / n
    } else {
        v
    }
}

/// Solution of a pursuit intercept against a uniformly accelerating target.
#[derive(Debug, Clone, Copy)]
pub struct Intercept {
    /// Time to intercept [s].
    pub time: f64,
    /// Collision point.
    pub point: Vector3<f64>,
    /// Unit direction of the pursuer's free velocity component.
    pub dir: Vector3<f64>,
}

/// Time to intercept a target at `t_pos` moving with `t_vel` and constant
/// `t_acc`, by a pursuer from `i_pos` whose velocity is a fixed component
/// `i_fvel` plus a component of magnitude `i_dvel` along an unknown
/// direction, with acceleration split the same way (`i_facc`, `i_dacc`).
///
/// An approximate closed-form time is computed first, with higher-order
/// terms neglected. When it falls under `fine_time`, the higher-order terms
/// are folded back through a fixed point, stopping at `eps_time` or
/// `max_iter` or on divergence (approximate value kept in that case).
#[allow(clippy::too_many_arguments)]
pub fn intercept_time(
    t_pos: Vector3<f64>,
    t_vel: Vector3<f64>,
    t_acc: Vector3<f64>,
    i_pos: Vector3<f64>,
    i_fvel: Vector3<f64>,
    i_dvel: f64,
    i_facc: Vector3<f64>,
    i_dacc: f64,
    fine_time: f64,
    eps_time: f64,
    max_iter: usize,
) -> Option<Intercept> {
    let dpos = t_pos - i_pos;
    let dvel = t_vel - i_fvel;
    let dacc = t_acc - i_facc;
    let k0 = dpos.norm_squared();
    let k1 = 2.0 * dpos.dot(&dvel);
    let k2 = dvel.norm_squared() - i_dvel * i_dvel + dpos.dot(&dacc);
    let mut itime = solve_quad_min_pos(k2, k1, k0)?;

    if itime < fine_time {
        let k3 = dvel.dot(&dacc) - i_dvel * i_dacc;
        let k4 = 0.25 * (dacc.norm_squared() - i_dacc * i_dacc);
        let mut it = itime;
        let mut dit = itime * 1e3;
        let mut dit_p = itime * 2e3;
        let mut niter = 0;
        let mut diverged = false;
        while dit > eps_time && dit < dit_p && niter < max_iter {
            niter += 1;
            let it_p = it;
            dit_p = dit;
            let k0u = k0 + it.powi(3) * (k3 + k4 * it);
            match solve_quad_min_pos(k2, k1, k0u) {
                Some(it_n) => it = it_n,
                None => {
                    diverged = true;
                    break;
                }
            }
            dit = (it - it_p).abs();
        }
        if !diverged && dit <= dit_p {
            itime = it;
        }
    }

    let ith2 = 0.5 * itime * itime;
    let point = t_pos + t_vel * itime + t_acc * ith2;
    let free = (point - i_pos) - i_fvel * itime - i_facc * ith2;
    // An interceptor with no free velocity or acceleration has no firing
    // direction to aim.
    let reach = i_dvel * itime + i_dacc * ith2;
    if reach == 0.0 {
        return None;
    }
    let dir = unit_or_zero(free / reach);

    Some(Intercept {
        time: itime,
        point,
        dir,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_lerp_clamped_bounds() {
        assert_relative_eq!(lerp_clamped(-1.0, 0.0, 1.0, 2.0, 4.0), 2.0);
        assert_relative_eq!(lerp_clamped(0.5, 0.0, 1.0, 2.0, 4.0), 3.0);
        assert_relative_eq!(lerp_clamped(3.0, 0.0, 1.0, 2.0, 4.0), 4.0);
    }

    #[test]
    fn test_cos_blend_flat_ends() {
        assert_relative_eq!(cos_blend_clamped(0.0, 0.0, 1.0, 1.0, 3.0), 1.0);
        assert_relative_eq!(cos_blend_clamped(0.5, 0.0, 1.0, 1.0, 3.0), 2.0);
        assert_relative_eq!(cos_blend_clamped(1.0, 0.0, 1.0, 1.0, 3.0), 3.0);
    }

    #[test]
    fn test_solve_quad_ordering() {
        let (x1, x2) = solve_quad(1.0, -3.0, 2.0).unwrap();
        assert_relative_eq!(x1, 1.0);
        assert_relative_eq!(x2, 2.0);
        assert!(solve_quad(1.0, 0.0, 1.0).is_none());
        let (x1, x2) = solve_quad(0.0, 2.0, -4.0).unwrap();
        assert_relative_eq!(x1, 2.0);
        assert_relative_eq!(x2, 2.0);
    }

    #[test]
    fn test_norm_ang_delta_wraps() {
        use std::f64::consts::PI;
        assert_relative_eq!(norm_ang_delta(0.9 * PI, -0.9 * PI), 0.2 * PI, epsilon = 1e-12);
        assert_relative_eq!(norm_ang_delta(-0.9 * PI, 0.9 * PI), -0.2 * PI, epsilon = 1e-12);
    }

    #[test]
    fn test_signed_angle_quadrants() {
        let x = Vector3::x();
        let y = Vector3::y();
        let z = Vector3::z();
        assert_relative_eq!(signed_angle(&x, &y, &z), std::f64::consts::FRAC_PI_2);
        assert_relative_eq!(signed_angle(&y, &x, &z), -std::f64::consts::FRAC_PI_2);
    }

    #[test]
    fn test_rotate_about_axis() {
        let v = Vector3::x();
        let r = rotate_about(&v, &Vector3::z(), std::f64::consts::FRAC_PI_2);
        assert_relative_eq!(r.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(r.y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_intercept_head_on() {
        // Target closing head-on at 100 m/s from 1 km, pursuer at 200 m/s.
        let sol = intercept_time(
            Vector3::new(1000.0, 0.0, 0.0),
            Vector3::new(-100.0, 0.0, 0.0),
            Vector3::zeros(),
            Vector3::zeros(),
            Vector3::zeros(),
            200.0,
            Vector3::zeros(),
            0.0,
            0.0,
            1e-3,
            10,
        )
        .unwrap();
        assert_relative_eq!(sol.time, 1000.0 / 300.0, epsilon = 1e-9);
        assert_relative_eq!(sol.dir.x, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_intercept_inert_interceptor_rejected() {
        // Zero free speed and acceleration: the collision time exists (the
        // target runs over the origin at t = 10) but there is no direction
        // to aim, so no solution may come back.
        let sol = intercept_time(
            Vector3::new(1000.0, 0.0, 0.0),
            Vector3::new(-100.0, 0.0, 0.0),
            Vector3::zeros(),
            Vector3::zeros(),
            Vector3::zeros(),
            0.0,
            Vector3::zeros(),
            0.0,
            0.0,
            1e-3,
            10,
        );
        assert!(sol.is_none());
    }
}
