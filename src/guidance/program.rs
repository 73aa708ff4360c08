//! Input shaping between guidance updates. Each shaped channel runs a
//! piecewise constant-acceleration rate profile planned at the update and
//! stepped tick by tick until the next one.

use crate::state::ControlDelta;
use crate::utils::solve_quad;

/// Rate profile of one control channel, as segments of constant rate
/// change. Stepping advances the profile clock and returns the channel
/// increment covered during the tick; a profile past its end contributes
/// nothing but keeps its final rate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelProgram {
    /// Segment boundary times, first one zero.
    knots: Vec<f64>,
    /// Rate change per segment, one fewer than knots.
    accels: Vec<f64>,
    clock: f64,
    moved: f64,
    rate: f64,
}

impl ChannelProgram {
    fn from_profile(knots: Vec<f64>, accels: Vec<f64>, rate0: f64) -> Self {
        Self {
            knots,
            accels,
            clock: 0.0,
            moved: 0.0,
            rate: rate0,
        }
    }

    /// Empty profile carrying a rate; steps return zero.
    pub fn hold(rate: f64) -> Self {
        Self {
            rate,
            ..Self::default()
        }
    }

    /// Channel rate at the profile clock [unit/s].
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Channel increment covered since planning.
    pub fn moved(&self) -> f64 {
        self.moved
    }

    /// Completion time of the profile [s].
    pub fn total_time(&self) -> f64 {
        self.knots.last().copied().unwrap_or(0.0)
    }

    /// Advances the profile by `dt` and returns the channel increment
    /// covered.
    pub fn step(&mut self, dt: f64) -> f64 {
        let mut dt = dt;
        let mut di = 0.0;
        for seg in 0..self.accels.len() {
            let t_lo = self.knots[seg];
            let t_hi = self.knots[seg + 1];
            let dt1 = dt.min(t_hi - self.clock);
            if 0.0 <= dt1 && dt1 <= t_hi - t_lo {
                let c = self.accels[seg];
                di += self.rate * dt1 + 0.5 * c * dt1 * dt1;
                self.rate += c * dt1;
                self.clock += dt1;
                dt -= dt1;
                if dt <= 0.0 {
                    break;
                }
            }
        }
        self.moved += di;
        di
    }
}

/// A planned channel profile with its timing figures.
#[derive(Debug, Clone)]
pub struct PlannedChannel {
    pub program: ChannelProgram,
    /// Time of the last rate-change switch [s].
    pub switch_time: f64,
    /// Completion time [s].
    pub total_time: f64,
}

struct Candidate {
    switch_time: f64,
    total_time: f64,
    knots: Vec<f64>,
    accels: Vec<f64>,
}

fn pick_fastest(cands: Vec<Candidate>, rate0: f64) -> Option<PlannedChannel> {
    let best = cands.into_iter().fold(None::<Candidate>, |best, c| {
        let better = match &best {
            None => true,
            Some(b) => {
                (c.switch_time, c.total_time) < (b.switch_time, b.total_time)
            }
        };
        if better {
            Some(c)
        } else {
            best
        }
    })?;
    Some(PlannedChannel {
        program: ChannelProgram::from_profile(best.knots, best.accels, rate0),
        switch_time: best.switch_time,
        total_time: best.total_time,
    })
}

/// Minimum-time profile moving a channel by `delta`, entering at rate
/// `rate0` and completing at rate `rate1`, under the rate cap `rate_max`
/// and the rate change cap `accel_max`.
///
/// Candidates are triangular bang-bang profiles (switch time from a
/// quadratic) and trapezoids saturating at the rate cap, over all sign
/// choices; the candidate with the earliest switch wins. `None` when no
/// candidate is feasible under the caps.
pub fn plan_min_time(
    delta: f64,
    rate0: f64,
    rate1: f64,
    rate_max: f64,
    accel_max: f64,
    eps: f64,
) -> Option<PlannedChannel> {
    let mut cands = Vec::new();

    for s in [1.0, -1.0] {
        let c = s * accel_max;
        let k2 = c * c;
        let k1 = 2.0 * c * (rate0 + rate1);
        let k0 = -(rate1 - rate0).powi(2) - 4.0 * c * delta;
        if let Some((r1, r2)) = solve_quad(k2, k1, k0) {
            for dtms in [r1, r2] {
                let dtma = 0.5 * (dtms + (rate1 - rate0) / c);
                let va = rate0 + c * dtma;
                if -eps <= dtma && dtma <= dtms + eps && va.abs() <= rate_max {
                    cands.push(Candidate {
                        switch_time: dtma,
                        total_time: dtms,
                        knots: vec![0.0, dtma, dtms],
                        accels: vec![c, -c],
                    });
                }
            }
        }
    }

    for s1 in [1.0, -1.0] {
        for s2 in [1.0, -1.0] {
            for s3 in [1.0, -1.0] {
                let vad = s1 * rate_max;
                let cd = s2 * accel_max;
                let ca = s3 * accel_max;
                let ka = s2 * s3;
                let dtms = (ca * delta + 0.5 * (vad - rate0).powi(2)
                    - 0.5 * ka * (rate1 - vad).powi(2))
                    / (ca * vad);
                let dtma = (vad - rate0) / ca;
                let dtmd = dtms - (rate1 - vad) / cd;
                if -eps <= dtma && dtma <= dtmd + eps && dtmd + eps <= dtms + 2.0 * eps {
                    cands.push(Candidate {
                        switch_time: dtmd,
                        total_time: dtms,
                        knots: vec![0.0, dtma, dtmd, dtms],
                        accels: vec![ca, 0.0, cd],
                    });
                }
            }
        }
    }

    pick_fastest(cands, rate0)
}

/// Profile moving a channel by `delta` in exactly `total` seconds, under
/// the same caps as [`plan_min_time`]. Used to stretch a channel that
/// would finish before the shared horizon. `None` when no profile fits
/// the fixed duration.
pub fn plan_in_time(
    delta: f64,
    rate0: f64,
    rate1: f64,
    rate_max: f64,
    accel_max: f64,
    total: f64,
) -> Option<PlannedChannel> {
    const EPSZ: f64 = 1e-10;
    let mut cands = Vec::new();

    let k2 = total * total;
    let k1 = 2.0 * (rate0 + rate1) * total - 4.0 * delta;
    let k0 = -(rate1 - rate0).powi(2);
    if let Some((r1, r2)) = solve_quad(k2, k1, k0) {
        for c in [r1, r2] {
            if c.abs() > EPSZ {
                let dtma = 0.5 * (total + (rate1 - rate0) / c);
                let va = rate0 + c * dtma;
                if 0.0 <= dtma && dtma <= total && va.abs() <= rate_max && c.abs() <= accel_max
                {
                    cands.push(Candidate {
                        switch_time: dtma,
                        total_time: total,
                        knots: vec![0.0, dtma, total],
                        accels: vec![c, -c],
                    });
                }
            } else if (total * rate0 - delta).abs() < 1e-5 * (delta + 1e-3) {
                // Constant-rate move already covers the request.
                cands.push(Candidate {
                    switch_time: total,
                    total_time: total,
                    knots: vec![0.0, total, total],
                    accels: vec![c, -c],
                });
            }
        }
    }

    for s1 in [1.0, -1.0] {
        for ka in [1.0, -1.0] {
            let vad = s1 * rate_max;
            let d0 = delta - vad * total;
            if d0.abs() > EPSZ {
                let cd = (0.5 * ka * vad * vad - 0.5 * (vad - rate0).powi(2)) / (ka * d0);
                let ca = ka * cd;
                if cd.abs() > EPSZ {
                    let dtma = (vad - rate0) / ca;
                    let dtmd = total - (rate1 - vad) / cd;
                    if 0.0 <= dtma && dtma <= dtmd && dtmd <= total && cd.abs() <= accel_max {
                        cands.push(Candidate {
                            switch_time: dtmd,
                            total_time: total,
                            knots: vec![0.0, dtma, dtmd, total],
                            accels: vec![ca, 0.0, cd],
                        });
                    }
                }
            }
        }
    }

    pick_fastest(cands, rate0)
}

/// Constant-rate profile covering `delta` at the unsigned `rate`.
pub fn plan_const_rate(delta: f64, rate: f64) -> ChannelProgram {
    if rate <= 0.0 || delta == 0.0 {
        return ChannelProgram::hold(0.0);
    }
    let total = (delta / rate).abs();
    ChannelProgram::from_profile(vec![0.0, total], vec![0.0], rate * delta.signum())
}

/// Caps and targets for one shaped channel at a guidance update.
#[derive(Debug, Clone, Copy)]
pub struct ChannelRequest {
    /// Requested channel increment over the program.
    pub delta: f64,
    /// Rate the channel should carry at completion [unit/s].
    pub end_rate: f64,
    /// Rate cap [unit/s].
    pub rate_max: f64,
    /// Rate change cap [unit/s^2].
    pub accel_max: f64,
}

impl ChannelRequest {
    pub fn new(delta: f64, end_rate: f64, rate_max: f64, accel_max: f64) -> Self {
        Self {
            delta,
            end_rate,
            rate_max,
            accel_max,
        }
    }
}

/// The four shaped input channels between two guidance updates. Alpha,
/// roll and throttle run minimum-time profiles; the airbrake runs at a
/// constant rate. The later of the alpha and roll switch times, clamped
/// to the caller's window, becomes the next update interval; channels
/// finishing before the relaxed interval are re-planned to fill it, so
/// the controls land together instead of the fast channels snapping.
#[derive(Debug, Clone, Default)]
pub struct InputProgram {
    update_time: f64,
    alpha: ChannelProgram,
    roll: ChannelProgram,
    throttle: ChannelProgram,
    airbrake: ChannelProgram,
}

impl InputProgram {
    pub fn idle() -> Self {
        Self::default()
    }

    /// Seeds the channel rates from the achieved physical rates, at
    /// context (re)initialization.
    pub fn seed_rates(&mut self, alpha_rate: f64, roll_rate: f64, throttle_rate: f64) {
        self.alpha = ChannelProgram::hold(alpha_rate);
        self.roll = ChannelProgram::hold(roll_rate);
        self.throttle = ChannelProgram::hold(throttle_rate);
        self.airbrake = ChannelProgram::hold(0.0);
        self.update_time = 0.0;
    }

    /// Interval until the next guidance update [s].
    pub fn update_time(&self) -> f64 {
        self.update_time
    }

    pub fn alpha_rate(&self) -> f64 {
        self.alpha.rate()
    }

    pub fn roll_rate(&self) -> f64 {
        self.roll.rate()
    }

    pub fn throttle_rate(&self) -> f64 {
        self.throttle.rate()
    }

    /// Alpha increment covered by the current program so far.
    pub fn alpha_moved(&self) -> f64 {
        self.alpha.moved()
    }

    /// Plans all four channels and returns the next update interval.
    ///
    /// A channel whose minimum-time plan is infeasible under its caps is
    /// held at its entry rate for this interval.
    #[allow(clippy::too_many_arguments)]
    pub fn replan(
        &mut self,
        alpha: &ChannelRequest,
        roll: &ChannelRequest,
        throttle: &ChannelRequest,
        airbrake_delta: f64,
        airbrake_rate: f64,
        update_min: f64,
        update_max: f64,
        relax: f64,
        eps: f64,
    ) -> f64 {
        let rate0_a = self.alpha.rate();
        let rate0_r = self.roll.rate();
        let rate0_tl = self.throttle.rate();

        let plan = |req: &ChannelRequest, rate0: f64| {
            plan_min_time(req.delta, rate0, req.end_rate, req.rate_max, req.accel_max, eps)
                .unwrap_or_else(|| PlannedChannel {
                    program: ChannelProgram::hold(rate0),
                    switch_time: 0.0,
                    total_time: 0.0,
                })
        };
        let mut pa = plan(alpha, rate0_a);
        let mut pr = plan(roll, rate0_r);
        let mut ptl = plan(throttle, rate0_tl);

        let update_time = pa
            .switch_time
            .max(pr.switch_time)
            .max(update_min)
            .min(update_max);
        let horizon = update_time * relax;

        let stretch = |p: &mut PlannedChannel, req: &ChannelRequest, rate0: f64| {
            if p.total_time < horizon {
                if let Some(rp) = plan_in_time(
                    req.delta,
                    rate0,
                    req.end_rate,
                    req.rate_max,
                    req.accel_max,
                    horizon,
                ) {
                    *p = rp;
                }
            }
        };
        stretch(&mut pa, alpha, rate0_a);
        stretch(&mut pr, roll, rate0_r);
        stretch(&mut ptl, throttle, rate0_tl);

        self.alpha = pa.program;
        self.roll = pr.program;
        self.throttle = ptl.program;
        self.airbrake = plan_const_rate(airbrake_delta, airbrake_rate);
        self.update_time = update_time;
        update_time
    }

    /// Advances all channels by one tick.
    pub fn step(&mut self, dt: f64) -> ControlDelta {
        ControlDelta {
            d_alpha: self.alpha.step(dt),
            d_roll: self.roll.step(dt),
            d_throttle: self.throttle.step(dt),
            d_airbrake: self.airbrake.step(dt),
            d_steer: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn run_out(program: &mut ChannelProgram, dt: f64) -> f64 {
        let n = (program.total_time() / dt).ceil() as usize + 5;
        let mut sum = 0.0;
        for _ in 0..n {
            sum += program.step(dt);
        }
        sum
    }

    #[test]
    fn test_min_time_zero_request_zero_profile() {
        let p = plan_min_time(0.0, 0.0, 0.0, 1.0, 1.0, 0.0).unwrap();
        assert_relative_eq!(p.total_time, 0.0);
        let mut prog = p.program;
        for _ in 0..10 {
            assert_relative_eq!(prog.step(0.05), 0.0);
        }
        assert_relative_eq!(prog.moved(), 0.0);
    }

    #[test]
    fn test_min_time_triangular_reaches_delta() {
        // Rate cap far away: triangular bang-bang, peak rate sqrt(c * d).
        let p = plan_min_time(0.5, 0.0, 0.0, 10.0, 0.5, 0.0).unwrap();
        assert_relative_eq!(p.total_time, 2.0, epsilon = 1e-9);
        assert_relative_eq!(p.switch_time, 1.0, epsilon = 1e-9);
        let mut prog = p.program;
        assert_relative_eq!(run_out(&mut prog, 0.01), 0.5, epsilon = 1e-9);
        assert_relative_eq!(prog.rate(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_min_time_trapezoid_reaches_delta() {
        // Rate cap binds: accelerate, cruise at the cap, decelerate.
        let p = plan_min_time(0.5, 0.0, 0.0, 0.2, 0.5, 0.0).unwrap();
        assert_relative_eq!(p.total_time, 2.9, epsilon = 1e-9);
        assert_relative_eq!(p.switch_time, 2.5, epsilon = 1e-9);
        let mut prog = p.program;
        assert_relative_eq!(run_out(&mut prog, 0.01), 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_in_time_stretches_to_horizon() {
        let fast = plan_min_time(0.5, 0.0, 0.0, 10.0, 0.5, 0.0).unwrap();
        let total = fast.total_time * 2.0;
        let p = plan_in_time(0.5, 0.0, 0.0, 10.0, 0.5, total).unwrap();
        assert_relative_eq!(p.total_time, total, epsilon = 1e-9);
        let mut prog = p.program;
        assert_relative_eq!(run_out(&mut prog, 0.01), 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_const_rate_signed() {
        let mut prog = plan_const_rate(-0.6, 0.3);
        assert_relative_eq!(prog.total_time(), 2.0, epsilon = 1e-12);
        assert_relative_eq!(run_out(&mut prog, 0.05), -0.6, epsilon = 1e-9);
    }

    #[test]
    fn test_replan_zero_deltas_stays_idle() {
        let mut inp = InputProgram::idle();
        let zero = ChannelRequest::new(0.0, 0.0, 1.0, 2.0);
        let dtmu = inp.replan(&zero, &zero, &zero, 0.0, 0.5, 0.5, 2.0, 0.9, 0.0);
        assert_relative_eq!(dtmu, 0.5);
        for _ in 0..20 {
            let d = inp.step(0.05);
            assert_relative_eq!(d.d_alpha, 0.0);
            assert_relative_eq!(d.d_roll, 0.0);
            assert_relative_eq!(d.d_throttle, 0.0);
            assert_relative_eq!(d.d_airbrake, 0.0);
        }
    }

    #[test]
    fn test_replan_carries_entry_rate() {
        let mut inp = InputProgram::idle();
        inp.seed_rates(0.1, 0.0, 0.0);
        assert_relative_eq!(inp.alpha_rate(), 0.1);
        let alpha = ChannelRequest::new(0.2, 0.0, 1.0, 2.0);
        let zero = ChannelRequest::new(0.0, 0.0, 1.0, 2.0);
        inp.replan(&alpha, &zero, &zero, 0.0, 0.5, 0.2, 2.0, 0.9, 0.0);
        let mut sum = 0.0;
        for _ in 0..200 {
            sum += inp.step(0.05).d_alpha;
        }
        assert_relative_eq!(sum, 0.2, epsilon = 1e-9);
        assert_relative_eq!(inp.alpha_moved(), 0.2, epsilon = 1e-9);
    }
}
