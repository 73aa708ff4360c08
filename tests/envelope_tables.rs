//! Envelope derivation, tabulation and disk cache behavior.

mod common;

use approx::assert_relative_eq;
use skydyn::{AircraftDynamics, StaticAircraftParams, Tuning};

#[test]
fn test_vmin_grows_and_vmax_shrinks_with_mass() {
    let dynamics = common::fighter();
    let h = 4000.0;
    let masses = [11500.0, 13500.0, 15500.0, 17500.0, 19500.0];
    for ab in [false, true] {
        let mut prev = dynamics.envelope(ab, masses[0], h);
        for &m in &masses[1..] {
            let env = dynamics.envelope(ab, m, h);
            assert!(
                env.vmin >= prev.vmin - 1e-6,
                "vmin dropped with mass: {} -> {} at m={}",
                prev.vmin,
                env.vmin,
                m
            );
            assert!(
                env.vmax <= prev.vmax + 1e-6,
                "vmax grew with mass: {} -> {} at m={}",
                prev.vmax,
                env.vmax,
                m
            );
            assert!(env.vmin < env.vmax);
            prev = env;
        }
    }
}

#[test]
fn test_afterburner_tier_dominates() {
    let dynamics = common::fighter();
    for &h in &[0.0, 5000.0, 10000.0] {
        let mil = dynamics.envelope(false, 14000.0, h);
        let ab = dynamics.envelope(true, 14000.0, h);
        assert!(ab.vmax >= mil.vmax - 1e-6);
        assert!(ab.climb_max >= mil.climb_max - 1e-6);
        assert!(ab.turn_sust_max >= mil.turn_sust_max - 1e-6);
    }
    assert!(dynamics.ceiling(true, 14000.0) >= dynamics.ceiling(false, 14000.0) - 1e-6);
    assert!(dynamics.ceiling(true, 19000.0) <= dynamics.ceiling(true, 12000.0) + 1e-6);
}

#[test]
fn test_speed_envelope_consistent_with_scalars() {
    let dynamics = common::fighter();
    let (m, h) = (14000.0, 3000.0);
    let env = dynamics.envelope(true, m, h);
    // At the optimal turn speeds the per-speed rates come close to the
    // per-altitude maxima.
    let at_inst = dynamics.envelope_at_speed(true, m, h, env.v_opt_turn_inst);
    assert!(at_inst.turn_inst <= env.turn_inst_max * 1.05);
    assert!(at_inst.turn_inst >= env.turn_inst_max * 0.7);
    let at_sust = dynamics.envelope_at_speed(true, m, h, env.v_opt_turn_sust);
    assert!(at_sust.turn_sust <= env.turn_sust_max * 1.05);
    assert!(at_sust.turn_sust >= env.turn_sust_max * 0.7);
}

#[test]
fn test_cache_round_trip_reproduces_tables() {
    let dir = tempfile::tempdir().unwrap();
    let params = StaticAircraftParams::from_yaml_str(common::FIGHTER_YAML).unwrap();
    let first = AircraftDynamics::new(params, Tuning::default(), Some(dir.path())).unwrap();

    let written: Vec<_> = std::fs::read_dir(dir.path().join("mig29"))
        .unwrap()
        .collect();
    assert!(!written.is_empty(), "cache directory left empty");

    let params = StaticAircraftParams::from_yaml_str(common::FIGHTER_YAML).unwrap();
    let second = AircraftDynamics::new(params, Tuning::default(), Some(dir.path())).unwrap();

    for &(m, h) in &[(12000.0, 0.0), (14000.0, 5000.0), (18000.0, 9000.0)] {
        let a = first.envelope(true, m, h);
        let b = second.envelope(true, m, h);
        assert_relative_eq!(a.vmin, b.vmin, max_relative = 1e-12);
        assert_relative_eq!(a.vmax, b.vmax, max_relative = 1e-12);
        assert_relative_eq!(a.climb_max, b.climb_max, max_relative = 1e-12);
        assert_relative_eq!(a.turn_inst_max, b.turn_inst_max, max_relative = 1e-12);
    }
}

#[test]
fn test_cache_key_tracks_parameter_changes() {
    let dir = tempfile::tempdir().unwrap();
    let params = StaticAircraftParams::from_yaml_str(common::FIGHTER_YAML).unwrap();
    let stock = AircraftDynamics::new(params, Tuning::default(), Some(dir.path())).unwrap();

    // More thrust under the same cache root: the stale tables must be
    // recomputed, not loaded.
    let uprated_yaml = common::FIGHTER_YAML
        .replace("thrust_mil: 100000.0", "thrust_mil: 130000.0")
        .replace("vmax_mil_sl: 320.0", "vmax_mil_sl: 360.0")
        .replace("vmax_mil_tropo: 310.0", "vmax_mil_tropo: 350.0");
    let uprated_params = StaticAircraftParams::from_yaml_str(&uprated_yaml).unwrap();
    let uprated =
        AircraftDynamics::new(uprated_params, Tuning::default(), Some(dir.path())).unwrap();

    let before = stock.envelope(false, 14000.0, 0.0);
    let after = uprated.envelope(false, 14000.0, 0.0);
    assert!(
        after.vmax > before.vmax + 1.0,
        "uprated engine did not change cached vmax: {} vs {}",
        before.vmax,
        after.vmax
    );
}
