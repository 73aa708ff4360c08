use serde::{Deserialize, Serialize};

use crate::params::AtmosphereParams;
use crate::utils::lerp_clamped;

/// Air properties at one altitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AirSample {
    /// Gravitational acceleration [m/s^2].
    pub g: f64,
    /// Density [kg/m^3].
    pub density: f64,
    /// Density relative to sea level.
    pub density_ratio: f64,
    /// Static pressure [Pa].
    pub pressure: f64,
    /// Pressure relative to sea level.
    pub pressure_ratio: f64,
    /// Speed of sound [m/s].
    pub speed_of_sound: f64,
}

/// Exponential atmosphere with a linear speed-of-sound drop to the
/// tropopause and constant speed of sound above it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AtmosphereModel {
    params: AtmosphereParams,
    /// gamma / (gamma - 1), cached for the impact-pressure relation.
    k_gamma: f64,
}

impl AtmosphereModel {
    pub fn new(params: AtmosphereParams) -> Self {
        let k_gamma = params.gamma / (params.gamma - 1.0);
        Self { params, k_gamma }
    }

    pub fn params(&self) -> &AtmosphereParams {
        &self.params
    }

    pub fn k_gamma(&self) -> f64 {
        self.k_gamma
    }

    /// Air properties at altitude `h` [m].
    pub fn sample(&self, h: f64) -> AirSample {
        let p = &self.params;
        let density = p.rho0 * (p.rho_exp * h).exp();
        let pressure = p.p0 * (p.p_exp * h).exp();
        let sound_fac = lerp_clamped(h, 0.0, p.h_tropo, 1.0, p.sound_tropo_ratio);
        AirSample {
            g: p.g0,
            density,
            density_ratio: density / p.rho0,
            pressure,
            pressure_ratio: pressure / p.p0,
            speed_of_sound: p.sound0 * sound_fac,
        }
    }

    /// Indicated airspeed from true airspeed at altitude, through the
    /// compressible impact pressure referred to sea-level conditions.
    pub fn indicated_airspeed(&self, v: f64, air: &AirSample) -> f64 {
        let p = &self.params;
        let kg = self.k_gamma;
        let q = 0.5 * air.density * v * v;
        let qc = air.pressure * ((q / (air.pressure * kg) + 1.0).powf(kg) - 1.0);
        ((p.p0 / p.rho0) * 2.0 * kg * ((qc / p.p0 + 1.0).powf(1.0 / kg) - 1.0)).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn model() -> AtmosphereModel {
        AtmosphereModel::new(AtmosphereParams::default())
    }

    #[test]
    fn test_sea_level_values() {
        let air = model().sample(0.0);
        assert_relative_eq!(air.density, 1.225);
        assert_relative_eq!(air.pressure, 1.013e5);
        assert_relative_eq!(air.speed_of_sound, 340.0);
        assert_relative_eq!(air.density_ratio, 1.0);
    }

    #[test]
    fn test_density_monotonically_decreasing() {
        let m = model();
        let mut prev = f64::INFINITY;
        for h in (0..30).map(|i| i as f64 * 1000.0) {
            let air = m.sample(h);
            assert!(air.density < prev);
            assert!(air.pressure > 0.0);
            prev = air.density;
        }
    }

    #[test]
    fn test_speed_of_sound_continuous_at_tropopause() {
        let m = model();
        let ht = m.params().h_tropo;
        let below = m.sample(ht - 1e-6).speed_of_sound;
        let at = m.sample(ht).speed_of_sound;
        let above = m.sample(ht + 1e-6).speed_of_sound;
        assert_relative_eq!(below, at, epsilon = 1e-6);
        assert_relative_eq!(above, at, epsilon = 1e-12);
        // Constant above the tropopause.
        assert_relative_eq!(m.sample(ht + 9000.0).speed_of_sound, at);
    }

    #[test]
    fn test_ias_matches_tas_at_sea_level() {
        let m = model();
        let air = m.sample(0.0);
        for v in [50.0, 150.0, 300.0] {
            assert_relative_eq!(m.indicated_airspeed(v, &air), v, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_ias_below_tas_at_altitude() {
        let m = model();
        let air = m.sample(8000.0);
        let v = 250.0;
        let ias = m.indicated_airspeed(v, &air);
        assert!(ias < v);
        assert!(ias > 0.5 * v);
    }
}
