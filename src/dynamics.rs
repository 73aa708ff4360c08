use std::path::Path;

use tracing::info;

use crate::aero::{AeroModel, AlphaBand, ThrustLimits};
use crate::atmosphere::{AirSample, AtmosphereModel};
use crate::envelope::derive::{self, DerivedData, DragSchedule};
use crate::envelope::grid::{EnvPoint, EnvSpeedPoint, EnvelopeTableSet};
use crate::envelope::{CacheKey, CacheStore};
use crate::params::{FlapsSetting, StaticAircraftParams, Tuning};
use crate::propulsion::{MaxThrust, PropulsionModel};
use crate::utils::DynamicsError;

/// The constituent models, bundled for the derivation and solver layers.
pub(crate) struct ModelSet {
    pub params: StaticAircraftParams,
    pub tuning: Tuning,
    pub atmosphere: AtmosphereModel,
    pub aero: AeroModel,
    pub propulsion: PropulsionModel,
}

impl ModelSet {
    fn new(params: StaticAircraftParams, tuning: Tuning) -> Result<Self, DynamicsError> {
        params.validate()?;
        let atmosphere = AtmosphereModel::new(params.atmosphere);
        let aero = AeroModel::new(&params);
        let propulsion = PropulsionModel::new(&params, &tuning);
        Ok(Self {
            params,
            tuning,
            atmosphere,
            aero,
            propulsion,
        })
    }
}

/// Aerodynamic and propulsive context at one operating point, with the
/// configuration drag already folded into the zero-lift area.
pub(crate) struct OpPoint {
    pub air: AirSample,
    pub mach: f64,
    pub q: f64,
    pub band: AlphaBand,
    pub sched: DragSchedule,
    pub sd0: f64,
    pub thrust: MaxThrust,
}

impl OpPoint {
    pub fn limits(&self) -> ThrustLimits {
        ThrustLimits {
            tmax: self.thrust.mil,
            tmax_ab: self.thrust.ab,
            tmax_ref: None,
        }
    }
}

/// Performance solver for one aircraft type. Owns the constituent models,
/// the derived reference data and the tabulated envelope; states are passed
/// in and out of the stepping and solving calls.
pub struct AircraftDynamics {
    pub(crate) models: ModelSet,
    pub(crate) derived: DerivedData,
    pub(crate) tables: EnvelopeTableSet,
}

impl AircraftDynamics {
    /// Builds the solver, deriving reference data and envelope tables or
    /// loading them from `cache_root` when a matching cache entry exists.
    pub fn new(
        params: StaticAircraftParams,
        tuning: Tuning,
        cache_root: Option<&Path>,
    ) -> Result<Self, DynamicsError> {
        let models = ModelSet::new(params, tuning)?;
        let (derived, tables) = match cache_root {
            Some(root) => {
                let store = CacheStore::new(root, &models.params.name);
                let key = CacheKey::new(&models.params, &models.tuning);
                let derived =
                    store.load_or_compute("basedat", &key, || derive::derive(&models))?;
                let tables = store.load_or_compute("envtab", &key, || {
                    EnvelopeTableSet::build(&models, &derived)
                })?;
                (derived, tables)
            }
            None => {
                let derived = derive::derive(&models)?;
                let tables = EnvelopeTableSet::build(&models, &derived)?;
                (derived, tables)
            }
        };
        info!(
            name = %models.params.name,
            range_km = derived.range.distance * 1e-3,
            "aircraft dynamics ready"
        );
        Ok(Self {
            models,
            derived,
            tables,
        })
    }

    pub fn params(&self) -> &StaticAircraftParams {
        &self.models.params
    }

    pub fn atmosphere(&self) -> &AtmosphereModel {
        &self.models.atmosphere
    }

    pub fn derived(&self) -> &DerivedData {
        &self.derived
    }

    /// Aerodynamic context at altitude `h` and speed `v` in the given
    /// configuration.
    pub(crate) fn op_point(
        &self,
        h: f64,
        v: f64,
        flaps: FlapsSetting,
        airbrake: f64,
        gear_down: bool,
    ) -> OpPoint {
        let p = &self.models.params;
        let air = self.models.atmosphere.sample(h);
        let mach = v / air.speed_of_sound;
        let q = 0.5 * air.density * v * v;
        let detent = p.flap_detent(flaps);
        let band = self.models.aero.band(mach, detent);
        let sched = self.derived.drag_schedule(p, h);
        let mut sd0 = sched.zero_lift_area(v, air.speed_of_sound);
        sd0 += sched.flap_drag(detent);
        sd0 += sched.d_airbrake * airbrake;
        if gear_down {
            sd0 += sched.d_gear;
        }
        let thrust = self
            .models
            .propulsion
            .max_thrust(h, &air, sched.vmax, sched.vmax_ab, v);
        OpPoint {
            air,
            mach,
            q,
            band,
            sched,
            sd0,
            thrust,
        }
    }

    /// Usable alpha range at an operating point and flap setting.
    pub fn alpha_bounds(&self, h: f64, v: f64, flaps: FlapsSetting) -> AlphaBand {
        self.op_point(h, v, flaps, 0.0, false).band
    }

    /// Load factor bounds at mass `m`.
    pub fn max_load_factor(&self, m: f64) -> (f64, f64) {
        DerivedData::load_limits(&self.models.params, m)
    }

    /// Specific fuel consumption at an operating point and throttle.
    pub fn current_sfc(&self, h: f64, v: f64, throttle: f64) -> f64 {
        let air = self.models.atmosphere.sample(h);
        let sched = self.derived.drag_schedule(&self.models.params, h);
        self.models
            .propulsion
            .sfc(h, &air, sched.vmax, sched.vmax_ab, v, throttle)
            .0
    }

    /// Indicated airspeed for a true airspeed at altitude.
    pub fn indicated_airspeed(&self, h: f64, v: f64) -> f64 {
        let air = self.models.atmosphere.sample(h);
        self.models.atmosphere.indicated_airspeed(v, &air)
    }

    /// Envelope summary at mass and altitude for a throttle tier.
    pub fn envelope(&self, with_ab: bool, m: f64, h: f64) -> EnvPoint {
        self.tables.tier(with_ab).envelope(m, h)
    }

    /// Per-speed envelope figures at mass and altitude for a throttle tier.
    pub fn envelope_at_speed(&self, with_ab: bool, m: f64, h: f64, v: f64) -> EnvSpeedPoint {
        self.tables.tier(with_ab).envelope_at_speed(m, h, v)
    }

    /// Service ceiling at mass for a throttle tier.
    pub fn ceiling(&self, with_ab: bool, m: f64) -> f64 {
        self.tables.tier(with_ab).ceiling(m)
    }
}
