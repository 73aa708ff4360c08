//! Aircraft performance and flight-control solver for combat flight
//! simulation.
//!
//! The crate models a fixed-wing aircraft as a point mass flying along a
//! path: a standard atmosphere, a lift/drag model over an alpha band with
//! post-stall extension, and a two-tier thrust model. From the static
//! parameters it derives the performance envelope over mass and altitude
//! (with and without afterburner) and caches the tables on disk keyed by a
//! parameter hash.
//!
//! On top of the models sit the solvers: trim, the path-attitude solvers
//! turning a desired path frame into control deltas, the air and ground
//! integration step, and the guidance laws (pursuit, turn capture, evade)
//! that shape their commands through per-channel input programs.
//!
//! [`AircraftDynamics`] is the entry point; one instance serves any number
//! of aircraft of its type.

pub mod aero;
pub mod atmosphere;
pub mod dynamics;
pub mod envelope;
pub mod guidance;
pub mod params;
pub mod path;
pub mod propulsion;
pub mod state;
pub mod utils;

mod integrate;

pub use aero::{AeroModel, AlphaBand, Bleed, PathBalance};
pub use atmosphere::AtmosphereModel;
pub use dynamics::AircraftDynamics;
pub use envelope::{DerivedData, EnvPoint, EnvSpeedPoint, RateLimits};
pub use guidance::{
    GuidanceContext, GuidanceController, GuidanceMode, GuidanceOutput, GuidanceTarget,
    ProjectileModel,
};
pub use params::{FlapsSetting, GroundSurface, StaticAircraftParams, Tuning};
pub use path::{AttitudeTarget, PathDeltas, PathOptions, PathTarget};
pub use state::{ControlDelta, DynamicState, GroundContact, StepAux};
pub use utils::DynamicsError;
