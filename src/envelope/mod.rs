//! Performance envelope derivation, tabulation and caching.

pub mod cache;
pub mod derive;
pub mod grid;
pub mod table;

pub use cache::{CacheKey, CacheStore};
pub use derive::{
    AltAnchors, DerivedData, DragSchedule, GearDerived, RangeFigure, RateLimits,
    RollEnvelope,
};
pub use grid::{EnvColumn, EnvPoint, EnvSpeedPoint, EnvelopeTableSet, EnvelopeTier};
pub use table::{Table1, Table2, Table3};
