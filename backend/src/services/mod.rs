//! Service layer: pure opening-hours logic and ingestion orchestration.
//!
//! Nothing here touches storage directly; [`resolution`] and [`ordering`]
//! work on in-memory values and [`seed`] goes through the repository traits.

pub mod ordering;
pub mod resolution;
pub mod seed;

pub use ordering::{apply_ordering, parse_ordering, OrderKey, Orderable, OrderingError};
pub use resolution::{
    materialize_daily_hours, resolve_date, spans_for_date, Materialized, Resolution,
    ResolutionConflict,
};
pub use seed::{seed, SeedDocument, SeedReport, TargetSchedule};
