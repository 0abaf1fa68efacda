//! Repository trait definitions for database operations.
//!
//! Reads and writes are split across two traits so that the HTTP layer can
//! be reasoned about as read-only:
//!
//! - [`error`]: Error types for repository operations
//! - [`hours`]: Read access to targets, periods and daily hours
//! - [`ingest`]: Atomic writes used by the ingestion pipeline
//!
//! # Convenience Trait Bound
//!
//! For functions that need all repository capabilities, use the [`FullRepository`] trait bound:
//!
//! ```ignore
//! async fn reload<R: FullRepository>(repo: &R, target: &TargetId, periods: Vec<NewPeriod>) -> RepositoryResult<()> {
//!     repo.replace_target_schedule(target, periods).await?;
//!     let stored = repo.daily_hours_for_target(target).await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod hours;
pub mod ingest;

// Re-export error types
pub use error::{ErrorContext, RepositoryError, RepositoryResult};

// Re-export all traits
pub use hours::HoursRepository;
pub use ingest::{IngestRepository, ScheduleUpdate};

/// Composite trait bound for a complete repository implementation.
///
/// Automatically implemented for any type that implements both repository
/// traits.
pub trait FullRepository: HoursRepository + IngestRepository {}

// Blanket implementation: any type implementing both traits automatically implements FullRepository
impl<T> FullRepository for T where T: HoursRepository + IngestRepository {}
