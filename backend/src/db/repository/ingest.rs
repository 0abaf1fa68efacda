//! Write-side repository trait used by the ingestion pipeline.
//!
//! No HTTP route reaches these methods. Each method is one atomic unit: a
//! reader observes either the state before it or the state after it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::RepositoryResult;
use crate::models::{DataSource, NewPeriod, NewTarget, PeriodId, Target, TargetId};
use crate::services::resolution::ResolutionConflict;

/// Outcome of rewriting one target's schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleUpdate {
    pub target: TargetId,
    pub periods: usize,
    pub openings: usize,
    pub daily_hours: usize,
    pub hours_updated: DateTime<Utc>,
    /// Dates whose winning period was picked by a secondary tie-break.
    pub conflicts: Vec<ResolutionConflict>,
}

#[async_trait]
pub trait IngestRepository: Send + Sync {
    /// Insert or rename a data source.
    async fn upsert_data_source(&self, data_source: &DataSource) -> RepositoryResult<()>;

    /// Insert or update a target keyed by `"{data_source}:{origin_id}"`.
    ///
    /// # Returns
    /// * `Err(RepositoryError::IntegrityViolation)` - unknown data source,
    ///   dangling or self-referencing links, or a parent cycle
    async fn upsert_target(&self, target: &NewTarget) -> RepositoryResult<Target>;

    /// Replace every period (and opening) of `target` with `periods`, then
    /// recompute its daily hours and stamp `hours_updated`, all in one unit.
    async fn replace_target_schedule(
        &self,
        target: &TargetId,
        periods: Vec<NewPeriod>,
    ) -> RepositoryResult<ScheduleUpdate>;

    /// Delete one period and its openings, recomputing the owner's daily hours.
    async fn delete_period(&self, id: &PeriodId) -> RepositoryResult<ScheduleUpdate>;

    /// Delete a target with everything it owns. Links from other targets
    /// pointing at it are cleared.
    async fn delete_target(&self, id: &TargetId) -> RepositoryResult<()>;
}
