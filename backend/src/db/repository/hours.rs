//! Read-side repository trait.
//!
//! Every list operation returns rows in primary-key order; presentation
//! ordering is applied by the caller.

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::models::{
    DailyHoursId, DailyHoursWithOpening, PeriodId, PeriodWithOpenings, Target, TargetId,
};

/// Repository trait for read access to the opening-hours model.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` to work with async Rust; any number
/// of readers may call these methods concurrently.
#[async_trait]
pub trait HoursRepository: Send + Sync {
    /// Check if the database connection is healthy.
    ///
    /// # Returns
    /// - `Ok(true)` if connection is healthy
    /// - `Ok(false)` if connection is unhealthy but no error occurred
    /// - `Err(RepositoryError)` if an error occurred during the check
    async fn health_check(&self) -> RepositoryResult<bool>;

    // ==================== Targets ====================

    /// All targets, published or not.
    async fn list_targets(&self) -> RepositoryResult<Vec<Target>>;

    /// # Returns
    /// * `Err(RepositoryError::NotFound)` - If the target doesn't exist
    async fn get_target(&self, id: &TargetId) -> RepositoryResult<Target>;

    // ==================== Periods ====================

    /// All periods with their openings.
    async fn list_periods(&self) -> RepositoryResult<Vec<PeriodWithOpenings>>;

    /// # Returns
    /// * `Err(RepositoryError::NotFound)` - If the period doesn't exist
    async fn get_period(&self, id: &PeriodId) -> RepositoryResult<PeriodWithOpenings>;

    /// Periods owned by one target. Unknown targets yield an empty list.
    async fn periods_for_target(&self, target: &TargetId)
        -> RepositoryResult<Vec<PeriodWithOpenings>>;

    // ==================== Daily hours ====================

    async fn list_daily_hours(&self) -> RepositoryResult<Vec<DailyHoursWithOpening>>;

    /// # Returns
    /// * `Err(RepositoryError::NotFound)` - If the row doesn't exist
    async fn get_daily_hours(&self, id: DailyHoursId) -> RepositoryResult<DailyHoursWithOpening>;

    async fn daily_hours_for_target(
        &self,
        target: &TargetId,
    ) -> RepositoryResult<Vec<DailyHoursWithOpening>>;
}
