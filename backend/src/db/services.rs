//! High-level database service layer.
//!
//! Repository-agnostic operations used by the HTTP handlers and the
//! binaries. Visibility rules (unpublished targets) and the checks that tie
//! stored daily hours back to the resolution rules live here, so every
//! backend behaves the same.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use log::{info, warn};

use super::repository::{
    ErrorContext, FullRepository, HoursRepository, RepositoryError, RepositoryResult,
    ScheduleUpdate,
};
use crate::models::{
    DailyHoursId, DailyHoursWithOpening, NewPeriod, Opening, OpeningId, PeriodId,
    PeriodWithOpenings, Status, Target, TargetId, TimeSpan,
};
use crate::services::resolution::{
    materialize_daily_hours, resolve_date, spans_for_date, ResolutionConflict,
};

// ==================== Health & Connection ====================

/// Check if the database connection is healthy.
pub async fn health_check<R: HoursRepository + ?Sized>(repo: &R) -> RepositoryResult<bool> {
    repo.health_check().await
}

// ==================== Targets ====================

/// Targets visible at `now`, in primary-key order.
pub async fn list_targets<R: HoursRepository + ?Sized>(
    repo: &R,
    include_unpublished: bool,
    now: DateTime<Utc>,
) -> RepositoryResult<Vec<Target>> {
    let targets = repo.list_targets().await?;
    if include_unpublished {
        return Ok(targets);
    }
    Ok(targets.into_iter().filter(|t| t.is_published(now)).collect())
}

/// A single target; hidden targets are reported as not found.
pub async fn get_target<R: HoursRepository + ?Sized>(
    repo: &R,
    id: &TargetId,
    include_unpublished: bool,
    now: DateTime<Utc>,
) -> RepositoryResult<Target> {
    let target = repo.get_target(id).await?;
    if include_unpublished || target.is_published(now) {
        Ok(target)
    } else {
        Err(RepositoryError::not_found_with_context(
            format!("Target {} not found", id),
            ErrorContext::new("get_target")
                .with_entity("target")
                .with_entity_id(id)
                .with_details("unpublished"),
        ))
    }
}

// ==================== Periods & daily hours ====================

async fn hidden_targets<R: HoursRepository + ?Sized>(
    repo: &R,
    include_unpublished: bool,
    now: DateTime<Utc>,
) -> RepositoryResult<BTreeSet<TargetId>> {
    if include_unpublished {
        return Ok(BTreeSet::new());
    }
    Ok(repo
        .list_targets()
        .await?
        .into_iter()
        .filter(|t| !t.is_published(now))
        .map(|t| t.id)
        .collect())
}

/// Periods visible at `now`: the period itself and its target are published.
pub async fn list_periods<R: HoursRepository + ?Sized>(
    repo: &R,
    include_unpublished: bool,
    now: DateTime<Utc>,
) -> RepositoryResult<Vec<PeriodWithOpenings>> {
    let mut periods = repo.list_periods().await?;
    if include_unpublished {
        return Ok(periods);
    }
    let hidden = hidden_targets(repo, include_unpublished, now).await?;
    periods.retain(|p| p.period.is_published(now) && !hidden.contains(&p.period.target));
    Ok(periods)
}

pub async fn get_period<R: HoursRepository + ?Sized>(
    repo: &R,
    id: &PeriodId,
    include_unpublished: bool,
    now: DateTime<Utc>,
) -> RepositoryResult<PeriodWithOpenings> {
    let period = repo.get_period(id).await?;
    if !include_unpublished && !period.period.is_published(now) {
        return Err(RepositoryError::not_found_with_context(
            format!("Period {} not found", id),
            ErrorContext::new("get_period")
                .with_entity("period")
                .with_entity_id(id)
                .with_details("unpublished"),
        ));
    }
    get_target(repo, &period.period.target, include_unpublished, now)
        .await
        .map_err(|e| hide_owner(e, "get_period", "period", id))?;
    Ok(period)
}

/// Daily hours rows whose target is visible at `now`.
pub async fn list_daily_hours<R: HoursRepository + ?Sized>(
    repo: &R,
    include_unpublished: bool,
    now: DateTime<Utc>,
) -> RepositoryResult<Vec<DailyHoursWithOpening>> {
    let hidden = hidden_targets(repo, include_unpublished, now).await?;
    let mut rows = repo.list_daily_hours().await?;
    rows.retain(|row| !hidden.contains(&row.daily_hours.target));
    Ok(rows)
}

pub async fn get_daily_hours<R: HoursRepository + ?Sized>(
    repo: &R,
    id: DailyHoursId,
    include_unpublished: bool,
    now: DateTime<Utc>,
) -> RepositoryResult<DailyHoursWithOpening> {
    let row = repo.get_daily_hours(id).await?;
    get_target(repo, &row.daily_hours.target, include_unpublished, now)
        .await
        .map_err(|e| hide_owner(e, "get_daily_hours", "daily_hours", id))?;
    Ok(row)
}

/// A hidden owner hides the row itself.
fn hide_owner(
    err: RepositoryError,
    operation: &str,
    entity: &str,
    id: impl ToString,
) -> RepositoryError {
    if !err.is_not_found() {
        return err;
    }
    let id = id.to_string();
    RepositoryError::not_found_with_context(
        format!("{} {} not found", entity, id),
        ErrorContext::new(operation)
            .with_entity(entity)
            .with_entity_id(id)
            .with_details("target unpublished"),
    )
}

// ==================== Resolution ====================

/// Owned outcome of resolving one target on one date.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDay {
    pub target: TargetId,
    pub date: NaiveDate,
    pub period: Option<PeriodId>,
    pub status: Status,
    pub openings: Vec<Opening>,
    /// Open spans clipped to `date`, including the previous night's tail.
    pub spans: Vec<TimeSpan>,
    pub conflict: Option<ResolutionConflict>,
}

/// Resolve `target` on `date` from its stored periods.
pub async fn resolve_target_date<R: HoursRepository + ?Sized>(
    repo: &R,
    target: &TargetId,
    date: NaiveDate,
) -> RepositoryResult<ResolvedDay> {
    repo.get_target(target).await?;
    let periods = repo.periods_for_target(target).await?;
    let resolution = resolve_date(&periods, date);

    Ok(ResolvedDay {
        target: target.clone(),
        date,
        period: resolution.period.map(|p| p.id.clone()),
        status: resolution.status,
        openings: resolution.openings.iter().map(|o| (*o).clone()).collect(),
        spans: spans_for_date(&periods, date),
        conflict: resolution.conflict.clone(),
    })
}

/// Dates on which the stored daily hours of `target` differ from what the
/// resolution rules derive from its current periods. Empty when consistent.
pub async fn verify_daily_hours<R: HoursRepository + ?Sized>(
    repo: &R,
    target: &TargetId,
) -> RepositoryResult<Vec<NaiveDate>> {
    let periods = repo.periods_for_target(target).await?;
    let stored = repo.daily_hours_for_target(target).await?;

    let mut expected: BTreeMap<NaiveDate, BTreeSet<Option<OpeningId>>> = BTreeMap::new();
    for row in materialize_daily_hours(target, &periods).rows {
        expected.entry(row.date).or_default().insert(row.opening);
    }
    let mut actual: BTreeMap<NaiveDate, BTreeSet<Option<OpeningId>>> = BTreeMap::new();
    for row in stored {
        actual
            .entry(row.daily_hours.date)
            .or_default()
            .insert(row.daily_hours.opening);
    }

    let dates: BTreeSet<NaiveDate> = expected.keys().chain(actual.keys()).copied().collect();
    let mismatched: Vec<NaiveDate> = dates
        .into_iter()
        .filter(|date| expected.get(date) != actual.get(date))
        .collect();
    if !mismatched.is_empty() {
        warn!(
            "Daily hours of {} are stale on {} dates",
            target,
            mismatched.len()
        );
    }
    Ok(mismatched)
}

// ==================== Ingestion ====================

/// Replace a target's schedule and report ambiguous dates.
pub async fn replace_target_schedule<R: FullRepository + ?Sized>(
    repo: &R,
    target: &TargetId,
    periods: Vec<NewPeriod>,
) -> RepositoryResult<ScheduleUpdate> {
    let update = repo.replace_target_schedule(target, periods).await?;
    if !update.conflicts.is_empty() {
        warn!(
            "Schedule of {} has {} dates with equally specific periods",
            target,
            update.conflicts.len()
        );
    }
    info!(
        "Schedule of {} rebuilt: {} daily hours rows",
        target, update.daily_hours
    );
    Ok(update)
}
