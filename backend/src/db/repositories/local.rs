//! In-memory local repository implementation.
//!
//! All tables live behind a single `parking_lot::RwLock`. Reads take the read
//! lock; every ingest operation validates, mutates and re-materializes daily
//! hours under one write lock, so readers never observe a half-applied
//! schedule.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use parking_lot::RwLock;

use crate::db::repository::*;
use crate::db::validation::{validate_schedule, validate_target_links};
use crate::models::{
    DailyHours, DailyHoursId, DailyHoursWithOpening, DataSource, DataSourceId, NewPeriod,
    NewTarget, Opening, OpeningId, Period, PeriodId, PeriodWithOpenings, Target, TargetId,
};
use crate::services::resolution::{materialize_daily_hours, ResolutionConflict};

/// In-memory local repository.
///
/// Suitable for tests and local development; cloning shares the same tables.
///
/// # Example
/// ```ignore
/// use hours::db::repositories::LocalRepository;
/// use hours::db::repository::HoursRepository;
///
/// #[tokio::test]
/// async fn test_empty() {
///     let repo = LocalRepository::new();
///     assert!(repo.list_targets().await.unwrap().is_empty());
/// }
/// ```
#[derive(Clone)]
pub struct LocalRepository {
    data: Arc<RwLock<LocalData>>,
}

struct LocalData {
    data_sources: BTreeMap<DataSourceId, DataSource>,
    targets: BTreeMap<TargetId, Target>,
    periods: BTreeMap<PeriodId, Period>,
    openings: BTreeMap<OpeningId, Opening>,
    daily_hours: BTreeMap<DailyHoursId, DailyHours>,

    // ID counters
    next_opening_id: i64,
    next_daily_hours_id: i64,

    // Connection health
    is_healthy: bool,
}

impl Default for LocalData {
    fn default() -> Self {
        Self {
            data_sources: BTreeMap::new(),
            targets: BTreeMap::new(),
            periods: BTreeMap::new(),
            openings: BTreeMap::new(),
            daily_hours: BTreeMap::new(),
            next_opening_id: 1,
            next_daily_hours_id: 1,
            is_healthy: true,
        }
    }
}

impl LocalData {
    fn check_health(&self) -> RepositoryResult<()> {
        if !self.is_healthy {
            return Err(RepositoryError::connection("Database is not healthy"));
        }
        Ok(())
    }

    fn target(&self, id: &TargetId) -> RepositoryResult<&Target> {
        self.targets.get(id).ok_or_else(|| {
            RepositoryError::not_found_with_context(
                format!("Target {} not found", id),
                ErrorContext::new("get_target")
                    .with_entity("target")
                    .with_entity_id(id),
            )
        })
    }

    fn with_openings(&self, period: &Period) -> PeriodWithOpenings {
        PeriodWithOpenings {
            period: period.clone(),
            openings: self
                .openings
                .values()
                .filter(|o| o.period == period.id)
                .cloned()
                .collect(),
        }
    }

    fn periods_of(&self, target: &TargetId) -> Vec<PeriodWithOpenings> {
        self.periods
            .values()
            .filter(|p| &p.target == target)
            .map(|p| self.with_openings(p))
            .collect()
    }

    fn with_opening(&self, daily_hours: &DailyHours) -> DailyHoursWithOpening {
        DailyHoursWithOpening {
            daily_hours: daily_hours.clone(),
            opening: daily_hours
                .opening
                .and_then(|id| self.openings.get(&id).cloned()),
        }
    }

    fn remove_period(&mut self, id: &PeriodId) -> Option<Period> {
        let removed = self.periods.remove(id)?;
        self.openings.retain(|_, o| &o.period != id);
        Some(removed)
    }

    /// Recompute `target`'s daily hours from its current periods and stamp
    /// `hours_updated`.
    fn rematerialize(
        &mut self,
        target: &TargetId,
        now: DateTime<Utc>,
    ) -> (usize, Vec<ResolutionConflict>) {
        self.daily_hours.retain(|_, row| &row.target != target);

        let periods = self.periods_of(target);
        let materialized = materialize_daily_hours(target, &periods);
        let count = materialized.rows.len();
        for row in materialized.rows {
            let id = DailyHoursId(self.next_daily_hours_id);
            self.next_daily_hours_id += 1;
            self.daily_hours.insert(
                id,
                DailyHours {
                    id,
                    date: row.date,
                    target: row.target,
                    opening: row.opening,
                },
            );
        }

        if let Some(stored) = self.targets.get_mut(target) {
            stored.hours_updated = Some(now);
        }
        (count, materialized.conflicts)
    }
}

impl LocalRepository {
    /// Create a new empty local repository.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(LocalData::default())),
        }
    }

    /// Set the health status for testing connection failures.
    pub fn set_healthy(&self, healthy: bool) {
        self.data.write().is_healthy = healthy;
    }

    /// Clear all data from the repository.
    pub fn clear(&self) {
        let mut data = self.data.write();
        *data = LocalData {
            is_healthy: data.is_healthy,
            ..Default::default()
        };
    }

    pub fn target_count(&self) -> usize {
        self.data.read().targets.len()
    }

    pub fn period_count(&self) -> usize {
        self.data.read().periods.len()
    }

    pub fn opening_count(&self) -> usize {
        self.data.read().openings.len()
    }

    pub fn daily_hours_count(&self) -> usize {
        self.data.read().daily_hours.len()
    }
}

impl Default for LocalRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HoursRepository for LocalRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        Ok(self.data.read().is_healthy)
    }

    async fn list_targets(&self) -> RepositoryResult<Vec<Target>> {
        let data = self.data.read();
        data.check_health()?;
        Ok(data.targets.values().cloned().collect())
    }

    async fn get_target(&self, id: &TargetId) -> RepositoryResult<Target> {
        let data = self.data.read();
        data.check_health()?;
        data.target(id).cloned()
    }

    async fn list_periods(&self) -> RepositoryResult<Vec<PeriodWithOpenings>> {
        let data = self.data.read();
        data.check_health()?;

        let mut grouped: HashMap<&PeriodId, Vec<Opening>> = HashMap::new();
        for opening in data.openings.values() {
            grouped.entry(&opening.period).or_default().push(opening.clone());
        }
        Ok(data
            .periods
            .values()
            .map(|period| PeriodWithOpenings {
                period: period.clone(),
                openings: grouped.remove(&period.id).unwrap_or_default(),
            })
            .collect())
    }

    async fn get_period(&self, id: &PeriodId) -> RepositoryResult<PeriodWithOpenings> {
        let data = self.data.read();
        data.check_health()?;
        data.periods
            .get(id)
            .map(|period| data.with_openings(period))
            .ok_or_else(|| {
                RepositoryError::not_found_with_context(
                    format!("Period {} not found", id),
                    ErrorContext::new("get_period")
                        .with_entity("period")
                        .with_entity_id(id),
                )
            })
    }

    async fn periods_for_target(
        &self,
        target: &TargetId,
    ) -> RepositoryResult<Vec<PeriodWithOpenings>> {
        let data = self.data.read();
        data.check_health()?;
        Ok(data.periods_of(target))
    }

    async fn list_daily_hours(&self) -> RepositoryResult<Vec<DailyHoursWithOpening>> {
        let data = self.data.read();
        data.check_health()?;
        Ok(data
            .daily_hours
            .values()
            .map(|row| data.with_opening(row))
            .collect())
    }

    async fn get_daily_hours(&self, id: DailyHoursId) -> RepositoryResult<DailyHoursWithOpening> {
        let data = self.data.read();
        data.check_health()?;
        data.daily_hours
            .get(&id)
            .map(|row| data.with_opening(row))
            .ok_or_else(|| {
                RepositoryError::not_found_with_context(
                    format!("Daily hours {} not found", id),
                    ErrorContext::new("get_daily_hours")
                        .with_entity("daily_hours")
                        .with_entity_id(id),
                )
            })
    }

    async fn daily_hours_for_target(
        &self,
        target: &TargetId,
    ) -> RepositoryResult<Vec<DailyHoursWithOpening>> {
        let data = self.data.read();
        data.check_health()?;
        Ok(data
            .daily_hours
            .values()
            .filter(|row| &row.target == target)
            .map(|row| data.with_opening(row))
            .collect())
    }
}

#[async_trait]
impl IngestRepository for LocalRepository {
    async fn upsert_data_source(&self, data_source: &DataSource) -> RepositoryResult<()> {
        let mut data = self.data.write();
        data.check_health()?;
        data.data_sources
            .insert(data_source.id.clone(), data_source.clone());
        Ok(())
    }

    async fn upsert_target(&self, target: &NewTarget) -> RepositoryResult<Target> {
        let mut data = self.data.write();
        data.check_health()?;

        let id = target.id();
        if !data.data_sources.contains_key(&target.data_source) {
            return Err(RepositoryError::integrity_with_context(
                format!("Unknown data source {}", target.data_source),
                ErrorContext::new("upsert_target")
                    .with_entity("target")
                    .with_entity_id(&id),
            ));
        }
        validate_target_links(target, |link| {
            Ok(data
                .targets
                .get(link)
                .map(|t| t.parents().cloned().collect()))
        })?;

        let now = Utc::now();
        let (created, hours_updated) = match data.targets.get(&id) {
            Some(existing) => (existing.created_time, existing.hours_updated),
            None => (now, None),
        };
        let stored = target.clone().into_target(created, now, hours_updated);
        data.targets.insert(id, stored.clone());
        debug!("Upserted target {}", stored.id);
        Ok(stored)
    }

    async fn replace_target_schedule(
        &self,
        target: &TargetId,
        periods: Vec<NewPeriod>,
    ) -> RepositoryResult<ScheduleUpdate> {
        let mut data = self.data.write();
        data.check_health()?;
        data.target(target)
            .map_err(|e| e.with_operation("replace_target_schedule"))?;
        validate_schedule(target, &periods)?;

        for period in &periods {
            let period_id = period.id();
            if !data.data_sources.contains_key(&period.data_source) {
                return Err(RepositoryError::integrity_with_context(
                    format!("Unknown data source {} for period {}", period.data_source, period_id),
                    ErrorContext::new("replace_target_schedule")
                        .with_entity("period")
                        .with_entity_id(&period_id),
                ));
            }
            if let Some(existing) = data.periods.get(&period_id) {
                if &existing.target != target {
                    return Err(RepositoryError::integrity_with_context(
                        format!("Period {} belongs to target {}", period_id, existing.target),
                        ErrorContext::new("replace_target_schedule")
                            .with_entity("period")
                            .with_entity_id(&period_id),
                    ));
                }
            }
        }

        // Validation passed; nothing below can fail.
        let now = Utc::now();
        let previous: Vec<PeriodId> = data
            .periods
            .values()
            .filter(|p| &p.target == target)
            .map(|p| p.id.clone())
            .collect();
        let mut created_times = HashMap::new();
        for id in previous {
            if let Some(removed) = data.remove_period(&id) {
                created_times.insert(removed.id, removed.created_time);
            }
        }

        let period_count = periods.len();
        let mut opening_count = 0;
        for new_period in periods {
            let (mut period, openings) = new_period.into_period(target.clone(), now);
            if let Some(created) = created_times.get(&period.id) {
                period.created_time = *created;
            }
            for new_opening in openings {
                let id = OpeningId(data.next_opening_id);
                data.next_opening_id += 1;
                data.openings
                    .insert(id, new_opening.into_opening(id, period.id.clone(), now));
                opening_count += 1;
            }
            data.periods.insert(period.id.clone(), period);
        }

        let (daily_hours, conflicts) = data.rematerialize(target, now);
        info!(
            "Replaced schedule of {}: {} periods, {} openings, {} daily hours",
            target, period_count, opening_count, daily_hours
        );
        Ok(ScheduleUpdate {
            target: target.clone(),
            periods: period_count,
            openings: opening_count,
            daily_hours,
            hours_updated: now,
            conflicts,
        })
    }

    async fn delete_period(&self, id: &PeriodId) -> RepositoryResult<ScheduleUpdate> {
        let mut data = self.data.write();
        data.check_health()?;
        let removed = data.remove_period(id).ok_or_else(|| {
            RepositoryError::not_found_with_context(
                format!("Period {} not found", id),
                ErrorContext::new("delete_period")
                    .with_entity("period")
                    .with_entity_id(id),
            )
        })?;

        let now = Utc::now();
        let target = removed.target;
        let (daily_hours, conflicts) = data.rematerialize(&target, now);
        let periods = data.periods.values().filter(|p| p.target == target).count();
        let openings = data
            .openings
            .values()
            .filter(|o| data.periods.get(&o.period).is_some_and(|p| p.target == target))
            .count();
        info!("Deleted period {} of {}", id, target);
        Ok(ScheduleUpdate {
            target,
            periods,
            openings,
            daily_hours,
            hours_updated: now,
            conflicts,
        })
    }

    async fn delete_target(&self, id: &TargetId) -> RepositoryResult<()> {
        let mut data = self.data.write();
        data.check_health()?;
        if data.targets.remove(id).is_none() {
            return Err(RepositoryError::not_found_with_context(
                format!("Target {} not found", id),
                ErrorContext::new("delete_target")
                    .with_entity("target")
                    .with_entity_id(id),
            ));
        }

        let owned: Vec<PeriodId> = data
            .periods
            .values()
            .filter(|p| &p.target == id)
            .map(|p| p.id.clone())
            .collect();
        for period in &owned {
            data.remove_period(period);
        }
        data.daily_hours.retain(|_, row| &row.target != id);

        for other in data.targets.values_mut() {
            if other.parent.as_ref() == Some(id) {
                other.parent = None;
            }
            if other.second_parent.as_ref() == Some(id) {
                other.second_parent = None;
            }
            if other.same_as.as_ref() == Some(id) {
                other.same_as = None;
            }
        }
        info!("Deleted target {} with {} periods", id, owned.len());
        Ok(())
    }
}
