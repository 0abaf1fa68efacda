//! Postgres repository implementation using Diesel.
//!
//! Referential integrity is enforced by the schema (see `migrations/`):
//! periods, openings and daily hours cascade from their owners, links
//! between targets are set to NULL when the referenced target goes away and
//! `period_start <= period_end` is a CHECK constraint. Every ingest
//! operation runs inside a single `conn.transaction`. Schedule writes lock
//! the owning target row first, and target upserts run SERIALIZABLE so the
//! parent-cycle check cannot race another upsert.
//!
//! ## Configuration
//!
//! Environment variables:
//! - `DATABASE_URL` or `PG_DATABASE_URL`: Connection string (required)
//! - `PG_POOL_MAX`: Maximum pool size (default: 10)
//! - `PG_POOL_MIN`: Minimum pool size (default: 1)
//! - `PG_CONN_TIMEOUT_SEC`: Connection timeout in seconds (default: 30)
//! - `PG_IDLE_TIMEOUT_SEC`: Idle connection timeout in seconds (default: 600)
//! - `PG_MAX_RETRIES`: Maximum retry attempts for transient failures (default: 3)
//! - `PG_RETRY_DELAY_MS`: Initial retry delay in milliseconds (default: 100)

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sql_query;
use diesel::upsert::excluded;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use log::{debug, info};
use tokio::task;

use crate::db::repository::*;
use crate::db::validation::{validate_schedule, validate_target_links};
use crate::models::{
    DailyHoursId, DailyHoursWithOpening, DataSource, NewPeriod, NewTarget, Opening, PeriodId,
    PeriodWithOpenings, Target, TargetId,
};
use crate::services::resolution::{materialize_daily_hours, ResolutionConflict};

mod models;
mod schema;

use models::*;
use schema::*;

type PgPool = Pool<ConnectionManager<PgConnection>>;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("src/db/repositories/postgres/migrations");

/// Rows per INSERT statement; keeps bind parameters well under the
/// Postgres limit of 65535.
const INSERT_CHUNK: usize = 5000;

/// Configuration for connecting to Postgres.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL
    pub database_url: String,
    /// Maximum number of connections in the pool
    pub max_pool_size: u32,
    /// Minimum number of connections in the pool
    pub min_pool_size: u32,
    /// Connection timeout in seconds
    pub connection_timeout_sec: u64,
    /// Idle connection timeout in seconds
    pub idle_timeout_sec: u64,
    /// Maximum number of retry attempts for transient failures
    pub max_retries: u32,
    /// Initial retry delay in milliseconds (doubles with each retry)
    pub retry_delay_ms: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            max_pool_size: 10,
            min_pool_size: 1,
            connection_timeout_sec: 30,
            idle_timeout_sec: 600,
            max_retries: 3,
            retry_delay_ms: 100,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl PostgresConfig {
    /// Create configuration from environment variables.
    ///
    /// Unparsable numeric values fall back to their defaults.
    pub fn from_env() -> Result<Self, String> {
        let database_url = std::env::var("DATABASE_URL")
            .or_else(|_| std::env::var("PG_DATABASE_URL"))
            .map_err(|_| "DATABASE_URL or PG_DATABASE_URL must be set".to_string())?;

        let defaults = Self::default();
        Ok(Self {
            database_url,
            max_pool_size: env_or("PG_POOL_MAX", defaults.max_pool_size),
            min_pool_size: env_or("PG_POOL_MIN", defaults.min_pool_size),
            connection_timeout_sec: env_or("PG_CONN_TIMEOUT_SEC", defaults.connection_timeout_sec),
            idle_timeout_sec: env_or("PG_IDLE_TIMEOUT_SEC", defaults.idle_timeout_sec),
            max_retries: env_or("PG_MAX_RETRIES", defaults.max_retries),
            retry_delay_ms: env_or("PG_RETRY_DELAY_MS", defaults.retry_delay_ms),
        })
    }

    /// Create a new configuration with a database URL.
    pub fn with_url(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            ..Default::default()
        }
    }
}

/// Pool health statistics.
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    /// Number of connections currently in use
    pub connections_in_use: u32,
    /// Number of idle connections
    pub idle_connections: u32,
    /// Total number of connections in the pool
    pub total_connections: u32,
    /// Maximum pool size
    pub max_size: u32,
    /// Total successful queries executed
    pub total_queries: u64,
    /// Total failed queries
    pub failed_queries: u64,
    /// Total retried operations
    pub retried_operations: u64,
}

/// Diesel-backed repository for Postgres.
#[derive(Clone, Debug)]
pub struct PostgresRepository {
    pool: PgPool,
    config: PostgresConfig,
    total_queries: Arc<AtomicU64>,
    failed_queries: Arc<AtomicU64>,
    retried_operations: Arc<AtomicU64>,
}

impl PostgresRepository {
    /// Create a new repository and run pending migrations.
    pub fn new(config: PostgresConfig) -> RepositoryResult<Self> {
        let manager = ConnectionManager::<PgConnection>::new(&config.database_url);

        let pool = Pool::builder()
            .max_size(config.max_pool_size)
            .min_idle(Some(config.min_pool_size))
            .connection_timeout(Duration::from_secs(config.connection_timeout_sec))
            .idle_timeout(Some(Duration::from_secs(config.idle_timeout_sec)))
            .test_on_check_out(true)
            .build(manager)
            .map_err(|e| {
                RepositoryError::connection_with_context(
                    e.to_string(),
                    ErrorContext::new("create_pool")
                        .with_details(format!("max_size={}", config.max_pool_size)),
                )
            })?;

        {
            let mut conn = pool.get().map_err(|e| {
                RepositoryError::connection_with_context(
                    e.to_string(),
                    ErrorContext::new("get_connection_for_migrations"),
                )
            })?;
            Self::run_migrations(&mut conn)?;
        }
        info!(
            "Postgres repository ready (pool max={}, min={})",
            config.max_pool_size, config.min_pool_size
        );

        Ok(Self {
            pool,
            config,
            total_queries: Arc::new(AtomicU64::new(0)),
            failed_queries: Arc::new(AtomicU64::new(0)),
            retried_operations: Arc::new(AtomicU64::new(0)),
        })
    }

    fn run_migrations(conn: &mut PgConnection) -> RepositoryResult<()> {
        conn.run_pending_migrations(MIGRATIONS).map_err(|e| {
            RepositoryError::internal_with_context(
                format!("Migration failed: {}", e),
                ErrorContext::new("run_migrations"),
            )
        })?;
        Ok(())
    }

    /// Run `f` on a pooled connection inside `spawn_blocking`.
    ///
    /// Retryable failures (pool exhaustion, serialization failures) are
    /// retried up to `max_retries` times with exponential backoff. `f` must
    /// therefore be safe to run more than once; every ingest closure wraps
    /// its work in a transaction, so a failed attempt leaves nothing behind.
    async fn with_conn<T, F>(&self, f: F) -> RepositoryResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> RepositoryResult<T> + Send + 'static + Clone,
    {
        let pool = self.pool.clone();
        let max_retries = self.config.max_retries;
        let mut retry_delay = Duration::from_millis(self.config.retry_delay_ms);
        let total_queries = self.total_queries.clone();
        let failed_queries = self.failed_queries.clone();
        let retried_operations = self.retried_operations.clone();

        task::spawn_blocking(move || {
            let mut attempt = 0;
            loop {
                let outcome = match pool.get() {
                    Ok(mut conn) => {
                        total_queries.fetch_add(1, Ordering::Relaxed);
                        f.clone()(&mut conn)
                    }
                    Err(e) => Err(RepositoryError::connection_with_context(
                        e.to_string(),
                        ErrorContext::new("get_connection")
                            .with_details(format!("attempt={}", attempt + 1)),
                    )),
                };

                match outcome {
                    Err(e) if e.is_retryable() && attempt < max_retries => {
                        debug!("Retrying after {} (attempt {})", e, attempt + 1);
                        retried_operations.fetch_add(1, Ordering::Relaxed);
                        attempt += 1;
                        std::thread::sleep(retry_delay);
                        retry_delay *= 2;
                    }
                    Err(e) => {
                        failed_queries.fetch_add(1, Ordering::Relaxed);
                        return Err(e);
                    }
                    Ok(value) => return Ok(value),
                }
            }
        })
        .await
        .map_err(|e| {
            RepositoryError::internal_with_context(
                format!("Task join error: {}", e),
                ErrorContext::new("spawn_blocking"),
            )
        })?
    }

    /// Current pool state and query counters.
    pub fn get_pool_stats(&self) -> PoolStats {
        let state = self.pool.state();
        PoolStats {
            connections_in_use: state.connections - state.idle_connections,
            idle_connections: state.idle_connections,
            total_connections: state.connections,
            max_size: self.config.max_pool_size,
            total_queries: self.total_queries.load(Ordering::Relaxed),
            failed_queries: self.failed_queries.load(Ordering::Relaxed),
            retried_operations: self.retried_operations.load(Ordering::Relaxed),
        }
    }

    /// Returns (is_healthy, latency_ms, error_message).
    pub async fn health_check_detailed(&self) -> (bool, Option<u64>, Option<String>) {
        let start = Instant::now();
        let result = self.health_check().await;
        let latency = Some(start.elapsed().as_millis() as u64);
        match result {
            Ok(true) => (true, latency, None),
            Ok(false) => (false, latency, Some("Health check returned false".to_string())),
            Err(e) => (false, latency, Some(e.to_string())),
        }
    }
}

fn map_diesel_error(err: diesel::result::Error) -> RepositoryError {
    RepositoryError::from(err)
}

// ==================== Row loading ====================

fn load_openings(conn: &mut PgConnection, period_ids: &[String]) -> RepositoryResult<Vec<Opening>> {
    if period_ids.is_empty() {
        return Ok(Vec::new());
    }
    openings::table
        .filter(openings::period_id.eq_any(period_ids))
        .order(openings::id)
        .select(OpeningRow::as_select())
        .load::<OpeningRow>(conn)
        .map_err(map_diesel_error)?
        .into_iter()
        .map(OpeningRow::into_opening)
        .collect()
}

fn attach_openings(
    conn: &mut PgConnection,
    rows: Vec<PeriodRow>,
) -> RepositoryResult<Vec<PeriodWithOpenings>> {
    let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
    let mut grouped: HashMap<PeriodId, Vec<Opening>> = HashMap::new();
    for opening in load_openings(conn, &ids)? {
        grouped.entry(opening.period.clone()).or_default().push(opening);
    }

    rows.into_iter()
        .map(|row| {
            let period = row.into_period()?;
            let openings = grouped.remove(&period.id).unwrap_or_default();
            Ok(PeriodWithOpenings { period, openings })
        })
        .collect()
}

fn load_periods_of(
    conn: &mut PgConnection,
    target: &TargetId,
) -> RepositoryResult<Vec<PeriodWithOpenings>> {
    let rows = periods::table
        .filter(periods::target_id.eq(target.as_str()))
        .order(periods::id)
        .select(PeriodRow::as_select())
        .load::<PeriodRow>(conn)
        .map_err(map_diesel_error)?;
    attach_openings(conn, rows)
}

fn attach_daily_openings(
    conn: &mut PgConnection,
    rows: Vec<DailyHoursRow>,
) -> RepositoryResult<Vec<DailyHoursWithOpening>> {
    let mut opening_ids: Vec<i64> = rows.iter().filter_map(|r| r.opening_id).collect();
    opening_ids.sort_unstable();
    opening_ids.dedup();

    let mut by_id: HashMap<i64, Opening> = HashMap::new();
    if !opening_ids.is_empty() {
        let loaded = openings::table
            .filter(openings::id.eq_any(&opening_ids))
            .select(OpeningRow::as_select())
            .load::<OpeningRow>(conn)
            .map_err(map_diesel_error)?;
        for row in loaded {
            let opening = row.into_opening()?;
            by_id.insert(opening.id.0, opening);
        }
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let opening = row.opening_id.and_then(|id| by_id.get(&id).cloned());
            DailyHoursWithOpening {
                daily_hours: row.into(),
                opening,
            }
        })
        .collect())
}

/// Parent ids of a stored target, or `None` when it does not exist.
fn stored_parents(
    conn: &mut PgConnection,
    id: &TargetId,
) -> RepositoryResult<Option<Vec<TargetId>>> {
    let links = targets::table
        .find(id.as_str())
        .select((targets::parent_id, targets::second_parent_id))
        .first::<(Option<String>, Option<String>)>(conn)
        .optional()
        .map_err(map_diesel_error)?;
    Ok(links.map(|(parent, second)| parent.into_iter().chain(second).map(TargetId).collect()))
}

/// Replace `target`'s daily hours with freshly resolved rows and stamp
/// `hours_updated`. Must run inside the caller's transaction.
fn rematerialize(
    tx: &mut PgConnection,
    target: &TargetId,
    now: DateTime<Utc>,
) -> RepositoryResult<(usize, Vec<ResolutionConflict>)> {
    diesel::delete(daily_hours::table.filter(daily_hours::target_id.eq(target.as_str())))
        .execute(tx)?;

    let periods = load_periods_of(tx, target)?;
    let materialized = materialize_daily_hours(target, &periods);
    let rows: Vec<NewDailyHoursRow> = materialized.rows.iter().map(NewDailyHoursRow::from).collect();
    for chunk in rows.chunks(INSERT_CHUNK) {
        diesel::insert_into(daily_hours::table)
            .values(chunk)
            .execute(tx)?;
    }

    diesel::update(targets::table.find(target.as_str()))
        .set(targets::hours_updated.eq(Some(now)))
        .execute(tx)?;

    Ok((rows.len(), materialized.conflicts))
}

/// Take the row lock on `target` for the rest of the transaction.
///
/// Every write that touches a target's schedule locks the target row before
/// any of its periods, so writers of one target queue up in the same order.
fn lock_target(tx: &mut PgConnection, target: &TargetId, operation: &str) -> RepositoryResult<()> {
    targets::table
        .find(target.as_str())
        .select(targets::id)
        .for_update()
        .first::<String>(tx)
        .optional()?
        .ok_or_else(|| target_not_found(operation, target))?;
    Ok(())
}

fn period_not_found(operation: &str, id: &PeriodId) -> RepositoryError {
    RepositoryError::not_found_with_context(
        format!("Period {} not found", id),
        ErrorContext::new(operation)
            .with_entity("period")
            .with_entity_id(id),
    )
}

fn target_not_found(operation: &str, id: &TargetId) -> RepositoryError {
    RepositoryError::not_found_with_context(
        format!("Target {} not found", id),
        ErrorContext::new(operation)
            .with_entity("target")
            .with_entity_id(id),
    )
}

#[async_trait]
impl HoursRepository for PostgresRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        self.with_conn(|conn| {
            sql_query("SELECT 1")
                .execute(conn)
                .map(|_| true)
                .map_err(map_diesel_error)
        })
        .await
    }

    async fn list_targets(&self) -> RepositoryResult<Vec<Target>> {
        self.with_conn(|conn| {
            targets::table
                .order(targets::id)
                .select(TargetRow::as_select())
                .load::<TargetRow>(conn)
                .map_err(map_diesel_error)?
                .into_iter()
                .map(TargetRow::into_target)
                .collect()
        })
        .await
    }

    async fn get_target(&self, id: &TargetId) -> RepositoryResult<Target> {
        let id = id.clone();
        self.with_conn(move |conn| {
            targets::table
                .find(id.as_str())
                .select(TargetRow::as_select())
                .first::<TargetRow>(conn)
                .optional()
                .map_err(map_diesel_error)?
                .ok_or_else(|| target_not_found("get_target", &id))?
                .into_target()
        })
        .await
    }

    async fn list_periods(&self) -> RepositoryResult<Vec<PeriodWithOpenings>> {
        self.with_conn(|conn| {
            let rows = periods::table
                .order(periods::id)
                .select(PeriodRow::as_select())
                .load::<PeriodRow>(conn)
                .map_err(map_diesel_error)?;
            attach_openings(conn, rows)
        })
        .await
    }

    async fn get_period(&self, id: &PeriodId) -> RepositoryResult<PeriodWithOpenings> {
        let id = id.clone();
        self.with_conn(move |conn| {
            let row = periods::table
                .find(id.as_str())
                .select(PeriodRow::as_select())
                .first::<PeriodRow>(conn)
                .optional()
                .map_err(map_diesel_error)?
                .ok_or_else(|| period_not_found("get_period", &id))?;
            let mut loaded = attach_openings(conn, vec![row])?;
            loaded
                .pop()
                .ok_or_else(|| RepositoryError::internal("Period vanished while loading openings"))
        })
        .await
    }

    async fn periods_for_target(
        &self,
        target: &TargetId,
    ) -> RepositoryResult<Vec<PeriodWithOpenings>> {
        let target = target.clone();
        self.with_conn(move |conn| load_periods_of(conn, &target))
            .await
    }

    async fn list_daily_hours(&self) -> RepositoryResult<Vec<DailyHoursWithOpening>> {
        self.with_conn(|conn| {
            let rows = daily_hours::table
                .order(daily_hours::id)
                .select(DailyHoursRow::as_select())
                .load::<DailyHoursRow>(conn)
                .map_err(map_diesel_error)?;
            attach_daily_openings(conn, rows)
        })
        .await
    }

    async fn get_daily_hours(&self, id: DailyHoursId) -> RepositoryResult<DailyHoursWithOpening> {
        self.with_conn(move |conn| {
            let row = daily_hours::table
                .find(id.0)
                .select(DailyHoursRow::as_select())
                .first::<DailyHoursRow>(conn)
                .optional()
                .map_err(map_diesel_error)?
                .ok_or_else(|| {
                    RepositoryError::not_found_with_context(
                        format!("Daily hours {} not found", id),
                        ErrorContext::new("get_daily_hours")
                            .with_entity("daily_hours")
                            .with_entity_id(id),
                    )
                })?;
            let mut loaded = attach_daily_openings(conn, vec![row])?;
            loaded
                .pop()
                .ok_or_else(|| RepositoryError::internal("Daily hours row vanished while loading"))
        })
        .await
    }

    async fn daily_hours_for_target(
        &self,
        target: &TargetId,
    ) -> RepositoryResult<Vec<DailyHoursWithOpening>> {
        let target = target.clone();
        self.with_conn(move |conn| {
            let rows = daily_hours::table
                .filter(daily_hours::target_id.eq(target.as_str()))
                .order(daily_hours::id)
                .select(DailyHoursRow::as_select())
                .load::<DailyHoursRow>(conn)
                .map_err(map_diesel_error)?;
            attach_daily_openings(conn, rows)
        })
        .await
    }
}

#[async_trait]
impl IngestRepository for PostgresRepository {
    async fn upsert_data_source(&self, data_source: &DataSource) -> RepositoryResult<()> {
        let row = DataSourceRow::from(data_source);
        self.with_conn(move |conn| {
            diesel::insert_into(data_sources::table)
                .values(&row)
                .on_conflict(data_sources::id)
                .do_update()
                .set(data_sources::name.eq(excluded(data_sources::name)))
                .execute(conn)
                .map(|_| ())
                .map_err(map_diesel_error)
        })
        .await
    }

    async fn upsert_target(&self, target: &NewTarget) -> RepositoryResult<Target> {
        let target = target.clone();
        self.with_conn(move |conn| {
            // The cycle check reads other targets' links; SERIALIZABLE makes
            // two upserts that would close a cycle between them conflict.
            conn.build_transaction().serializable().run(|tx| {
                let id = target.id();
                let source_exists = data_sources::table
                    .find(target.data_source.as_str())
                    .select(data_sources::id)
                    .first::<String>(tx)
                    .optional()?
                    .is_some();
                if !source_exists {
                    return Err(RepositoryError::integrity_with_context(
                        format!("Unknown data source {}", target.data_source),
                        ErrorContext::new("upsert_target")
                            .with_entity("target")
                            .with_entity_id(&id),
                    ));
                }
                validate_target_links(&target, |link| stored_parents(tx, link))?;

                let now = Utc::now();
                let row = TargetRow::from_target(&target.clone().into_target(now, now, None));
                let stored = diesel::insert_into(targets::table)
                    .values(&row)
                    .on_conflict(targets::id)
                    .do_update()
                    .set((
                        targets::same_as_id.eq(excluded(targets::same_as_id)),
                        targets::target_type.eq(excluded(targets::target_type)),
                        targets::parent_id.eq(excluded(targets::parent_id)),
                        targets::second_parent_id.eq(excluded(targets::second_parent_id)),
                        targets::name.eq(excluded(targets::name)),
                        targets::description.eq(excluded(targets::description)),
                        targets::last_modified_time.eq(excluded(targets::last_modified_time)),
                        targets::publication_time.eq(excluded(targets::publication_time)),
                    ))
                    .returning(TargetRow::as_returning())
                    .get_result::<TargetRow>(tx)?;
                debug!("Upserted target {}", id);
                stored.into_target()
            })
        })
        .await
    }

    async fn replace_target_schedule(
        &self,
        target: &TargetId,
        periods: Vec<NewPeriod>,
    ) -> RepositoryResult<ScheduleUpdate> {
        validate_schedule(target, &periods)?;
        let target = target.clone();

        self.with_conn(move |conn| {
            conn.transaction(|tx| {
                lock_target(tx, &target, "replace_target_schedule")?;

                let new_ids: Vec<String> = periods.iter().map(|p| p.id().to_string()).collect();
                let foreign = periods::table
                    .filter(periods::id.eq_any(&new_ids))
                    .filter(periods::target_id.ne(target.as_str()))
                    .select((periods::id, periods::target_id))
                    .first::<(String, String)>(tx)
                    .optional()?;
                if let Some((period_id, owner)) = foreign {
                    return Err(RepositoryError::integrity_with_context(
                        format!("Period {} belongs to target {}", period_id, owner),
                        ErrorContext::new("replace_target_schedule")
                            .with_entity("period")
                            .with_entity_id(period_id),
                    ));
                }

                let created_times: HashMap<String, DateTime<Utc>> = periods::table
                    .filter(periods::target_id.eq(target.as_str()))
                    .select((periods::id, periods::created_time))
                    .load::<(String, DateTime<Utc>)>(tx)?
                    .into_iter()
                    .collect();
                diesel::delete(periods::table.filter(periods::target_id.eq(target.as_str())))
                    .execute(tx)?;

                let now = Utc::now();
                let mut period_rows = Vec::with_capacity(periods.len());
                let mut opening_rows = Vec::new();
                for new_period in periods.iter().cloned() {
                    let (mut period, openings) = new_period.into_period(target.clone(), now);
                    if let Some(created) = created_times.get(period.id.as_str()) {
                        period.created_time = *created;
                    }
                    opening_rows.extend(openings.iter().map(|o| NewOpeningRow::new(&period.id, o, now)));
                    period_rows.push(PeriodRow::from_period(&period));
                }
                for chunk in period_rows.chunks(INSERT_CHUNK / 4) {
                    diesel::insert_into(periods::table).values(chunk).execute(tx)?;
                }
                for chunk in opening_rows.chunks(INSERT_CHUNK / 2) {
                    diesel::insert_into(openings::table).values(chunk).execute(tx)?;
                }

                let (daily_hours, conflicts) = rematerialize(tx, &target, now)?;
                info!(
                    "Replaced schedule of {}: {} periods, {} openings, {} daily hours",
                    target,
                    period_rows.len(),
                    opening_rows.len(),
                    daily_hours
                );
                Ok(ScheduleUpdate {
                    target: target.clone(),
                    periods: period_rows.len(),
                    openings: opening_rows.len(),
                    daily_hours,
                    hours_updated: now,
                    conflicts,
                })
            })
        })
        .await
    }

    async fn delete_period(&self, id: &PeriodId) -> RepositoryResult<ScheduleUpdate> {
        let id = id.clone();
        self.with_conn(move |conn| {
            conn.transaction(|tx| {
                // Periods never change owner, so an unlocked read is enough
                // to find which target row to lock.
                let owner = periods::table
                    .find(id.as_str())
                    .select(periods::target_id)
                    .first::<String>(tx)
                    .optional()?
                    .map(TargetId)
                    .ok_or_else(|| period_not_found("delete_period", &id))?;
                lock_target(tx, &owner, "delete_period")?;

                let deleted = diesel::delete(
                    periods::table
                        .find(id.as_str())
                        .filter(periods::target_id.eq(owner.as_str())),
                )
                .execute(tx)?;
                if deleted == 0 {
                    // removed by a schedule rewrite that held the lock first
                    return Err(period_not_found("delete_period", &id));
                }

                let now = Utc::now();
                let (daily_hours, conflicts) = rematerialize(tx, &owner, now)?;
                let remaining = load_periods_of(tx, &owner)?;
                info!("Deleted period {} of {}", id, owner);
                Ok(ScheduleUpdate {
                    periods: remaining.len(),
                    openings: remaining.iter().map(|p| p.openings.len()).sum(),
                    target: owner,
                    daily_hours,
                    hours_updated: now,
                    conflicts,
                })
            })
        })
        .await
    }

    async fn delete_target(&self, id: &TargetId) -> RepositoryResult<()> {
        let id = id.clone();
        self.with_conn(move |conn| {
            let deleted = diesel::delete(targets::table.find(id.as_str()))
                .execute(conn)
                .map_err(map_diesel_error)?;
            if deleted == 0 {
                return Err(target_not_found("delete_target", &id));
            }
            info!("Deleted target {}", id);
            Ok(())
        })
        .await
    }
}
