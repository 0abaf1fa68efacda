//! HTTP handlers for the REST API.
//!
//! Each handler validates the query string and the `ordering` parameter
//! first, so a malformed request never reaches the repository, then
//! delegates to the db service layer and projects the result into DTOs.

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;

use super::dto::{ApiRoot, DailyHoursDto, HealthResponse, PeriodDto, TargetDto};
use super::error::AppError;
use super::registry::{list_path, RESOURCES};
use super::state::AppState;
use crate::db::services as db_services;
use crate::models::{
    DailyHoursId, DailyHoursWithOpening, PeriodId, PeriodWithOpenings, Target, TargetId,
};
use crate::services::{apply_ordering, parse_ordering};

/// Result type for handlers.
pub type HandlerResult<T> = Result<Json<T>, AppError>;

/// Query parameters accepted by every list endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    /// Comma separated field names, `-` prefix for descending.
    pub ordering: Option<String>,
}

// =============================================================================
// Root & Health
// =============================================================================

/// GET /
pub async fn api_root() -> Json<ApiRoot> {
    Json(
        RESOURCES
            .iter()
            .map(|resource| (resource.name, list_path(resource.name)))
            .collect(),
    )
}

/// GET /health
///
/// Health check endpoint to verify the service is running and database is accessible.
pub async fn health_check(State(state): State<AppState>) -> HandlerResult<HealthResponse> {
    let db_status = match db_services::health_check(state.repository.as_ref()).await {
        Ok(true) => "connected".to_string(),
        Ok(false) => "disconnected".to_string(),
        Err(e) => format!("error: {}", e),
    };

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: db_status,
    }))
}

// =============================================================================
// Targets
// =============================================================================

/// GET /target/
pub async fn list_targets(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> HandlerResult<Vec<TargetDto>> {
    let Query(query) = query?;
    let keys = parse_ordering::<Target>(query.ordering.as_deref())?;
    let mut targets = db_services::list_targets(
        state.repository.as_ref(),
        state.include_unpublished,
        Utc::now(),
    )
    .await?;
    apply_ordering(&mut targets, &keys);

    Ok(Json(targets.iter().map(TargetDto::from).collect()))
}

/// GET /target/{id}/
pub async fn get_target(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> HandlerResult<TargetDto> {
    let target = db_services::get_target(
        state.repository.as_ref(),
        &TargetId::new(id),
        state.include_unpublished,
        Utc::now(),
    )
    .await?;

    Ok(Json(TargetDto::from(&target)))
}

// =============================================================================
// Periods
// =============================================================================

/// GET /period/
///
/// Ordered by target unless `ordering` says otherwise.
pub async fn list_periods(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> HandlerResult<Vec<PeriodDto>> {
    let Query(query) = query?;
    let keys = parse_ordering::<PeriodWithOpenings>(query.ordering.as_deref())?;
    let mut periods = db_services::list_periods(
        state.repository.as_ref(),
        state.include_unpublished,
        Utc::now(),
    )
    .await?;
    apply_ordering(&mut periods, &keys);

    Ok(Json(periods.iter().map(PeriodDto::from).collect()))
}

/// GET /period/{id}/
pub async fn get_period(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> HandlerResult<PeriodDto> {
    let period = db_services::get_period(
        state.repository.as_ref(),
        &PeriodId::new(id),
        state.include_unpublished,
        Utc::now(),
    )
    .await?;

    Ok(Json(PeriodDto::from(&period)))
}

// =============================================================================
// Daily hours
// =============================================================================

/// GET /daily_hours/
///
/// Ordered by (date, target) unless `ordering` says otherwise.
pub async fn list_daily_hours(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> HandlerResult<Vec<DailyHoursDto>> {
    let Query(query) = query?;
    let keys = parse_ordering::<DailyHoursWithOpening>(query.ordering.as_deref())?;
    let mut rows = db_services::list_daily_hours(
        state.repository.as_ref(),
        state.include_unpublished,
        Utc::now(),
    )
    .await?;
    apply_ordering(&mut rows, &keys);

    Ok(Json(rows.iter().map(DailyHoursDto::from).collect()))
}

/// GET /daily_hours/{id}/
pub async fn get_daily_hours(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> HandlerResult<DailyHoursDto> {
    // Ids are integers; anything else cannot name a row.
    let id: i64 = id
        .parse()
        .map_err(|_| AppError::NotFound(format!("Daily hours {} not found", id)))?;

    let row = db_services::get_daily_hours(
        state.repository.as_ref(),
        DailyHoursId::new(id),
        state.include_unpublished,
        Utc::now(),
    )
    .await?;

    Ok(Json(DailyHoursDto::from(&row)))
}
