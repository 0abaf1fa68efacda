//! Wire representations for the read API.
//!
//! Each DTO is an explicit projection of a model type. Enum fields carry
//! their label, references are ids, and optional values are written as
//! `null` rather than omitted so every response keeps the same shape.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

use crate::models::{
    DailyHoursWithOpening, DataSourceId, DateRange, LocalizedText, Opening, PeriodId,
    PeriodWithOpenings, Status, Target, TargetId, TargetType, Weekday,
};

/// Response for the health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: String,
}

/// `GET /`: resource name to list URL.
pub type ApiRoot = BTreeMap<&'static str, String>;

#[derive(Debug, Clone, Serialize)]
pub struct TargetDto {
    pub id: TargetId,
    pub data_source: DataSourceId,
    pub origin_id: String,
    pub same_as: Option<TargetId>,
    pub target_type: TargetType,
    pub parent: Option<TargetId>,
    pub second_parent: Option<TargetId>,
    pub name: LocalizedText,
    pub description: LocalizedText,
    pub created_time: DateTime<Utc>,
    pub last_modified_time: DateTime<Utc>,
    pub publication_time: Option<DateTime<Utc>>,
    pub hours_updated: Option<DateTime<Utc>>,
}

impl From<&Target> for TargetDto {
    fn from(target: &Target) -> Self {
        Self {
            id: target.id.clone(),
            data_source: target.data_source.clone(),
            origin_id: target.origin_id.clone(),
            same_as: target.same_as.clone(),
            target_type: target.target_type,
            parent: target.parent.clone(),
            second_parent: target.second_parent.clone(),
            name: target.name.clone(),
            description: target.description.clone(),
            created_time: target.created_time,
            last_modified_time: target.last_modified_time,
            publication_time: target.publication_time,
            hours_updated: target.hours_updated,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OpeningDto {
    pub status: Status,
    pub opens: Option<NaiveTime>,
    pub closes: Option<NaiveTime>,
    pub description: LocalizedText,
    pub period: PeriodId,
    pub weekday: Weekday,
    pub week: Option<u8>,
    pub month: Option<u8>,
    pub created_time: DateTime<Utc>,
    pub last_modified_time: DateTime<Utc>,
}

impl From<&Opening> for OpeningDto {
    fn from(opening: &Opening) -> Self {
        Self {
            status: opening.status,
            opens: opening.opens,
            closes: opening.closes,
            description: opening.description.clone(),
            period: opening.period.clone(),
            weekday: opening.weekday,
            week: opening.week,
            month: opening.month,
            created_time: opening.created_time,
            last_modified_time: opening.last_modified_time,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PeriodDto {
    pub id: PeriodId,
    pub data_source: DataSourceId,
    pub origin_id: String,
    pub target: TargetId,
    pub name: LocalizedText,
    pub description: LocalizedText,
    pub status: Status,
    #[serde(rename = "override")]
    pub is_override: bool,
    /// `[lower, upper]`, both inclusive.
    pub period: DateRange,
    pub created_time: DateTime<Utc>,
    pub last_modified_time: DateTime<Utc>,
    pub publication_time: Option<DateTime<Utc>>,
    pub openings: Vec<OpeningDto>,
}

impl From<&PeriodWithOpenings> for PeriodDto {
    fn from(value: &PeriodWithOpenings) -> Self {
        let period = &value.period;
        Self {
            id: period.id.clone(),
            data_source: period.data_source.clone(),
            origin_id: period.origin_id.clone(),
            target: period.target.clone(),
            name: period.name.clone(),
            description: period.description.clone(),
            status: period.status,
            is_override: period.is_override,
            period: period.period,
            created_time: period.created_time,
            last_modified_time: period.last_modified_time,
            publication_time: period.publication_time,
            openings: value.openings.iter().map(OpeningDto::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyHoursDto {
    pub date: NaiveDate,
    pub target: TargetId,
    pub opening: Option<OpeningDto>,
}

impl From<&DailyHoursWithOpening> for DailyHoursDto {
    fn from(row: &DailyHoursWithOpening) -> Self {
        Self {
            date: row.daily_hours.date,
            target: row.daily_hours.target.clone(),
            opening: row.opening.as_ref().map(OpeningDto::from),
        }
    }
}
