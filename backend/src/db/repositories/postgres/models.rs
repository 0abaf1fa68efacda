use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

use super::schema::{daily_hours, data_sources, openings, periods, targets};
use crate::db::repository::{RepositoryError, RepositoryResult};
use crate::models::{
    DailyHours, DailyHoursId, DataSource, DataSourceId, DateRange, LocalizedText, Opening,
    OpeningId, Period, PeriodId, Status, Target, TargetId, TargetType, Weekday,
};

pub fn text_to_json(text: &LocalizedText) -> Value {
    Value::Object(
        text.0
            .iter()
            .map(|(language, value)| (language.clone(), Value::String(value.clone())))
            .collect(),
    )
}

fn json_to_text(column: &str, value: Value) -> RepositoryResult<LocalizedText> {
    serde_json::from_value(value).map_err(|e| {
        RepositoryError::internal(format!("Failed to parse {} JSON: {}", column, e))
    })
}

fn cycle_to_db(value: Option<u8>) -> Option<i16> {
    value.map(i16::from)
}

fn cycle_from_db(column: &str, value: Option<i16>) -> RepositoryResult<Option<u8>> {
    value
        .map(|v| u8::try_from(v).map_err(|_| RepositoryError::unknown_code(column, v)))
        .transpose()
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = data_sources)]
pub struct DataSourceRow {
    pub id: String,
    pub name: Option<String>,
}

impl From<&DataSource> for DataSourceRow {
    fn from(source: &DataSource) -> Self {
        Self {
            id: source.id.to_string(),
            name: source.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = targets)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TargetRow {
    pub id: String,
    pub data_source_id: String,
    pub origin_id: String,
    pub same_as_id: Option<String>,
    pub target_type: i16,
    pub parent_id: Option<String>,
    pub second_parent_id: Option<String>,
    pub name: Value,
    pub description: Value,
    pub created_time: DateTime<Utc>,
    pub last_modified_time: DateTime<Utc>,
    pub publication_time: Option<DateTime<Utc>>,
    pub hours_updated: Option<DateTime<Utc>>,
}

impl TargetRow {
    pub fn from_target(target: &Target) -> Self {
        Self {
            id: target.id.to_string(),
            data_source_id: target.data_source.to_string(),
            origin_id: target.origin_id.clone(),
            same_as_id: target.same_as.as_ref().map(ToString::to_string),
            target_type: target.target_type.code(),
            parent_id: target.parent.as_ref().map(ToString::to_string),
            second_parent_id: target.second_parent.as_ref().map(ToString::to_string),
            name: text_to_json(&target.name),
            description: text_to_json(&target.description),
            created_time: target.created_time,
            last_modified_time: target.last_modified_time,
            publication_time: target.publication_time,
            hours_updated: target.hours_updated,
        }
    }

    pub fn into_target(self) -> RepositoryResult<Target> {
        let target_type = TargetType::from_code(self.target_type)
            .ok_or_else(|| RepositoryError::unknown_code("targets.target_type", self.target_type))?;
        Ok(Target {
            id: TargetId(self.id),
            data_source: DataSourceId(self.data_source_id),
            origin_id: self.origin_id,
            same_as: self.same_as_id.map(TargetId),
            target_type,
            parent: self.parent_id.map(TargetId),
            second_parent: self.second_parent_id.map(TargetId),
            name: json_to_text("targets.name", self.name)?,
            description: json_to_text("targets.description", self.description)?,
            created_time: self.created_time,
            last_modified_time: self.last_modified_time,
            publication_time: self.publication_time,
            hours_updated: self.hours_updated,
        })
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = periods)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PeriodRow {
    pub id: String,
    pub data_source_id: String,
    pub origin_id: String,
    pub target_id: String,
    pub name: Value,
    pub description: Value,
    pub status: i16,
    pub is_override: bool,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub created_time: DateTime<Utc>,
    pub last_modified_time: DateTime<Utc>,
    pub publication_time: Option<DateTime<Utc>>,
}

impl PeriodRow {
    pub fn from_period(period: &Period) -> Self {
        Self {
            id: period.id.to_string(),
            data_source_id: period.data_source.to_string(),
            origin_id: period.origin_id.clone(),
            target_id: period.target.to_string(),
            name: text_to_json(&period.name),
            description: text_to_json(&period.description),
            status: period.status.code(),
            is_override: period.is_override,
            period_start: period.period.lower(),
            period_end: period.period.upper(),
            created_time: period.created_time,
            last_modified_time: period.last_modified_time,
            publication_time: period.publication_time,
        }
    }

    pub fn into_period(self) -> RepositoryResult<Period> {
        let status = Status::from_code(self.status)
            .ok_or_else(|| RepositoryError::unknown_code("periods.status", self.status))?;
        Ok(Period {
            id: PeriodId(self.id),
            data_source: DataSourceId(self.data_source_id),
            origin_id: self.origin_id,
            target: TargetId(self.target_id),
            name: json_to_text("periods.name", self.name)?,
            description: json_to_text("periods.description", self.description)?,
            status,
            is_override: self.is_override,
            period: DateRange::new(self.period_start, self.period_end)?,
            created_time: self.created_time,
            last_modified_time: self.last_modified_time,
            publication_time: self.publication_time,
        })
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = openings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OpeningRow {
    pub id: i64,
    pub period_id: String,
    pub status: i16,
    pub opens: Option<NaiveTime>,
    pub closes: Option<NaiveTime>,
    pub description: Value,
    pub weekday: i16,
    pub week: Option<i16>,
    pub month: Option<i16>,
    pub created_time: DateTime<Utc>,
    pub last_modified_time: DateTime<Utc>,
}

impl OpeningRow {
    pub fn into_opening(self) -> RepositoryResult<Opening> {
        let status = Status::from_code(self.status)
            .ok_or_else(|| RepositoryError::unknown_code("openings.status", self.status))?;
        let weekday = Weekday::from_code(self.weekday)
            .ok_or_else(|| RepositoryError::unknown_code("openings.weekday", self.weekday))?;
        Ok(Opening {
            id: OpeningId(self.id),
            period: PeriodId(self.period_id),
            status,
            opens: self.opens,
            closes: self.closes,
            description: json_to_text("openings.description", self.description)?,
            weekday,
            week: cycle_from_db("openings.week", self.week)?,
            month: cycle_from_db("openings.month", self.month)?,
            created_time: self.created_time,
            last_modified_time: self.last_modified_time,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = openings)]
pub struct NewOpeningRow {
    pub period_id: String,
    pub status: i16,
    pub opens: Option<NaiveTime>,
    pub closes: Option<NaiveTime>,
    pub description: Value,
    pub weekday: i16,
    pub week: Option<i16>,
    pub month: Option<i16>,
    pub created_time: DateTime<Utc>,
    pub last_modified_time: DateTime<Utc>,
}

impl NewOpeningRow {
    pub fn new(period: &PeriodId, opening: &crate::models::NewOpening, now: DateTime<Utc>) -> Self {
        Self {
            period_id: period.to_string(),
            status: opening.status.code(),
            opens: opening.opens,
            closes: opening.closes,
            description: text_to_json(&opening.description),
            weekday: opening.weekday.code(),
            week: cycle_to_db(opening.week),
            month: cycle_to_db(opening.month),
            created_time: now,
            last_modified_time: now,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = daily_hours)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DailyHoursRow {
    pub id: i64,
    pub date: NaiveDate,
    pub target_id: String,
    pub opening_id: Option<i64>,
}

impl From<DailyHoursRow> for DailyHours {
    fn from(row: DailyHoursRow) -> Self {
        DailyHours {
            id: DailyHoursId(row.id),
            date: row.date,
            target: TargetId(row.target_id),
            opening: row.opening_id.map(OpeningId),
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = daily_hours)]
pub struct NewDailyHoursRow {
    pub date: NaiveDate,
    pub target_id: String,
    pub opening_id: Option<i64>,
}

impl From<&crate::models::NewDailyHours> for NewDailyHoursRow {
    fn from(row: &crate::models::NewDailyHours) -> Self {
        Self {
            date: row.date,
            target_id: row.target.to_string(),
            opening_id: row.opening.map(|id| id.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_localized_text_json() {
        let text = LocalizedText::single("fi", "Kirjasto").with("sv", "Bibliotek");
        let json = text_to_json(&text);
        assert_eq!(json["fi"], "Kirjasto");
        assert_eq!(json_to_text("t", json).unwrap(), text);
    }

    #[test]
    fn test_unknown_codes_are_errors() {
        let row = OpeningRow {
            id: 1,
            period_id: "ds1:p".into(),
            status: 99,
            opens: None,
            closes: None,
            description: Value::Object(Default::default()),
            weekday: 1,
            week: None,
            month: None,
            created_time: Utc::now(),
            last_modified_time: Utc::now(),
        };
        let err = row.into_opening().unwrap_err();
        assert!(err.to_string().contains("openings.status"));
        assert!(cycle_from_db("openings.week", Some(-1)).is_err());
    }
}
