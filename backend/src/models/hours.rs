//! Opening-hours entities: data sources, targets, periods, openings and the
//! materialized daily hours.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{Status, TargetType, Weekday};
use super::time::{DateRange, TimeSpan};

define_key_type!(DataSourceId);
define_key_type!(TargetId);
define_key_type!(PeriodId);
define_id_type!(i64, OpeningId);
define_id_type!(i64, DailyHoursId);

impl TargetId {
    /// Targets are keyed `"{data_source}:{origin_id}"`.
    pub fn compose(data_source: &DataSourceId, origin_id: &str) -> Self {
        TargetId(format!("{}:{}", data_source, origin_id))
    }
}

impl PeriodId {
    pub fn compose(data_source: &DataSourceId, origin_id: &str) -> Self {
        PeriodId(format!("{}:{}", data_source, origin_id))
    }
}

/// Text keyed by language code (`"fi"`, `"sv"`, `"en"`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalizedText(pub BTreeMap<String, String>);

impl LocalizedText {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(language: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new().with(language, text)
    }

    pub fn with(mut self, language: impl Into<String>, text: impl Into<String>) -> Self {
        self.0.insert(language.into(), text.into());
        self
    }

    pub fn get(&self, language: &str) -> Option<&str> {
        self.0.get(language).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// External origin of targets and periods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSource {
    pub id: DataSourceId,
    #[serde(default)]
    pub name: Option<String>,
}

impl DataSource {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: DataSourceId::new(id),
            name: None,
        }
    }
}

/// A place or service whose opening hours are tracked.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
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

impl Target {
    /// A target is public once its publication time has passed.
    pub fn is_published(&self, now: DateTime<Utc>) -> bool {
        matches!(self.publication_time, Some(published) if published <= now)
    }

    pub fn parents(&self) -> impl Iterator<Item = &TargetId> {
        self.parent.iter().chain(self.second_parent.iter())
    }
}

/// Ingestion input for a target; timestamps are assigned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTarget {
    pub data_source: DataSourceId,
    pub origin_id: String,
    #[serde(default)]
    pub same_as: Option<TargetId>,
    #[serde(default)]
    pub target_type: TargetType,
    #[serde(default)]
    pub parent: Option<TargetId>,
    #[serde(default)]
    pub second_parent: Option<TargetId>,
    #[serde(default)]
    pub name: LocalizedText,
    #[serde(default)]
    pub description: LocalizedText,
    #[serde(default)]
    pub publication_time: Option<DateTime<Utc>>,
}

impl NewTarget {
    pub fn new(data_source: DataSourceId, origin_id: impl Into<String>) -> Self {
        Self {
            data_source,
            origin_id: origin_id.into(),
            same_as: None,
            target_type: TargetType::default(),
            parent: None,
            second_parent: None,
            name: LocalizedText::new(),
            description: LocalizedText::new(),
            publication_time: None,
        }
    }

    pub fn id(&self) -> TargetId {
        TargetId::compose(&self.data_source, &self.origin_id)
    }

    pub fn into_target(
        self,
        created_time: DateTime<Utc>,
        last_modified_time: DateTime<Utc>,
        hours_updated: Option<DateTime<Utc>>,
    ) -> Target {
        Target {
            id: self.id(),
            data_source: self.data_source,
            origin_id: self.origin_id,
            same_as: self.same_as,
            target_type: self.target_type,
            parent: self.parent,
            second_parent: self.second_parent,
            name: self.name,
            description: self.description,
            created_time,
            last_modified_time,
            publication_time: self.publication_time,
            hours_updated,
        }
    }
}

/// A date range with one opening pattern for a target.
#[derive(Debug, Clone, PartialEq)]
pub struct Period {
    pub id: PeriodId,
    pub data_source: DataSourceId,
    pub origin_id: String,
    pub target: TargetId,
    pub name: LocalizedText,
    pub description: LocalizedText,
    pub status: Status,
    /// Override periods shadow regular periods on the dates they cover.
    pub is_override: bool,
    pub period: DateRange,
    pub created_time: DateTime<Utc>,
    pub last_modified_time: DateTime<Utc>,
    pub publication_time: Option<DateTime<Utc>>,
}

impl Period {
    /// Unlike targets, a period without a publication time is public; only a
    /// publication time still in the future holds it back.
    pub fn is_published(&self, now: DateTime<Utc>) -> bool {
        self.publication_time.map_or(true, |published| published <= now)
    }
}

/// One recurring weekday span inside a period.
#[derive(Debug, Clone, PartialEq)]
pub struct Opening {
    pub id: OpeningId,
    pub period: PeriodId,
    pub status: Status,
    pub opens: Option<NaiveTime>,
    pub closes: Option<NaiveTime>,
    pub description: LocalizedText,
    pub weekday: Weekday,
    /// 1-based week of the recurrence cycle; `None` applies every week.
    pub week: Option<u8>,
    /// 1-based month of the recurrence cycle; `None` applies every month.
    pub month: Option<u8>,
    pub created_time: DateTime<Utc>,
    pub last_modified_time: DateTime<Utc>,
}

impl Opening {
    /// Concrete span of this opening when it occurs on `date`.
    ///
    /// `None` when either time is missing (typically a closed marker).
    pub fn span_on(&self, date: NaiveDate) -> Option<TimeSpan> {
        match (self.opens, self.closes) {
            (Some(opens), Some(closes)) => Some(TimeSpan::from_times(date, opens, closes)),
            _ => None,
        }
    }

    pub fn crosses_midnight(&self) -> bool {
        matches!((self.opens, self.closes), (Some(opens), Some(closes)) if closes < opens)
    }
}

/// Period joined with its openings, ordered by opening id.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodWithOpenings {
    pub period: Period,
    pub openings: Vec<Opening>,
}

/// Ingestion input for a period and its openings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPeriod {
    pub data_source: DataSourceId,
    pub origin_id: String,
    #[serde(default)]
    pub name: LocalizedText,
    #[serde(default)]
    pub description: LocalizedText,
    #[serde(default)]
    pub status: Status,
    #[serde(rename = "override", default)]
    pub is_override: bool,
    pub period: DateRange,
    #[serde(default)]
    pub publication_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub openings: Vec<NewOpening>,
}

impl NewPeriod {
    pub fn new(data_source: DataSourceId, origin_id: impl Into<String>, period: DateRange) -> Self {
        Self {
            data_source,
            origin_id: origin_id.into(),
            name: LocalizedText::new(),
            description: LocalizedText::new(),
            status: Status::default(),
            is_override: false,
            period,
            publication_time: None,
            openings: Vec::new(),
        }
    }

    pub fn id(&self) -> PeriodId {
        PeriodId::compose(&self.data_source, &self.origin_id)
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    pub fn overriding(mut self) -> Self {
        self.is_override = true;
        self
    }

    pub fn with_opening(mut self, opening: NewOpening) -> Self {
        self.openings.push(opening);
        self
    }

    pub fn into_period(self, target: TargetId, now: DateTime<Utc>) -> (Period, Vec<NewOpening>) {
        let period = Period {
            id: self.id(),
            data_source: self.data_source,
            origin_id: self.origin_id,
            target,
            name: self.name,
            description: self.description,
            status: self.status,
            is_override: self.is_override,
            period: self.period,
            created_time: now,
            last_modified_time: now,
            publication_time: self.publication_time,
        };
        (period, self.openings)
    }
}

/// Ingestion input for an opening.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOpening {
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub opens: Option<NaiveTime>,
    #[serde(default)]
    pub closes: Option<NaiveTime>,
    #[serde(default)]
    pub description: LocalizedText,
    pub weekday: Weekday,
    #[serde(default)]
    pub week: Option<u8>,
    #[serde(default)]
    pub month: Option<u8>,
}

impl NewOpening {
    pub fn new(weekday: Weekday, opens: NaiveTime, closes: NaiveTime) -> Self {
        Self {
            status: Status::Open,
            opens: Some(opens),
            closes: Some(closes),
            description: LocalizedText::new(),
            weekday,
            week: None,
            month: None,
        }
    }

    /// Explicit closure of `weekday`, without times.
    pub fn closed(weekday: Weekday) -> Self {
        Self {
            status: Status::Closed,
            opens: None,
            closes: None,
            description: LocalizedText::new(),
            weekday,
            week: None,
            month: None,
        }
    }

    pub fn in_week(mut self, week: u8) -> Self {
        self.week = Some(week);
        self
    }

    pub fn in_month(mut self, month: u8) -> Self {
        self.month = Some(month);
        self
    }

    pub fn into_opening(self, id: OpeningId, period: PeriodId, now: DateTime<Utc>) -> Opening {
        Opening {
            id,
            period,
            status: self.status,
            opens: self.opens,
            closes: self.closes,
            description: self.description,
            weekday: self.weekday,
            week: self.week,
            month: self.month,
            created_time: now,
            last_modified_time: now,
        }
    }
}

/// Resolved opening of one target on one date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyHours {
    pub id: DailyHoursId,
    pub date: NaiveDate,
    pub target: TargetId,
    pub opening: Option<OpeningId>,
}

/// Daily hours row before the store has assigned it an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDailyHours {
    pub date: NaiveDate,
    pub target: TargetId,
    pub opening: Option<OpeningId>,
}

/// Daily hours joined with the referenced opening.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyHoursWithOpening {
    pub daily_hours: DailyHours,
    pub opening: Option<Opening>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_composite_ids() {
        let ds = DataSourceId::new("ds1");
        assert_eq!(TargetId::compose(&ds, "42").as_str(), "ds1:42");
        assert_eq!(NewTarget::new(ds.clone(), "42").id(), TargetId::new("ds1:42"));
        assert_eq!(PeriodId::compose(&ds, "42-medium").as_str(), "ds1:42-medium");
    }

    #[test]
    fn test_publication() {
        let now = Utc::now();
        let mut target = NewTarget::new(DataSourceId::new("ds1"), "1").into_target(now, now, None);
        assert!(!target.is_published(now));
        target.publication_time = Some(now - chrono::Duration::days(1));
        assert!(target.is_published(now));
        target.publication_time = Some(now + chrono::Duration::days(1));
        assert!(!target.is_published(now));

        let day = NaiveDate::from_ymd_opt(2021, 7, 4).unwrap();
        let (mut period, _) = NewPeriod::new(DataSourceId::new("ds1"), "p", DateRange::day(day))
            .into_period(TargetId::new("ds1:1"), now);
        assert!(period.is_published(now));
        period.publication_time = Some(now + chrono::Duration::days(365));
        assert!(!period.is_published(now));
        period.publication_time = Some(now);
        assert!(period.is_published(now));
    }

    #[test]
    fn test_opening_span_and_overnight() {
        let now = Utc::now();
        let date = NaiveDate::from_ymd_opt(2021, 3, 5).unwrap();
        let late = NewOpening::new(Weekday::Friday, time(22, 0), time(2, 0)).into_opening(
            OpeningId(1),
            PeriodId::new("ds1:p"),
            now,
        );
        assert!(late.crosses_midnight());
        let span = late.span_on(date).unwrap();
        assert_eq!(span.end.date(), date.succ_opt().unwrap());

        let closed = NewOpening::closed(Weekday::Friday).into_opening(
            OpeningId(2),
            PeriodId::new("ds1:p"),
            now,
        );
        assert_eq!(closed.span_on(date), None);
        assert!(!closed.crosses_midnight());
    }

    #[test]
    fn test_new_period_deserializes_override_flag() {
        let json = r#"{
            "data_source": "ds1",
            "origin_id": "holiday",
            "status": 2,
            "override": true,
            "period": ["2021-07-04", "2021-07-04"]
        }"#;
        let period: NewPeriod = serde_json::from_str(json).unwrap();
        assert!(period.is_override);
        assert_eq!(period.status, Status::Closed);
        assert!(period.openings.is_empty());
        assert_eq!(period.id(), PeriodId::new("ds1:holiday"));
    }
}
