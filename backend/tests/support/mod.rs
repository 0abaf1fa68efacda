#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Mutex;

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use hours::db::repositories::LocalRepository;
use hours::db::repository::IngestRepository;
use hours::models::{
    DataSource, DataSourceId, DateRange, LocalizedText, NewOpening, NewPeriod, NewTarget, Status,
    TargetId, TargetType, Weekday,
};

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Runs `f` with environment variables temporarily modified.
///
/// This is panic-safe (restores variables on unwind) and also serializes access to
/// process-global env vars to avoid flaky tests when Rust runs tests in parallel.
///
/// `changes` is a list of `(key, value)` pairs:
/// - `Some(v)` sets the variable to `v`
/// - `None` removes the variable
pub fn with_scoped_env<F, R>(changes: &[(&str, Option<&str>)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _lock = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let _guard = ScopedEnv::new(changes);
    f()
}

struct ScopedEnv {
    snapshot: Vec<(String, Option<String>)>,
}

impl ScopedEnv {
    fn new(changes: &[(&str, Option<&str>)]) -> Self {
        let keys: HashSet<&str> = changes.iter().map(|(k, _)| *k).collect();
        let snapshot = keys
            .into_iter()
            .map(|k| (k.to_string(), std::env::var(k).ok()))
            .collect::<Vec<_>>();

        for (k, v) in changes {
            match v {
                Some(val) => std::env::set_var(k, val),
                None => std::env::remove_var(k),
            }
        }

        Self { snapshot }
    }
}

impl Drop for ScopedEnv {
    fn drop(&mut self) {
        for (k, v) in self.snapshot.drain(..) {
            match v {
                Some(val) => std::env::set_var(&k, val),
                None => std::env::remove_var(&k),
            }
        }
    }
}

// ==================== Fixtures ====================

pub const DS: &str = "ds1";

pub fn ds() -> DataSourceId {
    DataSourceId::new(DS)
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

pub fn range(lower: NaiveDate, upper: NaiveDate) -> DateRange {
    DateRange::new(lower, upper).unwrap()
}

/// A target published on 2020-01-01.
pub fn published_target(origin: &str) -> NewTarget {
    let mut target = NewTarget::new(ds(), origin);
    target.name = LocalizedText::single("fi", format!("Kohde {}", origin));
    target.publication_time = Some(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap());
    target
}

/// Every day of the week, `opens`..`closes`.
pub fn all_week(opens: NaiveTime, closes: NaiveTime) -> Vec<NewOpening> {
    Weekday::ALL
        .iter()
        .map(|weekday| NewOpening::new(*weekday, opens, closes))
        .collect()
}

fn period_with(origin: &str, range: DateRange, openings: Vec<NewOpening>) -> NewPeriod {
    let mut period = NewPeriod::new(ds(), origin, range);
    period.openings = openings;
    period
}

/// All of 2021, 08:00-16:00 every day.
pub fn long_period(origin: &str) -> NewPeriod {
    period_with(
        origin,
        range(date(2021, 1, 1), date(2021, 12, 31)),
        all_week(time(8, 0), time(16, 0)),
    )
}

/// Summer 2021, 10:00-14:00 every day.
pub fn medium_period(origin: &str) -> NewPeriod {
    period_with(
        origin,
        range(date(2021, 6, 1), date(2021, 8, 31)),
        all_week(time(10, 0), time(14, 0)),
    )
}

/// First week of July 2021, 12:00-13:00 every day.
pub fn short_period(origin: &str) -> NewPeriod {
    period_with(
        origin,
        range(date(2021, 7, 1), date(2021, 7, 7)),
        all_week(time(12, 0), time(13, 0)),
    )
}

/// Closed override for one day.
pub fn closed_override(origin: &str, day: NaiveDate) -> NewPeriod {
    NewPeriod::new(ds(), origin, DateRange::day(day))
        .with_status(Status::Closed)
        .overriding()
}

/// In-memory store with one data source and the given published targets.
pub async fn repository_with_targets(origins: &[&str]) -> (LocalRepository, Vec<TargetId>) {
    let repo = LocalRepository::new();
    repo.upsert_data_source(&DataSource::new(DS)).await.unwrap();
    let mut ids = Vec::new();
    for origin in origins {
        let target = repo.upsert_target(&published_target(origin)).await.unwrap();
        ids.push(target.id);
    }
    (repo, ids)
}

/// A unit, a service and the service at that unit.
pub async fn unit_service_repository() -> (LocalRepository, TargetId, TargetId, TargetId) {
    let repo = LocalRepository::new();
    repo.upsert_data_source(&DataSource::new(DS)).await.unwrap();

    let mut unit = published_target("unit");
    unit.target_type = TargetType::Unit;
    let unit = repo.upsert_target(&unit).await.unwrap();

    let mut service = published_target("service");
    service.target_type = TargetType::Service;
    let service = repo.upsert_target(&service).await.unwrap();

    let mut at_unit = published_target("service-at-unit");
    at_unit.target_type = TargetType::ServiceAtUnit;
    at_unit.parent = Some(unit.id.clone());
    at_unit.second_parent = Some(service.id.clone());
    let at_unit = repo.upsert_target(&at_unit).await.unwrap();

    (repo, unit.id, service.id, at_unit.id)
}
