//! Integrity and atomicity of the in-memory repository.

mod support;

use std::sync::Arc;

use chrono::{Duration, Utc};
use hours::db::repositories::LocalRepository;
use hours::db::repository::{HoursRepository, IngestRepository, RepositoryError};
use hours::db::services as db_services;
use hours::models::{DataSourceId, NewOpening, NewPeriod, PeriodId, Status, TargetId, Weekday};
use hours::services::{seed, SeedDocument};
use support::{
    date, long_period, medium_period, published_target, range, repository_with_targets,
    short_period, time, unit_service_repository,
};

// ==================== Cascades ====================

#[tokio::test]
async fn test_delete_period_falls_back_to_remaining_period() {
    let (repo, ids) = repository_with_targets(&["1"]).await;
    let target = &ids[0];
    repo.replace_target_schedule(target, vec![long_period("long"), medium_period("medium")])
        .await
        .unwrap();
    assert_eq!(repo.opening_count(), 14);

    let summer = date(2021, 6, 15);
    let before = db_services::resolve_target_date(&repo, target, summer)
        .await
        .unwrap();
    assert_eq!(before.period.unwrap().as_str(), "ds1:medium");

    let update = repo
        .delete_period(&PeriodId::new("ds1:medium"))
        .await
        .unwrap();
    assert_eq!(update.periods, 1);
    assert_eq!(update.openings, 7);
    assert_eq!(repo.opening_count(), 7);
    assert!(matches!(
        repo.get_period(&PeriodId::new("ds1:medium")).await,
        Err(RepositoryError::NotFound { .. })
    ));

    let after = db_services::resolve_target_date(&repo, target, summer)
        .await
        .unwrap();
    assert_eq!(after.period.unwrap().as_str(), "ds1:long");
    assert_eq!(after.openings[0].opens, Some(time(8, 0)));

    let stored = repo.daily_hours_for_target(target).await.unwrap();
    let row = stored
        .iter()
        .find(|row| row.daily_hours.date == summer)
        .unwrap();
    let opening = row.opening.as_ref().unwrap();
    assert_eq!(opening.period.as_str(), "ds1:long");
    assert!(db_services::verify_daily_hours(&repo, target)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_delete_last_period_leaves_target_undefined() {
    let (repo, ids) = repository_with_targets(&["1"]).await;
    let target = &ids[0];
    repo.replace_target_schedule(target, vec![short_period("short")])
        .await
        .unwrap();
    repo.delete_period(&PeriodId::new("ds1:short")).await.unwrap();

    assert_eq!(repo.daily_hours_count(), 0);
    let resolved = db_services::resolve_target_date(&repo, target, date(2021, 7, 2))
        .await
        .unwrap();
    assert_eq!(resolved.status, Status::Undefined);
}

#[tokio::test]
async fn test_delete_target_cascades_and_clears_links() {
    let (repo, unit, _service, at_unit) = unit_service_repository().await;
    repo.replace_target_schedule(&unit, vec![long_period("unit-long")])
        .await
        .unwrap();
    assert_eq!(repo.period_count(), 1);

    repo.delete_target(&unit).await.unwrap();

    assert_eq!(repo.period_count(), 0);
    assert_eq!(repo.opening_count(), 0);
    assert_eq!(repo.daily_hours_count(), 0);
    let child = repo.get_target(&at_unit).await.unwrap();
    assert_eq!(child.parent, None);
    assert!(child.second_parent.is_some());
    assert!(repo.get_target(&unit).await.unwrap_err().is_not_found());
}

// ==================== Write-time integrity ====================

#[tokio::test]
async fn test_inverted_range_is_never_stored() {
    let json = r#"{
        "data_sources": [{"id": "ds1"}],
        "targets": [{"data_source": "ds1", "origin_id": "1"}],
        "schedules": [{
            "target": "ds1:1",
            "periods": [{
                "data_source": "ds1",
                "origin_id": "backwards",
                "period": ["2021-12-31", "2021-01-01"]
            }]
        }]
    }"#;
    let err = SeedDocument::from_json_str(json).unwrap_err();
    assert!(matches!(err, RepositoryError::ValidationError { .. }));
    assert!(err.to_string().contains("after upper bound"));

    let repo = LocalRepository::new();
    assert_eq!(repo.period_count(), 0);
}

#[tokio::test]
async fn test_parent_cycle_rejected() {
    let (repo, unit, _service, at_unit) = unit_service_repository().await;

    let mut looped = published_target("unit");
    looped.parent = Some(at_unit.clone());
    let err = repo.upsert_target(&looped).await.unwrap_err();
    assert!(matches!(err, RepositoryError::IntegrityViolation { .. }));

    let stored = repo.get_target(&unit).await.unwrap();
    assert_eq!(stored.parent, None);
}

#[tokio::test]
async fn test_self_references_rejected() {
    let (repo, _ids) = repository_with_targets(&[]).await;

    let mut own_parent = published_target("x");
    own_parent.parent = Some(TargetId::new("ds1:x"));
    assert!(matches!(
        repo.upsert_target(&own_parent).await,
        Err(RepositoryError::IntegrityViolation { .. })
    ));

    let mut own_duplicate = published_target("y");
    own_duplicate.same_as = Some(TargetId::new("ds1:y"));
    assert!(matches!(
        repo.upsert_target(&own_duplicate).await,
        Err(RepositoryError::IntegrityViolation { .. })
    ));

    let mut dangling = published_target("z");
    dangling.second_parent = Some(TargetId::new("ds1:missing"));
    assert!(matches!(
        repo.upsert_target(&dangling).await,
        Err(RepositoryError::IntegrityViolation { .. })
    ));

    assert_eq!(repo.target_count(), 0);
}

#[tokio::test]
async fn test_rejected_replace_keeps_previous_schedule() {
    let (repo, ids) = repository_with_targets(&["1"]).await;
    let target = &ids[0];
    repo.replace_target_schedule(target, vec![long_period("long")])
        .await
        .unwrap();
    let rows_before = repo.daily_hours_count();
    let stamped = repo.get_target(target).await.unwrap().hours_updated;

    let broken = NewPeriod::new(
        DataSourceId::new("ds1"),
        "broken",
        range(date(2021, 1, 1), date(2021, 1, 31)),
    )
    .with_opening(NewOpening::new(Weekday::Monday, time(9, 0), time(10, 0)).in_week(0));
    let err = repo
        .replace_target_schedule(target, vec![medium_period("medium"), broken])
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::IntegrityViolation { .. }));

    let periods = repo.periods_for_target(target).await.unwrap();
    assert_eq!(periods.len(), 1);
    assert_eq!(periods[0].period.id.as_str(), "ds1:long");
    assert_eq!(repo.daily_hours_count(), rows_before);
    assert_eq!(repo.get_target(target).await.unwrap().hours_updated, stamped);
}

#[tokio::test]
async fn test_period_cannot_move_between_targets() {
    let (repo, ids) = repository_with_targets(&["1", "2"]).await;
    repo.replace_target_schedule(&ids[0], vec![short_period("shared")])
        .await
        .unwrap();

    let err = repo
        .replace_target_schedule(&ids[1], vec![short_period("shared")])
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::IntegrityViolation { .. }));
    assert_eq!(
        repo.get_period(&PeriodId::new("ds1:shared"))
            .await
            .unwrap()
            .period
            .target,
        ids[0]
    );
}

#[tokio::test]
async fn test_replace_keeps_created_time_of_reused_period() {
    let (repo, ids) = repository_with_targets(&["1"]).await;
    let target = &ids[0];
    repo.replace_target_schedule(target, vec![long_period("long")])
        .await
        .unwrap();
    let first = repo.get_period(&PeriodId::new("ds1:long")).await.unwrap();

    repo.replace_target_schedule(target, vec![long_period("long"), short_period("short")])
        .await
        .unwrap();
    let second = repo.get_period(&PeriodId::new("ds1:long")).await.unwrap();
    assert_eq!(first.period.created_time, second.period.created_time);
    assert!(second.period.last_modified_time >= first.period.last_modified_time);
}

// ==================== Visibility ====================

#[tokio::test]
async fn test_unpublished_targets_hidden() {
    let (repo, ids) = repository_with_targets(&["public"]).await;
    let mut draft = published_target("draft");
    draft.publication_time = None;
    let draft = repo.upsert_target(&draft).await.unwrap();
    let mut scheduled = published_target("later");
    scheduled.publication_time = Some(Utc::now() + Duration::days(30));
    repo.upsert_target(&scheduled).await.unwrap();
    repo.replace_target_schedule(&draft.id, vec![short_period("draft-week")])
        .await
        .unwrap();

    let now = Utc::now();
    let visible = db_services::list_targets(&repo, false, now).await.unwrap();
    assert_eq!(
        visible.iter().map(|t| t.id.clone()).collect::<Vec<_>>(),
        ids
    );
    assert_eq!(db_services::list_targets(&repo, true, now).await.unwrap().len(), 3);

    assert!(db_services::get_target(&repo, &draft.id, false, now)
        .await
        .unwrap_err()
        .is_not_found());
    assert!(db_services::get_period(&repo, &PeriodId::new("ds1:draft-week"), false, now)
        .await
        .unwrap_err()
        .is_not_found());
    assert!(db_services::list_periods(&repo, false, now)
        .await
        .unwrap()
        .is_empty());
    assert!(db_services::list_daily_hours(&repo, false, now)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        db_services::list_daily_hours(&repo, true, now)
            .await
            .unwrap()
            .len(),
        7
    );
}

// ==================== Seeding & concurrency ====================

#[tokio::test]
async fn test_seed_document() {
    let json = r#"{
        "data_sources": [{"id": "ds1", "name": "Example"}],
        "targets": [
            {"data_source": "ds1", "origin_id": "at-unit", "target_type": 3,
             "parent": "ds1:unit", "second_parent": "ds1:service"},
            {"data_source": "ds1", "origin_id": "service", "target_type": 2},
            {"data_source": "ds1", "origin_id": "unit", "target_type": 1,
             "publication_time": "2020-01-01T00:00:00Z"}
        ],
        "schedules": [{
            "target": "ds1:unit",
            "periods": [
                {"data_source": "ds1", "origin_id": "spring",
                 "period": ["2021-03-01", "2021-05-31"],
                 "openings": [
                    {"weekday": 1, "opens": "09:00:00", "closes": "17:00:00"},
                    {"weekday": 6, "status": 2}
                 ]},
                {"data_source": "ds1", "origin_id": "easter", "status": 2, "override": true,
                 "period": ["2021-04-02", "2021-04-05"]}
            ]
        }]
    }"#;
    let document = SeedDocument::from_json_str(json).unwrap();
    let repo = LocalRepository::new();
    let report = seed(&repo, &document).await.unwrap();

    assert_eq!(report.data_sources, 1);
    assert_eq!(report.targets, 3);
    assert_eq!(report.periods, 2);
    assert_eq!(report.openings, 2);
    assert_eq!(report.daily_hours, 92);
    assert_eq!(report.conflicts, 0);

    let unit = TargetId::new("ds1:unit");
    // Easter Monday is closed by the override
    let easter_monday = db_services::resolve_target_date(&repo, &unit, date(2021, 4, 5))
        .await
        .unwrap();
    assert_eq!(easter_monday.status, Status::Closed);
    // Saturdays carry the explicit closed opening
    let saturday = db_services::resolve_target_date(&repo, &unit, date(2021, 3, 6))
        .await
        .unwrap();
    assert_eq!(saturday.status, Status::Closed);
    assert_eq!(saturday.openings.len(), 1);
}

#[tokio::test]
async fn test_readers_never_see_half_written_schedule() {
    let (repo, ids) = repository_with_targets(&["1"]).await;
    let repo = Arc::new(repo);
    let target = ids[0].clone();
    repo.replace_target_schedule(&target, vec![long_period("long")])
        .await
        .unwrap();

    let writer = {
        let repo = Arc::clone(&repo);
        let target = target.clone();
        tokio::spawn(async move {
            for round in 0..20 {
                let periods = if round % 2 == 0 {
                    vec![long_period("long"), medium_period("medium")]
                } else {
                    vec![short_period("short")]
                };
                repo.replace_target_schedule(&target, periods).await.unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let repo = Arc::clone(&repo);
            let target = target.clone();
            tokio::spawn(async move {
                for _ in 0..20 {
                    for row in repo.daily_hours_for_target(&target).await.unwrap() {
                        assert_eq!(row.daily_hours.opening.is_some(), row.opening.is_some());
                    }
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    writer.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }
    assert!(db_services::verify_daily_hours(repo.as_ref(), &target)
        .await
        .unwrap()
        .is_empty());
}
