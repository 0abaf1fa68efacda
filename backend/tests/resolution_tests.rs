//! Resolution rules exercised through the repository: overrides, recurrence,
//! overnight spans and the agreement between stored and derived daily hours.

mod support;

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

use hours::db::repository::{HoursRepository, IngestRepository};
use hours::db::services as db_services;
use hours::models::{
    DataSourceId, DateRange, NewOpening, NewPeriod, PeriodWithOpenings, Status, TargetId, Weekday,
};
use hours::services::resolution::{precedence, resolve_date};
use support::{
    closed_override, date, long_period, medium_period, range, repository_with_targets,
    short_period, time,
};

#[tokio::test]
async fn test_override_closes_holiday() {
    let (repo, ids) = repository_with_targets(&["1"]).await;
    let target = &ids[0];
    repo.replace_target_schedule(
        target,
        vec![long_period("regular"), closed_override("holiday", date(2021, 7, 4))],
    )
    .await
    .unwrap();

    let holiday = db_services::resolve_target_date(&repo, target, date(2021, 7, 4))
        .await
        .unwrap();
    assert_eq!(holiday.status, Status::Closed);
    assert!(holiday.openings.is_empty());
    assert!(holiday.spans.is_empty());
    assert_eq!(holiday.period.as_ref().unwrap().as_str(), "ds1:holiday");

    let next_day = db_services::resolve_target_date(&repo, target, date(2021, 7, 5))
        .await
        .unwrap();
    assert_eq!(next_day.status, Status::Open);
    assert_eq!(next_day.openings.len(), 1);
    assert_eq!(next_day.openings[0].opens, Some(time(8, 0)));

    let stored: Vec<_> = repo
        .daily_hours_for_target(target)
        .await
        .unwrap()
        .into_iter()
        .filter(|row| row.daily_hours.date == date(2021, 7, 4))
        .collect();
    assert_eq!(stored.len(), 1);
    assert!(stored[0].opening.is_none());
}

#[tokio::test]
async fn test_override_wins_over_shorter_regular_period() {
    let (repo, ids) = repository_with_targets(&["1"]).await;
    let target = &ids[0];
    let mut override_week = medium_period("summer-override");
    override_week.is_override = true;
    repo.replace_target_schedule(target, vec![short_period("short"), override_week])
        .await
        .unwrap();

    let resolved = db_services::resolve_target_date(&repo, target, date(2021, 7, 3))
        .await
        .unwrap();
    assert_eq!(resolved.period.unwrap().as_str(), "ds1:summer-override");
    assert_eq!(resolved.openings[0].opens, Some(time(10, 0)));
}

#[tokio::test]
async fn test_most_specific_period_wins() {
    let (repo, ids) = repository_with_targets(&["1"]).await;
    let target = &ids[0];
    repo.replace_target_schedule(
        target,
        vec![long_period("long"), medium_period("medium"), short_period("short")],
    )
    .await
    .unwrap();

    let cases = [
        (date(2021, 3, 1), "ds1:long", time(8, 0)),
        (date(2021, 6, 15), "ds1:medium", time(10, 0)),
        (date(2021, 7, 2), "ds1:short", time(12, 0)),
    ];
    for (day, period, opens) in cases {
        let resolved = db_services::resolve_target_date(&repo, target, day).await.unwrap();
        assert_eq!(resolved.period.unwrap().as_str(), period, "on {}", day);
        assert_eq!(resolved.openings[0].opens, Some(opens), "on {}", day);
        assert!(resolved.conflict.is_none());
    }

    let outside = db_services::resolve_target_date(&repo, target, date(2022, 1, 1))
        .await
        .unwrap();
    assert_eq!(outside.status, Status::Undefined);
    assert!(outside.period.is_none());
}

#[tokio::test]
async fn test_second_week_opening() {
    let (repo, ids) = repository_with_targets(&["1"]).await;
    let target = &ids[0];
    // 2021-01-04 is a Monday
    let period = NewPeriod::new(
        DataSourceId::new("ds1"),
        "biweekly",
        range(date(2021, 1, 4), date(2021, 3, 28)),
    )
    .with_opening(NewOpening::new(Weekday::Monday, time(10, 0), time(12, 0)).in_week(2));
    repo.replace_target_schedule(target, vec![period]).await.unwrap();

    let first = db_services::resolve_target_date(&repo, target, date(2021, 1, 4))
        .await
        .unwrap();
    assert_eq!(first.status, Status::Closed);
    assert!(first.openings.is_empty());

    let second = db_services::resolve_target_date(&repo, target, date(2021, 1, 11))
        .await
        .unwrap();
    assert_eq!(second.status, Status::Open);
    assert_eq!(second.openings[0].week, Some(2));

    let third = db_services::resolve_target_date(&repo, target, date(2021, 1, 18))
        .await
        .unwrap();
    assert_eq!(third.status, Status::Closed);
}

#[tokio::test]
async fn test_every_week_opening_fills_other_weeks() {
    let (repo, ids) = repository_with_targets(&["1"]).await;
    let target = &ids[0];
    let period = NewPeriod::new(
        DataSourceId::new("ds1"),
        "biweekly",
        range(date(2021, 1, 4), date(2021, 3, 28)),
    )
    .with_opening(NewOpening::new(Weekday::Monday, time(10, 0), time(12, 0)).in_week(2))
    .with_opening(NewOpening::new(Weekday::Monday, time(8, 0), time(9, 0)));
    repo.replace_target_schedule(target, vec![period]).await.unwrap();

    let first = db_services::resolve_target_date(&repo, target, date(2021, 1, 4))
        .await
        .unwrap();
    assert_eq!(first.openings.len(), 1);
    assert_eq!(first.openings[0].opens, Some(time(8, 0)));

    let second = db_services::resolve_target_date(&repo, target, date(2021, 1, 11))
        .await
        .unwrap();
    assert_eq!(second.openings.len(), 1);
    assert_eq!(second.openings[0].opens, Some(time(10, 0)));
}

#[tokio::test]
async fn test_overnight_opening_spills_into_next_day() {
    let (repo, ids) = repository_with_targets(&["1"]).await;
    let target = &ids[0];
    // 2021-03-05 is a Friday
    let period = NewPeriod::new(
        DataSourceId::new("ds1"),
        "nightclub",
        range(date(2021, 3, 1), date(2021, 3, 31)),
    )
    .with_opening(NewOpening::new(Weekday::Friday, time(22, 0), time(2, 0)));
    repo.replace_target_schedule(target, vec![period]).await.unwrap();

    let friday = db_services::resolve_target_date(&repo, target, date(2021, 3, 5))
        .await
        .unwrap();
    assert_eq!(friday.spans.len(), 1);
    assert_eq!(friday.spans[0].start, date(2021, 3, 5).and_time(time(22, 0)));
    assert_eq!(friday.spans[0].end, date(2021, 3, 6).and_time(time(0, 0)));

    let saturday = db_services::resolve_target_date(&repo, target, date(2021, 3, 6))
        .await
        .unwrap();
    assert_eq!(saturday.status, Status::Closed);
    assert_eq!(saturday.spans.len(), 1);
    assert_eq!(saturday.spans[0].start, date(2021, 3, 6).and_time(time(0, 0)));
    assert_eq!(saturday.spans[0].end, date(2021, 3, 6).and_time(time(2, 0)));
}

#[tokio::test]
async fn test_stored_daily_hours_are_rederivable() {
    let (repo, ids) = repository_with_targets(&["1", "2"]).await;
    repo.replace_target_schedule(
        &ids[0],
        vec![
            long_period("t1-long"),
            medium_period("t1-medium"),
            closed_override("t1-holiday", date(2021, 7, 4)),
        ],
    )
    .await
    .unwrap();
    repo.replace_target_schedule(&ids[1], vec![short_period("t2-short")])
        .await
        .unwrap();

    for target in &ids {
        assert!(db_services::verify_daily_hours(&repo, target)
            .await
            .unwrap()
            .is_empty());

        let periods = repo.periods_for_target(target).await.unwrap();
        for row in repo.daily_hours_for_target(target).await.unwrap() {
            let resolution = resolve_date(&periods, row.daily_hours.date);
            let expected = resolution.opening_ids();
            match row.daily_hours.opening {
                Some(opening) => assert!(expected.contains(&opening)),
                None => assert!(expected.is_empty()),
            }
        }
    }

    // one row per covered day of 2021 for the first target
    let first = repo.daily_hours_for_target(&ids[0]).await.unwrap();
    assert_eq!(first.len(), 365);
    let target = repo.get_target(&ids[0]).await.unwrap();
    assert!(target.hours_updated.is_some());
}

// ==================== Tie-break property ====================

/// (index, days before the probe date, days after, modified offset, override)
type PeriodSeed = (usize, i64, i64, i64, bool);

fn build(seeds: &[PeriodSeed]) -> Vec<PeriodWithOpenings> {
    let probe = date(2021, 6, 15);
    let base = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
    seeds
        .iter()
        .map(|&(index, before, after, modified, is_override)| {
            let mut new_period = NewPeriod::new(
                DataSourceId::new("ds1"),
                format!("p{}", index),
                DateRange::new(probe - Duration::days(before), probe + Duration::days(after))
                    .unwrap(),
            );
            new_period.is_override = is_override;
            let (mut period, _) = new_period.into_period(TargetId::new("ds1:1"), base);
            period.last_modified_time = base + Duration::days(modified);
            PeriodWithOpenings {
                period,
                openings: Vec::new(),
            }
        })
        .collect()
}

fn seeds_and_shuffle() -> impl Strategy<Value = (Vec<PeriodSeed>, Vec<PeriodSeed>)> {
    prop::collection::vec((0i64..10, 0i64..10, 0i64..3, any::<bool>()), 1..8)
        .prop_map(|raw| {
            raw.into_iter()
                .enumerate()
                .map(|(i, (before, after, modified, o))| (i, before, after, modified, o))
                .collect::<Vec<PeriodSeed>>()
        })
        .prop_flat_map(|seeds| (Just(seeds.clone()), Just(seeds).prop_shuffle()))
}

proptest! {
    #[test]
    fn prop_winner_independent_of_input_order((seeds, shuffled) in seeds_and_shuffle()) {
        let probe = date(2021, 6, 15);
        let original = build(&seeds);
        let permuted = build(&shuffled);

        let a = resolve_date(&original, probe);
        let b = resolve_date(&permuted, probe);
        prop_assert_eq!(a.period.map(|p| p.id.clone()), b.period.map(|p| p.id.clone()));
        prop_assert_eq!(a.conflict.is_some(), b.conflict.is_some());
    }

    #[test]
    fn prop_winner_has_highest_precedence(seeds in seeds_and_shuffle().prop_map(|(s, _)| s)) {
        let probe = date(2021, 6, 15);
        let periods = build(&seeds);
        let resolution = resolve_date(&periods, probe);
        let winner = resolution.period.unwrap();

        let any_override = periods.iter().any(|p| p.period.is_override);
        prop_assert_eq!(winner.is_override, any_override);
        for entry in periods.iter().filter(|p| p.period.is_override == any_override) {
            prop_assert_ne!(precedence(&entry.period, winner), std::cmp::Ordering::Less);
        }
    }
}
