//! Date resolution: which period and which openings govern a target on a
//! given calendar date.
//!
//! Rules, applied to the periods of a single target:
//!
//! 1. only periods whose inclusive range contains the date are candidates;
//! 2. if any candidate is an override period, only override candidates are
//!    considered;
//! 3. the considered periods are ranked by [`precedence`]: shortest range
//!    first, then the most recently modified, then the smallest id. When the
//!    runner-up has the same range length as the winner the choice is
//!    reported as a [`ResolutionConflict`], but a single winner is always
//!    returned;
//! 4. inside the winner, openings for the date's weekday are filtered by
//!    recurrence. The most specific tier that matches wins: month-refined
//!    openings, then week-refined openings, then every-week openings;
//! 5. a CLOSED opening in the selected tier closes the whole day and is kept
//!    as the closed marker.
//!
//! Week-of-cycle counts whole weeks (Monday based) from the week containing
//! the period's first day; the cycle length is the largest `week` used by the
//! period's week-refined openings. Month-of-cycle counts calendar months from
//! the period's first month; for month-refined openings `week` is the n-th
//! occurrence of the weekday within the calendar month.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use chrono::{Datelike, Duration, NaiveDate};
use log::warn;

use crate::models::{
    NewDailyHours, Opening, OpeningId, Period, PeriodId, PeriodWithOpenings, Status, TargetId,
    TimeSpan, Weekday,
};

/// Several periods were equally specific on `date`; `winner` was picked by
/// the modification-time / id tie-break.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionConflict {
    pub date: NaiveDate,
    pub winner: PeriodId,
    pub contenders: Vec<PeriodId>,
}

/// Outcome of resolving one date.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution<'a> {
    pub date: NaiveDate,
    /// Winning period, `None` when no period covers the date.
    pub period: Option<&'a Period>,
    pub status: Status,
    /// Selected openings ordered by opening time. A closed day carries its
    /// closing opening here when there is one.
    pub openings: Vec<&'a Opening>,
    pub conflict: Option<ResolutionConflict>,
}

impl<'a> Resolution<'a> {
    fn undefined(date: NaiveDate) -> Self {
        Self {
            date,
            period: None,
            status: Status::Undefined,
            openings: Vec::new(),
            conflict: None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.status == Status::Closed
    }

    pub fn opening_ids(&self) -> Vec<OpeningId> {
        self.openings.iter().map(|o| o.id).collect()
    }
}

/// Ranking of periods competing for the same date; `Less` wins.
pub fn precedence(a: &Period, b: &Period) -> Ordering {
    a.period
        .len_days()
        .cmp(&b.period.len_days())
        .then_with(|| b.last_modified_time.cmp(&a.last_modified_time))
        .then_with(|| a.id.cmp(&b.id))
}

/// Resolve `date` against one target's periods.
pub fn resolve_date(periods: &[PeriodWithOpenings], date: NaiveDate) -> Resolution<'_> {
    let candidates: Vec<&PeriodWithOpenings> = periods
        .iter()
        .filter(|p| p.period.period.contains(date))
        .collect();

    let has_override = candidates.iter().any(|p| p.period.is_override);
    let mut considered: Vec<&PeriodWithOpenings> = candidates
        .into_iter()
        .filter(|p| !has_override || p.period.is_override)
        .collect();

    if considered.is_empty() {
        return Resolution::undefined(date);
    }

    considered.sort_by(|a, b| precedence(&a.period, &b.period));
    let winner = considered[0];
    let winner_len = winner.period.period.len_days();
    let contenders: Vec<PeriodId> = considered[1..]
        .iter()
        .filter(|p| p.period.period.len_days() == winner_len)
        .map(|p| p.period.id.clone())
        .collect();
    let conflict = if contenders.is_empty() {
        None
    } else {
        Some(ResolutionConflict {
            date,
            winner: winner.period.id.clone(),
            contenders,
        })
    };

    let selected = select_openings(winner, date);
    let (status, openings) = match selected.iter().find(|o| o.status == Status::Closed) {
        Some(closed) => (Status::Closed, vec![*closed]),
        None if selected.is_empty() => {
            // An open period with nothing scheduled for this weekday is closed.
            let status = match winner.period.status {
                Status::Open => Status::Closed,
                other => other,
            };
            (status, selected)
        }
        None => {
            let status = if selected.iter().any(|o| o.status == Status::Open) {
                Status::Open
            } else {
                selected[0].status
            };
            (status, selected)
        }
    };

    Resolution {
        date,
        period: Some(&winner.period),
        status,
        openings,
        conflict,
    }
}

fn select_openings(entry: &PeriodWithOpenings, date: NaiveDate) -> Vec<&Opening> {
    let weekday = Weekday::of(date);
    let anchor = entry.period.period.lower();

    let week_cycle = entry
        .openings
        .iter()
        .filter(|o| o.month.is_none())
        .filter_map(|o| o.week)
        .max();
    let month_cycle = entry.openings.iter().filter_map(|o| o.month).max();
    let current_week = week_cycle.map(|cycle| week_of_cycle(anchor, date, cycle));
    let current_month = month_cycle.map(|cycle| month_of_cycle(anchor, date, cycle));
    let occurrence = weekday_occurrence_in_month(date);

    let same_day = || entry.openings.iter().filter(|o| o.weekday == weekday);

    let monthly: Vec<&Opening> = same_day()
        .filter(|o| o.month.is_some() && o.month == current_month)
        .filter(|o| o.week.map_or(true, |week| week == occurrence))
        .collect();
    let weekly: Vec<&Opening> = same_day()
        .filter(|o| o.month.is_none() && o.week.is_some() && o.week == current_week)
        .collect();
    let every_week: Vec<&Opening> = same_day()
        .filter(|o| o.month.is_none() && o.week.is_none())
        .collect();

    let mut selected = if !monthly.is_empty() {
        monthly
    } else if !weekly.is_empty() {
        weekly
    } else {
        every_week
    };
    selected.sort_by(|a, b| a.opens.cmp(&b.opens).then_with(|| a.id.cmp(&b.id)));
    selected
}

/// 1-based week of a `cycle`-week recurrence anchored at the week of `anchor`.
pub fn week_of_cycle(anchor: NaiveDate, date: NaiveDate, cycle: u8) -> u8 {
    let cycle = i64::from(cycle.max(1));
    let monday = |d: NaiveDate| d - Duration::days(i64::from(d.weekday().num_days_from_monday()));
    let weeks = (monday(date) - monday(anchor)).num_days().div_euclid(7);
    // cycle <= u8::MAX so the result fits
    (weeks.rem_euclid(cycle) + 1) as u8
}

/// 1-based month of a `cycle`-month recurrence anchored at the month of `anchor`.
pub fn month_of_cycle(anchor: NaiveDate, date: NaiveDate, cycle: u8) -> u8 {
    let cycle = i64::from(cycle.max(1));
    let months = i64::from(date.year() - anchor.year()) * 12 + i64::from(date.month())
        - i64::from(anchor.month());
    (months.rem_euclid(cycle) + 1) as u8
}

/// Which occurrence of its weekday `date` is within its month (1..=5).
pub fn weekday_occurrence_in_month(date: NaiveDate) -> u8 {
    ((date.day() - 1) / 7 + 1) as u8
}

/// Daily hours rows derived for one target, plus the tie-break reports.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Materialized {
    pub rows: Vec<NewDailyHours>,
    pub conflicts: Vec<ResolutionConflict>,
}

/// Resolve every date covered by at least one of `target`'s periods.
///
/// Emits one row per selected opening, or a single row without an opening
/// when the day resolves to no opening at all. Dates outside every period
/// produce no row.
pub fn materialize_daily_hours(target: &TargetId, periods: &[PeriodWithOpenings]) -> Materialized {
    let owned: Vec<PeriodWithOpenings> = periods
        .iter()
        .filter(|p| &p.period.target == target)
        .cloned()
        .collect();
    let dates: BTreeSet<NaiveDate> = owned.iter().flat_map(|p| p.period.period.days()).collect();

    let mut materialized = Materialized::default();
    for date in dates {
        let resolution = resolve_date(&owned, date);
        if let Some(conflict) = resolution.conflict.clone() {
            warn!(
                "Ambiguous periods for target {} on {}: picked {} over {:?}",
                target, date, conflict.winner, conflict.contenders
            );
            materialized.conflicts.push(conflict);
        }

        if resolution.openings.is_empty() {
            materialized.rows.push(NewDailyHours {
                date,
                target: target.clone(),
                opening: None,
            });
        } else {
            materialized
                .rows
                .extend(resolution.openings.iter().map(|opening| NewDailyHours {
                    date,
                    target: target.clone(),
                    opening: Some(opening.id),
                }));
        }
    }
    materialized
}

/// Effective open spans on `date`, clipped to the calendar day.
///
/// Includes the after-midnight part of the previous day's overnight openings.
pub fn spans_for_date(periods: &[PeriodWithOpenings], date: NaiveDate) -> Vec<TimeSpan> {
    let mut spans = Vec::new();

    let mut collect = |day: NaiveDate| {
        let resolution = resolve_date(periods, day);
        for opening in resolution
            .openings
            .iter()
            .filter(|o| o.status != Status::Closed)
        {
            if let Some(piece) = opening.span_on(day).and_then(|span| span.on_day(date)) {
                spans.push(piece);
            }
        }
    };

    if let Some(previous) = date.pred_opt() {
        collect(previous);
    }
    collect(date);

    spans.sort();
    spans
}
