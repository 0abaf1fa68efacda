//! Write-time integrity checks shared by every repository backend.
//!
//! Backends supply lookups against their own storage; the rules live here so
//! the in-memory and Postgres stores reject exactly the same writes.

use std::collections::HashSet;

use crate::db::repository::{ErrorContext, RepositoryError, RepositoryResult};
use crate::models::{NewPeriod, NewTarget, TargetId};

fn target_violation(target: &TargetId, details: String) -> RepositoryError {
    RepositoryError::integrity_with_context(
        details,
        ErrorContext::new("upsert_target")
            .with_entity("target")
            .with_entity_id(target),
    )
}

/// Check the links of `target` before it is written.
///
/// `parents_of` returns the stored parent ids of a target, or `None` when it
/// does not exist. The target itself is evaluated with its new links, so a
/// re-parenting write that would close a loop is rejected.
pub fn validate_target_links<F>(target: &NewTarget, mut parents_of: F) -> RepositoryResult<()>
where
    F: FnMut(&TargetId) -> RepositoryResult<Option<Vec<TargetId>>>,
{
    let id = target.id();

    if target.parent.as_ref() == Some(&id) || target.second_parent.as_ref() == Some(&id) {
        return Err(target_violation(&id, format!("Target {} cannot be its own parent", id)));
    }
    if target.same_as.as_ref() == Some(&id) {
        return Err(target_violation(&id, format!("Target {} cannot be the same as itself", id)));
    }

    let links = target
        .parent
        .iter()
        .chain(target.second_parent.iter())
        .chain(target.same_as.iter());
    for link in links {
        if parents_of(link)?.is_none() {
            return Err(target_violation(
                &id,
                format!("Target {} references unknown target {}", id, link),
            ));
        }
    }

    let mut visited: HashSet<TargetId> = HashSet::new();
    let mut stack: Vec<TargetId> = target
        .parent
        .iter()
        .chain(target.second_parent.iter())
        .cloned()
        .collect();
    while let Some(current) = stack.pop() {
        if current == id {
            return Err(target_violation(
                &id,
                format!("Parent links of target {} would form a cycle", id),
            ));
        }
        if !visited.insert(current.clone()) {
            continue;
        }
        if let Some(parents) = parents_of(&current)? {
            stack.extend(parents);
        }
    }

    Ok(())
}

/// Check a replacement batch of periods for `target`.
pub fn validate_schedule(target: &TargetId, periods: &[NewPeriod]) -> RepositoryResult<()> {
    let violation = |details: String| {
        RepositoryError::integrity_with_context(
            details,
            ErrorContext::new("replace_target_schedule")
                .with_entity("target")
                .with_entity_id(target),
        )
    };

    let mut seen = HashSet::new();
    for period in periods {
        let period_id = period.id();
        if !seen.insert(period_id.clone()) {
            return Err(violation(format!("Period {} appears more than once", period_id)));
        }
        for opening in &period.openings {
            if opening.week == Some(0) || opening.month == Some(0) {
                return Err(violation(format!(
                    "Opening on {} in period {} uses a zero week or month; cycles are 1-based",
                    opening.weekday, period_id
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DataSourceId, DateRange, NewOpening, Weekday};
    use chrono::{NaiveDate, NaiveTime};
    use std::collections::HashMap;

    fn store(entries: &[(&str, &[&str])]) -> HashMap<TargetId, Vec<TargetId>> {
        entries
            .iter()
            .map(|(id, parents)| {
                (
                    TargetId::new(*id),
                    parents.iter().map(|p| TargetId::new(*p)).collect(),
                )
            })
            .collect()
    }

    fn check(target: &NewTarget, stored: &HashMap<TargetId, Vec<TargetId>>) -> RepositoryResult<()> {
        validate_target_links(target, |id| Ok(stored.get(id).cloned()))
    }

    fn new_target(origin: &str) -> NewTarget {
        NewTarget::new(DataSourceId::new("ds1"), origin)
    }

    #[test]
    fn test_self_parent_rejected() {
        let mut target = new_target("a");
        target.second_parent = Some(TargetId::new("ds1:a"));
        let err = check(&target, &store(&[])).unwrap_err();
        assert!(matches!(err, RepositoryError::IntegrityViolation { .. }));
    }

    #[test]
    fn test_unknown_reference_rejected() {
        let mut target = new_target("a");
        target.same_as = Some(TargetId::new("ds1:missing"));
        assert!(check(&target, &store(&[])).is_err());
    }

    #[test]
    fn test_cycle_through_stored_targets_rejected() {
        // b -> c -> a, and a now wants b as parent
        let stored = store(&[("ds1:a", &[]), ("ds1:b", &["ds1:c"]), ("ds1:c", &["ds1:a"])]);
        let mut target = new_target("a");
        target.parent = Some(TargetId::new("ds1:b"));
        let err = check(&target, &stored).unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn test_diamond_is_accepted() {
        let stored = store(&[("ds1:root", &[]), ("ds1:l", &["ds1:root"]), ("ds1:r", &["ds1:root"])]);
        let mut target = new_target("leaf");
        target.parent = Some(TargetId::new("ds1:l"));
        target.second_parent = Some(TargetId::new("ds1:r"));
        assert!(check(&target, &stored).is_ok());
    }

    #[test]
    fn test_schedule_rules() {
        let target = TargetId::new("ds1:a");
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2021, 1, 31).unwrap(),
        )
        .unwrap();
        let ds = DataSourceId::new("ds1");
        let p = NewPeriod::new(ds.clone(), "p", range);
        assert!(validate_schedule(&target, &[p.clone()]).is_ok());
        assert!(validate_schedule(&target, &[p.clone(), p]).is_err());

        let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        let zero_week = NewPeriod::new(ds, "q", range)
            .with_opening(NewOpening::new(Weekday::Monday, nine, nine).in_week(0));
        assert!(validate_schedule(&target, &[zero_week]).is_err());
    }
}
