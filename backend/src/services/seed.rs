//! Bulk ingestion of a JSON schedule document.
//!
//! ```json
//! {
//!   "data_sources": [{"id": "ds1", "name": "Example"}],
//!   "targets": [{"data_source": "ds1", "origin_id": "1", "target_type": 1}],
//!   "schedules": [{"target": "ds1:1", "periods": [ ... ]}]
//! }
//! ```
//!
//! Enum fields take their numeric codes. Targets may appear in any order;
//! a target is written once the targets it links to are in place.

use std::collections::HashSet;
use std::path::Path;

use log::{info, warn};
use serde::Deserialize;

use crate::db::repository::{IngestRepository, RepositoryError, RepositoryResult};
use crate::models::{DataSource, NewPeriod, NewTarget, TargetId};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedDocument {
    #[serde(default)]
    pub data_sources: Vec<DataSource>,
    #[serde(default)]
    pub targets: Vec<NewTarget>,
    #[serde(default)]
    pub schedules: Vec<TargetSchedule>,
}

/// Full replacement schedule for one target.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetSchedule {
    pub target: TargetId,
    #[serde(default)]
    pub periods: Vec<NewPeriod>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub data_sources: usize,
    pub targets: usize,
    pub periods: usize,
    pub openings: usize,
    pub daily_hours: usize,
    pub conflicts: usize,
}

impl SeedDocument {
    pub fn from_json_str(json: &str) -> RepositoryResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| RepositoryError::validation(format!("Invalid seed document: {}", e)))
    }

    pub fn from_path(path: &Path) -> RepositoryResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            RepositoryError::configuration(format!(
                "Failed to read seed document {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json_str(&raw)
    }

    /// Targets reordered so that linked targets from this document come
    /// first. Targets caught in a cycle are appended last so the store can
    /// reject them.
    fn targets_in_dependency_order(&self) -> Vec<&NewTarget> {
        let in_document: HashSet<TargetId> = self.targets.iter().map(NewTarget::id).collect();
        let mut placed: HashSet<TargetId> = HashSet::new();
        let mut ordered = Vec::with_capacity(self.targets.len());
        let mut pending: Vec<&NewTarget> = self.targets.iter().collect();

        loop {
            let before = pending.len();
            pending.retain(|target| {
                let own = target.id();
                let ready = target
                    .parent
                    .iter()
                    .chain(target.second_parent.iter())
                    .chain(target.same_as.iter())
                    .all(|link| *link == own || !in_document.contains(link) || placed.contains(link));
                if ready {
                    placed.insert(own);
                    ordered.push(*target);
                }
                !ready
            });
            if pending.is_empty() || pending.len() == before {
                break;
            }
        }
        ordered.extend(pending);
        ordered
    }
}

/// Write `document` through `repository`, one atomic unit per item.
///
/// Stops at the first rejected item; earlier items stay written.
pub async fn seed<R>(repository: &R, document: &SeedDocument) -> RepositoryResult<SeedReport>
where
    R: IngestRepository + ?Sized,
{
    let mut report = SeedReport::default();

    for data_source in &document.data_sources {
        repository.upsert_data_source(data_source).await?;
        report.data_sources += 1;
    }

    for target in document.targets_in_dependency_order() {
        repository
            .upsert_target(target)
            .await
            .map_err(|e| e.with_operation(format!("seed target {}", target.id())))?;
        report.targets += 1;
    }

    for schedule in &document.schedules {
        let update = repository
            .replace_target_schedule(&schedule.target, schedule.periods.clone())
            .await
            .map_err(|e| e.with_operation(format!("seed schedule {}", schedule.target)))?;
        if !update.conflicts.is_empty() {
            warn!(
                "Target {} has {} ambiguous dates",
                update.target,
                update.conflicts.len()
            );
        }
        report.periods += update.periods;
        report.openings += update.openings;
        report.daily_hours += update.daily_hours;
        report.conflicts += update.conflicts.len();
    }

    info!(
        "Seeded {} data sources, {} targets, {} periods, {} openings, {} daily hours",
        report.data_sources, report.targets, report.periods, report.openings, report.daily_hours
    );
    Ok(report)
}
