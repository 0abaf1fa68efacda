//! `?ordering=` support for list endpoints.
//!
//! The parameter is a comma separated list of field names, each optionally
//! prefixed with `-` for descending order. Every resource declares the
//! fields it can be ordered by; anything else is rejected before sorting.
//! Sorting is stable, so rows that compare equal keep the primary-key order
//! the repository returned them in. `None` values sort before `Some`.

use std::cmp::Ordering;

use crate::models::{DailyHoursWithOpening, PeriodWithOpenings, Target};

/// One parsed ordering term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderKey {
    pub field: &'static str,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderingError {
    #[error("ordering contains an empty field name")]
    EmptyField,
    #[error("cannot order by '{field}'; allowed fields: {allowed}")]
    UnknownField { field: String, allowed: String },
}

/// A resource that can be sorted by named fields.
pub trait Orderable {
    /// Fields accepted in `?ordering=`.
    const FIELDS: &'static [&'static str];
    /// Ordering applied when the request does not specify one.
    const DEFAULT_ORDERING: &'static [&'static str] = &[];

    fn compare_by(&self, other: &Self, field: &str) -> Ordering;
}

/// Parse `raw` against `T`'s fields, falling back to its default ordering.
pub fn parse_ordering<T: Orderable>(raw: Option<&str>) -> Result<Vec<OrderKey>, OrderingError> {
    let Some(raw) = raw else {
        return Ok(T::DEFAULT_ORDERING
            .iter()
            .map(|&field| OrderKey {
                field,
                descending: false,
            })
            .collect());
    };

    raw.split(',')
        .map(|term| {
            let term = term.trim();
            let (name, descending) = match term.strip_prefix('-') {
                Some(rest) => (rest, true),
                None => (term, false),
            };
            if name.is_empty() {
                return Err(OrderingError::EmptyField);
            }
            T::FIELDS
                .iter()
                .find(|known| **known == name)
                .map(|&field| OrderKey { field, descending })
                .ok_or_else(|| OrderingError::UnknownField {
                    field: name.to_string(),
                    allowed: T::FIELDS.join(", "),
                })
        })
        .collect()
}

/// Stable sort of `items` by `keys`, earlier keys taking priority.
pub fn apply_ordering<T: Orderable>(items: &mut [T], keys: &[OrderKey]) {
    if keys.is_empty() {
        return;
    }
    items.sort_by(|a, b| {
        keys.iter().fold(Ordering::Equal, |acc, key| {
            acc.then_with(|| {
                let ord = a.compare_by(b, key.field);
                if key.descending {
                    ord.reverse()
                } else {
                    ord
                }
            })
        })
    });
}

impl Orderable for Target {
    const FIELDS: &'static [&'static str] = &[
        "id",
        "data_source",
        "origin_id",
        "same_as",
        "target_type",
        "parent",
        "second_parent",
        "created_time",
        "last_modified_time",
        "publication_time",
        "hours_updated",
    ];

    fn compare_by(&self, other: &Self, field: &str) -> Ordering {
        match field {
            "id" => self.id.cmp(&other.id),
            "data_source" => self.data_source.cmp(&other.data_source),
            "origin_id" => self.origin_id.cmp(&other.origin_id),
            "same_as" => self.same_as.cmp(&other.same_as),
            "target_type" => self.target_type.code().cmp(&other.target_type.code()),
            "parent" => self.parent.cmp(&other.parent),
            "second_parent" => self.second_parent.cmp(&other.second_parent),
            "created_time" => self.created_time.cmp(&other.created_time),
            "last_modified_time" => self.last_modified_time.cmp(&other.last_modified_time),
            "publication_time" => self.publication_time.cmp(&other.publication_time),
            "hours_updated" => self.hours_updated.cmp(&other.hours_updated),
            _ => Ordering::Equal,
        }
    }
}

impl Orderable for PeriodWithOpenings {
    const FIELDS: &'static [&'static str] = &[
        "id",
        "data_source",
        "origin_id",
        "target",
        "status",
        "override",
        "period",
        "created_time",
        "last_modified_time",
        "publication_time",
    ];
    const DEFAULT_ORDERING: &'static [&'static str] = &["target"];

    fn compare_by(&self, other: &Self, field: &str) -> Ordering {
        let (a, b) = (&self.period, &other.period);
        match field {
            "id" => a.id.cmp(&b.id),
            "data_source" => a.data_source.cmp(&b.data_source),
            "origin_id" => a.origin_id.cmp(&b.origin_id),
            "target" => a.target.cmp(&b.target),
            "status" => a.status.code().cmp(&b.status.code()),
            "override" => a.is_override.cmp(&b.is_override),
            "period" => a.period.cmp(&b.period),
            "created_time" => a.created_time.cmp(&b.created_time),
            "last_modified_time" => a.last_modified_time.cmp(&b.last_modified_time),
            "publication_time" => a.publication_time.cmp(&b.publication_time),
            _ => Ordering::Equal,
        }
    }
}

impl Orderable for DailyHoursWithOpening {
    const FIELDS: &'static [&'static str] = &["id", "date", "target", "opening"];
    const DEFAULT_ORDERING: &'static [&'static str] = &["date", "target"];

    fn compare_by(&self, other: &Self, field: &str) -> Ordering {
        let (a, b) = (&self.daily_hours, &other.daily_hours);
        match field {
            "id" => a.id.cmp(&b.id),
            "date" => a.date.cmp(&b.date),
            "target" => a.target.cmp(&b.target),
            "opening" => a.opening.cmp(&b.opening),
            _ => Ordering::Equal,
        }
    }
}
