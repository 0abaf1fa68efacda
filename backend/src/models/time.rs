//! Calendar value types: inclusive date ranges and concrete time spans.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Rejected date range bounds.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("date range lower bound {lower} is after upper bound {upper}")]
pub struct InvalidDateRange {
    pub lower: NaiveDate,
    pub upper: NaiveDate,
}

/// Closed date interval `[lower, upper]`; both bounds are inclusive.
///
/// The bounds can only be set through [`DateRange::new`], so a value of this
/// type always satisfies `lower <= upper`. Serialized as `[lower, upper]`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateRange {
    lower: NaiveDate,
    upper: NaiveDate,
}

impl DateRange {
    pub fn new(lower: NaiveDate, upper: NaiveDate) -> Result<Self, InvalidDateRange> {
        if lower > upper {
            return Err(InvalidDateRange { lower, upper });
        }
        Ok(Self { lower, upper })
    }

    /// Range covering a single day.
    pub fn day(date: NaiveDate) -> Self {
        Self {
            lower: date,
            upper: date,
        }
    }

    pub fn lower(&self) -> NaiveDate {
        self.lower
    }

    pub fn upper(&self) -> NaiveDate {
        self.upper
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.lower <= date && date <= self.upper
    }

    /// Number of days covered, counting both bounds.
    pub fn len_days(&self) -> i64 {
        (self.upper - self.lower).num_days() + 1
    }

    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.lower <= other.upper && other.lower <= self.upper
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let upper = self.upper;
        self.lower.iter_days().take_while(move |d| *d <= upper)
    }
}

impl Serialize for DateRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (self.lower, self.upper).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DateRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (lower, upper) = <(NaiveDate, NaiveDate)>::deserialize(deserializer)?;
        DateRange::new(lower, upper).map_err(serde::de::Error::custom)
    }
}

/// Half-open interval `[start, end)` on the local timeline.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TimeSpan {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeSpan {
    /// Span from `opens` to `closes` starting on `date`.
    ///
    /// When `closes` is earlier than `opens` the span ends on the next
    /// calendar day; equal times are read as a full 24 hours.
    pub fn from_times(date: NaiveDate, opens: NaiveTime, closes: NaiveTime) -> Self {
        let start = date.and_time(opens);
        let end_date = if closes <= opens {
            date + Duration::days(1)
        } else {
            date
        };
        Self {
            start,
            end: end_date.and_time(closes),
        }
    }

    pub fn contains(&self, at: NaiveDateTime) -> bool {
        self.start <= at && at < self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn crosses_midnight(&self) -> bool {
        self.end.date() > self.start.date() && self.end.time() != NaiveTime::MIN
            || self.end.date() > self.start.date() + Duration::days(1)
    }

    /// Splits the span at every midnight it crosses.
    pub fn split_by_day(&self) -> Vec<TimeSpan> {
        let mut pieces = Vec::new();
        let mut cursor = self.start;
        while cursor < self.end {
            let next_midnight = (cursor.date() + Duration::days(1)).and_time(NaiveTime::MIN);
            let piece_end = next_midnight.min(self.end);
            pieces.push(TimeSpan {
                start: cursor,
                end: piece_end,
            });
            cursor = piece_end;
        }
        pieces
    }

    /// The part of this span falling on `date`, if any.
    pub fn on_day(&self, date: NaiveDate) -> Option<TimeSpan> {
        self.split_by_day()
            .into_iter()
            .find(|piece| piece.start.date() == date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_inverted_range_rejected() {
        let err = DateRange::new(date(2021, 2, 1), date(2021, 1, 1)).unwrap_err();
        assert_eq!(err.lower, date(2021, 2, 1));
        assert!(DateRange::new(date(2021, 1, 1), date(2021, 1, 1)).is_ok());
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let range = DateRange::new(date(2021, 1, 1), date(2021, 1, 3)).unwrap();
        assert!(range.contains(date(2021, 1, 1)));
        assert!(range.contains(date(2021, 1, 3)));
        assert!(!range.contains(date(2021, 1, 4)));
        assert_eq!(range.len_days(), 3);
        assert_eq!(range.days().count(), 3);
        assert_eq!(DateRange::day(date(2021, 7, 4)).len_days(), 1);
    }

    #[test]
    fn test_overlaps() {
        let a = DateRange::new(date(2021, 1, 1), date(2021, 1, 10)).unwrap();
        let b = DateRange::new(date(2021, 1, 10), date(2021, 1, 20)).unwrap();
        let c = DateRange::new(date(2021, 1, 11), date(2021, 1, 20)).unwrap();
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn test_serde_as_pair() {
        let range = DateRange::new(date(2021, 1, 1), date(2021, 12, 31)).unwrap();
        let json = serde_json::to_string(&range).unwrap();
        assert_eq!(json, r#"["2021-01-01","2021-12-31"]"#);

        let inverted = serde_json::from_str::<DateRange>(r#"["2021-12-31","2021-01-01"]"#);
        assert!(inverted.is_err());
    }

    #[test]
    fn test_overnight_span_split() {
        let span = TimeSpan::from_times(date(2021, 3, 5), time(22, 0), time(2, 0));
        assert!(span.crosses_midnight());
        assert_eq!(span.duration(), Duration::hours(4));

        let pieces = span.split_by_day();
        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[0].start, date(2021, 3, 5).and_time(time(22, 0)));
        assert_eq!(pieces[0].end, date(2021, 3, 6).and_time(NaiveTime::MIN));
        assert_eq!(pieces[1].start, date(2021, 3, 6).and_time(NaiveTime::MIN));
        assert_eq!(pieces[1].end, date(2021, 3, 6).and_time(time(2, 0)));

        assert!(span.contains(date(2021, 3, 6).and_time(time(1, 59))));
        assert!(!span.contains(date(2021, 3, 6).and_time(time(2, 0))));
    }

    #[test]
    fn test_same_day_span() {
        let span = TimeSpan::from_times(date(2021, 3, 5), time(7, 0), time(12, 0));
        assert!(!span.crosses_midnight());
        assert_eq!(span.split_by_day(), vec![span]);
        assert_eq!(span.on_day(date(2021, 3, 6)), None);
    }

    #[test]
    fn test_span_ending_at_midnight_does_not_cross() {
        let span = TimeSpan::from_times(date(2021, 3, 5), time(18, 0), NaiveTime::MIN);
        assert!(!span.crosses_midnight());
        assert_eq!(span.split_by_day().len(), 1);
    }
}
