//! Closed vocabularies of the opening-hours model.
//!
//! Each value is persisted by its numeric code and emitted on the wire by its
//! label. Codes are part of the storage format: never renumber a variant.

use chrono::{Datelike, NaiveDate};

labeled_enum! {
    /// Opening status of a period or a single opening occurrence.
    Status {
        Open = 1 => "open",
        Closed = 2 => "closed",
        Undefined = 3 => "undefined",
        SelfService = 4 => "self-service",
    }
}

labeled_enum! {
    /// ISO weekday, Monday = 1.
    Weekday {
        Monday = 1 => "Monday",
        Tuesday = 2 => "Tuesday",
        Wednesday = 3 => "Wednesday",
        Thursday = 4 => "Thursday",
        Friday = 5 => "Friday",
        Saturday = 6 => "Saturday",
        Sunday = 7 => "Sunday",
    }
}

labeled_enum! {
    /// Kind of place or service whose hours are tracked.
    TargetType {
        Unit = 1 => "unit",
        Service = 2 => "service",
        ServiceAtUnit = 3 => "service at unit",
        SpecialGroup = 4 => "special group",
        Person = 5 => "person",
        Telephone = 6 => "telephone",
        ServiceChannel = 7 => "service channel",
        Resource = 8 => "resource",
        Building = 9 => "building",
        Area = 10 => "area",
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::Open
    }
}

impl Default for TargetType {
    fn default() -> Self {
        TargetType::Unit
    }
}

impl Weekday {
    pub fn of(date: NaiveDate) -> Self {
        match date.weekday() {
            chrono::Weekday::Mon => Weekday::Monday,
            chrono::Weekday::Tue => Weekday::Tuesday,
            chrono::Weekday::Wed => Weekday::Wednesday,
            chrono::Weekday::Thu => Weekday::Thursday,
            chrono::Weekday::Fri => Weekday::Friday,
            chrono::Weekday::Sat => Weekday::Saturday,
            chrono::Weekday::Sun => Weekday::Sunday,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip() {
        for status in Status::ALL {
            assert_eq!(Status::from_code(status.code()), Some(*status));
        }
        for weekday in Weekday::ALL {
            assert_eq!(Weekday::from_code(weekday.code()), Some(*weekday));
        }
        for target_type in TargetType::ALL {
            assert_eq!(TargetType::from_code(target_type.code()), Some(*target_type));
        }
    }

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(Status::Open.code(), 1);
        assert_eq!(Status::Closed.code(), 2);
        assert_eq!(Status::Undefined.code(), 3);
        assert_eq!(Status::SelfService.code(), 4);
        assert_eq!(Weekday::Monday.code(), 1);
        assert_eq!(Weekday::Sunday.code(), 7);
        assert_eq!(TargetType::ServiceAtUnit.code(), 3);
    }

    #[test]
    fn test_serializes_label_not_code() {
        assert_eq!(serde_json::to_string(&Status::Closed).unwrap(), "\"closed\"");
        assert_eq!(serde_json::to_string(&Status::SelfService).unwrap(), "\"self-service\"");
        assert_eq!(serde_json::to_string(&Weekday::Wednesday).unwrap(), "\"Wednesday\"");
        assert_eq!(
            serde_json::to_string(&TargetType::SpecialGroup).unwrap(),
            "\"special group\""
        );
    }

    #[test]
    fn test_deserializes_from_code() {
        let status: Status = serde_json::from_str("2").unwrap();
        assert_eq!(status, Status::Closed);
        assert!(serde_json::from_str::<Status>("42").is_err());
    }

    #[test]
    fn test_unknown_code() {
        assert_eq!(Status::from_code(0), None);
        assert_eq!(Weekday::from_code(8), None);
        assert_eq!(TargetType::from_code(-1), None);
    }

    #[test]
    fn test_weekday_of_date() {
        // 2021-07-04 was a Sunday
        let date = NaiveDate::from_ymd_opt(2021, 7, 4).unwrap();
        assert_eq!(Weekday::of(date), Weekday::Sunday);
        assert_eq!(Weekday::of(date.succ_opt().unwrap()), Weekday::Monday);
    }
}
