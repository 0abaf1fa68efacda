#[macro_use]
pub mod macros;
pub mod enums;
pub mod hours;
pub mod time;

pub use enums::{Status, TargetType, Weekday};
pub use hours::*;
pub use time::{DateRange, InvalidDateRange, TimeSpan};
