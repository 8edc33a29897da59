pub mod calendar;
pub mod error;
pub mod interval;

pub use calendar::{DayOfWeek, parse_date, parse_time};
pub use error::{AppError, SchedulingError};
pub use interval::{overlaps, DateRange, TimeWindow};
