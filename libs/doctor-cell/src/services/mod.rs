pub mod blocking;
pub mod schedule;

pub use blocking::BlockingService;
pub use schedule::ScheduleService;
