pub mod availability;
pub mod booking;
pub mod conflict;
pub mod history;
pub mod lifecycle;

pub use availability::AvailabilityService;
pub use booking::AppointmentBookingService;
pub use conflict::ConflictDetectionService;
pub use history::AppointmentHistoryService;
pub use lifecycle::AppointmentLifecycleService;
