pub mod booking;
pub mod waitlist;
pub mod worker;

pub use booking::WaitlistBookingService;
pub use waitlist::WaitlistService;
pub use worker::MaintenanceWorker;
