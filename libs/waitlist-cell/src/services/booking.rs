use tracing::{debug, info};

use appointment_cell::services::AppointmentBookingService;
use shared_database::AppState;
use shared_models::SchedulingError;

use crate::models::{BookOrWaitlistRequest, BookingOutcome, CreateWaitlistEntryRequest};
use crate::services::waitlist::WaitlistService;

/// Books directly, or files a waitlist entry when the window is already taken.
/// Nothing is ever promoted off the waitlist automatically.
pub struct WaitlistBookingService {
    booking_service: AppointmentBookingService,
    waitlist_service: WaitlistService,
}

impl WaitlistBookingService {
    pub fn new(state: &AppState) -> Self {
        Self {
            booking_service: AppointmentBookingService::new(state),
            waitlist_service: WaitlistService::new(state),
        }
    }

    pub async fn book_or_enqueue(
        &self,
        request: BookOrWaitlistRequest,
    ) -> Result<BookingOutcome, SchedulingError> {
        let BookOrWaitlistRequest { booking, ttl_days } = request;
        let entry_request = CreateWaitlistEntryRequest {
            patient_id: booking.patient_id,
            doctor_id: booking.doctor_id,
            preferred_date: booking.appointment_date,
            preferred_start_time: booking.start_time,
            preferred_end_time: booking.end_time,
            reason: booking.reason.clone(),
            ttl_days,
        };

        match self.booking_service.book_appointment(booking).await {
            Ok(appointment) => Ok(BookingOutcome::Booked { appointment }),
            Err(SchedulingError::Conflict(conflict)) => {
                debug!("Window taken, redirecting patient {} to the waitlist", entry_request.patient_id);

                let entry = self.waitlist_service.create_entry(entry_request).await?;
                info!("Patient {} waitlisted as entry {} for doctor {} on {}",
                      entry.patient_id, entry.id, entry.doctor_id, entry.preferred_date);
                Ok(BookingOutcome::Waitlisted { entry, conflict })
            }
            Err(e) => Err(e),
        }
    }
}
