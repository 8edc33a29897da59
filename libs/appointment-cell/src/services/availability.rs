use chrono::{NaiveDate, NaiveTime};
use tracing::debug;
use uuid::Uuid;

use doctor_cell::services::{BlockingService, ScheduleService};
use shared_database::AppState;
use shared_models::{DayOfWeek, SchedulingError, TimeWindow};

use crate::models::{AvailableSlot, SlotListing, TimeSlot, WindowCheck};
use crate::services::conflict::ConflictDetectionService;

/// Composes templates, blocks and appointments into slot views.
pub struct AvailabilityService {
    schedule_service: ScheduleService,
    blocking_service: BlockingService,
    conflict_service: ConflictDetectionService,
}

impl AvailabilityService {
    pub fn new(state: &AppState) -> Self {
        Self {
            schedule_service: ScheduleService::new(state),
            blocking_service: BlockingService::new(state),
            conflict_service: ConflictDetectionService::new(state),
        }
    }

    /// Raw template slots for `date`. Bookings and blocks are not subtracted.
    pub async fn get_theoretical_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<SlotListing<TimeSlot>, SchedulingError> {
        debug!("Generating theoretical slots for doctor {} on {}", doctor_id, date);

        let templates = self.schedule_service.get_effective_schedules(doctor_id, date).await?;
        let mut slots: Vec<TimeSlot> = templates
            .iter()
            .flat_map(|template| template.slots())
            .map(TimeSlot::from)
            .collect();
        slots.sort_by_key(|slot| slot.start_time);

        Ok(SlotListing {
            doctor_id,
            date,
            day_of_week: DayOfWeek::from_date(date),
            slots,
        })
    }

    /// Template slots the ledger would still accept. A slot touching a block or
    /// overlapped by any active appointment is dropped.
    pub async fn get_available_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<SlotListing<AvailableSlot>, SchedulingError> {
        debug!("Resolving available slots for doctor {} on {}", doctor_id, date);

        let templates = self.schedule_service.get_effective_schedules(doctor_id, date).await?;
        let blocks = self.blocking_service.get_blocks_for_date(doctor_id, date).await?;
        let appointments = self.conflict_service.active_appointments(doctor_id, date).await?;

        let mut slots: Vec<AvailableSlot> = templates
            .iter()
            .flat_map(|template| template.slots())
            .filter(|window| !blocks.iter().any(|block| block.window().overlaps(window)))
            .filter(|window| !appointments.iter().any(|a| a.window().overlaps(window)))
            .map(|window| AvailableSlot {
                start_time: window.start,
                end_time: window.end,
            })
            .collect();
        slots.sort_by_key(|slot| slot.start_time);

        Ok(SlotListing {
            doctor_id,
            date,
            day_of_week: DayOfWeek::from_date(date),
            slots,
        })
    }

    /// The authoritative booking check: no active appointment overlaps.
    pub async fn is_bookable(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> Result<bool, SchedulingError> {
        let window = TimeWindow::new(start_time, end_time)?;
        self.conflict_service.is_bookable(doctor_id, date, &window, None).await
    }

    /// Everything known about one window, for staff-facing diagnostics.
    pub async fn check_window(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> Result<WindowCheck, SchedulingError> {
        let window = TimeWindow::new(start_time, end_time)?;

        let conflicting_appointments = self
            .conflict_service
            .find_conflicts(doctor_id, date, &window, None)
            .await?;
        let block_check = self
            .blocking_service
            .is_time_blocked(doctor_id, date, start_time, end_time)
            .await?;
        let within_schedule = self
            .schedule_service
            .get_effective_schedules(doctor_id, date)
            .await?
            .iter()
            .any(|template| template.window().contains(&window));

        Ok(WindowCheck {
            bookable: conflicting_appointments.is_empty(),
            within_schedule,
            blocked: block_check.blocked,
            conflicting_appointments,
            conflicting_blocks: block_check.conflicting_blocks,
        })
    }
}
