use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::{AppState, Query, Repository};
use shared_models::{overlaps, SchedulingError, TimeWindow};

use crate::models::{Appointment, AppointmentStatus, ConflictCheckResponse};

/// Answers "does anything already hold this doctor's time".
pub struct ConflictDetectionService {
    repo: Arc<dyn Repository<Appointment>>,
}

impl ConflictDetectionService {
    pub fn new(state: &AppState) -> Self {
        Self { repo: state.db.repository() }
    }

    /// Check for appointment conflicts for a doctor on a date
    pub async fn check_conflicts(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<ConflictCheckResponse, SchedulingError> {
        let window = TimeWindow::new(start_time, end_time)?;
        let conflicting_appointments = self
            .find_conflicts(doctor_id, date, &window, exclude_appointment_id)
            .await?;

        Ok(ConflictCheckResponse {
            has_conflict: !conflicting_appointments.is_empty(),
            conflicting_appointments,
        })
    }

    /// True iff no active appointment overlaps the window.
    pub async fn is_bookable(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        window: &TimeWindow,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<bool, SchedulingError> {
        Ok(self
            .find_conflicts(doctor_id, date, window, exclude_appointment_id)
            .await?
            .is_empty())
    }

    pub async fn find_conflicts(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        window: &TimeWindow,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        debug!("Checking conflicts for doctor {} on {} at {}", doctor_id, date, window);

        let existing = self.active_appointments(doctor_id, date).await?;
        let conflicts: Vec<Appointment> = existing
            .into_iter()
            .filter(|appointment| Some(appointment.id) != exclude_appointment_id)
            .filter(|appointment| {
                self.appointments_overlap(
                    window.start,
                    window.end,
                    appointment.start_time,
                    appointment.end_time,
                )
            })
            .collect();

        if !conflicts.is_empty() {
            warn!("Conflict detected for doctor {} on {} - {} conflicting appointments",
                  doctor_id, date, conflicts.len());
        }
        Ok(conflicts)
    }

    /// Appointments of `doctor_id` on `date` that still hold their window.
    pub async fn active_appointments(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let query = Query::new()
            .eq("doctor_id", doctor_id)
            .eq("appointment_date", date)
            .is_in("status", AppointmentStatus::occupying().map(|s| s.as_str()))
            .order_asc("start_time");

        let appointments = self.repo.find(&query).await?;
        Ok(appointments
            .into_iter()
            .filter(|a| self.is_active_appointment(a.status))
            .collect())
    }

    pub fn appointments_overlap(
        &self,
        start1: NaiveTime,
        end1: NaiveTime,
        start2: NaiveTime,
        end2: NaiveTime,
    ) -> bool {
        overlaps(start1, end1, start2, end2)
    }

    pub fn is_active_appointment(&self, status: AppointmentStatus) -> bool {
        status.occupies_timeline()
    }
}
