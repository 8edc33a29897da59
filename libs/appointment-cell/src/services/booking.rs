use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::locks::appointment_key;
use shared_database::{AppState, Page, Query, Repository, TimelineGuard, TimelineLocks};
use shared_models::{SchedulingError, TimeWindow};

use crate::models::{
    Appointment, AppointmentHistory, AppointmentStatus, BookAppointmentRequest,
    CancelAppointmentRequest, ChangeType, ReminderCandidate, RescheduleAppointmentRequest,
    UpdateAppointmentRequest,
};
use crate::services::conflict::ConflictDetectionService;
use crate::services::history::AppointmentHistoryService;
use crate::services::lifecycle::AppointmentLifecycleService;

pub struct AppointmentBookingService {
    repo: Arc<dyn Repository<Appointment>>,
    locks: TimelineLocks,
    conflict_service: ConflictDetectionService,
    lifecycle_service: AppointmentLifecycleService,
    history_service: AppointmentHistoryService,
}

impl AppointmentBookingService {
    pub fn new(state: &AppState) -> Self {
        Self {
            repo: state.db.repository(),
            locks: state.db.locks().clone(),
            conflict_service: ConflictDetectionService::new(state),
            lifecycle_service: AppointmentLifecycleService::new(),
            history_service: AppointmentHistoryService::new(state),
        }
    }

    /// Book a new appointment in SCHEDULED state.
    pub async fn book_appointment(
        &self,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, SchedulingError> {
        debug!("Booking appointment for patient {} with doctor {} on {} {}-{}",
               request.patient_id, request.doctor_id, request.appointment_date,
               request.start_time, request.end_time);

        validate_not_past(request.appointment_date)?;
        let window = TimeWindow::new(request.start_time, request.end_time)?;

        let _guard = self
            .locks
            .acquire(appointment_key(request.doctor_id, request.appointment_date))
            .await;
        self.ensure_slot_free(request.doctor_id, request.appointment_date, &window, None)
            .await?;

        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: request.patient_id,
            doctor_id: request.doctor_id,
            appointment_date: request.appointment_date,
            start_time: window.start,
            end_time: window.end,
            status: AppointmentStatus::Scheduled,
            appointment_type: request.appointment_type,
            reason: request.reason,
            symptoms: request.symptoms,
            notes: None,
            consultation_fee: request.consultation_fee,
            booked_at: now,
            cancelled_by: None,
            cancellation_reason: None,
            cancelled_at: None,
            updated_at: now,
        };

        let created = self.repo.insert(&appointment).await?;
        info!("Appointment {} booked for patient {} with doctor {}",
              created.id, created.patient_id, created.doctor_id);

        self.history_service
            .record(AppointmentHistory::between(ChangeType::Created, None, &created, None, None))
            .await;
        Ok(created)
    }

    pub async fn get_appointment(&self, appointment_id: Uuid) -> Result<Appointment, SchedulingError> {
        debug!("Fetching appointment: {}", appointment_id);

        self.repo.get(appointment_id).await?
            .ok_or_else(|| SchedulingError::not_found("Appointment", appointment_id))
    }

    pub async fn list_appointments(&self, page: Page) -> Result<Vec<Appointment>, SchedulingError> {
        let query = Query::new()
            .order_asc("appointment_date")
            .order_asc("start_time")
            .paginate(page);
        Ok(self.repo.find(&query).await?)
    }

    /// Edit fields. Not gated by the status machine, but moving the appointment
    /// re-checks the target timeline.
    pub async fn update_appointment(
        &self,
        appointment_id: Uuid,
        request: UpdateAppointmentRequest,
    ) -> Result<Appointment, SchedulingError> {
        debug!("Updating appointment: {}", appointment_id);

        let (current, _guards) = self
            .lock_appointment(appointment_id, |appointment| {
                vec![appointment_key(
                    request.doctor_id.unwrap_or(appointment.doctor_id),
                    request.appointment_date.unwrap_or(appointment.appointment_date),
                )]
            })
            .await?;
        let target_doctor = request.doctor_id.unwrap_or(current.doctor_id);
        let target_date = request.appointment_date.unwrap_or(current.appointment_date);

        let mut updated = current.clone();
        if request.moves_appointment() {
            if let Some(date) = request.appointment_date {
                validate_not_past(date)?;
            }
            let window = TimeWindow::new(
                request.start_time.unwrap_or(current.start_time),
                request.end_time.unwrap_or(current.end_time),
            )?;
            updated.doctor_id = target_doctor;
            updated.appointment_date = target_date;
            updated.start_time = window.start;
            updated.end_time = window.end;

            if updated.status.occupies_timeline() {
                self.ensure_slot_free(target_doctor, target_date, &window, Some(updated.id))
                    .await?;
            }
        }
        if let Some(appointment_type) = request.appointment_type {
            updated.appointment_type = appointment_type;
        }
        if request.reason.is_some() {
            updated.reason = request.reason.clone();
        }
        if request.symptoms.is_some() {
            updated.symptoms = request.symptoms.clone();
        }
        if request.notes.is_some() {
            updated.notes = request.notes.clone();
        }
        if request.consultation_fee.is_some() {
            updated.consultation_fee = request.consultation_fee;
        }

        updated.updated_at = Utc::now();
        let saved = self.repo.update(&updated).await?;
        info!("Appointment {} updated", saved.id);

        self.history_service
            .record(AppointmentHistory::between(
                ChangeType::Updated,
                Some(&current),
                &saved,
                None,
                request.updated_by,
            ))
            .await;
        Ok(saved)
    }

    pub async fn confirm_appointment(
        &self,
        appointment_id: Uuid,
        changed_by: Option<Uuid>,
    ) -> Result<Appointment, SchedulingError> {
        self.transition(appointment_id, AppointmentStatus::Confirmed, changed_by, None, |_| {})
            .await
    }

    pub async fn complete_appointment(
        &self,
        appointment_id: Uuid,
        changed_by: Option<Uuid>,
    ) -> Result<Appointment, SchedulingError> {
        self.transition(appointment_id, AppointmentStatus::Completed, changed_by, None, |_| {})
            .await
    }

    pub async fn mark_no_show(
        &self,
        appointment_id: Uuid,
        changed_by: Option<Uuid>,
    ) -> Result<Appointment, SchedulingError> {
        self.transition(appointment_id, AppointmentStatus::NoShow, changed_by, None, |_| {})
            .await
    }

    /// Cancel with canceller and reason. Does not touch the waitlist.
    pub async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
        request: CancelAppointmentRequest,
    ) -> Result<Appointment, SchedulingError> {
        let reason = request.reason.trim().to_string();
        if reason.is_empty() {
            return Err(SchedulingError::validation("Cancellation reason must not be empty"));
        }

        let cancelled_by = request.cancelled_by;
        let stamped_reason = reason.clone();
        self.transition(
            appointment_id,
            AppointmentStatus::Cancelled,
            Some(cancelled_by),
            Some(reason),
            move |appointment| {
                appointment.cancelled_by = Some(cancelled_by);
                appointment.cancellation_reason = Some(stamped_reason);
                appointment.cancelled_at = Some(Utc::now());
            },
        )
        .await
    }

    /// Move the appointment to a new date/time, checking every other
    /// appointment of the doctor on the target date.
    pub async fn reschedule_appointment(
        &self,
        appointment_id: Uuid,
        request: RescheduleAppointmentRequest,
    ) -> Result<Appointment, SchedulingError> {
        debug!("Rescheduling appointment {} to {} {}-{}",
               appointment_id, request.new_date, request.new_start_time, request.new_end_time);

        validate_not_past(request.new_date)?;
        let window = TimeWindow::new(request.new_start_time, request.new_end_time)?;

        let new_date = request.new_date;
        let (current, _guards) = self
            .lock_appointment(appointment_id, |appointment| {
                vec![appointment_key(appointment.doctor_id, new_date)]
            })
            .await?;

        self.lifecycle_service
            .validate_status_transition(current.status, AppointmentStatus::Rescheduled)?;
        self.ensure_slot_free(current.doctor_id, request.new_date, &window, Some(current.id))
            .await?;

        let mut rescheduled = current.clone();
        rescheduled.appointment_date = request.new_date;
        rescheduled.start_time = window.start;
        rescheduled.end_time = window.end;
        rescheduled.status = AppointmentStatus::Rescheduled;
        rescheduled.updated_at = Utc::now();

        let saved = self.repo.update(&rescheduled).await?;
        info!("Appointment {} rescheduled from {} {} to {} {}",
              saved.id, current.appointment_date, current.window(),
              saved.appointment_date, saved.window());

        self.history_service
            .record(AppointmentHistory::between(
                ChangeType::Rescheduled,
                Some(&current),
                &saved,
                request.reason,
                request.rescheduled_by,
            ))
            .await;
        Ok(saved)
    }

    /// Administrative hard delete.
    pub async fn delete_appointment(&self, appointment_id: Uuid) -> Result<(), SchedulingError> {
        debug!("Deleting appointment: {}", appointment_id);

        if !self.repo.delete(appointment_id).await? {
            return Err(SchedulingError::not_found("Appointment", appointment_id));
        }
        warn!("Appointment {} permanently deleted", appointment_id);
        Ok(())
    }

    pub async fn get_appointment_history(
        &self,
        appointment_id: Uuid,
    ) -> Result<Vec<AppointmentHistory>, SchedulingError> {
        self.get_appointment(appointment_id).await?;
        self.history_service.get_history(appointment_id).await
    }

    pub async fn get_patient_appointments(&self, patient_id: Uuid) -> Result<Vec<Appointment>, SchedulingError> {
        debug!("Fetching appointments for patient: {}", patient_id);

        let query = Query::new()
            .eq("patient_id", patient_id)
            .order_asc("appointment_date")
            .order_asc("start_time");
        Ok(self.repo.find(&query).await?)
    }

    /// Still-active appointments from today on, soonest first.
    pub async fn get_upcoming_patient_appointments(
        &self,
        patient_id: Uuid,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let query = Query::new()
            .eq("patient_id", patient_id)
            .gte("appointment_date", today())
            .is_in("status", AppointmentStatus::occupying().map(|s| s.as_str()))
            .order_asc("appointment_date")
            .order_asc("start_time");
        Ok(self.repo.find(&query).await?)
    }

    /// Appointments before today, most recent first.
    pub async fn get_past_patient_appointments(
        &self,
        patient_id: Uuid,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let query = Query::new()
            .eq("patient_id", patient_id)
            .lt("appointment_date", today())
            .order_desc("appointment_date")
            .order_desc("start_time");
        Ok(self.repo.find(&query).await?)
    }

    pub async fn get_doctor_appointments(&self, doctor_id: Uuid) -> Result<Vec<Appointment>, SchedulingError> {
        debug!("Fetching appointments for doctor: {}", doctor_id);

        let query = Query::new()
            .eq("doctor_id", doctor_id)
            .order_asc("appointment_date")
            .order_asc("start_time");
        Ok(self.repo.find(&query).await?)
    }

    pub async fn get_doctor_appointments_on_date(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let query = Query::new()
            .eq("doctor_id", doctor_id)
            .eq("appointment_date", date)
            .order_asc("start_time");
        Ok(self.repo.find(&query).await?)
    }

    pub async fn get_doctor_today(&self, doctor_id: Uuid) -> Result<Vec<Appointment>, SchedulingError> {
        self.get_doctor_appointments_on_date(doctor_id, today()).await
    }

    pub async fn get_appointments_on_date(&self, date: NaiveDate) -> Result<Vec<Appointment>, SchedulingError> {
        let query = Query::new()
            .eq("appointment_date", date)
            .order_asc("start_time");
        Ok(self.repo.find(&query).await?)
    }

    /// Active appointments in `[from, to]`, projected for the reminder scheduler.
    pub async fn get_reminder_candidates(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ReminderCandidate>, SchedulingError> {
        if to < from {
            return Err(SchedulingError::validation(format!(
                "to ({}) cannot be before from ({})",
                to, from
            )));
        }

        let query = Query::new()
            .gte("appointment_date", from)
            .lte("appointment_date", to)
            .is_in("status", AppointmentStatus::occupying().map(|s| s.as_str()))
            .order_asc("appointment_date")
            .order_asc("start_time");
        let appointments = self.repo.find(&query).await?;
        Ok(appointments.iter().map(ReminderCandidate::from).collect())
    }

    async fn transition<F>(
        &self,
        appointment_id: Uuid,
        target: AppointmentStatus,
        changed_by: Option<Uuid>,
        reason: Option<String>,
        stamp: F,
    ) -> Result<Appointment, SchedulingError>
    where
        F: FnOnce(&mut Appointment),
    {
        debug!("Changing appointment {} to {}", appointment_id, target);

        let (current, _guards) = self.lock_appointment(appointment_id, |_| Vec::new()).await?;

        self.lifecycle_service.validate_status_transition(current.status, target)?;

        let mut updated = current.clone();
        updated.status = target;
        stamp(&mut updated);
        updated.updated_at = Utc::now();

        let saved = self.repo.update(&updated).await?;
        info!("Appointment {} changed from {} to {}", saved.id, current.status, saved.status);

        self.history_service
            .record(AppointmentHistory::between(
                ChangeType::for_status(target),
                Some(&current),
                &saved,
                reason,
                changed_by,
            ))
            .await;
        Ok(saved)
    }

    /// Locks the appointment's own timeline plus `extra_keys(&appointment)` and
    /// returns the row as read under those locks. A concurrent move between the
    /// unlocked read and the lock is detected and the locking is retried.
    async fn lock_appointment<F>(
        &self,
        appointment_id: Uuid,
        extra_keys: F,
    ) -> Result<(Appointment, Vec<TimelineGuard>), SchedulingError>
    where
        F: Fn(&Appointment) -> Vec<String>,
    {
        loop {
            let snapshot = self.get_appointment(appointment_id).await?;
            let mut keys = extra_keys(&snapshot);
            keys.push(appointment_key(snapshot.doctor_id, snapshot.appointment_date));
            let guards = self.locks.acquire_many(keys).await;

            let current = self.get_appointment(appointment_id).await?;
            if current.doctor_id == snapshot.doctor_id
                && current.appointment_date == snapshot.appointment_date
            {
                return Ok((current, guards));
            }
            debug!("Appointment {} moved while waiting for its lock, retrying", appointment_id);
        }
    }

    /// Caller must hold the appointment lock for `doctor_id` and `date`.
    async fn ensure_slot_free(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        window: &TimeWindow,
        exclude: Option<Uuid>,
    ) -> Result<(), SchedulingError> {
        let conflicts = self
            .conflict_service
            .find_conflicts(doctor_id, date, window, exclude)
            .await?;

        if let Some(existing) = conflicts.first() {
            return Err(SchedulingError::conflict(format!(
                "Doctor {} already has appointment {} at {} on {}",
                doctor_id, existing.id, existing.window(), date
            )));
        }
        Ok(())
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn validate_not_past(date: NaiveDate) -> Result<(), SchedulingError> {
    if date < today() {
        return Err(SchedulingError::validation(format!(
            "appointment_date {} is in the past",
            date
        )));
    }
    Ok(())
}
