use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use doctor_cell::models::BlockedSlot;
use shared_database::Record;
use shared_models::{DayOfWeek, TimeWindow};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
    Rescheduled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no_show",
            AppointmentStatus::Rescheduled => "rescheduled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled | AppointmentStatus::NoShow
        )
    }

    /// Active statuses: only these hold the doctor's time.
    pub fn occupies_timeline(&self) -> bool {
        matches!(self, AppointmentStatus::Scheduled | AppointmentStatus::Confirmed)
    }

    pub fn occupying() -> [AppointmentStatus; 2] {
        [AppointmentStatus::Scheduled, AppointmentStatus::Confirmed]
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentType {
    #[default]
    #[serde(alias = "OPD")]
    Opd,
    #[serde(alias = "FOLLOW_UP", alias = "followup")]
    FollowUp,
    #[serde(alias = "EMERGENCY")]
    Emergency,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: AppointmentStatus,
    pub appointment_type: AppointmentType,
    pub reason: Option<String>,
    pub symptoms: Option<String>,
    pub notes: Option<String>,
    pub consultation_fee: Option<f64>,
    pub booked_at: DateTime<Utc>,
    pub cancelled_by: Option<Uuid>,
    pub cancellation_reason: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Appointment {
    const TABLE: &'static str = "appointments";

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Appointment {
    pub fn window(&self) -> TimeWindow {
        TimeWindow { start: self.start_time, end: self.end_time }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    #[serde(default)]
    pub appointment_type: AppointmentType,
    pub reason: Option<String>,
    pub symptoms: Option<String>,
    pub consultation_fee: Option<f64>,
}

/// Field edits. Moving the appointment (doctor/date/time) re-runs the conflict check.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub doctor_id: Option<Uuid>,
    pub appointment_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub appointment_type: Option<AppointmentType>,
    pub reason: Option<String>,
    pub symptoms: Option<String>,
    pub notes: Option<String>,
    pub consultation_fee: Option<f64>,
    pub updated_by: Option<Uuid>,
}

impl UpdateAppointmentRequest {
    pub fn moves_appointment(&self) -> bool {
        self.doctor_id.is_some()
            || self.appointment_date.is_some()
            || self.start_time.is_some()
            || self.end_time.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    pub cancelled_by: Uuid,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub new_date: NaiveDate,
    pub new_start_time: NaiveTime,
    pub new_end_time: NaiveTime,
    pub reason: Option<String>,
    pub rescheduled_by: Option<Uuid>,
}

/// Actor recorded in the history trail for narrow status actions.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusActionQuery {
    pub changed_by: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictCheckResponse {
    pub has_conflict: bool,
    pub conflicting_appointments: Vec<Appointment>,
}

// ==============================================================================
// AVAILABILITY
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl From<TimeWindow> for TimeSlot {
    fn from(window: TimeWindow) -> Self {
        Self { start_time: window.start, end_time: window.end }
    }
}

/// A template slot the ledger would accept right now: unblocked and not
/// overlapped by any active appointment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableSlot {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotListing<S> {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub day_of_week: DayOfWeek,
    pub slots: Vec<S>,
}

/// Diagnostic verdict for one window. `bookable` is the authoritative
/// appointment-only check; the other fields are informational.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowCheck {
    pub bookable: bool,
    pub within_schedule: bool,
    pub blocked: bool,
    pub conflicting_appointments: Vec<Appointment>,
    pub conflicting_blocks: Vec<BlockedSlot>,
}

// ==============================================================================
// HISTORY & REMINDERS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeType {
    Created,
    Updated,
    Rescheduled,
    Cancelled,
    Confirmed,
    Completed,
    NoShow,
    StatusChanged,
}

impl ChangeType {
    pub fn for_status(status: AppointmentStatus) -> Self {
        match status {
            AppointmentStatus::Confirmed => ChangeType::Confirmed,
            AppointmentStatus::Completed => ChangeType::Completed,
            AppointmentStatus::Cancelled => ChangeType::Cancelled,
            AppointmentStatus::NoShow => ChangeType::NoShow,
            AppointmentStatus::Rescheduled => ChangeType::Rescheduled,
            AppointmentStatus::Scheduled => ChangeType::StatusChanged,
        }
    }
}

/// Append-only audit row for an appointment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentHistory {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub change_type: ChangeType,
    pub old_date: Option<NaiveDate>,
    pub new_date: Option<NaiveDate>,
    pub old_start_time: Option<NaiveTime>,
    pub new_start_time: Option<NaiveTime>,
    pub old_end_time: Option<NaiveTime>,
    pub new_end_time: Option<NaiveTime>,
    pub old_status: Option<AppointmentStatus>,
    pub new_status: Option<AppointmentStatus>,
    pub reason: Option<String>,
    pub changed_by: Option<Uuid>,
    pub changed_at: DateTime<Utc>,
}

impl Record for AppointmentHistory {
    const TABLE: &'static str = "appointment_history";

    fn id(&self) -> Uuid {
        self.id
    }
}

impl AppointmentHistory {
    /// An event comparing the appointment before and after a change.
    pub fn between(
        change_type: ChangeType,
        before: Option<&Appointment>,
        after: &Appointment,
        reason: Option<String>,
        changed_by: Option<Uuid>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            appointment_id: after.id,
            change_type,
            old_date: before.map(|a| a.appointment_date),
            new_date: Some(after.appointment_date),
            old_start_time: before.map(|a| a.start_time),
            new_start_time: Some(after.start_time),
            old_end_time: before.map(|a| a.end_time),
            new_end_time: Some(after.end_time),
            old_status: before.map(|a| a.status),
            new_status: Some(after.status),
            reason,
            changed_by,
            changed_at: Utc::now(),
        }
    }
}

/// Read-only projection handed to the reminder scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderCandidate {
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: AppointmentStatus,
}

impl From<&Appointment> for ReminderCandidate {
    fn from(appointment: &Appointment) -> Self {
        Self {
            appointment_id: appointment.id,
            patient_id: appointment.patient_id,
            doctor_id: appointment.doctor_id,
            appointment_date: appointment.appointment_date,
            start_time: appointment.start_time,
            end_time: appointment.end_time,
            status: appointment.status,
        }
    }
}
