use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use appointment_cell::models::{Appointment, BookAppointmentRequest};
use shared_database::Record;
use shared_models::TimeWindow;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WaitlistStatus {
    Active,
    Notified,
    Accepted,
    Declined,
    Cancelled,
    Expired,
}

impl WaitlistStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaitlistStatus::Active => "active",
            WaitlistStatus::Notified => "notified",
            WaitlistStatus::Accepted => "accepted",
            WaitlistStatus::Declined => "declined",
            WaitlistStatus::Cancelled => "cancelled",
            WaitlistStatus::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, WaitlistStatus::Active | WaitlistStatus::Notified)
    }

    /// EXPIRED is only reachable through the expiry sweep.
    pub fn can_transition_to(&self, next: WaitlistStatus) -> bool {
        use WaitlistStatus::*;
        matches!(
            (self, next),
            (Active, Notified)
                | (Notified, Accepted)
                | (Notified, Declined)
                | (Active, Cancelled)
                | (Notified, Cancelled)
                | (Active, Expired)
        )
    }

    /// Statuses that still hold a patient's place for a doctor and date.
    pub fn pending() -> [WaitlistStatus; 2] {
        [WaitlistStatus::Active, WaitlistStatus::Notified]
    }
}

impl fmt::Display for WaitlistStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitlistEntry {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub preferred_date: NaiveDate,
    pub preferred_start_time: NaiveTime,
    pub preferred_end_time: NaiveTime,
    pub reason: Option<String>,
    pub status: WaitlistStatus,
    pub added_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub notified_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Record for WaitlistEntry {
    const TABLE: &'static str = "waitlist";

    fn id(&self) -> Uuid {
        self.id
    }
}

impl WaitlistEntry {
    pub fn preferred_window(&self) -> TimeWindow {
        TimeWindow { start: self.preferred_start_time, end: self.preferred_end_time }
    }

    pub fn has_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == WaitlistStatus::Active && self.expires_at < now
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWaitlistEntryRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub preferred_date: NaiveDate,
    pub preferred_start_time: NaiveTime,
    pub preferred_end_time: NaiveTime,
    pub reason: Option<String>,
    /// Defaults to the configured TTL.
    pub ttl_days: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateWaitlistEntryRequest {
    pub preferred_date: Option<NaiveDate>,
    pub preferred_start_time: Option<NaiveTime>,
    pub preferred_end_time: Option<NaiveTime>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkCancelRequest {
    pub entry_ids: Vec<Uuid>,
}

/// Per-status counts for one doctor plus the head of the queue.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WaitlistStatistics {
    pub doctor_id: Uuid,
    pub total: usize,
    pub active: usize,
    pub notified: usize,
    pub accepted: usize,
    pub declined: usize,
    pub cancelled: usize,
    pub expired: usize,
    pub next_entries: Vec<WaitlistEntry>,
}

impl WaitlistStatistics {
    pub fn tally(doctor_id: Uuid, entries: &[WaitlistEntry]) -> Self {
        let mut stats = Self { doctor_id, total: entries.len(), ..Default::default() };
        for entry in entries {
            match entry.status {
                WaitlistStatus::Active => stats.active += 1,
                WaitlistStatus::Notified => stats.notified += 1,
                WaitlistStatus::Accepted => stats.accepted += 1,
                WaitlistStatus::Declined => stats.declined += 1,
                WaitlistStatus::Cancelled => stats.cancelled += 1,
                WaitlistStatus::Expired => stats.expired += 1,
            }
        }
        stats
    }
}

/// A booking attempt that falls back to the waitlist when the window is taken.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookOrWaitlistRequest {
    #[serde(flatten)]
    pub booking: BookAppointmentRequest,
    pub ttl_days: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BookingOutcome {
    Booked { appointment: Appointment },
    Waitlisted { entry: WaitlistEntry, conflict: String },
}

/// Result of one maintenance pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceReport {
    pub ran_at: DateTime<Utc>,
    pub schedules_expired: usize,
    pub waitlist_entries_expired: usize,
    pub failures: Vec<String>,
}
