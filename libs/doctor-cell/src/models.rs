use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_database::Record;
use shared_models::{DateRange, DayOfWeek, TimeWindow};

pub const MIN_SLOT_MINUTES: u32 = 1;
pub const MAX_SLOT_MINUTES: u32 = 480;
pub const MIN_PATIENTS_PER_SLOT: u32 = 1;
pub const MAX_PATIENTS_PER_SLOT: u32 = 50;

// ==============================================================================
// SCHEDULE TEMPLATES
// ==============================================================================

/// Lifecycle of a template. Templates are deactivated rather than deleted so
/// past appointments stay interpretable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateState {
    Active,
    Inactive,
}

impl TemplateState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateState::Active => "active",
            TemplateState::Inactive => "inactive",
        }
    }
}

/// A recurring weekly availability window for one doctor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleTemplate {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub day_of_week: DayOfWeek,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub slot_duration_minutes: u32,
    pub max_patients_per_slot: u32,
    pub effective_from: NaiveDate,
    pub effective_to: Option<NaiveDate>,
    pub state: TemplateState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for ScheduleTemplate {
    const TABLE: &'static str = "doctor_schedules";

    fn id(&self) -> Uuid {
        self.id
    }
}

impl ScheduleTemplate {
    pub fn window(&self) -> TimeWindow {
        TimeWindow { start: self.start_time, end: self.end_time }
    }

    pub fn effective_range(&self) -> DateRange {
        DateRange { from: self.effective_from, to: self.effective_to }
    }

    pub fn is_active(&self) -> bool {
        self.state == TemplateState::Active
    }

    pub fn is_effective_on(&self, date: NaiveDate) -> bool {
        self.is_active()
            && DayOfWeek::from_date(date) == self.day_of_week
            && self.effective_range().contains(date)
    }

    /// Theoretical slots carved out of the window; a trailing partial slot is dropped.
    pub fn slots(&self) -> Vec<TimeWindow> {
        self.window().split(self.slot_duration_minutes)
    }

    /// Whether this template's window and date range both intersect `other`'s.
    pub fn collides_with(&self, other: &ScheduleTemplate) -> bool {
        self.doctor_id == other.doctor_id
            && self.day_of_week == other.day_of_week
            && self.window().overlaps(&other.window())
            && self.effective_range().overlaps(&other.effective_range())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateScheduleRequest {
    pub doctor_id: Uuid,
    pub day_of_week: DayOfWeek,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub slot_duration_minutes: u32,
    pub max_patients_per_slot: Option<u32>,
    pub effective_from: NaiveDate,
    pub effective_to: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateScheduleRequest {
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub slot_duration_minutes: Option<u32>,
    pub max_patients_per_slot: Option<u32>,
    pub effective_from: Option<NaiveDate>,
    pub effective_to: Option<NaiveDate>,
}

impl UpdateScheduleRequest {
    pub fn touches_timeline(&self) -> bool {
        self.start_time.is_some()
            || self.end_time.is_some()
            || self.effective_from.is_some()
            || self.effective_to.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSummary {
    pub doctor_id: Uuid,
    pub total_active: usize,
    pub active_by_day: BTreeMap<DayOfWeek, usize>,
}

// ==============================================================================
// BLOCKED SLOTS
// ==============================================================================

/// An ad-hoc window during which the doctor takes no appointments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockedSlot {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub blocked_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub reason: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Record for BlockedSlot {
    const TABLE: &'static str = "blocked_slots";

    fn id(&self) -> Uuid {
        self.id
    }
}

impl BlockedSlot {
    pub fn window(&self) -> TimeWindow {
        TimeWindow { start: self.start_time, end: self.end_time }
    }

    pub fn is_full_day(&self) -> bool {
        self.start_time == full_day_start() && self.end_time == full_day_end()
    }
}

pub fn full_day_start() -> NaiveTime {
    NaiveTime::MIN
}

pub fn full_day_end() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBlockedSlotRequest {
    pub doctor_id: Uuid,
    pub blocked_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub reason: String,
    pub created_by: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockFullDayRequest {
    pub doctor_id: Uuid,
    pub blocked_date: NaiveDate,
    pub reason: String,
    pub created_by: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockDateRangeRequest {
    pub doctor_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: String,
    pub created_by: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnblockDateRangeRequest {
    pub doctor_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateBlockedSlotRequest {
    pub blocked_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub reason: Option<String>,
}

/// Outcome of "is this window blocked", with the offending blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockCheck {
    pub blocked: bool,
    pub conflicting_blocks: Vec<BlockedSlot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockRangeOutcome {
    pub created: Vec<BlockedSlot>,
    pub skipped_dates: Vec<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedSlotSummary {
    pub doctor_id: Uuid,
    pub total_blocks: usize,
    pub upcoming_blocks: usize,
    pub past_blocks: usize,
    pub blocked_dates: usize,
    pub next_blocked_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedMonth {
    pub doctor_id: Uuid,
    pub year: i32,
    pub month: u32,
    pub days: BTreeMap<NaiveDate, Vec<BlockedSlot>>,
}
