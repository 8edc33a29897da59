//! Overlap and ordering primitives shared by every scheduling component.
//!
//! Time windows are half-open `[start, end)`: a window ending exactly when
//! another begins does not overlap it. Effective date ranges are closed
//! `[from, to]` with an open end when `to` is `None`.

use chrono::{Duration, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::SchedulingError;

/// Half-open overlap test: `a_start < b_end && b_start < a_end`.
pub fn overlaps<T: PartialOrd>(a_start: T, a_end: T, b_start: T, b_end: T) -> bool {
    a_start < b_end && b_start < a_end
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeWindow {
    /// Builds a window, rejecting `start >= end`.
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, SchedulingError> {
        if start >= end {
            return Err(SchedulingError::validation(format!(
                "Start time ({}) must be before end time ({})",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        overlaps(self.start, self.end, other.start, other.end)
    }

    pub fn contains(&self, other: &TimeWindow) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn duration_minutes(&self) -> i64 {
        self.duration().num_minutes()
    }

    /// Consecutive `[start + k*len, start + (k+1)*len)` pieces that fit
    /// entirely inside the window. A trailing partial piece is dropped.
    pub fn split(&self, slot_minutes: u32) -> Vec<TimeWindow> {
        let mut slots = Vec::new();
        if slot_minutes == 0 {
            return slots;
        }

        let step = Duration::minutes(i64::from(slot_minutes));
        let mut cursor = self.start;
        loop {
            let (slot_end, wrapped) = cursor.overflowing_add_signed(step);
            if wrapped != 0 || slot_end > self.end || slot_end <= cursor {
                break;
            }
            slots.push(TimeWindow { start: cursor, end: slot_end });
            cursor = slot_end;
        }
        slots
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start.format("%H:%M:%S"), self.end.format("%H:%M:%S"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: Option<NaiveDate>) -> Result<Self, SchedulingError> {
        if let Some(to) = to {
            if to < from {
                return Err(SchedulingError::validation(format!(
                    "effective_to ({}) cannot be before effective_from ({})",
                    to, from
                )));
            }
        }
        Ok(Self { from, to })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && self.to.map_or(true, |to| date <= to)
    }

    pub fn overlaps(&self, other: &DateRange) -> bool {
        let self_to = self.to.unwrap_or(NaiveDate::MAX);
        let other_to = other.to.unwrap_or(NaiveDate::MAX);
        self.from <= other_to && other.from <= self_to
    }

    /// True once the whole range lies strictly before `today`.
    pub fn has_ended(&self, today: NaiveDate) -> bool {
        self.to.is_some_and(|to| to < today)
    }
}
