use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{Datelike, NaiveDate, NaiveTime, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use shared_database::locks::block_key;
use shared_database::{AppState, Page, Query, Repository, TimelineLocks};
use shared_models::{SchedulingError, TimeWindow};

use crate::models::{
    full_day_end, full_day_start, BlockCheck, BlockDateRangeRequest, BlockFullDayRequest,
    BlockRangeOutcome, BlockedMonth, BlockedSlot, BlockedSlotSummary, CreateBlockedSlotRequest,
    UnblockDateRangeRequest, UpdateBlockedSlotRequest,
};

pub struct BlockingService {
    repo: Arc<dyn Repository<BlockedSlot>>,
    locks: TimelineLocks,
    max_range_days: u32,
}

impl BlockingService {
    pub fn new(state: &AppState) -> Self {
        Self {
            repo: state.db.repository(),
            locks: state.db.locks().clone(),
            max_range_days: state.config.scheduling.max_block_range_days,
        }
    }

    /// Block a window on one date. Rejects past dates and overlaps with existing blocks.
    pub async fn create_blocked_slot(
        &self,
        request: CreateBlockedSlotRequest,
    ) -> Result<BlockedSlot, SchedulingError> {
        debug!("Blocking {} {}-{} for doctor {}",
               request.blocked_date, request.start_time, request.end_time, request.doctor_id);

        let reason = validate_reason(&request.reason)?;
        validate_not_past(request.blocked_date, today())?;
        let window = TimeWindow::new(request.start_time, request.end_time)?;

        let _guard = self.locks.acquire(block_key(request.doctor_id, request.blocked_date)).await;
        let conflicting = self
            .overlapping_blocks(request.doctor_id, request.blocked_date, &window, None)
            .await?;
        if let Some(existing) = conflicting.first() {
            warn!("Block request for doctor {} on {} overlaps block {}",
                  request.doctor_id, request.blocked_date, existing.id);
            return Err(SchedulingError::conflict(format!(
                "Time {} on {} overlaps existing blocked slot {} ({})",
                window, request.blocked_date, existing.id, existing.window()
            )));
        }

        let slot = new_block(request.doctor_id, request.blocked_date, window, reason, request.created_by);
        let created = self.repo.insert(&slot).await?;
        info!("Blocked slot {} created for doctor {}", created.id, created.doctor_id);
        Ok(created)
    }

    /// Block 00:00:00-23:59:59, only if the day carries no block yet.
    pub async fn block_full_day(&self, request: BlockFullDayRequest) -> Result<BlockedSlot, SchedulingError> {
        debug!("Blocking full day {} for doctor {}", request.blocked_date, request.doctor_id);

        let reason = validate_reason(&request.reason)?;
        validate_not_past(request.blocked_date, today())?;

        let _guard = self.locks.acquire(block_key(request.doctor_id, request.blocked_date)).await;
        let existing = self.get_blocks_for_date(request.doctor_id, request.blocked_date).await?;
        if !existing.is_empty() {
            return Err(SchedulingError::conflict(format!(
                "Doctor {} already has {} blocked slot(s) on {}",
                request.doctor_id, existing.len(), request.blocked_date
            )));
        }

        let slot = new_block(request.doctor_id, request.blocked_date, full_day(), reason, request.created_by);
        let created = self.repo.insert(&slot).await?;
        info!("Full day {} blocked for doctor {}", created.blocked_date, created.doctor_id);
        Ok(created)
    }

    /// Full-day blocks for every date in `[start_date, end_date]` that has no
    /// block yet. Either every missing day is blocked or none is.
    pub async fn block_date_range(
        &self,
        request: BlockDateRangeRequest,
    ) -> Result<BlockRangeOutcome, SchedulingError> {
        debug!("Blocking {} to {} for doctor {}", request.start_date, request.end_date, request.doctor_id);

        let reason = validate_reason(&request.reason)?;
        let dates = self.range_dates(request.start_date, request.end_date)?;
        validate_not_past(request.start_date, today())?;

        let _guards = self
            .locks
            .acquire_many(dates.iter().map(|date| block_key(request.doctor_id, date)))
            .await;

        let already_blocked: BTreeSet<NaiveDate> = self
            .get_blocks_in_range(request.doctor_id, request.start_date, request.end_date)
            .await?
            .into_iter()
            .map(|slot| slot.blocked_date)
            .collect();

        let mut created = Vec::new();
        let mut skipped_dates = Vec::new();
        for date in dates {
            if already_blocked.contains(&date) {
                skipped_dates.push(date);
                continue;
            }

            let slot = new_block(request.doctor_id, date, full_day(), reason.clone(), request.created_by);
            match self.repo.insert(&slot).await {
                Ok(slot) => created.push(slot),
                Err(e) => {
                    error!("Blocking {} for doctor {} failed, rolling back {} inserted block(s): {}",
                           date, request.doctor_id, created.len(), e);
                    self.roll_back(&created).await;
                    return Err(e.into());
                }
            }
        }

        info!("Blocked {} day(s) for doctor {}, skipped {}",
              created.len(), request.doctor_id, skipped_dates.len());
        Ok(BlockRangeOutcome { created, skipped_dates })
    }

    /// Removes every block in the range. Safe to re-run after a partial failure.
    pub async fn unblock_date_range(&self, request: UnblockDateRangeRequest) -> Result<usize, SchedulingError> {
        debug!("Unblocking {} to {} for doctor {}", request.start_date, request.end_date, request.doctor_id);

        let dates = self.range_dates(request.start_date, request.end_date)?;
        let _guards = self
            .locks
            .acquire_many(dates.iter().map(|date| block_key(request.doctor_id, date)))
            .await;

        let blocks = self
            .get_blocks_in_range(request.doctor_id, request.start_date, request.end_date)
            .await?;

        let mut removed = 0;
        for block in blocks {
            if self.repo.delete(block.id).await? {
                removed += 1;
            }
        }

        info!("Removed {} blocked slot(s) for doctor {}", removed, request.doctor_id);
        Ok(removed)
    }

    pub async fn update_blocked_slot(
        &self,
        slot_id: Uuid,
        request: UpdateBlockedSlotRequest,
    ) -> Result<BlockedSlot, SchedulingError> {
        debug!("Updating blocked slot: {}", slot_id);

        // The slot may move between the unlocked read and the lock; retry
        // until the locked date is still the slot's date.
        let (mut slot, _guards) = loop {
            let snapshot = self.get_blocked_slot(slot_id).await?;
            let target_date = request.blocked_date.unwrap_or(snapshot.blocked_date);
            let guards = self
                .locks
                .acquire_many([
                    block_key(snapshot.doctor_id, snapshot.blocked_date),
                    block_key(snapshot.doctor_id, target_date),
                ])
                .await;
            let slot = self.get_blocked_slot(slot_id).await?;
            if slot.doctor_id == snapshot.doctor_id && slot.blocked_date == snapshot.blocked_date {
                break (slot, guards);
            }
            debug!("Blocked slot {} moved while waiting for its lock, retrying", slot_id);
        };

        if let Some(date) = request.blocked_date {
            validate_not_past(date, today())?;
            slot.blocked_date = date;
        }
        if let Some(reason) = request.reason.as_deref() {
            slot.reason = validate_reason(reason)?;
        }
        let window = TimeWindow::new(
            request.start_time.unwrap_or(slot.start_time),
            request.end_time.unwrap_or(slot.end_time),
        )?;
        slot.start_time = window.start;
        slot.end_time = window.end;

        let conflicting = self
            .overlapping_blocks(slot.doctor_id, slot.blocked_date, &window, Some(slot.id))
            .await?;
        if let Some(existing) = conflicting.first() {
            return Err(SchedulingError::conflict(format!(
                "Time {} on {} overlaps existing blocked slot {}",
                window, slot.blocked_date, existing.id
            )));
        }

        let saved = self.repo.update(&slot).await?;
        info!("Blocked slot {} updated", saved.id);
        Ok(saved)
    }

    pub async fn delete_blocked_slot(&self, slot_id: Uuid) -> Result<(), SchedulingError> {
        debug!("Deleting blocked slot: {}", slot_id);

        if !self.repo.delete(slot_id).await? {
            return Err(SchedulingError::not_found("Blocked slot", slot_id));
        }
        info!("Blocked slot {} deleted", slot_id);
        Ok(())
    }

    pub async fn get_blocked_slot(&self, slot_id: Uuid) -> Result<BlockedSlot, SchedulingError> {
        self.repo.get(slot_id).await?
            .ok_or_else(|| SchedulingError::not_found("Blocked slot", slot_id))
    }

    pub async fn list_blocked_slots(&self, page: Page) -> Result<Vec<BlockedSlot>, SchedulingError> {
        let query = Query::new()
            .order_asc("blocked_date")
            .order_asc("start_time")
            .paginate(page);
        Ok(self.repo.find(&query).await?)
    }

    pub async fn get_doctor_blocks(&self, doctor_id: Uuid) -> Result<Vec<BlockedSlot>, SchedulingError> {
        debug!("Fetching blocked slots for doctor: {}", doctor_id);

        let query = Query::new()
            .eq("doctor_id", doctor_id)
            .order_asc("blocked_date")
            .order_asc("start_time");
        Ok(self.repo.find(&query).await?)
    }

    pub async fn get_blocks_for_date(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<BlockedSlot>, SchedulingError> {
        let query = Query::new()
            .eq("doctor_id", doctor_id)
            .eq("blocked_date", date)
            .order_asc("start_time");
        Ok(self.repo.find(&query).await?)
    }

    /// Blocks across all doctors on one date.
    pub async fn get_blocks_on_date(&self, date: NaiveDate) -> Result<Vec<BlockedSlot>, SchedulingError> {
        let query = Query::new()
            .eq("blocked_date", date)
            .order_asc("start_time");
        Ok(self.repo.find(&query).await?)
    }

    pub async fn get_blocks_in_range(
        &self,
        doctor_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<BlockedSlot>, SchedulingError> {
        if end_date < start_date {
            return Err(SchedulingError::validation(format!(
                "end_date ({}) cannot be before start_date ({})",
                end_date, start_date
            )));
        }

        let query = Query::new()
            .eq("doctor_id", doctor_id)
            .gte("blocked_date", start_date)
            .lte("blocked_date", end_date)
            .order_asc("blocked_date")
            .order_asc("start_time");
        Ok(self.repo.find(&query).await?)
    }

    pub async fn get_upcoming_blocks(&self, doctor_id: Uuid) -> Result<Vec<BlockedSlot>, SchedulingError> {
        let query = Query::new()
            .eq("doctor_id", doctor_id)
            .gte("blocked_date", today())
            .order_asc("blocked_date")
            .order_asc("start_time");
        Ok(self.repo.find(&query).await?)
    }

    /// Whether `[start, end)` on `date` touches any block, with the blocks it touches.
    pub async fn is_time_blocked(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> Result<BlockCheck, SchedulingError> {
        let window = TimeWindow::new(start_time, end_time)?;
        let conflicting_blocks = self.overlapping_blocks(doctor_id, date, &window, None).await?;

        Ok(BlockCheck {
            blocked: !conflicting_blocks.is_empty(),
            conflicting_blocks,
        })
    }

    pub async fn get_block_summary(&self, doctor_id: Uuid) -> Result<BlockedSlotSummary, SchedulingError> {
        let blocks = self.get_doctor_blocks(doctor_id).await?;
        let today = today();

        let upcoming: Vec<&BlockedSlot> = blocks.iter().filter(|b| b.blocked_date >= today).collect();
        let dates: BTreeSet<NaiveDate> = blocks.iter().map(|b| b.blocked_date).collect();

        Ok(BlockedSlotSummary {
            doctor_id,
            total_blocks: blocks.len(),
            upcoming_blocks: upcoming.len(),
            past_blocks: blocks.len() - upcoming.len(),
            blocked_dates: dates.len(),
            next_blocked_date: upcoming.first().map(|b| b.blocked_date),
        })
    }

    pub async fn get_month_calendar(
        &self,
        doctor_id: Uuid,
        year: i32,
        month: u32,
    ) -> Result<BlockedMonth, SchedulingError> {
        let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| {
            SchedulingError::validation(format!("Invalid month {}-{:02}", year, month))
        })?;
        let last = last_day_of_month(first)?;

        let mut days: BTreeMap<NaiveDate, Vec<BlockedSlot>> = BTreeMap::new();
        for block in self.get_blocks_in_range(doctor_id, first, last).await? {
            days.entry(block.blocked_date).or_default().push(block);
        }

        Ok(BlockedMonth { doctor_id, year, month, days })
    }

    async fn overlapping_blocks(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        window: &TimeWindow,
        exclude: Option<Uuid>,
    ) -> Result<Vec<BlockedSlot>, SchedulingError> {
        let blocks = self.get_blocks_for_date(doctor_id, date).await?;
        Ok(blocks
            .into_iter()
            .filter(|b| Some(b.id) != exclude && b.window().overlaps(window))
            .collect())
    }

    fn range_dates(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>, SchedulingError> {
        if end < start {
            return Err(SchedulingError::validation(format!(
                "end_date ({}) cannot be before start_date ({})",
                end, start
            )));
        }
        let days = (end - start).num_days() + 1;
        if days > i64::from(self.max_range_days) {
            return Err(SchedulingError::validation(format!(
                "Date range of {} days exceeds the maximum of {} days",
                days, self.max_range_days
            )));
        }
        Ok(start.iter_days().take_while(|d| *d <= end).collect())
    }

    async fn roll_back(&self, inserted: &[BlockedSlot]) {
        for slot in inserted {
            if let Err(e) = self.repo.delete(slot.id).await {
                error!("Failed to roll back blocked slot {}: {}", slot.id, e);
            }
        }
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn full_day() -> TimeWindow {
    TimeWindow { start: full_day_start(), end: full_day_end() }
}

fn new_block(doctor_id: Uuid, date: NaiveDate, window: TimeWindow, reason: String, created_by: Uuid) -> BlockedSlot {
    BlockedSlot {
        id: Uuid::new_v4(),
        doctor_id,
        blocked_date: date,
        start_time: window.start,
        end_time: window.end,
        reason,
        created_by,
        created_at: Utc::now(),
    }
}

fn validate_reason(reason: &str) -> Result<String, SchedulingError> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(SchedulingError::validation("reason must not be empty"));
    }
    Ok(reason.to_string())
}

fn validate_not_past(date: NaiveDate, today: NaiveDate) -> Result<(), SchedulingError> {
    if date < today {
        return Err(SchedulingError::validation(format!(
            "Cannot block past date {}",
            date
        )));
    }
    Ok(())
}

fn last_day_of_month(first: NaiveDate) -> Result<NaiveDate, SchedulingError> {
    let next_month = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
    };
    next_month
        .and_then(|d| d.pred_opt())
        .ok_or_else(|| SchedulingError::validation(format!("Month {} is out of range", first)))
}
