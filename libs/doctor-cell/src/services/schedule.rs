use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use shared_database::locks::template_key;
use shared_database::{AppState, Page, Query, Repository, TimelineLocks};
use shared_models::{DateRange, DayOfWeek, SchedulingError, TimeWindow};

use crate::models::{
    CreateScheduleRequest, ScheduleSummary, ScheduleTemplate, TemplateState,
    UpdateScheduleRequest, MAX_PATIENTS_PER_SLOT, MAX_SLOT_MINUTES, MIN_PATIENTS_PER_SLOT,
    MIN_SLOT_MINUTES,
};

pub struct ScheduleService {
    repo: Arc<dyn Repository<ScheduleTemplate>>,
    locks: TimelineLocks,
}

impl ScheduleService {
    pub fn new(state: &AppState) -> Self {
        Self {
            repo: state.db.repository(),
            locks: state.db.locks().clone(),
        }
    }

    /// Create a recurring availability window for a doctor.
    pub async fn create_schedule(
        &self,
        request: CreateScheduleRequest,
    ) -> Result<ScheduleTemplate, SchedulingError> {
        debug!("Creating schedule for doctor {} on {}", request.doctor_id, request.day_of_week);

        let max_patients = request.max_patients_per_slot.unwrap_or(MIN_PATIENTS_PER_SLOT);
        validate_template_fields(
            request.start_time,
            request.end_time,
            request.slot_duration_minutes,
            max_patients,
            request.effective_from,
            request.effective_to,
        )?;

        let now = Utc::now();
        let template = ScheduleTemplate {
            id: Uuid::new_v4(),
            doctor_id: request.doctor_id,
            day_of_week: request.day_of_week,
            start_time: request.start_time,
            end_time: request.end_time,
            slot_duration_minutes: request.slot_duration_minutes,
            max_patients_per_slot: max_patients,
            effective_from: request.effective_from,
            effective_to: request.effective_to,
            state: TemplateState::Active,
            created_at: now,
            updated_at: now,
        };

        let _guard = self.locks.acquire(template_key(template.doctor_id, template.day_of_week)).await;
        self.ensure_no_overlap(&template).await?;

        let created = self.repo.insert(&template).await?;
        info!("Schedule {} created for doctor {} ({} {})",
              created.id, created.doctor_id, created.day_of_week, created.window());
        Ok(created)
    }

    pub async fn get_schedule(&self, schedule_id: Uuid) -> Result<ScheduleTemplate, SchedulingError> {
        debug!("Fetching schedule: {}", schedule_id);

        self.repo.get(schedule_id).await?
            .ok_or_else(|| SchedulingError::not_found("Schedule", schedule_id))
    }

    pub async fn list_schedules(&self, page: Page) -> Result<Vec<ScheduleTemplate>, SchedulingError> {
        debug!("Listing schedules (skip {}, limit {})", page.skip, page.limit);

        let query = Query::new().order_asc("created_at").paginate(page);
        Ok(self.repo.find(&query).await?)
    }

    /// Every template for a doctor, ordered by weekday then start time.
    pub async fn get_doctor_schedules(
        &self,
        doctor_id: Uuid,
        active_only: bool,
    ) -> Result<Vec<ScheduleTemplate>, SchedulingError> {
        debug!("Fetching schedules for doctor: {} (active_only: {})", doctor_id, active_only);

        let mut query = Query::new().eq("doctor_id", doctor_id);
        if active_only {
            query = query.eq("state", TemplateState::Active.as_str());
        }

        let mut schedules = self.repo.find(&query).await?;
        schedules.sort_by_key(|s| (s.day_of_week, s.start_time));
        Ok(schedules)
    }

    pub async fn get_schedules_for_day(
        &self,
        doctor_id: Uuid,
        day_of_week: DayOfWeek,
    ) -> Result<Vec<ScheduleTemplate>, SchedulingError> {
        debug!("Fetching schedules for doctor {} on {}", doctor_id, day_of_week);

        let query = Query::new()
            .eq("doctor_id", doctor_id)
            .eq("day_of_week", day_of_week.as_str())
            .eq("state", TemplateState::Active.as_str())
            .order_asc("start_time");
        Ok(self.repo.find(&query).await?)
    }

    /// Active templates that apply on a concrete calendar date.
    pub async fn get_effective_schedules(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<ScheduleTemplate>, SchedulingError> {
        let schedules = self.get_schedules_for_day(doctor_id, DayOfWeek::from_date(date)).await?;
        Ok(schedules.into_iter().filter(|s| s.is_effective_on(date)).collect())
    }

    pub async fn update_schedule(
        &self,
        schedule_id: Uuid,
        request: UpdateScheduleRequest,
    ) -> Result<ScheduleTemplate, SchedulingError> {
        debug!("Updating schedule: {}", schedule_id);

        let current = self.get_schedule(schedule_id).await?;
        let _guard = self.locks.acquire(template_key(current.doctor_id, current.day_of_week)).await;
        let current = self.get_schedule(schedule_id).await?;

        let mut updated = current.clone();
        if let Some(start_time) = request.start_time {
            updated.start_time = start_time;
        }
        if let Some(end_time) = request.end_time {
            updated.end_time = end_time;
        }
        if let Some(slot) = request.slot_duration_minutes {
            updated.slot_duration_minutes = slot;
        }
        if let Some(max_patients) = request.max_patients_per_slot {
            updated.max_patients_per_slot = max_patients;
        }
        if let Some(from) = request.effective_from {
            updated.effective_from = from;
        }
        if let Some(to) = request.effective_to {
            updated.effective_to = Some(to);
        }

        validate_template_fields(
            updated.start_time,
            updated.end_time,
            updated.slot_duration_minutes,
            updated.max_patients_per_slot,
            updated.effective_from,
            updated.effective_to,
        )?;

        if request.touches_timeline() && updated.is_active() {
            self.ensure_no_overlap(&updated).await?;
        }

        updated.updated_at = Utc::now();
        let saved = self.repo.update(&updated).await?;
        info!("Schedule {} updated", saved.id);
        Ok(saved)
    }

    /// Re-activating may collide with templates created while this one was off.
    pub async fn activate_schedule(&self, schedule_id: Uuid) -> Result<ScheduleTemplate, SchedulingError> {
        debug!("Activating schedule: {}", schedule_id);

        let current = self.get_schedule(schedule_id).await?;
        let _guard = self.locks.acquire(template_key(current.doctor_id, current.day_of_week)).await;
        let mut schedule = self.get_schedule(schedule_id).await?;
        if schedule.is_active() {
            return Ok(schedule);
        }

        schedule.state = TemplateState::Active;
        self.ensure_no_overlap(&schedule).await?;

        schedule.updated_at = Utc::now();
        let saved = self.repo.update(&schedule).await?;
        info!("Schedule {} activated", saved.id);
        Ok(saved)
    }

    pub async fn deactivate_schedule(&self, schedule_id: Uuid) -> Result<ScheduleTemplate, SchedulingError> {
        debug!("Deactivating schedule: {}", schedule_id);

        let current = self.get_schedule(schedule_id).await?;
        let _guard = self.locks.acquire(template_key(current.doctor_id, current.day_of_week)).await;
        let mut schedule = self.get_schedule(schedule_id).await?;
        if !schedule.is_active() {
            return Ok(schedule);
        }

        schedule.state = TemplateState::Inactive;
        schedule.updated_at = Utc::now();
        let saved = self.repo.update(&schedule).await?;
        info!("Schedule {} deactivated", saved.id);
        Ok(saved)
    }

    /// Administrative hard delete. Normal retirement goes through deactivation.
    pub async fn delete_schedule(&self, schedule_id: Uuid) -> Result<(), SchedulingError> {
        debug!("Deleting schedule: {}", schedule_id);

        if !self.repo.delete(schedule_id).await? {
            return Err(SchedulingError::not_found("Schedule", schedule_id));
        }
        warn!("Schedule {} permanently deleted", schedule_id);
        Ok(())
    }

    pub async fn expire_old_schedules(&self) -> Result<usize, SchedulingError> {
        self.expire_old_schedules_at(Utc::now().date_naive()).await
    }

    /// Deactivates every active template whose `effective_to` is before `today`.
    /// Each record is re-read under its template lock before the write, so a
    /// concurrent edit is never overwritten. Failures are logged and skipped.
    pub async fn expire_old_schedules_at(&self, today: NaiveDate) -> Result<usize, SchedulingError> {
        debug!("Expiring schedules that ended before {}", today);

        let query = Query::new()
            .eq("state", TemplateState::Active.as_str())
            .lt("effective_to", today);
        let candidates = self.repo.find(&query).await?;

        let mut count = 0;
        for candidate in candidates {
            match self.expire_schedule(&candidate, today).await {
                Ok(true) => count += 1,
                Ok(false) => {}
                Err(e) => error!("Failed to expire schedule {}: {}", candidate.id, e),
            }
        }

        if count > 0 {
            info!("Expired {} schedules", count);
        }
        Ok(count)
    }

    async fn expire_schedule(
        &self,
        candidate: &ScheduleTemplate,
        today: NaiveDate,
    ) -> Result<bool, SchedulingError> {
        let _guard = self
            .locks
            .acquire(template_key(candidate.doctor_id, candidate.day_of_week))
            .await;
        let Some(mut schedule) = self.repo.get(candidate.id).await? else {
            return Ok(false);
        };
        if !schedule.is_active() || !schedule.effective_range().has_ended(today) {
            return Ok(false);
        }

        schedule.state = TemplateState::Inactive;
        schedule.updated_at = Utc::now();
        self.repo.update(&schedule).await?;
        Ok(true)
    }

    pub async fn get_schedule_summary(&self, doctor_id: Uuid) -> Result<ScheduleSummary, SchedulingError> {
        debug!("Building schedule summary for doctor: {}", doctor_id);

        let active = self.get_doctor_schedules(doctor_id, true).await?;
        let mut active_by_day: BTreeMap<DayOfWeek, usize> =
            DayOfWeek::ALL.iter().map(|day| (*day, 0)).collect();
        for schedule in &active {
            *active_by_day.entry(schedule.day_of_week).or_insert(0) += 1;
        }

        Ok(ScheduleSummary {
            doctor_id,
            total_active: active.len(),
            active_by_day,
        })
    }

    /// Caller must hold the template lock for the candidate's doctor and weekday.
    async fn ensure_no_overlap(&self, candidate: &ScheduleTemplate) -> Result<(), SchedulingError> {
        let query = Query::new()
            .eq("doctor_id", candidate.doctor_id)
            .eq("day_of_week", candidate.day_of_week.as_str())
            .eq("state", TemplateState::Active.as_str());
        let existing = self.repo.find(&query).await?;

        if let Some(clash) = existing
            .iter()
            .find(|other| other.id != candidate.id && other.collides_with(candidate))
        {
            warn!("Schedule for doctor {} on {} overlaps schedule {}",
                  candidate.doctor_id, candidate.day_of_week, clash.id);
            return Err(SchedulingError::conflict(format!(
                "Schedule overlaps existing active schedule {} ({} on {}, effective from {})",
                clash.id, clash.window(), clash.day_of_week, clash.effective_from
            )));
        }
        Ok(())
    }
}

fn validate_template_fields(
    start_time: chrono::NaiveTime,
    end_time: chrono::NaiveTime,
    slot_duration_minutes: u32,
    max_patients_per_slot: u32,
    effective_from: NaiveDate,
    effective_to: Option<NaiveDate>,
) -> Result<(), SchedulingError> {
    let window = TimeWindow::new(start_time, end_time)?;

    if !(MIN_SLOT_MINUTES..=MAX_SLOT_MINUTES).contains(&slot_duration_minutes) {
        return Err(SchedulingError::validation(format!(
            "slot_duration_minutes must be between {} and {}, got {}",
            MIN_SLOT_MINUTES, MAX_SLOT_MINUTES, slot_duration_minutes
        )));
    }
    if !(MIN_PATIENTS_PER_SLOT..=MAX_PATIENTS_PER_SLOT).contains(&max_patients_per_slot) {
        return Err(SchedulingError::validation(format!(
            "max_patients_per_slot must be between {} and {}, got {}",
            MIN_PATIENTS_PER_SLOT, MAX_PATIENTS_PER_SLOT, max_patients_per_slot
        )));
    }
    if window.duration_minutes() < i64::from(slot_duration_minutes) {
        return Err(SchedulingError::validation(format!(
            "Schedule window {} is shorter than one {}-minute slot",
            window, slot_duration_minutes
        )));
    }

    DateRange::new(effective_from, effective_to)?;
    Ok(())
}
