use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use shared_config::SchedulingSettings;
use shared_database::locks::waitlist_key;
use shared_database::{AppState, Page, Query, Repository, TimelineLocks};
use shared_models::{SchedulingError, TimeWindow};

use crate::models::{
    CreateWaitlistEntryRequest, UpdateWaitlistEntryRequest, WaitlistEntry, WaitlistStatistics,
    WaitlistStatus,
};

const NEXT_ENTRIES_IN_STATISTICS: usize = 5;

pub struct WaitlistService {
    repo: Arc<dyn Repository<WaitlistEntry>>,
    locks: TimelineLocks,
    settings: SchedulingSettings,
}

impl WaitlistService {
    pub fn new(state: &AppState) -> Self {
        Self {
            repo: state.db.repository(),
            locks: state.db.locks().clone(),
            settings: state.config.scheduling.clone(),
        }
    }

    /// Queue a patient for a doctor's preferred window.
    pub async fn create_entry(
        &self,
        request: CreateWaitlistEntryRequest,
    ) -> Result<WaitlistEntry, SchedulingError> {
        debug!("Adding patient {} to waitlist for doctor {} on {}",
               request.patient_id, request.doctor_id, request.preferred_date);

        validate_not_past(request.preferred_date)?;
        let window = TimeWindow::new(request.preferred_start_time, request.preferred_end_time)?;
        let ttl_days = self.validate_ttl(request.ttl_days)?;

        let _guard = self.locks.acquire(waitlist_key(request.patient_id)).await;

        let active = self.count_active_for_patient(request.patient_id).await?;
        let cap = self.settings.max_active_waitlist_entries_per_patient;
        if active >= cap {
            warn!("Patient {} already has {} active waitlist entries", request.patient_id, active);
            return Err(SchedulingError::capacity(format!(
                "Patient already has {} active waitlist entries; maximum allowed is {}",
                active, cap
            )));
        }

        if self
            .find_pending(request.patient_id, request.doctor_id, request.preferred_date, None)
            .await?
            .is_some()
        {
            return Err(SchedulingError::conflict(format!(
                "Patient {} is already waiting for doctor {} on {}",
                request.patient_id, request.doctor_id, request.preferred_date
            )));
        }

        let now = Utc::now();
        let entry = WaitlistEntry {
            id: Uuid::new_v4(),
            patient_id: request.patient_id,
            doctor_id: request.doctor_id,
            preferred_date: request.preferred_date,
            preferred_start_time: window.start,
            preferred_end_time: window.end,
            reason: request.reason,
            status: WaitlistStatus::Active,
            added_at: now,
            expires_at: now + Duration::days(i64::from(ttl_days)),
            notified_at: None,
            updated_at: now,
        };

        let created = self.repo.insert(&entry).await?;
        info!("Waitlist entry {} created for patient {} (expires {})",
              created.id, created.patient_id, created.expires_at);
        Ok(created)
    }

    pub async fn get_entry(&self, entry_id: Uuid) -> Result<WaitlistEntry, SchedulingError> {
        debug!("Fetching waitlist entry: {}", entry_id);

        self.repo.get(entry_id).await?
            .ok_or_else(|| SchedulingError::not_found("Waitlist entry", entry_id))
    }

    pub async fn list_entries(&self, page: Page) -> Result<Vec<WaitlistEntry>, SchedulingError> {
        let query = Query::new().order_asc("added_at").paginate(page);
        Ok(self.repo.find(&query).await?)
    }

    /// Newest first.
    pub async fn get_patient_entries(&self, patient_id: Uuid) -> Result<Vec<WaitlistEntry>, SchedulingError> {
        let query = Query::new()
            .eq("patient_id", patient_id)
            .order_desc("added_at");
        Ok(self.repo.find(&query).await?)
    }

    /// Oldest first.
    pub async fn get_doctor_entries(&self, doctor_id: Uuid) -> Result<Vec<WaitlistEntry>, SchedulingError> {
        let query = Query::new()
            .eq("doctor_id", doctor_id)
            .order_asc("added_at");
        Ok(self.repo.find(&query).await?)
    }

    pub async fn get_active_entries(&self, doctor_id: Option<Uuid>) -> Result<Vec<WaitlistEntry>, SchedulingError> {
        self.entries_with_status(WaitlistStatus::Active, doctor_id).await
    }

    pub async fn get_notified_entries(&self, doctor_id: Option<Uuid>) -> Result<Vec<WaitlistEntry>, SchedulingError> {
        self.entries_with_status(WaitlistStatus::Notified, doctor_id).await
    }

    pub async fn get_entries_for_date(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<WaitlistEntry>, SchedulingError> {
        let query = Query::new()
            .eq("doctor_id", doctor_id)
            .eq("preferred_date", date)
            .order_asc("added_at");
        Ok(self.repo.find(&query).await?)
    }

    pub async fn get_entries_in_range(
        &self,
        doctor_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<WaitlistEntry>, SchedulingError> {
        if start_date > end_date {
            return Err(SchedulingError::validation(format!(
                "start_date ({}) must not be after end_date ({})",
                start_date, end_date
            )));
        }

        let query = Query::new()
            .eq("doctor_id", doctor_id)
            .gte("preferred_date", start_date)
            .lte("preferred_date", end_date)
            .order_asc("preferred_date")
            .order_asc("added_at");
        Ok(self.repo.find(&query).await?)
    }

    /// ACTIVE entries for a doctor and date, first come first served.
    pub async fn get_priority_entries(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<WaitlistEntry>, SchedulingError> {
        let query = Query::new()
            .eq("doctor_id", doctor_id)
            .eq("preferred_date", date)
            .eq("status", WaitlistStatus::Active.as_str())
            .order_asc("added_at");
        Ok(self.repo.find(&query).await?)
    }

    pub async fn count_active_for_patient(&self, patient_id: Uuid) -> Result<usize, SchedulingError> {
        let query = Query::new()
            .eq("patient_id", patient_id)
            .eq("status", WaitlistStatus::Active.as_str());
        Ok(self.repo.find(&query).await?.len())
    }

    /// Edit the preferred window or reason of a still-pending entry.
    pub async fn update_entry(
        &self,
        entry_id: Uuid,
        request: UpdateWaitlistEntryRequest,
    ) -> Result<WaitlistEntry, SchedulingError> {
        debug!("Updating waitlist entry: {}", entry_id);

        let current = self.get_entry(entry_id).await?;
        let _guard = self.locks.acquire(waitlist_key(current.patient_id)).await;
        let current = self.get_entry(entry_id).await?;

        if current.status.is_terminal() {
            return Err(SchedulingError::state(format!(
                "Cannot update waitlist entry with status {}",
                current.status
            )));
        }

        let mut updated = current.clone();
        if let Some(date) = request.preferred_date {
            validate_not_past(date)?;
            if date != current.preferred_date
                && self
                    .find_pending(current.patient_id, current.doctor_id, date, Some(current.id))
                    .await?
                    .is_some()
            {
                return Err(SchedulingError::conflict(format!(
                    "Patient {} is already waiting for doctor {} on {}",
                    current.patient_id, current.doctor_id, date
                )));
            }
            updated.preferred_date = date;
        }
        let window = TimeWindow::new(
            request.preferred_start_time.unwrap_or(current.preferred_start_time),
            request.preferred_end_time.unwrap_or(current.preferred_end_time),
        )?;
        updated.preferred_start_time = window.start;
        updated.preferred_end_time = window.end;
        if request.reason.is_some() {
            updated.reason = request.reason;
        }
        updated.updated_at = Utc::now();

        let saved = self.repo.update(&updated).await?;
        info!("Waitlist entry {} updated", saved.id);
        Ok(saved)
    }

    /// ACTIVE -> NOTIFIED, stamping `notified_at`.
    pub async fn notify_entry(&self, entry_id: Uuid) -> Result<WaitlistEntry, SchedulingError> {
        self.transition(entry_id, WaitlistStatus::Notified).await
    }

    pub async fn accept_entry(&self, entry_id: Uuid) -> Result<WaitlistEntry, SchedulingError> {
        self.transition(entry_id, WaitlistStatus::Accepted).await
    }

    pub async fn decline_entry(&self, entry_id: Uuid) -> Result<WaitlistEntry, SchedulingError> {
        self.transition(entry_id, WaitlistStatus::Declined).await
    }

    pub async fn cancel_entry(&self, entry_id: Uuid) -> Result<WaitlistEntry, SchedulingError> {
        self.transition(entry_id, WaitlistStatus::Cancelled).await
    }

    /// Cancels the ACTIVE/NOTIFIED entries among `entry_ids`. Unknown ids and
    /// finished entries are skipped, and a failed write is logged without
    /// stopping the rest of the batch.
    pub async fn bulk_cancel(&self, entry_ids: &[Uuid]) -> Result<usize, SchedulingError> {
        if entry_ids.is_empty() {
            return Ok(0);
        }
        debug!("Bulk cancelling {} waitlist entries", entry_ids.len());

        let query = Query::new()
            .is_in("id", entry_ids.iter().copied())
            .is_in("status", WaitlistStatus::pending().map(|s| s.as_str()));
        let candidates = self.repo.find(&query).await?;

        let mut count = 0;
        for candidate in &candidates {
            let cancelled = self
                .rewrite_locked(
                    candidate,
                    |entry| entry.status.can_transition_to(WaitlistStatus::Cancelled),
                    |entry| entry.status = WaitlistStatus::Cancelled,
                )
                .await;
            match cancelled {
                Ok(true) => count += 1,
                Ok(false) => debug!("Waitlist entry {} finished before it could be cancelled", candidate.id),
                Err(e) => error!("Failed to cancel waitlist entry {}: {}", candidate.id, e),
            }
        }

        info!("Cancelled {} of {} requested waitlist entries", count, entry_ids.len());
        Ok(count)
    }

    pub async fn delete_entry(&self, entry_id: Uuid) -> Result<(), SchedulingError> {
        debug!("Deleting waitlist entry: {}", entry_id);

        if !self.repo.delete(entry_id).await? {
            return Err(SchedulingError::not_found("Waitlist entry", entry_id));
        }
        warn!("Waitlist entry {} permanently deleted", entry_id);
        Ok(())
    }

    pub async fn get_statistics(&self, doctor_id: Uuid) -> Result<WaitlistStatistics, SchedulingError> {
        let entries = self.get_doctor_entries(doctor_id).await?;
        let mut stats = WaitlistStatistics::tally(doctor_id, &entries);
        stats.next_entries = entries
            .into_iter()
            .filter(|e| e.status == WaitlistStatus::Active)
            .take(NEXT_ENTRIES_IN_STATISTICS)
            .collect();
        Ok(stats)
    }

    pub async fn expire_old_entries(&self) -> Result<usize, SchedulingError> {
        self.expire_old_entries_at(Utc::now()).await
    }

    /// Moves every ACTIVE entry whose `expires_at` has passed to EXPIRED.
    /// Other statuses are never touched, including entries notified between
    /// the scan and the write. Failures on individual records are logged and
    /// skipped.
    pub async fn expire_old_entries_at(&self, now: DateTime<Utc>) -> Result<usize, SchedulingError> {
        debug!("Expiring waitlist entries older than {}", now);

        let query = Query::new()
            .eq("status", WaitlistStatus::Active.as_str())
            .lt("expires_at", now);
        let candidates = self.repo.find(&query).await?;

        let mut count = 0;
        for candidate in &candidates {
            let expired = self
                .rewrite_locked(
                    candidate,
                    |entry| entry.status == WaitlistStatus::Active && entry.has_expired(now),
                    |entry| entry.status = WaitlistStatus::Expired,
                )
                .await;
            match expired {
                Ok(true) => count += 1,
                Ok(false) => {}
                Err(e) => error!("Failed to expire waitlist entry {}: {}", candidate.id, e),
            }
        }

        if count > 0 {
            info!("Expired {} waitlist entries", count);
        }
        Ok(count)
    }

    async fn transition(
        &self,
        entry_id: Uuid,
        target: WaitlistStatus,
    ) -> Result<WaitlistEntry, SchedulingError> {
        debug!("Changing waitlist entry {} to {}", entry_id, target);

        let current = self.get_entry(entry_id).await?;
        let _guard = self.locks.acquire(waitlist_key(current.patient_id)).await;
        let current = self.get_entry(entry_id).await?;

        if !current.status.can_transition_to(target) || target == WaitlistStatus::Expired {
            warn!("Invalid waitlist transition attempted: {} -> {}", current.status, target);
            return Err(SchedulingError::state(format!(
                "Cannot change waitlist entry from {} to {}",
                current.status, target
            )));
        }

        let mut updated = current.clone();
        updated.status = target;
        updated.updated_at = Utc::now();
        if target == WaitlistStatus::Notified {
            updated.notified_at = Some(updated.updated_at);
        }

        let saved = self.repo.update(&updated).await?;
        info!("Waitlist entry {} changed from {} to {}", saved.id, current.status, saved.status);
        Ok(saved)
    }

    /// Re-reads `candidate` under its patient lock and applies `change` only if
    /// `still_applies` holds for the fresh row. Returns whether it wrote.
    async fn rewrite_locked<P, C>(
        &self,
        candidate: &WaitlistEntry,
        still_applies: P,
        change: C,
    ) -> Result<bool, SchedulingError>
    where
        P: FnOnce(&WaitlistEntry) -> bool,
        C: FnOnce(&mut WaitlistEntry),
    {
        let _guard = self.locks.acquire(waitlist_key(candidate.patient_id)).await;
        let Some(mut entry) = self.repo.get(candidate.id).await? else {
            return Ok(false);
        };
        if !still_applies(&entry) {
            return Ok(false);
        }

        change(&mut entry);
        entry.updated_at = Utc::now();
        self.repo.update(&entry).await?;
        Ok(true)
    }

    async fn entries_with_status(
        &self,
        status: WaitlistStatus,
        doctor_id: Option<Uuid>,
    ) -> Result<Vec<WaitlistEntry>, SchedulingError> {
        let mut query = Query::new().eq("status", status.as_str());
        if let Some(doctor_id) = doctor_id {
            query = query.eq("doctor_id", doctor_id);
        }
        Ok(self.repo.find(&query.order_asc("added_at")).await?)
    }

    async fn find_pending(
        &self,
        patient_id: Uuid,
        doctor_id: Uuid,
        date: NaiveDate,
        exclude: Option<Uuid>,
    ) -> Result<Option<WaitlistEntry>, SchedulingError> {
        let query = Query::new()
            .eq("patient_id", patient_id)
            .eq("doctor_id", doctor_id)
            .eq("preferred_date", date)
            .is_in("status", WaitlistStatus::pending().map(|s| s.as_str()));
        Ok(self
            .repo
            .find(&query)
            .await?
            .into_iter()
            .find(|entry| Some(entry.id) != exclude))
    }

    fn validate_ttl(&self, ttl_days: Option<u32>) -> Result<u32, SchedulingError> {
        let ttl_days = ttl_days.unwrap_or(self.settings.default_waitlist_ttl_days);
        let max = self.settings.max_waitlist_ttl_days;
        if !(1..=max).contains(&ttl_days) {
            return Err(SchedulingError::validation(format!(
                "ttl_days must be between 1 and {}, got {}",
                max, ttl_days
            )));
        }
        Ok(ttl_days)
    }
}

fn validate_not_past(date: NaiveDate) -> Result<(), SchedulingError> {
    if date < Utc::now().date_naive() {
        return Err(SchedulingError::validation(format!(
            "preferred_date {} is in the past",
            date
        )));
    }
    Ok(())
}
