use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use doctor_cell::services::ScheduleService;
use shared_database::AppState;

use crate::models::MaintenanceReport;
use crate::services::waitlist::WaitlistService;

/// Periodically ages out ended schedule templates and stale waitlist entries.
pub struct MaintenanceWorker {
    schedule_service: ScheduleService,
    waitlist_service: WaitlistService,
    period: Duration,
}

impl MaintenanceWorker {
    pub fn new(state: &AppState) -> Self {
        Self::with_period(state, Duration::from_secs(state.config.scheduling.maintenance_interval_secs))
    }

    pub fn with_period(state: &AppState, period: Duration) -> Self {
        Self {
            schedule_service: ScheduleService::new(state),
            waitlist_service: WaitlistService::new(state),
            period: period.max(Duration::from_secs(1)),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub async fn run_once(&self) -> MaintenanceReport {
        self.run_once_at(Utc::now()).await
    }

    /// One pass of both sweeps. A failing sweep is recorded in the report and
    /// does not stop the other.
    pub async fn run_once_at(&self, now: DateTime<Utc>) -> MaintenanceReport {
        let mut report = MaintenanceReport {
            ran_at: now,
            schedules_expired: 0,
            waitlist_entries_expired: 0,
            failures: Vec::new(),
        };

        match self.schedule_service.expire_old_schedules_at(now.date_naive()).await {
            Ok(count) => report.schedules_expired = count,
            Err(e) => {
                error!("Schedule expiry sweep failed: {}", e);
                report.failures.push(format!("schedules: {}", e));
            }
        }

        match self.waitlist_service.expire_old_entries_at(now).await {
            Ok(count) => report.waitlist_entries_expired = count,
            Err(e) => {
                error!("Waitlist expiry sweep failed: {}", e);
                report.failures.push(format!("waitlist: {}", e));
            }
        }

        info!("Maintenance pass done: {} schedules, {} waitlist entries expired",
              report.schedules_expired, report.waitlist_entries_expired);
        report
    }

    /// Runs a pass on every tick until `shutdown` flips to true or its sender
    /// is dropped. The first pass runs immediately.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!("Starting maintenance worker (every {:?})", self.period);

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_once().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("Maintenance worker received shutdown signal");
                        break;
                    }
                }
            }
        }

        info!("Maintenance worker stopped");
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
