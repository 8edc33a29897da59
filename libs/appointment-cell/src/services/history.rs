use std::sync::Arc;

use tracing::{debug, error};
use uuid::Uuid;

use shared_database::{AppState, Query, Repository};
use shared_models::SchedulingError;

use crate::models::AppointmentHistory;

/// Append-only appointment audit trail.
pub struct AppointmentHistoryService {
    repo: Arc<dyn Repository<AppointmentHistory>>,
}

impl AppointmentHistoryService {
    pub fn new(state: &AppState) -> Self {
        Self { repo: state.db.repository() }
    }

    /// Stores an event. A failed write is logged and never reaches the caller.
    pub async fn record(&self, event: AppointmentHistory) {
        debug!("Recording {:?} for appointment {}", event.change_type, event.appointment_id);

        if let Err(e) = self.repo.insert(&event).await {
            error!("Failed to record history for appointment {}: {}", event.appointment_id, e);
        }
    }

    /// Events for one appointment, oldest first.
    pub async fn get_history(&self, appointment_id: Uuid) -> Result<Vec<AppointmentHistory>, SchedulingError> {
        let query = Query::new()
            .eq("appointment_id", appointment_id)
            .order_asc("changed_at");
        Ok(self.repo.find(&query).await?)
    }
}
