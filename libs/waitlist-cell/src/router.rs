use std::sync::Arc;

use axum::{
    routing::{get, patch, post},
    Router,
};

use shared_database::AppState;

use crate::handlers;

pub fn waitlist_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(handlers::create_entry).get(handlers::list_entries))
        .route("/book", post(handlers::book_or_waitlist))
        .route("/bulk-cancel", post(handlers::bulk_cancel))
        .route("/active", get(handlers::get_active_entries))
        .route("/notified", get(handlers::get_notified_entries))
        .route("/maintenance/expire", post(handlers::expire_old_entries))
        .route(
            "/{entry_id}",
            get(handlers::get_entry)
                .put(handlers::update_entry)
                .delete(handlers::delete_entry),
        )
        .route("/{entry_id}/notify", patch(handlers::notify_entry))
        .route("/{entry_id}/accept", patch(handlers::accept_entry))
        .route("/{entry_id}/decline", patch(handlers::decline_entry))
        .route("/{entry_id}/cancel", patch(handlers::cancel_entry))
        .route("/patients/{patient_id}", get(handlers::get_patient_entries))
        .route("/patients/{patient_id}/active-count", get(handlers::get_patient_active_count))
        .route("/doctors/{doctor_id}", get(handlers::get_doctor_entries))
        .route("/doctors/{doctor_id}/statistics", get(handlers::get_statistics))
        .route("/doctors/{doctor_id}/range", get(handlers::get_entries_in_range))
        .route("/doctors/{doctor_id}/dates/{date}", get(handlers::get_entries_for_date))
        .route("/doctors/{doctor_id}/dates/{date}/priority", get(handlers::get_priority_entries))
        .with_state(state)
}
