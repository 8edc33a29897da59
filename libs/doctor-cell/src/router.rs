use std::sync::Arc;

use axum::{
    routing::{get, patch, post},
    Router,
};

use shared_database::AppState;

use crate::handlers;

pub fn schedule_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(handlers::create_schedule).get(handlers::list_schedules))
        .route(
            "/{schedule_id}",
            get(handlers::get_schedule)
                .put(handlers::update_schedule)
                .delete(handlers::delete_schedule),
        )
        .route("/{schedule_id}/activate", patch(handlers::activate_schedule))
        .route("/{schedule_id}/deactivate", patch(handlers::deactivate_schedule))
        .route("/doctors/{doctor_id}", get(handlers::get_doctor_schedules))
        .route("/doctors/{doctor_id}/days/{day}", get(handlers::get_schedules_for_day))
        .route("/doctors/{doctor_id}/summary", get(handlers::get_schedule_summary))
        .route("/maintenance/expire", post(handlers::expire_old_schedules))
        .with_state(state)
}

pub fn blocked_slot_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(handlers::create_blocked_slot).get(handlers::list_blocked_slots))
        .route("/full-day", post(handlers::block_full_day))
        .route("/range", post(handlers::block_date_range))
        .route("/range/unblock", post(handlers::unblock_date_range))
        .route("/check", get(handlers::check_time_blocked))
        .route("/dates/{date}", get(handlers::get_blocks_on_date))
        .route(
            "/{slot_id}",
            get(handlers::get_blocked_slot)
                .put(handlers::update_blocked_slot)
                .delete(handlers::delete_blocked_slot),
        )
        .route("/doctors/{doctor_id}", get(handlers::get_doctor_blocks))
        .route("/doctors/{doctor_id}/dates/{date}", get(handlers::get_blocks_for_date))
        .route("/doctors/{doctor_id}/range", get(handlers::get_blocks_in_range))
        .route("/doctors/{doctor_id}/upcoming", get(handlers::get_upcoming_blocks))
        .route("/doctors/{doctor_id}/summary", get(handlers::get_block_summary))
        .route("/doctors/{doctor_id}/calendar/{year}/{month}", get(handlers::get_month_calendar))
        .with_state(state)
}
