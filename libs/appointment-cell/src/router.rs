use std::sync::Arc;

use axum::{
    routing::{get, patch, post},
    Router,
};

use shared_database::AppState;

use crate::handlers;

pub fn appointment_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(handlers::book_appointment).get(handlers::list_appointments))
        .route("/reminders", get(handlers::get_reminder_candidates))
        .route("/conflicts/check", get(handlers::check_conflicts))
        .route("/dates/{date}", get(handlers::get_appointments_on_date))
        .route(
            "/{appointment_id}",
            get(handlers::get_appointment)
                .put(handlers::update_appointment)
                .delete(handlers::delete_appointment),
        )
        .route("/{appointment_id}/confirm", patch(handlers::confirm_appointment))
        .route("/{appointment_id}/complete", patch(handlers::complete_appointment))
        .route("/{appointment_id}/cancel", patch(handlers::cancel_appointment))
        .route("/{appointment_id}/no-show", patch(handlers::mark_no_show))
        .route("/{appointment_id}/reschedule", patch(handlers::reschedule_appointment))
        .route("/{appointment_id}/history", get(handlers::get_appointment_history))
        .route("/patients/{patient_id}", get(handlers::get_patient_appointments))
        .route("/patients/{patient_id}/upcoming", get(handlers::get_upcoming_patient_appointments))
        .route("/patients/{patient_id}/past", get(handlers::get_past_patient_appointments))
        .route("/doctors/{doctor_id}", get(handlers::get_doctor_appointments))
        .route("/doctors/{doctor_id}/today", get(handlers::get_doctor_today))
        .route("/doctors/{doctor_id}/dates/{date}", get(handlers::get_doctor_appointments_on_date))
        .with_state(state)
}

pub fn availability_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/doctors/{doctor_id}/dates/{date}/slots", get(handlers::get_theoretical_slots))
        .route("/doctors/{doctor_id}/dates/{date}/available", get(handlers::get_available_slots))
        .route("/check", get(handlers::check_window))
        .with_state(state)
}
