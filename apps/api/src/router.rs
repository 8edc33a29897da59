use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::router::{appointment_routes, availability_routes};
use doctor_cell::router::{blocked_slot_routes, schedule_routes};
use shared_database::AppState;
use waitlist_cell::router::waitlist_routes;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic scheduling API is running!" }))
        .nest("/schedules", schedule_routes(state.clone()))
        .nest("/blocked-slots", blocked_slot_routes(state.clone()))
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/availability", availability_routes(state.clone()))
        .nest("/waitlist", waitlist_routes(state))
}
