use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_database::{AppState, PageParams};
use shared_models::error::AppError;
use shared_models::{parse_date, parse_time};

use crate::models::{
    BookAppointmentRequest, CancelAppointmentRequest, RescheduleAppointmentRequest,
    StatusActionQuery, UpdateAppointmentRequest,
};
use crate::services::{AppointmentBookingService, AvailabilityService, ConflictDetectionService};

#[derive(Debug, Deserialize)]
pub struct ReminderQuery {
    pub from: String,
    pub to: String,
}

/// `doctor_id` + `date` + `start_time` + `end_time` as raw query strings.
#[derive(Debug, Deserialize)]
pub struct WindowQuery {
    pub doctor_id: Uuid,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub exclude_appointment_id: Option<Uuid>,
}

// ==============================================================================
// APPOINTMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = AppointmentBookingService::new(&state).book_appointment(request).await?;
    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PageParams>,
) -> Result<Json<Value>, AppError> {
    let appointments = AppointmentBookingService::new(&state)
        .list_appointments(params.into_page()?)
        .await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = AppointmentBookingService::new(&state).get_appointment(appointment_id).await?;
    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = AppointmentBookingService::new(&state)
        .update_appointment(appointment_id, request)
        .await?;
    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn delete_appointment(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    AppointmentBookingService::new(&state).delete_appointment(appointment_id).await?;

    Ok(Json(json!({
        "message": "Appointment deleted",
        "appointment_id": appointment_id
    })))
}

#[axum::debug_handler]
pub async fn confirm_appointment(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<Uuid>,
    Query(actor): Query<StatusActionQuery>,
) -> Result<Json<Value>, AppError> {
    let appointment = AppointmentBookingService::new(&state)
        .confirm_appointment(appointment_id, actor.changed_by)
        .await?;
    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<Uuid>,
    Query(actor): Query<StatusActionQuery>,
) -> Result<Json<Value>, AppError> {
    let appointment = AppointmentBookingService::new(&state)
        .complete_appointment(appointment_id, actor.changed_by)
        .await?;
    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn mark_no_show(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<Uuid>,
    Query(actor): Query<StatusActionQuery>,
) -> Result<Json<Value>, AppError> {
    let appointment = AppointmentBookingService::new(&state)
        .mark_no_show(appointment_id, actor.changed_by)
        .await?;
    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = AppointmentBookingService::new(&state)
        .cancel_appointment(appointment_id, request)
        .await?;
    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = AppointmentBookingService::new(&state)
        .reschedule_appointment(appointment_id, request)
        .await?;
    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn get_appointment_history(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let history = AppointmentBookingService::new(&state)
        .get_appointment_history(appointment_id)
        .await?;

    Ok(Json(json!({
        "appointment_id": appointment_id,
        "history": history
    })))
}

#[axum::debug_handler]
pub async fn get_patient_appointments(
    State(state): State<Arc<AppState>>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointments = AppointmentBookingService::new(&state)
        .get_patient_appointments(patient_id)
        .await?;

    Ok(Json(json!({
        "patient_id": patient_id,
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_upcoming_patient_appointments(
    State(state): State<Arc<AppState>>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointments = AppointmentBookingService::new(&state)
        .get_upcoming_patient_appointments(patient_id)
        .await?;

    Ok(Json(json!({
        "patient_id": patient_id,
        "appointments": appointments
    })))
}

#[axum::debug_handler]
pub async fn get_past_patient_appointments(
    State(state): State<Arc<AppState>>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointments = AppointmentBookingService::new(&state)
        .get_past_patient_appointments(patient_id)
        .await?;

    Ok(Json(json!({
        "patient_id": patient_id,
        "appointments": appointments
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_appointments(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointments = AppointmentBookingService::new(&state)
        .get_doctor_appointments(doctor_id)
        .await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_today(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointments = AppointmentBookingService::new(&state).get_doctor_today(doctor_id).await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "appointments": appointments
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_appointments_on_date(
    State(state): State<Arc<AppState>>,
    Path((doctor_id, date)): Path<(Uuid, String)>,
) -> Result<Json<Value>, AppError> {
    let date = parse_date("date", &date)?;
    let appointments = AppointmentBookingService::new(&state)
        .get_doctor_appointments_on_date(doctor_id, date)
        .await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "date": date,
        "appointments": appointments
    })))
}

#[axum::debug_handler]
pub async fn get_appointments_on_date(
    State(state): State<Arc<AppState>>,
    Path(date): Path<String>,
) -> Result<Json<Value>, AppError> {
    let date = parse_date("date", &date)?;
    let appointments = AppointmentBookingService::new(&state)
        .get_appointments_on_date(date)
        .await?;

    Ok(Json(json!({
        "date": date,
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_reminder_candidates(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReminderQuery>,
) -> Result<Json<Value>, AppError> {
    let from = parse_date("from", &query.from)?;
    let to = parse_date("to", &query.to)?;
    let reminders = AppointmentBookingService::new(&state)
        .get_reminder_candidates(from, to)
        .await?;

    Ok(Json(json!({
        "from": from,
        "to": to,
        "reminders": reminders
    })))
}

#[axum::debug_handler]
pub async fn check_conflicts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<Value>, AppError> {
    let date = parse_date("date", &query.date)?;
    let start_time = parse_time("start_time", &query.start_time)?;
    let end_time = parse_time("end_time", &query.end_time)?;

    let response = ConflictDetectionService::new(&state)
        .check_conflicts(query.doctor_id, date, start_time, end_time, query.exclude_appointment_id)
        .await?;
    Ok(Json(json!(response)))
}

// ==============================================================================
// AVAILABILITY HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_theoretical_slots(
    State(state): State<Arc<AppState>>,
    Path((doctor_id, date)): Path<(Uuid, String)>,
) -> Result<Json<Value>, AppError> {
    let date = parse_date("date", &date)?;
    let listing = AvailabilityService::new(&state)
        .get_theoretical_slots(doctor_id, date)
        .await?;
    Ok(Json(json!(listing)))
}

#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<Arc<AppState>>,
    Path((doctor_id, date)): Path<(Uuid, String)>,
) -> Result<Json<Value>, AppError> {
    let date = parse_date("date", &date)?;
    let listing = AvailabilityService::new(&state)
        .get_available_slots(doctor_id, date)
        .await?;
    Ok(Json(json!(listing)))
}

#[axum::debug_handler]
pub async fn check_window(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<Value>, AppError> {
    let date = parse_date("date", &query.date)?;
    let start_time = parse_time("start_time", &query.start_time)?;
    let end_time = parse_time("end_time", &query.end_time)?;

    let check = AvailabilityService::new(&state)
        .check_window(query.doctor_id, date, start_time, end_time)
        .await?;
    Ok(Json(json!(check)))
}
