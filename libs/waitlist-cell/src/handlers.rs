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
use shared_models::parse_date;

use crate::models::{
    BookOrWaitlistRequest, BulkCancelRequest, CreateWaitlistEntryRequest, UpdateWaitlistEntryRequest,
};
use crate::services::{WaitlistBookingService, WaitlistService};

#[derive(Debug, Default, Deserialize)]
pub struct DoctorFilterQuery {
    pub doctor_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct DateRangeQuery {
    pub start_date: String,
    pub end_date: String,
}

// ==============================================================================
// WAITLIST HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_entry(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateWaitlistEntryRequest>,
) -> Result<Json<Value>, AppError> {
    let entry = WaitlistService::new(&state).create_entry(request).await?;
    Ok(Json(json!(entry)))
}

#[axum::debug_handler]
pub async fn list_entries(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PageParams>,
) -> Result<Json<Value>, AppError> {
    let entries = WaitlistService::new(&state).list_entries(params.into_page()?).await?;

    Ok(Json(json!({
        "entries": entries,
        "total": entries.len()
    })))
}

#[axum::debug_handler]
pub async fn get_entry(
    State(state): State<Arc<AppState>>,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let entry = WaitlistService::new(&state).get_entry(entry_id).await?;
    Ok(Json(json!(entry)))
}

#[axum::debug_handler]
pub async fn update_entry(
    State(state): State<Arc<AppState>>,
    Path(entry_id): Path<Uuid>,
    Json(request): Json<UpdateWaitlistEntryRequest>,
) -> Result<Json<Value>, AppError> {
    let entry = WaitlistService::new(&state).update_entry(entry_id, request).await?;
    Ok(Json(json!(entry)))
}

#[axum::debug_handler]
pub async fn delete_entry(
    State(state): State<Arc<AppState>>,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    WaitlistService::new(&state).delete_entry(entry_id).await?;

    Ok(Json(json!({
        "message": "Waitlist entry deleted",
        "entry_id": entry_id
    })))
}

#[axum::debug_handler]
pub async fn notify_entry(
    State(state): State<Arc<AppState>>,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let entry = WaitlistService::new(&state).notify_entry(entry_id).await?;
    Ok(Json(json!(entry)))
}

#[axum::debug_handler]
pub async fn accept_entry(
    State(state): State<Arc<AppState>>,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let entry = WaitlistService::new(&state).accept_entry(entry_id).await?;
    Ok(Json(json!(entry)))
}

#[axum::debug_handler]
pub async fn decline_entry(
    State(state): State<Arc<AppState>>,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let entry = WaitlistService::new(&state).decline_entry(entry_id).await?;
    Ok(Json(json!(entry)))
}

#[axum::debug_handler]
pub async fn cancel_entry(
    State(state): State<Arc<AppState>>,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let entry = WaitlistService::new(&state).cancel_entry(entry_id).await?;
    Ok(Json(json!(entry)))
}

#[axum::debug_handler]
pub async fn bulk_cancel(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BulkCancelRequest>,
) -> Result<Json<Value>, AppError> {
    let cancelled = WaitlistService::new(&state).bulk_cancel(&request.entry_ids).await?;

    Ok(Json(json!({
        "requested": request.entry_ids.len(),
        "cancelled": cancelled
    })))
}

#[axum::debug_handler]
pub async fn book_or_waitlist(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BookOrWaitlistRequest>,
) -> Result<Json<Value>, AppError> {
    let outcome = WaitlistBookingService::new(&state).book_or_enqueue(request).await?;
    Ok(Json(json!(outcome)))
}

#[axum::debug_handler]
pub async fn get_patient_entries(
    State(state): State<Arc<AppState>>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let entries = WaitlistService::new(&state).get_patient_entries(patient_id).await?;

    Ok(Json(json!({
        "patient_id": patient_id,
        "entries": entries,
        "total": entries.len()
    })))
}

#[axum::debug_handler]
pub async fn get_patient_active_count(
    State(state): State<Arc<AppState>>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let active_count = WaitlistService::new(&state).count_active_for_patient(patient_id).await?;

    Ok(Json(json!({
        "patient_id": patient_id,
        "active_count": active_count,
        "max_allowed": state.config.scheduling.max_active_waitlist_entries_per_patient
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_entries(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let entries = WaitlistService::new(&state).get_doctor_entries(doctor_id).await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "entries": entries,
        "total": entries.len()
    })))
}

#[axum::debug_handler]
pub async fn get_statistics(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let stats = WaitlistService::new(&state).get_statistics(doctor_id).await?;
    Ok(Json(json!(stats)))
}

#[axum::debug_handler]
pub async fn get_entries_for_date(
    State(state): State<Arc<AppState>>,
    Path((doctor_id, date)): Path<(Uuid, String)>,
) -> Result<Json<Value>, AppError> {
    let date = parse_date("date", &date)?;
    let entries = WaitlistService::new(&state).get_entries_for_date(doctor_id, date).await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "date": date,
        "entries": entries
    })))
}

#[axum::debug_handler]
pub async fn get_priority_entries(
    State(state): State<Arc<AppState>>,
    Path((doctor_id, date)): Path<(Uuid, String)>,
) -> Result<Json<Value>, AppError> {
    let date = parse_date("date", &date)?;
    let entries = WaitlistService::new(&state).get_priority_entries(doctor_id, date).await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "date": date,
        "entries": entries
    })))
}

#[axum::debug_handler]
pub async fn get_entries_in_range(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<Uuid>,
    Query(range): Query<DateRangeQuery>,
) -> Result<Json<Value>, AppError> {
    let start_date = parse_date("start_date", &range.start_date)?;
    let end_date = parse_date("end_date", &range.end_date)?;
    let entries = WaitlistService::new(&state)
        .get_entries_in_range(doctor_id, start_date, end_date)
        .await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "start_date": start_date,
        "end_date": end_date,
        "entries": entries
    })))
}

#[axum::debug_handler]
pub async fn get_active_entries(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<DoctorFilterQuery>,
) -> Result<Json<Value>, AppError> {
    let entries = WaitlistService::new(&state).get_active_entries(filter.doctor_id).await?;

    Ok(Json(json!({
        "entries": entries,
        "total": entries.len()
    })))
}

#[axum::debug_handler]
pub async fn get_notified_entries(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<DoctorFilterQuery>,
) -> Result<Json<Value>, AppError> {
    let entries = WaitlistService::new(&state).get_notified_entries(filter.doctor_id).await?;

    Ok(Json(json!({
        "entries": entries,
        "total": entries.len()
    })))
}

#[axum::debug_handler]
pub async fn expire_old_entries(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, AppError> {
    let expired = WaitlistService::new(&state).expire_old_entries().await?;

    Ok(Json(json!({
        "message": "Expired waitlist entries",
        "expired_count": expired
    })))
}
