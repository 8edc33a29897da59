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
use shared_models::{parse_date, parse_time, DayOfWeek};

use crate::models::{
    BlockDateRangeRequest, BlockFullDayRequest, CreateBlockedSlotRequest, CreateScheduleRequest,
    UnblockDateRangeRequest, UpdateBlockedSlotRequest, UpdateScheduleRequest,
};
use crate::services::{BlockingService, ScheduleService};

#[derive(Debug, Deserialize)]
pub struct DoctorSchedulesQuery {
    pub active_only: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct DateRangeQuery {
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Deserialize)]
pub struct BlockCheckQuery {
    pub doctor_id: Uuid,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
}

// ==============================================================================
// SCHEDULE TEMPLATE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_schedule(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateScheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let schedule = ScheduleService::new(&state).create_schedule(request).await?;
    Ok(Json(json!(schedule)))
}

#[axum::debug_handler]
pub async fn list_schedules(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PageParams>,
) -> Result<Json<Value>, AppError> {
    let schedules = ScheduleService::new(&state).list_schedules(params.into_page()?).await?;

    Ok(Json(json!({
        "schedules": schedules,
        "total": schedules.len()
    })))
}

#[axum::debug_handler]
pub async fn get_schedule(
    State(state): State<Arc<AppState>>,
    Path(schedule_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let schedule = ScheduleService::new(&state).get_schedule(schedule_id).await?;
    Ok(Json(json!(schedule)))
}

#[axum::debug_handler]
pub async fn update_schedule(
    State(state): State<Arc<AppState>>,
    Path(schedule_id): Path<Uuid>,
    Json(request): Json<UpdateScheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let schedule = ScheduleService::new(&state).update_schedule(schedule_id, request).await?;
    Ok(Json(json!(schedule)))
}

#[axum::debug_handler]
pub async fn activate_schedule(
    State(state): State<Arc<AppState>>,
    Path(schedule_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let schedule = ScheduleService::new(&state).activate_schedule(schedule_id).await?;
    Ok(Json(json!(schedule)))
}

#[axum::debug_handler]
pub async fn deactivate_schedule(
    State(state): State<Arc<AppState>>,
    Path(schedule_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let schedule = ScheduleService::new(&state).deactivate_schedule(schedule_id).await?;
    Ok(Json(json!(schedule)))
}

#[axum::debug_handler]
pub async fn delete_schedule(
    State(state): State<Arc<AppState>>,
    Path(schedule_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    ScheduleService::new(&state).delete_schedule(schedule_id).await?;

    Ok(Json(json!({
        "message": "Schedule deleted",
        "schedule_id": schedule_id
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_schedules(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<DoctorSchedulesQuery>,
) -> Result<Json<Value>, AppError> {
    let schedules = ScheduleService::new(&state)
        .get_doctor_schedules(doctor_id, query.active_only.unwrap_or(false))
        .await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "schedules": schedules,
        "total": schedules.len()
    })))
}

#[axum::debug_handler]
pub async fn get_schedules_for_day(
    State(state): State<Arc<AppState>>,
    Path((doctor_id, day)): Path<(Uuid, String)>,
) -> Result<Json<Value>, AppError> {
    let day: DayOfWeek = day.parse()?;
    let schedules = ScheduleService::new(&state).get_schedules_for_day(doctor_id, day).await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "day_of_week": day,
        "schedules": schedules
    })))
}

#[axum::debug_handler]
pub async fn get_schedule_summary(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let summary = ScheduleService::new(&state).get_schedule_summary(doctor_id).await?;
    Ok(Json(json!(summary)))
}

#[axum::debug_handler]
pub async fn expire_old_schedules(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, AppError> {
    let expired = ScheduleService::new(&state).expire_old_schedules().await?;
    Ok(Json(json!({ "expired": expired })))
}

// ==============================================================================
// BLOCKED SLOT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_blocked_slot(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateBlockedSlotRequest>,
) -> Result<Json<Value>, AppError> {
    let slot = BlockingService::new(&state).create_blocked_slot(request).await?;
    Ok(Json(json!(slot)))
}

#[axum::debug_handler]
pub async fn block_full_day(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BlockFullDayRequest>,
) -> Result<Json<Value>, AppError> {
    let slot = BlockingService::new(&state).block_full_day(request).await?;
    Ok(Json(json!(slot)))
}

#[axum::debug_handler]
pub async fn block_date_range(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BlockDateRangeRequest>,
) -> Result<Json<Value>, AppError> {
    let outcome = BlockingService::new(&state).block_date_range(request).await?;

    Ok(Json(json!({
        "blocked_days": outcome.created.len(),
        "skipped_dates": outcome.skipped_dates,
        "blocked_slots": outcome.created
    })))
}

#[axum::debug_handler]
pub async fn unblock_date_range(
    State(state): State<Arc<AppState>>,
    Json(request): Json<UnblockDateRangeRequest>,
) -> Result<Json<Value>, AppError> {
    let removed = BlockingService::new(&state).unblock_date_range(request).await?;
    Ok(Json(json!({ "removed": removed })))
}

#[axum::debug_handler]
pub async fn list_blocked_slots(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PageParams>,
) -> Result<Json<Value>, AppError> {
    let slots = BlockingService::new(&state).list_blocked_slots(params.into_page()?).await?;

    Ok(Json(json!({
        "blocked_slots": slots,
        "total": slots.len()
    })))
}

#[axum::debug_handler]
pub async fn get_blocked_slot(
    State(state): State<Arc<AppState>>,
    Path(slot_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let slot = BlockingService::new(&state).get_blocked_slot(slot_id).await?;
    Ok(Json(json!(slot)))
}

#[axum::debug_handler]
pub async fn update_blocked_slot(
    State(state): State<Arc<AppState>>,
    Path(slot_id): Path<Uuid>,
    Json(request): Json<UpdateBlockedSlotRequest>,
) -> Result<Json<Value>, AppError> {
    let slot = BlockingService::new(&state).update_blocked_slot(slot_id, request).await?;
    Ok(Json(json!(slot)))
}

#[axum::debug_handler]
pub async fn delete_blocked_slot(
    State(state): State<Arc<AppState>>,
    Path(slot_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    BlockingService::new(&state).delete_blocked_slot(slot_id).await?;

    Ok(Json(json!({
        "message": "Blocked slot deleted",
        "blocked_slot_id": slot_id
    })))
}

#[axum::debug_handler]
pub async fn check_time_blocked(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BlockCheckQuery>,
) -> Result<Json<Value>, AppError> {
    let date = parse_date("date", &query.date)?;
    let start_time = parse_time("start_time", &query.start_time)?;
    let end_time = parse_time("end_time", &query.end_time)?;

    let check = BlockingService::new(&state)
        .is_time_blocked(query.doctor_id, date, start_time, end_time)
        .await?;
    Ok(Json(json!(check)))
}

#[axum::debug_handler]
pub async fn get_doctor_blocks(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let slots = BlockingService::new(&state).get_doctor_blocks(doctor_id).await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "blocked_slots": slots,
        "total": slots.len()
    })))
}

#[axum::debug_handler]
pub async fn get_blocks_for_date(
    State(state): State<Arc<AppState>>,
    Path((doctor_id, date)): Path<(Uuid, String)>,
) -> Result<Json<Value>, AppError> {
    let date = parse_date("date", &date)?;
    let slots = BlockingService::new(&state).get_blocks_for_date(doctor_id, date).await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "date": date,
        "blocked_slots": slots
    })))
}

#[axum::debug_handler]
pub async fn get_blocks_on_date(
    State(state): State<Arc<AppState>>,
    Path(date): Path<String>,
) -> Result<Json<Value>, AppError> {
    let date = parse_date("date", &date)?;
    let slots = BlockingService::new(&state).get_blocks_on_date(date).await?;

    Ok(Json(json!({
        "date": date,
        "blocked_slots": slots,
        "total": slots.len()
    })))
}

#[axum::debug_handler]
pub async fn get_blocks_in_range(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<DateRangeQuery>,
) -> Result<Json<Value>, AppError> {
    let start_date = parse_date("start_date", &query.start_date)?;
    let end_date = parse_date("end_date", &query.end_date)?;
    let slots = BlockingService::new(&state)
        .get_blocks_in_range(doctor_id, start_date, end_date)
        .await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "start_date": start_date,
        "end_date": end_date,
        "blocked_slots": slots
    })))
}

#[axum::debug_handler]
pub async fn get_upcoming_blocks(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let slots = BlockingService::new(&state).get_upcoming_blocks(doctor_id).await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "blocked_slots": slots
    })))
}

#[axum::debug_handler]
pub async fn get_block_summary(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let summary = BlockingService::new(&state).get_block_summary(doctor_id).await?;
    Ok(Json(json!(summary)))
}

#[axum::debug_handler]
pub async fn get_month_calendar(
    State(state): State<Arc<AppState>>,
    Path((doctor_id, year, month)): Path<(Uuid, i32, u32)>,
) -> Result<Json<Value>, AppError> {
    let calendar = BlockingService::new(&state)
        .get_month_calendar(doctor_id, year, month)
        .await?;
    Ok(Json(json!(calendar)))
}
