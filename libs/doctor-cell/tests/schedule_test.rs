use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use chrono::{NaiveDate, NaiveTime};
use tokio_test::assert_ok;
use uuid::Uuid;

use doctor_cell::models::{
    CreateScheduleRequest, ScheduleTemplate, TemplateState, UpdateScheduleRequest,
};
use doctor_cell::services::ScheduleService;
use shared_database::locks::template_key;
use shared_database::{AppState, Repository};
use shared_models::{DayOfWeek, SchedulingError};

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn monday_request(doctor_id: Uuid, start: NaiveTime, end: NaiveTime) -> CreateScheduleRequest {
    CreateScheduleRequest {
        doctor_id,
        day_of_week: DayOfWeek::Monday,
        start_time: start,
        end_time: end,
        slot_duration_minutes: 30,
        max_patients_per_slot: None,
        effective_from: d(2025, 1, 1),
        effective_to: None,
    }
}

#[tokio::test]
async fn test_create_schedule_defaults_to_active_single_patient() {
    let state = AppState::in_memory();
    let service = ScheduleService::new(&state);
    let doctor_id = Uuid::new_v4();

    let schedule = service.create_schedule(monday_request(doctor_id, t(9, 0), t(12, 0))).await.unwrap();

    assert_eq!(schedule.state, TemplateState::Active);
    assert_eq!(schedule.max_patients_per_slot, 1);
    assert_eq!(schedule.slots().len(), 6);
}

#[tokio::test]
async fn test_create_schedule_rejects_invalid_fields() {
    let state = AppState::in_memory();
    let service = ScheduleService::new(&state);
    let doctor_id = Uuid::new_v4();

    let inverted = monday_request(doctor_id, t(12, 0), t(9, 0));
    assert_matches!(service.create_schedule(inverted).await, Err(SchedulingError::Validation(_)));

    let mut too_long_slot = monday_request(doctor_id, t(9, 0), t(12, 0));
    too_long_slot.slot_duration_minutes = 481;
    assert_matches!(service.create_schedule(too_long_slot).await, Err(SchedulingError::Validation(_)));

    let mut shorter_than_slot = monday_request(doctor_id, t(9, 0), t(9, 20));
    shorter_than_slot.slot_duration_minutes = 30;
    assert_matches!(service.create_schedule(shorter_than_slot).await, Err(SchedulingError::Validation(_)));

    let mut crowded = monday_request(doctor_id, t(9, 0), t(12, 0));
    crowded.max_patients_per_slot = Some(51);
    assert_matches!(service.create_schedule(crowded).await, Err(SchedulingError::Validation(_)));

    let mut backwards_range = monday_request(doctor_id, t(9, 0), t(12, 0));
    backwards_range.effective_to = Some(d(2024, 12, 31));
    assert_matches!(service.create_schedule(backwards_range).await, Err(SchedulingError::Validation(_)));
}

#[tokio::test]
async fn test_overlapping_active_schedule_conflicts() {
    let state = AppState::in_memory();
    let service = ScheduleService::new(&state);
    let doctor_id = Uuid::new_v4();

    assert_ok!(service.create_schedule(monday_request(doctor_id, t(9, 0), t(12, 0))).await);

    let overlapping = monday_request(doctor_id, t(11, 0), t(13, 0));
    assert_matches!(service.create_schedule(overlapping).await, Err(SchedulingError::Conflict(_)));

    // Back-to-back windows share only a boundary.
    assert_ok!(service.create_schedule(monday_request(doctor_id, t(12, 0), t(14, 0))).await);

    // Same hours on another weekday or for another doctor are independent.
    let mut tuesday = monday_request(doctor_id, t(9, 0), t(12, 0));
    tuesday.day_of_week = DayOfWeek::Tuesday;
    assert_ok!(service.create_schedule(tuesday).await);
    assert_ok!(service.create_schedule(monday_request(Uuid::new_v4(), t(9, 0), t(12, 0))).await);
}

#[tokio::test]
async fn test_disjoint_effective_ranges_do_not_conflict() {
    let state = AppState::in_memory();
    let service = ScheduleService::new(&state);
    let doctor_id = Uuid::new_v4();

    let mut first_half = monday_request(doctor_id, t(9, 0), t(12, 0));
    first_half.effective_to = Some(d(2025, 6, 30));
    assert_ok!(service.create_schedule(first_half).await);

    let mut second_half = monday_request(doctor_id, t(9, 0), t(12, 0));
    second_half.effective_from = d(2025, 7, 1);
    assert_ok!(service.create_schedule(second_half).await);

    let mut straddling = monday_request(doctor_id, t(10, 0), t(11, 0));
    straddling.effective_from = d(2025, 6, 30);
    straddling.effective_to = Some(d(2025, 7, 1));
    assert_matches!(service.create_schedule(straddling).await, Err(SchedulingError::Conflict(_)));
}

#[tokio::test]
async fn test_update_rechecks_overlap_excluding_self() {
    let state = AppState::in_memory();
    let service = ScheduleService::new(&state);
    let doctor_id = Uuid::new_v4();

    let morning = service.create_schedule(monday_request(doctor_id, t(9, 0), t(12, 0))).await.unwrap();
    assert_ok!(service.create_schedule(monday_request(doctor_id, t(13, 0), t(17, 0))).await);

    // Stretching within its own window only overlaps itself.
    let widened = service
        .update_schedule(morning.id, UpdateScheduleRequest { start_time: Some(t(8, 0)), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(widened.start_time, t(8, 0));

    let into_afternoon = UpdateScheduleRequest { end_time: Some(t(14, 0)), ..Default::default() };
    assert_matches!(service.update_schedule(morning.id, into_afternoon).await, Err(SchedulingError::Conflict(_)));
}

#[tokio::test]
async fn test_deactivated_schedule_frees_window_and_activation_rechecks() {
    let state = AppState::in_memory();
    let service = ScheduleService::new(&state);
    let doctor_id = Uuid::new_v4();

    let original = service.create_schedule(monday_request(doctor_id, t(9, 0), t(12, 0))).await.unwrap();
    let inactive = service.deactivate_schedule(original.id).await.unwrap();
    assert_eq!(inactive.state, TemplateState::Inactive);

    assert_ok!(service.create_schedule(monday_request(doctor_id, t(10, 0), t(11, 0))).await);

    assert_matches!(service.activate_schedule(original.id).await, Err(SchedulingError::Conflict(_)));
    assert_eq!(service.get_schedule(original.id).await.unwrap().state, TemplateState::Inactive);
}

#[tokio::test]
async fn test_effective_schedules_respect_weekday_and_range() {
    let state = AppState::in_memory();
    let service = ScheduleService::new(&state);
    let doctor_id = Uuid::new_v4();

    let mut bounded = monday_request(doctor_id, t(9, 0), t(12, 0));
    bounded.effective_to = Some(d(2099, 1, 31));
    assert_ok!(service.create_schedule(bounded).await);

    // 2099-01-05 is a Monday, 2099-01-06 a Tuesday, 2099-02-02 a Monday after the range.
    assert_eq!(service.get_effective_schedules(doctor_id, d(2099, 1, 5)).await.unwrap().len(), 1);
    assert!(service.get_effective_schedules(doctor_id, d(2099, 1, 6)).await.unwrap().is_empty());
    assert!(service.get_effective_schedules(doctor_id, d(2099, 2, 2)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_expire_old_schedules_deactivates_only_ended_templates() {
    let state = AppState::in_memory();
    let service = ScheduleService::new(&state);
    let doctor_id = Uuid::new_v4();

    let mut ended = monday_request(doctor_id, t(9, 0), t(12, 0));
    ended.effective_to = Some(d(2025, 3, 31));
    let ended = service.create_schedule(ended).await.unwrap();

    let mut ends_today = monday_request(doctor_id, t(13, 0), t(15, 0));
    ends_today.effective_to = Some(d(2025, 4, 1));
    let ends_today = service.create_schedule(ends_today).await.unwrap();

    let open_ended = service.create_schedule(monday_request(doctor_id, t(16, 0), t(18, 0))).await.unwrap();

    let expired = service.expire_old_schedules_at(d(2025, 4, 1)).await.unwrap();
    assert_eq!(expired, 1);

    assert_eq!(service.get_schedule(ended.id).await.unwrap().state, TemplateState::Inactive);
    assert_eq!(service.get_schedule(ends_today.id).await.unwrap().state, TemplateState::Active);
    assert_eq!(service.get_schedule(open_ended.id).await.unwrap().state, TemplateState::Active);

    // Idempotent.
    assert_eq!(service.expire_old_schedules_at(d(2025, 4, 1)).await.unwrap(), 0);
}

#[tokio::test]
async fn test_expire_old_schedules_keeps_a_template_extended_after_the_scan() {
    let state = Arc::new(AppState::in_memory());
    let service = ScheduleService::new(&state);
    let doctor_id = Uuid::new_v4();

    let mut request = monday_request(doctor_id, t(9, 0), t(12, 0));
    request.effective_to = Some(d(2025, 3, 31));
    let schedule = service.create_schedule(request).await.unwrap();

    let guard = state
        .db
        .locks()
        .acquire(template_key(doctor_id, DayOfWeek::Monday))
        .await;
    let sweep = {
        let state = state.clone();
        tokio::spawn(async move { ScheduleService::new(&state).expire_old_schedules_at(d(2025, 4, 1)).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let mut extended = schedule.clone();
    extended.effective_to = Some(d(2025, 12, 31));
    state.db.repository::<ScheduleTemplate>().update(&extended).await.unwrap();
    drop(guard);

    assert_eq!(sweep.await.unwrap().unwrap(), 0);
    let stored = service.get_schedule(schedule.id).await.unwrap();
    assert_eq!(stored.state, TemplateState::Active);
    assert_eq!(stored.effective_to, Some(d(2025, 12, 31)));
}

#[tokio::test]
async fn test_summary_counts_active_templates_per_day() {
    let state = AppState::in_memory();
    let service = ScheduleService::new(&state);
    let doctor_id = Uuid::new_v4();

    assert_ok!(service.create_schedule(monday_request(doctor_id, t(9, 0), t(12, 0))).await);
    assert_ok!(service.create_schedule(monday_request(doctor_id, t(13, 0), t(17, 0))).await);
    let mut friday = monday_request(doctor_id, t(9, 0), t(12, 0));
    friday.day_of_week = DayOfWeek::Friday;
    let friday = service.create_schedule(friday).await.unwrap();
    service.deactivate_schedule(friday.id).await.unwrap();

    let summary = service.get_schedule_summary(doctor_id).await.unwrap();
    assert_eq!(summary.total_active, 2);
    assert_eq!(summary.active_by_day[&DayOfWeek::Monday], 2);
    assert_eq!(summary.active_by_day[&DayOfWeek::Friday], 0);
    assert_eq!(summary.active_by_day.len(), 7);
}

#[tokio::test]
async fn test_hard_delete_and_not_found() {
    let state = AppState::in_memory();
    let service = ScheduleService::new(&state);

    let schedule = service
        .create_schedule(monday_request(Uuid::new_v4(), t(9, 0), t(12, 0)))
        .await
        .unwrap();
    assert_ok!(service.delete_schedule(schedule.id).await);

    assert_matches!(service.get_schedule(schedule.id).await, Err(SchedulingError::NotFound(_)));
    assert_matches!(service.delete_schedule(schedule.id).await, Err(SchedulingError::NotFound(_)));
}
