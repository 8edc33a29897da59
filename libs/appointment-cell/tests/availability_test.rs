use assert_matches::assert_matches;
use chrono::{NaiveDate, NaiveTime};
use uuid::Uuid;

use appointment_cell::models::{AppointmentType, BookAppointmentRequest};
use appointment_cell::services::{AppointmentBookingService, AvailabilityService};
use doctor_cell::models::{BlockFullDayRequest, CreateBlockedSlotRequest, CreateScheduleRequest};
use doctor_cell::services::{BlockingService, ScheduleService};
use shared_database::AppState;
use shared_models::{DayOfWeek, SchedulingError};

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2099, 1, 5).unwrap()
}

async fn seed_monday_template(state: &AppState, doctor_id: Uuid, capacity: u32) {
    ScheduleService::new(state)
        .create_schedule(CreateScheduleRequest {
            doctor_id,
            day_of_week: DayOfWeek::Monday,
            start_time: t(9, 0),
            end_time: t(12, 0),
            slot_duration_minutes: 30,
            max_patients_per_slot: Some(capacity),
            effective_from: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            effective_to: None,
        })
        .await
        .unwrap();
}

async fn book(state: &AppState, doctor_id: Uuid, start: NaiveTime, end: NaiveTime) {
    AppointmentBookingService::new(state)
        .book_appointment(BookAppointmentRequest {
            patient_id: Uuid::new_v4(),
            doctor_id,
            appointment_date: monday(),
            start_time: start,
            end_time: end,
            appointment_type: AppointmentType::FollowUp,
            reason: None,
            symptoms: None,
            consultation_fee: None,
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_theoretical_slots_split_template_window() {
    let state = AppState::in_memory();
    let doctor_id = Uuid::new_v4();
    seed_monday_template(&state, doctor_id, 1).await;

    let listing = AvailabilityService::new(&state)
        .get_theoretical_slots(doctor_id, monday())
        .await
        .unwrap();

    assert_eq!(listing.day_of_week, DayOfWeek::Monday);
    let starts: Vec<NaiveTime> = listing.slots.iter().map(|s| s.start_time).collect();
    assert_eq!(starts, vec![t(9, 0), t(9, 30), t(10, 0), t(10, 30), t(11, 0), t(11, 30)]);
    assert_eq!(listing.slots.last().unwrap().end_time, t(12, 0));
}

#[tokio::test]
async fn test_no_template_on_other_weekday_yields_no_slots() {
    let state = AppState::in_memory();
    let doctor_id = Uuid::new_v4();
    seed_monday_template(&state, doctor_id, 1).await;

    let tuesday = NaiveDate::from_ymd_opt(2099, 1, 6).unwrap();
    let listing = AvailabilityService::new(&state)
        .get_theoretical_slots(doctor_id, tuesday)
        .await
        .unwrap();

    assert!(listing.slots.is_empty());
}

#[tokio::test]
async fn test_theoretical_slots_ignore_bookings_and_blocks() {
    let state = AppState::in_memory();
    let doctor_id = Uuid::new_v4();
    seed_monday_template(&state, doctor_id, 1).await;
    book(&state, doctor_id, t(9, 0), t(9, 30)).await;
    BlockingService::new(&state)
        .block_full_day(BlockFullDayRequest {
            doctor_id,
            blocked_date: monday(),
            reason: "Conference".to_string(),
            created_by: Uuid::new_v4(),
        })
        .await
        .unwrap();

    let service = AvailabilityService::new(&state);
    let theoretical = service.get_theoretical_slots(doctor_id, monday()).await.unwrap();
    let available = service.get_available_slots(doctor_id, monday()).await.unwrap();

    assert_eq!(theoretical.slots.len(), 6);
    assert!(available.slots.is_empty());
}

#[tokio::test]
async fn test_available_slots_drop_blocked_and_full_slots() {
    let state = AppState::in_memory();
    let doctor_id = Uuid::new_v4();
    seed_monday_template(&state, doctor_id, 1).await;
    book(&state, doctor_id, t(9, 0), t(9, 30)).await;
    BlockingService::new(&state)
        .create_blocked_slot(CreateBlockedSlotRequest {
            doctor_id,
            blocked_date: monday(),
            start_time: t(10, 0),
            end_time: t(11, 0),
            reason: "Ward round".to_string(),
            created_by: Uuid::new_v4(),
        })
        .await
        .unwrap();

    let listing = AvailabilityService::new(&state)
        .get_available_slots(doctor_id, monday())
        .await
        .unwrap();

    let starts: Vec<NaiveTime> = listing.slots.iter().map(|s| s.start_time).collect();
    assert_eq!(starts, vec![t(9, 30), t(11, 0), t(11, 30)]);
}

#[tokio::test]
async fn test_available_slots_only_advertise_bookable_windows() {
    let state = AppState::in_memory();
    let doctor_id = Uuid::new_v4();
    // A per-slot maximum above one does not let a second patient overlap.
    seed_monday_template(&state, doctor_id, 3).await;
    book(&state, doctor_id, t(9, 0), t(9, 30)).await;

    let service = AvailabilityService::new(&state);
    let listing = service.get_available_slots(doctor_id, monday()).await.unwrap();

    let starts: Vec<NaiveTime> = listing.slots.iter().map(|s| s.start_time).collect();
    assert_eq!(starts, vec![t(9, 30), t(10, 0), t(10, 30), t(11, 0), t(11, 30)]);

    for slot in &listing.slots {
        assert!(service
            .is_bookable(doctor_id, monday(), slot.start_time, slot.end_time)
            .await
            .unwrap());
    }
    assert!(!service.is_bookable(doctor_id, monday(), t(9, 0), t(9, 30)).await.unwrap());
}

#[tokio::test]
async fn test_is_bookable_only_considers_appointments() {
    let state = AppState::in_memory();
    let doctor_id = Uuid::new_v4();
    book(&state, doctor_id, t(9, 0), t(9, 30)).await;
    BlockingService::new(&state)
        .create_blocked_slot(CreateBlockedSlotRequest {
            doctor_id,
            blocked_date: monday(),
            start_time: t(14, 0),
            end_time: t(15, 0),
            reason: "Surgery".to_string(),
            created_by: Uuid::new_v4(),
        })
        .await
        .unwrap();

    let service = AvailabilityService::new(&state);
    assert!(!service.is_bookable(doctor_id, monday(), t(9, 15), t(9, 45)).await.unwrap());
    assert!(service.is_bookable(doctor_id, monday(), t(9, 30), t(10, 0)).await.unwrap());
    // Outside any template and inside a block, but no appointment holds it.
    assert!(service.is_bookable(doctor_id, monday(), t(14, 0), t(14, 30)).await.unwrap());

    assert_matches!(
        service.is_bookable(doctor_id, monday(), t(10, 0), t(10, 0)).await,
        Err(SchedulingError::Validation(_))
    );
}

#[tokio::test]
async fn test_check_window_reports_each_source() {
    let state = AppState::in_memory();
    let doctor_id = Uuid::new_v4();
    seed_monday_template(&state, doctor_id, 1).await;
    book(&state, doctor_id, t(9, 0), t(9, 30)).await;
    BlockingService::new(&state)
        .create_blocked_slot(CreateBlockedSlotRequest {
            doctor_id,
            blocked_date: monday(),
            start_time: t(9, 15),
            end_time: t(9, 45),
            reason: "Meeting".to_string(),
            created_by: Uuid::new_v4(),
        })
        .await
        .unwrap();

    let service = AvailabilityService::new(&state);

    let busy = service.check_window(doctor_id, monday(), t(9, 0), t(9, 30)).await.unwrap();
    assert!(!busy.bookable);
    assert!(busy.within_schedule);
    assert!(busy.blocked);
    assert_eq!(busy.conflicting_appointments.len(), 1);
    assert_eq!(busy.conflicting_blocks.len(), 1);

    let evening = service.check_window(doctor_id, monday(), t(18, 0), t(18, 30)).await.unwrap();
    assert!(evening.bookable);
    assert!(!evening.within_schedule);
    assert!(!evening.blocked);
}
