use std::sync::Arc;

use assert_matches::assert_matches;
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{Request, StatusCode},
    Json,
};
use chrono::{NaiveDate, NaiveTime};
use tower::ServiceExt;
use uuid::Uuid;

use shared_database::AppState;
use shared_models::error::AppError;
use waitlist_cell::handlers::*;
use waitlist_cell::models::{BulkCancelRequest, CreateWaitlistEntryRequest};
use waitlist_cell::router::waitlist_routes;

fn create_test_state() -> Arc<AppState> {
    Arc::new(AppState::in_memory())
}

fn entry_request(doctor_id: Uuid) -> CreateWaitlistEntryRequest {
    CreateWaitlistEntryRequest {
        patient_id: Uuid::new_v4(),
        doctor_id,
        preferred_date: NaiveDate::from_ymd_opt(2099, 1, 5).unwrap(),
        preferred_start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        preferred_end_time: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
        reason: None,
        ttl_days: None,
    }
}

#[tokio::test]
async fn test_create_notify_accept_handlers() {
    let state = create_test_state();

    let Json(created) = create_entry(State(state.clone()), Json(entry_request(Uuid::new_v4())))
        .await
        .unwrap();
    assert_eq!(created["status"], "active");
    let entry_id: Uuid = serde_json::from_value(created["id"].clone()).unwrap();

    let early = accept_entry(State(state.clone()), Path(entry_id)).await;
    assert_matches!(early, Err(AppError::InvalidState(_)));

    let Json(notified) = notify_entry(State(state.clone()), Path(entry_id)).await.unwrap();
    assert_eq!(notified["status"], "notified");
    assert!(!notified["notified_at"].is_null());

    let Json(accepted) = accept_entry(State(state), Path(entry_id)).await.unwrap();
    assert_eq!(accepted["status"], "accepted");
}

#[tokio::test]
async fn test_range_handler_validates_dates() {
    let state = create_test_state();

    let range = DateRangeQuery { start_date: "2099-01-10".to_string(), end_date: "2099-01-01".to_string() };
    let result = get_entries_in_range(State(state.clone()), Path(Uuid::new_v4()), Query(range)).await;
    assert_matches!(result, Err(AppError::ValidationError(_)));

    let malformed = DateRangeQuery { start_date: "soon".to_string(), end_date: "2099-01-01".to_string() };
    let result = get_entries_in_range(State(state), Path(Uuid::new_v4()), Query(malformed)).await;
    assert_matches!(result, Err(AppError::ValidationError(msg)) if msg.contains("start_date"));
}

#[tokio::test]
async fn test_bulk_cancel_and_active_count_handlers() {
    let state = create_test_state();
    let request = entry_request(Uuid::new_v4());
    let patient_id = request.patient_id;

    let Json(created) = create_entry(State(state.clone()), Json(request)).await.unwrap();
    let entry_id: Uuid = serde_json::from_value(created["id"].clone()).unwrap();

    let Json(count) = get_patient_active_count(State(state.clone()), Path(patient_id)).await.unwrap();
    assert_eq!(count["active_count"], 1);
    assert_eq!(count["max_allowed"], 3);

    let Json(body) = bulk_cancel(State(state.clone()), Json(BulkCancelRequest { entry_ids: vec![entry_id] }))
        .await
        .unwrap();
    assert_eq!(body["cancelled"], 1);

    let Json(count) = get_patient_active_count(State(state), Path(patient_id)).await.unwrap();
    assert_eq!(count["active_count"], 0);
}

#[tokio::test]
async fn test_router_book_endpoint_redirects_to_waitlist() {
    let state = create_test_state();
    let doctor_id = Uuid::new_v4();
    let payload = serde_json::json!({
        "patient_id": Uuid::new_v4(),
        "doctor_id": doctor_id,
        "appointment_date": "2099-01-05",
        "start_time": "09:00:00",
        "end_time": "09:30:00"
    });

    let mut outcomes = Vec::new();
    for _ in 0..2 {
        let mut body = payload.clone();
        body["patient_id"] = serde_json::json!(Uuid::new_v4());
        let request = Request::builder()
            .method("POST")
            .uri("/book")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let response = waitlist_routes(state.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        outcomes.push(json["outcome"].as_str().unwrap().to_string());
    }

    assert_eq!(outcomes, vec!["booked", "waitlisted"]);
}

#[tokio::test]
async fn test_router_maps_missing_entry_to_404() {
    let request = Request::builder()
        .method("PATCH")
        .uri(format!("/{}/notify", Uuid::new_v4()))
        .body(Body::empty())
        .unwrap();

    let response = waitlist_routes(create_test_state()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
