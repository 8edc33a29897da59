use std::sync::Arc;
use std::time::Duration as StdDuration;

use assert_matches::assert_matches;
use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_config::{AppConfig, StorageBackend};
use shared_database::locks::waitlist_key;
use shared_database::{AppState, Repository};
use shared_models::SchedulingError;
use waitlist_cell::models::{CreateWaitlistEntryRequest, WaitlistEntry, WaitlistStatus};
use waitlist_cell::services::WaitlistService;

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn short_lived(patient_id: Uuid, doctor_id: Uuid) -> CreateWaitlistEntryRequest {
    CreateWaitlistEntryRequest {
        patient_id,
        doctor_id,
        preferred_date: NaiveDate::from_ymd_opt(2099, 1, 5).unwrap(),
        preferred_start_time: t(9, 0),
        preferred_end_time: t(9, 30),
        reason: None,
        ttl_days: Some(1),
    }
}

#[tokio::test]
async fn test_expiry_sweep_skips_entry_notified_after_the_scan() {
    let state = Arc::new(AppState::in_memory());
    let service = WaitlistService::new(&state);
    let patient_id = Uuid::new_v4();
    let entry = service.create_entry(short_lived(patient_id, Uuid::new_v4())).await.unwrap();

    // The sweep finds the entry, then waits behind the patient's lock.
    let guard = state.db.locks().acquire(waitlist_key(patient_id)).await;
    let sweep = {
        let state = state.clone();
        tokio::spawn(async move {
            WaitlistService::new(&state)
                .expire_old_entries_at(Utc::now() + Duration::days(2))
                .await
        })
    };
    tokio::time::sleep(StdDuration::from_millis(20)).await;

    let notified_at = Utc::now();
    let mut notified = entry.clone();
    notified.status = WaitlistStatus::Notified;
    notified.notified_at = Some(notified_at);
    state.db.repository::<WaitlistEntry>().update(&notified).await.unwrap();
    drop(guard);

    assert_eq!(sweep.await.unwrap().unwrap(), 0);
    let stored = service.get_entry(entry.id).await.unwrap();
    assert_eq!(stored.status, WaitlistStatus::Notified);
    assert_eq!(stored.notified_at, Some(notified_at));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_expiry_racing_notify_never_undoes_a_notification() {
    let state = Arc::new(AppState::in_memory());
    let service = WaitlistService::new(&state);
    let doctor_id = Uuid::new_v4();

    let mut entries = Vec::new();
    for _ in 0..20 {
        entries.push(service.create_entry(short_lived(Uuid::new_v4(), doctor_id)).await.unwrap());
    }

    let sweeps: Vec<_> = (0..20)
        .map(|_| {
            let state = state.clone();
            tokio::spawn(async move {
                WaitlistService::new(&state)
                    .expire_old_entries_at(Utc::now() + Duration::days(2))
                    .await
            })
        })
        .collect();
    let notifies: Vec<_> = entries
        .iter()
        .map(|entry| {
            let state = state.clone();
            let entry_id = entry.id;
            tokio::spawn(async move { WaitlistService::new(&state).notify_entry(entry_id).await })
        })
        .collect();

    let mut expired_total = 0;
    for sweep in sweeps {
        expired_total += sweep.await.unwrap().unwrap();
    }

    let mut notified_total = 0;
    for (entry, notify) in entries.iter().zip(notifies) {
        let outcome = notify.await.unwrap();
        let stored = service.get_entry(entry.id).await.unwrap();
        match outcome {
            Ok(_) => {
                notified_total += 1;
                assert_eq!(stored.status, WaitlistStatus::Notified);
                assert!(stored.notified_at.is_some());
            }
            Err(e) => {
                assert_matches!(e, SchedulingError::State(_));
                assert_eq!(stored.status, WaitlistStatus::Expired);
            }
        }
    }

    assert_eq!(expired_total + notified_total, entries.len());
    assert!(state.db.locks().is_empty());
}

#[tokio::test]
async fn test_bulk_cancel_skips_entry_accepted_after_the_scan() {
    let state = Arc::new(AppState::in_memory());
    let service = WaitlistService::new(&state);
    let patient_id = Uuid::new_v4();
    let entry = service.create_entry(short_lived(patient_id, Uuid::new_v4())).await.unwrap();
    service.notify_entry(entry.id).await.unwrap();

    let guard = state.db.locks().acquire(waitlist_key(patient_id)).await;
    let cancel = {
        let state = state.clone();
        let entry_id = entry.id;
        tokio::spawn(async move { WaitlistService::new(&state).bulk_cancel(&[entry_id]).await })
    };
    tokio::time::sleep(StdDuration::from_millis(20)).await;

    let mut accepted = service.get_entry(entry.id).await.unwrap();
    accepted.status = WaitlistStatus::Accepted;
    state.db.repository::<WaitlistEntry>().update(&accepted).await.unwrap();
    drop(guard);

    assert_eq!(cancel.await.unwrap().unwrap(), 0);
    assert_eq!(service.get_entry(entry.id).await.unwrap().status, WaitlistStatus::Accepted);
}

fn stored_entry(status: WaitlistStatus) -> WaitlistEntry {
    let now = Utc::now();
    WaitlistEntry {
        id: Uuid::new_v4(),
        patient_id: Uuid::new_v4(),
        doctor_id: Uuid::new_v4(),
        preferred_date: NaiveDate::from_ymd_opt(2099, 1, 5).unwrap(),
        preferred_start_time: t(9, 0),
        preferred_end_time: t(9, 30),
        reason: None,
        status,
        added_at: now,
        expires_at: now + Duration::days(7),
        notified_at: None,
        updated_at: now,
    }
}

#[tokio::test]
async fn test_bulk_cancel_continues_past_a_failed_write() {
    let mock_server = MockServer::start().await;
    let failing = stored_entry(WaitlistStatus::Active);
    let healthy = stored_entry(WaitlistStatus::Notified);
    let mut cancelled = healthy.clone();
    cancelled.status = WaitlistStatus::Cancelled;

    Mock::given(method("GET"))
        .and(path("/rest/v1/waitlist"))
        .and(query_param("status", "in.(active,notified)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([failing, healthy])))
        .mount(&mock_server)
        .await;
    for entry in [&failing, &healthy] {
        Mock::given(method("GET"))
            .and(path("/rest/v1/waitlist"))
            .and(query_param("id", format!("eq.{}", entry.id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([entry])))
            .mount(&mock_server)
            .await;
    }
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/waitlist"))
        .and(query_param("id", format!("eq.{}", failing.id)))
        .respond_with(ResponseTemplate::new(500).set_body_string("connection reset"))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/waitlist"))
        .and(query_param("id", format!("eq.{}", healthy.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([cancelled])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = AppConfig {
        supabase_url: mock_server.uri(),
        supabase_anon_key: "test-anon-key".to_string(),
        storage_backend: StorageBackend::Supabase,
        ..AppConfig::in_memory()
    };
    let state = AppState::from_config(config);

    let count = WaitlistService::new(&state)
        .bulk_cancel(&[failing.id, healthy.id])
        .await
        .unwrap();
    assert_eq!(count, 1);
}
