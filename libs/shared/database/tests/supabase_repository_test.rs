use assert_matches::assert_matches;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_config::{AppConfig, StorageBackend};
use shared_database::{AppState, DatabaseError, Query, Record};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Slot {
    id: Uuid,
    doctor_id: Uuid,
    slot_date: String,
}

impl Record for Slot {
    const TABLE: &'static str = "blocked_slots";

    fn id(&self) -> Uuid {
        self.id
    }
}

fn config_for(server: &MockServer) -> AppConfig {
    AppConfig {
        supabase_url: server.uri(),
        supabase_anon_key: "test-anon-key".to_string(),
        storage_backend: StorageBackend::Supabase,
        ..AppConfig::in_memory()
    }
}

fn sample() -> Slot {
    Slot {
        id: Uuid::new_v4(),
        doctor_id: Uuid::new_v4(),
        slot_date: "2099-01-05".to_string(),
    }
}

#[tokio::test]
async fn insert_posts_row_and_returns_representation() {
    let mock_server = MockServer::start().await;
    let slot = sample();

    Mock::given(method("POST"))
        .and(path("/rest/v1/blocked_slots"))
        .and(header("apikey", "test-anon-key"))
        .and(header("Prefer", "return=representation"))
        .and(body_json(json!(slot)))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([slot])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let state = AppState::from_config(config_for(&mock_server));
    assert_eq!(state.db.backend(), StorageBackend::Supabase);

    let stored = state.db.repository::<Slot>().insert(&slot).await.unwrap();
    assert_eq!(stored, slot);
}

#[tokio::test]
async fn find_renders_filters_as_postgrest_parameters() {
    let mock_server = MockServer::start().await;
    let slot = sample();

    Mock::given(method("GET"))
        .and(path("/rest/v1/blocked_slots"))
        .and(query_param("doctor_id", format!("eq.{}", slot.doctor_id)))
        .and(query_param("slot_date", "gte.2099-01-01"))
        .and(query_param("order", "slot_date.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([slot])))
        .mount(&mock_server)
        .await;

    let state = AppState::from_config(config_for(&mock_server));
    let query = Query::new()
        .eq("doctor_id", slot.doctor_id)
        .gte("slot_date", "2099-01-01")
        .order_asc("slot_date");

    let rows = state.db.repository::<Slot>().find(&query).await.unwrap();
    assert_eq!(rows, vec![slot]);
}

#[tokio::test]
async fn get_returns_none_for_empty_result() {
    let mock_server = MockServer::start().await;
    let id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/blocked_slots"))
        .and(query_param("id", format!("eq.{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let state = AppState::from_config(config_for(&mock_server));
    let row = state.db.repository::<Slot>().get(id).await.unwrap();
    assert!(row.is_none());
}

#[tokio::test]
async fn update_of_missing_row_reports_missing_record() {
    let mock_server = MockServer::start().await;
    let slot = sample();

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/blocked_slots"))
        .and(query_param("id", format!("eq.{}", slot.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let state = AppState::from_config(config_for(&mock_server));
    let result = state.db.repository::<Slot>().update(&slot).await;
    assert_matches!(result, Err(DatabaseError::MissingRecord(id)) if id == slot.id);
}

#[tokio::test]
async fn server_errors_surface_as_request_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/blocked_slots"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&mock_server)
        .await;

    let state = AppState::from_config(config_for(&mock_server));
    let result = state.db.repository::<Slot>().delete(Uuid::new_v4()).await;
    assert_matches!(result, Err(DatabaseError::Request(msg)) if msg.contains("500"));
}
