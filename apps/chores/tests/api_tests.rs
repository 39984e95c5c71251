//! Integration tests for the chores HTTP API.
//!
//! Uses axum-test to test the API handlers without starting a real server.

#![allow(clippy::unwrap_used, clippy::panic)]

use axum::http::StatusCode;
use axum_test::TestServer;
use chores::api::{
    AppState, ChoreListResponse, EntityUpdateResponse, ErrorResponse, ForceResponse,
    HealthResponse, create_router,
};
use chores_core::{ChoreState, ChoreStatus, EventKind, Registry, StoreSnapshot};
use chrono::{DateTime, FixedOffset, TimeZone};
use serde_json::json;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

const POWER: &str = "sensor.washer_power";
const DOOR: &str = "binary_sensor.washer_door";

fn fixed_now() -> DateTime<FixedOffset> {
    FixedOffset::east_opt(3600)
        .and_then(|offset| offset.with_ymd_and_hms(2026, 3, 4, 9, 0, 0).single())
        .unwrap()
}

fn registry() -> Registry {
    let configs = vec![
        json!({
            "id": "laundry",
            "name": "Hang the laundry",
            "trigger": {"type": "power_cycle", "power_sensor": POWER},
            "completion": {"type": "contact", "entity_id": DOOR},
            "state_labels": {"due": "Laundry waiting"}
        }),
        json!({
            "id": "water_plants",
            "name": "Water the plants",
            "trigger": {"type": "daily", "time": "08:00"},
            "reset": {"type": "delay", "minutes": 60}
        }),
    ];
    let (registry, report) = Registry::load(configs, &StoreSnapshot::new());
    assert!(report.is_clean());
    registry
}

/// Create a test server over a two-chore registry with a pinned clock.
fn create_test_server() -> TestServer {
    let state = AppState::with_clock(registry(), fixed_now);
    TestServer::new(create_router(state)).unwrap()
}

// =============================================================================
// HEALTH ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let server = create_test_server();

    let response = server.get("/health").await;

    response.assert_status_ok();
    let health: HealthResponse = response.json();
    assert_eq!(health.status, "ok");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
    assert_eq!(health.chore_count, 2);
}

// =============================================================================
// CHORE ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_list_chores() {
    let server = create_test_server();

    let response = server.get("/chores").await;

    response.assert_status_ok();
    let list: ChoreListResponse = response.json();
    let ids: Vec<&str> = list.chores.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["laundry", "water_plants"]);
    assert!(list.chores.iter().all(|c| c.state == ChoreState::Inactive));
}

#[tokio::test]
async fn test_get_chore() {
    let server = create_test_server();

    let response = server.get("/chores/water_plants").await;

    response.assert_status_ok();
    let status: ChoreStatus = response.json();
    assert_eq!(status.name, "Water the plants");
    assert_eq!(status.trigger_type, "daily");
    assert_eq!(status.completion_type, "manual");
    assert_eq!(status.reset_type, "delay");
}

#[tokio::test]
async fn test_get_unknown_chore_is_404() {
    let server = create_test_server();

    let response = server.get("/chores/ghost").await;

    response.assert_status(StatusCode::NOT_FOUND);
    let error: ErrorResponse = response.json();
    assert!(error.error.contains("ghost"));
}

// =============================================================================
// FORCE ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_force_due_then_again() {
    let server = create_test_server();

    let response = server.post("/chores/laundry/force_due").await;
    response.assert_status_ok();
    let first: ForceResponse = response.json();
    assert!(first.changed);
    let event = first.event.unwrap();
    assert_eq!(event.event, EventKind::Due);
    assert!(event.forced);

    let second: ForceResponse = server.post("/chores/laundry/force_due").await.json();
    assert!(!second.changed);
    assert!(second.event.is_none());

    let status: ChoreStatus = server.get("/chores/laundry").await.json();
    assert_eq!(status.state, ChoreState::Due);
    assert_eq!(status.state_label, "Laundry waiting");
}

#[tokio::test]
async fn test_force_complete_and_inactive() {
    let server = create_test_server();

    let done: ForceResponse = server.post("/chores/water_plants/force_complete").await.json();
    assert_eq!(done.event.unwrap().new_state, ChoreState::Completed);

    let status: ChoreStatus = server.get("/chores/water_plants").await.json();
    assert_eq!(status.completion_count, 1);
    assert!(status.forced);

    let off: ForceResponse = server.post("/chores/water_plants/force_inactive").await.json();
    assert_eq!(off.event.unwrap().event, EventKind::Reset);
}

#[tokio::test]
async fn test_force_unknown_chore_is_404() {
    let server = create_test_server();

    let response = server.post("/chores/ghost/force_complete").await;

    response.assert_status(StatusCode::NOT_FOUND);
}

// =============================================================================
// ENTITY ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_entity_update_returns_events() {
    let server = create_test_server();

    server
        .post("/entities")
        .json(&json!({"entity_id": POWER, "state": "0"}))
        .await
        .assert_status_ok();

    let response = server
        .post("/entities")
        .json(&json!({"entity_id": POWER, "state": "1200"}))
        .await;

    response.assert_status_ok();
    let update: EntityUpdateResponse = response.json();
    assert_eq!(update.events.len(), 1);
    assert_eq!(update.events[0].chore_id, "laundry");
    assert_eq!(update.events[0].new_state, ChoreState::Pending);
}

#[tokio::test]
async fn test_entity_removal() {
    let server = create_test_server();

    let response = server
        .post("/entities")
        .json(&json!({"entity_id": DOOR, "state": null}))
        .await;

    response.assert_status_ok();
    let update: EntityUpdateResponse = response.json();
    assert!(update.events.is_empty());
}

#[tokio::test]
async fn test_entity_update_rejects_empty_id() {
    let server = create_test_server();

    let response = server
        .post("/entities")
        .json(&json!({"entity_id": "", "state": "on"}))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_entity_update_rejects_malformed_body() {
    let server = create_test_server();

    let response = server
        .post("/entities")
        .bytes(bytes::Bytes::from_static(b"{not json"))
        .content_type("application/json")
        .await;

    assert!(response.status_code().is_client_error());
}

// =============================================================================
// DIAGNOSTICS ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_diagnostics() {
    let server = create_test_server();
    server.post("/chores/laundry/force_due").await.assert_status_ok();

    let response = server.get("/diagnostics").await;

    response.assert_status_ok();
    let diagnostics: serde_json::Value = response.json();
    assert_eq!(diagnostics["chore_count"], 2);
    assert_eq!(diagnostics["chores"]["laundry"]["status"]["state"], "due");
}
