use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::Value;
use tracemirror_core::{
    ports::RegistryStore,
    sync::{DriverState, SyncStatus, SyncStatusHandle},
};

mod support;
use support::{BrokenRegistry, StaticRegistry, app, disabled_status, record};

fn server(registry: Option<Arc<dyn RegistryStore>>) -> TestServer {
    TestServer::new(app(registry, disabled_status())).unwrap()
}

fn seeded() -> Arc<dyn RegistryStore> {
    Arc::new(StaticRegistry::with(vec![
        record("checkout", true),
        record("payments", true),
        record("legacy-auth", false),
    ]))
}

#[tokio::test]
async fn health_reports_registry_and_sync_state() {
    let registry = Arc::new(StaticRegistry::with(vec![
        record("checkout", true),
        record("payments", true),
    ]));
    let server = server(Some(registry.clone() as Arc<dyn RegistryStore>));

    let response = server.get("/health").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"]["registry"]["status"], "healthy");
    assert_eq!(body["checks"]["sync"]["state"], "disabled");
    assert_eq!(registry.pings(), 1);
    assert_eq!(registry.list_calls(), 0, "health must not scan the registry");
}

#[tokio::test]
async fn health_without_registry_is_still_healthy() {
    let response = server(None).get("/health").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["checks"]["registry"]["status"], "disabled");
}

#[tokio::test]
async fn health_is_unavailable_when_registry_fails() {
    let server = server(Some(Arc::new(BrokenRegistry { unreachable: true })));

    let response = server.get("/health").await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json();
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["checks"]["registry"]["status"], "unhealthy");
}

#[tokio::test]
async fn lists_all_services_by_default() {
    let response = server(Some(seeded())).get("/api/v1/services").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["count"], 3);
    let names: Vec<&str> = body["services"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["checkout", "payments", "legacy-auth"]);
}

#[tokio::test]
async fn active_filter_narrows_the_listing() {
    let server = server(Some(seeded()));

    let active: Value = server
        .get("/api/v1/services")
        .add_query_param("active", "true")
        .await
        .json();
    assert_eq!(active["count"], 2);

    let stale: Value = server
        .get("/api/v1/services")
        .add_query_param("active", "false")
        .await
        .json();
    assert_eq!(stale["count"], 1);
    assert_eq!(stale["services"][0]["name"], "legacy-auth");
    assert_eq!(stale["services"][0]["active"], false);
}

#[tokio::test]
async fn malformed_filter_is_a_json_bad_request() {
    let response = server(Some(seeded()))
        .get("/api/v1/services")
        .add_query_param("active", "sometimes")
        .await;

    response.assert_status_bad_request();
    let body: Value = response.json();
    assert_eq!(body["error"]["status"], 400);
}

#[tokio::test]
async fn services_without_registry_are_unavailable() {
    let response = server(None).get("/api/v1/services").await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json();
    assert_eq!(body["error"]["message"], "Registry is not configured");
    assert_eq!(body["error"]["status"], 503);
}

#[tokio::test]
async fn registry_failures_do_not_leak_details() {
    let server = server(Some(Arc::new(BrokenRegistry { unreachable: false })));

    let response = server.get("/api/v1/services").await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["error"]["message"], "Registry operation failed");
}

#[tokio::test]
async fn sync_status_reflects_the_driver_handle() {
    let status = SyncStatusHandle::new(SyncStatus::new(DriverState::Scheduled, 15));
    status
        .update(|s| {
            s.passes_started = 4;
            s.services.runs = 4;
            s.streams.runs = 3;
            s.streams.skipped = 1;
            s.streams.failures = 2;
        })
        .await;
    let server = TestServer::new(app(Some(seeded()), status)).unwrap();

    let response = server.get("/api/v1/sync/status").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["state"], "scheduled");
    assert_eq!(body["interval_minutes"], 15);
    assert_eq!(body["passes_started"], 4);
    assert_eq!(body["streams"]["skipped"], 1);
    assert_eq!(body["streams"]["failures"], 2);
    assert!(body["services"]["last_run"].is_null());
}

#[tokio::test]
async fn unknown_routes_are_not_found() {
    server(None)
        .get("/api/v1/streams")
        .await
        .assert_status_not_found();
}
