//! HTTP-level tests for the TechSprint API over in-memory collaborators.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use sprint_api::{create_api_router, ApiConfig, AppState};
use sprint_core::{FileRecord, PaymentRecord, RegistrationRecord, Retention};
use sprint_lifecycle::DeleteOutcome;
use sprint_test_utils::{fixtures, Harness};
use tower::ServiceExt;

fn app(harness: &Harness) -> Router {
    let state = Arc::new(AppState::new(harness.services.clone()));
    create_api_router(state, &ApiConfig::default())
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn parse<T: DeserializeOwned>(body: &[u8]) -> T {
    serde_json::from_slice(body).unwrap()
}

// ============================================================================
// FILES
// ============================================================================

#[tokio::test]
async fn test_upload_get_and_delete_file() {
    let harness = Harness::new();
    let app = app(&harness);

    let upload = Request::builder()
        .method("POST")
        .uri("/api/v1/files")
        .header("content-type", "image/png")
        .header("x-file-name", "team photo.PNG")
        .body(Body::from(vec![0x89, b'P', b'N', b'G', 1, 2, 3]))
        .unwrap();
    let (status, body) = send(&app, upload).await;
    assert_eq!(status, StatusCode::CREATED);
    let file: FileRecord = parse(&body);
    assert_eq!(file.retention, Retention::Temporary);
    assert_eq!(file.content_type, "image/png");
    assert!(harness.objects.contains(&file.storage_handle));

    let uri = format!("/api/v1/files/{}", file.file_id);
    let (status, body) = send(&app, empty_request("GET", &uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse::<FileRecord>(&body).file_id, file.file_id);

    let (status, body) = send(&app, empty_request("DELETE", &uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(parse::<DeleteOutcome>(&body).success);
    assert!(!harness.objects.contains(&file.storage_handle));

    let (status, body) = send(&app, empty_request("GET", &uri)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(parse::<Value>(&body)["code"], "ENTITY_NOT_FOUND");
}

#[tokio::test]
async fn test_upload_without_content_type_is_rejected() {
    let harness = Harness::new();
    let app = app(&harness);

    let upload = Request::builder()
        .method("POST")
        .uri("/api/v1/files")
        .body(Body::from(vec![1, 2, 3]))
        .unwrap();
    let (status, body) = send(&app, upload).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(parse::<Value>(&body)["code"], "MISSING_FIELD");
    assert_eq!(harness.objects.len(), 0);
}

#[tokio::test]
async fn test_malformed_file_id_is_bad_request() {
    let harness = Harness::new();
    let app = app(&harness);

    let (status, body) = send(&app, empty_request("DELETE", "/api/v1/files/not-a-uuid")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(parse::<Value>(&body)["code"], "INVALID_ID");
}

#[tokio::test]
async fn test_delete_reports_leaked_object_as_multi_status() {
    let harness = Harness::new();
    let app = app(&harness);
    let file = harness.upload().await.unwrap();
    harness.objects.set_fail_deletes(true);

    let uri = format!("/api/v1/files/{}", file.file_id);
    let (status, body) = send(&app, empty_request("DELETE", &uri)).await;
    assert_eq!(status, StatusCode::MULTI_STATUS);
    assert!(!parse::<DeleteOutcome>(&body).success);

    let (status, _) = send(&app, empty_request("GET", &uri)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_sweep_endpoint_reclaims_aged_files() {
    let harness = Harness::new();
    let app = app(&harness);
    let old = harness
        .seed_aged_file(chrono::Duration::hours(48))
        .await
        .unwrap();

    let (status, body) = send(&app, empty_request("POST", "/api/v1/files/sweep")).await;
    assert_eq!(status, StatusCode::OK);
    let report: Value = parse(&body);
    assert_eq!(report["reclaimed"], 1);
    assert!(!harness.objects.contains(&old.storage_handle));
}

// ============================================================================
// EVENTS
// ============================================================================

#[tokio::test]
async fn test_event_creation_promotes_photos() {
    let harness = Harness::new();
    let app = app(&harness);
    let photo = harness.upload().await.unwrap();

    let new_event = fixtures::new_event(vec![photo.file_id], None);
    let (status, body) = send(
        &app,
        json_request("POST", "/api/v1/events", &serde_json::to_value(&new_event).unwrap()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let event: Value = parse(&body);
    assert_eq!(event["name"], "Line Follower");

    let uri = format!("/api/v1/files/{}", photo.file_id);
    let (_, body) = send(&app, empty_request("GET", &uri)).await;
    let photo: FileRecord = parse(&body);
    assert_eq!(photo.retention, Retention::Permanent);

    let (status, body) = send(&app, empty_request("GET", "/api/v1/events")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse::<Vec<Value>>(&body).len(), 1);
}

// ============================================================================
// REGISTRATIONS AND PAYMENTS
// ============================================================================

#[tokio::test]
async fn test_callback_assigns_team_id_once() {
    let harness = Harness::new();
    let app = app(&harness);
    let event = harness.event(vec![]).await.unwrap();
    let registration = harness.registration(vec![event.event_id]).await.unwrap();
    let payment = harness
        .pending_payment(registration.registration_id)
        .await
        .unwrap();

    let callback = json!({
        "registration_id": registration.registration_id.to_string(),
        "payment_id": payment.payment_id.to_string(),
        "status": "Completed",
    });

    let (status, body) = send(
        &app,
        json_request("POST", "/api/v1/registrations/callback", &callback),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let outcome: Value = parse(&body);
    assert_eq!(outcome["team_id"], "1");
    assert_eq!(outcome["payment"]["status"], "Completed");

    // A repeated callback changes nothing.
    let (status, body) = send(
        &app,
        json_request("POST", "/api/v1/registrations/callback", &callback),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse::<Value>(&body)["team_id"], "1");

    let uri = format!("/api/v1/registrations/{}", registration.registration_id);
    let (status, body) = send(&app, empty_request("GET", &uri)).await;
    assert_eq!(status, StatusCode::OK);
    let stored: RegistrationRecord = parse(&body);
    assert_eq!(stored.team_id.as_deref(), Some("1"));
    assert_eq!(
        stored.payment_status(),
        Some(sprint_core::PaymentStatus::Completed)
    );
}

#[tokio::test]
async fn test_callback_rejects_unknown_status() {
    let harness = Harness::new();
    let app = app(&harness);
    let event = harness.event(vec![]).await.unwrap();
    let registration = harness.registration(vec![event.event_id]).await.unwrap();
    let payment = harness
        .pending_payment(registration.registration_id)
        .await
        .unwrap();

    let callback = json!({
        "registration_id": registration.registration_id.to_string(),
        "payment_id": payment.payment_id.to_string(),
        "status": "Settled",
    });
    let (status, body) = send(
        &app,
        json_request("POST", "/api/v1/registrations/callback", &callback),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(parse::<Value>(&body)["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_invalid_transition_is_conflict() {
    let harness = Harness::new();
    let app = app(&harness);
    let event = harness.event(vec![]).await.unwrap();
    let registration = harness.registration(vec![event.event_id]).await.unwrap();
    let payment = harness
        .pending_payment(registration.registration_id)
        .await
        .unwrap();
    let uri = format!("/api/v1/payments/{}/status", payment.payment_id);

    let (status, _) = send(&app, json_request("PATCH", &uri, &json!({"status": "Failed"}))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) =
        send(&app, json_request("PATCH", &uri, &json!({"status": "Completed"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(parse::<Value>(&body)["code"], "INVALID_TRANSITION");

    let uri = format!("/api/v1/payments/{}", payment.payment_id);
    let (_, body) = send(&app, empty_request("GET", &uri)).await;
    let stored: PaymentRecord = parse(&body);
    assert_eq!(stored.status, sprint_core::PaymentStatus::Failed);
}

#[tokio::test]
async fn test_filter_pages_and_out_of_range() {
    let harness = Harness::new();
    let app = app(&harness);
    let event = harness.event(vec![]).await.unwrap();
    for name in ["Volt Riders", "Volt Kings", "Byte Club"] {
        harness
            .services
            .registrations
            .create(fixtures::new_registration(name, vec![event.event_id]))
            .await
            .unwrap();
    }

    let filter = json!({"team_name": "volt", "page": 2, "limit": 1});
    let (status, body) = send(
        &app,
        json_request("POST", "/api/v1/registrations/filter", &filter),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let page: Value = parse(&body);
    assert_eq!(page["total"], 2);
    assert_eq!(page["total_pages"], 2);
    assert_eq!(page["current_page"], 2);
    assert_eq!(page["items"].as_array().map(Vec::len), Some(1));

    let filter = json!({"team_name": "volt", "page": 3, "limit": 1});
    let (status, body) = send(
        &app,
        json_request("POST", "/api/v1/registrations/filter", &filter),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(parse::<Value>(&body)["code"], "PAGE_OUT_OF_RANGE");
}

// ============================================================================
// CACHE, HEALTH AND METRICS
// ============================================================================

#[tokio::test]
async fn test_cache_flush_by_kind() {
    let harness = Harness::new();
    let app = app(&harness);
    let event = harness.event(vec![]).await.unwrap();
    harness.services.events.get(event.event_id).await.unwrap();

    let (status, body) = send(&app, empty_request("DELETE", "/api/v1/cache/event")).await;
    assert_eq!(status, StatusCode::OK);
    let flushed: Value = parse(&body);
    assert_eq!(flushed["kind"], "Event");
    assert!(flushed["removed"].as_u64().unwrap_or(0) >= 1);

    let (status, _) = send(&app, empty_request("DELETE", "/api/v1/cache/teams")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health_endpoints() {
    let harness = Harness::new();
    let app = app(&harness);

    let (status, body) = send(&app, empty_request("GET", "/health/ping")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"pong");

    let (status, body) = send(&app, empty_request("GET", "/health/ready")).await;
    assert_eq!(status, StatusCode::OK);
    let health: Value = parse(&body);
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["details"]["store"]["status"], "healthy");
}

#[tokio::test]
async fn test_metrics_endpoint_serves_text() {
    let harness = Harness::new();
    let app = app(&harness);

    send(&app, empty_request("GET", "/health/live")).await;
    let (status, body) = send(&app, empty_request("GET", "/metrics")).await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("sprint_http_requests_total"));
}
