mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn full_report_creates_bin_and_one_critical_notification() {
    let app = TestApp::new().await;
    let resp = app.report("abc123", 85.0).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["success"], true);
    let bin = &resp.body["data"][0];
    assert_eq!(bin["id"], "abc123");
    assert_eq!(bin["name"], "Bin abc123");
    assert_eq!(bin["location"], "Unknown");
    assert_eq!(bin["status"], "full");

    let notifications = app.store.notifications_for("abc123").unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].kind, "critical");
    assert_eq!(notifications[0].message, "Trash bin \"abc123\" is full (85%)");
    assert!(!notifications[0].read);
}

#[tokio::test]
async fn normal_report_creates_no_notification() {
    let app = TestApp::new().await;
    let resp = app.report("b-50", 50.0).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["data"][0]["status"], "normal");
    assert!(app.store.notifications_for("b-50").unwrap().is_empty());
}

#[tokio::test]
async fn out_of_range_reports_are_rejected_without_writes() {
    let app = TestApp::new().await;
    for fill in [-5.0, 101.0] {
        let resp = app.report("b1", fill).await;
        assert_eq!(resp.status, StatusCode::BAD_REQUEST);
        assert_eq!(resp.error_code.as_deref(), Some("validation_error"));
    }
    assert_eq!(app.store.write_count(), 0);
    assert_eq!(app.metrics.telemetry_rejected.get(), 2);
}

#[tokio::test]
async fn missing_fields_and_bad_json_are_bad_requests() {
    let app = TestApp::new().await;
    let resp = app
        .send(Method::POST, "/sensor/update", None, Some(json!({ "binId": "b1" })))
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_code.as_deref(), Some("validation_error"));

    let resp = app
        .send(
            Method::POST,
            "/sensor/update",
            None,
            Some(json!({ "binId": "b1", "fillLevel": "lots" })),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_code.as_deref(), Some("invalid_body"));
}

#[tokio::test]
async fn repeated_report_converges_to_one_bin() {
    let app = TestApp::new().await;
    let first = app.report("b1", 42.0).await;
    let second = app.report("b1", 42.0).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(app.store.bin_count().unwrap(), 1);
    assert_eq!(first.body["data"][0]["fill_level"], second.body["data"][0]["fill_level"]);
    assert_eq!(first.body["data"][0]["created_at"], second.body["data"][0]["created_at"]);
}

#[tokio::test]
async fn repeated_full_report_alerts_every_time_on_one_bin() {
    let app = TestApp::new().await;
    for _ in 0..2 {
        let resp = app.report("abc123", 85.0).await;
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.body["data"][0]["status"], "full");
    }
    assert_eq!(app.store.bin_count().unwrap(), 1);
    let notifications = app.store.notifications_for("abc123").unwrap();
    assert_eq!(notifications.len(), 2);
    assert!(notifications.iter().all(|n| n.kind == "critical"));
}

#[tokio::test]
async fn notification_store_failure_still_returns_success() {
    let app = TestApp::new().await;
    app.store.fail_notification_writes(true);
    let resp = app.report("b1", 97.0).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["data"][0]["status"], "full");
    assert_eq!(app.store.bin_count().unwrap(), 1);
    assert_eq!(app.metrics.notification_failures.get(), 1);
}

#[tokio::test]
async fn bin_store_failure_is_a_server_error() {
    let app = TestApp::new().await;
    app.store.fail_bin_writes(true);
    let resp = app.report("b1", 30.0).await;
    assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(resp.error_code.as_deref(), Some("internal_error"));
}

#[tokio::test]
async fn telemetry_keeps_registry_fields() {
    let app = TestApp::new().await;
    let token = app.token("off-1", "officer");
    let created = app
        .send(
            Method::POST,
            "/bins",
            Some(&token),
            Some(json!({ "name": "Pier", "location": "Dock 4", "capacity": 240, "notes": "blue lid" })),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    let id = created.body["bin"]["id"].as_str().unwrap().to_string();

    let resp = app
        .send(
            Method::POST,
            "/sensor/update",
            None,
            Some(json!({ "binId": id, "fillLevel": 65, "location": "Dock 4B" })),
        )
        .await;
    let bin = &resp.body["data"][0];
    assert_eq!(bin["status"], "warning");
    assert_eq!(bin["location"], "Dock 4B");
    assert_eq!(bin["capacity"], 240);
    assert_eq!(bin["notes"], "blue lid");
    assert_eq!(bin["field_officer_id"], "off-1");
}

#[tokio::test]
async fn sensor_reads_return_success_envelopes() {
    let app = TestApp::new().await;
    app.report("older", 10.0).await;
    app.report("newer", 20.0).await;

    let all = app.get("/sensor/bins").await;
    assert_eq!(all.status, StatusCode::OK);
    assert_eq!(all.body["success"], true);
    assert_eq!(all.body["data"][0]["id"], "newer");
    assert_eq!(all.body["data"].as_array().unwrap().len(), 2);

    let one = app.get("/sensor/bin/older").await;
    assert_eq!(one.body["data"]["fill_level"], 10.0);

    let missing = app.get("/sensor/bin/ghost").await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.error_code.as_deref(), Some("bin_not_found"));
}
