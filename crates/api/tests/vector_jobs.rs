//! Integration tests for `POST /api/ml/compute`.
//!
//! Each test drives the full router with a scripted backend and records
//! what a subscriber registered on the hub received.

mod common;

use std::sync::atomic::Ordering;

use axum::http::StatusCode;
use common::{body_json, build_test_app, drain_events, post_json, subscribe};
use serde_json::json;

// ---------------------------------------------------------------------------
// Test: sum job returns the result and broadcasts started then completed
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sum_job_completes_with_matching_events() {
    let app = build_test_app();
    let mut sub = subscribe(&app.hub).await;

    let response = post_json(
        app.router,
        "/api/ml/compute",
        json!({"data": [1.0, 2.0, 3.0], "taskType": "sum"}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["result"], json!([6.0]));
    assert_eq!(body["status"], "completed");
    let task_id = body["taskId"].as_str().unwrap().to_string();
    assert_eq!(task_id.len(), 36, "generated id should be a UUID");

    let events = drain_events(&mut sub);
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["status"], "started");
    assert_eq!(events[0]["data"], json!([1.0, 2.0, 3.0]));
    assert_eq!(events[1]["status"], "completed");
    assert_eq!(events[1]["data"], json!([6.0]));
    for event in &events {
        assert_eq!(event["taskId"], task_id.as_str());
    }
    assert!(events[0]["timestamp"].as_i64() <= events[1]["timestamp"].as_i64());
}

// ---------------------------------------------------------------------------
// Test: a client supplied id is kept, empty data and task type are accepted
// ---------------------------------------------------------------------------

#[tokio::test]
async fn supplied_id_is_kept_and_defaults_apply() {
    let app = build_test_app();
    let mut sub = subscribe(&app.hub).await;

    let response = post_json(
        app.router,
        "/api/ml/compute",
        json!({"data": [], "taskId": "job-42"}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["taskId"], "job-42");
    assert_eq!(body["result"], json!([]));

    let events = drain_events(&mut sub);
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e["taskId"] == "job-42"));
}

// ---------------------------------------------------------------------------
// Test: backend rejection returns 422 with one failed event
// ---------------------------------------------------------------------------

#[tokio::test]
async fn backend_rejection_returns_422_and_failed_event() {
    let app = build_test_app();
    let mut sub = subscribe(&app.hub).await;

    let response = post_json(
        app.router,
        "/api/ml/compute",
        json!({"data": [1.0], "taskType": "reject"}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["status"], "failed");
    assert_eq!(body["error"], "Unsupported task type");

    let events = drain_events(&mut sub);
    assert_eq!(events.len(), 2);
    assert_eq!(events[1]["status"], "failed");
    assert_eq!(events[1]["error"], "Unsupported task type");
    assert_eq!(events[1]["taskId"], body["taskId"]);
}

// ---------------------------------------------------------------------------
// Test: transport failure returns 502 with exactly one error event
// ---------------------------------------------------------------------------

#[tokio::test]
async fn transport_failure_returns_502_and_single_error_event() {
    let app = build_test_app();
    let mut sub = subscribe(&app.hub).await;

    let response = post_json(
        app.router,
        "/api/ml/compute",
        json!({"data": [1.0, 2.0], "taskType": "unreachable"}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    assert!(body["status"].as_str().unwrap().starts_with("error: "));
    assert!(body["error"].as_str().unwrap().contains("connection refused"));
    assert!(body.get("result").is_none());

    let events = drain_events(&mut sub);
    let statuses: Vec<_> = events.iter().map(|e| e["status"].clone()).collect();
    assert_eq!(statuses, vec![json!("started"), json!("error")]);
    assert!(events[1]["error"].as_str().unwrap().contains("connection refused"));
    assert!(events[1].get("data").is_none());
}

// ---------------------------------------------------------------------------
// Test: a panicking backend still yields a terminal event and a 502
// ---------------------------------------------------------------------------

#[tokio::test]
async fn backend_panic_is_reported_as_error() {
    let app = build_test_app();
    let mut sub = subscribe(&app.hub).await;

    let response = post_json(
        app.router,
        "/api/ml/compute",
        json!({"data": [1.0], "taskType": "panic"}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let events = drain_events(&mut sub);
    assert_eq!(events.len(), 2);
    assert_eq!(events[1]["status"], "error");
}

// ---------------------------------------------------------------------------
// Test: concurrent jobs each get their own id and exactly one terminal event
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_jobs_have_one_terminal_event_each() {
    let app = build_test_app();
    let mut sub = subscribe(&app.hub).await;

    let mut handles = Vec::new();
    for i in 0..20 {
        let router = app.router.clone();
        handles.push(tokio::spawn(async move {
            let response = post_json(
                router,
                "/api/ml/compute",
                json!({"data": [i as f32], "taskId": format!("job-{i}")}),
            )
            .await;
            assert_eq!(response.status(), StatusCode::OK);
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(app.backend.vector_calls.load(Ordering::SeqCst), 20);

    let events = drain_events(&mut sub);
    assert_eq!(events.len(), 40);
    for i in 0..20 {
        let id = format!("job-{i}");
        let mine: Vec<_> = events.iter().filter(|e| e["taskId"] == id.as_str()).collect();
        assert_eq!(mine.len(), 2, "job {id} should have two events");
        assert_eq!(mine[0]["status"], "started");
        assert_eq!(mine[1]["status"], "completed");
    }
}
