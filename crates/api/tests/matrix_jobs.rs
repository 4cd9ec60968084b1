//! Integration tests for `POST /api/matrix/compute`.

mod common;

use axum::http::StatusCode;
use common::{body_json, build_test_app, drain_events, post_json, subscribe};
use serde_json::json;

fn matrix(rows: u32, cols: u32, data: &[f32]) -> serde_json::Value {
    json!({"rows": rows, "cols": cols, "data": data})
}

// ---------------------------------------------------------------------------
// Test: multiply without matrix B is rejected before anything happens
// ---------------------------------------------------------------------------

#[tokio::test]
async fn multiply_without_matrix_b_is_rejected_without_broadcast() {
    let app = build_test_app();
    let mut sub = subscribe(&app.hub).await;

    let response = post_json(
        app.router,
        "/api/matrix/compute",
        json!({"matrixA": matrix(2, 2, &[1.0, 2.0, 3.0, 4.0]), "operation": "multiply"}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Matrix B is required for multiply operation");

    assert!(drain_events(&mut sub).is_empty());
    assert_eq!(app.backend.calls(), 0);
}

// ---------------------------------------------------------------------------
// Test: missing matrix A, unknown operation and bad dimensions are 400s
// ---------------------------------------------------------------------------

#[tokio::test]
async fn invalid_requests_are_rejected_without_broadcast() {
    let app = build_test_app();
    let mut sub = subscribe(&app.hub).await;

    let cases = [
        json!({"operation": "transpose"}),
        json!({"matrixA": matrix(1, 1, &[1.0]), "operation": "determinant"}),
        json!({"matrixA": matrix(2, 2, &[1.0, 2.0, 3.0]), "operation": "transpose"}),
        json!({
            "matrixA": matrix(1, 2, &[1.0, 2.0]),
            "matrixB": matrix(1, 2, &[1.0, 2.0, 3.0]),
            "operation": "add",
        }),
    ];

    for case in cases {
        let response = post_json(app.router.clone(), "/api/matrix/compute", case.clone()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "case: {case}");
        let body = body_json(response).await;
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    assert!(drain_events(&mut sub).is_empty());
    assert_eq!(app.backend.calls(), 0);
}

// ---------------------------------------------------------------------------
// Test: transpose with only matrix A is dispatched and completes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn transpose_with_only_matrix_a_completes() {
    let app = build_test_app();
    let mut sub = subscribe(&app.hub).await;

    let response = post_json(
        app.router,
        "/api/matrix/compute",
        json!({
            "matrixA": matrix(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
            "operation": "transpose",
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "completed");
    assert_eq!(body["executionTimeMs"], 12);
    assert_eq!(
        body["resultMatrix"],
        matrix(3, 2, &[1.0, 4.0, 2.0, 5.0, 3.0, 6.0])
    );
    let task_id = body["taskId"].as_str().unwrap();
    assert!(task_id.starts_with("matrix-"));

    let events = drain_events(&mut sub);
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["status"], "started");
    assert_eq!(events[0]["operation"], "transpose");
    assert_eq!(events[1]["status"], "completed");
    assert_eq!(events[1]["executionTimeMs"], 12);
    assert_eq!(events[1]["rows"], 3);
    assert_eq!(events[1]["cols"], 2);
    assert!(events.iter().all(|e| e["taskId"] == task_id));
    assert!(events[0]["timestamp"].as_i64() <= events[1]["timestamp"].as_i64());
}

// ---------------------------------------------------------------------------
// Test: binary operation with both operands completes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn add_with_both_operands_completes() {
    let app = build_test_app();

    let response = post_json(
        app.router,
        "/api/matrix/compute",
        json!({
            "matrixA": matrix(1, 2, &[1.0, 2.0]),
            "matrixB": matrix(1, 2, &[10.0, 20.0]),
            "operation": "add",
            "taskId": "sum-rows",
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["taskId"], "sum-rows");
    assert_eq!(body["resultMatrix"], matrix(1, 2, &[11.0, 22.0]));
}

// ---------------------------------------------------------------------------
// Test: backend failure returns 422 with a failed event
// ---------------------------------------------------------------------------

#[tokio::test]
async fn backend_failure_returns_422_and_failed_event() {
    let app = build_test_app();
    let mut sub = subscribe(&app.hub).await;

    let response = post_json(
        app.router,
        "/api/matrix/compute",
        json!({"matrixA": matrix(2, 2, &[1.0, 2.0, 2.0, 4.0]), "operation": "inverse"}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["status"], "failed");
    assert_eq!(body["error"], "Matrix is singular and cannot be inverted");

    let events = drain_events(&mut sub);
    assert_eq!(events.len(), 2);
    assert_eq!(events[1]["status"], "failed");
    assert_eq!(events[1]["error"], "Matrix is singular and cannot be inverted");
    assert_eq!(events[1]["executionTimeMs"], 3);
    assert_eq!(events[1]["taskId"], body["taskId"]);
}

// ---------------------------------------------------------------------------
// Test: completed status without a result matrix is treated as a failure
// ---------------------------------------------------------------------------

#[tokio::test]
async fn completed_without_result_is_a_failure() {
    let app = build_test_app();
    let mut sub = subscribe(&app.hub).await;

    let response = post_json(
        app.router,
        "/api/matrix/compute",
        json!({
            "matrixA": matrix(1, 1, &[1.0]),
            "matrixB": matrix(1, 1, &[1.0]),
            "operation": "subtract",
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["status"], "failed");
    assert_eq!(body["error"], "Backend returned no result matrix");

    let events = drain_events(&mut sub);
    assert_eq!(events.len(), 2);
    assert_eq!(events[1]["status"], "failed");
}

// ---------------------------------------------------------------------------
// Test: transport failure returns 502 with one error event
// ---------------------------------------------------------------------------

#[tokio::test]
async fn transport_failure_returns_502_and_error_event() {
    let app = build_test_app();
    let mut sub = subscribe(&app.hub).await;

    let response = post_json(
        app.router,
        "/api/matrix/compute",
        json!({
            "matrixA": matrix(1, 1, &[2.0]),
            "matrixB": matrix(1, 1, &[3.0]),
            "operation": "multiply",
            "taskId": "m-err",
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    assert_eq!(body["taskId"], "m-err");
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Error processing matrix computation: "));
    assert!(body["status"].as_str().unwrap().starts_with("error: "));
    assert!(body.get("resultMatrix").is_none());

    let events = drain_events(&mut sub);
    let statuses: Vec<_> = events.iter().map(|e| e["status"].clone()).collect();
    assert_eq!(statuses, vec![json!("started"), json!("error")]);
    assert!(events[1]["error"].as_str().unwrap().contains("deadline exceeded"));
}
