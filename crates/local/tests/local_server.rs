//! Client behaviour against an in-process fake of the companion server.

use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use fitbooth_core::EncodedImage;
use fitbooth_local::{
    FailureReport, LocalServerClient, LocalServerConfig, LocalServerError, ResultCache,
};

#[derive(Clone, Default)]
struct Recorded {
    fields: Arc<Mutex<Vec<(String, Option<String>, usize)>>>,
    failures: Arc<Mutex<Vec<Value>>>,
}

async fn record_multipart(recorded: &Recorded, mut multipart: Multipart) {
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let bytes = field.bytes().await.unwrap();
        recorded.fields.lock().unwrap().push((name, file_name, bytes.len()));
    }
}

async fn upload(State(recorded): State<Recorded>, multipart: Multipart) -> Json<Value> {
    record_multipart(&recorded, multipart).await;
    Json(json!({
        "success": true,
        "filename": "capture-1.jpg",
        "path": "/Images_input/capture-1.jpg",
        "message": "Image uploaded successfully"
    }))
}

async fn save_result(State(recorded): State<Recorded>, multipart: Multipart) -> Json<Value> {
    record_multipart(&recorded, multipart).await;
    Json(json!({
        "success": true,
        "filename": "result_001.jpg",
        "path": "/result_s/result_001.jpg"
    }))
}

async fn results() -> Json<Value> {
    Json(json!({
        "results": [{
            "filename": "result_001.jpg",
            "path": "/result_s/result_001.jpg",
            "status": "success",
            "timestamp": "2025-03-05T10:00:00.000Z",
            "size": 1234,
            "error": null
        }]
    }))
}

async fn track_failure(State(recorded): State<Recorded>, Json(body): Json<Value>) -> Json<Value> {
    recorded.failures.lock().unwrap().push(body);
    Json(json!({ "success": true }))
}

async fn spawn(router: Router) -> LocalServerClient {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    LocalServerClient::new(&LocalServerConfig {
        base_url: format!("http://{addr}"),
    })
}

async fn healthy_server() -> (LocalServerClient, Recorded) {
    let recorded = Recorded::default();
    let router = Router::new()
        .route("/api/upload", post(upload))
        .route("/api/save-result", post(save_result))
        .route("/api/results", get(results))
        .route("/api/track-failure", post(track_failure))
        .route("/result_s/result_001.jpg", get(|| async { vec![1u8, 2, 3] }))
        .with_state(recorded.clone());
    (spawn(router).await, recorded)
}

#[tokio::test]
async fn upload_sends_image_field() {
    let (client, recorded) = healthy_server().await;

    let response = client
        .upload_image(EncodedImage::jpeg(vec![0xFF; 64], "capture.jpg"))
        .await
        .unwrap();

    assert_eq!(response.path, "/Images_input/capture-1.jpg");
    let fields = recorded.fields.lock().unwrap();
    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0].0, "image");
    assert_eq!(fields[0].1.as_deref(), Some("capture.jpg"));
    assert_eq!(fields[0].2, 64);
}

#[tokio::test]
async fn upload_rejection_is_an_api_error() {
    let router = Router::new().route(
        "/api/upload",
        post(|| async { (StatusCode::BAD_REQUEST, Json(json!({ "error": "No file uploaded" }))) }),
    );
    let client = spawn(router).await;

    let err = client
        .upload_image(EncodedImage::jpeg(vec![1], "capture.jpg"))
        .await
        .unwrap_err();
    assert_matches!(err, LocalServerError::ApiError { status: 400, .. });
}

#[tokio::test]
async fn upload_without_path_is_an_error() {
    let router = Router::new().route("/api/upload", post(|| async { Json(json!({ "success": true })) }));
    let client = spawn(router).await;

    let err = client
        .upload_image(EncodedImage::jpeg(vec![1], "capture.jpg"))
        .await
        .unwrap_err();
    assert_matches!(err, LocalServerError::MissingPath);
}

#[tokio::test]
async fn save_result_uses_result_field() {
    let (client, recorded) = healthy_server().await;

    let outcome = ResultCache::save_result(&client, vec![7; 10], "result_001.jpg").await;

    assert!(outcome.success);
    assert_eq!(outcome.path.as_deref(), Some("/result_s/result_001.jpg"));
    let fields = recorded.fields.lock().unwrap();
    assert_eq!(fields[0].0, "result");
    assert_eq!(fields[0].1.as_deref(), Some("result_001.jpg"));
}

#[tokio::test]
async fn save_result_failure_is_folded_into_outcome() {
    let router = Router::new().route(
        "/api/save-result",
        post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
    );
    let client = spawn(router).await;

    let outcome = client.save_result(vec![1], "r.jpg").await;
    assert!(!outcome.success);
    assert_eq!(outcome.error.as_deref(), Some("Local save failed: 500"));
}

#[tokio::test]
async fn save_result_when_server_is_down_does_not_fail() {
    // Bind then drop to get a port nobody listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let client = LocalServerClient::new(&LocalServerConfig {
        base_url: format!("http://{addr}"),
    });

    let outcome = client.save_result(vec![1], "r.jpg").await;
    assert!(!outcome.success);
    assert!(outcome.error.is_some());
}

#[tokio::test]
async fn lists_results() {
    let (client, _) = healthy_server().await;

    let results = client.list_results().await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].filename, "result_001.jpg");
    assert_eq!(results[0].size, 1234);
    assert_eq!(results[0].error, None);
}

#[tokio::test]
async fn fetches_relative_image_paths() {
    let (client, _) = healthy_server().await;
    let bytes = client.fetch_image("/result_s/result_001.jpg").await.unwrap();
    assert_eq!(bytes, vec![1, 2, 3]);
}

#[tokio::test]
async fn track_failure_posts_camel_case_body() {
    let (client, recorded) = healthy_server().await;

    client
        .track_failure(&FailureReport {
            filename: "failed-1".into(),
            error: "Task failed".into(),
            original_image: "/Images_input/capture-1.jpg".into(),
            selected_costume: "costume-3".into(),
        })
        .await;

    let failures = recorded.failures.lock().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0]["selectedCostume"], "costume-3");
    assert_eq!(failures[0]["originalImage"], "/Images_input/capture-1.jpg");
}
