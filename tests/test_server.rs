//! Integration test: Server API endpoints

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tabular_mlops::server::{create_router, AppState};
use tempfile::TempDir;
use tower::ServiceExt;

fn test_app(dir: &TempDir) -> axum::Router {
    let state = Arc::new(AppState::from_settings(common::settings(dir)).unwrap());
    create_router(state)
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder().method("DELETE").uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn upload(filename: &str, content: &str) -> Request<Body> {
    let boundary = "X-TEST-BOUNDARY";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\nContent-Type: text/csv\r\n\r\n{c}\r\n--{b}--\r\n",
        b = boundary,
        f = filename,
        c = content
    );
    Request::builder()
        .method("POST")
        .uri("/datasets")
        .header("content-type", format!("multipart/form-data; boundary={}", boundary))
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);
    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn test_list_model_classes() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);
    let (status, body) = send(&app, get("/models/classes")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"classes": ["logistic_regression", "random_forest"]}));
}

#[tokio::test]
async fn test_list_models_empty() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);
    let (status, body) = send(&app, get("/models")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_full_lifecycle() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    let (status, uploaded) = send(&app, upload("people.csv", &common::people_csv(100))).await;
    assert_eq!(status, StatusCode::OK, "{}", uploaded);
    assert_eq!(uploaded["rows"], json!(100));
    assert_eq!(uploaded["cols"], json!(3));
    let dataset_id = uploaded["dataset_id"].as_str().unwrap().to_string();

    let (status, datasets) = send(&app, get("/datasets")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(datasets[0]["original_filename"], json!("people.csv"));

    let (status, trained) = send(
        &app,
        post_json(
            "/train",
            json!({"model_key": "logistic_regression", "dataset_id": dataset_id, "hyperparams": {"C": 0.5}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", trained);
    let model_id = trained["model_id"].as_str().unwrap().to_string();
    assert!(trained["metrics"]["accuracy"].is_number());

    let (status, models) = send(&app, get("/models")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(models[0]["model_id"], json!(model_id));
    assert_eq!(models[0]["dataset_id"], json!(dataset_id));

    let (status, record) = send(&app, get(&format!("/models/{}", model_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["feature_order"], json!(["age", "city"]));

    let (status, predicted) = send(
        &app,
        post_json(
            "/predict",
            json!({"model_id": model_id, "instances": [{"age": 25, "city": "rome"}, {"age": 70}]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", predicted);
    assert_eq!(predicted["predictions"].as_array().unwrap().len(), 2);
    assert_eq!(predicted["probabilities"].as_array().unwrap().len(), 2);

    let (status, deleted) = send(&app, delete(&format!("/models/{}", model_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted, json!({"status": "deleted", "model_id": model_id}));

    let (status, _) = send(&app, delete(&format!("/models/{}", model_id))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, deleted) = send(&app, delete(&format!("/datasets/{}", dataset_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted, json!({"status": "deleted", "dataset_id": dataset_id}));
}

#[tokio::test]
async fn test_error_responses() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    let (status, body) = send(&app, post_json("/predict", json!({"model_id": "nope", "instances": []}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!(true));
    assert_eq!(body["message"], json!("No instances provided"));

    let (status, _) = send(&app, post_json("/predict", json!({"model_id": "nope", "instances": [{"a": 1}]}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, post_json("/train", json!({"model_key": "random_forest", "dataset_id": "missing"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, post_json("/train", json!({"dataset_id": "missing"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, upload("empty.csv", "a,b\n")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], json!("Empty dataset"));

    let (status, _) = send(&app, get("/models/unknown")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, get("/no/such/route")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
