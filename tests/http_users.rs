use std::sync::Arc;

use axum::{
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use serde_json::{Value, json};
use stagegate::{
    AppState, MemoryObjectStore, ObjectStore, ReviewConfig, ReviewEngine, build_router,
    store::StoreOp,
};
use tower::ServiceExt;

fn app() -> (axum::Router, Arc<MemoryObjectStore>) {
    let staging = Arc::new(MemoryObjectStore::new("review-public"));
    let admin = Arc::new(MemoryObjectStore::new("review-admin"));
    let engine = ReviewEngine::new(ReviewConfig::default(), staging, admin.clone());
    (build_router(AppState::new(Arc::new(engine)), None), admin)
}

async fn send(
    app: &axum::Router,
    method: Method,
    uri: &str,
    payload: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match payload {
        Some(payload) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request should build");

    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("response expected");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body should be readable");

    if body.is_empty() {
        return (status, Value::Null);
    }

    let json = serde_json::from_slice::<Value>(&body).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn save_get_list_delete_user() {
    let (app, admin) = app();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/user/save",
        Some(json!({
            "username": "alice",
            "data": {"role": "admin"},
            "isNew": true,
            "encryptedPassword": "U2FsdGVk",
            "updatePassword": true
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true}));
    assert_eq!(admin.get("alice/alice.pwd").await.unwrap().body, b"U2FsdGVk");

    let (status, record) = send(&app, Method::GET, "/api/user/alice", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record, json!({"role": "admin"}));

    let (_, users) = send(&app, Method::GET, "/api/users/list", None).await;
    assert_eq!(users, json!(["alice"]));

    let (status, _) = send(&app, Method::DELETE, "/api/user/alice", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, Method::GET, "/api/user/alice", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, users) = send(&app, Method::GET, "/api/users/list", None).await;
    assert_eq!(users, json!([]));
}

#[tokio::test]
async fn save_without_username_is_bad_request() {
    let (app, admin) = app();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/user/save",
        Some(json!({"data": {}})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "username is required");
    assert!(admin.is_empty().await);
}

#[tokio::test]
async fn users_list_rebuilds_missing_index() {
    let (app, admin) = app();
    admin.put("bob/bob.json", b"{}".to_vec(), "").await.unwrap();
    admin.put("amy/amy.json", b"{}".to_vec(), "").await.unwrap();

    let (status, users) = send(&app, Method::GET, "/api/users/list", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(users, json!(["amy", "bob"]));
    assert!(admin.contains("user.json").await);
}

#[tokio::test]
async fn corrupt_records_are_server_errors() {
    let (app, admin) = app();
    admin.put("user.json", b"{oops".to_vec(), "").await.unwrap();
    admin.put("eve/eve.json", b"nope".to_vec(), "").await.unwrap();

    let (status, _) = send(&app, Method::GET, "/api/users/list", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (status, _) = send(&app, Method::GET, "/api/user/eve", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn delete_failure_is_reported() {
    let (app, admin) = app();
    admin.put("gil/gil.json", b"{}".to_vec(), "").await.unwrap();
    admin.fail_on(StoreOp::Delete, "gil/gil.json").await;

    let (status, body) = send(&app, Method::DELETE, "/api/user/gil", None).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "some files failed to delete");
}

#[tokio::test]
async fn malformed_save_body_is_a_json_error() {
    let (app, admin) = app();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/user/save")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .expect("request should build");
    let response = app.clone().oneshot(request).await.expect("response expected");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&body).expect("error body should be JSON");
    assert!(
        body["error"]
            .as_str()
            .unwrap()
            .starts_with("invalid request body")
    );

    let (status, body) = send(&app, Method::POST, "/api/user/save", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
    assert!(admin.is_empty().await);
}
