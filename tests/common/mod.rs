use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use folio_api::api;
use folio_api::config::{AdminConfig, AppConfig};
use folio_api::database::MemoryStore;
use folio_api::state::AppState;

pub const API_KEY: &str = "test-api-key";
pub const ADMIN_SECRET: &str = "test-session-secret";

pub fn test_config() -> AppConfig {
    AppConfig {
        port: 0,
        database_url: String::new(),
        api_key: API_KEY.to_string(),
        repository_timeout: Duration::from_secs(5),
        admin: AdminConfig {
            session_secret: ADMIN_SECRET.to_string(),
            session_ttl_hours: 1,
        },
    }
}

/// Router over a fresh in-memory store; every test gets its own world.
pub fn test_app() -> Router {
    api::app(AppState::new(Arc::new(MemoryStore::new()), &test_config()))
}

pub fn test_app_with_state(state: AppState) -> Router {
    api::app(state)
}

/// Drive one request through the router without binding a socket.
pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.expect("infallible router")
}

pub async fn read_json(response: Response<Body>) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body collect")
        .to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

pub async fn read_bytes(response: Response<Body>) -> (StatusCode, Vec<u8>) {
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body collect")
        .to_bytes();
    (status, bytes.to_vec())
}

/// Request against the gated resource surface, API key attached.
pub async fn api(
    app: &Router,
    method: &str,
    path: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(path)
        .header("x-api-key", API_KEY);
    let request = match body {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    };
    read_json(send(app, request).await).await
}

/// Same surface, but without (or with the wrong) credential.
pub async fn api_with_key(
    app: &Router,
    method: &str,
    path: &str,
    key: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(key) = key {
        builder = builder.header("x-api-key", key);
    }
    let request = match body {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    };
    read_json(send(app, request).await).await
}

/// Create a user and return its id plus the full body.
pub async fn seed_user(app: &Router, username: &str, email: &str) -> (String, Value) {
    let (status, body) = api(
        app,
        "POST",
        "/users",
        Some(json!({
            "username": username,
            "email": email,
            "password": "hunter2",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "seeding user failed: {body}");
    let id = body["id"].as_str().expect("user id").to_string();
    (id, body)
}
