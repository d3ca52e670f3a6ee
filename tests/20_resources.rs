mod common;

use anyhow::Result;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

fn timestamp(value: &Value) -> DateTime<Utc> {
    serde_json::from_value(value.clone()).expect("timestamp field")
}

#[tokio::test]
async fn blog_create_assigns_id_and_equal_timestamps() -> Result<()> {
    let app = common::test_app();
    let (user_id, _) = common::seed_user(&app, "ada", "ada@example.com").await;

    let (status, blog) = common::api(
        &app,
        "POST",
        "/blogs",
        Some(json!({
            "title": "A",
            "content": "B",
            "status": "Draft",
            "userId": user_id,
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(blog["id"].is_string());
    assert_eq!(blog["status"], json!("Draft"));
    assert_eq!(blog["createdAt"], blog["updatedAt"]);
    Ok(())
}

#[tokio::test]
async fn blog_status_outside_enumeration_is_rejected() -> Result<()> {
    let app = common::test_app();
    let (user_id, _) = common::seed_user(&app, "ada", "ada@example.com").await;

    let (status, body) = common::api(
        &app,
        "POST",
        "/blogs",
        Some(json!({
            "title": "A",
            "content": "B",
            "status": "Archived",
            "userId": user_id,
        })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap_or_default().contains("status"));
    Ok(())
}

#[tokio::test]
async fn unknown_service_id_is_a_shaped_not_found() -> Result<()> {
    let app = common::test_app();
    let (status, body) = common::api(
        &app,
        "GET",
        &format!("/services/{}", Uuid::new_v4()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "service not found" }));
    Ok(())
}

#[tokio::test]
async fn unknown_ids_yield_not_found_for_update_and_delete() -> Result<()> {
    let app = common::test_app();
    let missing = Uuid::new_v4();

    let (status, _) = common::api(
        &app,
        "PUT",
        &format!("/blogs/{missing}"),
        Some(json!({ "title": "X" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = common::api(&app, "DELETE", &format!("/blogs/{missing}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn create_then_get_round_trips_fields() -> Result<()> {
    let app = common::test_app();
    let (user_id, _) = common::seed_user(&app, "ada", "ada@example.com").await;

    let (_, created) = common::api(
        &app,
        "POST",
        "/projects",
        Some(json!({
            "userId": user_id,
            "title": "Portfolio",
            "description": "Personal site",
            "imageUrls": ["https://example.com/a.png"],
            "links": ["https://example.com"],
        })),
    )
    .await;
    let id = created["id"].as_str().unwrap();

    let (status, fetched) = common::api(&app, "GET", &format!("/projects/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    for field in ["id", "userId", "title", "description", "imageUrls", "links", "createdAt"] {
        assert_eq!(fetched[field], created[field], "field {field}");
    }
    Ok(())
}

#[tokio::test]
async fn partial_update_merges_and_bumps_updated_at() -> Result<()> {
    let app = common::test_app();
    let (user_id, _) = common::seed_user(&app, "ada", "ada@example.com").await;

    let (_, service) = common::api(
        &app,
        "POST",
        "/services",
        Some(json!({
            "userId": user_id,
            "title": "Consulting",
            "description": "Hourly",
            "price": 120.0,
            "duration": 60.0,
        })),
    )
    .await;
    let id = service["id"].as_str().unwrap();

    let (status, updated) = common::api(
        &app,
        "PUT",
        &format!("/services/{id}"),
        Some(json!({ "price": 150.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["price"], json!(150.0));
    assert_eq!(updated["title"], service["title"]);
    assert_eq!(updated["description"], service["description"]);
    assert_eq!(updated["duration"], service["duration"]);
    assert_eq!(updated["createdAt"], service["createdAt"]);
    assert!(
        timestamp(&updated["updatedAt"]) > timestamp(&service["updatedAt"]),
        "updatedAt must strictly increase"
    );
    Ok(())
}

#[tokio::test]
async fn delete_returns_empty_204_and_is_not_idempotent() -> Result<()> {
    let app = common::test_app();
    let (user_id, _) = common::seed_user(&app, "ada", "ada@example.com").await;

    let (_, project) = common::api(
        &app,
        "POST",
        "/projects",
        Some(json!({
            "userId": user_id,
            "title": "Old site",
            "description": "Retired",
        })),
    )
    .await;
    let id = project["id"].as_str().unwrap().to_string();

    let request = axum::http::Request::builder()
        .method("DELETE")
        .uri(format!("/projects/{id}"))
        .header("x-api-key", common::API_KEY)
        .body(axum::body::Body::empty())?;
    let (status, bytes) = common::read_bytes(common::send(&app, request).await).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(bytes.is_empty(), "204 must carry no body");

    let (status, _) = common::api(&app, "GET", &format!("/projects/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = common::api(&app, "DELETE", &format!("/projects/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND, "second delete must not succeed");
    Ok(())
}

#[tokio::test]
async fn malformed_requests_are_shaped_400s() -> Result<()> {
    let app = common::test_app();

    let (status, body) = common::api(&app, "GET", "/blogs/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "invalid id" }));

    // Broken JSON body still produces the uniform error shape.
    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/tags")
        .header("x-api-key", common::API_KEY)
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{ not json"))?;
    let (status, body) = common::read_json(common::send(&app, request).await).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = common::api(&app, "POST", "/tags", Some(json!(["rust"]))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].is_string());
    Ok(())
}

#[tokio::test]
async fn unknown_and_server_managed_fields_are_rejected() -> Result<()> {
    let app = common::test_app();

    let (status, body) = common::api(
        &app,
        "POST",
        "/tags",
        Some(json!({ "name": "rust", "color": "orange" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap_or_default().contains("color"));

    let (status, _) = common::api(
        &app,
        "POST",
        "/tags",
        Some(json!({ "name": "rust", "id": Uuid::new_v4().to_string() })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    Ok(())
}

#[tokio::test]
async fn user_password_never_appears_in_responses() -> Result<()> {
    let app = common::test_app();
    let (user_id, created) = common::seed_user(&app, "ada", "ada@example.com").await;
    assert!(created.get("password").is_none());

    let (_, fetched) = common::api(&app, "GET", &format!("/users/{user_id}"), None).await;
    assert!(fetched.get("password").is_none());

    let (_, listed) = common::api(&app, "GET", "/users", None).await;
    assert!(listed[0].get("password").is_none());
    Ok(())
}

#[tokio::test]
async fn list_returns_empty_array_not_an_error() -> Result<()> {
    let app = common::test_app();
    for path in ["/users", "/projects", "/blogs", "/services", "/tags", "/categories"] {
        let (status, body) = common::api(&app, "GET", path, None).await;
        assert_eq!(status, StatusCode::OK, "{path}");
        assert_eq!(body, json!([]), "{path}");
    }
    Ok(())
}
