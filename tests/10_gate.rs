mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use axum::http::StatusCode;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use folio_api::database::models::User;
use folio_api::database::repository::{RepositoryError, ResourceRepository};
use folio_api::database::MemoryStore;
use folio_api::schema::{EntityKind, RelationDef};
use folio_api::state::AppState;

#[tokio::test]
async fn missing_key_is_forbidden_on_every_verb() -> Result<()> {
    let app = common::test_app();

    for (method, path) in [
        ("GET", "/blogs"),
        ("GET", "/blogs/someid"),
        ("POST", "/users"),
        ("PUT", "/services/someid"),
        ("DELETE", "/projects/someid"),
        ("GET", "/api-docs/openapi.json"),
    ] {
        let body = if matches!(method, "POST" | "PUT") {
            Some(json!({}))
        } else {
            None
        };
        let (status, body) = common::api_with_key(&app, method, path, None, body).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{method} {path}");
        assert_eq!(body, json!({ "error": "Forbidden" }), "{method} {path}");
    }
    Ok(())
}

#[tokio::test]
async fn wrong_key_is_forbidden() -> Result<()> {
    let app = common::test_app();
    let (status, body) =
        common::api_with_key(&app, "GET", "/tags", Some("not-the-key"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, json!({ "error": "Forbidden" }));
    Ok(())
}

#[tokio::test]
async fn correct_key_passes_the_gate() -> Result<()> {
    let app = common::test_app();
    let (status, body) = common::api(&app, "GET", "/tags", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
    Ok(())
}

#[tokio::test]
async fn health_is_public() -> Result<()> {
    let app = common::test_app();
    let (status, body) = common::api_with_key(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("ok"));
    Ok(())
}

/// Repository probe that records every call; swapped in through the port to
/// prove denied requests never reach persistence.
struct ProbeRepo {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl ResourceRepository<User> for ProbeRepo {
    async fn list_all(&self, _include: &[RelationDef]) -> Result<Vec<User>, RepositoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Vec::new())
    }

    async fn get_by_id(
        &self,
        _id: Uuid,
        _include: &[RelationDef],
    ) -> Result<User, RepositoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(RepositoryError::NotFound(EntityKind::User))
    }

    async fn create(&self, _fields: Map<String, Value>) -> Result<User, RepositoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(RepositoryError::Validation("probe".into()))
    }

    async fn update(
        &self,
        _id: Uuid,
        _fields: Map<String, Value>,
    ) -> Result<User, RepositoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(RepositoryError::NotFound(EntityKind::User))
    }

    async fn delete(&self, _id: Uuid) -> Result<(), RepositoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(RepositoryError::NotFound(EntityKind::User))
    }
}

#[tokio::test]
async fn denied_requests_never_reach_the_repository() -> Result<()> {
    let calls = Arc::new(AtomicUsize::new(0));
    let store = Arc::new(MemoryStore::new());
    let config = common::test_config();
    let mut state = AppState::new(store, &config);
    state.users = Arc::new(ProbeRepo {
        calls: calls.clone(),
    });
    let app = common::test_app_with_state(state);

    let id = Uuid::new_v4();
    for (method, path) in [
        ("GET", "/users".to_string()),
        ("GET", format!("/users/{id}")),
        ("POST", "/users".to_string()),
        ("PUT", format!("/users/{id}")),
        ("DELETE", format!("/users/{id}")),
    ] {
        let body = if matches!(method, "POST" | "PUT") {
            Some(json!({ "username": "x" }))
        } else {
            None
        };
        let (status, _) = common::api_with_key(&app, method, &path, None, body).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{method} {path}");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0, "repository was reached");

    // Same requests with the credential do reach it.
    let (status, _) = common::api(&app, "GET", "/users", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    Ok(())
}
