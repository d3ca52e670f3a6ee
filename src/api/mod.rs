//! Router assembly.
//!
//! Each entity kind is registered exactly once against the generic resource
//! controller; the whole resource surface (docs included) sits behind the
//! API-key gate, while /health and the admin session boundary stay outside
//! it.

use axum::routing::get;
use axum::{middleware, Json, Router};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::database::models::{Blog, Category, Project, Service, Tag, User};
use crate::handlers::{admin, docs, resource};
use crate::middleware::require_api_key;
use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let resources = Router::new()
        .merge(resource::resource_routes::<User>())
        .merge(resource::resource_routes::<Project>())
        .merge(resource::resource_routes::<Blog>())
        .merge(resource::resource_routes::<Service>())
        .merge(resource::resource_routes::<Tag>())
        .merge(resource::resource_routes::<Category>())
        .route("/api-docs/openapi.json", get(docs::openapi_json))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    Router::new()
        .route("/health", get(health))
        .merge(resources)
        .merge(admin::admin_routes())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now(),
    }))
}
