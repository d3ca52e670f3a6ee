//! The generic resource controller.
//!
//! One parameterized set of CRUD handlers serves every entity kind; binding
//! happens once per kind in the router. The controller is a pure translation
//! layer between repository outcomes and response signals: no caching, no
//! secondary writes, no retries. Repository calls are the only suspension
//! points and each one is bounded by the configured timeout.

use std::future::Future;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::database::models::Resource;
use crate::database::repository::{RepositoryError, ResourceRepository};
use crate::error::ApiError;
use crate::schema;
use crate::state::{AppState, ProvideRepository};

/// Routes for one entity kind. Registration is declarative and identical for
/// every kind; anything entity-specific lives in the schema registry or the
/// store, never here.
pub fn resource_routes<E>() -> Router<AppState>
where
    E: Resource,
    AppState: ProvideRepository<E>,
{
    let path = schema::schema(E::KIND).path;
    Router::new()
        .route(&format!("/{path}"), get(list_all::<E>).post(create::<E>))
        .route(
            &format!("/{path}/:id"),
            get(get_by_id::<E>).put(update::<E>).delete(remove::<E>),
        )
}

fn repo<E>(state: &AppState) -> &dyn ResourceRepository<E>
where
    E: Resource,
    AppState: ProvideRepository<E>,
{
    <AppState as ProvideRepository<E>>::repository(state)
}

/// Run a repository call under the configured timeout; expiry is a
/// transport failure, not a hang.
pub(crate) async fn bounded<T>(
    state: &AppState,
    call: impl Future<Output = Result<T, RepositoryError>>,
) -> Result<T, ApiError> {
    match tokio::time::timeout(state.repository_timeout, call).await {
        Ok(result) => result.map_err(ApiError::from),
        Err(_) => Err(ApiError::service_unavailable("repository call timed out")),
    }
}

fn parse_path_id(id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id).map_err(|_| ApiError::bad_request("invalid id"))
}

/// Unwrap the request body into a JSON object, shaping extractor rejections
/// into the uniform error body.
fn object_payload(body: Result<Json<Value>, JsonRejection>) -> Result<Map<String, Value>, ApiError> {
    let Json(value) = body.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ApiError::validation_error("payload must be a JSON object")),
    }
}

/// GET /{kind} - list every live record, relations expanded.
async fn list_all<E>(State(state): State<AppState>) -> Result<Json<Vec<E>>, ApiError>
where
    E: Resource,
    AppState: ProvideRepository<E>,
{
    let include = schema::schema(E::KIND).relations;
    let records = bounded(&state, repo::<E>(&state).list_all(include)).await?;
    Ok(Json(records))
}

/// GET /{kind}/{id} - fetch one record by id, relations expanded.
async fn get_by_id<E>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<E>, ApiError>
where
    E: Resource,
    AppState: ProvideRepository<E>,
{
    let id = parse_path_id(&id)?;
    let include = schema::schema(E::KIND).relations;
    let record = bounded(&state, repo::<E>(&state).get_by_id(id, include)).await?;
    Ok(Json(record))
}

/// POST /{kind} - create a record; the server assigns id and timestamps.
async fn create<E>(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<E>, ApiError>
where
    E: Resource,
    AppState: ProvideRepository<E>,
{
    let fields = object_payload(body)?;
    let created = bounded(&state, repo::<E>(&state).create(fields)).await?;
    Ok(Json(created))
}

/// PUT /{kind}/{id} - partial update; omitted fields are left unchanged.
async fn update<E>(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<E>, ApiError>
where
    E: Resource,
    AppState: ProvideRepository<E>,
{
    let id = parse_path_id(&id)?;
    let fields = object_payload(body)?;
    let updated = bounded(&state, repo::<E>(&state).update(id, fields)).await?;
    Ok(Json(updated))
}

/// DELETE /{kind}/{id} - remove a record; success is 204 with no body.
async fn remove<E>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError>
where
    E: Resource,
    AppState: ProvideRepository<E>,
{
    let id = parse_path_id(&id)?;
    bounded(&state, repo::<E>(&state).delete(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
