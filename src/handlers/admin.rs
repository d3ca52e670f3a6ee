//! Admin-console authentication boundary.
//!
//! The console consumes the same repository ports as the resource API but
//! carries its own session-cookie authentication: a submitted password is
//! compared against the stored bcrypt hash, and a successful login issues a
//! short-lived HS256 session token in an HttpOnly cookie. These routes sit
//! outside the API-key gate.

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use super::resource::bounded;
use crate::database::models::User;
use crate::error::ApiError;
use crate::state::AppState;

const SESSION_COOKIE: &str = "folio_admin_session";

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/login", post(login))
        .route("/admin/whoami", get(whoami))
        .route("/admin/session", delete(logout))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: Uuid,
    pub email: String,
    pub exp: i64,
    pub iat: i64,
}

impl SessionClaims {
    fn new(user: &User, ttl_hours: i64) -> Self {
        let now = Utc::now();
        Self {
            sub: user.id,
            email: user.email.clone(),
            exp: (now + Duration::hours(ttl_hours)).timestamp(),
            iat: now.timestamp(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

/// POST /admin/login - verify credentials against the stored hash and set
/// the session cookie.
async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let users = bounded(&state, state.users.list_all(&[])).await?;
    let user = users
        .into_iter()
        .find(|u| u.email == request.email)
        .filter(|u| bcrypt::verify(&request.password, &u.password).unwrap_or(false))
        .ok_or_else(|| ApiError::unauthorized("invalid credentials"))?;

    let claims = SessionClaims::new(&user, state.admin_session_ttl_hours);
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(state.admin_session_secret.as_bytes()),
    )
    .map_err(|e| {
        tracing::error!("session token generation failed: {}", e);
        ApiError::internal_server_error("failed to establish session")
    })?;

    let cookie = format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Strict");
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(json!({
            "id": user.id,
            "username": user.username,
            "email": user.email,
        })),
    ))
}

/// GET /admin/whoami - identify the session holder.
async fn whoami(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let claims = session_from_headers(&headers, state.admin_session_secret.as_bytes())?;
    Ok(Json(json!({ "id": claims.sub, "email": claims.email })))
}

/// DELETE /admin/session - clear the session cookie.
async fn logout() -> impl IntoResponse {
    let cookie = format!("{SESSION_COOKIE}=; Path=/; HttpOnly; Max-Age=0");
    (StatusCode::NO_CONTENT, [(header::SET_COOKIE, cookie)])
}

fn session_from_headers(headers: &HeaderMap, secret: &[u8]) -> Result<SessionClaims, ApiError> {
    let cookies = headers
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("missing session cookie"))?;

    let token = cookies
        .split(';')
        .filter_map(|part| part.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value)
        .ok_or_else(|| ApiError::unauthorized("missing session cookie"))?;

    decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| ApiError::unauthorized("invalid session"))
}
