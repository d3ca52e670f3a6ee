use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::ApiError;
use crate::state::AppState;

/// Access gate: every request on the resource surface must carry the shared
/// secret in the x-api-key header. Absence or mismatch short-circuits the
/// request before any controller or repository runs.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get("x-api-key")
        .and_then(|value| value.to_str().ok());

    if presented != Some(state.api_key.as_ref()) {
        return ApiError::Forbidden.into_response();
    }

    next.run(request).await
}
