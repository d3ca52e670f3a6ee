// HTTP API error types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::database::repository::RepositoryError;

/// HTTP API error with appropriate status codes and client-friendly messages.
/// Every failure response is a JSON object with a single `error` string.
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized (admin session)
    Unauthorized(String),

    // 403 Forbidden (access gate)
    Forbidden,

    // 404 Not Found
    NotFound(String),

    // 409 Conflict (unique fields, dangling references, ownership policy)
    Conflict(String),

    // 422 Unprocessable Entity (payload validation)
    ValidationError(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable (store unreachable, repository timeout)
    ServiceUnavailable(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Client-safe error message.
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::Unauthorized(msg) => msg,
            ApiError::Forbidden => "Forbidden",
            ApiError::NotFound(msg) => msg,
            ApiError::Conflict(msg) => msg,
            ApiError::ValidationError(msg) => msg,
            ApiError::InternalServerError(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    pub fn to_json(&self) -> Value {
        json!({ "error": self.message() })
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        ApiError::ValidationError(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(kind) => {
                ApiError::not_found(format!("{} not found", kind))
            }
            RepositoryError::Validation(msg) => ApiError::validation_error(msg),
            RepositoryError::Conflict(msg) => ApiError::conflict(msg),
            RepositoryError::Unavailable(msg) => {
                tracing::error!("store unavailable: {}", msg);
                ApiError::service_unavailable("store temporarily unavailable")
            }
            // Residual store errors keep the original catch-all 400 shape.
            RepositoryError::Store(msg) => ApiError::bad_request(msg),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status_code(), Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::EntityKind;

    #[test]
    fn repository_errors_map_to_the_split_codes() {
        let cases = [
            (
                ApiError::from(RepositoryError::NotFound(EntityKind::Service)),
                StatusCode::NOT_FOUND,
                "service not found",
            ),
            (
                ApiError::from(RepositoryError::Validation("bad".into())),
                StatusCode::UNPROCESSABLE_ENTITY,
                "bad",
            ),
            (
                ApiError::from(RepositoryError::Conflict("dup".into())),
                StatusCode::CONFLICT,
                "dup",
            ),
        ];
        for (err, status, message) in cases {
            assert_eq!(err.status_code(), status);
            assert_eq!(err.to_json(), json!({ "error": message }));
        }
    }

    #[test]
    fn forbidden_matches_the_gate_contract() {
        assert_eq!(ApiError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::Forbidden.to_json(), json!({ "error": "Forbidden" }));
    }
}
