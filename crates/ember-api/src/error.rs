use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

use ember_db::error::StoreError;

/// Errors carried to the HTTP boundary. Write failures report their
/// specific reason; internals are logged and collapsed.
pub enum ApiError {
    Store(StoreError),
    Unauthorized,
}

impl ApiError {
    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Store(StoreError::Internal(message.into()))
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Store(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, "invalid credentials".to_string())
            }
            ApiError::Store(e) => {
                let status = match &e {
                    StoreError::Validation(_) => StatusCode::BAD_REQUEST,
                    StoreError::NotFound(_) => StatusCode::NOT_FOUND,
                    StoreError::Conflict(_) | StoreError::NotJoinable | StoreError::Full => {
                        StatusCode::CONFLICT
                    }
                    StoreError::Forbidden(_) => StatusCode::FORBIDDEN,
                    StoreError::Gone(_) => StatusCode::GONE,
                    StoreError::Db(_) | StoreError::Internal(_) => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    error!("Internal error: {}", e);
                    (status, "internal error".to_string())
                } else {
                    (status, e.to_string())
                }
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
