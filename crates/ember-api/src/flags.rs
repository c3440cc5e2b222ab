use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;

use ember_types::api::{Claims, CreateFlagRequest};

use crate::error::ApiError;
use crate::{AppState, blocking};

/// Reporter-facing ingestion. A duplicate report of the same target by the
/// same user resolves to the uniqueness constraint and is acknowledged
/// exactly like a fresh one — never surfaced as an error.
pub async fn create_flag(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateFlagRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let reporter_id = claims.sub.to_string();
    blocking(move || {
        db.create_flag(
            &reporter_id,
            req.target_type,
            &req.target_id.to_string(),
            &req.reason,
            Utc::now(),
        )
    })
    .await?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "success": true }))))
}
