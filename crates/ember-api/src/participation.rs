use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use ember_db::error::StoreError;
use ember_db::parse_ts;
use ember_types::api::{Claims, ParticipantResponse, ParticipationResponse};

use crate::error::ApiError;
use crate::{AppState, blocking, uuid_or_nil};

pub async fn join(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let user_id = claims.sub.to_string();
    let row = blocking(move || db.join_moment(&id.to_string(), &user_id, Utc::now())).await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": row.id,
            "moment_id": row.moment_id,
            "user_id": row.user_id,
            "joined_at": parse_ts(&row.joined_at),
        })),
    ))
}

pub async fn leave(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let user_id = claims.sub.to_string();
    blocking(move || db.leave_moment(&id.to_string(), &user_id)).await?;

    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn participants(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let rows = blocking(move || db.list_participants(&id.to_string())).await?;

    let body: Vec<ParticipantResponse> = rows
        .into_iter()
        .map(|p| ParticipantResponse {
            id: uuid_or_nil(&p.id),
            user_id: uuid_or_nil(&p.user_id),
            joined_at: parse_ts(&p.joined_at),
            display_name: p.display_name,
            user_type: p.user_type,
            profile_photo_url: p.profile_photo_url,
        })
        .collect();

    Ok(Json(body))
}

pub async fn participation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let user_id = claims.sub.to_string();
    let is_participant = blocking(move || db.is_participant(&id.to_string(), &user_id)).await?;

    Ok(Json(ParticipationResponse { is_participant }))
}

/// Authorization gate shared by the chat and SOS surfaces: 403 unless the
/// caller currently participates in the moment.
pub(crate) async fn ensure_participant(
    state: &AppState,
    moment_id: Uuid,
    user_id: Uuid,
) -> Result<(), ApiError> {
    let db = state.db.clone();
    let is_participant =
        blocking(move || db.is_participant(&moment_id.to_string(), &user_id.to_string())).await?;
    if !is_participant {
        return Err(StoreError::Forbidden("must be a participant").into());
    }
    Ok(())
}
