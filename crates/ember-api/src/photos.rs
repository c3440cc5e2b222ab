use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use ember_db::models::PhotoRow;
use ember_db::parse_ts;
use ember_types::api::{AddPhotoRequest, Claims, PhotoResponse};

use crate::error::ApiError;
use crate::{AppState, blocking, uuid_or_nil};

#[derive(Debug, Deserialize)]
pub struct PhotosQuery {
    #[serde(default)]
    pub preview: bool,
}

pub async fn list_photos(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<PhotosQuery>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let rows = blocking(move || db.moment_photos(&id.to_string(), query.preview)).await?;

    let body: Vec<PhotoResponse> = rows.into_iter().map(to_response).collect();
    Ok(Json(body))
}

/// Registers an already-uploaded photo against the moment. The byte
/// plumbing lives in the upload collaborator; this only records the
/// storage reference.
pub async fn add_photo(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<AddPhotoRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let uploader_id = claims.sub.to_string();
    let row = blocking(move || {
        // Reject references against missing moments up front; the photos
        // table has no generated check for it beyond the FK.
        db.get_moment(&id.to_string())?;
        db.add_photo(
            &id.to_string(),
            &uploader_id,
            &req.photo_url,
            req.caption.as_deref(),
            req.is_preview,
            Utc::now(),
        )
    })
    .await?;

    Ok((StatusCode::CREATED, Json(to_response(row))))
}

fn to_response(row: PhotoRow) -> PhotoResponse {
    PhotoResponse {
        id: uuid_or_nil(&row.id),
        moment_id: uuid_or_nil(&row.moment_id),
        uploader_id: uuid_or_nil(&row.uploader_id),
        photo_url: row.photo_url,
        caption: row.caption,
        is_preview: row.is_preview,
        uploaded_at: parse_ts(&row.uploaded_at),
    }
}
