use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use ember_db::models::ProfileRow;
use ember_db::profiles::NewProfile;
use ember_types::api::{Claims, ProfileRequest, ProfileResponse};

use crate::error::ApiError;
use crate::{AppState, blocking, uuid_or_nil};

pub async fn create_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let user_id = claims.sub.to_string();
    let row = blocking(move || {
        db.create_profile(
            &user_id,
            &NewProfile {
                display_name: &req.display_name,
                home_country: &req.home_country,
                languages: &req.languages,
                user_type: &req.user_type,
                profile_photo_url: req.profile_photo_url.as_deref(),
            },
            Utc::now(),
        )
    })
    .await?;

    Ok((StatusCode::CREATED, Json(to_response(row))))
}

pub async fn get_profile(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let row = blocking(move || db.get_profile(&id.to_string()))
        .await?
        .ok_or(ember_db::error::StoreError::NotFound("profile"))?;

    Ok(Json(to_response(row)))
}

/// Users can only update their own profile; the id comes from the token.
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let user_id = claims.sub.to_string();
    let row = blocking(move || {
        db.update_profile(
            &user_id,
            &NewProfile {
                display_name: &req.display_name,
                home_country: &req.home_country,
                languages: &req.languages,
                user_type: &req.user_type,
                profile_photo_url: req.profile_photo_url.as_deref(),
            },
            Utc::now(),
        )
    })
    .await?;

    Ok(Json(to_response(row)))
}

fn to_response(row: ProfileRow) -> ProfileResponse {
    let languages = serde_json::from_str(&row.languages).unwrap_or_else(|e| {
        warn!("Corrupt languages on profile '{}': {}", row.id, e);
        Vec::new()
    });

    ProfileResponse {
        id: uuid_or_nil(&row.id),
        display_name: row.display_name,
        home_country: row.home_country,
        languages,
        user_type: row.user_type,
        profile_photo_url: row.profile_photo_url,
        profile_photo_uploaded_at: row.profile_photo_uploaded_at.as_deref().map(ember_db::parse_ts),
    }
}
