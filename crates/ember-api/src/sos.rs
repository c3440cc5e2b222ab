use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;

use ember_db::parse_ts;
use ember_types::api::{Claims, CreateSosRequest, SosAlertResponse};

use crate::error::ApiError;
use crate::participation::ensure_participant;
use crate::{AppState, blocking, uuid_or_nil};

/// Alerts come from inside a moment, so only participants can raise one.
pub async fn create_alert(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateSosRequest>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_participant(&state, req.moment_id, claims.sub).await?;

    let db = state.db.clone();
    let user_id = claims.sub.to_string();
    let row = blocking(move || {
        db.create_sos_alert(&user_id, &req.moment_id.to_string(), req.lat, req.lng, Utc::now())
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(SosAlertResponse {
            id: uuid_or_nil(&row.id),
            moment_id: uuid_or_nil(&row.moment_id),
            moment_title: None,
            lat: row.lat,
            lng: row.lng,
            created_at: parse_ts(&row.created_at),
        }),
    ))
}

pub async fn list_active_alerts(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let rows = blocking(move || db.active_sos_alerts()).await?;

    let body: Vec<SosAlertResponse> = rows
        .into_iter()
        .map(|row| SosAlertResponse {
            id: uuid_or_nil(&row.id),
            moment_id: uuid_or_nil(&row.moment_id),
            moment_title: row.moment_title,
            lat: row.lat,
            lng: row.lng,
            created_at: parse_ts(&row.created_at),
        })
        .collect();

    Ok(Json(body))
}
