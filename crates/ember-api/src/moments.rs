use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use ember_db::error::StoreError;
use ember_db::models::{MomentRow, NearbyMoment};
use ember_db::moments::NewMoment;
use ember_db::parse_ts;
use ember_types::api::{
    Claims, CreateMomentRequest, MomentContextResponse, MomentResponse, MomentStatus,
    NearbyMomentResponse,
};

use crate::error::ApiError;
use crate::{AppState, blocking, uuid_or_nil};

#[derive(Debug, Deserialize)]
pub struct NearbyQuery {
    pub lat: f64,
    pub lng: f64,
    #[serde(default = "default_nearby_radius")]
    pub radius: f64,
    #[serde(default = "default_nearby_limit")]
    pub limit: usize,
}

fn default_nearby_radius() -> f64 {
    5_000.0
}

fn default_nearby_limit() -> usize {
    50
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(default = "default_search_radius")]
    pub radius: f64,
    #[serde(default = "default_search_limit")]
    pub limit: usize,
}

fn default_search_radius() -> f64 {
    10_000.0
}

fn default_search_limit() -> usize {
    20
}

pub async fn create_moment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateMomentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let creator_id = claims.sub.to_string();
    let row = blocking(move || {
        db.create_moment(
            &NewMoment {
                creator_id: &creator_id,
                title: &req.title,
                lat: req.lat,
                lng: req.lng,
                city_code: req.city_code.as_deref(),
                starts_at: req.starts_at,
                ends_at: req.ends_at,
                max_participants: req.max_participants,
            },
            Utc::now(),
        )
    })
    .await?;

    // Best-effort title moderation: a pipeline failure is a logged gap,
    // never a rollback of the create.
    let db = state.db.clone();
    let moment_id = row.id.clone();
    let title = row.title.clone();
    let moderated = tokio::task::spawn_blocking(move || {
        ember_moderation::moderate_moment_title(&db, &moment_id, &title)
    })
    .await;
    let row = match moderated {
        Ok(Ok(outcome)) if outcome.flagged_reason().is_some() => {
            // Reflect the hidden status in the response.
            let db = state.db.clone();
            let moment_id = row.id.clone();
            blocking(move || db.get_moment(&moment_id)).await.unwrap_or(row)
        }
        Ok(Ok(_)) => row,
        Ok(Err(e)) => {
            warn!("Moderation skipped for moment {}: {}", row.id, e);
            row
        }
        Err(e) => {
            warn!("Moderation task failed for moment {}: {}", row.id, e);
            row
        }
    };

    Ok((StatusCode::CREATED, Json(to_response(row))))
}

pub async fn get_moment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let row = blocking(move || db.get_moment(&id.to_string())).await?;
    Ok(Json(to_response(row)))
}

pub async fn nearby(
    State(state): State<AppState>,
    Query(query): Query<NearbyQuery>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let hits = blocking(move || {
        db.nearby_moments(query.lat, query.lng, query.radius, query.limit, Utc::now())
    })
    .await?;

    let body: Vec<NearbyMomentResponse> = hits.into_iter().map(to_nearby_response).collect();
    Ok(Json(body))
}

pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let hits = blocking(move || {
        db.search_moments(&query.q, query.lat, query.lng, query.radius, query.limit, Utc::now())
    })
    .await?;

    let body: Vec<NearbyMomentResponse> = hits.into_iter().map(to_nearby_response).collect();
    Ok(Json(body))
}

pub async fn moment_context(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let context = blocking(move || db.moment_context(&id.to_string())).await?;

    Ok(Json(MomentContextResponse {
        participant_count: context.participant_count as u32,
        badges: context.badges,
    }))
}

/// Only the creator may delete; admin remediation goes through its own
/// surface.
pub async fn delete_moment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let user_id = claims.sub.to_string();
    blocking(move || {
        let moment = db.get_moment(&id.to_string())?;
        if moment.creator_id != user_id {
            return Err(StoreError::Forbidden("only the creator can delete a moment"));
        }
        db.delete_moment(&id.to_string())
    })
    .await?;

    Ok(Json(serde_json::json!({ "success": true })))
}

fn to_response(row: MomentRow) -> MomentResponse {
    let status = MomentStatus::parse(&row.status).unwrap_or_else(|| {
        warn!("Corrupt status '{}' on moment '{}'", row.status, row.id);
        MomentStatus::Hidden
    });

    MomentResponse {
        id: uuid_or_nil(&row.id),
        creator_id: uuid_or_nil(&row.creator_id),
        title: row.title,
        lat: row.lat,
        lng: row.lng,
        city_code: row.city_code,
        starts_at: parse_ts(&row.starts_at),
        ends_at: parse_ts(&row.ends_at),
        max_participants: row.max_participants as u32,
        status,
        created_at: parse_ts(&row.created_at),
    }
}

fn to_nearby_response(hit: NearbyMoment) -> NearbyMomentResponse {
    NearbyMomentResponse {
        id: uuid_or_nil(&hit.id),
        title: hit.title,
        lat: hit.lat,
        lng: hit.lng,
        starts_at: parse_ts(&hit.starts_at),
        ends_at: parse_ts(&hit.ends_at),
        max_participants: hit.max_participants as u32,
        participant_count: hit.participant_count as u32,
        distance_meters: hit.distance_meters,
    }
}
