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

use ember_db::parse_ts;
use ember_types::api::{Claims, MessageResponse, SendMessageRequest, SendMessageResponse};
use ember_types::ephemeral::EphemeralImage;

use crate::error::ApiError;
use crate::participation::ensure_participant;
use crate::{AppState, blocking, uuid_or_nil};

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    100
}

/// Chat is participant-only, for reads as much as writes.
pub async fn list_messages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<MessageQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_participant(&state, id, claims.sub).await?;

    let db = state.db.clone();
    let limit = query.limit.min(500);
    let rows = blocking(move || db.list_messages(&id.to_string(), limit)).await?;

    let now = Utc::now();
    let body: Vec<MessageResponse> = rows
        .into_iter()
        .map(|row| {
            let created_at = parse_ts(&row.created_at);
            // Display-layer expiry: derived from created_at on every
            // render, regardless of whether the photo row still exists.
            let image = EphemeralImage::from_content(&row.content, created_at, now);
            MessageResponse {
                id: uuid_or_nil(&row.id),
                user_id: uuid_or_nil(&row.user_id),
                display_name: row.display_name,
                profile_photo_url: row.profile_photo_url,
                content: row.content,
                created_at,
                image,
            }
        })
        .collect();

    Ok(Json(body))
}

pub async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_participant(&state, id, claims.sub).await?;

    let db = state.db.clone();
    let user_id = claims.sub.to_string();
    let content = req.content.clone();
    let row =
        blocking(move || db.send_message(&id.to_string(), &user_id, &content, Utc::now())).await?;

    // Best-effort moderation gate: failure to run it never unwinds the
    // send, it just leaves the message standing until someone reports it.
    let db = state.db.clone();
    let message_id = row.id.clone();
    let acting_user = claims.sub.to_string();
    let moderated = tokio::task::spawn_blocking(move || {
        ember_moderation::moderate_message(&db, &message_id, &acting_user, &req.content, Utc::now())
    })
    .await;

    let (flagged, reason) = match moderated {
        Ok(Ok(outcome)) => match outcome.flagged_reason() {
            Some(reason) => (true, Some(reason.to_string())),
            None => (false, None),
        },
        Ok(Err(e)) => {
            warn!("Moderation skipped for message {}: {}", row.id, e);
            (false, None)
        }
        Err(e) => {
            warn!("Moderation task failed for message {}: {}", row.id, e);
            (false, None)
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(SendMessageResponse {
            id: uuid_or_nil(&row.id),
            flagged,
            reason,
        }),
    ))
}
