//! Privileged remediation surface. Every handler re-checks the caller's
//! role against user_roles; the JWT alone is not enough.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use ember_db::error::StoreError;
use ember_db::flags::group_flags;
use ember_types::api::{Claims, FlagGroupResponse, FlagTarget, TargetRequest};

use crate::error::ApiError;
use crate::{AppState, blocking, uuid_or_nil};

const CONTENT_DELETED: &str = "[Content deleted]";
const MODERATION_ROLES: &[&str] = &["admin", "moderator"];

async fn ensure_admin(state: &AppState, user_id: Uuid) -> Result<(), ApiError> {
    let db = state.db.clone();
    let allowed =
        blocking(move || db.has_any_role(&user_id.to_string(), MODERATION_ROLES)).await?;
    if !allowed {
        return Err(StoreError::Forbidden("moderator role required").into());
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct FlagListQuery {
    #[serde(default)]
    pub target_type: Option<FlagTarget>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Flags grouped by target, most-reported first, each annotated with a
/// best-effort fetch of what the target currently says.
pub async fn list_flagged(
    State(state): State<AppState>,
    Query(query): Query<FlagListQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_admin(&state, claims.sub).await?;

    let db = state.db.clone();
    let groups = blocking(move || {
        let flags = db.list_flags(query.target_type, query.reason.as_deref())?;
        let groups = group_flags(flags);

        let mut body = Vec::with_capacity(groups.len());
        for group in groups {
            let target = FlagTarget::parse(&group.target_type);
            let content = match target {
                Some(t) => db.target_content(t, &group.target_id)?,
                None => None,
            };
            body.push(FlagGroupResponse {
                target_type: target.unwrap_or(FlagTarget::Moment),
                target_id: uuid_or_nil(&group.target_id),
                flag_count: group.flag_count as u32,
                reasons: group.reasons,
                content: content.unwrap_or_else(|| CONTENT_DELETED.to_string()),
            });
        }
        Ok(body)
    })
    .await?;

    Ok(Json(groups))
}

/// Hide is only meaningful for moments; messages can only be deleted.
pub async fn hide_target(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<TargetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_admin(&state, claims.sub).await?;

    if req.target_type == FlagTarget::Message {
        return Err(StoreError::Validation(
            "messages cannot be hidden, only deleted".into(),
        )
        .into());
    }

    let db = state.db.clone();
    blocking(move || {
        db.set_moment_status(&req.target_id.to_string(), ember_types::api::MomentStatus::Hidden)
    })
    .await?;

    Ok(Json(serde_json::json!({ "success": true })))
}

/// Delete the content, then every flag pointing at it. Retryable: a target
/// that is already gone still clears its flags.
pub async fn delete_target(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<TargetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_admin(&state, claims.sub).await?;

    let db = state.db.clone();
    blocking(move || {
        let target_id = req.target_id.to_string();
        let result = match req.target_type {
            FlagTarget::Moment => db.delete_moment(&target_id),
            FlagTarget::Message => db.delete_message(&target_id).map(|_| ()),
        };
        match result {
            Ok(()) | Err(StoreError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }
        db.delete_flags_for_target(req.target_type, &target_id)?;
        Ok(())
    })
    .await?;

    Ok(Json(serde_json::json!({ "success": true })))
}

/// Clear the flags without touching the content.
pub async fn dismiss_target(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<TargetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_admin(&state, claims.sub).await?;

    let db = state.db.clone();
    let dismissed =
        blocking(move || db.delete_flags_for_target(req.target_type, &req.target_id.to_string()))
            .await?;

    Ok(Json(serde_json::json!({ "success": true, "dismissed": dismissed })))
}

/// Resolve the owning user from the target's content and erase them:
/// moments, messages, then the profile. No soft-ban state exists.
pub async fn ban_target(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<TargetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_admin(&state, claims.sub).await?;

    let db = state.db.clone();
    blocking(move || {
        let target_id = req.target_id.to_string();
        let owner = db
            .target_owner(req.target_type, &target_id)?
            .ok_or(StoreError::Gone("cannot ban user: content already deleted"))?;
        db.ban_user(&owner)
    })
    .await?;

    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn resolve_sos(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_admin(&state, claims.sub).await?;

    let db = state.db.clone();
    let resolver = claims.sub.to_string();
    blocking(move || db.resolve_sos_alert(&id.to_string(), &resolver, Utc::now())).await?;

    Ok(Json(serde_json::json!({ "success": true })))
}
