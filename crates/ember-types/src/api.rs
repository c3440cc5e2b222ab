use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ephemeral::EphemeralImage;

// -- JWT Claims --

/// JWT claims shared between the REST middleware and the auth handlers.
/// Canonical definition lives here in ember-types to eliminate duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: usize,
}

// -- Enums --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MomentStatus {
    Active,
    Hidden,
    Expired,
}

impl MomentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MomentStatus::Active => "active",
            MomentStatus::Hidden => "hidden",
            MomentStatus::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(MomentStatus::Active),
            "hidden" => Some(MomentStatus::Hidden),
            "expired" => Some(MomentStatus::Expired),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagTarget {
    Moment,
    Message,
}

impl FlagTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlagTarget::Moment => "moment",
            FlagTarget::Message => "message",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "moment" => Some(FlagTarget::Moment),
            "message" => Some(FlagTarget::Message),
            _ => None,
        }
    }
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub token: String,
    /// True until the user has created a profile; clients route to setup.
    pub needs_profile: bool,
}

// -- Profiles --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileRequest {
    pub display_name: String,
    pub home_country: String,
    pub languages: Vec<String>,
    pub user_type: String,
    #[serde(default)]
    pub profile_photo_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub display_name: String,
    pub home_country: String,
    pub languages: Vec<String>,
    pub user_type: String,
    pub profile_photo_url: Option<String>,
    pub profile_photo_uploaded_at: Option<DateTime<Utc>>,
}

// -- Moments --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateMomentRequest {
    pub title: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub city_code: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub max_participants: u32,
}

#[derive(Debug, Serialize)]
pub struct MomentResponse {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub title: String,
    pub lat: f64,
    pub lng: f64,
    pub city_code: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub max_participants: u32,
    pub status: MomentStatus,
    pub created_at: DateTime<Utc>,
}

/// Discovery listing entry: moment fields plus the live participant count
/// and the exact great-circle distance from the query point.
#[derive(Debug, Serialize)]
pub struct NearbyMomentResponse {
    pub id: Uuid,
    pub title: String,
    pub lat: f64,
    pub lng: f64,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub max_participants: u32,
    pub participant_count: u32,
    pub distance_meters: f64,
}

#[derive(Debug, Serialize)]
pub struct MomentContextResponse {
    pub participant_count: u32,
    pub badges: Vec<String>,
}

// -- Participation --

#[derive(Debug, Serialize)]
pub struct ParticipantResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub joined_at: DateTime<Utc>,
    pub display_name: Option<String>,
    pub user_type: Option<String>,
    pub profile_photo_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ParticipationResponse {
    pub is_participant: bool,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub content: String,
}

/// Send acknowledgement. `flagged` means moderation removed the message
/// right after it was persisted; the content never reaches other
/// participants.
#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub id: Uuid,
    pub flagged: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub display_name: Option<String>,
    pub profile_photo_url: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Present when the content is an ephemeral image message.
    pub image: Option<EphemeralImage>,
}

// -- Photos --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddPhotoRequest {
    pub photo_url: String,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub is_preview: bool,
}

#[derive(Debug, Serialize)]
pub struct PhotoResponse {
    pub id: Uuid,
    pub moment_id: Uuid,
    pub uploader_id: Uuid,
    pub photo_url: String,
    pub caption: Option<String>,
    pub is_preview: bool,
    pub uploaded_at: DateTime<Utc>,
}

// -- SOS alerts --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateSosRequest {
    pub moment_id: Uuid,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct SosAlertResponse {
    pub id: Uuid,
    pub moment_id: Uuid,
    pub moment_title: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub created_at: DateTime<Utc>,
}

// -- Flags --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateFlagRequest {
    pub target_type: FlagTarget,
    pub target_id: Uuid,
    pub reason: String,
}

/// One review group on the admin surface: all flags against the same
/// target, with a best-effort fetch of what the target currently says.
#[derive(Debug, Serialize)]
pub struct FlagGroupResponse {
    pub target_type: FlagTarget,
    pub target_id: Uuid,
    pub flag_count: u32,
    pub reasons: Vec<String>,
    /// "[Content deleted]" when the target no longer exists.
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetRequest {
    pub target_type: FlagTarget,
    pub target_id: Uuid,
}
