//! Database row and projection types — these map directly to SQLite rows.
//! Distinct from the ember-types API models to keep the DB layer
//! independent; timestamps stay as stored TEXT and are parsed at the API
//! boundary.

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub password: String,
    pub created_at: String,
}

#[derive(Debug)]
pub struct ProfileRow {
    pub id: String,
    pub display_name: String,
    pub home_country: String,
    /// JSON array of language codes, 1–3 entries.
    pub languages: String,
    pub user_type: String,
    pub profile_photo_url: Option<String>,
    pub profile_photo_uploaded_at: Option<String>,
    pub created_at: String,
}

#[derive(Debug)]
pub struct MomentRow {
    pub id: String,
    pub creator_id: String,
    pub title: String,
    pub lat: f64,
    pub lng: f64,
    pub city_code: String,
    pub starts_at: String,
    pub ends_at: String,
    pub max_participants: i64,
    pub status: String,
    pub created_at: String,
}

/// Discovery projection: bbox candidate annotated with its live participant
/// count and exact distance from the query point.
pub struct NearbyMoment {
    pub id: String,
    pub title: String,
    pub lat: f64,
    pub lng: f64,
    pub starts_at: String,
    pub ends_at: String,
    pub max_participants: i64,
    pub participant_count: i64,
    pub distance_meters: f64,
}

#[derive(Debug)]
pub struct ParticipationRow {
    pub id: String,
    pub moment_id: String,
    pub user_id: String,
    pub joined_at: String,
}

/// Participant joined with profile display data.
pub struct ParticipantWithProfile {
    pub id: String,
    pub user_id: String,
    pub joined_at: String,
    pub display_name: Option<String>,
    pub home_country: Option<String>,
    pub languages: Option<String>,
    pub user_type: Option<String>,
    pub profile_photo_url: Option<String>,
}

pub struct MessageRow {
    pub id: String,
    pub moment_id: String,
    pub user_id: String,
    pub content: String,
    pub created_at: String,
}

/// Message joined with author display data.
pub struct MessageWithAuthor {
    pub id: String,
    pub user_id: String,
    pub content: String,
    pub created_at: String,
    pub display_name: Option<String>,
    pub profile_photo_url: Option<String>,
}

pub struct PhotoRow {
    pub id: String,
    pub moment_id: String,
    pub uploader_id: String,
    pub photo_url: String,
    pub caption: Option<String>,
    pub is_preview: bool,
    pub uploaded_at: String,
}

pub struct SosAlertRow {
    pub id: String,
    pub user_id: String,
    pub moment_id: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub created_at: String,
}

/// Unresolved alert joined with its moment title for dispatch display.
pub struct ActiveSosAlert {
    pub id: String,
    pub moment_id: String,
    pub moment_title: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub created_at: String,
}

pub struct FlagRow {
    pub id: String,
    pub reporter_id: String,
    pub target_type: String,
    pub target_id: String,
    pub reason: String,
    pub created_at: String,
}

/// Flags collapsed by target for moderation review.
pub struct FlagGroup {
    pub target_type: String,
    pub target_id: String,
    pub flag_count: usize,
    pub reasons: Vec<String>,
}
