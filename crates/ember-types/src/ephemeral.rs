//! Display-layer expiry for ephemeral image messages.
//!
//! An image message is a normal chat row whose content is the `[img]`
//! sentinel followed by the stored photo reference. Expiry is a pure
//! function of `created_at` evaluated at render time; it says nothing about
//! whether the backing photo has actually been purged yet (that is the
//! sweeper's job, on its own schedule).

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

pub const IMAGE_PREFIX: &str = "[img]";

/// Ephemeral images stop rendering this long after creation.
pub const IMAGE_TTL_MINUTES: i64 = 5;

/// The stored photo reference, if this content is an image message.
pub fn image_ref(content: &str) -> Option<&str> {
    content.strip_prefix(IMAGE_PREFIX)
}

/// Encode a photo reference as message content.
pub fn image_content(photo_url: &str) -> String {
    format!("{IMAGE_PREFIX}{photo_url}")
}

/// Whole minutes until the image expires. Reaches 0 exactly at
/// `created_at + 5min`; strictly before that the image is still live, so a
/// partial remaining minute rounds up.
pub fn time_left_minutes(created_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let remaining = (created_at + Duration::minutes(IMAGE_TTL_MINUTES) - now).num_seconds();
    if remaining <= 0 { 0 } else { (remaining + 59) / 60 }
}

pub fn is_expired(created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    time_left_minutes(created_at, now) == 0
}

/// What the client should render for an image message.
#[derive(Debug, Clone, Serialize)]
pub struct EphemeralImage {
    /// None once expired: render the expiration placeholder instead.
    pub url: Option<String>,
    pub time_left_minutes: i64,
    pub expired: bool,
}

impl EphemeralImage {
    /// Derive the display state for a message, or None for plain text.
    pub fn from_content(
        content: &str,
        created_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Option<Self> {
        let url = image_ref(content)?;
        let time_left = time_left_minutes(created_at, now);
        let expired = time_left == 0;
        Some(EphemeralImage {
            url: (!expired).then(|| url.to_string()),
            time_left_minutes: time_left,
            expired,
        })
    }
}
