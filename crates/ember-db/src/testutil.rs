//! Shared fixtures for the query-module tests.

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::Database;
use crate::moments::NewMoment;
use crate::profiles::NewProfile;

pub fn test_db() -> (tempfile::TempDir, Database) {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = Database::open(&dir.path().join("test.db")).expect("open db");
    (dir, db)
}

/// User + profile in one call; display name is the email's local part.
pub fn seed_profile(db: &Database, email: &str) -> String {
    seed_profile_with(db, email, "FR", &["en"], "local")
}

pub fn seed_profile_with(
    db: &Database,
    email: &str,
    home_country: &str,
    languages: &[&str],
    user_type: &str,
) -> String {
    let id = Uuid::new_v4().to_string();
    db.create_user(&id, email, "argon2-hash").expect("create user");

    let display_name = email.split('@').next().unwrap_or(email);
    let languages: Vec<String> = languages.iter().map(|s| s.to_string()).collect();
    db.create_profile(
        &id,
        &NewProfile {
            display_name,
            home_country,
            languages: &languages,
            user_type,
            profile_photo_url: None,
        },
        Utc::now(),
    )
    .expect("create profile");

    id
}

/// A moment ending `ends_in_minutes` from now (negative = already over).
/// Created a few seconds in the past so later joins sort strictly after the
/// creator at second resolution.
pub fn seed_moment(
    db: &Database,
    creator_id: &str,
    title: &str,
    lat: f64,
    lng: f64,
    ends_in_minutes: i64,
    max_participants: u32,
) -> String {
    let created = Utc::now() - Duration::seconds(5);
    let ends_at = Utc::now() + Duration::minutes(ends_in_minutes);
    let starts_at = ends_at - Duration::hours(2);

    db.create_moment(
        &NewMoment {
            creator_id,
            title,
            lat,
            lng,
            city_code: None,
            starts_at,
            ends_at,
            max_participants,
        },
        created,
    )
    .expect("create moment")
    .id
}

/// Shift a coordinate roughly `meters` north; longitude untouched.
pub fn meters_north(lat: f64, lng: f64, meters: f64) -> (f64, f64) {
    (lat + meters / 111_195.0, lng)
}
