//! Scheduled lifecycle sweeps.
//!
//! Each loop runs on its own interval with no coordination with the others
//! or with request handlers. Every pass is a conditional delete/update or
//! tolerant of "already gone", so overlapping runs (or a sweep racing an
//! admin delete) are no-ops, not errors: at-least-once, retry-by-recurrence.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use tracing::{info, warn};

use ember_db::Database;
use ember_db::error::StoreResult;

use crate::store::{ObjectStore, StorageError};

/// Photos of ended moments are kept this long for stragglers.
const ENDED_MOMENT_PHOTO_GRACE_DAYS: i64 = 2;

/// Profile photos go stale after this much inactivity.
const PROFILE_PHOTO_STALE_DAYS: i64 = 60;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    pub deleted: usize,
    pub errors: usize,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct StaleSweepOutcome {
    pub moment_photos_deleted: usize,
    pub profile_photos_cleared: usize,
    pub errors: usize,
}

/// Transition past-due active moments to expired. This is the authoritative
/// way active moments stop being joinable; discovery filters on `ends_at`
/// defensively in the meantime.
pub async fn run_moment_expiry_loop(db: Arc<Database>, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    loop {
        interval.tick().await;
        match db.expire_past_moments(Utc::now()) {
            Ok(count) if count > 0 => info!("Expiry sweep: {} moments expired", count),
            Ok(_) => {}
            Err(e) => warn!("Expiry sweep error: {}", e),
        }
    }
}

pub async fn run_ephemeral_photo_loop<S: ObjectStore>(
    db: Arc<Database>,
    store: Arc<S>,
    interval_secs: u64,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    loop {
        interval.tick().await;
        match sweep_ephemeral_photos(&db, store.as_ref()).await {
            Ok(outcome) => {
                if outcome.deleted > 0 || outcome.errors > 0 {
                    info!(
                        "Ephemeral photo sweep: {} deleted, {} errors",
                        outcome.deleted, outcome.errors
                    );
                }
            }
            Err(e) => warn!("Ephemeral photo sweep error: {}", e),
        }
    }
}

pub async fn run_stale_content_loop<S: ObjectStore>(
    db: Arc<Database>,
    store: Arc<S>,
    interval_secs: u64,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    loop {
        interval.tick().await;
        match sweep_stale_content(&db, store.as_ref()).await {
            Ok(outcome) => {
                if outcome.moment_photos_deleted > 0
                    || outcome.profile_photos_cleared > 0
                    || outcome.errors > 0
                {
                    info!(
                        "Stale content sweep: {} moment photos, {} profile photos, {} errors",
                        outcome.moment_photos_deleted,
                        outcome.profile_photos_cleared,
                        outcome.errors
                    );
                }
            }
            Err(e) => warn!("Stale content sweep error: {}", e),
        }
    }
}

/// Delete non-preview photos older than their TTL or belonging to ended
/// moments: binary first, then the row. A store failure other than
/// "not found" leaves the row in place for the next pass.
pub async fn sweep_ephemeral_photos<S: ObjectStore>(
    db: &Database,
    store: &S,
) -> StoreResult<SweepOutcome> {
    let now = Utc::now();
    let mut outcome = SweepOutcome::default();

    for photo in db.expired_ephemeral_photos(now)? {
        match store.delete(&photo.photo_url).await {
            // Already gone is not an error.
            Ok(()) | Err(StorageError::NotFound) => {}
            Err(e) => {
                warn!("Failed to delete photo object {}: {}", photo.photo_url, e);
                outcome.errors += 1;
                continue;
            }
        }
        if db.delete_photo(&photo.id)? {
            outcome.deleted += 1;
        }
    }

    Ok(outcome)
}

/// Daily pass: photos of long-ended moments, and profile photos of users
/// who are both photo-stale and moment-inactive (both conditions required).
pub async fn sweep_stale_content<S: ObjectStore>(
    db: &Database,
    store: &S,
) -> StoreResult<StaleSweepOutcome> {
    let now = Utc::now();
    let mut outcome = StaleSweepOutcome::default();

    let photo_cutoff = now - ChronoDuration::days(ENDED_MOMENT_PHOTO_GRACE_DAYS);
    for photo in db.photos_of_moments_ended_before(photo_cutoff)? {
        match store.delete(&photo.photo_url).await {
            Ok(()) | Err(StorageError::NotFound) => {}
            Err(e) => {
                warn!("Failed to delete photo object {}: {}", photo.photo_url, e);
                outcome.errors += 1;
                continue;
            }
        }
        if db.delete_photo(&photo.id)? {
            outcome.moment_photos_deleted += 1;
        }
    }

    let stale_cutoff = now - ChronoDuration::days(PROFILE_PHOTO_STALE_DAYS);
    for (profile_id, photo_url) in db.stale_profile_photos(stale_cutoff)? {
        match store.delete(&photo_url).await {
            Ok(()) | Err(StorageError::NotFound) => {}
            Err(e) => {
                warn!(
                    "Failed to delete profile photo for {}: {}",
                    profile_id, e
                );
                outcome.errors += 1;
                continue;
            }
        }
        if db.clear_profile_photo(&profile_id)? {
            outcome.profile_photos_cleared += 1;
        }
    }

    Ok(outcome)
}
