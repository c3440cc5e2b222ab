use chrono::{DateTime, Duration, Utc};
use rusqlite::params;
use uuid::Uuid;

use crate::error::StoreResult;
use crate::models::PhotoRow;
use crate::{Database, fmt_ts};

/// Non-preview chat photos live this long before the sweeper takes them.
pub const EPHEMERAL_PHOTO_TTL_MINUTES: i64 = 5;

impl Database {
    pub fn add_photo(
        &self,
        moment_id: &str,
        uploader_id: &str,
        photo_url: &str,
        caption: Option<&str>,
        is_preview: bool,
        now: DateTime<Utc>,
    ) -> StoreResult<PhotoRow> {
        let id = Uuid::new_v4().to_string();
        let uploaded_at = fmt_ts(now);

        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO moment_photos
                     (id, moment_id, uploader_id, photo_url, caption, is_preview, uploaded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![id, moment_id, uploader_id, photo_url, caption, is_preview, uploaded_at],
            )?;
            Ok(PhotoRow {
                id: id.clone(),
                moment_id: moment_id.to_string(),
                uploader_id: uploader_id.to_string(),
                photo_url: photo_url.to_string(),
                caption: caption.map(str::to_string),
                is_preview,
                uploaded_at: uploaded_at.clone(),
            })
        })
    }

    pub fn moment_photos(&self, moment_id: &str, is_preview: bool) -> StoreResult<Vec<PhotoRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, moment_id, uploader_id, photo_url, caption, is_preview, uploaded_at
                 FROM moment_photos
                 WHERE moment_id = ?1 AND is_preview = ?2
                 ORDER BY uploaded_at ASC",
            )?;
            let rows = stmt
                .query_map(params![moment_id, is_preview], map_photo)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Sweep candidates: non-preview photos past their TTL, or belonging to
    /// a moment that already ended.
    pub fn expired_ephemeral_photos(&self, now: DateTime<Utc>) -> StoreResult<Vec<PhotoRow>> {
        let cutoff = fmt_ts(now - Duration::minutes(EPHEMERAL_PHOTO_TTL_MINUTES));
        let now_s = fmt_ts(now);

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT p.id, p.moment_id, p.uploader_id, p.photo_url, p.caption,
                        p.is_preview, p.uploaded_at
                 FROM moment_photos p
                 JOIN moments m ON m.id = p.moment_id
                 WHERE p.is_preview = 0
                   AND (p.uploaded_at < ?1 OR m.ends_at < ?2)",
            )?;
            let rows = stmt
                .query_map(params![cutoff, now_s], map_photo)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// All photos (preview included) of moments that ended before `cutoff`.
    pub fn photos_of_moments_ended_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> StoreResult<Vec<PhotoRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT p.id, p.moment_id, p.uploader_id, p.photo_url, p.caption,
                        p.is_preview, p.uploaded_at
                 FROM moment_photos p
                 JOIN moments m ON m.id = p.moment_id
                 WHERE m.ends_at < ?1",
            )?;
            let rows = stmt
                .query_map([fmt_ts(cutoff)], map_photo)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Conditional delete; false when the row was already gone.
    pub fn delete_photo(&self, id: &str) -> StoreResult<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("DELETE FROM moment_photos WHERE id = ?1", [id])?;
            Ok(n > 0)
        })
    }
}

fn map_photo(row: &rusqlite::Row<'_>) -> rusqlite::Result<PhotoRow> {
    Ok(PhotoRow {
        id: row.get(0)?,
        moment_id: row.get(1)?,
        uploader_id: row.get(2)?,
        photo_url: row.get(3)?,
        caption: row.get(4)?,
        is_preview: row.get(5)?,
        uploaded_at: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{seed_moment, seed_profile, test_db};

    #[test]
    fn preview_and_ephemeral_listings_are_separate() {
        let (_dir, db) = test_db();
        let creator = seed_profile(&db, "a@example.com");
        let moment = seed_moment(&db, &creator, "Gallery", 48.85, 2.35, 60, 4);
        let now = Utc::now();

        db.add_photo(&moment, &creator, "p/preview.jpg", Some("cover"), true, now)
            .unwrap();
        db.add_photo(&moment, &creator, "p/chat.jpg", None, false, now)
            .unwrap();

        let previews = db.moment_photos(&moment, true).unwrap();
        assert_eq!(previews.len(), 1);
        assert_eq!(previews[0].caption.as_deref(), Some("cover"));
        assert_eq!(db.moment_photos(&moment, false).unwrap().len(), 1);
    }

    #[test]
    fn ephemeral_sweep_selects_aged_and_ended() {
        let (_dir, db) = test_db();
        let creator = seed_profile(&db, "a@example.com");
        let live = seed_moment(&db, &creator, "Live", 48.85, 2.35, 60, 4);
        let over = seed_moment(&db, &creator, "Over", 48.85, 2.35, -10, 4);
        let now = Utc::now();

        // Aged out in a live moment.
        let old = db
            .add_photo(&live, &creator, "p/old.jpg", None, false, now - Duration::minutes(6))
            .unwrap();
        // Fresh in a live moment: stays.
        db.add_photo(&live, &creator, "p/fresh.jpg", None, false, now)
            .unwrap();
        // Fresh but the moment ended: goes.
        let ended = db
            .add_photo(&over, &creator, "p/ended.jpg", None, false, now)
            .unwrap();
        // Preview photos are never ephemeral candidates.
        db.add_photo(&live, &creator, "p/cover.jpg", None, true, now - Duration::minutes(30))
            .unwrap();

        let mut ids: Vec<String> = db
            .expired_ephemeral_photos(now)
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        ids.sort();
        let mut expected = vec![old.id, ended.id];
        expected.sort();
        assert_eq!(ids, expected);
    }

    #[test]
    fn stale_sweep_selects_all_photos_of_old_moments() {
        let (_dir, db) = test_db();
        let creator = seed_profile(&db, "a@example.com");
        let old_moment = seed_moment(&db, &creator, "Old", 48.85, 2.35, -3 * 24 * 60, 4);
        let recent = seed_moment(&db, &creator, "Recent", 48.85, 2.35, -60, 4);
        let now = Utc::now();

        db.add_photo(&old_moment, &creator, "p/a.jpg", None, true, now)
            .unwrap();
        db.add_photo(&old_moment, &creator, "p/b.jpg", None, false, now)
            .unwrap();
        db.add_photo(&recent, &creator, "p/c.jpg", None, true, now)
            .unwrap();

        let hits = db
            .photos_of_moments_ended_before(now - Duration::days(2))
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|p| p.moment_id == old_moment));
    }
}
