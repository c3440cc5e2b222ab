use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use uuid::Uuid;

use ember_types::api::MomentStatus;

use crate::error::{StoreError, StoreResult};
use crate::geo::{self, BoundingBox};
use crate::models::{MomentRow, NearbyMoment};
use crate::{Database, OptionalExt, fmt_ts};

pub struct NewMoment<'a> {
    pub creator_id: &'a str,
    pub title: &'a str,
    pub lat: f64,
    pub lng: f64,
    pub city_code: Option<&'a str>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub max_participants: u32,
}

impl Database {
    /// Insert a moment and its creator's participation in one transaction.
    pub fn create_moment(&self, new: &NewMoment<'_>, now: DateTime<Utc>) -> StoreResult<MomentRow> {
        if new.ends_at <= new.starts_at {
            return Err(StoreError::Validation(
                "ends_at must be after starts_at".into(),
            ));
        }
        if new.max_participants < 1 {
            return Err(StoreError::Validation(
                "max_participants must be at least 1".into(),
            ));
        }

        let id = Uuid::new_v4().to_string();
        let participation_id = Uuid::new_v4().to_string();
        let created_at = fmt_ts(now);

        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                "INSERT INTO moments
                     (id, creator_id, title, lat, lng, city_code,
                      starts_at, ends_at, max_participants, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 'active', ?10)",
                params![
                    id,
                    new.creator_id,
                    new.title,
                    new.lat,
                    new.lng,
                    new.city_code.unwrap_or("UNKNOWN"),
                    fmt_ts(new.starts_at),
                    fmt_ts(new.ends_at),
                    new.max_participants,
                    created_at,
                ],
            )?;
            // The creator is always the first participant.
            tx.execute(
                "INSERT INTO moment_participants (id, moment_id, user_id, joined_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![participation_id, id, new.creator_id, created_at],
            )?;
            tx.commit()?;

            query_moment(conn, &id)?.ok_or(StoreError::NotFound("moment"))
        })
    }

    pub fn get_moment(&self, id: &str) -> StoreResult<MomentRow> {
        self.with_conn(|conn| query_moment(conn, id))?
            .ok_or(StoreError::NotFound("moment"))
    }

    pub fn find_moment(&self, id: &str) -> StoreResult<Option<MomentRow>> {
        self.with_conn(|conn| query_moment(conn, id))
    }

    /// Active moments inside the bounding box, re-ranked by exact distance.
    pub fn nearby_moments(
        &self,
        lat: f64,
        lng: f64,
        radius_meters: f64,
        limit: usize,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<NearbyMoment>> {
        self.discover(lat, lng, radius_meters, limit, None, now)
    }

    /// Same box-and-rank procedure, filtered by case-insensitive substring
    /// match on title.
    pub fn search_moments(
        &self,
        query: &str,
        lat: f64,
        lng: f64,
        radius_meters: f64,
        limit: usize,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<NearbyMoment>> {
        self.discover(lat, lng, radius_meters, limit, Some(query), now)
    }

    fn discover(
        &self,
        lat: f64,
        lng: f64,
        radius_meters: f64,
        limit: usize,
        title_query: Option<&str>,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<NearbyMoment>> {
        let bbox = BoundingBox::around(lat, lng, radius_meters);
        let now_s = fmt_ts(now);

        let mut hits = self.with_conn(|conn| {
            let mut sql = String::from(
                "SELECT m.id, m.title, m.lat, m.lng, m.starts_at, m.ends_at,
                        m.max_participants,
                        (SELECT COUNT(*) FROM moment_participants p
                          WHERE p.moment_id = m.id)
                 FROM moments m
                 WHERE m.status = 'active' AND m.ends_at > ?1
                   AND m.lat BETWEEN ?2 AND ?3
                   AND m.lng BETWEEN ?4 AND ?5",
            );
            if title_query.is_some() {
                sql.push_str(" AND lower(m.title) LIKE ?6");
            }

            let mut stmt = conn.prepare(&sql)?;
            let rows = match title_query {
                Some(q) => {
                    let like = format!("%{}%", q.to_lowercase());
                    stmt.query_map(
                        params![now_s, bbox.min_lat, bbox.max_lat, bbox.min_lng, bbox.max_lng, like],
                        map_nearby,
                    )?
                    .collect::<Result<Vec<_>, _>>()?
                }
                None => stmt
                    .query_map(
                        params![now_s, bbox.min_lat, bbox.max_lat, bbox.min_lng, bbox.max_lng],
                        map_nearby,
                    )?
                    .collect::<Result<Vec<_>, _>>()?,
            };
            Ok(rows)
        })?;

        // The box over-approximates: drop candidates beyond the true radius,
        // then rank ascending by exact distance.
        for hit in &mut hits {
            hit.distance_meters = geo::haversine_meters(lat, lng, hit.lat, hit.lng);
        }
        hits.retain(|hit| hit.distance_meters <= radius_meters);
        hits.sort_by(|a, b| a.distance_meters.total_cmp(&b.distance_meters));
        hits.truncate(limit);
        Ok(hits)
    }

    pub fn set_moment_status(&self, id: &str, status: MomentStatus) -> StoreResult<()> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE moments SET status = ?1 WHERE id = ?2",
                params![status.as_str(), id],
            )?;
            if n == 0 {
                return Err(StoreError::NotFound("moment"));
            }
            Ok(())
        })
    }

    /// Remove a moment. Participants, messages, photos and SOS alerts go via
    /// FK cascade; flags are polymorphic and deleted explicitly, including
    /// those against the moment's messages.
    pub fn delete_moment(&self, id: &str) -> StoreResult<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                "DELETE FROM flags
                  WHERE target_type = 'message'
                    AND target_id IN
                        (SELECT id FROM moment_messages WHERE moment_id = ?1)",
                [id],
            )?;
            tx.execute(
                "DELETE FROM flags WHERE target_type = 'moment' AND target_id = ?1",
                [id],
            )?;
            let n = tx.execute("DELETE FROM moments WHERE id = ?1", [id])?;
            tx.commit()?;
            if n == 0 {
                return Err(StoreError::NotFound("moment"));
            }
            Ok(())
        })
    }

    /// Transition every past-due active moment to expired. Conditional
    /// update, so overlapping sweep runs are no-ops.
    pub fn expire_past_moments(&self, now: DateTime<Utc>) -> StoreResult<usize> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE moments SET status = 'expired'
                  WHERE status = 'active' AND ends_at < ?1",
                [fmt_ts(now)],
            )?;
            Ok(n)
        })
    }
}

fn query_moment(conn: &Connection, id: &str) -> StoreResult<Option<MomentRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, creator_id, title, lat, lng, city_code, starts_at, ends_at,
                max_participants, status, created_at
         FROM moments WHERE id = ?1",
    )?;

    stmt.query_row([id], |row| {
        Ok(MomentRow {
            id: row.get(0)?,
            creator_id: row.get(1)?,
            title: row.get(2)?,
            lat: row.get(3)?,
            lng: row.get(4)?,
            city_code: row.get(5)?,
            starts_at: row.get(6)?,
            ends_at: row.get(7)?,
            max_participants: row.get(8)?,
            status: row.get(9)?,
            created_at: row.get(10)?,
        })
    })
    .optional()
}

fn map_nearby(row: &rusqlite::Row<'_>) -> rusqlite::Result<NearbyMoment> {
    Ok(NearbyMoment {
        id: row.get(0)?,
        title: row.get(1)?,
        lat: row.get(2)?,
        lng: row.get(3)?,
        starts_at: row.get(4)?,
        ends_at: row.get(5)?,
        max_participants: row.get(6)?,
        participant_count: row.get(7)?,
        distance_meters: 0.0,
    })
}
