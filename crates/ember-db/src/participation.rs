use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::models::{ParticipantWithProfile, ParticipationRow};
use crate::{Database, OptionalExt, fmt_ts};

/// Derived context for a moment's participant list.
pub struct MomentContext {
    pub participant_count: usize,
    pub badges: Vec<String>,
}

impl Database {
    /// Capacity-gated join. The whole check runs on the writer connection
    /// inside one transaction, and the insert itself is guarded by a count
    /// subquery, so two racing joins cannot overshoot `max_participants`.
    pub fn join_moment(
        &self,
        moment_id: &str,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<ParticipationRow> {
        let id = Uuid::new_v4().to_string();
        let joined_at = fmt_ts(now);
        let now_s = fmt_ts(now);

        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;

            let moment = tx
                .query_row(
                    "SELECT status, ends_at, max_participants FROM moments WHERE id = ?1",
                    [moment_id],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, i64>(2)?,
                        ))
                    },
                )
                .optional()?;
            let (status, ends_at, max_participants) =
                moment.ok_or(StoreError::NotFound("moment"))?;

            if status != "active" || ends_at <= now_s {
                return Err(StoreError::NotJoinable);
            }

            let already: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM moment_participants
                                WHERE moment_id = ?1 AND user_id = ?2)",
                params![moment_id, user_id],
                |row| row.get(0),
            )?;
            if already {
                return Err(StoreError::Conflict("already a participant"));
            }

            // Atomic conditional insert: zero rows means the count subquery
            // saw the moment at capacity.
            let inserted = tx.execute(
                "INSERT INTO moment_participants (id, moment_id, user_id, joined_at)
                 SELECT ?1, ?2, ?3, ?4
                  WHERE (SELECT COUNT(*) FROM moment_participants
                          WHERE moment_id = ?2) < ?5",
                params![id, moment_id, user_id, joined_at, max_participants],
            )?;
            if inserted == 0 {
                return Err(StoreError::Full);
            }

            tx.commit()?;
            Ok(ParticipationRow {
                id: id.clone(),
                moment_id: moment_id.to_string(),
                user_id: user_id.to_string(),
                joined_at: joined_at.clone(),
            })
        })
    }

    /// Idempotent: leaving a moment you never joined is not an error.
    pub fn leave_moment(&self, moment_id: &str, user_id: &str) -> StoreResult<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "DELETE FROM moment_participants WHERE moment_id = ?1 AND user_id = ?2",
                params![moment_id, user_id],
            )?;
            Ok(())
        })
    }

    pub fn is_participant(&self, moment_id: &str, user_id: &str) -> StoreResult<bool> {
        self.with_conn(|conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM moment_participants
                                WHERE moment_id = ?1 AND user_id = ?2)",
                params![moment_id, user_id],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
    }

    /// Participants joined with profile display data, join order ascending.
    pub fn list_participants(&self, moment_id: &str) -> StoreResult<Vec<ParticipantWithProfile>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT p.id, p.user_id, p.joined_at,
                        pr.display_name, pr.home_country, pr.languages,
                        pr.user_type, pr.profile_photo_url
                 FROM moment_participants p
                 LEFT JOIN profiles pr ON p.user_id = pr.id
                 WHERE p.moment_id = ?1
                 ORDER BY p.joined_at ASC, p.id ASC",
            )?;

            let rows = stmt
                .query_map([moment_id], |row| {
                    Ok(ParticipantWithProfile {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        joined_at: row.get(2)?,
                        display_name: row.get(3)?,
                        home_country: row.get(4)?,
                        languages: row.get(5)?,
                        user_type: row.get(6)?,
                        profile_photo_url: row.get(7)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Participant count plus derived badges, computed fresh on every call.
    pub fn moment_context(&self, moment_id: &str) -> StoreResult<MomentContext> {
        let participants = self.list_participants(moment_id)?;
        Ok(MomentContext {
            participant_count: participants.len(),
            badges: badges_for(&participants),
        })
    }
}

/// Composition badges shown on the moment screen. Only meaningful once at
/// least two people are in.
fn badges_for(participants: &[ParticipantWithProfile]) -> Vec<String> {
    if participants.len() < 2 {
        return Vec::new();
    }

    let mut badges = Vec::new();

    let countries: std::collections::HashSet<&str> = participants
        .iter()
        .filter_map(|p| p.home_country.as_deref())
        .collect();
    if countries.len() >= 2 {
        badges.push("International".to_string());
    }

    let everyone_speaks_english = participants.iter().all(|p| {
        p.languages
            .as_deref()
            .and_then(|raw| serde_json::from_str::<Vec<String>>(raw).ok())
            .is_some_and(|langs| langs.iter().any(|l| l == "en"))
    });
    if everyone_speaks_english {
        badges.push("English friendly".to_string());
    }

    let types: std::collections::HashSet<&str> = participants
        .iter()
        .filter_map(|p| p.user_type.as_deref())
        .collect();
    if types.len() >= 2 {
        badges.push("Locals & travelers".to_string());
    }

    badges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{seed_moment, seed_profile, seed_profile_with, test_db};

    #[test]
    fn join_then_duplicate_join_conflicts() {
        let (_dir, db) = test_db();
        let creator = seed_profile(&db, "a@example.com");
        let joiner = seed_profile(&db, "b@example.com");
        let moment = seed_moment(&db, &creator, "Picnic", 48.85, 2.35, 60, 4);

        db.join_moment(&moment, &joiner, Utc::now()).unwrap();
        let err = db.join_moment(&moment, &joiner, Utc::now()).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        // Still exactly one participation row for the joiner.
        let participants = db.list_participants(&moment).unwrap();
        assert_eq!(
            participants.iter().filter(|p| p.user_id == joiner).count(),
            1
        );
    }

    #[test]
    fn join_respects_capacity() {
        let (_dir, db) = test_db();
        let creator = seed_profile(&db, "a@example.com");
        // Capacity 2: creator plus one more.
        let moment = seed_moment(&db, &creator, "Tiny", 48.85, 2.35, 60, 2);

        let second = seed_profile(&db, "b@example.com");
        let third = seed_profile(&db, "c@example.com");

        db.join_moment(&moment, &second, Utc::now()).unwrap();
        let err = db.join_moment(&moment, &third, Utc::now()).unwrap_err();
        assert!(matches!(err, StoreError::Full));
        assert_eq!(db.list_participants(&moment).unwrap().len(), 2);
    }

    #[test]
    fn concurrent_joins_never_overshoot_capacity() {
        let (_dir, db) = test_db();
        let db = std::sync::Arc::new(db);
        let creator = seed_profile(&db, "creator@example.com");
        let moment = seed_moment(&db, &creator, "Crowded", 48.85, 2.35, 60, 5);

        let users: Vec<String> = (0..12)
            .map(|i| seed_profile(&db, &format!("u{i}@example.com")))
            .collect();

        let handles: Vec<_> = users
            .into_iter()
            .map(|user| {
                let db = db.clone();
                let moment = moment.clone();
                std::thread::spawn(move || db.join_moment(&moment, &user, Utc::now()))
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let joined = results.iter().filter(|r| r.is_ok()).count();
        let full = results
            .iter()
            .filter(|r| matches!(r, Err(StoreError::Full)))
            .count();

        // Creator holds one slot; exactly 4 of the 12 get in.
        assert_eq!(joined, 4);
        assert_eq!(full, 8);
        assert_eq!(db.list_participants(&moment).unwrap().len(), 5);
    }

    #[test]
    fn cannot_join_hidden_or_ended_moment() {
        let (_dir, db) = test_db();
        let creator = seed_profile(&db, "a@example.com");
        let joiner = seed_profile(&db, "b@example.com");

        let hidden = seed_moment(&db, &creator, "Hidden", 48.85, 2.35, 60, 4);
        db.set_moment_status(&hidden, ember_types::api::MomentStatus::Hidden)
            .unwrap();
        assert!(matches!(
            db.join_moment(&hidden, &joiner, Utc::now()),
            Err(StoreError::NotJoinable)
        ));

        let over = seed_moment(&db, &creator, "Over", 48.85, 2.35, -10, 4);
        assert!(matches!(
            db.join_moment(&over, &joiner, Utc::now()),
            Err(StoreError::NotJoinable)
        ));

        assert!(matches!(
            db.join_moment("missing", &joiner, Utc::now()),
            Err(StoreError::NotFound("moment"))
        ));
    }

    #[test]
    fn leave_is_idempotent() {
        let (_dir, db) = test_db();
        let creator = seed_profile(&db, "a@example.com");
        let joiner = seed_profile(&db, "b@example.com");
        let moment = seed_moment(&db, &creator, "Picnic", 48.85, 2.35, 60, 4);

        db.join_moment(&moment, &joiner, Utc::now()).unwrap();
        db.leave_moment(&moment, &joiner).unwrap();
        assert!(!db.is_participant(&moment, &joiner).unwrap());

        // Leaving again, or leaving without ever joining, is fine.
        db.leave_moment(&moment, &joiner).unwrap();
        db.leave_moment(&moment, "stranger").unwrap();

        // A freed slot can be re-joined.
        db.join_moment(&moment, &joiner, Utc::now()).unwrap();
    }

    #[test]
    fn participants_ordered_by_join_time() {
        let (_dir, db) = test_db();
        let creator = seed_profile(&db, "a@example.com");
        let moment = seed_moment(&db, &creator, "Picnic", 48.85, 2.35, 60, 8);

        let b = seed_profile(&db, "b@example.com");
        let c = seed_profile(&db, "c@example.com");
        db.join_moment(&moment, &b, Utc::now()).unwrap();
        db.join_moment(&moment, &c, Utc::now() + chrono::Duration::seconds(2))
            .unwrap();

        let order: Vec<String> = db
            .list_participants(&moment)
            .unwrap()
            .into_iter()
            .map(|p| p.user_id)
            .collect();
        assert_eq!(order, vec![creator, b, c]);
    }

    #[test]
    fn context_badges_reflect_composition() {
        let (_dir, db) = test_db();
        let creator = seed_profile_with(&db, "a@example.com", "FR", &["fr", "en"], "local");
        let moment = seed_moment(&db, &creator, "Meetup", 48.85, 2.35, 60, 8);

        // Alone: no badges yet.
        let ctx = db.moment_context(&moment).unwrap();
        assert_eq!(ctx.participant_count, 1);
        assert!(ctx.badges.is_empty());

        let visitor = seed_profile_with(&db, "b@example.com", "JP", &["ja", "en"], "traveler");
        db.join_moment(&moment, &visitor, Utc::now()).unwrap();

        let ctx = db.moment_context(&moment).unwrap();
        assert_eq!(ctx.participant_count, 2);
        assert!(ctx.badges.contains(&"International".to_string()));
        assert!(ctx.badges.contains(&"English friendly".to_string()));
        assert!(ctx.badges.contains(&"Locals & travelers".to_string()));
    }

    #[test]
    fn no_english_badge_when_someone_lacks_it() {
        let (_dir, db) = test_db();
        let creator = seed_profile_with(&db, "a@example.com", "FR", &["fr", "en"], "local");
        let moment = seed_moment(&db, &creator, "Meetup", 48.85, 2.35, 60, 8);
        let other = seed_profile_with(&db, "b@example.com", "FR", &["fr"], "local");
        db.join_moment(&moment, &other, Utc::now()).unwrap();

        let ctx = db.moment_context(&moment).unwrap();
        assert!(!ctx.badges.contains(&"English friendly".to_string()));
        assert!(!ctx.badges.contains(&"International".to_string()));
    }
}
