use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use ember_types::api::FlagTarget;

use crate::error::{StoreError, StoreResult};
use crate::models::{FlagGroup, FlagRow};
use crate::{Database, OptionalExt, fmt_ts};

impl Database {
    /// Report a target. INSERT OR IGNORE against the
    /// (reporter, target_type, target_id) uniqueness key: a duplicate —
    /// including two simultaneous reports racing — is a silent no-op, never
    /// an error surfaced to the reporter. Returns whether a row was
    /// actually inserted.
    pub fn create_flag(
        &self,
        reporter_id: &str,
        target: FlagTarget,
        target_id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let id = Uuid::new_v4().to_string();
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "INSERT OR IGNORE INTO flags
                     (id, reporter_id, target_type, target_id, reason, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![id, reporter_id, target.as_str(), target_id, reason, fmt_ts(now)],
            )?;
            Ok(n > 0)
        })
    }

    pub fn list_flags(
        &self,
        filter_type: Option<FlagTarget>,
        filter_reason: Option<&str>,
    ) -> StoreResult<Vec<FlagRow>> {
        self.with_conn(|conn| {
            let mut sql = String::from(
                "SELECT id, reporter_id, target_type, target_id, reason, created_at
                 FROM flags WHERE 1=1",
            );
            let mut params: Vec<&dyn rusqlite::types::ToSql> = Vec::new();
            let type_s;
            if let Some(t) = filter_type {
                type_s = t.as_str();
                sql.push_str(" AND target_type = ?");
                params.push(&type_s);
            }
            if let Some(reason) = &filter_reason {
                sql.push_str(" AND reason = ?");
                params.push(reason);
            }
            sql.push_str(" ORDER BY created_at DESC");

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params.as_slice(), |row| {
                    Ok(FlagRow {
                        id: row.get(0)?,
                        reporter_id: row.get(1)?,
                        target_type: row.get(2)?,
                        target_id: row.get(3)?,
                        reason: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Best-effort fetch of what a flagged target currently says: the
    /// moment's title or the message's text. None once deleted.
    pub fn target_content(&self, target: FlagTarget, target_id: &str) -> StoreResult<Option<String>> {
        let sql = match target {
            FlagTarget::Moment => "SELECT title FROM moments WHERE id = ?1",
            FlagTarget::Message => "SELECT content FROM moment_messages WHERE id = ?1",
        };
        self.with_conn(|conn| conn.query_row(sql, [target_id], |row| row.get(0)).optional())
    }

    /// The user who owns a flagged target (moment creator or message
    /// author). None once the content is gone.
    pub fn target_owner(&self, target: FlagTarget, target_id: &str) -> StoreResult<Option<String>> {
        let sql = match target {
            FlagTarget::Moment => "SELECT creator_id FROM moments WHERE id = ?1",
            FlagTarget::Message => "SELECT user_id FROM moment_messages WHERE id = ?1",
        };
        self.with_conn(|conn| conn.query_row(sql, [target_id], |row| row.get(0)).optional())
    }

    /// Dismiss/cleanup: drop every flag against one target.
    pub fn delete_flags_for_target(&self, target: FlagTarget, target_id: &str) -> StoreResult<usize> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "DELETE FROM flags WHERE target_type = ?1 AND target_id = ?2",
                params![target.as_str(), target_id],
            )?;
            Ok(n)
        })
    }

    /// Hard ban: remove everything the user created, then the profile
    /// itself (FKs cascade their remaining participations, alerts and
    /// reports). Destructive and irreversible — there is no soft-ban state.
    pub fn ban_user(&self, user_id: &str) -> StoreResult<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;

            // Flags are polymorphic: clear the ones aimed at content that is
            // about to disappear.
            tx.execute(
                "DELETE FROM flags
                  WHERE target_type = 'message'
                    AND target_id IN (SELECT id FROM moment_messages
                                       WHERE user_id = ?1
                                          OR moment_id IN (SELECT id FROM moments
                                                            WHERE creator_id = ?1))",
                [user_id],
            )?;
            tx.execute(
                "DELETE FROM flags
                  WHERE target_type = 'moment'
                    AND target_id IN (SELECT id FROM moments WHERE creator_id = ?1)",
                [user_id],
            )?;

            tx.execute("DELETE FROM moments WHERE creator_id = ?1", [user_id])?;
            tx.execute("DELETE FROM moment_messages WHERE user_id = ?1", [user_id])?;
            let n = tx.execute("DELETE FROM profiles WHERE id = ?1", [user_id])?;
            tx.commit()?;

            if n == 0 {
                return Err(StoreError::NotFound("profile"));
            }
            Ok(())
        })
    }
}

/// Collapse flags by (target_type, target_id), most-reported first. Done in
/// code rather than SQL so reason sets stay exact.
pub fn group_flags(flags: Vec<FlagRow>) -> Vec<FlagGroup> {
    let mut groups: Vec<FlagGroup> = Vec::new();
    for flag in flags {
        match groups
            .iter_mut()
            .find(|g| g.target_type == flag.target_type && g.target_id == flag.target_id)
        {
            Some(group) => {
                group.flag_count += 1;
                if !group.reasons.contains(&flag.reason) {
                    group.reasons.push(flag.reason);
                }
            }
            None => groups.push(FlagGroup {
                target_type: flag.target_type,
                target_id: flag.target_id,
                flag_count: 1,
                reasons: vec![flag.reason],
            }),
        }
    }
    groups.sort_by(|a, b| b.flag_count.cmp(&a.flag_count));
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{seed_moment, seed_profile, test_db};

    #[test]
    fn duplicate_flag_is_a_silent_noop() {
        let (_dir, db) = test_db();
        let creator = seed_profile(&db, "a@example.com");
        let reporter = seed_profile(&db, "b@example.com");
        let moment = seed_moment(&db, &creator, "Sketchy", 48.85, 2.35, 60, 4);

        assert!(db
            .create_flag(&reporter, FlagTarget::Moment, &moment, "spam", Utc::now())
            .unwrap());
        assert!(!db
            .create_flag(&reporter, FlagTarget::Moment, &moment, "spam", Utc::now())
            .unwrap());

        assert_eq!(db.list_flags(None, None).unwrap().len(), 1);

        // A different reporter still gets their own row.
        let other = seed_profile(&db, "c@example.com");
        assert!(db
            .create_flag(&other, FlagTarget::Moment, &moment, "scam", Utc::now())
            .unwrap());
        assert_eq!(db.list_flags(None, None).unwrap().len(), 2);
    }

    #[test]
    fn grouping_counts_and_collects_distinct_reasons() {
        let flags = vec![
            FlagRow {
                id: "1".into(),
                reporter_id: "a".into(),
                target_type: "moment".into(),
                target_id: "m1".into(),
                reason: "spam".into(),
                created_at: String::new(),
            },
            FlagRow {
                id: "2".into(),
                reporter_id: "b".into(),
                target_type: "moment".into(),
                target_id: "m1".into(),
                reason: "scam".into(),
                created_at: String::new(),
            },
            FlagRow {
                id: "3".into(),
                reporter_id: "c".into(),
                target_type: "moment".into(),
                target_id: "m1".into(),
                reason: "spam".into(),
                created_at: String::new(),
            },
            FlagRow {
                id: "4".into(),
                reporter_id: "a".into(),
                target_type: "message".into(),
                target_id: "msg1".into(),
                reason: "inappropriate".into(),
                created_at: String::new(),
            },
        ];

        let groups = group_flags(flags);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].target_id, "m1");
        assert_eq!(groups[0].flag_count, 3);
        assert_eq!(groups[0].reasons, vec!["spam".to_string(), "scam".to_string()]);
        assert_eq!(groups[1].flag_count, 1);
    }

    #[test]
    fn filters_narrow_the_listing() {
        let (_dir, db) = test_db();
        let creator = seed_profile(&db, "a@example.com");
        let reporter = seed_profile(&db, "b@example.com");
        let moment = seed_moment(&db, &creator, "Sketchy", 48.85, 2.35, 60, 4);
        let message = db.send_message(&moment, &creator, "hi", Utc::now()).unwrap();

        db.create_flag(&reporter, FlagTarget::Moment, &moment, "spam", Utc::now())
            .unwrap();
        db.create_flag(&reporter, FlagTarget::Message, &message.id, "inappropriate", Utc::now())
            .unwrap();

        assert_eq!(db.list_flags(Some(FlagTarget::Moment), None).unwrap().len(), 1);
        assert_eq!(db.list_flags(None, Some("inappropriate")).unwrap().len(), 1);
        assert_eq!(
            db.list_flags(Some(FlagTarget::Moment), Some("inappropriate"))
                .unwrap()
                .len(),
            0
        );
    }

    #[test]
    fn target_content_degrades_to_none_after_delete() {
        let (_dir, db) = test_db();
        let creator = seed_profile(&db, "a@example.com");
        let moment = seed_moment(&db, &creator, "Readable", 48.85, 2.35, 60, 4);

        assert_eq!(
            db.target_content(FlagTarget::Moment, &moment).unwrap().as_deref(),
            Some("Readable")
        );
        db.delete_moment(&moment).unwrap();
        assert_eq!(db.target_content(FlagTarget::Moment, &moment).unwrap(), None);
    }

    #[test]
    fn ban_user_removes_content_and_profile() {
        let (_dir, db) = test_db();
        let offender = seed_profile(&db, "bad@example.com");
        let bystander = seed_profile(&db, "ok@example.com");
        let reporter = seed_profile(&db, "r@example.com");

        let their_moment = seed_moment(&db, &offender, "Theirs", 48.85, 2.35, 60, 4);
        let other_moment = seed_moment(&db, &bystander, "Other", 48.85, 2.35, 60, 8);
        db.join_moment(&other_moment, &offender, Utc::now()).unwrap();
        let their_message = db
            .send_message(&other_moment, &offender, "ugh", Utc::now())
            .unwrap();
        db.create_flag(&reporter, FlagTarget::Message, &their_message.id, "abuse", Utc::now())
            .unwrap();

        db.ban_user(&offender).unwrap();

        assert!(matches!(
            db.get_moment(&their_moment),
            Err(StoreError::NotFound(_))
        ));
        assert!(db.list_messages(&other_moment, 100).unwrap().is_empty());
        assert!(!db.is_participant(&other_moment, &offender).unwrap());
        assert!(db.get_profile(&offender).unwrap().is_none());
        assert!(db.list_flags(None, None).unwrap().is_empty());
        // The bystander's moment survives.
        db.get_moment(&other_moment).unwrap();

        // Banning again: the profile is already gone.
        assert!(matches!(
            db.ban_user(&offender),
            Err(StoreError::NotFound(_))
        ));
    }
}
