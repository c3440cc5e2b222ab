use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use crate::error::StoreResult;
use crate::models::{MessageRow, MessageWithAuthor};
use crate::{Database, OptionalExt, fmt_ts};

impl Database {
    /// Messages joined with author display data, creation order ascending.
    /// Participation gating happens at the request boundary.
    pub fn list_messages(&self, moment_id: &str, limit: u32) -> StoreResult<Vec<MessageWithAuthor>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.user_id, m.content, m.created_at,
                        pr.display_name, pr.profile_photo_url
                 FROM moment_messages m
                 LEFT JOIN profiles pr ON m.user_id = pr.id
                 WHERE m.moment_id = ?1
                 ORDER BY m.created_at ASC, m.id ASC
                 LIMIT ?2",
            )?;

            let rows = stmt
                .query_map(params![moment_id, limit], |row| {
                    Ok(MessageWithAuthor {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        content: row.get(2)?,
                        created_at: row.get(3)?,
                        display_name: row.get(4)?,
                        profile_photo_url: row.get(5)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Persist the content verbatim — no truncation, no rewriting. Image
    /// messages are just content with the sentinel prefix.
    pub fn send_message(
        &self,
        moment_id: &str,
        user_id: &str,
        content: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<MessageRow> {
        let id = Uuid::new_v4().to_string();
        let created_at = fmt_ts(now);

        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO moment_messages (id, moment_id, user_id, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, moment_id, user_id, content, created_at],
            )?;
            Ok(MessageRow {
                id: id.clone(),
                moment_id: moment_id.to_string(),
                user_id: user_id.to_string(),
                content: content.to_string(),
                created_at: created_at.clone(),
            })
        })
    }

    pub fn get_message(&self, id: &str) -> StoreResult<Option<MessageRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, moment_id, user_id, content, created_at
                 FROM moment_messages WHERE id = ?1",
                [id],
                |row| {
                    Ok(MessageRow {
                        id: row.get(0)?,
                        moment_id: row.get(1)?,
                        user_id: row.get(2)?,
                        content: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                },
            )
            .optional()
        })
    }

    /// Used by moderation and admin remediation. A message that is already
    /// gone is not an error — deletes race deletes.
    pub fn delete_message(&self, id: &str) -> StoreResult<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("DELETE FROM moment_messages WHERE id = ?1", [id])?;
            Ok(n > 0)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{seed_moment, seed_profile, test_db};

    #[test]
    fn messages_come_back_in_creation_order_with_author() {
        let (_dir, db) = test_db();
        let creator = seed_profile(&db, "a@example.com");
        let moment = seed_moment(&db, &creator, "Chat", 48.85, 2.35, 60, 4);
        let t = Utc::now();

        db.send_message(&moment, &creator, "first", t).unwrap();
        db.send_message(&moment, &creator, "second", t + chrono::Duration::seconds(1))
            .unwrap();

        let messages = db.list_messages(&moment, 100).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "first");
        assert_eq!(messages[1].content, "second");
        assert_eq!(messages[0].display_name.as_deref(), Some("a"));
    }

    #[test]
    fn content_is_stored_verbatim() {
        let (_dir, db) = test_db();
        let creator = seed_profile(&db, "a@example.com");
        let moment = seed_moment(&db, &creator, "Chat", 48.85, 2.35, 60, 4);

        let long = "x".repeat(10_000);
        db.send_message(&moment, &creator, &long, Utc::now()).unwrap();
        let messages = db.list_messages(&moment, 10).unwrap();
        assert_eq!(messages[0].content, long);
    }

    #[test]
    fn delete_tolerates_already_gone() {
        let (_dir, db) = test_db();
        let creator = seed_profile(&db, "a@example.com");
        let moment = seed_moment(&db, &creator, "Chat", 48.85, 2.35, 60, 4);
        let message = db.send_message(&moment, &creator, "oops", Utc::now()).unwrap();

        assert!(db.delete_message(&message.id).unwrap());
        assert!(!db.delete_message(&message.id).unwrap());
        assert!(db.get_message(&message.id).unwrap().is_none());
    }
}
