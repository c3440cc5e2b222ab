use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::models::{ProfileRow, UserRow};
use crate::{Database, OptionalExt, fmt_ts};

pub struct NewProfile<'a> {
    pub display_name: &'a str,
    pub home_country: &'a str,
    pub languages: &'a [String],
    pub user_type: &'a str,
    pub profile_photo_url: Option<&'a str>,
}

impl Database {
    // -- Users --

    pub fn create_user(&self, id: &str, email: &str, password_hash: &str) -> StoreResult<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, password) VALUES (?1, ?2, ?3)",
                params![id, email.to_lowercase(), password_hash],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(err, _)
                    if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    StoreError::Conflict("email already registered")
                }
                other => other.into(),
            })?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> StoreResult<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, email, password, created_at FROM users WHERE email = ?1",
                [email.to_lowercase()],
                map_user,
            )
            .optional()
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> StoreResult<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, email, password, created_at FROM users WHERE id = ?1",
                [id],
                map_user,
            )
            .optional()
        })
    }

    // -- Profiles --

    /// Profile id equals user id; created once, before any moment
    /// interaction.
    pub fn create_profile(
        &self,
        user_id: &str,
        new: &NewProfile<'_>,
        now: DateTime<Utc>,
    ) -> StoreResult<ProfileRow> {
        validate_languages(new.languages)?;

        let now_s = fmt_ts(now);
        let photo_uploaded_at = new.profile_photo_url.map(|_| now_s.clone());

        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO profiles
                     (id, display_name, home_country, languages, user_type,
                      profile_photo_url, profile_photo_uploaded_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
                params![
                    user_id,
                    new.display_name,
                    new.home_country,
                    serde_json::to_string(new.languages)
                        .map_err(|e| StoreError::Internal(e.to_string()))?,
                    new.user_type,
                    new.profile_photo_url,
                    photo_uploaded_at,
                    now_s,
                ],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(err, _)
                    if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    StoreError::Conflict("profile already exists")
                }
                other => other.into(),
            })?;

            query_profile(conn, user_id)?.ok_or(StoreError::NotFound("profile"))
        })
    }

    pub fn get_profile(&self, user_id: &str) -> StoreResult<Option<ProfileRow>> {
        self.with_conn(|conn| query_profile(conn, user_id))
    }

    pub fn update_profile(
        &self,
        user_id: &str,
        new: &NewProfile<'_>,
        now: DateTime<Utc>,
    ) -> StoreResult<ProfileRow> {
        validate_languages(new.languages)?;
        let now_s = fmt_ts(now);

        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE profiles
                    SET display_name = ?2, home_country = ?3, languages = ?4,
                        user_type = ?5,
                        profile_photo_url = COALESCE(?6, profile_photo_url),
                        profile_photo_uploaded_at = CASE
                            WHEN ?6 IS NOT NULL THEN ?7
                            ELSE profile_photo_uploaded_at END,
                        updated_at = ?7
                  WHERE id = ?1",
                params![
                    user_id,
                    new.display_name,
                    new.home_country,
                    serde_json::to_string(new.languages)
                        .map_err(|e| StoreError::Internal(e.to_string()))?,
                    new.user_type,
                    new.profile_photo_url,
                    now_s,
                ],
            )?;
            if n == 0 {
                return Err(StoreError::NotFound("profile"));
            }
            query_profile(conn, user_id)?.ok_or(StoreError::NotFound("profile"))
        })
    }

    /// Stale-photo sweep candidates: photo uploaded before `cutoff` AND no
    /// moment created since `cutoff`. Both conditions must hold.
    pub fn stale_profile_photos(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<(String, String)>> {
        let cutoff_s = fmt_ts(cutoff);
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT pr.id, pr.profile_photo_url
                 FROM profiles pr
                 WHERE pr.profile_photo_url IS NOT NULL
                   AND pr.profile_photo_uploaded_at < ?1
                   AND NOT EXISTS (SELECT 1 FROM moments m
                                    WHERE m.creator_id = pr.id
                                      AND m.created_at >= ?1)",
            )?;
            let rows = stmt
                .query_map([cutoff_s], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Clear both the pointer and the upload timestamp; conditional, so a
    /// concurrent sweep clearing the same profile is a no-op.
    pub fn clear_profile_photo(&self, user_id: &str) -> StoreResult<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE profiles
                    SET profile_photo_url = NULL, profile_photo_uploaded_at = NULL
                  WHERE id = ?1 AND profile_photo_url IS NOT NULL",
                [user_id],
            )?;
            Ok(n > 0)
        })
    }

    // -- Roles --

    pub fn grant_role(&self, user_id: &str, role: &str, now: DateTime<Utc>) -> StoreResult<()> {
        let id = Uuid::new_v4().to_string();
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO user_roles (id, user_id, role, granted_at) VALUES (?1, ?2, ?3, ?4)",
                params![id, user_id, role, fmt_ts(now)],
            )?;
            Ok(())
        })
    }

    pub fn has_any_role(&self, user_id: &str, roles: &[&str]) -> StoreResult<bool> {
        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (2..=roles.len() + 1).map(|i| format!("?{i}")).collect();
            let sql = format!(
                "SELECT EXISTS(SELECT 1 FROM user_roles
                                WHERE user_id = ?1 AND role IN ({}))",
                placeholders.join(", ")
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut params: Vec<&dyn rusqlite::types::ToSql> = vec![&user_id];
            for role in roles {
                params.push(role);
            }
            let exists: bool = stmt.query_row(params.as_slice(), |row| row.get(0))?;
            Ok(exists)
        })
    }
}

fn validate_languages(languages: &[String]) -> StoreResult<()> {
    if languages.is_empty() || languages.len() > 3 {
        return Err(StoreError::Validation(
            "languages must have between 1 and 3 entries".into(),
        ));
    }
    Ok(())
}

fn map_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        password: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn query_profile(conn: &Connection, user_id: &str) -> StoreResult<Option<ProfileRow>> {
    conn.query_row(
        "SELECT id, display_name, home_country, languages, user_type,
                profile_photo_url, profile_photo_uploaded_at, created_at
         FROM profiles WHERE id = ?1",
        [user_id],
        |row| {
            Ok(ProfileRow {
                id: row.get(0)?,
                display_name: row.get(1)?,
                home_country: row.get(2)?,
                languages: row.get(3)?,
                user_type: row.get(4)?,
                profile_photo_url: row.get(5)?,
                profile_photo_uploaded_at: row.get(6)?,
                created_at: row.get(7)?,
            })
        },
    )
    .optional()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{seed_moment, seed_profile, test_db};
    use chrono::Duration;

    #[test]
    fn duplicate_email_conflicts() {
        let (_dir, db) = test_db();
        db.create_user("u1", "Dup@Example.com", "hash").unwrap();
        let err = db.create_user("u2", "dup@example.com", "hash").unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn profile_requires_one_to_three_languages() {
        let (_dir, db) = test_db();
        db.create_user("u1", "a@example.com", "hash").unwrap();

        let too_many: Vec<String> =
            ["en", "fr", "de", "es"].iter().map(|s| s.to_string()).collect();
        let err = db
            .create_profile(
                "u1",
                &NewProfile {
                    display_name: "a",
                    home_country: "FR",
                    languages: &too_many,
                    user_type: "local",
                    profile_photo_url: None,
                },
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        let err = db
            .create_profile(
                "u1",
                &NewProfile {
                    display_name: "a",
                    home_country: "FR",
                    languages: &[],
                    user_type: "local",
                    profile_photo_url: None,
                },
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn update_keeps_photo_when_not_supplied() {
        let (_dir, db) = test_db();
        db.create_user("u1", "a@example.com", "hash").unwrap();
        let langs = vec!["en".to_string()];
        db.create_profile(
            "u1",
            &NewProfile {
                display_name: "a",
                home_country: "FR",
                languages: &langs,
                user_type: "local",
                profile_photo_url: Some("avatars/a.jpg"),
            },
            Utc::now(),
        )
        .unwrap();

        let updated = db
            .update_profile(
                "u1",
                &NewProfile {
                    display_name: "renamed",
                    home_country: "FR",
                    languages: &langs,
                    user_type: "local",
                    profile_photo_url: None,
                },
                Utc::now(),
            )
            .unwrap();
        assert_eq!(updated.display_name, "renamed");
        assert_eq!(updated.profile_photo_url.as_deref(), Some("avatars/a.jpg"));
    }

    #[test]
    fn stale_photo_query_requires_both_conditions() {
        let (_dir, db) = test_db();
        let now = Utc::now();
        let old = now - Duration::days(90);

        // Old photo, no recent moments: stale.
        db.create_user("stale", "stale@example.com", "hash").unwrap();
        let langs = vec!["en".to_string()];
        db.create_profile(
            "stale",
            &NewProfile {
                display_name: "stale",
                home_country: "FR",
                languages: &langs,
                user_type: "local",
                profile_photo_url: Some("avatars/stale.jpg"),
            },
            old,
        )
        .unwrap();

        // Old photo but created a moment recently: exempt.
        let active = seed_profile(&db, "active@example.com");
        db.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE profiles
                    SET profile_photo_url = 'avatars/active.jpg',
                        profile_photo_uploaded_at = ?2
                  WHERE id = ?1",
                params![active, fmt_ts(old)],
            )?;
            Ok(())
        })
        .unwrap();
        seed_moment(&db, &active, "Recent", 48.85, 2.35, 60, 4);

        // Fresh photo: exempt.
        db.create_user("fresh", "fresh@example.com", "hash").unwrap();
        db.create_profile(
            "fresh",
            &NewProfile {
                display_name: "fresh",
                home_country: "FR",
                languages: &langs,
                user_type: "local",
                profile_photo_url: Some("avatars/fresh.jpg"),
            },
            now,
        )
        .unwrap();

        let stale = db.stale_profile_photos(now - Duration::days(60)).unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].0, "stale");

        assert!(db.clear_profile_photo("stale").unwrap());
        assert!(!db.clear_profile_photo("stale").unwrap());
        assert!(db.stale_profile_photos(now - Duration::days(60)).unwrap().is_empty());
    }

    #[test]
    fn role_check_matches_any_listed_role() {
        let (_dir, db) = test_db();
        let admin = seed_profile(&db, "admin@example.com");
        let user = seed_profile(&db, "user@example.com");
        db.grant_role(&admin, "moderator", Utc::now()).unwrap();

        assert!(db.has_any_role(&admin, &["admin", "moderator"]).unwrap());
        assert!(!db.has_any_role(&admin, &["admin"]).unwrap());
        assert!(!db.has_any_role(&user, &["admin", "moderator"]).unwrap());
    }
}
