use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::models::{ActiveSosAlert, SosAlertRow};
use crate::{Database, fmt_ts};

impl Database {
    pub fn create_sos_alert(
        &self,
        user_id: &str,
        moment_id: &str,
        lat: Option<f64>,
        lng: Option<f64>,
        now: DateTime<Utc>,
    ) -> StoreResult<SosAlertRow> {
        let id = Uuid::new_v4().to_string();
        let created_at = fmt_ts(now);

        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO sos_alerts (id, user_id, moment_id, lat, lng, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![id, user_id, moment_id, lat, lng, created_at],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(err, _)
                    if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    StoreError::NotFound("moment")
                }
                other => other.into(),
            })?;
            Ok(SosAlertRow {
                id: id.clone(),
                user_id: user_id.to_string(),
                moment_id: moment_id.to_string(),
                lat,
                lng,
                created_at: created_at.clone(),
            })
        })
    }

    /// Unresolved alerts joined with their moment's title.
    pub fn active_sos_alerts(&self) -> StoreResult<Vec<ActiveSosAlert>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT a.id, a.moment_id, m.title, a.lat, a.lng, a.created_at
                 FROM sos_alerts a
                 LEFT JOIN moments m ON a.moment_id = m.id
                 WHERE a.resolved_at IS NULL
                 ORDER BY a.created_at ASC",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(ActiveSosAlert {
                        id: row.get(0)?,
                        moment_id: row.get(1)?,
                        moment_title: row.get(2)?,
                        lat: row.get(3)?,
                        lng: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Terminal transition: sets resolved_at/resolved_by once. Resolving an
    /// already-resolved alert is a no-op.
    pub fn resolve_sos_alert(
        &self,
        id: &str,
        resolver_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE sos_alerts SET resolved_at = ?2, resolved_by = ?3
                  WHERE id = ?1 AND resolved_at IS NULL",
                params![id, fmt_ts(now), resolver_id],
            )?;
            if n == 0 {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM sos_alerts WHERE id = ?1)",
                    [id],
                    |row| row.get(0),
                )?;
                if !exists {
                    return Err(StoreError::NotFound("sos alert"));
                }
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{seed_moment, seed_profile, test_db};

    #[test]
    fn active_listing_hides_resolved_alerts() {
        let (_dir, db) = test_db();
        let creator = seed_profile(&db, "a@example.com");
        let admin = seed_profile(&db, "admin@example.com");
        let moment = seed_moment(&db, &creator, "Hike", 48.85, 2.35, 60, 4);

        let alert = db
            .create_sos_alert(&creator, &moment, Some(48.86), Some(2.36), Utc::now())
            .unwrap();

        let active = db.active_sos_alerts().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].moment_title.as_deref(), Some("Hike"));

        db.resolve_sos_alert(&alert.id, &admin, Utc::now()).unwrap();
        assert!(db.active_sos_alerts().unwrap().is_empty());

        // Idempotent; unknown ids are NotFound.
        db.resolve_sos_alert(&alert.id, &admin, Utc::now()).unwrap();
        assert!(matches!(
            db.resolve_sos_alert("missing", &admin, Utc::now()),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn alert_against_missing_moment_is_not_found() {
        let (_dir, db) = test_db();
        let user = seed_profile(&db, "a@example.com");
        assert!(matches!(
            db.create_sos_alert(&user, "missing", None, None, Utc::now()),
            Err(StoreError::NotFound(_))
        ));
    }
}
