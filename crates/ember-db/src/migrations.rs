use rusqlite::Connection;
use tracing::info;

use crate::error::StoreResult;

pub fn run(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                email       TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE profiles (
                id                          TEXT PRIMARY KEY
                                            REFERENCES users(id) ON DELETE CASCADE,
                display_name                TEXT NOT NULL,
                home_country                TEXT NOT NULL,
                languages                   TEXT NOT NULL,
                user_type                   TEXT NOT NULL,
                profile_photo_url           TEXT,
                profile_photo_uploaded_at   TEXT,
                created_at                  TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at                  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE moments (
                id                  TEXT PRIMARY KEY,
                creator_id          TEXT NOT NULL
                                    REFERENCES profiles(id) ON DELETE CASCADE,
                title               TEXT NOT NULL,
                lat                 REAL NOT NULL,
                lng                 REAL NOT NULL,
                city_code           TEXT NOT NULL DEFAULT 'UNKNOWN',
                starts_at           TEXT NOT NULL,
                ends_at             TEXT NOT NULL,
                max_participants    INTEGER NOT NULL,
                status              TEXT NOT NULL DEFAULT 'active',
                created_at          TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_moments_status_ends ON moments(status, ends_at);
            CREATE INDEX idx_moments_box ON moments(lat, lng);
            CREATE INDEX idx_moments_creator ON moments(creator_id, created_at);

            CREATE TABLE moment_participants (
                id          TEXT PRIMARY KEY,
                moment_id   TEXT NOT NULL
                            REFERENCES moments(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL
                            REFERENCES profiles(id) ON DELETE CASCADE,
                joined_at   TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE(moment_id, user_id)
            );

            CREATE INDEX idx_participants_moment
                ON moment_participants(moment_id, joined_at);

            CREATE TABLE moment_messages (
                id          TEXT PRIMARY KEY,
                moment_id   TEXT NOT NULL
                            REFERENCES moments(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL
                            REFERENCES profiles(id) ON DELETE CASCADE,
                content     TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_messages_moment
                ON moment_messages(moment_id, created_at);

            CREATE TABLE moment_photos (
                id          TEXT PRIMARY KEY,
                moment_id   TEXT NOT NULL
                            REFERENCES moments(id) ON DELETE CASCADE,
                uploader_id TEXT NOT NULL
                            REFERENCES profiles(id) ON DELETE CASCADE,
                photo_url   TEXT NOT NULL,
                caption     TEXT,
                is_preview  INTEGER NOT NULL DEFAULT 0,
                uploaded_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_photos_moment ON moment_photos(moment_id, uploaded_at);
            CREATE INDEX idx_photos_sweep ON moment_photos(is_preview, uploaded_at);

            CREATE TABLE sos_alerts (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL
                            REFERENCES profiles(id) ON DELETE CASCADE,
                moment_id   TEXT NOT NULL
                            REFERENCES moments(id) ON DELETE CASCADE,
                lat         REAL,
                lng         REAL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now')),
                resolved_at TEXT,
                resolved_by TEXT REFERENCES profiles(id)
            );

            CREATE INDEX idx_sos_open ON sos_alerts(resolved_at);

            -- target_id is polymorphic (moment or message), so no FK;
            -- cascade is handled explicitly by the delete paths.
            CREATE TABLE flags (
                id          TEXT PRIMARY KEY,
                reporter_id TEXT NOT NULL
                            REFERENCES profiles(id) ON DELETE CASCADE,
                target_type TEXT NOT NULL,
                target_id   TEXT NOT NULL,
                reason      TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE(reporter_id, target_type, target_id)
            );

            CREATE INDEX idx_flags_target ON flags(target_type, target_id);

            CREATE TABLE user_roles (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL
                            REFERENCES profiles(id) ON DELETE CASCADE,
                role        TEXT NOT NULL,
                granted_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_roles_user ON user_roles(user_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
