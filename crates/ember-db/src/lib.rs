pub mod error;
pub mod flags;
pub mod geo;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod moments;
pub mod participation;
pub mod photos;
pub mod profiles;
pub mod sos;

#[cfg(test)]
pub(crate) mod testutil;

use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::Connection;
use tracing::{info, warn};

use crate::error::{StoreError, StoreResult};

const READER_POOL_SIZE: usize = 4;

/// Timestamps are stored as TEXT in the same shape SQLite's
/// `datetime('now')` produces, so stored values and SQL-side `datetime()`
/// expressions compare lexicographically.
const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn fmt_ts(t: DateTime<Utc>) -> String {
    t.format(TS_FORMAT).to_string()
}

/// Parse a stored timestamp, tolerating both RFC3339 and the bare SQLite
/// format. Corrupt values fall back to the epoch rather than failing a
/// whole listing.
pub fn parse_ts(s: &str) -> DateTime<Utc> {
    s.parse::<DateTime<Utc>>()
        .or_else(|_| NaiveDateTime::parse_from_str(s, TS_FORMAT).map(|ndt| ndt.and_utc()))
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", s, e);
            DateTime::default()
        })
}

/// SQLite handle with a reader/writer split: one writer connection
/// serializes every mutation (which is what makes the check-then-insert
/// admission paths race-free), while reads fan out over a small pool of
/// read-only connections under WAL.
pub struct Database {
    writer: Mutex<Connection>,
    readers: Vec<Mutex<Connection>>,
    reader_idx: AtomicUsize,
}

impl Database {
    pub fn open(path: &Path) -> StoreResult<Self> {
        let writer = Connection::open(path)?;
        writer.pragma_update(None, "journal_mode", "WAL")?;
        writer.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run(&writer)?;

        let mut readers = Vec::with_capacity(READER_POOL_SIZE);
        for _ in 0..READER_POOL_SIZE {
            let conn = Connection::open_with_flags(
                path,
                rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY
                    | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            conn.pragma_update(None, "journal_mode", "WAL")?;
            readers.push(Mutex::new(conn));
        }

        info!(
            "Database opened at {} (1 writer + {} readers)",
            path.display(),
            READER_POOL_SIZE
        );
        Ok(Self {
            writer: Mutex::new(writer),
            readers,
            reader_idx: AtomicUsize::new(0),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T>,
    {
        let idx = self.reader_idx.fetch_add(1, Ordering::Relaxed) % self.readers.len();
        let conn = self.readers[idx]
            .lock()
            .map_err(|e| StoreError::Internal(format!("reader lock poisoned: {e}")))?;
        f(&conn)
    }

    pub fn with_conn_mut<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T>,
    {
        let conn = self
            .writer
            .lock()
            .map_err(|e| StoreError::Internal(format!("writer lock poisoned: {e}")))?;
        f(&conn)
    }
}

/// Extension trait for optional query results.
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> StoreResult<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> StoreResult<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
