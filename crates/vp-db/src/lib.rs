//! Storage layer for voice channel presence events.
//!
//! Mirrors the upstream `voice_channel_users` table in `rusqlite` so that a
//! day of events can be imported once and reported on repeatedly.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! Use one `Database` per thread, or a `Mutex<Database>` to share one.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! `create_time` and `update_time` are stored as TEXT exactly as received.
//! They are not parsed on the way in: normalization decides what to do with
//! malformed values. Day selection compares `create_time` lexicographically
//! against RFC 3339 UTC bounds, which matches chronological order only for
//! UTC (`Z`) timestamps.
//!
//! A row whose `create_time` is not RFC 3339 shaped cannot be placed by it.
//! Such a row is selected when its `update_time` falls on the day, or when
//! neither timestamp is usable, so that normalization sees it instead of it
//! silently missing from the report.

use std::path::Path;

use chrono::{Duration, NaiveDate, SecondsFormat};
use rusqlite::{Connection, params};
use thiserror::Error;
use vp_core::RawActivityEvent;
use vp_core::time::day_start;

/// `GLOB` pattern for the `YYYY-MM-DDTHH:MM:SS` prefix of an RFC 3339 value.
const RFC3339_SHAPE: &str =
    "[0-9][0-9][0-9][0-9]-[0-9][0-9]-[0-9][0-9]T[0-9][0-9]:[0-9][0-9]:[0-9][0-9]*";

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            -- One row per observed voice channel state
            -- active: 2 = present, 0 = left, anything else is ignored
            CREATE TABLE IF NOT EXISTS voice_channel_users (
                id INTEGER PRIMARY KEY,
                user_id TEXT NOT NULL,
                clan_id INTEGER,
                channel_id INTEGER NOT NULL DEFAULT 0,
                display_name TEXT NOT NULL,
                create_time TEXT NOT NULL,
                update_time TEXT NOT NULL,
                active INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_voice_create_time ON voice_channel_users(create_time);
            CREATE INDEX IF NOT EXISTS idx_voice_clan ON voice_channel_users(clan_id);
            ",
        )?;
        Ok(())
    }

    /// Inserts a batch of events, ignoring duplicates by ID.
    pub fn insert_events(&mut self, events: &[RawActivityEvent]) -> Result<usize, DbError> {
        if events.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "
                INSERT OR IGNORE INTO voice_channel_users
                (id, user_id, clan_id, channel_id, display_name, create_time, update_time, active)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ",
            )?;
            for event in events {
                inserted += stmt.execute(params![
                    event.id,
                    event.user_id,
                    event.group_id,
                    event.channel_id,
                    event.display_name,
                    event.created_at,
                    event.updated_at,
                    event.state,
                ])?;
            }
        }
        tx.commit()?;
        tracing::debug!(received = events.len(), inserted, "stored events");
        Ok(inserted)
    }

    /// Lists events created on `date` (UTC), optionally for one clan.
    ///
    /// Rows without an RFC 3339 `create_time` are placed by `update_time`,
    /// and included regardless of day if that does not parse either.
    /// Rows are ordered by display name, then creation time, then ID.
    pub fn list_events_for_day(
        &self,
        date: NaiveDate,
        clan_id: Option<i64>,
    ) -> Result<Vec<RawActivityEvent>, DbError> {
        let start = day_start(date);
        let end = start + Duration::days(1);
        let mut stmt = self.conn.prepare(
            "
            SELECT id, user_id, clan_id, channel_id, display_name, create_time, update_time, active
            FROM voice_channel_users
            WHERE (
                (create_time >= ?1 AND create_time < ?2)
                OR (
                    create_time NOT GLOB ?4
                    AND (
                        (update_time >= ?1 AND update_time < ?2)
                        OR update_time NOT GLOB ?4
                    )
                )
              )
              AND (?3 IS NULL OR clan_id = ?3)
            ORDER BY display_name ASC, create_time ASC, id ASC
            ",
        )?;
        let rows = stmt.query_map(
            params![
                start.to_rfc3339_opts(SecondsFormat::Millis, true),
                end.to_rfc3339_opts(SecondsFormat::Millis, true),
                clan_id,
                RFC3339_SHAPE,
            ],
            |row| {
                Ok(RawActivityEvent {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    group_id: row.get(2)?,
                    channel_id: row.get(3)?,
                    display_name: row.get(4)?,
                    created_at: row.get(5)?,
                    updated_at: row.get(6)?,
                    state: row.get(7)?,
                })
            },
        )?;
        let mut events = Vec::new();
        for row in rows {
            events.push(row?);
        }
        tracing::debug!(%date, ?clan_id, events = events.len(), "loaded events for day");
        Ok(events)
    }

    /// Counts all stored events.
    pub fn count_events(&self) -> Result<i64, DbError> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM voice_channel_users", [], |row| {
                row.get(0)
            })?;
        Ok(count)
    }
}
