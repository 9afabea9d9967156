use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::ReelmarkError;
use crate::library::ListQuery;
use crate::models::Session;

const SCHEMA_V1: &str = include_str!("../../../migrations/001_initial.sql");
const SCHEMA_V2: &str = include_str!("../../../migrations/002_ui_state.sql");

const LIST_QUERY_KEY: &str = "list_query";

/// Local SQLite state: the signed-in session and presentation state.
///
/// Watchlist rows live in the backend, not here.
pub struct Storage {
    conn: Connection,
}

impl Storage {
    /// Open (or create) the database at the given path and run migrations.
    pub fn open(path: &Path) -> Result<Self, ReelmarkError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        run_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, ReelmarkError> {
        let conn = Connection::open_in_memory()?;
        run_migrations(&conn)?;
        Ok(Self { conn })
    }

    // ── Session ─────────────────────────────────────────────────

    /// Store the session, replacing any previous one.
    pub fn save_session(&self, session: &Session) -> Result<(), ReelmarkError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO session
             (id, user_id, email, access_token, refresh_token, expires_at, saved_at)
             VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                session.user_id,
                session.email,
                session.access_token,
                session.refresh_token,
                session.expires_at.map(|t| t.to_rfc3339()),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn load_session(&self) -> Result<Option<Session>, ReelmarkError> {
        self.conn
            .query_row(
                "SELECT user_id, email, access_token, refresh_token, expires_at
                 FROM session WHERE id = 1",
                [],
                |row| {
                    let expires_at: Option<String> = row.get(4)?;
                    Ok(Session {
                        user_id: row.get(0)?,
                        email: row.get(1)?,
                        access_token: row.get(2)?,
                        refresh_token: row.get(3)?,
                        expires_at: expires_at.as_deref().and_then(parse_datetime),
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn clear_session(&self) -> Result<(), ReelmarkError> {
        self.conn.execute("DELETE FROM session", [])?;
        Ok(())
    }

    // ── UI state ────────────────────────────────────────────────

    /// Remember the last list view (filter, search, sort, page).
    pub fn save_list_query(&self, query: &ListQuery) -> Result<(), ReelmarkError> {
        let value =
            serde_json::to_string(query).map_err(|e| ReelmarkError::Config(e.to_string()))?;
        self.conn.execute(
            "INSERT OR REPLACE INTO ui_state (key, value, updated_at)
             VALUES (?1, ?2, datetime('now'))",
            params![LIST_QUERY_KEY, value],
        )?;
        Ok(())
    }

    /// The last saved list view. A malformed value is treated as absent.
    pub fn load_list_query(&self) -> Result<Option<ListQuery>, ReelmarkError> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM ui_state WHERE key = ?1",
                params![LIST_QUERY_KEY],
                |row| row.get(0),
            )
            .optional()?;
        Ok(raw.and_then(|s| match serde_json::from_str(&s) {
            Ok(query) => Some(query),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable saved list view");
                None
            }
        }))
    }
}

// ── Migrations ──────────────────────────────────────────────────

/// Run schema migrations using `PRAGMA user_version` for version tracking.
fn run_migrations(conn: &Connection) -> Result<(), ReelmarkError> {
    let version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if version < 1 {
        conn.execute_batch(SCHEMA_V1)?;
        conn.pragma_update(None, "user_version", 1)?;
    }
    if version < 2 {
        conn.execute_batch(SCHEMA_V2)?;
        conn.pragma_update(None, "user_version", 2)?;
    }
    Ok(())
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}
