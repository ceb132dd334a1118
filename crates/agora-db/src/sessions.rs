use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;

use crate::{Database, sql_timestamp};

impl Database {
    pub fn insert_session(&self, id: &str, user_id: &str, expires_at: DateTime<Utc>) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO sessions (id, user_id, expires_at) VALUES (?1, ?2, ?3)",
                (id, user_id, sql_timestamp(expires_at)),
            )?;
            Ok(())
        })
    }

    /// Returns the number of rows removed (0 or 1).
    pub fn delete_session(&self, id: &str) -> Result<usize> {
        self.with_conn_mut(|conn| Ok(conn.execute("DELETE FROM sessions WHERE id = ?1", [id])?))
    }

    /// The session's user, if the session exists and has not expired at `now`.
    /// Expired rows are left in place.
    pub fn find_session_user(&self, id: &str, now: DateTime<Utc>) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let user_id = conn
                .query_row(
                    "SELECT user_id FROM sessions WHERE id = ?1 AND expires_at > ?2",
                    (id, sql_timestamp(now)),
                    |row| row.get(0),
                )
                .optional()?;
            Ok(user_id)
        })
    }

    pub fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<usize> {
        self.with_conn_mut(|conn| {
            Ok(conn.execute(
                "DELETE FROM sessions WHERE expires_at <= ?1",
                [sql_timestamp(now)],
            )?)
        })
    }
}
