use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use tracing::{debug, info};

use agora_db::Database;

use crate::error::ApiError;

pub const SESSION_COOKIE: &str = "session_id";

const TOKEN_BYTES: usize = 32;

/// Owns session records: one row per login, looked up on every request.
///
/// There is no in-process cache. Every call is a round trip to the store,
/// and expired rows are rejected on lookup rather than deleted.
pub struct SessionStore {
    db: Arc<Database>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(db: Arc<Database>, ttl: Duration) -> Self {
        Self { db, ttl }
    }

    /// Issue a new session for `user_id`, valid for the configured TTL.
    pub fn create_session(&self, user_id: &str) -> Result<(String, DateTime<Utc>), ApiError> {
        let token = generate_token();
        let expires_at = Utc::now() + self.ttl;

        self.db.insert_session(&token, user_id, expires_at)?;

        info!("Session created for user {}", user_id);
        Ok((token, expires_at))
    }

    pub fn validate(&self, token: &str) -> Result<String, ApiError> {
        self.validate_at(token, Utc::now())
    }

    /// Resolve `token` to its user as of `now`.
    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<String, ApiError> {
        self.db
            .find_session_user(token, now)?
            .ok_or(ApiError::NotAuthenticated)
    }

    /// Delete the session. Invalidating an unknown or already deleted token
    /// is an error, not a no-op.
    pub fn invalidate(&self, token: &str) -> Result<(), ApiError> {
        match self.db.delete_session(token)? {
            0 => Err(ApiError::NotAuthenticated),
            _ => {
                info!("Session invalidated");
                Ok(())
            }
        }
    }

    /// Remove every session that expired before `now`.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, ApiError> {
        let removed = self.db.delete_expired_sessions(now)?;
        debug!("Purged {} expired sessions", removed);
        Ok(removed)
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
