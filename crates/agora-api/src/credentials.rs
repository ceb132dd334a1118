use std::sync::Arc;

use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::{SaltString, rand_core::OsRng},
};
use tracing::{info, warn};
use uuid::Uuid;

use agora_db::Database;
use agora_types::models::User;

use crate::error::ApiError;

const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 32;
const PASSWORD_MIN: usize = 8;

/// Registers users and checks their passwords. Hashes are Argon2id PHC
/// strings; plaintext passwords are never stored or logged.
pub struct CredentialVerifier {
    db: Arc<Database>,
    argon2: Argon2<'static>,
    /// Verified against when the username is unknown so both login failure
    /// paths do the same amount of work.
    dummy_hash: String,
}

impl CredentialVerifier {
    pub fn new(db: Arc<Database>) -> anyhow::Result<Self> {
        Self::with_params(db, Params::default())
    }

    pub fn with_params(db: Arc<Database>, params: Params) -> anyhow::Result<Self> {
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let dummy_hash = hash_with(&argon2, &Uuid::new_v4().to_string())?;
        Ok(Self {
            db,
            argon2,
            dummy_hash,
        })
    }

    pub fn register(&self, username: &str, password: &str) -> Result<Uuid, ApiError> {
        let username = username.trim();
        let length = username.chars().count();
        if !(USERNAME_MIN..=USERNAME_MAX).contains(&length) {
            return Err(ApiError::Validation(format!(
                "Username must be between {} and {} characters",
                USERNAME_MIN, USERNAME_MAX
            )));
        }
        if password.chars().count() < PASSWORD_MIN {
            return Err(ApiError::Validation(format!(
                "Password must be at least {} characters",
                PASSWORD_MIN
            )));
        }

        let password_hash = hash_with(&self.argon2, password)?;
        let user_id = Uuid::new_v4();

        if !self
            .db
            .create_user(&user_id.to_string(), username, &password_hash)?
        {
            return Err(ApiError::Conflict("Username already exists"));
        }

        info!("Registered user {} ({})", username, user_id);
        Ok(user_id)
    }

    /// Check a username/password pair. Every failure other than a storage
    /// error is reported as `InvalidCredentials`.
    pub fn login(&self, username: &str, password: &str) -> Result<User, ApiError> {
        let Some(user) = self.db.get_user_by_username(username.trim())? else {
            // Burn the same verification cost as a real miss.
            let _ = self.verify(password, &self.dummy_hash);
            warn!("Login failed: invalid credentials");
            return Err(ApiError::InvalidCredentials);
        };

        if !self.verify(password, &user.password)? {
            warn!("Login failed: invalid credentials");
            return Err(ApiError::InvalidCredentials);
        }

        let id: Uuid = user
            .id
            .parse()
            .map_err(|e| anyhow::anyhow!("Corrupt user id '{}': {}", user.id, e))?;

        Ok(User {
            id,
            username: user.username,
        })
    }

    fn verify(&self, password: &str, stored: &str) -> anyhow::Result<bool> {
        let parsed = PasswordHash::new(stored)
            .map_err(|e| anyhow::anyhow!("Corrupt password hash: {}", e))?;
        Ok(self
            .argon2
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }
}

fn hash_with(argon2: &Argon2<'_>, password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Password hashing failed: {}", e))?;
    Ok(hash.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> CredentialVerifier {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let params = Params::new(8, 1, 1, None).unwrap();
        CredentialVerifier::with_params(db, params).unwrap()
    }

    #[test]
    fn test_register_then_login() {
        let v = verifier();
        let id = v.register("alice", "correct horse").unwrap();

        let user = v.login("alice", "correct horse").unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.username, "alice");
    }

    #[test]
    fn test_password_is_hashed() {
        let v = verifier();
        v.register("alice", "correct horse").unwrap();

        let row = v.db.get_user_by_username("alice").unwrap().unwrap();
        assert_ne!(row.password, "correct horse");
        assert!(row.password.starts_with("$argon2id$"));
    }

    #[test]
    fn test_each_hash_gets_a_fresh_salt() {
        let v = verifier();
        let first = hash_with(&v.argon2, "correct horse").unwrap();
        let second = hash_with(&v.argon2, "correct horse").unwrap();

        assert_ne!(first, second);
        assert!(v.verify("correct horse", &first).unwrap());
        assert!(v.verify("correct horse", &second).unwrap());
        assert!(!v.verify("battery staple", &first).unwrap());
    }

    #[test]
    fn test_duplicate_username_conflicts() {
        let v = verifier();
        v.register("alice", "correct horse").unwrap();

        let err = v.register("alice", "another password").unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
        // The original credentials still work.
        assert!(v.login("alice", "correct horse").is_ok());
    }

    #[test]
    fn test_login_failures_are_indistinguishable() {
        let v = verifier();
        v.register("alice", "correct horse").unwrap();

        let wrong_password = v.login("alice", "battery staple").unwrap_err();
        let unknown_user = v.login("mallory", "correct horse").unwrap_err();

        assert!(matches!(wrong_password, ApiError::InvalidCredentials));
        assert!(matches!(unknown_user, ApiError::InvalidCredentials));
        assert_eq!(wrong_password.to_string(), unknown_user.to_string());
    }

    #[test]
    fn test_register_validation() {
        let v = verifier();
        assert!(matches!(v.register("al", "correct horse"), Err(ApiError::Validation(_))));
        assert!(matches!(v.register(&"a".repeat(33), "correct horse"), Err(ApiError::Validation(_))));
        assert!(matches!(v.register("alice", "short"), Err(ApiError::Validation(_))));
        assert!(matches!(v.register("   ", "correct horse"), Err(ApiError::Validation(_))));
    }
}
