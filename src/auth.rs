//! Admin authentication: password hashing and the session capability
//!
//! A successful login stores a random bearer token in the `sessions` table.
//! [`AdminSession`] can only be obtained by validating such a token, and every
//! administrative repository operation takes one, so an unauthenticated
//! caller has no way to reach them.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Duration, Utc};
use rand::{distr::Alphanumeric, Rng};
use redb::ReadableTable;

use crate::config::Config;
use crate::database::{Db, TABLE_SESSIONS};
use crate::error::{AppError, AppResult};
use crate::model::{LoginResponse, SessionRecord};

const TOKEN_LEN: usize = 48;

/// Proof that the current caller logged in as the administrator.
#[derive(Debug, Clone)]
pub struct AdminSession {
    username: String,
}

impl AdminSession {
    pub fn username(&self) -> &str {
        &self.username
    }
}

/// Hash a plaintext password with Argon2id and a random salt (PHC format).
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a plaintext password against a stored PHC hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
    let parsed_hash = PasswordHash::new(hash)?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(e),
    }
}

fn generate_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// Checks the credentials and opens a new session.
pub fn login(db: &Db, config: &Config, username: &str, password: &str) -> AppResult<LoginResponse> {
    let password_ok = verify_password(password, &config.admin_password_hash)
        .map_err(|e| AppError::Internal(format!("invalid admin password hash: {e}")))?;

    if username != config.admin_username || !password_ok {
        tracing::warn!(username, "rejected admin login");
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    }

    let token = generate_token();
    let now = Utc::now();
    let expires_at = session_expiry(now, config.session_ttl_hours).ok_or_else(|| {
        AppError::Internal(format!(
            "session ttl of {} hours is out of range",
            config.session_ttl_hours
        ))
    })?;
    let record = SessionRecord {
        username: username.to_string(),
        created_at: now,
        expires_at,
    };
    let record_json = serde_json::to_string(&record)?;

    let swept = db.transact(|txn| {
        let mut table = txn.open_table(TABLE_SESSIONS)?;
        let expired = expired_tokens(&table, now)?;
        for stale in &expired {
            table.remove(stale.as_str())?;
        }
        table.insert(token.as_str(), record_json.as_str())?;
        Ok(expired.len())
    })?;

    tracing::info!(username, swept, "admin logged in");
    Ok(LoginResponse {
        token,
        expires_at: record.expires_at,
    })
}

/// Expiry instant of a session opened at `now`, `None` when out of range.
pub fn session_expiry(now: DateTime<Utc>, ttl_hours: i64) -> Option<DateTime<Utc>> {
    now.checked_add_signed(Duration::try_hours(ttl_hours)?)
}

fn expired_tokens<T>(table: &T, now: DateTime<Utc>) -> AppResult<Vec<String>>
where
    T: ReadableTable<&'static str, &'static str>,
{
    let mut expired = Vec::new();
    for entry in table.iter()? {
        let (token, value) = entry?;
        let record: SessionRecord = serde_json::from_str(value.value())?;
        if record.expires_at <= now {
            expired.push(token.value().to_string());
        }
    }
    Ok(expired)
}

/// Resolves a bearer token into an [`AdminSession`].
///
/// Expired sessions are deleted as they are encountered.
pub fn authenticate(db: &Db, token: &str) -> AppResult<AdminSession> {
    let rejected = || AppError::Unauthorized("Invalid or expired session".into());

    let record = db.transact(|txn| {
        let mut table = txn.open_table(TABLE_SESSIONS)?;
        let record = match table.get(token)? {
            Some(guard) => serde_json::from_str::<SessionRecord>(guard.value())?,
            None => return Ok(None),
        };
        if record.expires_at <= Utc::now() {
            table.remove(token)?;
            return Ok(None);
        }
        Ok(Some(record))
    })?;

    record
        .map(|r| AdminSession { username: r.username })
        .ok_or_else(rejected)
}

/// Revokes the session identified by `token`.
pub fn logout(db: &Db, session: &AdminSession, token: &str) -> AppResult<()> {
    db.transact(|txn| {
        let mut table = txn.open_table(TABLE_SESSIONS)?;
        table.remove(token)?;
        Ok(())
    })?;
    tracing::info!(username = session.username(), "admin logged out");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("admin123").expect("hashing should succeed");
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("admin123", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        assert!(verify_password("admin123", "not-a-phc-string").is_err());
    }

    #[test]
    fn test_session_expiry_bounds() {
        let now = Utc::now();
        assert_eq!(session_expiry(now, 24), Some(now + Duration::hours(24)));
        assert_eq!(session_expiry(now, i64::MAX), None);
        assert_eq!(session_expiry(now, 1_000_000_000_000), None);
    }

    #[test]
    fn test_generated_tokens_are_distinct() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), TOKEN_LEN);
        assert_ne!(a, b);
    }
}
