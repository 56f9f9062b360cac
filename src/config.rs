//! Runtime configuration loaded from environment variables
//!
//! `main` calls `dotenvy::dotenv()` first, so every variable below may also
//! come from a `.env` file next to the binary.

use std::env;
use std::path::PathBuf;

use chrono::Utc;

use crate::auth::{hash_password, session_expiry};
use crate::error::{AppError, AppResult};

/// Server configuration.
///
/// | Env Var                   | Default    |
/// |---------------------------|------------|
/// | `PORT`                    | `8080`     |
/// | `DATABASE_URL`            | `kb.db`    |
/// | `ADMIN_USERNAME`          | `admin`    |
/// | `ADMIN_PASSWORD_HASH`     | unset      |
/// | `ADMIN_PASSWORD`          | `admin123` |
/// | `UPLOAD_DIR`              | `uploads`  |
/// | `SESSION_TTL_HOURS`       | `24`       |
/// | `SEED_DEFAULT_CATEGORIES` | `true`     |
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub admin_username: String,
    /// Argon2 PHC string the admin password is checked against
    pub admin_password_hash: String,
    pub upload_dir: PathBuf,
    pub session_ttl_hours: i64,
    pub seed_default_categories: bool,
}

impl Config {
    /// Reads the configuration from the process environment.
    ///
    /// When `ADMIN_PASSWORD_HASH` is not set the plain `ADMIN_PASSWORD`
    /// (or the development default) is hashed on the spot.
    pub fn from_env() -> AppResult<Self> {
        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let database_url = env::var("DATABASE_URL").unwrap_or_else(|_| "kb.db".to_string());
        let admin_username = env::var("ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_string());

        let admin_password_hash = match env::var("ADMIN_PASSWORD_HASH") {
            Ok(hash) if !hash.is_empty() => hash,
            _ => {
                let password = env::var("ADMIN_PASSWORD").unwrap_or_else(|_| {
                    tracing::warn!("ADMIN_PASSWORD_HASH and ADMIN_PASSWORD unset, using the default admin password");
                    "admin123".to_string()
                });
                hash_password(&password)
                    .map_err(|e| AppError::Internal(format!("failed to hash admin password: {e}")))?
            }
        };

        let upload_dir = env::var("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("uploads"));

        let session_ttl_hours = env::var("SESSION_TTL_HOURS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|h: &i64| *h > 0)
            .unwrap_or(24);
        if session_expiry(Utc::now(), session_ttl_hours).is_none() {
            return Err(AppError::Internal(format!(
                "SESSION_TTL_HOURS={session_ttl_hours} is out of range"
            )));
        }

        let seed_default_categories = env::var("SEED_DEFAULT_CATEGORIES")
            .map(|v| !matches!(v.to_ascii_lowercase().as_str(), "0" | "false" | "no"))
            .unwrap_or(true);

        Ok(Self {
            port,
            database_url,
            admin_username,
            admin_password_hash,
            upload_dir,
            session_ttl_hours,
            seed_default_categories,
        })
    }
}
