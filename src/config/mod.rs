use std::env;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),
}

/// Process configuration, read once at startup and injected where needed.
/// Nothing reads the environment after this point.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    /// Shared secret the access gate compares the x-api-key header against.
    pub api_key: String,
    /// Upper bound on any single repository call.
    pub repository_timeout: Duration,
    pub admin: AdminConfig,
}

#[derive(Debug, Clone)]
pub struct AdminConfig {
    /// HS256 secret for the admin session token.
    pub session_secret: String,
    pub session_ttl_hours: i64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5000);

        let repository_timeout = env::var("REPOSITORY_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(10));

        let session_ttl_hours = env::var("ADMIN_SESSION_TTL_HOURS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(24);

        Ok(Self {
            port,
            database_url: require("DATABASE_URL")?,
            api_key: require("API_KEY")?,
            repository_timeout,
            admin: AdminConfig {
                session_secret: require("ADMIN_SESSION_SECRET")?,
                session_ttl_hours,
            },
        })
    }
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingVar(name))
}
