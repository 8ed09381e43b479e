use std::fmt;
use std::str::FromStr;

use tandem_core::collaboration::{
    HEARTBEAT_INTERVAL_SECS, JANITOR_INTERVAL_SECS, MAX_AUDIT_FEED_CAPACITY, SESSION_STALE_SECS,
};

use crate::auth::jwt::JwtConfig;

/// Where shared collaboration state lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Shared Postgres database; several server processes may point at it.
    Postgres,
    /// In-process tables. State is lost on restart.
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown storage backend '{other}'")),
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Postgres => "postgres",
            Self::Memory => "memory",
        })
    }
}

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Timing and sizing knobs of the collaboration subsystem.
#[derive(Debug, Clone)]
pub struct CollabConfig {
    /// Seconds between Session Janitor sweeps.
    pub janitor_interval_secs: u64,
    /// Sessions idle for longer than this are swept.
    pub session_stale_secs: i64,
    /// Seconds between transport-level pings.
    pub heartbeat_interval_secs: u64,
    /// Number of audit events retained for `admin-init`. Never above 100.
    pub audit_feed_capacity: usize,
}

impl Default for CollabConfig {
    fn default() -> Self {
        Self {
            janitor_interval_secs: JANITOR_INTERVAL_SECS,
            session_stale_secs: SESSION_STALE_SECS,
            heartbeat_interval_secs: HEARTBEAT_INTERVAL_SECS,
            audit_feed_capacity: MAX_AUDIT_FEED_CAPACITY,
        }
    }
}

/// Credentials for the administrator account created at startup.
#[derive(Debug, Clone)]
pub struct BootstrapAdmin {
    pub username: String,
    pub password: String,
}

/// Server configuration loaded from environment variables.
///
/// All fields except the JWT secret have defaults suitable for local
/// development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    pub storage: StorageBackend,
    /// Required when `storage` is [`StorageBackend::Postgres`].
    pub database_url: Option<String>,
    pub log_format: LogFormat,
    pub jwt: JwtConfig,
    pub collab: CollabConfig,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr + ToString,
    T::Err: fmt::Display,
{
    let raw = std::env::var(key).unwrap_or_else(|_| default.to_string());
    raw.parse()
        .unwrap_or_else(|e| panic!("{key} has invalid value '{raw}': {e}"))
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default                    |
    /// |-----------------------------|----------------------------|
    /// | `HOST`                      | `0.0.0.0`                  |
    /// | `PORT`                      | `3000`                     |
    /// | `CORS_ORIGINS`              | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`      | `30`                       |
    /// | `STORAGE_BACKEND`           | `postgres`                 |
    /// | `DATABASE_URL`              | required for `postgres`    |
    /// | `LOG_FORMAT`                | `pretty`                   |
    /// | `JANITOR_INTERVAL_SECS`     | `300`                      |
    /// | `SESSION_STALE_SECS`        | `600`                      |
    /// | `HEARTBEAT_INTERVAL_SECS`   | `30`                       |
    /// | `AUDIT_FEED_CAPACITY`       | `100`                      |
    /// | `BOOTSTRAP_ADMIN_USERNAME`  | unset                      |
    /// | `BOOTSTRAP_ADMIN_PASSWORD`  | unset                      |
    ///
    /// JWT settings are documented on [`JwtConfig::from_env`].
    ///
    /// # Panics
    ///
    /// Panics on any unparsable value, or when the Postgres backend is
    /// selected without `DATABASE_URL`.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = env_or("PORT", 3000);

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = env_or("REQUEST_TIMEOUT_SECS", 30);

        let storage = std::env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "postgres".into())
            .parse::<StorageBackend>()
            .unwrap_or_else(|e| panic!("STORAGE_BACKEND: {e}"));

        let database_url = std::env::var("DATABASE_URL").ok();
        if storage == StorageBackend::Postgres {
            assert!(
                database_url.is_some(),
                "DATABASE_URL must be set when STORAGE_BACKEND=postgres"
            );
        }

        let log_format = std::env::var("LOG_FORMAT")
            .unwrap_or_else(|_| "pretty".into())
            .parse::<LogFormat>()
            .unwrap_or_else(|e| panic!("LOG_FORMAT: {e}"));

        let audit_feed_capacity: usize = env_or("AUDIT_FEED_CAPACITY", MAX_AUDIT_FEED_CAPACITY);
        assert!(
            (1..=MAX_AUDIT_FEED_CAPACITY).contains(&audit_feed_capacity),
            "AUDIT_FEED_CAPACITY must be between 1 and {MAX_AUDIT_FEED_CAPACITY}"
        );

        let collab = CollabConfig {
            janitor_interval_secs: env_or("JANITOR_INTERVAL_SECS", JANITOR_INTERVAL_SECS),
            session_stale_secs: env_or("SESSION_STALE_SECS", SESSION_STALE_SECS),
            heartbeat_interval_secs: env_or("HEARTBEAT_INTERVAL_SECS", HEARTBEAT_INTERVAL_SECS),
            audit_feed_capacity,
        };

        let bootstrap_admin = match (
            std::env::var("BOOTSTRAP_ADMIN_USERNAME"),
            std::env::var("BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Ok(username), Ok(password)) if !username.is_empty() && !password.is_empty() => {
                Some(BootstrapAdmin { username, password })
            }
            _ => None,
        };

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            storage,
            database_url,
            log_format,
            jwt: JwtConfig::from_env(),
            collab,
            bootstrap_admin,
        }
    }
}
