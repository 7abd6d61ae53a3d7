//! Configuration types.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::error::ConfigError;

/// Server configuration, built from `HIRAIZUMI_*` environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Interface to bind.
    pub bind: String,
    /// HTTP port.
    pub port: u16,
    /// SQLite database file.
    pub db_path: PathBuf,
    /// When set, logs are also written to a daily rolling file here.
    pub log_dir: Option<PathBuf>,
    /// Lifetime of a login session.
    pub session_ttl: Duration,
    /// How often chat clients are told to poll for new messages.
    pub chat_poll_interval_secs: u64,
    /// Allowed CORS origins. `*` allows any origin; empty disables CORS.
    pub cors_origins: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8080,
            db_path: PathBuf::from("./data/hiraizumi.db"),
            log_dir: None,
            session_ttl: Duration::from_secs(168 * 3600), // 1 week
            chat_poll_interval_secs: 5,
            cors_origins: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Build config from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let bind = lookup("HIRAIZUMI_BIND").unwrap_or(defaults.bind);
        let port = parse_or("HIRAIZUMI_PORT", lookup("HIRAIZUMI_PORT"), defaults.port);
        let db_path = lookup("HIRAIZUMI_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);
        let log_dir = lookup("HIRAIZUMI_LOG_DIR")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);
        let ttl_hours: u64 = parse_or(
            "HIRAIZUMI_SESSION_TTL_HOURS",
            lookup("HIRAIZUMI_SESSION_TTL_HOURS"),
            168,
        );
        let chat_poll_interval_secs = parse_or(
            "HIRAIZUMI_CHAT_POLL_SECS",
            lookup("HIRAIZUMI_CHAT_POLL_SECS"),
            defaults.chat_poll_interval_secs,
        );
        let cors_origins: Vec<String> = lookup("HIRAIZUMI_CORS_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            bind,
            port,
            db_path,
            log_dir,
            session_ttl: Duration::from_secs(ttl_hours * 3600),
            chat_poll_interval_secs,
            cors_origins,
        }
    }

    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chat_poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "HIRAIZUMI_CHAT_POLL_SECS".into(),
                message: "must be at least 1".into(),
            });
        }
        if self.session_ttl.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "HIRAIZUMI_SESSION_TTL_HOURS".into(),
                message: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// `bind:port` for the TCP listener.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> T
where
    T: FromStr + std::fmt::Display,
    T::Err: std::fmt::Display,
{
    match raw {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|e| {
            warn!(key, value = %raw, error = %e, default = %default, "Invalid value, using default");
            default
        }),
    }
}
