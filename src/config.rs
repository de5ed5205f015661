//! Process configuration parsed from environment variables.
//!
//! `main` loads `.env` (if present) before calling `AppConfig::from_env`.
//! Every knob except `DATABASE_URL` has a default.

use std::time::Duration;

use crate::throttle::DEFAULT_SWEEP_INTERVAL_SECS;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_SESSION_TTL_HOURS: u64 = 720;
const DEFAULT_PASSWORD_RESET_TTL_MINUTES: u64 = 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("environment variable {0} is out of range")]
    OutOfRange(&'static str),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub db_max_connections: u32,
    pub sweep_interval: Duration,
    pub session_ttl: Duration,
    pub password_reset_ttl: Duration,
    pub cookie_secure: bool,
}

impl AppConfig {
    /// Build config from the environment.
    ///
    /// Required:
    /// - `DATABASE_URL`
    ///
    /// Optional:
    /// - `PORT`: default 3000
    /// - `DB_MAX_CONNECTIONS`: default 5
    /// - `THROTTLE_SWEEP_INTERVAL_SECS`: default 300
    /// - `SESSION_TTL_HOURS`: default 720
    /// - `PASSWORD_RESET_TTL_MINUTES`: default 60
    /// - `COOKIE_SECURE`: default false
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` when `DATABASE_URL` is unset, and
    /// `ConfigError::OutOfRange` when a TTL does not fit in seconds.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;
        // A zero interval would make `tokio::time::interval` panic.
        let sweep_secs = env_parse("THROTTLE_SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL_SECS).max(1);

        Ok(Self {
            database_url,
            port: env_parse("PORT", DEFAULT_PORT),
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS),
            sweep_interval: Duration::from_secs(sweep_secs),
            session_ttl: env_duration("SESSION_TTL_HOURS", DEFAULT_SESSION_TTL_HOURS, 3600)?,
            password_reset_ttl: env_duration("PASSWORD_RESET_TTL_MINUTES", DEFAULT_PASSWORD_RESET_TTL_MINUTES, 60)?,
            cookie_secure: env_bool("COOKIE_SECURE").unwrap_or(false),
        })
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

/// Read a count of `unit_secs`-long units as a `Duration`.
pub(crate) fn env_duration(key: &'static str, default: u64, unit_secs: u64) -> Result<Duration, ConfigError> {
    env_parse(key, default)
        .checked_mul(unit_secs)
        .map(Duration::from_secs)
        .ok_or(ConfigError::OutOfRange(key))
}

pub(crate) fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .and_then(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
