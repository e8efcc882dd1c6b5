//! Service configuration read from the environment.

use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::app::RetryPolicy;
use crate::app::state::{DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_BODY_BYTES, DEFAULT_REQUEST_DEADLINE};
use crate::domain::ConfigError;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("expected `json` or `text`, got `{other}`")),
        }
    }
}

/// Application configuration
#[derive(Debug)]
pub struct Config {
    pub database_url: SecretString,
    pub host: String,
    pub port: u16,
    /// Filter used when `RUST_LOG` is not set
    pub log_level: String,
    pub log_format: LogFormat,
    pub retry_policy: RetryPolicy,
    pub max_body_bytes: usize,
    pub db_max_connections: u32,
    pub run_migrations: bool,
}

impl Config {
    /// Read the configuration from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the configuration through `lookup`, which returns the raw value
    /// of a variable if it is set
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let database_url = get("DATABASE_URL")
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::Missing("DATABASE_URL".to_string()))?;

        let max_attempts: u32 = parse_or(
            "TXN_RETRY_ATTEMPTS",
            get("TXN_RETRY_ATTEMPTS"),
            DEFAULT_MAX_ATTEMPTS,
        )?;
        if max_attempts == 0 {
            return Err(ConfigError::Invalid {
                name: "TXN_RETRY_ATTEMPTS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        let timeout_secs = parse_or(
            "REQUEST_TIMEOUT_SECS",
            get("REQUEST_TIMEOUT_SECS"),
            DEFAULT_REQUEST_DEADLINE.as_secs(),
        )?;

        Ok(Self {
            database_url,
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or("PORT", get("PORT"), 3000)?,
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_format: parse_or("LOG_FORMAT", get("LOG_FORMAT"), LogFormat::default())?,
            retry_policy: RetryPolicy::new(max_attempts, Duration::from_secs(timeout_secs)),
            max_body_bytes: parse_or(
                "MAX_BODY_BYTES",
                get("MAX_BODY_BYTES"),
                DEFAULT_MAX_BODY_BYTES,
            )?,
            db_max_connections: parse_or(
                "DB_MAX_CONNECTIONS",
                get("DB_MAX_CONNECTIONS"),
                10,
            )?,
            run_migrations: parse_flag("RUN_MIGRATIONS", get("RUN_MIGRATIONS"), true)?,
        })
    }

    /// Address the server binds to
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T>(name: &str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name: name.to_string(),
            message: e.to_string(),
        }),
    }
}

fn parse_flag(name: &str, raw: Option<String>, default: bool) -> Result<bool, ConfigError> {
    match raw.as_deref().map(str::trim) {
        None => Ok(default),
        Some("true" | "1") => Ok(true),
        Some("false" | "0") => Ok(false),
        Some(other) => Err(ConfigError::Invalid {
            name: name.to_string(),
            message: format!("expected a boolean, got `{other}`"),
        }),
    }
}
