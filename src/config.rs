// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded once from the environment at startup by
//! [`AppConfig::from_env`]. Invalid values abort startup with a
//! [`ConfigError`].
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `SIWE_DOMAIN` | Domain sign-in messages must name | Unset (not checked) |
//! | `SESSION_SECRET` | HMAC key for session handles, at least 32 bytes | Random per process |
//! | `NONCE_TTL_SECS` | Sign-in nonce lifetime | `900` |
//! | `NONCE_CAPACITY` | Most sign-in nonces held at once | `100000` |
//! | `SESSION_TTL_SECS` | Session lifetime | `604800` |
//! | `APP_ENV` | `production` marks cookies `Secure` | `development` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use chrono::Duration;

use crate::auth::nonce::DEFAULT_NONCE_CAPACITY;
use crate::auth::session::{SessionSecret, SessionSecretError};

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const SIWE_DOMAIN_ENV: &str = "SIWE_DOMAIN";
pub const SESSION_SECRET_ENV: &str = "SESSION_SECRET";
pub const NONCE_TTL_ENV: &str = "NONCE_TTL_SECS";
pub const NONCE_CAPACITY_ENV: &str = "NONCE_CAPACITY";
pub const SESSION_TTL_ENV: &str = "SESSION_TTL_SECS";
pub const APP_ENV_ENV: &str = "APP_ENV";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_NONCE_TTL_SECS: i64 = 900;
const DEFAULT_SESSION_TTL_SECS: i64 = 604_800;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error("Failed to parse {0}: {1}")]
    ParseError(String, String),

    #[error("Invalid SESSION_SECRET: {0}")]
    SessionSecret(#[from] SessionSecretError),
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" | "local" | "test" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => Err(format!("expected 'json' or 'pretty', got '{other}'")),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// Expected message domain; `None` skips the domain check
    pub siwe_domain: Option<String>,
    pub session_secret: SessionSecret,
    /// Whether `SESSION_SECRET` was set (sessions survive restarts)
    pub session_secret_configured: bool,
    pub nonce_ttl: Duration,
    pub nonce_capacity: usize,
    pub session_ttl: Duration,
    pub environment: Environment,
    pub log_format: LogFormat,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("siwe_domain", &self.siwe_domain)
            .field("session_secret", &"[REDACTED]")
            .field("session_secret_configured", &self.session_secret_configured)
            .field("nonce_ttl", &self.nonce_ttl)
            .field("nonce_capacity", &self.nonce_capacity)
            .field("session_ttl", &self.session_ttl)
            .field("environment", &self.environment)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port: u16 = parse_or_default(&lookup, PORT_ENV, DEFAULT_PORT)?;
        let bind_addr = format!("{host}:{port}")
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::ParseError(HOST_ENV.to_string(), format!("{e}: {host}")))?;

        let siwe_domain = lookup(SIWE_DOMAIN_ENV)
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        let (session_secret, session_secret_configured) = match lookup(SESSION_SECRET_ENV) {
            Some(secret) if !secret.is_empty() => (SessionSecret::from_bytes(secret.as_bytes())?, true),
            _ => (SessionSecret::generate()?, false),
        };

        let nonce_ttl = parse_ttl(&lookup, NONCE_TTL_ENV, DEFAULT_NONCE_TTL_SECS)?;
        let session_ttl = parse_ttl(&lookup, SESSION_TTL_ENV, DEFAULT_SESSION_TTL_SECS)?;

        let nonce_capacity: usize =
            parse_or_default(&lookup, NONCE_CAPACITY_ENV, DEFAULT_NONCE_CAPACITY)?;
        if nonce_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                NONCE_CAPACITY_ENV.to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let environment = match lookup(APP_ENV_ENV) {
            Some(value) => value
                .parse()
                .map_err(|e| ConfigError::InvalidValue(APP_ENV_ENV.to_string(), e))?,
            None => Environment::default(),
        };

        let log_format = match lookup(LOG_FORMAT_ENV) {
            Some(value) => value
                .parse()
                .map_err(|e| ConfigError::InvalidValue(LOG_FORMAT_ENV.to_string(), e))?,
            None => LogFormat::default(),
        };

        Ok(Self {
            bind_addr,
            siwe_domain,
            session_secret,
            session_secret_configured,
            nonce_ttl,
            nonce_capacity,
            session_ttl,
            environment,
            log_format,
        })
    }

    /// Cookies carry the `Secure` attribute outside local development.
    pub fn secure_cookies(&self) -> bool {
        self.environment == Environment::Production
    }
}

fn parse_or_default<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(key) {
        Some(val) => val
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::ParseError(key.to_string(), format!("{e}: {val}"))),
        None => Ok(default),
    }
}

fn parse_ttl<F>(lookup: &F, key: &str, default_secs: i64) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let secs: i64 = parse_or_default(lookup, key, default_secs)?;
    if secs <= 0 {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            "must be a positive number of seconds".to_string(),
        ));
    }
    Duration::try_seconds(secs)
        .ok_or_else(|| ConfigError::InvalidValue(key.to_string(), "out of range".to_string()))
}
