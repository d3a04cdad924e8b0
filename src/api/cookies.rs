// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Sign-in cookies.
//!
//! | Cookie | Value | Max-Age |
//! |--------|-------|---------|
//! | `siwe-nonce` | Client context id the nonce is stored under | nonce TTL (900s) |
//! | `siwe-session` | Signed session handle | session TTL (604800s) |
//!
//! Both are `HttpOnly; SameSite=Lax; Path=/`, and `Secure` in production.

use axum::http::{
    header::{InvalidHeaderValue, COOKIE},
    HeaderMap, HeaderValue,
};
use chrono::Duration;

use crate::config::AppConfig;

pub const NONCE_COOKIE_NAME: &str = "siwe-nonce";
pub const SESSION_COOKIE_NAME: &str = "siwe-session";

/// Cookie attributes derived from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookiePolicy {
    pub secure: bool,
    pub nonce_max_age: Duration,
    pub session_max_age: Duration,
}

impl CookiePolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            secure: config.secure_cookies(),
            nonce_max_age: config.nonce_ttl,
            session_max_age: config.session_ttl,
        }
    }

    pub fn nonce_cookie(&self, client_context: &str) -> Result<HeaderValue, InvalidHeaderValue> {
        self.build(NONCE_COOKIE_NAME, client_context, self.nonce_max_age.num_seconds())
    }

    pub fn session_cookie(&self, handle: &str) -> Result<HeaderValue, InvalidHeaderValue> {
        self.build(SESSION_COOKIE_NAME, handle, self.session_max_age.num_seconds())
    }

    /// Expire `name` on the client.
    pub fn clear(&self, name: &str) -> Result<HeaderValue, InvalidHeaderValue> {
        self.build(name, "", 0)
    }

    fn build(&self, name: &str, value: &str, max_age: i64) -> Result<HeaderValue, InvalidHeaderValue> {
        let mut cookie = format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}");
        if self.secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie)
    }
}

impl Default for CookiePolicy {
    fn default() -> Self {
        Self {
            secure: false,
            nonce_max_age: crate::auth::nonce::DEFAULT_NONCE_TTL,
            session_max_age: crate::auth::session::DEFAULT_SESSION_TTL,
        }
    }
}

/// Value of cookie `name` from the request headers. Empty values count as absent.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, val)| val.trim().to_string())
        .filter(|val| !val.is_empty())
}
