// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for signed-in wallets.
//!
//! Use the `SessionUser` extractor in handlers to require a session:
//!
//! ```rust,ignore
//! async fn my_handler(SessionUser(session): SessionUser) -> impl IntoResponse {
//!     // session.subject_address is the signed-in wallet
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};

use super::error::SessionError;
use super::session::SessionInfo;
use super::AuthError;
use crate::api::cookies::{read_cookie, SESSION_COOKIE_NAME};
use crate::state::AppState;

/// Extractor for a valid session.
///
/// The handle is read from the `siwe-session` cookie, falling back to an
/// `Authorization: Bearer <handle>` header for non-browser clients.
pub struct SessionUser(pub SessionInfo);

impl FromRequestParts<AppState> for SessionUser {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(session) = parts.extensions.get::<SessionInfo>().cloned() {
            return Ok(SessionUser(session));
        }

        let handle = session_handle(&parts.headers).ok_or(SessionError::Invalid)?;
        let session = state.auth.current_session(&handle)?;

        parts.extensions.insert(session.clone());
        Ok(SessionUser(session))
    }
}

/// Session handle carried by a request, cookie first.
pub fn session_handle(headers: &HeaderMap) -> Option<String> {
    read_cookie(headers, SESSION_COOKIE_NAME).or_else(|| bearer_token(headers))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))?
        .trim();
    (!token.is_empty()).then(|| token.to_string())
}
