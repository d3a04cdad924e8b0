// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Sign-in endpoints.
//!
//! The nonce is bound to a random client context id kept in the
//! `siwe-nonce` cookie. A successful verification replaces it with the
//! `siwe-session` cookie.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use uuid::Uuid;

use super::cookies::{read_cookie, NONCE_COOKIE_NAME, SESSION_COOKIE_NAME};
use crate::auth::{error::NonceError, extractor::session_handle, AuthError};
use crate::error::ApiError;
use crate::models::{NonceResponse, SessionResponse, VerifyRequest, VerifyResponse};
use crate::state::AppState;

/// Issue a sign-in nonce.
///
/// Starts a new sign-in for this client; any nonce issued earlier to the same
/// client context stops being accepted. A request that already carries a
/// `siwe-nonce` context keeps it.
#[utoipa::path(
    get,
    path = "/v1/auth/nonce",
    tag = "Auth",
    responses(
        (status = 200, description = "Nonce issued; `siwe-nonce` cookie set", body = NonceResponse),
    )
)]
pub async fn get_nonce(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let client_context = read_cookie(&headers, NONCE_COOKIE_NAME)
        .and_then(|value| Uuid::parse_str(&value).ok())
        .unwrap_or_else(Uuid::new_v4)
        .to_string();
    let nonce = state.auth.begin(&client_context);

    let cookie = state
        .cookies
        .nonce_cookie(&client_context)
        .map_err(|e| ApiError::internal(format!("Failed to build cookie: {e}")))?;

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, cookie);
    Ok((headers, Json(NonceResponse { nonce: nonce.value })).into_response())
}

/// Verify a signed sign-in message.
///
/// The nonce cookie is cleared whatever the outcome; a failed attempt needs
/// a new nonce.
#[utoipa::path(
    post,
    path = "/v1/auth/verify",
    tag = "Auth",
    request_body = VerifyRequest,
    responses(
        (status = 200, description = "Signed in; `siwe-session` cookie set", body = VerifyResponse),
        (status = 400, description = "Malformed request or sign-in message"),
        (status = 401, description = "Nonce or signature rejected"),
    )
)]
pub async fn verify(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<VerifyRequest>, JsonRejection>,
) -> Response {
    let mut response = match complete_sign_in(&state, &headers, body) {
        Ok(response) => response,
        Err(err) => err.into_response(),
    };

    match state.cookies.clear(NONCE_COOKIE_NAME) {
        Ok(cookie) => {
            response.headers_mut().append(SET_COOKIE, cookie);
        }
        Err(e) => tracing::error!(error = %e, "Failed to build nonce cookie"),
    }
    response
}

fn complete_sign_in(
    state: &AppState,
    headers: &HeaderMap,
    body: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = body.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;

    let client_context =
        read_cookie(headers, NONCE_COOKIE_NAME).ok_or(AuthError::from(NonceError::NotFound))?;

    let handle = state
        .auth
        .verify(&client_context, &request.message, &request.signature)?;
    let session = state.auth.current_session(handle.as_str())?;

    let cookie = state
        .cookies
        .session_cookie(handle.as_str())
        .map_err(|e| ApiError::internal(format!("Failed to build cookie: {e}")))?;

    let mut response_headers = HeaderMap::new();
    response_headers.insert(SET_COOKIE, cookie);
    let body = VerifyResponse {
        address: session.subject_address.into(),
        expires_at: handle.expires_at(),
    };
    Ok((response_headers, Json(body)).into_response())
}

/// Current session state.
///
/// Never fails: a missing, expired or ended session reads as anonymous, and
/// a session cookie that no longer validates is cleared.
#[utoipa::path(
    get,
    path = "/v1/auth/session",
    tag = "Auth",
    responses(
        (status = 200, description = "Session state", body = SessionResponse),
    )
)]
pub async fn get_session(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(handle) = session_handle(&headers) else {
        return Json(SessionResponse::anonymous()).into_response();
    };

    match state.auth.current_session(&handle) {
        Ok(session) => Json(SessionResponse {
            authenticated: true,
            address: Some(session.subject_address.into()),
            expires_at: Some(session.expires_at),
        })
        .into_response(),
        Err(_) => {
            let mut response = Json(SessionResponse::anonymous()).into_response();
            if read_cookie(&headers, SESSION_COOKIE_NAME).is_some() {
                match state.cookies.clear(SESSION_COOKIE_NAME) {
                    Ok(cookie) => {
                        response.headers_mut().append(SET_COOKIE, cookie);
                    }
                    Err(e) => tracing::error!(error = %e, "Failed to build session cookie"),
                }
            }
            response
        }
    }
}

/// Sign out.
///
/// Ends the session (if any) and clears the session cookie.
#[utoipa::path(
    post,
    path = "/v1/auth/signout",
    tag = "Auth",
    responses(
        (status = 204, description = "Signed out; `siwe-session` cookie cleared"),
    )
)]
pub async fn sign_out(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<(StatusCode, HeaderMap), ApiError> {
    if let Some(handle) = session_handle(&headers) {
        state.auth.end(&handle);
    }

    let cookie = state
        .cookies
        .clear(SESSION_COOKIE_NAME)
        .map_err(|e| ApiError::internal(format!("Failed to build cookie: {e}")))?;

    let mut response_headers = HeaderMap::new();
    response_headers.insert(SET_COOKIE, cookie);
    Ok((StatusCode::NO_CONTENT, response_headers))
}
