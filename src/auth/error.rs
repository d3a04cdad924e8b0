// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.
//!
//! Each component has its own closed error enum. The orchestrator folds them
//! into [`AuthError`], which keeps the cause as its `source()` but only shows
//! callers a stable error code and a message class.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Nonce store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NonceError {
    #[error("no live nonce for this client")]
    NotFound,
    #[error("nonce has expired")]
    Expired,
    #[error("nonce does not match the issued value")]
    Mismatch,
}

/// Sign-in message codec failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("malformed sign-in message: {0}")]
    Malformed(String),
    #[error("unsupported message version: {0}")]
    UnsupportedVersion(String),
}

/// Time window and domain binding failures of a parsed message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidityError {
    #[error("message has expired")]
    Expired,
    #[error("message is not yet valid")]
    NotYetValid,
    #[error("message domain {found} does not match {expected}")]
    DomainMismatch { expected: String, found: String },
}

/// Signature recovery failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("signature recovery failed: {0}")]
    RecoveryFailed(String),
    #[error("signature was produced by {recovered}, not {expected}")]
    AddressMismatch { expected: String, recovered: String },
}

/// Session handle failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("session handle is invalid")]
    Invalid,
    #[error("session has expired")]
    Expired,
}

/// Why a message was rejected before its signature was checked.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessageError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Validity(#[from] ValidityError),
}

/// Authentication error type returned by [`AuthService`](super::AuthService).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Message could not be parsed or is outside its validity window
    #[error("Sign-in message is invalid")]
    BadMessage(#[source] MessageError),
    /// Nonce missing, expired, or not the one issued to this client
    #[error("Sign-in nonce is invalid or expired")]
    BadNonce(#[source] NonceError),
    /// Signature does not recover to the claimed address
    #[error("Signature is invalid")]
    BadSignature(#[source] SignatureError),
    /// Session handle is missing, tampered with, ended or expired
    #[error("Session is invalid or expired")]
    BadSession(#[source] SessionError),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::BadMessage(_) => "bad_message",
            AuthError::BadNonce(_) => "bad_nonce",
            AuthError::BadSignature(_) => "bad_signature",
            AuthError::BadSession(_) => "bad_session",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::BadMessage(_) => StatusCode::BAD_REQUEST,
            AuthError::BadNonce(_) | AuthError::BadSignature(_) | AuthError::BadSession(_) => {
                StatusCode::UNAUTHORIZED
            }
        }
    }
}

impl From<MessageError> for AuthError {
    fn from(e: MessageError) -> Self {
        AuthError::BadMessage(e)
    }
}

impl From<ParseError> for AuthError {
    fn from(e: ParseError) -> Self {
        AuthError::BadMessage(e.into())
    }
}

impl From<ValidityError> for AuthError {
    fn from(e: ValidityError) -> Self {
        AuthError::BadMessage(e.into())
    }
}

impl From<NonceError> for AuthError {
    fn from(e: NonceError) -> Self {
        AuthError::BadNonce(e)
    }
}

impl From<SignatureError> for AuthError {
    fn from(e: SignatureError) -> Self {
        AuthError::BadSignature(e)
    }
}

impl From<SessionError> for AuthError {
    fn from(e: SessionError) -> Self {
        AuthError::BadSession(e)
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}
