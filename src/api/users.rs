// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User endpoints.

use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::{session::SessionInfo, SessionUser};
use crate::models::WalletAddress;

/// Response for GET /v1/users/me
#[derive(Debug, Serialize, ToSchema)]
pub struct UserMeResponse {
    /// Signed-in wallet address (lower-case)
    pub address: WalletAddress,
    /// When the session started
    pub signed_in_at: DateTime<Utc>,
    /// When the session expires
    pub expires_at: DateTime<Utc>,
}

impl From<SessionInfo> for UserMeResponse {
    fn from(session: SessionInfo) -> Self {
        Self {
            address: session.subject_address.into(),
            signed_in_at: session.created_at,
            expires_at: session.expires_at,
        }
    }
}

/// Get the signed-in wallet.
#[utoipa::path(
    get,
    path = "/v1/users/me",
    tag = "Users",
    security(("session" = [])),
    responses(
        (status = 200, description = "User information", body = UserMeResponse),
        (status = 401, description = "Unauthorized - missing, invalid or expired session"),
    )
)]
pub async fn get_current_user(SessionUser(session): SessionUser) -> Json<UserMeResponse> {
    Json(session.into())
}
