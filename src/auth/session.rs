// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signed session handles.
//!
//! A handle is `base64url(claims JSON) "." base64url(HMAC-SHA256(claims))`.
//! The claims carry a random session id, the lower-cased subject address and
//! the issue/expiry instants, so validation needs no server-side lookup
//! beyond the revocation list filled by [`SessionManager::destroy`].

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

use super::clock::Clock;
use super::error::SessionError;

type HmacSha256 = Hmac<Sha256>;

/// Default session lifetime (7 days).
pub const DEFAULT_SESSION_TTL: Duration = Duration::days(7);

/// Minimum accepted HMAC key length in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Errors building a [`SessionSecret`].
#[derive(Debug, thiserror::Error)]
pub enum SessionSecretError {
    #[error("session secret must be at least 32 bytes, got {0}")]
    TooShort(usize),
    #[error("system RNG unavailable")]
    Rng,
}

/// HMAC key used to sign session handles.
#[derive(Clone)]
pub struct SessionSecret {
    mac: HmacSha256,
}

impl SessionSecret {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SessionSecretError> {
        if bytes.len() < MIN_SECRET_LEN {
            return Err(SessionSecretError::TooShort(bytes.len()));
        }
        let mac = HmacSha256::new_from_slice(bytes)
            .map_err(|_| SessionSecretError::TooShort(bytes.len()))?;
        Ok(Self { mac })
    }

    /// Random per-process secret. Handles do not survive a restart.
    pub fn generate() -> Result<Self, SessionSecretError> {
        let mut bytes = [0u8; MIN_SECRET_LEN];
        SystemRandom::new()
            .fill(&mut bytes)
            .map_err(|_| SessionSecretError::Rng)?;
        Self::from_bytes(&bytes)
    }

    fn sign(&self, payload: &[u8]) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }

    fn verify(&self, payload: &[u8], tag: &[u8]) -> bool {
        let mut mac = self.mac.clone();
        mac.update(payload);
        mac.verify_slice(tag).is_ok()
    }
}

impl fmt::Debug for SessionSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionSecret(<redacted>)")
    }
}

/// Claims signed into a handle.
#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    /// Session ID
    sid: Uuid,
    /// Subject address, lower-case hex
    sub: String,
    /// Issued at (Unix seconds)
    iat: i64,
    /// Expiration (Unix seconds)
    exp: i64,
}

/// Opaque handle given to the transport layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    value: String,
    expires_at: DateTime<Utc>,
}

impl SessionHandle {
    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn into_string(self) -> String {
        self.value
    }
}

/// An authenticated subject, as recovered from a valid handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub subject_address: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Issues, validates and revokes session handles.
pub struct SessionManager {
    secret: SessionSecret,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    /// Destroyed session ids, kept until their natural expiry
    revoked: Mutex<HashMap<Uuid, DateTime<Utc>>>,
}

impl SessionManager {
    pub fn new(secret: SessionSecret, clock: Arc<dyn Clock>) -> Self {
        Self::with_ttl(secret, clock, DEFAULT_SESSION_TTL)
    }

    pub fn with_ttl(secret: SessionSecret, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            secret,
            ttl,
            clock,
            revoked: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a handle bound to `subject_address`.
    pub fn create(&self, subject_address: &str) -> SessionHandle {
        let now = self.clock.now();
        let expires_at = now + self.ttl;
        let claims = SessionClaims {
            sid: Uuid::new_v4(),
            sub: subject_address.to_lowercase(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        // Serializing a struct of plain fields cannot fail.
        let payload = serde_json::to_vec(&claims).unwrap_or_default();
        let tag = self.secret.sign(&payload);
        let value = format!(
            "{}.{}",
            Base64UrlUnpadded::encode_string(&payload),
            Base64UrlUnpadded::encode_string(&tag)
        );

        tracing::info!(session_id = %claims.sid, address = %claims.sub, "Session created");

        SessionHandle {
            value,
            expires_at: DateTime::from_timestamp(claims.exp, 0).unwrap_or(expires_at),
        }
    }

    /// Authenticate `handle` and return the session it encodes.
    pub fn validate(&self, handle: &str) -> Result<SessionInfo, SessionError> {
        let claims = self.decode(handle)?;

        let revoked = self
            .revoked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&claims.sid);
        if revoked {
            return Err(SessionError::Invalid);
        }

        if claims.exp <= self.clock.now().timestamp() {
            return Err(SessionError::Expired);
        }

        let created_at = DateTime::from_timestamp(claims.iat, 0).ok_or(SessionError::Invalid)?;
        let expires_at = DateTime::from_timestamp(claims.exp, 0).ok_or(SessionError::Invalid)?;

        Ok(SessionInfo {
            subject_address: claims.sub,
            created_at,
            expires_at,
        })
    }

    /// Revoke `handle`. Unknown, tampered and already revoked handles are ignored.
    pub fn destroy(&self, handle: &str) {
        let Ok(claims) = self.decode(handle) else {
            return;
        };
        let Some(expires_at) = DateTime::from_timestamp(claims.exp, 0) else {
            return;
        };

        let now = self.clock.now();
        let mut revoked = self.revoked.lock().unwrap_or_else(PoisonError::into_inner);
        revoked.retain(|_, exp| *exp > now);
        if expires_at > now {
            revoked.insert(claims.sid, expires_at);
        }

        tracing::info!(session_id = %claims.sid, address = %claims.sub, "Session ended");
    }

    fn decode(&self, handle: &str) -> Result<SessionClaims, SessionError> {
        let (payload, tag) = handle.trim().split_once('.').ok_or(SessionError::Invalid)?;
        let payload = Base64UrlUnpadded::decode_vec(payload).map_err(|_| SessionError::Invalid)?;
        let tag = Base64UrlUnpadded::decode_vec(tag).map_err(|_| SessionError::Invalid)?;

        if !self.secret.verify(&payload, &tag) {
            return Err(SessionError::Invalid);
        }

        serde_json::from_slice(&payload).map_err(|_| SessionError::Invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::clock::FakeClock;
    use chrono::TimeZone;

    const ADDRESS: &str = "0xF39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    fn manager() -> (SessionManager, Arc<FakeClock>) {
        let clock = Arc::new(FakeClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        ));
        let secret = SessionSecret::from_bytes(&[7u8; 32]).unwrap();
        (SessionManager::new(secret, clock.clone()), clock)
    }

    #[test]
    fn secret_must_be_long_enough() {
        assert!(matches!(
            SessionSecret::from_bytes(b"short"),
            Err(SessionSecretError::TooShort(5))
        ));
        assert!(SessionSecret::generate().is_ok());
    }

    #[test]
    fn secret_debug_is_redacted() {
        let secret = SessionSecret::from_bytes(&[1u8; 32]).unwrap();
        assert_eq!(format!("{secret:?}"), "SessionSecret(<redacted>)");
    }

    #[test]
    fn create_then_validate() {
        let (manager, clock) = manager();
        let handle = manager.create(ADDRESS);
        assert_eq!(handle.expires_at(), clock.now() + Duration::days(7));

        let session = manager.validate(handle.as_str()).unwrap();
        assert_eq!(session.subject_address, ADDRESS.to_lowercase());
        assert_eq!(session.created_at, clock.now());
        assert_eq!(session.expires_at, handle.expires_at());
    }

    #[test]
    fn expired_handle_is_rejected() {
        let (manager, clock) = manager();
        let handle = manager.create(ADDRESS);
        clock.advance(Duration::days(7));

        assert_eq!(
            manager.validate(handle.as_str()).unwrap_err(),
            SessionError::Expired
        );
    }

    #[test]
    fn tampered_handle_is_invalid() {
        let (manager, _) = manager();
        let handle = manager.create(ADDRESS).into_string();
        let (payload, tag) = handle.split_once('.').unwrap();

        let forged_claims = format!(
            r#"{{"sid":"{}","sub":"0x0000000000000000000000000000000000000001","iat":0,"exp":99999999999}}"#,
            Uuid::new_v4()
        );
        let forged = format!(
            "{}.{}",
            Base64UrlUnpadded::encode_string(forged_claims.as_bytes()),
            tag
        );
        assert_eq!(manager.validate(&forged).unwrap_err(), SessionError::Invalid);

        let truncated = format!("{payload}.{}", &tag[..tag.len() - 2]);
        assert_eq!(
            manager.validate(&truncated).unwrap_err(),
            SessionError::Invalid
        );
        assert_eq!(manager.validate("garbage").unwrap_err(), SessionError::Invalid);
    }

    #[test]
    fn handle_from_other_secret_is_invalid() {
        let (manager, clock) = manager();
        let other = SessionManager::new(SessionSecret::from_bytes(&[9u8; 32]).unwrap(), clock);
        let handle = other.create(ADDRESS);

        assert_eq!(
            manager.validate(handle.as_str()).unwrap_err(),
            SessionError::Invalid
        );
    }

    #[test]
    fn destroyed_handle_is_invalid() {
        let (manager, _) = manager();
        let handle = manager.create(ADDRESS);
        let other = manager.create(ADDRESS);

        manager.destroy(handle.as_str());
        assert_eq!(
            manager.validate(handle.as_str()).unwrap_err(),
            SessionError::Invalid
        );
        assert!(manager.validate(other.as_str()).is_ok());
    }

    #[test]
    fn destroy_is_idempotent() {
        let (manager, _) = manager();
        let handle = manager.create(ADDRESS);

        manager.destroy(handle.as_str());
        manager.destroy(handle.as_str());
        manager.destroy("not-a-handle");

        assert_eq!(
            manager.validate(handle.as_str()).unwrap_err(),
            SessionError::Invalid
        );
    }

    #[test]
    fn revocations_are_pruned_after_expiry() {
        let (manager, clock) = manager();
        let old = manager.create(ADDRESS);
        manager.destroy(old.as_str());

        clock.advance(Duration::days(8));
        let fresh = manager.create(ADDRESS);
        manager.destroy(fresh.as_str());

        assert_eq!(manager.revoked.lock().unwrap().len(), 1);
    }
}
