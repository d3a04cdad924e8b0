// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Sign-in orchestration.
//!
//! [`AuthService`] drives a client context through
//! `Anonymous -> NonceIssued -> Authenticated -> Anonymous`:
//!
//! 1. [`AuthService::begin`] issues a nonce for the context.
//! 2. The wallet signs a [`SignInMessage`] embedding that nonce.
//! 3. [`AuthService::verify`] burns the nonce, checks the message and the
//!    signature, and returns a session handle.
//! 4. [`AuthService::current_session`] resolves the handle on later requests
//!    until [`AuthService::end`] revokes it.

use std::sync::Arc;

use super::clock::Clock;
use super::error::AuthError;
use super::message::SignInMessage;
use super::nonce::{Nonce, NonceStore};
use super::session::{SessionHandle, SessionInfo, SessionManager};
use super::signature::verify_signature;

pub struct AuthService {
    nonces: Arc<dyn NonceStore>,
    sessions: SessionManager,
    clock: Arc<dyn Clock>,
    /// Domain every message must name; `None` disables the check
    expected_domain: Option<String>,
}

impl AuthService {
    pub fn new(
        nonces: Arc<dyn NonceStore>,
        sessions: SessionManager,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            nonces,
            sessions,
            clock,
            expected_domain: None,
        }
    }

    /// Require messages to name `domain`.
    pub fn with_expected_domain(mut self, domain: impl Into<String>) -> Self {
        self.expected_domain = Some(domain.into());
        self
    }

    pub fn expected_domain(&self) -> Option<&str> {
        self.expected_domain.as_deref()
    }

    pub fn nonce_store(&self) -> &dyn NonceStore {
        self.nonces.as_ref()
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Issue a sign-in nonce for `client_context`.
    pub fn begin(&self, client_context: &str) -> Nonce {
        let nonce = self.nonces.issue(client_context);
        tracing::info!(expires_at = %nonce.expires_at, "Sign-in started");
        nonce
    }

    /// Complete a sign-in.
    ///
    /// The stored nonce for `client_context` is gone after this call whatever
    /// the outcome, so a failed attempt always requires a new
    /// [`begin`](Self::begin).
    pub fn verify(
        &self,
        client_context: &str,
        raw_message: &str,
        signature: &str,
    ) -> Result<SessionHandle, AuthError> {
        let result = self.verify_inner(client_context, raw_message, signature);
        if let Err(e) = &result {
            tracing::warn!(error_code = e.error_code(), reason = %detail(e), "Sign-in rejected");
        }
        result
    }

    fn verify_inner(
        &self,
        client_context: &str,
        raw_message: &str,
        signature: &str,
    ) -> Result<SessionHandle, AuthError> {
        let message: SignInMessage = match raw_message.parse() {
            Ok(message) => message,
            Err(e) => {
                self.nonces.invalidate(client_context);
                return Err(AuthError::from(e));
            }
        };

        self.nonces.consume(client_context, &message.nonce)?;

        message.check_validity(self.clock.now(), self.expected_domain.as_deref())?;

        verify_signature(&message.to_signing_bytes(), signature, &message.address)?;

        let handle = self.sessions.create(&message.address);
        tracing::info!(address = %message.address.to_lowercase(), chain_id = message.chain_id, "Sign-in verified");
        Ok(handle)
    }

    /// Resolve a session handle to the signed-in subject.
    pub fn current_session(&self, handle: &str) -> Result<SessionInfo, AuthError> {
        Ok(self.sessions.validate(handle)?)
    }

    /// Sign out. Unknown handles are ignored.
    pub fn end(&self, handle: &str) {
        self.sessions.destroy(handle);
    }
}

/// Underlying cause, for logs only.
fn detail(error: &AuthError) -> String {
    std::error::Error::source(error)
        .map(ToString::to_string)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::clock::FakeClock;
    use crate::auth::error::{MessageError, NonceError, SessionError, SignatureError, ValidityError};
    use crate::auth::nonce::InMemoryNonceStore;
    use crate::auth::session::SessionSecret;
    use crate::auth::signature::tests::{sign, test_signer, TEST_ADDRESS};
    use chrono::{Duration, TimeZone, Utc};

    const CTX: &str = "client-1";

    fn service() -> (AuthService, Arc<FakeClock>) {
        let clock = Arc::new(FakeClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        ));
        let nonces = Arc::new(InMemoryNonceStore::new(clock.clone()));
        let sessions =
            SessionManager::new(SessionSecret::from_bytes(&[3u8; 32]).unwrap(), clock.clone());
        (AuthService::new(nonces, sessions, clock.clone()), clock)
    }

    fn message(nonce: &str, clock: &FakeClock) -> SignInMessage {
        SignInMessage::new(
            "app.example.com",
            TEST_ADDRESS,
            "Sign in to the wallet.",
            "https://app.example.com/login",
            1,
            nonce,
            clock.now(),
        )
        .unwrap()
    }

    fn signed(message: &SignInMessage) -> (String, String) {
        let text = message.to_string();
        let signature = sign(&test_signer(), text.as_bytes());
        (text, signature)
    }

    #[test]
    fn sign_in_round_trip() {
        let (service, clock) = service();
        let nonce = service.begin(CTX);
        let (text, signature) = signed(&message(&nonce.value, &clock));

        let handle = service.verify(CTX, &text, &signature).unwrap();
        assert_eq!(handle.expires_at(), clock.now() + Duration::days(7));

        let session = service.current_session(handle.as_str()).unwrap();
        assert_eq!(session.subject_address, TEST_ADDRESS.to_lowercase());

        service.end(handle.as_str());
        assert_eq!(
            service.current_session(handle.as_str()).unwrap_err(),
            AuthError::BadSession(SessionError::Invalid)
        );
    }

    #[test]
    fn nonce_cannot_be_replayed() {
        let (service, clock) = service();
        let nonce = service.begin(CTX);
        let (text, signature) = signed(&message(&nonce.value, &clock));

        service.verify(CTX, &text, &signature).unwrap();
        assert_eq!(
            service.verify(CTX, &text, &signature).unwrap_err(),
            AuthError::BadNonce(NonceError::NotFound)
        );
    }

    #[test]
    fn wrong_signature_burns_nonce() {
        let (service, clock) = service();
        let nonce = service.begin(CTX);
        let msg = message(&nonce.value, &clock);
        let other: alloy::signers::local::PrivateKeySigner =
            "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d"
                .parse()
                .unwrap();
        let bad_signature = sign(&other, msg.to_string().as_bytes());

        let err = service
            .verify(CTX, &msg.to_string(), &bad_signature)
            .unwrap_err();
        assert!(matches!(
            err,
            AuthError::BadSignature(SignatureError::AddressMismatch { .. })
        ));
        assert_eq!(service.nonce_store().live_count(), 0);

        let (text, signature) = signed(&msg);
        assert_eq!(
            service.verify(CTX, &text, &signature).unwrap_err(),
            AuthError::BadNonce(NonceError::NotFound)
        );
    }

    #[test]
    fn tampered_message_is_bad_signature() {
        let (service, clock) = service();
        let nonce = service.begin(CTX);
        let (text, signature) = signed(&message(&nonce.value, &clock));
        let tampered = text.replace("Chain ID: 1", "Chain ID: 137");

        assert!(matches!(
            service.verify(CTX, &tampered, &signature).unwrap_err(),
            AuthError::BadSignature(SignatureError::AddressMismatch { .. })
        ));
    }

    #[test]
    fn second_begin_invalidates_first_nonce() {
        let (service, clock) = service();
        let first = service.begin(CTX);
        let _second = service.begin(CTX);
        let (text, signature) = signed(&message(&first.value, &clock));

        assert_eq!(
            service.verify(CTX, &text, &signature).unwrap_err(),
            AuthError::BadNonce(NonceError::Mismatch)
        );
    }

    #[test]
    fn expired_nonce_is_bad_nonce() {
        let (service, clock) = service();
        let nonce = service.begin(CTX);
        let (text, signature) = signed(&message(&nonce.value, &clock));
        clock.advance(Duration::minutes(16));

        assert_eq!(
            service.verify(CTX, &text, &signature).unwrap_err(),
            AuthError::BadNonce(NonceError::Expired)
        );
    }

    #[test]
    fn unknown_context_is_bad_nonce() {
        let (service, clock) = service();
        let nonce = service.begin(CTX);
        let (text, signature) = signed(&message(&nonce.value, &clock));

        assert_eq!(
            service.verify("other", &text, &signature).unwrap_err(),
            AuthError::BadNonce(NonceError::NotFound)
        );
    }

    #[test]
    fn malformed_message_is_bad_message() {
        let (service, _) = service();
        service.begin(CTX);

        let err = service.verify(CTX, "hello", "0x00").unwrap_err();
        assert!(matches!(err, AuthError::BadMessage(MessageError::Parse(_))));
        assert_eq!(err.error_code(), "bad_message");
    }

    #[test]
    fn malformed_message_burns_nonce() {
        let (service, clock) = service();
        let nonce = service.begin(CTX);

        assert!(matches!(
            service.verify(CTX, "garbage", "0x00").unwrap_err(),
            AuthError::BadMessage(MessageError::Parse(_))
        ));
        assert_eq!(service.nonce_store().live_count(), 0);

        let (text, signature) = signed(&message(&nonce.value, &clock));
        assert_eq!(
            service.verify(CTX, &text, &signature).unwrap_err(),
            AuthError::BadNonce(NonceError::NotFound)
        );
    }

    #[test]
    fn expired_message_is_bad_message() {
        let (service, clock) = service();
        let nonce = service.begin(CTX);
        let msg = message(&nonce.value, &clock).with_expiration_time(clock.now());
        let (text, signature) = signed(&msg);

        assert_eq!(
            service.verify(CTX, &text, &signature).unwrap_err(),
            AuthError::BadMessage(MessageError::Validity(ValidityError::Expired))
        );
    }

    #[test]
    fn domain_binding_is_enforced() {
        let (service, clock) = service();
        let service = service.with_expected_domain("wallet.example.org");
        let nonce = service.begin(CTX);
        let (text, signature) = signed(&message(&nonce.value, &clock));

        assert!(matches!(
            service.verify(CTX, &text, &signature).unwrap_err(),
            AuthError::BadMessage(MessageError::Validity(
                ValidityError::DomainMismatch { .. }
            ))
        ));
    }

    #[test]
    fn expired_session_is_bad_session() {
        let (service, clock) = service();
        let nonce = service.begin(CTX);
        let (text, signature) = signed(&message(&nonce.value, &clock));
        let handle = service.verify(CTX, &text, &signature).unwrap();

        clock.advance(Duration::days(7) + Duration::seconds(1));
        assert_eq!(
            service.current_session(handle.as_str()).unwrap_err(),
            AuthError::BadSession(SessionError::Expired)
        );
    }
}
