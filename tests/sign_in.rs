// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! End-to-end sign-in through the library API.

use std::sync::Arc;

use alloy::{
    hex,
    signers::{local::PrivateKeySigner, SignerSync},
};
use chrono::{Duration, TimeZone, Utc};

use wallet_signin::auth::{
    clock::{Clock, FakeClock},
    error::{NonceError, SessionError},
    nonce::InMemoryNonceStore,
    session::{SessionManager, SessionSecret},
    AuthError, AuthService, SignInMessage,
};

const CLIENT: &str = "browser-tab-1";

fn service() -> (AuthService, Arc<FakeClock>) {
    let clock = Arc::new(FakeClock::new(
        Utc.with_ymd_and_hms(2025, 1, 15, 9, 30, 0).unwrap(),
    ));
    let sessions = SessionManager::new(
        SessionSecret::from_bytes(b"integration-test-secret-0123456789").unwrap(),
        clock.clone(),
    );
    let service = AuthService::new(
        Arc::new(InMemoryNonceStore::new(clock.clone())),
        sessions,
        clock.clone(),
    )
    .with_expected_domain("wallet.example.com");
    (service, clock)
}

/// Development account #2 (`anvil` / `hardhat`).
fn wallet() -> PrivateKeySigner {
    "0x5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a"
        .parse()
        .unwrap()
}

fn sign_in_text(wallet: &PrivateKeySigner, nonce: &str, clock: &FakeClock) -> String {
    SignInMessage::new(
        "wallet.example.com",
        wallet.address().to_checksum(None),
        "Sign in to Relational Wallet.",
        "https://wallet.example.com/login",
        43114,
        nonce,
        clock.now(),
    )
    .unwrap()
    .with_expiration_time(clock.now() + Duration::minutes(10))
    .with_resource("https://wallet.example.com/terms")
    .unwrap()
    .to_string()
}

fn personal_sign(wallet: &PrivateKeySigner, text: &str) -> String {
    let signature = wallet.sign_message_sync(text.as_bytes()).unwrap();
    hex::encode_prefixed(signature.as_bytes())
}

#[test]
fn begin_sign_verify_session_end() {
    let (service, clock) = service();
    let wallet = wallet();

    let nonce = service.begin(CLIENT);
    let text = sign_in_text(&wallet, &nonce.value, &clock);
    let signature = personal_sign(&wallet, &text);

    let handle = service.verify(CLIENT, &text, &signature).unwrap();
    let session = service.current_session(handle.as_str()).unwrap();
    assert_eq!(
        session.subject_address,
        wallet.address().to_string().to_lowercase()
    );
    assert_eq!(session.expires_at, clock.now() + Duration::days(7));

    service.end(handle.as_str());
    assert_eq!(
        service.current_session(handle.as_str()).unwrap_err(),
        AuthError::BadSession(SessionError::Invalid)
    );
}

#[test]
fn parsed_message_round_trips() {
    let (_, clock) = service();
    let text = sign_in_text(&wallet(), "abcdef0123456789", &clock);

    let parsed: SignInMessage = text.parse().unwrap();
    assert_eq!(parsed.to_string(), text);
    assert_eq!(parsed.chain_id, 43114);
    assert_eq!(parsed.resources, vec!["https://wallet.example.com/terms"]);
}

#[test]
fn stale_nonce_requires_a_new_sign_in() {
    let (service, clock) = service();
    let wallet = wallet();

    let nonce = service.begin(CLIENT);
    let text = sign_in_text(&wallet, &nonce.value, &clock);
    let signature = personal_sign(&wallet, &text);

    clock.advance(Duration::minutes(15));
    assert_eq!(
        service.verify(CLIENT, &text, &signature).unwrap_err(),
        AuthError::BadNonce(NonceError::Expired)
    );

    let nonce = service.begin(CLIENT);
    let text = sign_in_text(&wallet, &nonce.value, &clock);
    let signature = personal_sign(&wallet, &text);
    assert!(service.verify(CLIENT, &text, &signature).is_ok());
}

#[test]
fn session_expires_after_a_week() {
    let (service, clock) = service();
    let wallet = wallet();

    let nonce = service.begin(CLIENT);
    let text = sign_in_text(&wallet, &nonce.value, &clock);
    let handle = service
        .verify(CLIENT, &text, &personal_sign(&wallet, &text))
        .unwrap();

    clock.advance(Duration::days(6));
    assert!(service.current_session(handle.as_str()).is_ok());

    clock.advance(Duration::days(1));
    assert_eq!(
        service.current_session(handle.as_str()).unwrap_err(),
        AuthError::BadSession(SessionError::Expired)
    );
}
