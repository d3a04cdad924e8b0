// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::api::cookies::CookiePolicy;
use crate::auth::{
    clock::{Clock, SystemClock},
    nonce::InMemoryNonceStore,
    session::SessionManager,
    AuthService,
};
use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub cookies: CookiePolicy,
}

impl AppState {
    pub fn new(auth: AuthService, cookies: CookiePolicy) -> Self {
        Self {
            auth: Arc::new(auth),
            cookies,
        }
    }

    /// Wire the in-memory stores and the wall clock from configuration.
    pub fn from_config(config: &AppConfig) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let nonces = Arc::new(
            InMemoryNonceStore::with_ttl(clock.clone(), config.nonce_ttl)
                .with_capacity(config.nonce_capacity),
        );
        let sessions =
            SessionManager::with_ttl(config.session_secret.clone(), clock.clone(), config.session_ttl);

        let mut auth = AuthService::new(nonces, sessions, clock);
        if let Some(domain) = &config.siwe_domain {
            auth = auth.with_expected_domain(domain.clone());
        }

        Self::new(auth, CookiePolicy::from_config(config))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::{clock::FakeClock, session::SessionSecret};
    use chrono::{TimeZone, Utc};

    /// State over a fake clock, a fixed session key and no domain check.
    pub(crate) fn test_state() -> (AppState, Arc<FakeClock>) {
        let clock = Arc::new(FakeClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        ));
        let nonces = Arc::new(InMemoryNonceStore::new(clock.clone()));
        let sessions = SessionManager::new(
            SessionSecret::from_bytes(&[5u8; 32]).unwrap(),
            clock.clone(),
        );
        let auth = AuthService::new(nonces, sessions, clock.clone());
        (AppState::new(auth, CookiePolicy::default()), clock)
    }

    #[test]
    fn from_config_applies_domain_and_ttls() {
        let config = AppConfig::from_lookup(|key| match key {
            "SIWE_DOMAIN" => Some("app.example.com".to_string()),
            "NONCE_TTL_SECS" => Some("60".to_string()),
            "APP_ENV" => Some("production".to_string()),
            _ => None,
        })
        .unwrap();

        let state = AppState::from_config(&config);
        assert_eq!(state.auth.expected_domain(), Some("app.example.com"));
        assert!(state.cookies.secure);
        assert_eq!(state.cookies.nonce_max_age.num_seconds(), 60);
    }
}
