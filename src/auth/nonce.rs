// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Single-use sign-in nonces.
//!
//! A nonce is bound to a client context (the opaque id the transport keeps in
//! the `siwe-nonce` cookie). Issuing a new nonce replaces the previous one for
//! that context, and every consume attempt removes the stored nonce whether
//! it succeeds or not.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};

use alloy::hex;
use chrono::{DateTime, Duration, Utc};
use lru::LruCache;
use ring::rand::{SecureRandom, SystemRandom};

use super::clock::Clock;
use super::error::NonceError;

/// Default nonce lifetime (15 minutes).
pub const DEFAULT_NONCE_TTL: Duration = Duration::minutes(15);

/// Default bound on stored nonces; the least recently issued is evicted past it.
pub const DEFAULT_NONCE_CAPACITY: usize = 100_000;

/// Random bytes per nonce (128 bits).
const NONCE_BYTES: usize = 16;

/// An issued challenge token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nonce {
    /// Lower-case hex token, alphanumeric as EIP-4361 requires
    pub value: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub consumed: bool,
}

impl Nonce {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Storage of live nonces keyed by client context.
pub trait NonceStore: Send + Sync {
    /// Issue a fresh nonce for `client_context`, invalidating any previous one.
    fn issue(&self, client_context: &str) -> Nonce;

    /// Atomically check and invalidate the nonce for `client_context`.
    ///
    /// On success the returned nonce is marked consumed.
    fn consume(&self, client_context: &str, presented: &str) -> Result<Nonce, NonceError>;

    /// Drop any nonce held for `client_context` without checking it.
    fn invalidate(&self, client_context: &str);

    /// Number of unexpired nonces currently held.
    fn live_count(&self) -> usize;
}

/// Generate a random nonce value.
///
/// # Panics
/// If the operating system RNG is unavailable.
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; NONCE_BYTES];
    SystemRandom::new()
        .fill(&mut bytes)
        .expect("system RNG unavailable");
    hex::encode(bytes)
}

/// Process-local nonce store, bounded as an LRU keyed by client context.
pub struct InMemoryNonceStore {
    entries: Mutex<LruCache<String, Nonce>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl InMemoryNonceStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_ttl(clock, DEFAULT_NONCE_TTL)
    }

    pub fn with_ttl(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(bound(DEFAULT_NONCE_CAPACITY))),
            ttl,
            clock,
        }
    }

    /// Bound the number of stored nonces. Issuing for a new context past the
    /// bound evicts the least recently issued entry.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.entries
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .resize(bound(capacity));
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn capacity(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cap()
            .get()
    }
}

fn bound(capacity: usize) -> NonZeroUsize {
    NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)
}

impl NonceStore for InMemoryNonceStore {
    fn issue(&self, client_context: &str) -> Nonce {
        let now = self.clock.now();
        let nonce = Nonce {
            value: generate_nonce(),
            issued_at: now,
            expires_at: now + self.ttl,
            consumed: false,
        };

        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, n)| n.is_expired(now))
            .map(|(ctx, _)| ctx.clone())
            .collect();
        for ctx in &expired {
            entries.pop(ctx);
        }

        if let Some((evicted, _)) = entries.push(client_context.to_string(), nonce.clone()) {
            if evicted != client_context {
                tracing::warn!(capacity = entries.cap().get(), "Nonce store full, evicted oldest entry");
            }
        }

        tracing::debug!(live = entries.len(), "Issued sign-in nonce");
        nonce
    }

    fn consume(&self, client_context: &str, presented: &str) -> Result<Nonce, NonceError> {
        let now = self.clock.now();

        // Removal happens before any check so that concurrent consumers of the
        // same context can never both observe the stored nonce.
        let stored = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop(client_context)
            .ok_or(NonceError::NotFound)?;

        if stored.is_expired(now) {
            return Err(NonceError::Expired);
        }
        if stored.value != presented {
            return Err(NonceError::Mismatch);
        }

        Ok(Nonce {
            consumed: true,
            ..stored
        })
    }

    fn invalidate(&self, client_context: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop(client_context);
    }

    fn live_count(&self) -> usize {
        let now = self.clock.now();
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, n)| !n.is_expired(now))
            .count()
    }
}
