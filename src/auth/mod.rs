// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Sign-In with Ethereum (EIP-4361) for the wallet API.
//!
//! ## Auth Flow
//!
//! 1. Client requests a nonce (`GET /v1/auth/nonce`)
//! 2. Client builds an EIP-4361 message embedding the nonce and has the
//!    wallet sign it with `personal_sign`
//! 3. Server (`POST /v1/auth/verify`):
//!    - Parses the message
//!    - Consumes the nonce (single use, 15 minute lifetime)
//!    - Checks the message validity window and domain
//!    - Recovers the signer and compares it to the message address
//!    - Issues an HMAC-signed session handle (7 day lifetime)
//! 4. Later requests carry the handle in the `siwe-session` cookie
//!
//! ## Security
//!
//! - A nonce is burned on every verification attempt, successful or not
//! - Issuing a nonce invalidates the previous one for the same client
//! - Error responses carry only a stable code, never the underlying cause

pub mod clock;
pub mod error;
pub mod extractor;
pub mod message;
pub mod nonce;
pub mod service;
pub mod session;
pub mod signature;

pub use error::AuthError;
pub use extractor::SessionUser;
pub use message::SignInMessage;
pub use service::AuthService;
