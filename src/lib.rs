// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet Sign-In - Sign-In with Ethereum authentication service
//!
//! This crate lets a user prove control of an Ethereum account by signing a
//! server-issued challenge, and turns that proof into a cookie session.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Nonces, EIP-4361 messages, signature recovery and sessions
//! - `config` - Environment configuration
//! - `telemetry` - Tracing subscriber setup

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod state;
pub mod telemetry;
