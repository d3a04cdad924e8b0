// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet signature verification.
//!
//! Wallets sign sign-in messages with `personal_sign` (EIP-191), so the
//! digest is `keccak256("\x19Ethereum Signed Message:\n" ++ len ++ message)`.
//! Recovery itself is delegated to alloy's secp256k1 implementation.

use std::str::FromStr;

use alloy::{
    hex,
    primitives::{Address, Signature},
};

use super::error::SignatureError;

/// Recover the signer of `message` and check it is `claimed_address`.
///
/// # Arguments
/// * `message` - The exact bytes the wallet signed
/// * `signature` - 65-byte `r || s || v` signature, hex encoded (`0x` optional)
/// * `claimed_address` - Address the caller says signed, any hex casing
pub fn verify_signature(
    message: &[u8],
    signature: &str,
    claimed_address: &str,
) -> Result<(), SignatureError> {
    let recovered = recover_signer(message, signature)?;

    let matches = Address::from_str(claimed_address)
        .map(|claimed| claimed == recovered)
        .unwrap_or(false);

    if !matches {
        return Err(SignatureError::AddressMismatch {
            expected: claimed_address.to_lowercase(),
            recovered: recovered.to_string().to_lowercase(),
        });
    }

    Ok(())
}

/// Recover the address that produced `signature` over `message`.
pub fn recover_signer(message: &[u8], signature: &str) -> Result<Address, SignatureError> {
    let bytes = hex::decode(signature.trim())
        .map_err(|e| SignatureError::RecoveryFailed(format!("Invalid hex: {e}")))?;

    let signature = Signature::try_from(bytes.as_slice())
        .map_err(|e| SignatureError::RecoveryFailed(format!("Invalid signature: {e}")))?;

    signature
        .recover_address_from_msg(message)
        .map_err(|e| SignatureError::RecoveryFailed(e.to_string()))
}
