// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client-unique reference generation.
//!
//! Payment references are 32 lowercase hex characters (128 bits of CSPRNG
//! output). Wallet recharge references carry a `WR-` prefix for operator
//! readability.

use rand::RngCore;

/// Generate a 32-hex payment reference.
pub fn new_payment_reference() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Generate a wallet recharge reference (`WR-` + 16 hex).
pub fn new_recharge_reference() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    format!("WR-{hex}")
}

/// Current timestamp in the RFC 3339 millisecond form used across the
/// storage layer and wire payloads.
pub fn now_rfc3339() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}
