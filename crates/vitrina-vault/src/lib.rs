// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential vault for the Vitrina platform.
//!
//! Integration credentials are encrypted at rest with AES-256-GCM under a
//! process-wide 32-byte key loaded once at startup (`ENCRYPTION_KEY`). The
//! stored blob is base64 of `nonce || ciphertext || tag`, so a single TEXT
//! column carries everything needed to decrypt.

pub mod crypto;

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;

use vitrina_core::VitrinaError;

/// Process-wide credential vault keyed by a 32-byte secret.
///
/// Cloning is cheap; the key is `Copy`. The key is never logged and the
/// `Debug` impl redacts it.
#[derive(Clone)]
pub struct CredentialVault {
    key: [u8; 32],
}

impl std::fmt::Debug for CredentialVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVault")
            .field("key", &"[redacted]")
            .finish()
    }
}

impl CredentialVault {
    /// Build a vault from a raw 32-byte key.
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Build a vault from the 64-hex `ENCRYPTION_KEY` form.
    pub fn from_hex(hex_key: &str) -> Result<Self, VitrinaError> {
        let bytes = hex::decode(hex_key)
            .map_err(|_| VitrinaError::Vault("ENCRYPTION_KEY is not valid hex".to_string()))?;
        let key: [u8; 32] = bytes
            .try_into()
            .map_err(|_| VitrinaError::Vault("ENCRYPTION_KEY must be 32 bytes".to_string()))?;
        Ok(Self::new(key))
    }

    /// Encrypt plaintext to the storable base64 blob.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String, VitrinaError> {
        let (ciphertext, nonce) = crypto::seal(&self.key, plaintext)?;
        let mut blob = Vec::with_capacity(12 + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(B64.encode(blob))
    }

    /// Decrypt a blob produced by [`encrypt`](Self::encrypt).
    pub fn decrypt(&self, blob: &str) -> Result<Vec<u8>, VitrinaError> {
        let bytes = B64
            .decode(blob)
            .map_err(|_| VitrinaError::Vault("credential blob is not valid base64".to_string()))?;
        if bytes.len() < 12 + 16 {
            return Err(VitrinaError::Vault("credential blob too short".to_string()));
        }
        let nonce: [u8; 12] = bytes[..12].try_into().expect("length checked above");
        crypto::open(&self.key, &nonce, &bytes[12..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vault() -> CredentialVault {
        CredentialVault::from_hex(
            "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f",
        )
        .unwrap()
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let v = vault();
        let plaintext = br#"{"client_id":"abc","client_secret":"xyz"}"#;
        let blob = v.encrypt(plaintext).unwrap();
        assert_eq!(v.decrypt(&blob).unwrap(), plaintext);
    }

    #[test]
    fn roundtrip_arbitrary_bytes() {
        let v = vault();
        for len in [0usize, 1, 15, 16, 17, 255, 4096] {
            let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            let blob = v.encrypt(&data).unwrap();
            assert_eq!(v.decrypt(&blob).unwrap(), data, "len={len}");
        }
    }

    #[test]
    fn from_hex_rejects_bad_keys() {
        assert!(CredentialVault::from_hex("not-hex").is_err());
        assert!(CredentialVault::from_hex("abcd").is_err());
    }

    #[test]
    fn truncated_blob_is_rejected() {
        let v = vault();
        assert!(v.decrypt("AAAA").is_err());
    }

    #[test]
    fn debug_redacts_key() {
        let v = vault();
        assert!(!format!("{v:?}").contains("0001"));
    }
}
