// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Argon2id password hashing for the login surface.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::distributions::Alphanumeric;
use rand::Rng;
use vitrina_core::VitrinaError;

/// Length of administratively generated passwords.
const GENERATED_LEN: usize = 12;

/// Hash a plaintext password with Argon2id and a random salt.
pub fn hash_password(plaintext: &str) -> Result<String, VitrinaError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| VitrinaError::Internal(format!("password hashing failed: {e}")))
}

/// Check a plaintext password against a stored hash.
///
/// A malformed stored hash is an internal error, not a failed login.
pub fn verify_password(plaintext: &str, stored: &str) -> Result<bool, VitrinaError> {
    let parsed = PasswordHash::new(stored)
        .map_err(|e| VitrinaError::Internal(format!("stored password hash is malformed: {e}")))?;
    Ok(Argon2::default()
        .verify_password(plaintext.as_bytes(), &parsed)
        .is_ok())
}

/// Generate a random alphanumeric password for administrative resets.
pub fn generate_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_LEN)
        .map(char::from)
        .collect()
}
