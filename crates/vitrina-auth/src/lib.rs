// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Token authority and password handling.
//!
//! Issues and validates the three token families (session, business, voting)
//! as compact HMAC-SHA256 signed strings, and wraps argon2 password hashing
//! for the login flow. The signing secret is fixed at startup and never
//! rotated at runtime.

pub mod password;
pub mod service;
pub mod tokens;

pub use password::{generate_password, hash_password, verify_password};
pub use service::{AuthService, LoginOutcome};
pub use tokens::{Claims, Subject, TokenAuthority, TokenType};
