// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HMAC-SHA256 signed tokens: mint, validate, refresh.
//!
//! Wire format is `base64url(claims_json).base64url(signature)` with no
//! padding. The claims carry the token family so a business token cannot be
//! replayed where a session token is required, and vice versa.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use strum::{Display, EnumString};
use vitrina_core::{Scope, VitrinaError};

type HmacSha256 = Hmac<Sha256>;

/// Token family. Routes declare which family they accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Issued at login; the primary credential.
    Session,
    /// Issued on an explicit business switch; scoped to one tenant.
    Business,
    /// Short-lived public voting token.
    Voting,
    /// Short-lived voting-admin token.
    VotingAuth,
}

/// Signed token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    /// Wire-level scope: `0` denotes platform (super-admin) scope.
    pub business_id: i64,
    pub business_type_id: i64,
    pub role_id: i64,
    pub token_type: TokenType,
    /// Expiry as unix seconds.
    pub exp: i64,
}

impl Claims {
    /// The typed scope carried by this token.
    pub fn scope(&self) -> Scope {
        Scope::from_wire(self.business_id)
    }
}

/// The resolved caller identity attached to authenticated requests.
#[derive(Debug, Clone)]
pub struct Subject {
    pub user_id: i64,
    pub scope: Scope,
    pub business_type_id: i64,
    pub role_id: i64,
    pub token_type: TokenType,
}

impl Subject {
    pub fn from_claims(claims: &Claims) -> Self {
        Self {
            user_id: claims.user_id,
            scope: claims.scope(),
            business_type_id: claims.business_type_id,
            role_id: claims.role_id,
            token_type: claims.token_type,
        }
    }

    pub fn is_super_admin(&self) -> bool {
        self.scope.is_platform()
    }

    /// The tenant this request acts on. Platform callers must pass an
    /// explicit business id; returns Forbidden when neither is available.
    pub fn effective_business_id(&self, explicit: Option<i64>) -> Result<i64, VitrinaError> {
        match (self.scope, explicit) {
            (Scope::Business(id), _) => Ok(id),
            (Scope::Platform, Some(id)) => Ok(id),
            (Scope::Platform, None) => Err(VitrinaError::Validation(
                "platform scope requires an explicit business_id".to_string(),
            )),
        }
    }
}

/// Validity of the short-lived voting families, in seconds.
const VOTING_TTL_SECS: i64 = 15 * 60;

/// Default session/business validity in hours.
const DEFAULT_SESSION_TTL_HOURS: i64 = 24;

/// Signs and validates all token families with one process-wide secret.
#[derive(Clone)]
pub struct TokenAuthority {
    secret: Vec<u8>,
    session_ttl_hours: i64,
}

impl std::fmt::Debug for TokenAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAuthority")
            .field("secret", &"[redacted]")
            .finish()
    }
}

impl TokenAuthority {
    /// Create an authority from the shared signing secret.
    pub fn new(secret: &str) -> Result<Self, VitrinaError> {
        if secret.len() < 16 {
            return Err(VitrinaError::Config(
                "token signing secret must be at least 16 characters".to_string(),
            ));
        }
        Ok(Self {
            secret: secret.as_bytes().to_vec(),
            session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
        })
    }

    /// Override the session/business token validity. Voting tokens keep
    /// their fixed 15-minute window.
    pub fn with_session_ttl_hours(mut self, hours: i64) -> Self {
        self.session_ttl_hours = hours;
        self
    }

    /// Per-family validity in seconds.
    fn ttl_seconds(&self, token_type: TokenType) -> i64 {
        match token_type {
            TokenType::Session | TokenType::Business => self.session_ttl_hours * 3600,
            TokenType::Voting | TokenType::VotingAuth => VOTING_TTL_SECS,
        }
    }

    /// Mint a token of the given family for the given identity.
    pub fn issue(
        &self,
        token_type: TokenType,
        user_id: i64,
        scope: Scope,
        business_type_id: i64,
        role_id: i64,
    ) -> Result<String, VitrinaError> {
        let claims = Claims {
            user_id,
            business_id: scope.to_wire(),
            business_type_id,
            role_id,
            token_type,
            exp: chrono::Utc::now().timestamp() + self.ttl_seconds(token_type),
        };
        self.sign(&claims)
    }

    fn sign(&self, claims: &Claims) -> Result<String, VitrinaError> {
        let body = serde_json::to_vec(claims)
            .map_err(|e| VitrinaError::Internal(format!("claims serialization failed: {e}")))?;
        let encoded = URL_SAFE_NO_PAD.encode(&body);
        let sig = self.mac(encoded.as_bytes())?;
        Ok(format!("{encoded}.{}", URL_SAFE_NO_PAD.encode(sig)))
    }

    fn mac(&self, data: &[u8]) -> Result<Vec<u8>, VitrinaError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| VitrinaError::Internal(format!("hmac key setup failed: {e}")))?;
        mac.update(data);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    /// Validate a token of the expected family.
    ///
    /// Signature is checked before anything else; a tampered token is
    /// "invalid" regardless of what its claims say.
    pub fn validate(&self, token: &str, expected: TokenType) -> Result<Claims, VitrinaError> {
        let claims = self.verify_signature(token)?;
        if claims.exp <= chrono::Utc::now().timestamp() {
            return Err(VitrinaError::Unauthorized("expired token".to_string()));
        }
        if claims.token_type != expected {
            return Err(VitrinaError::Unauthorized("wrong token type".to_string()));
        }
        Ok(claims)
    }

    fn verify_signature(&self, token: &str) -> Result<Claims, VitrinaError> {
        let invalid = || VitrinaError::Unauthorized("invalid token".to_string());

        let (encoded, sig_part) = token.split_once('.').ok_or_else(invalid)?;
        let sig = URL_SAFE_NO_PAD.decode(sig_part).map_err(|_| invalid())?;

        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| VitrinaError::Internal(format!("hmac key setup failed: {e}")))?;
        mac.update(encoded.as_bytes());
        // Constant-time comparison.
        mac.verify_slice(&sig).map_err(|_| invalid())?;

        let body = URL_SAFE_NO_PAD.decode(encoded).map_err(|_| invalid())?;
        serde_json::from_slice(&body).map_err(|_| invalid())
    }

    /// Re-issue a valid, unexpired token with a fresh expiry. Claims and
    /// family are preserved unchanged.
    pub fn refresh(&self, token: &str) -> Result<String, VitrinaError> {
        let claims = self.verify_signature(token)?;
        if claims.exp <= chrono::Utc::now().timestamp() {
            return Err(VitrinaError::Unauthorized("expired token".to_string()));
        }
        let refreshed = Claims {
            exp: chrono::Utc::now().timestamp() + self.ttl_seconds(claims.token_type),
            ..claims
        };
        self.sign(&refreshed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authority() -> TokenAuthority {
        TokenAuthority::new("test-secret-0123456789").unwrap()
    }

    #[test]
    fn short_secret_is_rejected() {
        assert!(matches!(
            TokenAuthority::new("short"),
            Err(VitrinaError::Config(_))
        ));
    }

    #[test]
    fn issue_validate_roundtrip() {
        let auth = authority();
        let token = auth
            .issue(TokenType::Session, 42, Scope::Business(7), 2, 3)
            .unwrap();
        let claims = auth.validate(&token, TokenType::Session).unwrap();
        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.scope(), Scope::Business(7));
        assert_eq!(claims.business_type_id, 2);
        assert_eq!(claims.role_id, 3);
    }

    #[test]
    fn session_ttl_override_applies() {
        let auth = TokenAuthority::new("test-secret-0123456789")
            .unwrap()
            .with_session_ttl_hours(1);
        let token = auth
            .issue(TokenType::Session, 1, Scope::Business(7), 1, 1)
            .unwrap();
        let claims = auth.validate(&token, TokenType::Session).unwrap();
        let now = chrono::Utc::now().timestamp();
        assert!(claims.exp > now + 3500 && claims.exp <= now + 3605);
    }

    #[test]
    fn platform_scope_serializes_as_zero() {
        let auth = authority();
        let token = auth
            .issue(TokenType::Session, 1, Scope::Platform, 0, 1)
            .unwrap();
        let claims = auth.validate(&token, TokenType::Session).unwrap();
        assert_eq!(claims.business_id, 0);
        assert!(Subject::from_claims(&claims).is_super_admin());
    }

    #[test]
    fn tampered_token_is_invalid() {
        let auth = authority();
        let token = auth
            .issue(TokenType::Session, 42, Scope::Business(7), 2, 3)
            .unwrap();

        let mut tampered = token.clone();
        tampered.replace_range(0..1, if token.starts_with('A') { "B" } else { "A" });
        let err = auth.validate(&tampered, TokenType::Session).unwrap_err();
        assert_eq!(err.to_string(), "unauthorized: invalid token");

        assert!(auth.validate("garbage", TokenType::Session).is_err());
        assert!(auth.validate("", TokenType::Session).is_err());
    }

    #[test]
    fn wrong_secret_is_invalid() {
        let auth = authority();
        let other = TokenAuthority::new("another-secret-9876543210").unwrap();
        let token = auth
            .issue(TokenType::Session, 42, Scope::Business(7), 2, 3)
            .unwrap();
        assert!(other.validate(&token, TokenType::Session).is_err());
    }

    #[test]
    fn wrong_family_is_rejected() {
        let auth = authority();
        let token = auth
            .issue(TokenType::Business, 42, Scope::Business(7), 2, 3)
            .unwrap();
        let err = auth.validate(&token, TokenType::Session).unwrap_err();
        assert_eq!(err.to_string(), "unauthorized: wrong token type");
        assert!(auth.validate(&token, TokenType::Business).is_ok());
    }

    #[test]
    fn expired_token_is_rejected() {
        let auth = authority();
        let claims = Claims {
            user_id: 1,
            business_id: 7,
            business_type_id: 1,
            role_id: 1,
            token_type: TokenType::Session,
            exp: chrono::Utc::now().timestamp() - 1,
        };
        let token = auth.sign(&claims).unwrap();
        let err = auth.validate(&token, TokenType::Session).unwrap_err();
        assert_eq!(err.to_string(), "unauthorized: expired token");
        // Refresh cannot resurrect an expired token either.
        assert!(auth.refresh(&token).is_err());
    }

    #[test]
    fn refresh_preserves_claims() {
        let auth = authority();
        let token = auth
            .issue(TokenType::Business, 42, Scope::Business(7), 2, 3)
            .unwrap();
        let refreshed = auth.refresh(&token).unwrap();
        let claims = auth.validate(&refreshed, TokenType::Business).unwrap();
        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.business_id, 7);
        assert_eq!(claims.role_id, 3);
    }

    #[test]
    fn effective_business_id_resolution() {
        let business = Subject {
            user_id: 1,
            scope: Scope::Business(7),
            business_type_id: 1,
            role_id: 1,
            token_type: TokenType::Session,
        };
        // A tenant-scoped caller cannot act on another tenant.
        assert_eq!(business.effective_business_id(Some(9)).unwrap(), 7);
        assert_eq!(business.effective_business_id(None).unwrap(), 7);

        let platform = Subject {
            scope: Scope::Platform,
            ..business
        };
        assert_eq!(platform.effective_business_id(Some(9)).unwrap(), 9);
        assert!(platform.effective_business_id(None).is_err());
    }
}
