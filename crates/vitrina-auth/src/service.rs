// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authentication service: login, password management, business switch.

use serde::Serialize;
use tracing::{info, warn};
use vitrina_core::{Scope, VitrinaError};
use vitrina_storage::{queries, Business, Database, User};

use crate::password::{generate_password, hash_password, verify_password};
use crate::tokens::{Subject, TokenAuthority, TokenType};

/// Minimum accepted length for user-chosen passwords.
const MIN_PASSWORD_LEN: usize = 8;

/// Successful login result.
#[derive(Debug, Serialize)]
pub struct LoginOutcome {
    pub user: User,
    pub token: String,
    pub require_password_change: bool,
    pub businesses: Vec<Business>,
    pub scope: String,
    pub is_super_admin: bool,
}

/// Authentication and account operations over the shared database.
#[derive(Clone)]
pub struct AuthService {
    db: Database,
    authority: TokenAuthority,
}

impl AuthService {
    pub fn new(db: Database, authority: TokenAuthority) -> Self {
        Self { db, authority }
    }

    pub fn authority(&self) -> &TokenAuthority {
        &self.authority
    }

    /// Authenticate an email/password pair and mint a session token.
    ///
    /// The initial business is the user's first staff binding; a binding
    /// without a business grants platform scope. Unknown email and wrong
    /// password are indistinguishable to the caller.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, VitrinaError> {
        let invalid = || VitrinaError::Unauthorized("invalid credentials".to_string());

        let user = queries::users::get_by_email(&self.db, email)
            .await?
            .ok_or_else(invalid)?;

        let ok = {
            let password = password.to_string();
            let stored = user.password_hash.clone();
            tokio::task::spawn_blocking(move || verify_password(&password, &stored))
                .await
                .map_err(|e| VitrinaError::Internal(format!("hash verification task: {e}")))??
        };
        if !ok {
            warn!(email, "login rejected");
            return Err(invalid());
        }

        let bindings = queries::users::staff_bindings(&self.db, user.id).await?;
        let first = bindings.first().ok_or_else(|| {
            VitrinaError::Forbidden("user has no staff binding".to_string())
        })?;

        let (scope, business_type_id) = match first.business_id {
            None => (Scope::Platform, 0),
            Some(id) => {
                let business = queries::users::get_business(&self.db, id)
                    .await?
                    .ok_or_else(|| VitrinaError::Internal(format!("staff binding references missing business {id}")))?;
                (Scope::Business(id), business.business_type_id)
            }
        };

        let token = self.authority.issue(
            TokenType::Session,
            user.id,
            scope,
            business_type_id,
            first.role_id,
        )?;
        let businesses = queries::users::businesses_for_user(&self.db, user.id).await?;

        info!(user_id = user.id, scope = %scope.to_wire(), "login succeeded");
        Ok(LoginOutcome {
            require_password_change: user.require_password_change,
            token,
            businesses,
            scope: if scope.is_platform() { "platform" } else { "business" }.to_string(),
            is_super_admin: scope.is_platform(),
            user,
        })
    }

    /// Change the caller's own password after re-verifying the current one.
    /// Clears the forced-change flag.
    pub async fn change_password(
        &self,
        subject: &Subject,
        current: &str,
        new: &str,
    ) -> Result<(), VitrinaError> {
        if new.len() < MIN_PASSWORD_LEN {
            return Err(VitrinaError::Validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let user = queries::users::get_by_id(&self.db, subject.user_id)
            .await?
            .ok_or_else(|| VitrinaError::NotFound("user not found".to_string()))?;
        let ok = {
            let current = current.to_string();
            let stored = user.password_hash.clone();
            tokio::task::spawn_blocking(move || verify_password(&current, &stored))
                .await
                .map_err(|e| VitrinaError::Internal(format!("hash verification task: {e}")))??
        };
        if !ok {
            return Err(VitrinaError::Unauthorized(
                "current password is incorrect".to_string(),
            ));
        }

        let hash = {
            let new = new.to_string();
            tokio::task::spawn_blocking(move || hash_password(&new))
                .await
                .map_err(|e| VitrinaError::Internal(format!("hash task: {e}")))??
        };
        queries::users::update_password(&self.db, user.id, &hash, false).await?;
        info!(user_id = user.id, "password changed");
        Ok(())
    }

    /// Generate a fresh random password for a user and force a change on
    /// next login. Targeting another user requires platform scope. Returns
    /// the plaintext for one-time delivery.
    pub async fn generate_user_password(
        &self,
        subject: &Subject,
        target_user_id: Option<i64>,
    ) -> Result<String, VitrinaError> {
        let target = target_user_id.unwrap_or(subject.user_id);
        if target != subject.user_id && !subject.is_super_admin() {
            return Err(VitrinaError::Forbidden(
                "only platform scope may reset other users".to_string(),
            ));
        }

        let (plaintext, hash) = tokio::task::spawn_blocking(|| {
            let plaintext = generate_password();
            let hash = hash_password(&plaintext)?;
            Ok::<_, VitrinaError>((plaintext, hash))
        })
        .await
        .map_err(|e| VitrinaError::Internal(format!("hash task: {e}")))??;
        if !queries::users::update_password(&self.db, target, &hash, true).await? {
            return Err(VitrinaError::NotFound("user not found".to_string()));
        }
        info!(user_id = target, by = subject.user_id, "password reset");
        Ok(plaintext)
    }

    /// Issue a business token for one of the caller's bound businesses.
    /// Only a session token may be exchanged, never another business token.
    pub async fn business_token(
        &self,
        subject: &Subject,
        business_id: i64,
    ) -> Result<String, VitrinaError> {
        if subject.token_type != TokenType::Session {
            return Err(VitrinaError::Unauthorized("wrong token type".to_string()));
        }

        let bindings = queries::users::staff_bindings(&self.db, subject.user_id).await?;
        let binding = bindings
            .iter()
            .find(|b| b.business_id == Some(business_id))
            .ok_or_else(|| {
                VitrinaError::Forbidden("user is not bound to that business".to_string())
            })?;

        let business = queries::users::get_business(&self.db, business_id)
            .await?
            .filter(|b| b.is_active)
            .ok_or_else(|| VitrinaError::NotFound("business not found".to_string()))?;

        self.authority.issue(
            TokenType::Business,
            subject.user_id,
            Scope::Business(business_id),
            business.business_type_id,
            binding.role_id,
        )
    }

    /// Permissions granted by the caller's role, with the tenant's
    /// active gate applied.
    pub async fn roles_permissions(
        &self,
        subject: &Subject,
    ) -> Result<Vec<vitrina_storage::Permission>, VitrinaError> {
        queries::users::permissions_for_role(&self.db, subject.role_id, subject.scope.business_id())
            .await
    }
}
