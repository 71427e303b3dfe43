// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User, staff, and permission queries backing the auth surface.

use rusqlite::params;
use vitrina_core::VitrinaError;

use crate::database::{map_tr_err, Database};
use crate::models::{Business, Permission, StaffBinding, User};

/// Look up an active user by email.
pub async fn get_by_email(db: &Database, email: &str) -> Result<Option<User>, VitrinaError> {
    let email = email.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                &format!("{USER_COLS} WHERE email = ?1 AND is_active = 1"),
                params![email],
                map_user,
            );
            optional(result)
        })
        .await
        .map_err(map_tr_err)
}

/// Look up a user by id.
pub async fn get_by_id(db: &Database, id: i64) -> Result<Option<User>, VitrinaError> {
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                &format!("{USER_COLS} WHERE id = ?1"),
                params![id],
                map_user,
            );
            optional(result)
        })
        .await
        .map_err(map_tr_err)
}

/// Replace a user's password hash and set the change-required flag.
pub async fn update_password(
    db: &Database,
    user_id: i64,
    password_hash: &str,
    require_change: bool,
) -> Result<bool, VitrinaError> {
    let password_hash = password_hash.to_string();
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE users SET password_hash = ?1, require_password_change = ?2
                 WHERE id = ?3",
                params![password_hash, require_change, user_id],
            )?;
            Ok(n > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// All staff bindings of a user. A binding with `business_id = None` denotes
/// platform scope.
pub async fn staff_bindings(db: &Database, user_id: i64) -> Result<Vec<StaffBinding>, VitrinaError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, business_id, role_id FROM staff
                 WHERE user_id = ?1 ORDER BY id ASC",
            )?;
            let rows = stmt.query_map(params![user_id], |row| {
                Ok(StaffBinding {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    business_id: row.get(2)?,
                    role_id: row.get(3)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Active businesses a user is bound to, ordered by binding id (the first is
/// the login flow's initial business).
pub async fn businesses_for_user(
    db: &Database,
    user_id: i64,
) -> Result<Vec<Business>, VitrinaError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT b.id, b.code, b.name, b.business_type_id, b.is_active, b.created_at
                 FROM staff s JOIN businesses b ON b.id = s.business_id
                 WHERE s.user_id = ?1 AND b.is_active = 1
                 ORDER BY s.id ASC",
            )?;
            let rows = stmt.query_map(params![user_id], map_business)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Get a business by id.
pub async fn get_business(db: &Database, id: i64) -> Result<Option<Business>, VitrinaError> {
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                "SELECT id, code, name, business_type_id, is_active, created_at
                 FROM businesses WHERE id = ?1",
                params![id],
                map_business,
            );
            optional(result)
        })
        .await
        .map_err(map_tr_err)
}

/// Permissions granted by a role, with the per-business active gate applied.
///
/// A resource with no `business_resources` row for the tenant counts as
/// active; an explicit row carries the gate.
pub async fn permissions_for_role(
    db: &Database,
    role_id: i64,
    business_id: Option<i64>,
) -> Result<Vec<Permission>, VitrinaError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT r.id, r.name, r.action,
                        COALESCE(br.active, 1)
                 FROM role_permissions rp
                 JOIN resources r ON r.id = rp.resource_id
                 LEFT JOIN business_resources br
                        ON br.resource_id = r.id AND br.business_id = ?2
                 WHERE rp.role_id = ?1
                 ORDER BY r.name, r.action",
            )?;
            let rows = stmt.query_map(params![role_id, business_id], |row| {
                Ok(Permission {
                    resource_id: row.get(0)?,
                    name: row.get(1)?,
                    action: row.get(2)?,
                    active: row.get(3)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

const USER_COLS: &str = "SELECT id, email, password_hash, full_name, require_password_change,
        is_active, created_at
 FROM users";

fn map_user(row: &rusqlite::Row<'_>) -> Result<User, rusqlite::Error> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        full_name: row.get(3)?,
        require_password_change: row.get(4)?,
        is_active: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn map_business(row: &rusqlite::Row<'_>) -> Result<Business, rusqlite::Error> {
    Ok(Business {
        id: row.get(0)?,
        code: row.get(1)?,
        name: row.get(2)?,
        business_type_id: row.get(3)?,
        is_active: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn optional<T>(result: Result<T, rusqlite::Error>) -> Result<Option<T>, rusqlite::Error> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}
