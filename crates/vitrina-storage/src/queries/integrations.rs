// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration registry persistence.
//!
//! `set_default` is the only multi-statement write here; it runs in one
//! transaction so at most one default per (type, business) tuple is ever
//! observable, the null-business (global) case included.

use rusqlite::params;
use vitrina_core::VitrinaError;

use crate::database::{map_tr_err, Database};
use crate::models::Integration;

/// Fields for a new integration record.
#[derive(Debug, Clone)]
pub struct NewIntegration {
    pub code: String,
    pub integration_type: String,
    pub category: String,
    pub business_id: Option<i64>,
    pub is_active: bool,
    pub is_default: bool,
    pub config: serde_json::Value,
    pub encrypted_credentials: Option<String>,
}

/// Mutable fields for an integration update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct IntegrationUpdate {
    pub category: Option<String>,
    pub config: Option<serde_json::Value>,
    pub encrypted_credentials: Option<String>,
}

/// Insert a new integration. Fails with `Conflict` when the code is taken.
pub async fn insert(db: &Database, new: NewIntegration) -> Result<Integration, VitrinaError> {
    let code = new.code.clone();
    let id = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO integrations
                 (code, integration_type, category, business_id, is_active, is_default,
                  config, encrypted_credentials)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    new.code,
                    new.integration_type,
                    new.category,
                    new.business_id,
                    new.is_active,
                    new.is_default,
                    new.config.to_string(),
                    new.encrypted_credentials,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(|e| match &e {
            tokio_rusqlite::Error::Error(rusqlite::Error::SqliteFailure(f, _))
                if f.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                VitrinaError::Conflict(format!("integration code '{code}' already exists"))
            }
            _ => map_tr_err(e),
        })?;

    get(db, id)
        .await?
        .ok_or_else(|| VitrinaError::Internal("inserted integration vanished".to_string()))
}

/// Apply an update to an integration. Returns the updated record, or `None`
/// when the id does not exist.
pub async fn update(
    db: &Database,
    id: i64,
    update: IntegrationUpdate,
) -> Result<Option<Integration>, VitrinaError> {
    let changed = db
        .connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE integrations SET
                 category = COALESCE(?1, category),
                 config = COALESCE(?2, config),
                 encrypted_credentials = COALESCE(?3, encrypted_credentials),
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?4",
                params![
                    update.category,
                    update.config.map(|c| c.to_string()),
                    update.encrypted_credentials,
                    id,
                ],
            )?;
            Ok(n)
        })
        .await
        .map_err(map_tr_err)?;

    if changed == 0 {
        return Ok(None);
    }
    get(db, id).await
}

/// Get an integration by id.
pub async fn get(db: &Database, id: i64) -> Result<Option<Integration>, VitrinaError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!("{SELECT_COLS} WHERE id = ?1"))?;
            optional(stmt.query_row(params![id], map_row))
        })
        .await
        .map_err(map_tr_err)
}

/// Get an integration by its unique code.
pub async fn get_by_code(db: &Database, code: &str) -> Result<Option<Integration>, VitrinaError> {
    let code = code.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!("{SELECT_COLS} WHERE code = ?1"))?;
            optional(stmt.query_row(params![code], map_row))
        })
        .await
        .map_err(map_tr_err)
}

/// Resolve the integration serving (type, business).
///
/// A business-specific record wins over a global (null-business) one, and
/// within each tier the default record wins. Inactive records never match.
pub async fn get_by_type(
    db: &Database,
    integration_type: &str,
    business_id: Option<i64>,
) -> Result<Option<Integration>, VitrinaError> {
    let integration_type = integration_type.to_string();
    db.connection()
        .call(move |conn| {
            let result = match business_id {
                Some(bid) => {
                    let mut stmt = conn.prepare(&format!(
                        "{SELECT_COLS}
                         WHERE integration_type = ?1 AND is_active = 1
                           AND (business_id = ?2 OR business_id IS NULL)
                         ORDER BY (business_id IS NULL) ASC, is_default DESC, id ASC
                         LIMIT 1"
                    ))?;
                    stmt.query_row(params![integration_type, bid], map_row)
                }
                None => {
                    let mut stmt = conn.prepare(&format!(
                        "{SELECT_COLS}
                         WHERE integration_type = ?1 AND is_active = 1
                           AND business_id IS NULL
                         ORDER BY is_default DESC, id ASC
                         LIMIT 1"
                    ))?;
                    stmt.query_row(params![integration_type], map_row)
                }
            };
            optional(result)
        })
        .await
        .map_err(map_tr_err)
}

/// Filter for [`list`].
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub integration_type: Option<String>,
    pub business_id: Option<i64>,
    pub page: i64,
    pub page_size: i64,
}

/// List integrations matching the filter, newest first, with a total count.
/// Pages are 1-based; page 1 and below return the newest rows.
pub async fn list(
    db: &Database,
    filter: ListFilter,
) -> Result<(Vec<Integration>, i64), VitrinaError> {
    db.connection()
        .call(move |conn| {
            let page_size = filter.page_size.clamp(1, 100);
            let offset = (filter.page - 1).max(0) * page_size;

            let mut where_clause = String::from("WHERE 1=1");
            let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
            if let Some(t) = &filter.integration_type {
                where_clause.push_str(" AND integration_type = ?");
                args.push(Box::new(t.clone()));
            }
            if let Some(bid) = filter.business_id {
                where_clause.push_str(" AND business_id = ?");
                args.push(Box::new(bid));
            }

            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM integrations {where_clause}"),
                rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
                |row| row.get(0),
            )?;

            let mut stmt = conn.prepare(&format!(
                "{SELECT_COLS} {where_clause} ORDER BY id DESC LIMIT {page_size} OFFSET {offset}"
            ))?;
            let rows = stmt.query_map(
                rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
                map_row,
            )?;
            let items: Result<Vec<_>, _> = rows.collect();
            Ok((items?, total))
        })
        .await
        .map_err(map_tr_err)
}

/// Flip the active flag. Returns false when the id does not exist.
pub async fn set_active(db: &Database, id: i64, active: bool) -> Result<bool, VitrinaError> {
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE integrations SET is_active = ?1,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?2",
                params![active, id],
            )?;
            Ok(n > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Make the target the sole default for its (type, business) tuple.
///
/// Clears `is_default` on every sibling in the same transaction before
/// setting it on the target. Returns false when the id does not exist.
pub async fn set_default(db: &Database, id: i64) -> Result<bool, VitrinaError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let target: Option<(String, Option<i64>)> = {
                let result = tx.query_row(
                    "SELECT integration_type, business_id FROM integrations WHERE id = ?1",
                    params![id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                );
                match result {
                    Ok(t) => Some(t),
                    Err(rusqlite::Error::QueryReturnedNoRows) => None,
                    Err(e) => return Err(e),
                }
            };

            let Some((integration_type, business_id)) = target else {
                tx.commit()?;
                return Ok(false);
            };

            match business_id {
                Some(bid) => tx.execute(
                    "UPDATE integrations SET is_default = 0
                     WHERE integration_type = ?1 AND business_id = ?2 AND id != ?3",
                    params![integration_type, bid, id],
                )?,
                None => tx.execute(
                    "UPDATE integrations SET is_default = 0
                     WHERE integration_type = ?1 AND business_id IS NULL AND id != ?2",
                    params![integration_type, id],
                )?,
            };

            tx.execute(
                "UPDATE integrations SET is_default = 1,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![id],
            )?;

            tx.commit()?;
            Ok(true)
        })
        .await
        .map_err(map_tr_err)
}

/// Delete an integration. Returns false when the id does not exist.
pub async fn delete(db: &Database, id: i64) -> Result<bool, VitrinaError> {
    db.connection()
        .call(move |conn| {
            let n = conn.execute("DELETE FROM integrations WHERE id = ?1", params![id])?;
            Ok(n > 0)
        })
        .await
        .map_err(map_tr_err)
}

const SELECT_COLS: &str = "SELECT id, code, integration_type, category, business_id, is_active,
        is_default, config, encrypted_credentials, created_at, updated_at
 FROM integrations";

fn map_row(row: &rusqlite::Row<'_>) -> Result<Integration, rusqlite::Error> {
    let config_raw: String = row.get(7)?;
    let config = serde_json::from_str(&config_raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Integration {
        id: row.get(0)?,
        code: row.get(1)?,
        integration_type: row.get(2)?,
        category: row.get(3)?,
        business_id: row.get(4)?,
        is_active: row.get(5)?,
        is_default: row.get(6)?,
        config,
        encrypted_credentials: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn optional<T>(result: Result<T, rusqlite::Error>) -> Result<Option<T>, rusqlite::Error> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}
