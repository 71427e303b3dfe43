// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation persistence.
//!
//! Expiry is wall-clock on read: the `active` lookups filter on
//! `expires_at > now` and exclude terminal states, so an expired conversation
//! is indistinguishable from a missing one.

use rusqlite::params;
use vitrina_core::{ConversationState, VitrinaError};

use crate::database::{map_tr_err, Database};
use crate::models::{parse_column, Conversation};

/// Open a new conversation in `START` state.
pub async fn insert(
    db: &Database,
    business_id: i64,
    phone_number: &str,
    order_number: &str,
    metadata: serde_json::Value,
    expires_at: &str,
) -> Result<Conversation, VitrinaError> {
    let phone_number = phone_number.to_string();
    let order_number = order_number.to_string();
    let expires_at = expires_at.to_string();
    let id = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO conversations
                 (business_id, phone_number, order_number, current_state, metadata, expires_at)
                 VALUES (?1, ?2, ?3, 'START', ?4, ?5)",
                params![
                    business_id,
                    phone_number,
                    order_number,
                    metadata.to_string(),
                    expires_at
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)?;

    get(db, id)
        .await?
        .ok_or_else(|| VitrinaError::Internal("inserted conversation vanished".to_string()))
}

/// Get a conversation by id.
pub async fn get(db: &Database, id: i64) -> Result<Option<Conversation>, VitrinaError> {
    db.connection()
        .call(move |conn| {
            let result =
                conn.query_row(&format!("{COLS} WHERE id = ?1"), params![id], map_row);
            optional(result)
        })
        .await
        .map_err(map_tr_err)
}

/// The active conversation for (phone, order), if any.
pub async fn find_active(
    db: &Database,
    phone_number: &str,
    order_number: &str,
    now: &str,
) -> Result<Option<Conversation>, VitrinaError> {
    let phone_number = phone_number.to_string();
    let order_number = order_number.to_string();
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                &format!(
                    "{COLS}
                     WHERE phone_number = ?1 AND order_number = ?2
                       AND expires_at > ?3
                       AND current_state NOT IN ('COMPLETED', 'HANDOFF_TO_HUMAN')
                     ORDER BY id DESC LIMIT 1"
                ),
                params![phone_number, order_number, now],
                map_row,
            );
            optional(result)
        })
        .await
        .map_err(map_tr_err)
}

/// The most recent active conversation for a phone number, across orders.
/// Used by the inbound webhook path, which only knows the sender.
pub async fn find_active_by_phone(
    db: &Database,
    phone_number: &str,
    now: &str,
) -> Result<Option<Conversation>, VitrinaError> {
    let phone_number = phone_number.to_string();
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                &format!(
                    "{COLS}
                     WHERE phone_number = ?1
                       AND expires_at > ?2
                       AND current_state NOT IN ('COMPLETED', 'HANDOFF_TO_HUMAN')
                     ORDER BY updated_at DESC, id DESC LIMIT 1"
                ),
                params![phone_number, now],
                map_row,
            );
            optional(result)
        })
        .await
        .map_err(map_tr_err)
}

/// Record the outcome of an outbound send on the conversation.
pub async fn record_send(
    db: &Database,
    id: i64,
    last_message_id: &str,
    last_template_id: &str,
) -> Result<(), VitrinaError> {
    let last_message_id = last_message_id.to_string();
    let last_template_id = last_template_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE conversations SET last_message_id = ?1, last_template_id = ?2,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?3",
                params![last_message_id, last_template_id, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Commit a state transition, replacing the metadata map.
pub async fn update_state(
    db: &Database,
    id: i64,
    state: ConversationState,
    metadata: serde_json::Value,
) -> Result<(), VitrinaError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE conversations SET current_state = ?1, metadata = ?2,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?3",
                params![state.to_string(), metadata.to_string(), id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

const COLS: &str = "SELECT id, business_id, phone_number, order_number, current_state,
        last_message_id, last_template_id, metadata, created_at, updated_at, expires_at
 FROM conversations";

fn map_row(row: &rusqlite::Row<'_>) -> Result<Conversation, rusqlite::Error> {
    let metadata_raw: String = row.get(7)?;
    let metadata = serde_json::from_str(&metadata_raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Conversation {
        id: row.get(0)?,
        business_id: row.get(1)?,
        phone_number: row.get(2)?,
        order_number: row.get(3)?,
        current_state: parse_column(4, row.get(4)?)?,
        last_message_id: row.get(5)?,
        last_template_id: row.get(6)?,
        metadata,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
        expires_at: row.get(10)?,
    })
}

fn optional<T>(result: Result<T, rusqlite::Error>) -> Result<Option<T>, rusqlite::Error> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const FUTURE: &str = "2099-01-01T00:00:00.000Z";

    async fn setup() -> (Database, i64, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();
        let bid = db
            .connection()
            .call(|conn| {
                conn.execute(
                    "INSERT INTO businesses (code, name) VALUES ('BIZ-7', 'Tienda 7')",
                    [],
                )?;
                Ok::<_, rusqlite::Error>(conn.last_insert_rowid())
            })
            .await
            .unwrap();
        (db, bid, dir)
    }

    #[tokio::test]
    async fn insert_opens_in_start_state() {
        let (db, bid, _dir) = setup().await;
        let conv = insert(
            &db,
            bid,
            "+573001112233",
            "ORD-42",
            serde_json::json!({}),
            FUTURE,
        )
        .await
        .unwrap();
        assert_eq!(conv.current_state, ConversationState::Start);

        let found = find_active(&db, "+573001112233", "ORD-42", "2026-08-24T00:00:00.000Z")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, conv.id);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn expired_conversation_is_invisible() {
        let (db, bid, _dir) = setup().await;
        insert(
            &db,
            bid,
            "+573001112233",
            "ORD-42",
            serde_json::json!({}),
            "2026-08-24T10:00:00.000Z",
        )
        .await
        .unwrap();

        // One second before expiry: visible.
        assert!(
            find_active(&db, "+573001112233", "ORD-42", "2026-08-24T09:59:59.000Z")
                .await
                .unwrap()
                .is_some()
        );
        // At expiry: gone.
        assert!(
            find_active(&db, "+573001112233", "ORD-42", "2026-08-24T10:00:00.000Z")
                .await
                .unwrap()
                .is_none()
        );
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn terminal_conversation_is_invisible() {
        let (db, bid, _dir) = setup().await;
        let conv = insert(
            &db,
            bid,
            "+573001112233",
            "ORD-42",
            serde_json::json!({}),
            FUTURE,
        )
        .await
        .unwrap();
        update_state(
            &db,
            conv.id,
            ConversationState::Completed,
            serde_json::json!({"confirmed": true}),
        )
        .await
        .unwrap();

        assert!(
            find_active_by_phone(&db, "+573001112233", "2026-08-24T00:00:00.000Z")
                .await
                .unwrap()
                .is_none()
        );
        let stored = get(&db, conv.id).await.unwrap().unwrap();
        assert_eq!(stored.current_state, ConversationState::Completed);
        assert_eq!(stored.metadata["confirmed"], true);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn record_send_updates_pointers() {
        let (db, bid, _dir) = setup().await;
        let conv = insert(
            &db,
            bid,
            "+573001112233",
            "ORD-42",
            serde_json::json!({}),
            FUTURE,
        )
        .await
        .unwrap();
        record_send(&db, conv.id, "wamid.abc", "confirmacion_pedido_contraentrega")
            .await
            .unwrap();

        let conv = get(&db, conv.id).await.unwrap().unwrap();
        assert_eq!(conv.last_message_id.as_deref(), Some("wamid.abc"));
        assert_eq!(
            conv.last_template_id.as_deref(),
            Some("confirmacion_pedido_contraentrega")
        );
        db.close().await.unwrap();
    }
}
