// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message log persistence.
//!
//! Rows are append-only; only `status` and its per-status timestamp columns
//! are ever mutated, driven by provider status webhooks.

use rusqlite::params;
use vitrina_core::{MessageDirection, MessageStatus, VitrinaError};

use crate::database::{map_tr_err, Database};
use crate::models::{parse_column, MessageLog};

/// Fields for a new message log row.
#[derive(Debug, Clone)]
pub struct NewMessageLog {
    pub conversation_id: i64,
    pub direction: MessageDirection,
    pub provider_message_id: Option<String>,
    pub template_name: Option<String>,
    pub content: String,
    pub status: MessageStatus,
}

/// Append a message log row. The timestamp column matching the initial
/// status is stamped on insert.
pub async fn insert(db: &Database, new: NewMessageLog) -> Result<MessageLog, VitrinaError> {
    let id = db
        .connection()
        .call(move |conn| {
            let ts_col = timestamp_column(new.status);
            conn.execute(
                &format!(
                    "INSERT INTO message_logs
                     (conversation_id, direction, provider_message_id, template_name, content,
                      status, {ts_col})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))"
                ),
                params![
                    new.conversation_id,
                    new.direction.to_string(),
                    new.provider_message_id,
                    new.template_name,
                    new.content,
                    new.status.to_string(),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)?;

    get(db, id)
        .await?
        .ok_or_else(|| VitrinaError::Internal("inserted message log vanished".to_string()))
}

/// Get one message log row.
pub async fn get(db: &Database, id: i64) -> Result<Option<MessageLog>, VitrinaError> {
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(&format!("{COLS} WHERE id = ?1"), params![id], map_row);
            match result {
                Ok(v) => Ok(Some(v)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Apply a provider status update to the row carrying this provider message
/// id. Returns false when no such row exists (status for an unknown send is
/// dropped by the caller).
pub async fn update_status(
    db: &Database,
    provider_message_id: &str,
    status: MessageStatus,
) -> Result<bool, VitrinaError> {
    let provider_message_id = provider_message_id.to_string();
    db.connection()
        .call(move |conn| {
            let ts_col = timestamp_column(status);
            let n = conn.execute(
                &format!(
                    "UPDATE message_logs SET status = ?1,
                     {ts_col} = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE provider_message_id = ?2"
                ),
                params![status.to_string(), provider_message_id],
            )?;
            Ok(n > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// All rows of one conversation, oldest first.
pub async fn list_for_conversation(
    db: &Database,
    conversation_id: i64,
) -> Result<Vec<MessageLog>, VitrinaError> {
    db.connection()
        .call(move |conn| {
            let mut stmt =
                conn.prepare(&format!("{COLS} WHERE conversation_id = ?1 ORDER BY id ASC"))?;
            let rows = stmt.query_map(params![conversation_id], map_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

fn timestamp_column(status: MessageStatus) -> &'static str {
    match status {
        MessageStatus::Sent => "sent_at",
        MessageStatus::Delivered => "delivered_at",
        MessageStatus::Read => "read_at",
        MessageStatus::Failed => "failed_at",
    }
}

const COLS: &str = "SELECT id, conversation_id, direction, provider_message_id, template_name,
        content, status, sent_at, delivered_at, read_at, failed_at, created_at
 FROM message_logs";

fn map_row(row: &rusqlite::Row<'_>) -> Result<MessageLog, rusqlite::Error> {
    Ok(MessageLog {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        direction: parse_column(2, row.get(2)?)?,
        provider_message_id: row.get(3)?,
        template_name: row.get(4)?,
        content: row.get(5)?,
        status: parse_column(6, row.get(6)?)?,
        sent_at: row.get(7)?,
        delivered_at: row.get(8)?,
        read_at: row.get(9)?,
        failed_at: row.get(10)?,
        created_at: row.get(11)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::conversations;
    use tempfile::tempdir;

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
        let conv = conversations::insert(
            &db,
            bid,
            "+573001112233",
            "ORD-42",
            serde_json::json!({}),
            "2099-01-01T00:00:00.000Z",
        )
        .await
        .unwrap();
        (db, conv.id, dir)
    }

    #[tokio::test]
    async fn outbound_row_stamps_sent_at() {
        let (db, conv_id, _dir) = setup().await;
        let log = insert(
            &db,
            NewMessageLog {
                conversation_id: conv_id,
                direction: MessageDirection::Outbound,
                provider_message_id: Some("wamid.1".to_string()),
                template_name: Some("pedido_confirmado".to_string()),
                content: "Tu pedido fue confirmado".to_string(),
                status: MessageStatus::Sent,
            },
        )
        .await
        .unwrap();
        assert!(log.sent_at.is_some());
        assert!(log.delivered_at.is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn status_update_progresses_timestamps() {
        let (db, conv_id, _dir) = setup().await;
        insert(
            &db,
            NewMessageLog {
                conversation_id: conv_id,
                direction: MessageDirection::Outbound,
                provider_message_id: Some("wamid.1".to_string()),
                template_name: None,
                content: "hola".to_string(),
                status: MessageStatus::Sent,
            },
        )
        .await
        .unwrap();

        assert!(update_status(&db, "wamid.1", MessageStatus::Delivered)
            .await
            .unwrap());
        assert!(update_status(&db, "wamid.1", MessageStatus::Read)
            .await
            .unwrap());

        let logs = list_for_conversation(&db, conv_id).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, MessageStatus::Read);
        assert!(logs[0].sent_at.is_some());
        assert!(logs[0].delivered_at.is_some());
        assert!(logs[0].read_at.is_some());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn unknown_provider_id_returns_false() {
        let (db, _conv_id, _dir) = setup().await;
        assert!(!update_status(&db, "wamid.missing", MessageStatus::Read)
            .await
            .unwrap());
        db.close().await.unwrap();
    }
}
