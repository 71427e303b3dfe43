// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation service: template dispatch and webhook processing.
//!
//! Outbound sends and inbound webhooks meet here. Webhook processing for the
//! same conversation is serialized through a per-conversation mutex so the
//! state machine never observes interleaved transitions; the vendor send
//! always happens before the new state is committed, so a send failure
//! leaves the conversation where it was.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, info, warn};
use vitrina_bus::{EventBus, EventEnvelope, ORDER_EVENTS};
use vitrina_core::{ConversationState, MessageDirection, MessageStatus, VitrinaError};
use vitrina_storage::queries::{conversations, messages};
use vitrina_storage::{Conversation, Database};
use vitrina_whatsapp::{normalize_phone, IncomingMessage, StatusUpdate, TemplateSend, WebhookBatch, WhatsAppClient};

use crate::engine::{self, DomainEvent};
use crate::templates;

/// Hours a conversation stays open after creation.
const CONVERSATION_WINDOW_HOURS: i64 = 24;

/// Outbound vendor seam, implemented by the WhatsApp client and by test
/// doubles.
#[async_trait]
pub trait TemplateSender: Send + Sync {
    async fn send(&self, send: &TemplateSend) -> Result<String, VitrinaError>;
}

#[async_trait]
impl TemplateSender for WhatsAppClient {
    async fn send(&self, send: &TemplateSend) -> Result<String, VitrinaError> {
        self.send_template(send).await
    }
}

fn expires_in_window() -> String {
    (chrono::Utc::now() + chrono::Duration::hours(CONVERSATION_WINDOW_HOURS))
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

#[derive(Clone)]
pub struct ConversationService {
    db: Database,
    bus: EventBus,
    sender: Arc<dyn TemplateSender>,
    locks: Arc<DashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
}

impl ConversationService {
    pub fn new(db: Database, bus: EventBus, sender: Arc<dyn TemplateSender>) -> Self {
        Self {
            db,
            bus,
            sender,
            locks: Arc::new(DashMap::new()),
        }
    }

    fn lock_for(&self, conversation_id: i64) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .entry(conversation_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Send a template to a customer, opening or reusing the conversation
    /// for (phone, order).
    ///
    /// The initial confirmation send advances a fresh conversation from
    /// `START` to `AWAITING_CONFIRMATION`; every other send leaves the state
    /// alone (webhook transitions own it).
    pub async fn send_template(
        &self,
        template_name: &str,
        phone: &str,
        variables: &HashMap<String, String>,
        order_number: &str,
        business_id: i64,
    ) -> Result<Conversation, VitrinaError> {
        let def = templates::resolve(template_name)?;
        let body_params = def.body_params(variables)?;
        let phone = normalize_phone(phone)?;

        let now = vitrina_core::now_rfc3339();
        let conversation =
            match conversations::find_active(&self.db, &phone, order_number, &now).await? {
                Some(existing) => existing,
                None => {
                    conversations::insert(
                        &self.db,
                        business_id,
                        &phone,
                        order_number,
                        serde_json::json!({}),
                        &expires_in_window(),
                    )
                    .await?
                }
            };

        let provider_message_id = self
            .sender
            .send(&TemplateSend {
                to: phone.clone(),
                template_name: def.name.to_string(),
                language: def.language.to_string(),
                body_params: body_params.clone(),
                buttons: def.buttons.iter().map(|b| b.to_string()).collect(),
            })
            .await?;

        messages::insert(
            &self.db,
            messages::NewMessageLog {
                conversation_id: conversation.id,
                direction: MessageDirection::Outbound,
                provider_message_id: Some(provider_message_id.clone()),
                template_name: Some(def.name.to_string()),
                content: def.render(&body_params),
                status: MessageStatus::Sent,
            },
        )
        .await?;
        conversations::record_send(&self.db, conversation.id, &provider_message_id, def.name)
            .await?;

        if conversation.current_state == ConversationState::Start
            && def.name == templates::CONFIRMACION_PEDIDO
        {
            conversations::update_state(
                &self.db,
                conversation.id,
                ConversationState::AwaitingConfirmation,
                conversation.metadata.clone(),
            )
            .await?;
        }

        info!(
            conversation_id = conversation.id,
            template = def.name,
            order_number,
            "template dispatched"
        );
        conversations::get(&self.db, conversation.id)
            .await?
            .ok_or_else(|| VitrinaError::Internal("conversation vanished after send".to_string()))
    }

    /// Process one parsed webhook batch.
    ///
    /// Failures are logged and swallowed per message; the provider always
    /// gets a 200 from the HTTP layer regardless.
    pub async fn handle_webhook(&self, batch: &WebhookBatch) {
        for message in &batch.messages {
            if let Err(e) = self.handle_incoming(message).await {
                warn!(from = %message.from, error = %e, "inbound message processing failed");
            }
        }
        for status in &batch.statuses {
            if let Err(e) = self.handle_status(status).await {
                warn!(id = %status.provider_message_id, error = %e, "status update failed");
            }
        }
    }

    async fn handle_incoming(&self, message: &IncomingMessage) -> Result<(), VitrinaError> {
        let phone = normalize_phone(&message.from)?;
        let now = vitrina_core::now_rfc3339();

        let Some(found) = conversations::find_active_by_phone(&self.db, &phone, &now).await? else {
            info!(%phone, "inbound message without an active conversation ignored");
            return Ok(());
        };

        let lock = self.lock_for(found.id);
        let _guard = lock.lock().await;

        // Re-read under the lock; a concurrent webhook may have advanced or
        // closed the conversation.
        let Some(conversation) = conversations::get(&self.db, found.id).await? else {
            return Ok(());
        };
        if conversation.current_state.is_terminal() || conversation.expires_at <= now {
            debug!(conversation_id = conversation.id, "conversation closed mid-flight, ignoring");
            return Ok(());
        }

        messages::insert(
            &self.db,
            messages::NewMessageLog {
                conversation_id: conversation.id,
                direction: MessageDirection::Inbound,
                provider_message_id: Some(message.provider_message_id.clone()),
                template_name: None,
                content: message.text.clone(),
                status: MessageStatus::Delivered,
            },
        )
        .await?;

        let transition = match engine::transition(conversation.current_state, &message.text) {
            Ok(t) => t,
            Err(e) => {
                debug!(
                    conversation_id = conversation.id,
                    state = %conversation.current_state,
                    text = %message.text,
                    error = %e,
                    "invalid transition, conversation unchanged"
                );
                return Ok(());
            }
        };

        let mut metadata = conversation.metadata.clone();
        match &transition.event {
            Some(DomainEvent::OrderCancelled { reason }) => {
                metadata["cancellation_reason"] = serde_json::json!(reason);
            }
            Some(DomainEvent::NoveltyRequested { novelty_type }) => {
                metadata["novelty_type"] = serde_json::json!(novelty_type);
            }
            _ => {}
        }

        // Reply first, commit after: a vendor failure must not advance state.
        if let Some(template_name) = transition.reply_template {
            let mut variables = HashMap::new();
            variables.insert(
                "order_number".to_string(),
                conversation.order_number.clone(),
            );
            self.send_template(
                template_name,
                &conversation.phone_number,
                &variables,
                &conversation.order_number,
                conversation.business_id,
            )
            .await?;
        }

        conversations::update_state(&self.db, conversation.id, transition.next_state, metadata.clone())
            .await?;

        if let Some(event) = &transition.event {
            let mut data = serde_json::json!({
                "order_number": conversation.order_number,
                "phone": conversation.phone_number,
                "business_id": conversation.business_id,
            });
            if let (Some(data_map), Some(meta_map)) = (data.as_object_mut(), metadata.as_object()) {
                for (k, v) in meta_map {
                    data_map.insert(k.clone(), v.clone());
                }
            }
            self.bus.publish(
                ORDER_EVENTS,
                EventEnvelope::new(event.event_type(), conversation.business_id, data),
            );
        }

        info!(
            conversation_id = conversation.id,
            from = %conversation.current_state,
            to = %transition.next_state,
            "conversation advanced"
        );
        Ok(())
    }

    async fn handle_status(&self, status: &StatusUpdate) -> Result<(), VitrinaError> {
        let applied =
            messages::update_status(&self.db, &status.provider_message_id, status.status).await?;
        if !applied {
            debug!(id = %status.provider_message_id, "status for unknown message dropped");
        }
        Ok(())
    }
}
