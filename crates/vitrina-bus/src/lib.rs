// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Best-effort pub/sub event bus for live UI push.
//!
//! Strictly separate from the durable broker: nothing here survives a
//! restart, publishes never fail the caller, and a slow subscriber lags and
//! drops events rather than applying backpressure. Terminal database state is
//! authoritative; these events only drive SSE streams.
//!
//! Well-known channels: [`PAY_EVENTS`] and [`ORDER_EVENTS`].

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

/// Channel carrying payment lifecycle events.
pub const PAY_EVENTS: &str = "pay.events";

/// Channel carrying conversation outcome events.
pub const ORDER_EVENTS: &str = "order.events";

/// Envelope published on every bus channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique event id (UUID v4).
    pub id: String,
    /// Dotted event type, e.g. `pay.completed` or `order.confirmed`.
    pub event_type: String,
    /// Tenant the event belongs to.
    pub business_id: i64,
    /// RFC 3339 emission time.
    pub timestamp: String,
    /// Event-specific payload.
    pub data: serde_json::Value,
}

impl EventEnvelope {
    /// Build an envelope stamped with a fresh id and the current time.
    pub fn new(event_type: &str, business_id: i64, data: serde_json::Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event_type: event_type.to_string(),
            business_id,
            timestamp: chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            data,
        }
    }
}

/// Fan-out bus over per-channel broadcast senders.
///
/// Cloning shares the underlying channels. Channels are created lazily on
/// first publish or subscribe.
#[derive(Clone)]
pub struct EventBus {
    capacity: usize,
    channels: std::sync::Arc<DashMap<String, broadcast::Sender<EventEnvelope>>>,
}

impl EventBus {
    /// Create a bus whose channels buffer up to `capacity` events per
    /// subscriber before lagging.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            channels: std::sync::Arc::new(DashMap::new()),
        }
    }

    fn sender(&self, channel: &str) -> broadcast::Sender<EventEnvelope> {
        self.channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Publish an event. Fire-and-forget: an error (no live subscribers) is
    /// swallowed and never propagated to the caller.
    pub fn publish(&self, channel: &str, event: EventEnvelope) {
        let sender = self.sender(channel);
        match sender.send(event) {
            Ok(n) => debug!(channel, receivers = n, "event published"),
            Err(_) => debug!(channel, "event dropped -- no subscribers"),
        }
    }

    /// Subscribe to a channel. Events published before the subscription are
    /// not replayed.
    pub fn subscribe(&self, channel: &str) -> broadcast::Receiver<EventEnvelope> {
        self.sender(channel).subscribe()
    }
}
