// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process TTL cache for integration configuration.
//!
//! Only plaintext `config` is memoized, never credentials. Absence is never
//! fatal; a miss simply falls through to storage.

use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Default entry lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

struct Entry {
    value: serde_json::Value,
    expires_at: Instant,
}

/// Keyed TTL cache. Cloning shares the underlying map.
#[derive(Clone)]
pub struct ConfigCache {
    entries: std::sync::Arc<DashMap<String, Entry>>,
    ttl: Duration,
}

impl Default for ConfigCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl ConfigCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: std::sync::Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Fetch a live entry. Expired entries are removed on access.
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        let expired = match self.entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }
        None
    }

    pub fn set(&self, key: &str, value: serde_json::Value) {
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }
}
