//! In-process counter store and ticket cache
//!
//! Every operation runs under one mutex, which makes `incr_with_window` atomic
//! with respect to all other callers in the process. Expiry uses tokio's clock,
//! so tests can drive windows with a paused runtime.

use super::{CounterStore, TicketCache, TtlState};
use crate::error::{NoticeError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Single-process store with Redis-like semantics
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a raw value, optionally without any expiry
    ///
    /// Useful to seed state, e.g. a counter whose expiry was never set.
    pub fn insert<K: Into<String>, V: ToString>(&self, key: K, value: V, ttl: Option<Duration>) {
        let entry = Entry {
            value: value.to_string(),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.entries.lock().insert(key.into(), entry);
    }

    /// Current counter value, if the key is live and numeric
    pub fn count(&self, key: &str) -> Option<i64> {
        let now = Instant::now();
        self.entries
            .lock()
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .and_then(|entry| entry.value.parse().ok())
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .values()
            .filter(|entry| !entry.is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn incr_with_window(&self, key: &str, window: Duration) -> Result<i64> {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        if entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            entries.remove(key);
        }

        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: "0".to_string(),
            expires_at: None,
        });
        let count = entry
            .value
            .parse::<i64>()
            .map_err(|_| NoticeError::store(format!("value of '{}' is not an integer", key)))?
            + 1;
        entry.value = count.to_string();
        if count == 1 {
            entry.expires_at = Some(now + window);
        }

        Ok(count)
    }

    async fn ttl(&self, key: &str) -> Result<TtlState> {
        let now = Instant::now();
        let entries = self.entries.lock();

        Ok(match entries.get(key) {
            None => TtlState::Absent,
            Some(entry) if entry.is_expired(now) => TtlState::Absent,
            Some(Entry {
                expires_at: None, ..
            }) => TtlState::NoExpiry,
            Some(Entry {
                expires_at: Some(at),
                ..
            }) => TtlState::Expires(at.saturating_duration_since(now)),
        })
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

#[async_trait]
impl TicketCache for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        Ok(self
            .entries
            .lock()
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone()))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.insert(key, value, Some(ttl));
        Ok(())
    }
}
