//! Shared state backends
//!
//! Two small interfaces sit here: the atomic window counter the cooldown gate
//! needs, and the string cache the worker and SMS channels keep provider
//! tickets in. Both are implemented by [`RedisStore`] for multi-process
//! deployments and by [`MemoryStore`] for single-process use and tests.

use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub mod memory;
pub mod redis_store;

pub use self::memory::MemoryStore;
pub use self::redis_store::RedisStore;

/// Remaining lifetime of a key, as reported by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlState {
    /// The key does not exist
    Absent,
    /// The key exists but will never expire
    NoExpiry,
    /// The key expires after the given duration
    Expires(Duration),
}

impl TtlState {
    /// Interpret a Redis `TTL` reply (-2 absent, -1 no expiry)
    pub fn from_redis(ttl: i64) -> Self {
        match ttl {
            -2 => TtlState::Absent,
            -1 => TtlState::NoExpiry,
            secs => TtlState::Expires(Duration::from_secs(secs.max(0) as u64)),
        }
    }
}

/// Shared atomic counter consumed by the cooldown gate
///
/// `incr_with_window` must be a single atomic primitive: the increment and the
/// conditional expiry may never be observed separately by concurrent callers.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment `key` and return the new value; when the new value is 1 the key
    /// is set to expire after `window`
    async fn incr_with_window(&self, key: &str, window: Duration) -> Result<i64>;

    async fn ttl(&self, key: &str) -> Result<TtlState>;

    async fn delete(&self, key: &str) -> Result<()>;
}

/// Expiring string cache for provider access tickets
#[async_trait]
pub trait TicketCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;
}

#[async_trait]
impl<T: CounterStore + ?Sized> CounterStore for Arc<T> {
    async fn incr_with_window(&self, key: &str, window: Duration) -> Result<i64> {
        (**self).incr_with_window(key, window).await
    }

    async fn ttl(&self, key: &str) -> Result<TtlState> {
        (**self).ttl(key).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        (**self).delete(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_from_redis_reply() {
        assert_eq!(TtlState::from_redis(-2), TtlState::Absent);
        assert_eq!(TtlState::from_redis(-1), TtlState::NoExpiry);
        assert_eq!(
            TtlState::from_redis(42),
            TtlState::Expires(Duration::from_secs(42))
        );
    }
}
