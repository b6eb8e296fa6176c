//! Redis-backed counter store and ticket cache
//!
//! The window counter is a Lua script so that `INCR` and the first-touch
//! `EXPIRE` execute as one atomic step on the server. A multi-round-trip
//! version would reintroduce the race where a crash between the two commands
//! leaves a counter without expiry.

use super::{CounterStore, TicketCache, TtlState};
use crate::error::{NoticeError, Result};
use async_trait::async_trait;
use noticer_shared::RedisConfig;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info};

const WINDOW_SCRIPT: &str = r"
local num = redis.call('INCR', KEYS[1])
if num == 1 then
    redis.call('EXPIRE', KEYS[1], tonumber(ARGV[1]))
end
return num
";

/// Counter store and ticket cache on a shared Redis server
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
    window_script: Script,
    command_timeout: Duration,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore")
            .field("command_timeout", &self.command_timeout)
            .finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Connect to Redis with the given configuration
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        info!("Connecting to Redis at {}", config.url);

        let client = Client::open(config.url.as_str())?;
        let connection = timeout(
            Duration::from_secs(config.connect_timeout_seconds),
            ConnectionManager::new(client),
        )
        .await
        .map_err(|_| NoticeError::Timeout {
            operation: "Redis connect".to_string(),
        })??;

        info!("Successfully connected to Redis");

        Ok(Self {
            connection,
            window_script: Script::new(WINDOW_SCRIPT),
            command_timeout: config.command_timeout(),
        })
    }

    async fn bounded<T, F>(&self, operation: &str, fut: F) -> Result<T>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match timeout(self.command_timeout, fut).await {
            Ok(result) => result.map_err(|e| {
                NoticeError::store(format!("Redis {} failed: {}", operation, e))
            }),
            Err(_) => Err(NoticeError::Timeout {
                operation: format!("Redis {}", operation),
            }),
        }
    }
}

#[async_trait]
impl CounterStore for RedisStore {
    async fn incr_with_window(&self, key: &str, window: Duration) -> Result<i64> {
        let mut conn = self.connection.clone();
        let mut invocation = self.window_script.key(key);
        invocation.arg(window.as_secs());
        let count: i64 = self
            .bounded("window increment", invocation.invoke_async(&mut conn))
            .await?;

        debug!("Incremented window counter '{}' to {}", key, count);
        Ok(count)
    }

    async fn ttl(&self, key: &str) -> Result<TtlState> {
        let mut conn = self.connection.clone();
        let ttl: i64 = self.bounded("TTL", conn.ttl(key)).await?;
        Ok(TtlState::from_redis(ttl))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.connection.clone();
        let deleted: i64 = self.bounded("DEL", conn.del(key)).await?;
        debug!("Deleted key '{}', result: {}", key, deleted > 0);
        Ok(())
    }
}

#[async_trait]
impl TicketCache for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection.clone();
        self.bounded("GET", conn.get(key)).await
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.connection.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value).arg("EX").arg(ttl.as_secs().max(1));
        let _: () = self.bounded("SET EX", cmd.query_async(&mut conn)).await?;
        Ok(())
    }
}
