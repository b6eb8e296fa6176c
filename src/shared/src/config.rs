//! Shared configuration types for noticer
//!
//! Connection settings used by more than one channel live here so every channel
//! section of the service configuration can reuse them.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Redis connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL
    pub url: String,
    /// Connection timeout in seconds
    pub connect_timeout_seconds: u64,
    /// Command timeout in seconds
    pub command_timeout_seconds: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            connect_timeout_seconds: 5,
            command_timeout_seconds: 5,
        }
    }
}

impl RedisConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_seconds)
    }
}

/// Outbound HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpClientConfig {
    /// Whole-request timeout in seconds
    pub timeout_seconds: u64,
    /// TCP connect timeout in seconds
    pub connect_timeout_seconds: u64,
    pub user_agent: String,
    pub verify_ssl: bool,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 10,
            connect_timeout_seconds: 3,
            user_agent: "noticer/1.0".to_string(),
            verify_ssl: true,
        }
    }
}

impl HttpClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}
