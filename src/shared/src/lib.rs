//! Shared types and configuration for the noticer crates

pub mod config;
pub mod types;

pub use config::{HttpClientConfig, RedisConfig};

pub use types::*;
